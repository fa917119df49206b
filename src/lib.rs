//! Class Selection Service Library
//!
//! Core of a course selection system: users register, teachers define and
//! launch courses, students enroll subject to a capacity limit. The binary
//! (`main.rs`) wires these modules behind a token-authenticated HTTP API.
//!
//! ## Modules
//! - **`storage`**: `ConcurrentMap`, a many-reader/one-writer map with JSON
//!   snapshot persistence. Every other store is built on it.
//! - **`account`**: the identity registry. Accounts plus the class roster index.
//! - **`course`**: course lifecycle and the capacity-constrained enrollment
//!   protocol that keeps course rosters and the reverse index in agreement.
//! - **`session`**: volatile token -> identity mapping.
//! - **`api`**: the `/api` request router and its wire types.
//! - **`config`** / **`error`**: command-line flags and the shared error taxonomy.

pub mod account;
pub mod api;
pub mod config;
pub mod course;
pub mod error;
pub mod session;
pub mod storage;
