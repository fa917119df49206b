//! HTTP API
//!
//! A single JSON endpoint (`POST /api`) that translates client actions into
//! account, course and session operations.
//!
//! ## Request Flow
//! 1. The action name is parsed.
//! 2. Unless the action is `LogIn`, the token is resolved to the caller's
//!    identity (HTTP 401 on failure).
//! 3. The caller's privilege is checked against the action.
//! 4. Parameters are decoded and the service call is made. Business failures
//!    come back as `errorMessage`.

pub mod handlers;
pub mod protocol;
