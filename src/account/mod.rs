//! Account Module
//!
//! Manages user accounts and the class roster index (class -> member ids).
//!
//! Every account assigned to a class appears in that class's roster and every
//! roster entry names an existing account of that class. `register` and
//! `remove` keep both sides in step; the startup pass in `AccountService::open`
//! repairs snapshots where they drifted apart.

pub mod service;
pub mod types;
