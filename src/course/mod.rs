//! Course & Enrollment Module
//!
//! Owns course definitions and the capacity-constrained enrollment protocol.
//!
//! ## Course Lifecycle
//! A course starts `Defined` and may be edited freely. `launch` moves it to
//! `Launched` exactly once: its fields freeze and it starts accepting enrollments.
//!
//! ## Enrollment Protocol
//! An enrollment lives in two places that must agree: the course roster
//! (course -> accounts) and the reverse index (account -> course). `enroll` and
//! `withdraw` hold one service-wide mutex across the capacity check and all index
//! writes, so concurrent enrollments cannot overshoot capacity. This serializes
//! enroll/withdraw system-wide; reads never take it.

pub mod service;
pub mod types;

use crate::error::ServiceResult;

/// Resolves a course id to the ids of its enrolled accounts.
///
/// Lets the account service list course members without reaching into the
/// course service's storage.
pub trait RosterLookup {
    fn roster(&self, course_id: &str) -> ServiceResult<Vec<String>>;
}
