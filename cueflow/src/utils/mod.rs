//! Utility functions for UUID generation and timestamp handling.

pub mod timestamps;

pub use timestamps::{elapsed_seconds, format_iso8601, iso_timestamp, now_utc, Timestamp};

use uuid::Uuid;

/// Generates a new UUID v4, used as a run id.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}
