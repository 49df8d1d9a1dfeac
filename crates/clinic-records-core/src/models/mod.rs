//! Domain models for the clinic records system.

mod bilingual;
mod patient;
mod session;

pub use bilingual::*;
pub use patient::*;
pub use session::*;

/// Current UTC time as a fixed-width RFC 3339 timestamp (microseconds).
///
/// Fixed width keeps the stored strings lexically sortable.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
