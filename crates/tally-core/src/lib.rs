//! Domain model and time-bin arithmetic for chat-tally.
//!
//! Holds the immutable conversation model, the tally-table types handed to
//! the charting client, calendar-aware bin construction, the error type and
//! the CLI settings surface.

pub mod binning;
pub mod error;
pub mod models;
pub mod settings;
