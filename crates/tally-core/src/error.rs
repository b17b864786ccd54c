use chrono::NaiveDateTime;
use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by chat-tally.
#[derive(Error, Debug)]
pub enum TallyError {
    /// A transcript file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transcript byte stream is not valid under the configured encoding.
    #[error("Failed to decode transcript as {encoding} at byte offset {offset}")]
    Decode { encoding: String, offset: usize },

    /// A requested aggregation range has its start after its end.
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    /// A bin-width specification string could not be parsed.
    #[error("Invalid bin width: {0}")]
    BinWidth(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the tally crates.
pub type Result<T> = std::result::Result<T, TallyError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, mo: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = TallyError::FileRead {
            path: PathBuf::from("/some/chat.txt"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/some/chat.txt"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_decode() {
        let err = TallyError::Decode {
            encoding: "utf-8".to_string(),
            offset: 42,
        };
        assert_eq!(
            err.to_string(),
            "Failed to decode transcript as utf-8 at byte offset 42"
        );
    }

    #[test]
    fn test_error_display_invalid_range() {
        let err = TallyError::InvalidRange {
            start: dt(2019, 12, 31),
            end: dt(2019, 1, 1),
        };
        let msg = err.to_string();
        assert!(msg.contains("start 2019-12-31"));
        assert!(msg.contains("after end 2019-01-01"));
    }

    #[test]
    fn test_error_display_bin_width() {
        let err = TallyError::BinWidth("3x".to_string());
        assert_eq!(err.to_string(), "Invalid bin width: 3x");
    }

    #[test]
    fn test_error_display_config() {
        let err = TallyError::Config("unknown encoding".to_string());
        assert_eq!(err.to_string(), "Configuration error: unknown encoding");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: TallyError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }
}
