//! Error types for the tripmode toolkit
//!
//! Library code returns the typed [`Error`]; the command-line boundary wraps it
//! in `anyhow` for context chains.

use std::fmt;

/// Main error type for tripmode operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Latitude/longitude outside the valid range, or not finite
    #[error("Invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// A required CSV column is absent from the header row
    #[error("Missing column '{column}'{}", Hint(.suggestion.as_deref()))]
    MissingColumn {
        column: String,
        suggestion: Option<String>,
    },

    /// A timestamp cell could not be parsed with any supported format
    #[error("Invalid timestamp '{value}' (line {line})")]
    InvalidTimestamp { value: String, line: u64 },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Malformed input row or value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// CSV reader/writer failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::MissingColumn`], suggesting the closest present header
    pub fn missing_column<S: AsRef<str>>(column: &str, present: &[S]) -> Self {
        Error::MissingColumn {
            column: column.to_string(),
            suggestion: crate::suggest::suggest_correction(column, present),
        }
    }
}

/// Renders the optional "did you mean" tail of a message
struct Hint<'a>(Option<&'a str>);

impl fmt::Display for Hint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(s) => write!(f, " (did you mean '{s}'?)"),
            None => Ok(()),
        }
    }
}

/// Convenience result type for tripmode operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_message_with_suggestion() {
        let err = Error::missing_column("Latitude", &["DeviceID", "Lat", "Lon"]);
        let msg = err.to_string();
        assert!(msg.starts_with("Missing column 'Latitude'"));
        assert!(msg.contains("did you mean 'Lat'?"), "got: {msg}");
    }

    #[test]
    fn test_missing_column_message_without_suggestion() {
        let err = Error::missing_column("Sequence", &["zzz"]);
        assert_eq!(err.to_string(), "Missing column 'Sequence'");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "I/O error: gone");
    }
}
