//! Error types for the OBD-II core: a proper enum rather than a flat
//! string, since callers need to distinguish "no data" from "lost
//! connection" from "bad response" rather than just printing a
//! message.

use std::fmt;

/// All error conditions the core can surface.
#[derive(Debug)]
pub enum ObdError {
    /// The serial port could not be opened.
    OpenFailure(String),
    /// Bring-up exhausted its retry budget without the interface
    /// responding usefully.
    BringUpTimeout {
        /// Number of attempts made before giving up.
        attempts: u32,
    },
    /// A command produced no lines, or a known ECU did not respond.
    NoData,
    /// A read produced nothing at all (not even an empty response block).
    NoResponse,
    /// A frame lacked the expected mode-echo byte, a DTC count
    /// mismatched, or a VIN header was malformed.
    UnexpectedResponse(String),
    /// Wraps a lower-level I/O failure.
    Io(std::io::Error),
    /// Wraps a serial port failure.
    Serial(serial::Error),
    /// Wraps a hex-parsing failure.
    ParseInt(std::num::ParseIntError),
}

impl fmt::Display for ObdError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::OpenFailure(msg) => write!(f, "failed to open interface: {}", msg),
            Self::BringUpTimeout { attempts } => {
                write!(f, "bring-up timed out after {} attempts", attempts)
            }
            Self::NoData => write!(f, "no data"),
            Self::NoResponse => write!(f, "no response"),
            Self::UnexpectedResponse(msg) => write!(f, "unexpected response: {}", msg),
            Self::Io(e) => write!(f, "{}", e),
            Self::Serial(e) => write!(f, "{}", e),
            Self::ParseInt(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ObdError {}

macro_rules! error_from {
    ( $variant:ident, $t:ty ) => {
        impl From<$t> for ObdError {
            fn from(error: $t) -> Self {
                ObdError::$variant(error)
            }
        }
    };
}

error_from!(Io, std::io::Error);
error_from!(Serial, serial::Error);
error_from!(ParseInt, std::num::ParseIntError);

/// Outcome of an attempted read: a tagged variant rather than the
/// ELM327's own sentinel strings `"NODATA"` / `"NORESPONSE"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome<T> {
    /// A value was decoded successfully.
    Value(T),
    /// The command produced a response block, but no usable data for
    /// this ECU/sensor (the ELM327 literal `NODATA`, or an absent ECU).
    NoData,
    /// The read produced nothing at all.
    NoResponse,
}

impl<T> ReadOutcome<T> {
    /// True if this outcome carries a value.
    pub fn is_value(&self) -> bool {
        matches!(self, ReadOutcome::Value(_))
    }

    /// Map the contained value, if any.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ReadOutcome<U> {
        match self {
            ReadOutcome::Value(v) => ReadOutcome::Value(f(v)),
            ReadOutcome::NoData => ReadOutcome::NoData,
            ReadOutcome::NoResponse => ReadOutcome::NoResponse,
        }
    }
}
