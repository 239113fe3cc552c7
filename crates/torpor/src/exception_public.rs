//! Host-visible exception type.
//!
//! When a script terminates with an unhandled exception, the host receives an
//! [`Exception`] whose string form is `<ExceptionName>: <message>`. Hosts also
//! construct these to answer a suspension with a raise instead of a return
//! value (see [`crate::ExternalResult::Error`]).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::exception_private::ExcType;

/// A Python exception crossing the host boundary.
///
/// Owns its data; no interpreter state is needed to inspect or format it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
    exc_type: ExcType,
    message: Option<String>,
}

impl Exception {
    /// Creates an exception with a message.
    #[must_use]
    pub fn new(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self {
            exc_type,
            message: Some(message.into()),
        }
    }

    /// Creates an exception without a message.
    #[must_use]
    pub fn bare(exc_type: ExcType) -> Self {
        Self {
            exc_type,
            message: None,
        }
    }

    /// The exception type.
    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    /// The message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.exc_type),
            None => write!(f, "{}", self.exc_type),
        }
    }
}

impl std::error::Error for Exception {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_type_colon_message() {
        let exc = Exception::new(ExcType::NotImplementedError, "OS function 'Path.exists' not implemented");
        assert_eq!(
            exc.to_string(),
            "NotImplementedError: OS function 'Path.exists' not implemented"
        );
        assert_eq!(Exception::bare(ExcType::StopIteration).to_string(), "StopIteration");
    }
}
