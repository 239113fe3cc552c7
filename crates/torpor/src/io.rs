//! Output capture for the `print()` builtin.

use std::{
    borrow::Cow,
    io::{self, Write as _},
};

/// Trait for handling output from the `print()` builtin function.
///
/// Implement this trait to capture or redirect print output from sandboxed
/// code. The default implementation [`StdPrint`] writes to stdout.
pub trait PrintWriter {
    /// Called once for each formatted argument passed to `print()`.
    ///
    /// This method writes only the given argument's text; separators and the
    /// final newline are emitted via [`PrintWriter::stdout_push`].
    fn stdout_write(&mut self, output: Cow<'_, str>);

    /// Adds a single character to stdout.
    ///
    /// Generally called to add the spaces and newline within print output.
    fn stdout_push(&mut self, end: char);
}

/// Default `PrintWriter` that writes directly to stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) {
        let _ = io::stdout().write_all(output.as_bytes());
    }

    fn stdout_push(&mut self, end: char) {
        let mut buf = [0_u8; 4];
        let _ = io::stdout().write_all(end.encode_utf8(&mut buf).as_bytes());
        if end == '\n' {
            let _ = io::stdout().flush();
        }
    }
}

/// A `PrintWriter` that collects all output into a string.
///
/// Useful for testing or capturing print output programmatically.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    /// Creates a new empty `CollectStringPrint`.
    #[must_use]
    pub fn new() -> Self {
        Self(String::new())
    }

    /// Returns the collected output as a string slice.
    #[must_use]
    pub fn output(&self) -> &str {
        self.0.as_str()
    }

    /// Consumes the writer and returns the collected output.
    #[must_use]
    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) {
        self.0.push_str(&output);
    }

    fn stdout_push(&mut self, end: char) {
        self.0.push(end);
    }
}

/// `PrintWriter` that ignores all output.
///
/// Useful for suppressing print output during testing.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn stdout_write(&mut self, _output: Cow<'_, str>) {}

    fn stdout_push(&mut self, _end: char) {}
}
