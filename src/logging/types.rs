//! The [`Log`] trait the engine writes through.

/// Abstraction over logging backends.
///
/// [`Logger`](super::logger::Logger) forwards to `tracing`; engine code takes
/// `&dyn Log` so tests can substitute a mock.
#[cfg_attr(test, mockall::automock)]
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a planned action without performing it.
    fn dry_run(&self, msg: &str);
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn mock_log_records_expected_calls() {
        let mut log = MockLog::new();
        log.expect_warn()
            .withf(|msg| msg.contains("left alone"))
            .times(1)
            .return_const(());
        let log_ref: &dyn Log = &log;
        log_ref.warn("symlink left alone");
    }
}
