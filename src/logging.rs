use std::fmt;

/// Structured logger for one conversion.
///
/// Every message carries the rule name and the client the login is for, so
/// the lines of interleaved conversions can be told apart.
///
/// Secret values never reach it in clear: [`Secrets`](crate::Secrets) redacts
/// them in its `Debug` output.
#[derive(Debug, Clone, Copy)]
pub struct ConversionLog<'a> {
    rule: &'a str,
    client_id: &'a str,
}

impl<'a> ConversionLog<'a> {
    /// Creates a logger for `rule` running against `client_id`.
    pub fn new(rule: &'a str, client_id: &'a str) -> Self {
        Self { rule, client_id }
    }

    /// Logs an info-level message.
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(rule = %self.rule, client_id = %self.client_id, "{}", args);
    }

    /// Logs a warning-level message.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(rule = %self.rule, client_id = %self.client_id, "{}", args);
    }

    /// Logs a debug-level message.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(rule = %self.rule, client_id = %self.client_id, "{}", args);
    }
}
