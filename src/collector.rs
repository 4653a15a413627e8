use crate::result::{Severity, ValidationEvent};

/// A parse notification as raised by the parser: message plus optional position.
///
/// Negative `line`/`column` values mean the position is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNotification {
    pub message: String,
    pub line: i32,
    pub column: i32,
}

impl ParseNotification {
    pub fn new(message: impl Into<String>, line: i32, column: i32) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }

    /// A notification with no known position
    pub fn unpositioned(message: impl Into<String>) -> Self {
        Self::new(message, -1, -1)
    }
}

/// Accumulates every notification raised while parsing one document, in
/// arrival order. One collector per run; never shared between runs.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    events: Vec<ValidationEvent>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event. Never fails, never deduplicates.
    pub fn record(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        line: i32,
        column: i32,
    ) {
        self.events.push(ValidationEvent::new(
            severity,
            message,
            known_position(line),
            known_position(column),
        ));
    }

    pub fn warning(&mut self, notification: ParseNotification) {
        self.record_notification(Severity::Warning, notification);
    }

    pub fn error(&mut self, notification: ParseNotification) {
        self.record_notification(Severity::Error, notification);
    }

    pub fn fatal_error(&mut self, notification: ParseNotification) {
        self.record_notification(Severity::FatalError, notification);
    }

    fn record_notification(&mut self, severity: Severity, notification: ParseNotification) {
        self.record(
            severity,
            notification.message,
            notification.line,
            notification.column,
        );
    }

    /// Snapshot of the accumulated events
    pub fn events(&self) -> Vec<ValidationEvent> {
        self.events.clone()
    }

    pub fn into_events(self) -> Vec<ValidationEvent> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn known_position(raw: i32) -> Option<u32> {
    u32::try_from(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_arrival_order_and_severity() {
        let mut collector = ErrorCollector::new();
        collector.error(ParseNotification::new("first", 2, 5));
        collector.warning(ParseNotification::new("second", 3, 1));
        collector.fatal_error(ParseNotification::new("third", 9, 14));

        let events = collector.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], ValidationEvent::new(Severity::Error, "first", Some(2), Some(5)));
        assert_eq!(events[1], ValidationEvent::new(Severity::Warning, "second", Some(3), Some(1)));
        assert_eq!(
            events[2],
            ValidationEvent::new(Severity::FatalError, "third", Some(9), Some(14))
        );
    }

    #[test]
    fn test_negative_positions_are_unknown() {
        let mut collector = ErrorCollector::new();
        collector.record(Severity::Error, "somewhere", -1, -1);
        collector.record(Severity::Error, "line only", 12, -5);
        collector.record(Severity::Error, "origin", 0, 0);

        let events = collector.into_events();
        assert_eq!(events[0].line(), None);
        assert_eq!(events[0].column(), None);
        assert_eq!(events[1].line(), Some(12));
        assert_eq!(events[1].column(), None);
        assert_eq!(events[2].line(), Some(0));
        assert_eq!(events[2].column(), Some(0));
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut collector = ErrorCollector::new();
        for _ in 0..3 {
            collector.error(ParseNotification::new("same", 1, 1));
        }
        assert_eq!(collector.len(), 3);
    }

    #[test]
    fn test_snapshot_does_not_alias_internal_state() {
        let mut collector = ErrorCollector::new();
        collector.warning(ParseNotification::unpositioned("w"));

        let mut snapshot = collector.events();
        snapshot.clear();

        assert_eq!(collector.len(), 1);
        assert!(!collector.is_empty());
    }

    #[test]
    fn test_unbounded_accumulation() {
        let mut collector = ErrorCollector::new();
        for i in 0..10_000 {
            collector.error(ParseNotification::new(format!("e{}", i), i, 1));
        }
        let events = collector.into_events();
        assert_eq!(events.len(), 10_000);
        assert_eq!(events[9_999].message(), "e9999");
    }
}
