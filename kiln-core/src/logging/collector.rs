//! Log collectors: the structured diagnostic sink for graphs and runs.

use super::event::{LogCategory, LogEvent, LogLevel};
use crate::types::{ScheduleId, VertexId};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum number of events to keep in the default buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Trait for log event collectors.
pub trait LogCollector: Send + Sync {
    /// Collect a log event.
    fn collect(&self, event: LogEvent);

    /// Get the number of collected events.
    fn len(&self) -> usize;

    /// Check if the collector is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Thread-safe log collector with a bounded ring buffer.
pub struct BufferedCollector {
    buffer: RwLock<VecDeque<LogEvent>>,
    capacity: usize,
    next_id: AtomicU64,
}

impl BufferedCollector {
    /// Create a new collector with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a collector with default capacity.
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }

    fn select(&self, pred: impl Fn(&LogEvent) -> bool) -> Vec<LogEvent> {
        let buffer = self.buffer.read();
        buffer.iter().filter(|e| pred(e)).cloned().collect()
    }

    /// Get events for one schedule.
    pub fn by_schedule(&self, schedule_id: ScheduleId) -> Vec<LogEvent> {
        self.select(|e| e.schedule_id == Some(schedule_id))
    }

    /// Get events for one vertex within a schedule.
    pub fn by_schedule_vertex(&self, schedule_id: ScheduleId, vertex: VertexId) -> Vec<LogEvent> {
        self.select(|e| e.schedule_id == Some(schedule_id) && e.vertex == Some(vertex))
    }

    /// Get events of one category.
    pub fn by_category(&self, category: LogCategory) -> Vec<LogEvent> {
        self.select(|e| e.category == category)
    }

    /// Get events at or above a certain level.
    pub fn by_level(&self, min_level: LogLevel) -> Vec<LogEvent> {
        self.select(|e| e.level >= min_level)
    }

    /// Get the most recent N events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<LogEvent> {
        let buffer = self.buffer.read();
        buffer.iter().rev().take(limit).cloned().collect()
    }

    /// Get all events (up to capacity).
    pub fn all(&self) -> Vec<LogEvent> {
        let buffer = self.buffer.read();
        buffer.iter().cloned().collect()
    }

    /// Clear all events.
    pub fn clear(&self) {
        self.buffer.write().clear();
    }

    /// Get buffer capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl LogCollector for BufferedCollector {
    fn collect(&self, mut event: LogEvent) {
        event.id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut buffer = self.buffer.write();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }

    fn len(&self) -> usize {
        self.buffer.read().len()
    }
}

impl Default for BufferedCollector {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// A no-op collector that discards all events.
pub struct NullCollector;

impl LogCollector for NullCollector {
    fn collect(&self, _event: LogEvent) {}

    fn len(&self) -> usize {
        0
    }
}

/// Context for logging within a specific run/vertex.
#[derive(Clone)]
pub struct LogContext {
    collector: Arc<dyn LogCollector>,
    schedule_id: Option<ScheduleId>,
    vertex: Option<VertexId>,
    operator: Option<String>,
}

impl LogContext {
    /// Create a new log context.
    pub fn new(collector: Arc<dyn LogCollector>) -> Self {
        Self {
            collector,
            schedule_id: None,
            vertex: None,
            operator: None,
        }
    }

    /// A context that discards everything.
    pub fn null() -> Self {
        Self::new(Arc::new(NullCollector))
    }

    /// Set the schedule ID.
    pub fn with_schedule_id(mut self, schedule_id: ScheduleId) -> Self {
        self.schedule_id = Some(schedule_id);
        self
    }

    /// Create a child context for one vertex and its operator.
    pub fn for_vertex(&self, vertex: VertexId, operator: impl Into<String>) -> Self {
        Self {
            collector: Arc::clone(&self.collector),
            schedule_id: self.schedule_id,
            vertex: Some(vertex),
            operator: Some(operator.into()),
        }
    }

    /// Log an event with context fields automatically applied.
    pub fn log(&self, mut event: LogEvent) {
        if event.schedule_id.is_none() {
            event.schedule_id = self.schedule_id;
        }
        if event.vertex.is_none() {
            event.vertex = self.vertex;
        }
        if event.operator.is_none() {
            event.operator = self.operator.clone();
        }
        self.collector.collect(event);
    }

    /// Log a debug-level message.
    pub fn debug(&self, category: LogCategory, message: impl Into<String>) {
        self.log(LogEvent::debug(category, message));
    }

    /// Log an info-level message.
    pub fn info(&self, category: LogCategory, message: impl Into<String>) {
        self.log(LogEvent::info(category, message));
    }

    /// Log a warn-level message.
    pub fn warn(&self, category: LogCategory, message: impl Into<String>) {
        self.log(LogEvent::warn(category, message));
    }

    /// Log an error-level message.
    pub fn error(&self, category: LogCategory, message: impl Into<String>) {
        self.log(LogEvent::error(category, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_collector_capacity() {
        let collector = BufferedCollector::new(3);

        for i in 1..=4 {
            collector.collect(LogEvent::info(LogCategory::System, format!("Event {}", i)));
        }

        assert_eq!(collector.len(), 3);
        let events = collector.all();
        assert_eq!(events[0].message, "Event 2");
        assert_eq!(events[2].message, "Event 4");
        assert_eq!(events[2].id, 4);
    }

    #[test]
    fn buffered_collector_by_schedule() {
        let collector = BufferedCollector::new(100);
        let schedule_id = ScheduleId::new();

        collector.collect(LogEvent::info(LogCategory::System, "Unrelated"));
        collector.collect(
            LogEvent::info(LogCategory::Schedule, "Run started").with_schedule_id(schedule_id),
        );
        collector.collect(
            LogEvent::info(LogCategory::Operator, "Applied")
                .with_schedule_id(schedule_id)
                .with_vertex(VertexId::new(1)),
        );

        assert_eq!(collector.by_schedule(schedule_id).len(), 2);
        assert_eq!(
            collector
                .by_schedule_vertex(schedule_id, VertexId::new(1))
                .len(),
            1
        );
        assert_eq!(collector.by_category(LogCategory::System).len(), 1);
    }

    #[test]
    fn buffered_collector_by_level() {
        let collector = BufferedCollector::new(100);

        collector.collect(LogEvent::debug(LogCategory::System, "Debug"));
        collector.collect(LogEvent::info(LogCategory::System, "Info"));
        collector.collect(LogEvent::warn(LogCategory::System, "Warn"));
        collector.collect(LogEvent::error(LogCategory::System, "Error"));

        let warnings = collector.by_level(LogLevel::Warn);
        assert_eq!(warnings.len(), 2);
        assert_eq!(collector.recent(1)[0].message, "Error");
    }

    #[test]
    fn log_context_for_vertex() {
        let collector = Arc::new(BufferedCollector::new(100));
        let schedule_id = ScheduleId::new();

        let ctx = LogContext::new(collector.clone()).with_schedule_id(schedule_id);
        ctx.for_vertex(VertexId::new(42), "fs::file_exists")
            .warn(LogCategory::Operator, "Skipped");

        let events = collector.all();
        assert_eq!(events[0].schedule_id, Some(schedule_id));
        assert_eq!(events[0].vertex, Some(VertexId::new(42)));
        assert_eq!(events[0].operator.as_deref(), Some("fs::file_exists"));
    }

    #[test]
    fn null_context_discards() {
        let ctx = LogContext::null();
        ctx.error(LogCategory::System, "Discarded");
        assert_eq!(NullCollector.len(), 0);
    }
}
