//! Observers: everything that consumes progress events.
//!
//! Observers run on the control loop only; workers talk to them through the
//! event channel.

pub mod board;
pub mod channel;
pub mod task_log;
pub mod tracing_observer;

pub use board::{TaskRunBoard, TaskRunRecord};
pub use channel::{event_channel, EventPump, EventSender, OutputSink};
pub use task_log::TaskLogWriter;
pub use tracing_observer::TracingObserver;

use crate::domain::events::TaskEvent;

pub trait ProgressObserver {
    fn apply(&mut self, event: &TaskEvent);

    /// Called after every pump, whether or not events arrived.
    fn render(&mut self) {}
}

/// Fan-out to several observers, in insertion order.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn push(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }
}

impl ProgressObserver for ObserverSet {
    fn apply(&mut self, event: &TaskEvent) {
        for o in &mut self.observers {
            o.apply(event);
        }
    }

    fn render(&mut self) {
        for o in &mut self.observers {
            o.render();
        }
    }
}

/// Keeps every event it sees. Handy for assertions.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    events: Vec<TaskEvent>,
    renders: usize,
}

impl RecordingObserver {
    pub fn events(&self) -> &[TaskEvent] {
        &self.events
    }

    pub fn renders(&self) -> usize {
        self.renders
    }

    /// Events for one task, in arrival order.
    pub fn for_task(&self, task_name: &str) -> Vec<&TaskEvent> {
        self.events
            .iter()
            .filter(|e| e.task_name() == Some(task_name))
            .collect()
    }
}

impl ProgressObserver for RecordingObserver {
    fn apply(&mut self, event: &TaskEvent) {
        self.events.push(event.clone());
    }

    fn render(&mut self) {
        self.renders += 1;
    }
}
