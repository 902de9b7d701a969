//! Event channel between workers and the control loop.
//!
//! Workers only ever hold an [`EventSender`] (or an [`OutputSink`] built from
//! one). The [`EventPump`] lives on the control loop, which is the only place
//! observers are mutated.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::trace;

use crate::domain::events::TaskEvent;
use crate::ports::Clock;

use super::ProgressObserver;

/// Create a connected sender / pump pair. The queue is unbounded; senders never block.
pub fn event_channel(clock: Arc<dyn Clock>) -> (EventSender, EventPump) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx, clock }, EventPump { rx })
}

/// Thread-safe handle used by workers to report progress.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<TaskEvent>,
    clock: Arc<dyn Clock>,
}

impl EventSender {
    /// Enqueue an event. Never blocks; events from one sender keep their order.
    pub fn post_event(&self, event: TaskEvent) {
        if self.tx.send(event).is_err() {
            trace!("event pump dropped; discarding event");
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Output sink bound to one task.
    pub fn sink(&self, task_index: usize, task_name: impl Into<Arc<str>>) -> OutputSink {
        OutputSink {
            sender: self.clone(),
            task_index,
            task_name: task_name.into(),
        }
    }
}

/// Where a worker writes its output lines. Each line becomes an `OutputLine` event.
#[derive(Clone)]
pub struct OutputSink {
    sender: EventSender,
    task_index: usize,
    task_name: Arc<str>,
}

impl OutputSink {
    pub fn line(&self, line: impl Into<String>) {
        let event = TaskEvent::output_line(
            self.task_index,
            self.task_name.as_ref(),
            line,
            self.sender.now(),
        );
        self.sender.post_event(event);
    }

    pub fn task_index(&self) -> usize {
        self.task_index
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }
}

/// Receiving end, drained on the control loop.
pub struct EventPump {
    rx: mpsc::UnboundedReceiver<TaskEvent>,
}

impl EventPump {
    /// Apply every queued event to `observer` in arrival order, then let it
    /// re-render. Returns the number of events applied.
    pub fn pump(&mut self, observer: &mut dyn ProgressObserver) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            observer.apply(&event);
            applied += 1;
        }
        observer.render();
        applied
    }
}
