//! Progress reporting for long-running tasks
//!
//! Reporters are purely observational: a reporter can never change the
//! outcome of the task it watches. `start`/`finish` pairs are keyed by a task
//! id such as `github` or `load/my-project/mirror`.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Scoped start/finish notification sink
pub trait ProgressReporter: Send + Sync {
    fn start(&self, task_id: &str);
    fn finish(&self, task_id: &str);
}

/// Starts a task on creation and finishes it on drop, so early returns
/// through `?` still close the scope
pub struct TaskScope<'a> {
    reporter: &'a dyn ProgressReporter,
    task_id: String,
}

impl<'a> TaskScope<'a> {
    pub fn start(reporter: &'a dyn ProgressReporter, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        reporter.start(&task_id);
        Self { reporter, task_id }
    }
}

impl Drop for TaskScope<'_> {
    fn drop(&mut self) {
        self.reporter.finish(&self.task_id);
    }
}

/// Logs task start and completion (with elapsed time) through tracing
#[derive(Debug, Default)]
pub struct TracingReporter {
    started: Mutex<HashMap<String, Instant>>,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for TracingReporter {
    fn start(&self, task_id: &str) {
        if let Ok(mut started) = self.started.lock() {
            started.insert(task_id.to_string(), Instant::now());
        }
        info!(task = task_id, "Task started");
    }

    fn finish(&self, task_id: &str) {
        let elapsed_ms = self
            .started
            .lock()
            .ok()
            .and_then(|mut started| started.remove(task_id))
            .map(|t| t.elapsed().as_millis());
        match elapsed_ms {
            Some(elapsed_ms) => info!(task = task_id, elapsed_ms, "Task finished"),
            None => info!(task = task_id, "Task finished (start not seen)"),
        }
    }
}

/// Progress notifications forwarded by [`ChannelReporter`]
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    TaskStarted {
        task_id: String,
        /// Unix milliseconds
        timestamp: i64,
    },
    TaskFinished {
        task_id: String,
        timestamp: i64,
    },
}

/// Forwards progress to an mpsc channel without ever blocking the task.
///
/// Events are dropped when the channel is full or closed.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelReporter {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: ProgressEvent) {
        if let Err(e) = self.tx.try_send(event) {
            debug!("Progress event dropped: {}", e);
        }
    }
}

impl ProgressReporter for ChannelReporter {
    fn start(&self, task_id: &str) {
        self.send(ProgressEvent::TaskStarted {
            task_id: task_id.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        });
    }

    fn finish(&self, task_id: &str) {
        self.send(ProgressEvent::TaskFinished {
            task_id: task_id.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        });
    }
}
