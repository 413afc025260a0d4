//! Build lifecycle events delivered to the caller.

use crate::orchestrator::CompletedBuild;
use async_channel::{Receiver, Sender};
use designmark_traits::PendingFetch;
use log::{debug, error, info, warn};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum BuildEvent {
    /// A build request was accepted.
    Started,
    /// The engine became busy (`true`) or idle (`false`).
    Busy(bool),
    /// The current attempt stopped to wait for data; it restarts from the root.
    Suspended(PendingFetch),
    /// An element was generated (0-based positions).
    Progressed { canvas: usize, element: usize },
    Info(String),
    /// Non-fatal problem; generation continues.
    Warning(String),
    /// Terminal error of a build or export.
    Failed(String),
    Completed(Arc<CompletedBuild>),
    /// Previously generated markup is stale (e.g. font mappings changed).
    RefreshRequested,
}

/// Number of undelivered events kept per channel. Past that the oldest
/// event is dropped for every new one.
pub const EVENT_BACKLOG: usize = 256;

/// Sending half of the event channel. Every event is also logged.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: Sender<BuildEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, Receiver<BuildEvent>) {
        Self::with_backlog(EVENT_BACKLOG)
    }

    pub fn with_backlog(backlog: usize) -> (Self, Receiver<BuildEvent>) {
        let (sender, receiver) = async_channel::bounded(backlog.max(1));
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: BuildEvent) {
        match &event {
            BuildEvent::Info(message) => info!("{}", message),
            BuildEvent::Warning(message) => warn!("{}", message),
            BuildEvent::Failed(message) => error!("{}", message),
            BuildEvent::Suspended(fetch) => debug!("Build suspended, waiting for {}", fetch),
            BuildEvent::Completed(build) => info!(
                "Build of '{}' completed: {} elements, {} components.",
                build.document().name(),
                build.document().element_count(),
                build.document().component_count()
            ),
            other => debug!("Event: {:?}", other),
        }
        match self.sender.force_send(event) {
            Ok(Some(dropped)) => debug!("Event backlog full, dropped {:?}", dropped),
            Ok(None) => {}
            Err(_) => debug!("Event channel closed, event dropped."),
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(BuildEvent::Info(message.into()));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(BuildEvent::Warning(message.into()));
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.emit(BuildEvent::Failed(message.into()));
    }
}
