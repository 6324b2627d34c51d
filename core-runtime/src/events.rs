//! # Event Bus System
//!
//! Provides an event-driven architecture for the image pipeline core using `tokio::sync::broadcast`.
//! This module decouples the pipeline from whoever is watching it: browser
//! push connections, admin dashboards and tests all subscribe to the same bus.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enums for progress and pipeline lifecycle
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   publish    ┌───────────┐
//! │   Pipeline   ├─────────────>│           │   subscribe   ┌──────────────┐
//! │ (progress)   │              │ EventBus  ├──────────────>│ push session │
//! └──────────────┘              │ (broadcast│               └──────────────┘
//! ┌──────────────┐    emit      │  channel) │   subscribe   ┌──────────────┐
//! │   Pipeline   ├─────────────>│           ├──────────────>│   monitor    │
//! │ (lifecycle)  │              └───────────┘               └──────────────┘
//! └──────────────┘
//! ```
//!
//! `EventBus` implements [`ProgressChannel`], so the pipeline publishes
//! progress through the bridge trait and never depends on the bus directly.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, EventStream};
//! use bridge_traits::push::{ProgressChannel, ProgressRecord};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe_user("alice");
//!
//! event_bus.publish("bob", ProgressRecord::new(20, "enhancing"));
//! event_bus.publish("alice", ProgressRecord::new(40, "analyzing"));
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.user_id(), Some("alice"));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; progress is a snapshot stream, so the next event
//!   supersedes whatever was missed.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.

use bridge_traits::push::{ProgressChannel, ProgressRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tracing::trace;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Per-user progress snapshots
    Progress(ProgressEvent),
    /// Pipeline lifecycle events
    Pipeline(PipelineEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Progress(e) => e.description(),
            CoreEvent::Pipeline(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Pipeline(PipelineEvent::BatchFailed { .. }) => EventSeverity::Error,
            CoreEvent::Progress(p) if p.record.is_error() => EventSeverity::Warning,
            CoreEvent::Pipeline(PipelineEvent::ImageProcessed { .. })
            | CoreEvent::Pipeline(PipelineEvent::BatchCompleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// The user this event concerns.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            CoreEvent::Progress(e) => Some(&e.user_id),
            CoreEvent::Pipeline(e) => Some(e.user_id()),
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Progress Events
// ============================================================================

/// A progress snapshot addressed to one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressEvent {
    pub user_id: String,
    #[serde(flatten)]
    pub record: ProgressRecord,
}

impl ProgressEvent {
    fn description(&self) -> &str {
        if self.record.is_error() {
            "Processing failed"
        } else if self.record.progress >= 100 {
            "Processing complete"
        } else {
            "Processing in progress"
        }
    }
}

// ============================================================================
// Pipeline Events
// ============================================================================

/// Lifecycle events of single-image and batch runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PipelineEvent {
    /// One image went through the whole pipeline.
    ImageProcessed {
        user_id: String,
        filename: String,
        /// Reprocess counter after this run (0 when metadata was not persisted).
        process_count: u32,
        duration_ms: u64,
    },
    /// A batch request was accepted.
    BatchStarted {
        user_id: String,
        batch_id: String,
        total: usize,
    },
    /// Every image of a batch was processed.
    BatchCompleted {
        user_id: String,
        batch_id: String,
        images: usize,
        duration_ms: u64,
    },
    /// A batch stopped at its first failing image.
    BatchFailed {
        user_id: String,
        batch_id: String,
        filename: String,
        message: String,
        /// Images fully processed before the failure.
        completed: usize,
    },
}

impl PipelineEvent {
    fn description(&self) -> &str {
        match self {
            PipelineEvent::ImageProcessed { .. } => "Image processed",
            PipelineEvent::BatchStarted { .. } => "Batch started",
            PipelineEvent::BatchCompleted { .. } => "Batch completed successfully",
            PipelineEvent::BatchFailed { .. } => "Batch failed",
        }
    }

    fn user_id(&self) -> &str {
        match self {
            PipelineEvent::ImageProcessed { user_id, .. }
            | PipelineEvent::BatchStarted { user_id, .. }
            | PipelineEvent::BatchCompleted { user_id, .. }
            | PipelineEvent::BatchFailed { user_id, .. } => user_id,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning the bus is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future events.
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to events concerning a single user.
    pub fn subscribe_user(&self, user_id: impl Into<String>) -> EventStream {
        EventStream::for_user(self.subscribe(), user_id)
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl ProgressChannel for EventBus {
    fn publish(&self, user_id: &str, record: ProgressRecord) {
        let event = CoreEvent::Progress(ProgressEvent {
            user_id: user_id.to_string(),
            record,
        });

        if self.emit(event).is_err() {
            trace!(user_id = %user_id, "No live subscribers for progress");
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with additional filtering capabilities.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Stream of events concerning `user_id` only.
    pub fn for_user(receiver: Receiver<CoreEvent>, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self::new(receiver).filter(move |event| event.user_id() == Some(user_id.as_str()))
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
