//! Keyed progress subscriptions for ingestion
//!
//! Listeners subscribe under an optional upload key. An event published for a
//! key reaches only the listeners of that key; unkeyed uploads reach only
//! unkeyed listeners. A listener whose channel is closed is dropped on the
//! first failed delivery.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Pipeline stage reported to listeners
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Validating,
    Metadata,
    Parsing,
    Chunking,
    Embedding,
    Preparing,
    Storing,
    Complete,
    Saving,
    Processing,
    Error,
}

impl Stage {
    /// Fixed percentage of a per-file stage
    pub fn percent(&self) -> u8 {
        match self {
            Stage::Validating => 10,
            Stage::Metadata => 20,
            Stage::Parsing => 30,
            Stage::Chunking => 50,
            Stage::Embedding => 70,
            Stage::Preparing => 85,
            Stage::Storing => 95,
            Stage::Complete => 100,
            Stage::Saving | Stage::Processing | Stage::Error => 0,
        }
    }
}

/// One progress update as sent over the socket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub progress: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(stage: Stage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.min(100),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

type ListenerKey = Option<String>;

struct Listener {
    id: u64,
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

/// Receiving side of a subscription
pub struct Subscription {
    pub id: u64,
    pub key: Option<String>,
    pub receiver: mpsc::UnboundedReceiver<ProgressEvent>,
}

/// Registry of progress listeners keyed by upload id
#[derive(Default)]
pub struct ProgressHub {
    listeners: DashMap<ListenerKey, Vec<Listener>>,
    next_id: AtomicU64,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one upload key
    pub fn subscribe(&self, key: Option<String>) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.listeners
            .entry(key.clone())
            .or_default()
            .push(Listener { id, sender });

        tracing::debug!("Progress listener {} subscribed (key: {:?})", id, key);
        Subscription { id, key, receiver }
    }

    /// Remove a listener explicitly
    pub fn unsubscribe(&self, key: &Option<String>, id: u64) {
        let now_empty = match self.listeners.get_mut(key) {
            Some(mut list) => {
                list.retain(|l| l.id != id);
                list.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.listeners.remove_if(key, |_, list| list.is_empty());
        }
    }

    /// Deliver an event to the listeners of `key`, returning how many received it
    pub fn publish(&self, key: Option<&str>, event: ProgressEvent) -> usize {
        let key: ListenerKey = key.map(str::to_string);

        let (delivered, now_empty) = match self.listeners.get_mut(&key) {
            Some(mut list) => {
                list.retain(|l| l.sender.send(event.clone()).is_ok());
                (list.len(), list.is_empty())
            }
            None => (0, false),
        };

        if now_empty {
            self.listeners.remove_if(&key, |_, list| list.is_empty());
        }
        delivered
    }

    /// Number of live listeners for a key
    pub fn listener_count(&self, key: Option<&str>) -> usize {
        self.listeners
            .get(&key.map(str::to_string))
            .map(|l| l.len())
            .unwrap_or(0)
    }
}

/// Publishes events for one upload
#[derive(Clone)]
pub struct ProgressReporter {
    hub: Arc<ProgressHub>,
    key: Option<String>,
}

impl ProgressReporter {
    pub fn new(hub: Arc<ProgressHub>, key: Option<String>) -> Self {
        Self { hub, key }
    }

    /// Reporter that talks to nobody
    pub fn detached() -> Self {
        Self::new(Arc::new(ProgressHub::new()), None)
    }

    /// Report a per-file stage at its fixed percentage
    pub fn stage(&self, stage: Stage, message: impl Into<String>) {
        self.report(stage, stage.percent(), message);
    }

    /// Report a stage at an explicit percentage
    pub fn report(&self, stage: Stage, progress: u8, message: impl Into<String>) {
        let event = ProgressEvent::new(stage, progress, message);
        tracing::debug!("Progress {:?} {}%: {}", event.stage, event.progress, event.message);
        self.hub.publish(self.key.as_deref(), event);
    }
}
