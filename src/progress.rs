use std::sync::Arc;

/// Human-readable status update emitted by the fetch pipeline. Transient;
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub message: String,
    /// Completion percentage in `[0, 100]`, when one is known.
    pub percentage: Option<f32>,
}

impl ProgressEvent {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: text.into(),
            percentage: None,
        }
    }

    pub fn with_percentage(text: impl Into<String>, percentage: f32) -> Self {
        Self {
            message: text.into(),
            percentage: Some(percentage),
        }
    }
}

/// Receives progress events. Implementations must tolerate being called from
/// whatever task currently drives the fetch.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Fans progress events out to subscribers synchronously, in attachment
/// order. A channel with no subscribers drops every event, which doubles as
/// the null sink: publishers always own a channel and never probe for
/// observer support.
#[derive(Clone, Default)]
pub struct ProgressChannel {
    listeners: Vec<Arc<dyn ProgressListener>>,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener. Subscribing the same listener twice is a no-op.
    pub fn subscribe(&mut self, listener: Arc<dyn ProgressListener>) {
        if !self.listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            self.listeners.push(listener);
        }
    }

    /// Detach a listener. Removing one that was never subscribed is a no-op.
    pub fn unsubscribe(&mut self, listener: &Arc<dyn ProgressListener>) {
        self.listeners.retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn publish(&self, message: impl Into<String>, percentage: Option<f32>) {
        let event = ProgressEvent {
            message: message.into(),
            percentage,
        };
        tracing::debug!(message = %event.message, percentage = ?event.percentage, "progress");
        for listener in &self.listeners {
            listener.on_progress(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}
