//! Event delivery to the host application.

pub mod events;
pub mod human;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use events::{CallbackPayload, FinishUsage, StreamCallbackMessage};
pub use human::{HelpType, HumanCallback, HumanChannel, HumanReply, HumanRequest, HumanRequestKind};

/// Receives every event of a run.
///
/// Calls are awaited in emission order per agent; events from parallel
/// agents interleave.
#[async_trait]
pub trait StreamCallback: Send + Sync {
    async fn on_message(&self, message: StreamCallbackMessage);
}

#[async_trait]
impl<F> StreamCallback for F
where
    F: Fn(StreamCallbackMessage) + Send + Sync,
{
    async fn on_message(&self, message: StreamCallbackMessage) {
        self(message)
    }
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelCallback {
    sender: mpsc::UnboundedSender<StreamCallbackMessage>,
}

impl ChannelCallback {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamCallbackMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl StreamCallback for ChannelCallback {
    async fn on_message(&self, message: StreamCallbackMessage) {
        // A dropped receiver only means nobody is listening.
        let _ = self.sender.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn error_message(text: &str) -> StreamCallbackMessage {
        StreamCallbackMessage {
            task_id: "t".into(),
            agent_name: "a".into(),
            node_id: None,
            payload: CallbackPayload::Error { error: text.into() },
        }
    }

    #[tokio::test]
    async fn channel_callback_forwards_in_order() {
        let (callback, mut rx) = ChannelCallback::new();
        callback.on_message(error_message("one")).await;
        callback.on_message(error_message("two")).await;
        assert_eq!(rx.recv().await.unwrap(), error_message("one"));
        assert_eq!(rx.recv().await.unwrap(), error_message("two"));
    }

    #[tokio::test]
    async fn closures_are_callbacks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: Arc<dyn StreamCallback> = Arc::new(move |m: StreamCallbackMessage| {
            sink.lock().unwrap().push(m.payload.kind());
        });
        callback.on_message(error_message("x")).await;
        assert_eq!(*seen.lock().unwrap(), vec!["error"]);
    }

    #[tokio::test]
    async fn dropped_receiver_is_ignored() {
        let (callback, rx) = ChannelCallback::new();
        drop(rx);
        callback.on_message(error_message("lost")).await;
    }
}
