use model::{LiveMessage, ShoppingList};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex,
};

pub type SubscriberId = u64;

/// Updates a viewer may have pending before it is dropped as lagging
pub const VIEWER_QUEUE_SIZE: usize = 32;

/// A live viewer's end of the registry
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<String>,
}

/// Registry of live viewers. One instance is shared by the whole server.
///
/// Updates are fire-and-forget: nothing is queued for viewers that connect
/// later, so a (re)connecting viewer has to fetch the list itself. A viewer
/// that falls [`VIEWER_QUEUE_SIZE`] updates behind is dropped and its
/// channel closes.
pub struct NotificationHandler {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl NotificationHandler {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(VIEWER_QUEUE_SIZE);

        self.subscribers.lock().await.insert(id, sender);
        trace!("subscriber {} registered", id);

        Subscription { id, receiver }
    }

    pub async fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.lock().await.remove(&id).is_some() {
            trace!("subscriber {} unregistered", id);
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Sends the whole list to every subscriber, dropping those that are gone or lagging
    pub async fn publish_update(&self, list: &ShoppingList) {
        let message = match serde_json::to_string(&LiveMessage::Update(list)) {
            Ok(message) => message,
            Err(error) => {
                error!("failed to serialize update message: {}", error);
                return;
            }
        };

        let snapshot: Vec<_> = self
            .subscribers
            .lock()
            .await
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        trace!("publishing update to {} subscribers", snapshot.len());

        let dropped: Vec<(SubscriberId, &str)> = snapshot
            .into_iter()
            .filter_map(|(id, sender)| match sender.try_send(message.clone()) {
                Ok(()) => None,
                Err(TrySendError::Full(_)) => Some((id, "it is lagging behind")),
                Err(TrySendError::Closed(_)) => Some((id, "its connection is closed")),
            })
            .collect();

        if !dropped.is_empty() {
            let mut subscribers = self.subscribers.lock().await;
            for (id, reason) in dropped {
                warn!("dropping subscriber {}, {}", id, reason);
                subscribers.remove(&id);
            }
        }
    }
}
