use crate::domain::entities::VoteState;
use crate::domain::value_objects::{ContentId, ContentRef, UserId};
use crate::shared::error::AppError;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};

const DEFAULT_SUBSCRIBER_BUFFER: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Topic {
    Thread(ContentId),
    Category(String),
    User(UserId),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Thread(id) => write!(f, "thread:{id}"),
            Topic::Category(name) => write!(f, "category:{name}"),
            Topic::User(id) => write!(f, "user:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForumEvent {
    VoteCast {
        content: ContentRef,
        voter_id: UserId,
        new_state: VoteState,
        upvotes: u32,
        downvotes: u32,
    },
    CommentCreated {
        thread_id: ContentId,
        comment_id: ContentId,
        parent_id: Option<ContentId>,
        author_id: UserId,
        depth: u32,
    },
    CommentEdited {
        thread_id: ContentId,
        comment_id: ContentId,
    },
    CommentRemoved {
        thread_id: ContentId,
        comment_id: ContentId,
        hard: bool,
    },
    LevelUp {
        user_id: UserId,
        level: u8,
    },
}

impl ForumEvent {
    /// 配信層に渡す JSON 表現。`type` フィールドでイベント種別を区別する
    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }
}

struct Subscriber {
    topic: Topic,
    sender: mpsc::Sender<ForumEvent>,
}

/// 購読者を ID で管理する。呼び出し側が所有し、グローバル状態は持たない
#[derive(Clone)]
pub struct SubscriptionManager {
    subscribers: Arc<RwLock<HashMap<u64, Subscriber>>>,
    next_subscription_id: Arc<AtomicU64>,
    buffer: usize,
}

pub struct Subscription {
    pub id: u64,
    pub topic: Topic,
    receiver: mpsc::Receiver<ForumEvent>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<ForumEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ForumEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_SUBSCRIBER_BUFFER)
    }

    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_subscription_id: Arc::new(AtomicU64::new(1)),
            buffer: buffer.max(1),
        }
    }

    /// 同じトピックを複数回開くと独立した購読になる
    pub async fn open(&self, topic: Topic) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);

        self.subscribers.write().await.insert(
            id,
            Subscriber {
                topic: topic.clone(),
                sender: tx,
            },
        );
        tracing::debug!(target: "forum::subscriptions", subscription_id = id, %topic, "subscription opened");

        Subscription {
            id,
            topic,
            receiver: rx,
        }
    }

    pub async fn close(&self, subscription_id: u64) -> bool {
        let removed = self
            .subscribers
            .write()
            .await
            .remove(&subscription_id)
            .is_some();
        if removed {
            tracing::debug!(target: "forum::subscriptions", subscription_id, "subscription closed");
        }
        removed
    }

    /// トピックの購読をすべて閉じ、閉じた数を返す
    pub async fn close_topic(&self, topic: &Topic) -> usize {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|_, subscriber| &subscriber.topic != topic);
        before - subscribers.len()
    }

    /// 配信できた購読者数を返す。閉じた受信側はここで取り除く
    pub async fn publish(&self, topic: &Topic, event: ForumEvent) -> usize {
        let targets: Vec<(u64, mpsc::Sender<ForumEvent>)> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .iter()
                .filter(|(_, subscriber)| &subscriber.topic == topic)
                .map(|(&id, subscriber)| (id, subscriber.sender.clone()))
                .collect()
        };
        if targets.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        let mut closed_ids = Vec::new();
        for (id, sender) in targets {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        target: "forum::subscriptions",
                        subscription_id = id,
                        %topic,
                        "subscriber buffer full, event dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed_ids.push(id),
            }
        }

        if !closed_ids.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in closed_ids {
                subscribers.remove(&id);
            }
        }

        delivered
    }

    pub async fn active_topics(&self) -> Vec<Topic> {
        let subscribers = self.subscribers.read().await;
        let mut topics: Vec<Topic> = Vec::new();
        for subscriber in subscribers.values() {
            if !topics.contains(&subscriber.topic) {
                topics.push(subscriber.topic.clone());
            }
        }
        topics
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}
