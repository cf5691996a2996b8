use async_trait::async_trait;
use domain::{ConversationKey, Message};
use thiserror::Error;

/// 一次已确认持久化的消息投递。
#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageBroadcast {
    pub key: ConversationKey,
    pub message: Message,
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 把持久化后的消息投递给会话组的所有在线成员（包含发送者自己的连接）。
///
/// 投递是尽力而为的：慢速或已断开的成员不会阻塞调用方，
/// 也不会影响其他成员的投递。
#[async_trait]
pub trait MessageBroadcaster: Send + Sync {
    async fn broadcast(&self, payload: MessageBroadcast) -> Result<(), BroadcastError>;
}
