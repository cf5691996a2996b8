use crate::errors::DomainError;
use crate::value_objects::{ConversationKey, MessageBody, MessageId, Timestamp, UserId};

/// 一条已持久化的私聊消息。
///
/// 创建后不可变：标识与时间戳由持久化层分配，本核心不更新也不删除。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub body: MessageBody,
    pub created_at: Timestamp,
}

impl Message {
    pub fn new(
        id: MessageId,
        sender_id: UserId,
        receiver_id: UserId,
        body: MessageBody,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        if sender_id == receiver_id {
            return Err(DomainError::SelfConversation);
        }
        Ok(Self {
            id,
            sender_id,
            receiver_id,
            body,
            created_at,
        })
    }

    /// 该消息所属的规范会话键。
    pub fn conversation_key(&self) -> ConversationKey {
        // 构造时已保证双方不同
        ConversationKey::between(self.sender_id, self.receiver_id)
            .expect("message participants are distinct")
    }
}
