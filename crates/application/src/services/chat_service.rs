use std::sync::Arc;

use domain::{ConversationKey, Message, MessageBody, Timestamp, UserId};
use uuid::Uuid;

use crate::{
    broadcaster::{MessageBroadcast, MessageBroadcaster},
    conversation_locks::ConversationLocks,
    error::ApplicationError,
    repository::MessageRepository,
};

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub sender_id: Uuid,
    pub to: Uuid,
    pub body: String,
}

pub struct ChatServiceDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub broadcaster: Arc<dyn MessageBroadcaster>,
    pub locks: Arc<ConversationLocks>,
    /// 单页历史消息上限
    pub history_page_cap: u32,
}

/// 投递引擎：校验 → 持久化 → 广播。
pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    /// 发送一条私聊消息。
    ///
    /// 同一会话的持久化+广播整体串行；持久化失败不产生任何广播。
    /// 返回值即发送方收到的唯一确认，与组内有多少成员收到无关。
    pub async fn send(&self, request: SendMessageRequest) -> Result<Message, ApplicationError> {
        let sender = UserId::from(request.sender_id);
        let receiver = UserId::from(request.to);
        let key = ConversationKey::between(sender, receiver)?;
        let body = MessageBody::parse(request.body)?;

        let guard = self.deps.locks.acquire(key).await;

        let message = self
            .deps
            .message_repository
            .append(sender, receiver, body)
            .await?;

        // 广播失败不影响发送确认：消息已经落库，
        // 掉线成员靠下次进入会话时读历史补齐
        if let Err(err) = self
            .deps
            .broadcaster
            .broadcast(MessageBroadcast {
                key,
                message: message.clone(),
            })
            .await
        {
            tracing::warn!(error = %err, key = %key, "消息广播失败");
        }

        drop(guard);
        Ok(message)
    }

    /// 读取与某个用户之间的一页历史，按时间正序返回。
    pub async fn history(
        &self,
        me: Uuid,
        peer: Uuid,
        limit: u32,
        before: Option<Timestamp>,
    ) -> Result<Vec<Message>, ApplicationError> {
        let me = UserId::from(me);
        let peer = UserId::from(peer);
        // 复用会话键校验：拒绝与自己查询历史
        let _key = ConversationKey::between(me, peer)?;

        let limit = limit.min(self.deps.history_page_cap);
        let messages = self
            .deps
            .message_repository
            .list_between(me, peer, limit, before)
            .await?;
        Ok(messages)
    }
}
