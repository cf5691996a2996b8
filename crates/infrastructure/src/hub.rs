//! 进程内实时连接中枢。
//!
//! 管理全部在线连接、会话组成员关系和消息下发。
//! 单进程持有全部实时状态；跨进程扩展需要外部 Pub/Sub 骨干，不在此实现。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use application::{
    BroadcastError, ConversationLocks, MessageBroadcast, MessageBroadcaster, MessageDto,
};
use async_trait::async_trait;
use domain::{ConnectionId, ConversationKey, UserId};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// 推送给客户端连接的事件。
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum HubEvent {
    /// 新消息，投递给会话组的全部成员（包含发送者自己的连接）
    #[serde(rename = "message:new")]
    MessageNew { message: MessageDto },
    /// 输入状态信号，只投递给发送连接以外的成员，从不持久化
    #[serde(rename = "typing")]
    Typing { from: Uuid, is_typing: bool },
}

struct ConnectionEntry {
    user_id: UserId,
    /// 一个连接同一时间最多加入一个会话；再次 join 会隐式离开之前的会话
    joined: Option<ConversationKey>,
    outbox: mpsc::UnboundedSender<HubEvent>,
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    /// 按用户索引的连接集合；一个用户可以有多个活跃连接
    user_index: HashMap<UserId, HashSet<ConnectionId>>,
    groups: HashMap<ConversationKey, HashSet<ConnectionId>>,
}

/// 连接生命周期管理器 + 会话组路由 + 广播下发。
pub struct ChatHub {
    state: RwLock<HubState>,
    locks: Arc<ConversationLocks>,
}

impl ChatHub {
    pub fn new(locks: Arc<ConversationLocks>) -> Self {
        Self {
            state: RwLock::new(HubState::default()),
            locks,
        }
    }

    /// 注册一个已通过认证的连接，返回连接标识和事件接收端。
    ///
    /// 未认证的连接不允许到达这里：调用方必须先完成身份校验。
    pub async fn register(&self, user_id: UserId) -> (ConnectionId, mpsc::UnboundedReceiver<HubEvent>) {
        let connection_id = ConnectionId::generate();
        let (outbox, rx) = mpsc::unbounded_channel();

        let mut state = self.state.write().await;
        state.connections.insert(
            connection_id,
            ConnectionEntry {
                user_id,
                joined: None,
                outbox,
            },
        );
        state
            .user_index
            .entry(user_id)
            .or_default()
            .insert(connection_id);
        drop(state);

        tracing::info!(connection_id = %connection_id, user_id = %user_id, "连接已注册");
        (connection_id, rx)
    }

    /// 注销连接：从所属会话组和用户索引中移除。
    ///
    /// 清理是无条件的（从未加入会话的连接同样适用），重复注销是空操作。
    pub async fn unregister(&self, connection_id: ConnectionId) {
        let mut state = self.state.write().await;
        let Some(entry) = state.connections.remove(&connection_id) else {
            return;
        };

        if let Some(connections) = state.user_index.get_mut(&entry.user_id) {
            connections.remove(&connection_id);
            if connections.is_empty() {
                state.user_index.remove(&entry.user_id);
            }
        }

        if let Some(key) = entry.joined {
            Self::remove_from_group(&mut state, &self.locks, connection_id, key);
        }
        drop(state);

        tracing::info!(connection_id = %connection_id, user_id = %entry.user_id, "连接已注销");
    }

    /// 把连接加入指定会话组；若已加入其他会话则先隐式离开。幂等。
    pub async fn join(&self, connection_id: ConnectionId, key: ConversationKey) {
        let mut state = self.state.write().await;
        let Some(entry) = state.connections.get_mut(&connection_id) else {
            return;
        };

        let previous = entry.joined;
        if previous == Some(key) {
            return;
        }
        entry.joined = Some(key);

        if let Some(previous) = previous {
            Self::remove_from_group(&mut state, &self.locks, connection_id, previous);
        }
        state.groups.entry(key).or_default().insert(connection_id);

        tracing::debug!(connection_id = %connection_id, key = %key, "加入会话组");
    }

    /// 把连接从指定会话组移除；不是成员时为空操作。幂等。
    pub async fn leave(&self, connection_id: ConnectionId, key: ConversationKey) {
        let mut state = self.state.write().await;
        let Some(entry) = state.connections.get_mut(&connection_id) else {
            return;
        };
        if entry.joined != Some(key) {
            return;
        }
        entry.joined = None;
        Self::remove_from_group(&mut state, &self.locks, connection_id, key);

        tracing::debug!(connection_id = %connection_id, key = %key, "离开会话组");
    }

    /// 向会话组的其他成员转发输入状态信号；发送连接自身被排除。
    pub async fn relay_typing(
        &self,
        connection_id: ConnectionId,
        key: ConversationKey,
        is_typing: bool,
    ) {
        let state = self.state.read().await;
        let Some(sender) = state.connections.get(&connection_id) else {
            return;
        };
        let event = HubEvent::Typing {
            from: Uuid::from(sender.user_id),
            is_typing,
        };

        let Some(members) = state.groups.get(&key) else {
            return;
        };
        for member in members {
            if *member == connection_id {
                continue;
            }
            if let Some(entry) = state.connections.get(member) {
                // 对端掉线只影响它自己
                let _ = entry.outbox.send(event.clone());
            }
        }
    }

    /// 会话组当前的连接数。
    pub async fn group_size(&self, key: ConversationKey) -> usize {
        let state = self.state.read().await;
        state.groups.get(&key).map_or(0, HashSet::len)
    }

    fn remove_from_group(
        state: &mut HubState,
        locks: &ConversationLocks,
        connection_id: ConnectionId,
        key: ConversationKey,
    ) {
        if let Some(members) = state.groups.get_mut(&key) {
            members.remove(&connection_id);
            if members.is_empty() {
                state.groups.remove(&key);
                // 会话组清空后顺带回收它的发送串行化锁
                locks.prune(&key);
            }
        }
    }
}

#[async_trait]
impl MessageBroadcaster for ChatHub {
    /// 把已持久化的消息投递给会话组全部成员。
    ///
    /// 成员快照在读锁内获取：广播进行中注销的连接不会收到投递，
    /// 也不会破坏迭代。逐成员投递相互独立，尽力而为。
    async fn broadcast(&self, payload: MessageBroadcast) -> Result<(), BroadcastError> {
        let event = HubEvent::MessageNew {
            message: MessageDto::from(&payload.message),
        };

        let state = self.state.read().await;
        let Some(members) = state.groups.get(&payload.key) else {
            // 没有在线成员不算失败：消息已经落库，靠历史读回补齐
            return Ok(());
        };
        for member in members {
            if let Some(entry) = state.connections.get(member) {
                let _ = entry.outbox.send(event.clone());
            }
        }
        Ok(())
    }
}
