//! 服务单元测试共用的内存假件。

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Duration;
use domain::{
    Message, MessageBody, MessageId, PasswordHash, RepositoryError, Timestamp, User, UserId,
    Username,
};
use uuid::Uuid;

use crate::broadcaster::{BroadcastError, MessageBroadcast, MessageBroadcaster};
use crate::clock::Clock;
use crate::password::{PasswordHasher, PasswordHasherError};
use crate::repository::{MessageRepository, UserRepository};

pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.username == user.username) {
            return Err(RepositoryError::Conflict);
        }
        users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.lock().unwrap();
        let slot = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = user.clone();
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: Username) -> Result<Option<User>, RepositoryError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn list_others(&self, excluding: UserId) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.lock().unwrap();
        let mut others: Vec<User> = users.iter().filter(|u| u.id != excluding).cloned().collect();
        others.sort_by(|a, b| a.display_name.as_str().cmp(b.display_name.as_str()));
        Ok(others)
    }
}

/// 按追加顺序分配单调递增时间戳的消息存储。
pub struct InMemoryMessageRepository {
    messages: Mutex<Vec<Message>>,
    base: Timestamp,
    seq: AtomicI64,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            base: chrono::Utc::now(),
            seq: AtomicI64::new(0),
        }
    }

    pub fn stored(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    /// 直接写入一条构造好的消息，用于制造特定时间戳（如同刻消息）。
    pub fn seed(&self, message: Message) {
        self.messages.lock().unwrap().push(message);
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(
        &self,
        sender: UserId,
        receiver: UserId,
        body: MessageBody,
    ) -> Result<Message, RepositoryError> {
        let n = self.seq.fetch_add(1, Ordering::SeqCst);
        let message = Message::new(
            MessageId::from(Uuid::new_v4()),
            sender,
            receiver,
            body,
            self.base + Duration::milliseconds(n),
        )
        .map_err(|err| RepositoryError::storage(err.to_string()))?;
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn list_between(
        &self,
        a: UserId,
        b: UserId,
        limit: u32,
        before: Option<Timestamp>,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.lock().unwrap();
        let mut page: Vec<Message> = messages
            .iter()
            .filter(|m| {
                (m.sender_id == a && m.receiver_id == b)
                    || (m.sender_id == b && m.receiver_id == a)
            })
            .filter(|m| before.map_or(true, |cutoff| m.created_at < cutoff))
            .cloned()
            .collect();
        // 倒序截取最近 limit 条，再正序返回；同刻消息以 id 决胜
        page.sort_by_key(|m| std::cmp::Reverse((m.created_at, m.id)));
        page.truncate(limit as usize);
        page.reverse();
        Ok(page)
    }
}

/// 永远失败的消息存储，用于验证失败路径不产生广播。
pub struct FailingMessageRepository;

#[async_trait]
impl MessageRepository for FailingMessageRepository {
    async fn append(
        &self,
        _sender: UserId,
        _receiver: UserId,
        _body: MessageBody,
    ) -> Result<Message, RepositoryError> {
        Err(RepositoryError::storage("database unavailable"))
    }

    async fn list_between(
        &self,
        _a: UserId,
        _b: UserId,
        _limit: u32,
        _before: Option<Timestamp>,
    ) -> Result<Vec<Message>, RepositoryError> {
        Err(RepositoryError::storage("database unavailable"))
    }
}

pub struct RecordingBroadcaster {
    sent: Mutex<Vec<MessageBroadcast>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn broadcasts(&self) -> Vec<MessageBroadcast> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageBroadcaster for RecordingBroadcaster {
    async fn broadcast(&self, payload: MessageBroadcast) -> Result<(), BroadcastError> {
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }
}

/// 永远失败的广播假件，用于验证广播失败不影响发送结果。
pub struct FailingBroadcaster;

#[async_trait]
impl MessageBroadcaster for FailingBroadcaster {
    async fn broadcast(&self, _payload: MessageBroadcast) -> Result<(), BroadcastError> {
        Err(BroadcastError::failed("hub unavailable"))
    }
}

/// 不做真实哈希的密码假件。
pub struct PlainPasswordHasher;

#[async_trait]
impl PasswordHasher for PlainPasswordHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        PasswordHash::new(format!("hashed::{plaintext}"))
            .map_err(|err| PasswordHasherError::hash_error(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        Ok(hashed.as_str() == format!("hashed::{plaintext}"))
    }
}

pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
