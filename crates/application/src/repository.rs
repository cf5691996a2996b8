use async_trait::async_trait;
use domain::{
    Message, MessageBody, RepositoryError, Timestamp, User, UserId, Username,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> Result<User, RepositoryError>;
    async fn update(&self, user: User) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_username(&self, username: Username) -> Result<Option<User>, RepositoryError>;
    // 除指定用户外的所有用户，按展示名排序
    async fn list_others(&self, excluding: UserId) -> Result<Vec<User>, RepositoryError>;
}

/// 消息存储网关。
///
/// 核心触达持久化状态的唯一入口：追加必须原子，追加成功的消息
/// 对后续读取完全可见。标识与时间戳由存储层分配。
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(
        &self,
        sender: UserId,
        receiver: UserId,
        body: MessageBody,
    ) -> Result<Message, RepositoryError>;

    /// 读取两个用户之间的一页历史，`created_at < before`（如提供），
    /// 内部按时间倒序取 `limit` 条，返回时按时间正序排列。
    async fn list_between(
        &self,
        a: UserId,
        b: UserId,
        limit: u32,
        before: Option<Timestamp>,
    ) -> Result<Vec<Message>, RepositoryError>;
}
