//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，处理输入校验、投递顺序、
//! 以及对外部适配器（例如密码哈希、消息广播、存储）的抽象。

pub mod broadcaster;
pub mod clock;
pub mod conversation_locks;
pub mod dto;
pub mod error;
pub mod password;
pub mod repository;
pub mod services;

pub use broadcaster::{BroadcastError, MessageBroadcast, MessageBroadcaster};
pub use clock::{Clock, SystemClock};
pub use conversation_locks::ConversationLocks;
pub use dto::{MessageDto, UserDto};
pub use error::ApplicationError;
pub use password::{PasswordHasher, PasswordHasherError};
pub use repository::{MessageRepository, UserRepository};
pub use services::{
    ChatService, ChatServiceDependencies, RegisterUserRequest, SendMessageRequest,
    UpdateProfileRequest, UserService, UserServiceDependencies,
};
