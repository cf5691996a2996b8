//! 领域错误定义

use thiserror::Error;

/// 领域规则错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("参数无效: {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 消息正文去除空白后为空
    #[error("消息内容不能为空")]
    EmptyBody,

    /// 会话双方不能是同一个用户
    #[error("不能与自己建立会话")]
    SelfConversation,

    #[error("用户已存在")]
    UserAlreadyExists,

    #[error("用户不存在")]
    UserNotFound,
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 存储层错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("记录不存在")]
    NotFound,

    #[error("记录冲突")]
    Conflict,

    #[error("存储错误: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
