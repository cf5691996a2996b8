//! 密码哈希抽象。
//!
//! 核心只依赖这里的特征；具体算法由基础设施层提供。

use async_trait::async_trait;
use domain::PasswordHash;
use thiserror::Error;

/// 哈希后端错误。
///
/// 密码不匹配不是错误：`verify` 用 `Ok(false)` 表达不匹配，
/// `Err` 只表示后端本身失败。
#[derive(Debug, Error)]
pub enum PasswordHasherError {
    #[error("密码哈希失败: {message}")]
    Hash { message: String },
    #[error("密码校验失败: {message}")]
    Verify { message: String },
}

impl PasswordHasherError {
    pub fn hash_error(message: impl Into<String>) -> Self {
        Self::Hash {
            message: message.into(),
        }
    }

    pub fn verify_error(message: impl Into<String>) -> Self {
        Self::Verify {
            message: message.into(),
        }
    }
}

/// 密码哈希与校验。
///
/// 实现应把 CPU 密集的哈希运算移出异步执行器，明文不做任何保留。
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// 对明文做慢哈希，返回可直接入库的哈希值。
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError>;

    /// 校验明文与既有哈希是否匹配。
    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError>;
}
