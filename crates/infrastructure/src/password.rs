//! bcrypt 密码哈希实现。
//!
//! bcrypt 是故意昂贵的 CPU 运算，统一放到阻塞线程池执行，
//! 不占用异步执行器。

use application::{PasswordHasher, PasswordHasherError};
use async_trait::async_trait;
use bcrypt::DEFAULT_COST;
use domain::PasswordHash;

/// 基于 bcrypt 的密码哈希器；cost 未指定时使用 bcrypt 默认值。
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new(cost: Option<u32>) -> Self {
        Self {
            cost: cost.unwrap_or(DEFAULT_COST),
        }
    }

    /// 在阻塞线程池上执行 bcrypt 运算，任务被取消也作为错误返回。
    async fn offload<T>(
        task: impl FnOnce() -> Result<T, bcrypt::BcryptError> + Send + 'static,
    ) -> Result<T, String>
    where
        T: Send + 'static,
    {
        match tokio::task::spawn_blocking(task).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(err.to_string()),
            Err(err) => Err(err.to_string()),
        }
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl PasswordHasher for BcryptPasswordHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        let cost = self.cost;
        let plaintext = plaintext.to_owned();
        let hashed = Self::offload(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(|err| PasswordHasherError::hash_error(err))?;

        PasswordHash::new(hashed).map_err(|err| PasswordHasherError::hash_error(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        let plaintext = plaintext.to_owned();
        let hashed = hashed.as_str().to_owned();
        Self::offload(move || bcrypt::verify(plaintext, &hashed))
            .await
            .map_err(|err| PasswordHasherError::verify_error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 测试用最低 cost，避免拖慢测试
    const TEST_COST: u32 = 4;

    #[tokio::test]
    async fn hash_then_verify_round_trip() {
        let hasher = BcryptPasswordHasher::new(Some(TEST_COST));
        let hashed = hasher.hash("s3cret").await.unwrap();

        assert!(hasher.verify("s3cret", &hashed).await.unwrap());
        // 不匹配不是错误
        assert!(!hasher.verify("wrong", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn same_password_hashes_differently() {
        let hasher = BcryptPasswordHasher::new(Some(TEST_COST));
        let first = hasher.hash("s3cret").await.unwrap();
        let second = hasher.hash("s3cret").await.unwrap();
        // bcrypt 自带随机盐
        assert_ne!(first.as_str(), second.as_str());
    }
}
