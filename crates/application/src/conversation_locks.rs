//! 会话级串行化域。
//!
//! 同一个会话键上的持久化+广播必须整体串行执行，
//! 不同会话之间完全并行。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use domain::ConversationKey;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct ConversationLocks {
    locks: Mutex<HashMap<ConversationKey, Arc<AsyncMutex<()>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指定会话的发送串行化守卫。
    /// 守卫存活期间，该会话的其他发送会在此等待。
    pub async fn acquire(&self, key: ConversationKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("conversation lock map poisoned");
            Arc::clone(locks.entry(key).or_default())
        };
        lock.lock_owned().await
    }

    /// 移除空闲会话的锁条目；仍被持有的锁保持不动。
    pub fn prune(&self, key: &ConversationKey) {
        let mut locks = self.locks.lock().expect("conversation lock map poisoned");
        if let Some(lock) = locks.get(key) {
            // Arc 只剩 map 自己一份引用时，说明没有持有者也没有等待者
            if Arc::strong_count(lock) == 1 {
                locks.remove(key);
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.lock().expect("conversation lock map poisoned").len()
    }
}
