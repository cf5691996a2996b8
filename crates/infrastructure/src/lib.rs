//! 基础设施层。
//!
//! 提供应用层抽象的具体实现：PostgreSQL 存储、bcrypt 密码哈希，
//! 以及进程内的实时连接中枢。

pub mod db;
pub mod hub;
pub mod password;
pub mod repositories;

pub use db::create_pg_pool;
pub use hub::{ChatHub, HubEvent};
pub use password::BcryptPasswordHasher;
pub use repositories::{PgMessageRepository, PgUserRepository};
