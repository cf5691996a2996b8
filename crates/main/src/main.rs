//! 主应用程序入口
//!
//! 装配各层依赖并启动 Axum Web API 服务。

use std::sync::Arc;

use anyhow::Context;
use application::{
    ChatService, ChatServiceDependencies, ConversationLocks, SystemClock, UserService,
    UserServiceDependencies,
};
use config::AppConfig;
use infrastructure::{
    create_pg_pool, BcryptPasswordHasher, ChatHub, PgMessageRepository, PgUserRepository,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 读取并校验配置
    let config = AppConfig::from_env_with_defaults();
    config.validate().context("配置校验失败")?;

    tracing::info!(
        database = config.database.url.split('@').last().unwrap_or("unknown"),
        "连接数据库"
    );

    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections)
        .await
        .context("数据库连接失败")?;

    // 运行迁移
    sqlx::migrate!("../../migrations")
        .run(&pg_pool)
        .await
        .context("数据库迁移失败")?;

    // 基础设施适配器
    let user_repository = Arc::new(PgUserRepository::new(pg_pool.clone()));
    let message_repository = Arc::new(PgMessageRepository::new(pg_pool));
    let password_hasher = Arc::new(BcryptPasswordHasher::new(config.server.bcrypt_cost));
    let clock = Arc::new(SystemClock::default());

    // 会话锁在投递引擎和连接中枢之间共享
    let locks = Arc::new(ConversationLocks::new());
    let hub = Arc::new(ChatHub::new(locks.clone()));

    // 应用层服务
    let user_service = UserService::new(UserServiceDependencies {
        user_repository,
        password_hasher,
        clock,
    });

    let chat_service = ChatService::new(ChatServiceDependencies {
        message_repository,
        broadcaster: hub.clone(),
        locks,
        history_page_cap: config.realtime.history_page_cap,
    });

    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));

    let state = AppState::new(
        Arc::new(user_service),
        Arc::new(chat_service),
        hub,
        jwt_service,
    );

    // 启动 Web 服务器
    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("无法监听 {addr}"))?;

    tracing::info!(addr = %addr, "私信服务器已启动");
    axum::serve(listener, app).await?;

    Ok(())
}
