//! 投递引擎单元测试
//!
//! 覆盖发送校验、持久化失败路径、广播顺序和历史分页。

use std::sync::Arc;

use domain::DomainError;
use uuid::Uuid;

use crate::conversation_locks::ConversationLocks;
use crate::error::ApplicationError;
use crate::services::chat_service::{ChatService, ChatServiceDependencies, SendMessageRequest};
use crate::services::test_support::{
    FailingBroadcaster, FailingMessageRepository, InMemoryMessageRepository, RecordingBroadcaster,
};

struct Harness {
    service: ChatService,
    repository: Arc<InMemoryMessageRepository>,
    broadcaster: Arc<RecordingBroadcaster>,
}

fn harness() -> Harness {
    let repository = Arc::new(InMemoryMessageRepository::new());
    let broadcaster = Arc::new(RecordingBroadcaster::new());
    let service = ChatService::new(ChatServiceDependencies {
        message_repository: repository.clone(),
        broadcaster: broadcaster.clone(),
        locks: Arc::new(ConversationLocks::new()),
        history_page_cap: 200,
    });
    Harness {
        service,
        repository,
        broadcaster,
    }
}

fn uid(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

#[tokio::test]
async fn send_persists_then_broadcasts() {
    let h = harness();

    let message = h
        .service
        .send(SendMessageRequest {
            sender_id: uid(7),
            to: uid(12),
            body: "  hi \n".to_string(),
        })
        .await
        .expect("send");

    // 正文在持久化前被裁剪
    assert_eq!(message.body.as_str(), "hi");
    assert_eq!(Uuid::from(message.sender_id), uid(7));
    assert_eq!(Uuid::from(message.receiver_id), uid(12));

    let stored = h.repository.stored();
    assert_eq!(stored.len(), 1);

    let broadcasts = h.broadcaster.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(broadcasts[0].message, stored[0]);
}

#[tokio::test]
async fn empty_body_never_persists_nor_broadcasts() {
    let h = harness();

    for body in ["", "   ", "\t\n "] {
        let result = h
            .service
            .send(SendMessageRequest {
                sender_id: uid(1),
                to: uid(2),
                body: body.to_string(),
            })
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::Domain(DomainError::EmptyBody))
        ));
    }

    assert!(h.repository.stored().is_empty());
    assert!(h.broadcaster.broadcasts().is_empty());
}

#[tokio::test]
async fn send_to_self_is_rejected() {
    let h = harness();

    let result = h
        .service
        .send(SendMessageRequest {
            sender_id: uid(5),
            to: uid(5),
            body: "hello".to_string(),
        })
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::SelfConversation))
    ));
    assert!(h.repository.stored().is_empty());
}

#[tokio::test]
async fn persist_failure_produces_no_broadcast() {
    let broadcaster = Arc::new(RecordingBroadcaster::new());
    let service = ChatService::new(ChatServiceDependencies {
        message_repository: Arc::new(FailingMessageRepository),
        broadcaster: broadcaster.clone(),
        locks: Arc::new(ConversationLocks::new()),
        history_page_cap: 200,
    });

    let result = service
        .send(SendMessageRequest {
            sender_id: uid(1),
            to: uid(2),
            body: "hello".to_string(),
        })
        .await;

    assert!(matches!(result, Err(ApplicationError::Repository(_))));
    assert!(broadcaster.broadcasts().is_empty());
}

#[tokio::test]
async fn broadcast_failure_does_not_fail_the_send() {
    let repository = Arc::new(InMemoryMessageRepository::new());
    let service = ChatService::new(ChatServiceDependencies {
        message_repository: repository.clone(),
        broadcaster: Arc::new(FailingBroadcaster),
        locks: Arc::new(ConversationLocks::new()),
        history_page_cap: 200,
    });

    // 消息已落库，广播失败不传出：发送方仍拿到成功确认
    let message = service
        .send(SendMessageRequest {
            sender_id: uid(1),
            to: uid(2),
            body: "hello".to_string(),
        })
        .await
        .expect("send");

    assert_eq!(message.body.as_str(), "hello");
    assert_eq!(repository.stored().len(), 1);
}

#[tokio::test]
async fn sequential_sends_broadcast_in_order() {
    let h = harness();

    for n in 0..5 {
        h.service
            .send(SendMessageRequest {
                sender_id: uid(7),
                to: uid(12),
                body: format!("msg-{n}"),
            })
            .await
            .expect("send");
    }

    let broadcasts = h.broadcaster.broadcasts();
    assert_eq!(broadcasts.len(), 5);
    for (n, broadcast) in broadcasts.iter().enumerate() {
        assert_eq!(broadcast.message.body.as_str(), format!("msg-{n}"));
    }
    // 观察到的时间戳单调不减
    for pair in broadcasts.windows(2) {
        assert!(pair[0].message.created_at <= pair[1].message.created_at);
    }
}

#[tokio::test]
async fn history_returns_oldest_first_page() {
    let h = harness();

    for n in 0..6 {
        h.service
            .send(SendMessageRequest {
                sender_id: uid(7),
                to: uid(12),
                body: format!("msg-{n}"),
            })
            .await
            .expect("send");
    }
    // 无关会话的消息不应出现
    h.service
        .send(SendMessageRequest {
            sender_id: uid(7),
            to: uid(99),
            body: "unrelated".to_string(),
        })
        .await
        .expect("send");

    let page = h.service.history(uid(12), uid(7), 4, None).await.expect("history");
    assert_eq!(page.len(), 4);
    // 最近 4 条，按时间正序
    let bodies: Vec<&str> = page.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, ["msg-2", "msg-3", "msg-4", "msg-5"]);
}

#[tokio::test]
async fn history_before_cursor_filters() {
    let h = harness();

    for n in 0..3 {
        h.service
            .send(SendMessageRequest {
                sender_id: uid(1),
                to: uid(2),
                body: format!("msg-{n}"),
            })
            .await
            .expect("send");
    }

    let all = h.service.history(uid(1), uid(2), 50, None).await.expect("history");
    let cutoff = all[2].created_at;

    let page = h
        .service
        .history(uid(1), uid(2), 50, Some(cutoff))
        .await
        .expect("history");
    let bodies: Vec<&str> = page.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, ["msg-0", "msg-1"]);
}

#[tokio::test]
async fn history_limit_is_capped() {
    let repository = Arc::new(InMemoryMessageRepository::new());
    let service = ChatService::new(ChatServiceDependencies {
        message_repository: repository.clone(),
        broadcaster: Arc::new(RecordingBroadcaster::new()),
        locks: Arc::new(ConversationLocks::new()),
        history_page_cap: 3,
    });

    for n in 0..5 {
        service
            .send(SendMessageRequest {
                sender_id: uid(1),
                to: uid(2),
                body: format!("msg-{n}"),
            })
            .await
            .expect("send");
    }

    let page = service.history(uid(1), uid(2), 100, None).await.expect("history");
    assert_eq!(page.len(), 3);
}

#[tokio::test]
async fn history_breaks_timestamp_ties_by_id() {
    use domain::{Message, MessageBody, MessageId, UserId};

    let repository = Arc::new(InMemoryMessageRepository::new());
    let service = ChatService::new(ChatServiceDependencies {
        message_repository: repository.clone(),
        broadcaster: Arc::new(RecordingBroadcaster::new()),
        locks: Arc::new(ConversationLocks::new()),
        history_page_cap: 200,
    });

    // 三条同刻消息，乱序写入
    let instant = chrono::Utc::now();
    for id in [2u128, 1, 3] {
        repository.seed(
            Message::new(
                MessageId::from(Uuid::from_u128(id)),
                UserId::from(uid(7)),
                UserId::from(uid(12)),
                MessageBody::parse(format!("msg-{id}")).unwrap(),
                instant,
            )
            .unwrap(),
        );
    }

    // 同刻消息以 id 决胜，分页顺序稳定
    let page = service.history(uid(7), uid(12), 50, None).await.expect("history");
    let bodies: Vec<&str> = page.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, ["msg-1", "msg-2", "msg-3"]);

    // 截取最近两条时，留下的是 id 较大的两条
    let page = service.history(uid(7), uid(12), 2, None).await.expect("history");
    let bodies: Vec<&str> = page.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, ["msg-2", "msg-3"]);
}

#[tokio::test]
async fn history_with_self_is_rejected() {
    let h = harness();
    let result = h.service.history(uid(3), uid(3), 50, None).await;
    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::SelfConversation))
    ));
}

#[tokio::test]
async fn scenario_send_then_history_has_single_message() {
    let h = harness();

    let sent = h
        .service
        .send(SendMessageRequest {
            sender_id: uid(7),
            to: uid(12),
            body: "hi".to_string(),
        })
        .await
        .expect("send");

    let page = h.service.history(uid(7), uid(12), 50, None).await.expect("history");
    assert_eq!(page.len(), 1);
    assert_eq!(page[0], sent);
    assert_eq!(page[0].body.as_str(), "hi");
}
