use application::MessageRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Message, MessageBody, MessageId, RepositoryError, Timestamp, UserId};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{invalid_data, map_sqlx_err};

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    sender_id: Uuid,
    receiver_id: Uuid,
    body: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let body = MessageBody::parse(value.body).map_err(|err| invalid_data(err.to_string()))?;
        Message::new(
            MessageId::from(value.id),
            UserId::from(value.sender_id),
            UserId::from(value.receiver_id),
            body,
            value.created_at,
        )
        .map_err(|err| invalid_data(err.to_string()))
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn append(
        &self,
        sender: UserId,
        receiver: UserId,
        body: MessageBody,
    ) -> Result<Message, RepositoryError> {
        // 单条 INSERT 本身即事务：要么对后续读取完全可见，要么完全不可见
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (sender_id, receiver_id, body)
            VALUES ($1, $2, $3)
            RETURNING id, sender_id, receiver_id, body, created_at
            "#,
        )
        .bind(Uuid::from(sender))
        .bind(Uuid::from(receiver))
        .bind(body.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Message::try_from(record)
    }

    async fn list_between(
        &self,
        a: UserId,
        b: UserId,
        limit: u32,
        before: Option<Timestamp>,
    ) -> Result<Vec<Message>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, sender_id, receiver_id, body, created_at
            FROM messages
            WHERE LEAST(sender_id, receiver_id) = LEAST($1, $2)
              AND GREATEST(sender_id, receiver_id) = GREATEST($1, $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
        )
        .bind(Uuid::from(a))
        .bind(Uuid::from(b))
        .bind(before)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        // 同一时间戳以 id 决胜，保证分页顺序稳定；
        // 倒序取页，正序返回，便于客户端直接按时间渲染
        let mut messages = records
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }
}
