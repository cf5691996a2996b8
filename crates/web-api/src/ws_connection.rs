use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use application::{ApplicationError, MessageDto, SendMessageRequest};
use domain::{ConnectionId, ConversationKey, DomainError, UserId};

use crate::state::AppState;

/// 客户端经由 WebSocket 发来的帧。
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientFrame {
    /// 加入与某个用户的会话；一个连接同一时间最多在一个会话中
    #[serde(rename = "dm:join")]
    Join { peer_id: Uuid },
    /// 离开与某个用户的会话
    #[serde(rename = "dm:leave")]
    Leave { peer_id: Uuid },
    /// 发送消息，服务端以 ack 帧回应
    #[serde(rename = "message:send")]
    Send { to: Uuid, body: String },
    /// 输入状态信号，只转发、不持久化、无 ack
    #[serde(rename = "typing")]
    Typing { to: Uuid, is_typing: bool },
}

/// 对 message:send 的回执帧。
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "ack")]
struct AckFrame {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<MessageDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

impl AckFrame {
    fn ok(message: MessageDto) -> Self {
        Self {
            ok: true,
            message: Some(message),
            error: None,
        }
    }

    fn err(code: &'static str) -> Self {
        Self {
            ok: false,
            message: None,
            error: Some(code),
        }
    }
}

/// WebSocket 写操作命令
///
/// 使用命令模式统一管理所有对 WebSocket sender 的写操作
#[derive(Debug)]
enum WsCommand {
    SendText(String),
    SendPong(Vec<u8>),
}

/// 单个 WebSocket 连接的生命周期。
///
/// 升级前身份校验已经完成；这里负责在连接中枢注册连接、
/// 转发下行事件、处理客户端帧，并在断开时无条件注销。
pub struct WsConnection {
    state: AppState,
    user_id: UserId,
}

impl WsConnection {
    pub fn new(state: AppState, user_id: Uuid) -> Self {
        Self {
            state,
            user_id: UserId::from(user_id),
        }
    }

    /// 运行连接主循环，直到任一方向的任务结束。
    pub async fn run(self, socket: WebSocket) {
        let (connection_id, mut outbox_rx) = self.state.hub.register(self.user_id).await;
        tracing::info!(user_id = %self.user_id, connection_id = %connection_id, "WebSocket 连接已建立");

        let (mut sender, mut incoming) = socket.split();

        // 创建 mpsc channel 来解耦对 sender 的访问
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

        // 发送任务：统一处理所有对 WebSocket sender 的写操作
        let send_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(cmd) = cmd_rx.recv() => {
                        match cmd {
                            WsCommand::SendText(text) => {
                                if sender.send(WsMessage::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                            WsCommand::SendPong(data) => {
                                if sender.send(WsMessage::Pong(data.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    // 来自连接中枢的下行事件
                    event = outbox_rx.recv() => {
                        let Some(event) = event else { break };
                        let payload = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(err) => {
                                tracing::warn!(error = %err, "下行事件序列化失败");
                                continue;
                            }
                        };
                        if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        // 接收任务：处理来自客户端的帧
        let recv_task = {
            let state = self.state.clone();
            let user_id = self.user_id;
            tokio::spawn(async move {
                while let Some(Ok(message)) = incoming.next().await {
                    let done =
                        Self::handle_incoming(&state, connection_id, user_id, &cmd_tx, message)
                            .await;
                    if done.is_err() {
                        break;
                    }
                }
            })
        };

        // 任意一个任务结束即视为连接断开
        tokio::select! {
            _ = send_task => {}
            _ = recv_task => {}
        }

        // 断开时无条件注销：清理会话组成员关系和用户索引
        self.state.hub.unregister(connection_id).await;
        tracing::info!(user_id = %self.user_id, connection_id = %connection_id, "WebSocket 连接已断开");
    }

    async fn handle_incoming(
        state: &AppState,
        connection_id: ConnectionId,
        user_id: UserId,
        cmd_tx: &mpsc::Sender<WsCommand>,
        message: WsMessage,
    ) -> Result<(), ()> {
        match message {
            WsMessage::Close(_) => return Err(()),
            WsMessage::Ping(data) => {
                if cmd_tx
                    .send(WsCommand::SendPong(data.to_vec()))
                    .await
                    .is_err()
                {
                    return Err(());
                }
            }
            WsMessage::Pong(_) => {}
            WsMessage::Binary(_) => {
                tracing::debug!(user_id = %user_id, "忽略二进制帧");
            }
            WsMessage::Text(text) => {
                let frame = match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::debug!(user_id = %user_id, error = %err, "忽略无法解析的帧");
                        return Ok(());
                    }
                };
                Self::handle_frame(state, connection_id, user_id, cmd_tx, frame).await?;
            }
        }
        Ok(())
    }

    async fn handle_frame(
        state: &AppState,
        connection_id: ConnectionId,
        user_id: UserId,
        cmd_tx: &mpsc::Sender<WsCommand>,
        frame: ClientFrame,
    ) -> Result<(), ()> {
        match frame {
            ClientFrame::Join { peer_id } => {
                match ConversationKey::between(user_id, UserId::from(peer_id)) {
                    Ok(key) => state.hub.join(connection_id, key).await,
                    Err(err) => {
                        tracing::warn!(user_id = %user_id, error = %err, "加入会话被拒绝");
                    }
                }
            }
            ClientFrame::Leave { peer_id } => {
                match ConversationKey::between(user_id, UserId::from(peer_id)) {
                    Ok(key) => state.hub.leave(connection_id, key).await,
                    Err(err) => {
                        tracing::warn!(user_id = %user_id, error = %err, "离开会话被拒绝");
                    }
                }
            }
            ClientFrame::Send { to, body } => {
                let result = state
                    .chat_service
                    .send(SendMessageRequest {
                        sender_id: Uuid::from(user_id),
                        to,
                        body,
                    })
                    .await;

                let ack = match result {
                    Ok(message) => AckFrame::ok(MessageDto::from(&message)),
                    Err(err) => {
                        tracing::warn!(user_id = %user_id, error = %err, "消息发送失败");
                        AckFrame::err(ack_error_code(&err))
                    }
                };
                Self::send_ack(cmd_tx, ack).await?;
            }
            ClientFrame::Typing { to, is_typing } => {
                match ConversationKey::between(user_id, UserId::from(to)) {
                    Ok(key) => state.hub.relay_typing(connection_id, key, is_typing).await,
                    Err(err) => {
                        tracing::debug!(user_id = %user_id, error = %err, "忽略无效的输入状态信号");
                    }
                }
            }
        }
        Ok(())
    }

    async fn send_ack(cmd_tx: &mpsc::Sender<WsCommand>, ack: AckFrame) -> Result<(), ()> {
        let payload = match serde_json::to_string(&ack) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(error = %err, "ack 帧序列化失败");
                return Ok(());
            }
        };
        cmd_tx
            .send(WsCommand::SendText(payload))
            .await
            .map_err(|_| ())
    }
}

fn ack_error_code(error: &ApplicationError) -> &'static str {
    match error {
        ApplicationError::Domain(DomainError::EmptyBody) => "empty-body",
        ApplicationError::Domain(DomainError::SelfConversation) => "self-conversation",
        ApplicationError::Domain(DomainError::InvalidArgument { .. }) => "invalid-argument",
        ApplicationError::Domain(DomainError::UserNotFound) => "user-not-found",
        ApplicationError::Domain(DomainError::UserAlreadyExists) => "conflict",
        ApplicationError::Repository(_) => "persist-failed",
        // 广播失败不会从 send 传出（消息已落库，靠历史读回补齐），
        // 这里只为穷尽匹配兜底
        ApplicationError::Broadcast(_)
        | ApplicationError::Password(_)
        | ApplicationError::Authentication => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn client_frames_use_wire_names() {
        let peer = Uuid::new_v4();

        let frame: ClientFrame =
            serde_json::from_value(json!({ "type": "dm:join", "peer_id": peer }))
                .expect("join frame");
        assert!(matches!(frame, ClientFrame::Join { peer_id } if peer_id == peer));

        let frame: ClientFrame =
            serde_json::from_value(json!({ "type": "dm:leave", "peer_id": peer }))
                .expect("leave frame");
        assert!(matches!(frame, ClientFrame::Leave { peer_id } if peer_id == peer));

        let frame: ClientFrame =
            serde_json::from_value(json!({ "type": "message:send", "to": peer, "body": "hi" }))
                .expect("send frame");
        assert!(matches!(frame, ClientFrame::Send { to, ref body } if to == peer && body == "hi"));

        let frame: ClientFrame =
            serde_json::from_value(json!({ "type": "typing", "to": peer, "is_typing": true }))
                .expect("typing frame");
        assert!(matches!(frame, ClientFrame::Typing { to, is_typing } if to == peer && is_typing));
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        let result = serde_json::from_value::<ClientFrame>(json!({ "type": "room:create" }));
        assert!(result.is_err());
    }

    #[test]
    fn ok_ack_carries_message_and_omits_error() {
        let dto = MessageDto {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            body: "hello".to_string(),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(AckFrame::ok(dto)).expect("serialize ack");

        assert_eq!(value["type"], "ack");
        assert_eq!(value["ok"], true);
        assert_eq!(value["message"]["body"], "hello");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn error_ack_carries_code_and_omits_message() {
        let value = serde_json::to_value(AckFrame::err("empty-body")).expect("serialize ack");

        assert_eq!(value["type"], "ack");
        assert_eq!(value["ok"], false);
        assert_eq!(value["error"], "empty-body");
        assert!(value.get("message").is_none());
    }
}
