//! JWT 认证和授权模块
//!
//! 提供 JWT token 生成、验证。任何校验失败都发生在连接注册之前：
//! 未通过认证的请求不会触达连接中枢。

use axum::http::HeaderMap;
use config::JwtConfig;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// 身份凭证错误。连接建立阶段的致命错误，不做服务端重试。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// 请求未携带凭证
    #[error("missing credential")]
    Missing,
    /// 凭证校验失败或已过期
    #[error("invalid credential")]
    Invalid,
}

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

/// JWT Token 服务
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 生成 JWT token
    pub fn generate_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::hours(self.config.expiration_hours);

        let claims = Claims {
            user_id,
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|_| AuthError::Invalid)
    }

    /// 验证并解析 JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims)
            .map_err(|_| AuthError::Invalid)
    }

    /// 从 Authorization header 中提取和验证 token
    pub fn extract_user_from_headers(&self, headers: &HeaderMap) -> Result<Uuid, AuthError> {
        let auth_header = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or(AuthError::Missing)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::Invalid)?;

        let claims = self.verify_token(token)?;
        Ok(claims.user_id)
    }

    /// 校验 WebSocket 握手携带的 token（query 参数）
    pub fn verify_handshake_token(&self, token: Option<&str>) -> Result<Uuid, AuthError> {
        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(AuthError::Missing),
        };
        let claims = self.verify_token(token)?;
        Ok(claims.user_id)
    }
}

/// 登录响应结构
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: application::UserDto,
    pub token: String,
}
