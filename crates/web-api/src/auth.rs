//! JWT 认证模块
//!
//! 连接握手携带的不透明凭证是一枚 JWT，其 subject 是身份 id。
//! 任何处理器运行之前先做校验；校验失败对连接尝试是终态的。

use axum::http::HeaderMap;
use config::JwtConfig;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use domain::IdentityId;

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// 身份 id
    pub sub: Uuid,
    /// 过期时间 (Unix timestamp)
    pub exp: i64,
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

    /// 为身份签发 token（供外部登录子系统与测试使用）
    pub fn generate_token(&self, identity: IdentityId) -> Result<String, ApiError> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::hours(self.config.expiration_hours);

        let claims = Claims {
            sub: identity.into(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| ApiError::internal_server_error(format!("token generation failed: {err}")))
    }

    /// 验证并解析 token
    pub fn verify_token(&self, token: &str) -> Result<IdentityId, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| IdentityId::new(data.claims.sub))
            .map_err(|err| ApiError::unauthenticated(format!("invalid token: {err}")))
    }

    /// 从 headers 中提取并验证 bearer token
    pub fn extract_identity_from_headers(&self, headers: &HeaderMap) -> Result<IdentityId, ApiError> {
        let auth_header = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| ApiError::unauthenticated("missing authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthenticated("invalid authorization header format"))?;

        self.verify_token(token)
    }
}
