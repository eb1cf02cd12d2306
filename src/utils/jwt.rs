use crate::error::{AppError, AppResult};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Staff,
    Admin,
}

/// 外部身份系统签发的访问令牌
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // account id (customer) or staff id
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// 已认证的调用方，由 AuthMiddleware 写入请求扩展
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub role: Role,
}

impl Principal {
    pub fn require(&self, allowed: &[Role]) -> AppResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Verifies bearer tokens minted by the identity provider.
#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<Principal> {
        let validation = Validation::new(Algorithm::HS256);
        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::AuthError(format!("Invalid access token: {e}")))?;

        let id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid subject".to_string()))?;

        Ok(Principal {
            id,
            role: claims.role,
        })
    }
}
