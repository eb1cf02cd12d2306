//! Signed point-of-sale tokens.
//!
//! Verification is a pure function of the token and the secret: nothing is looked up, so
//! a token can be redisplayed freely. Single use is enforced on the voucher instance the
//! token names, never on the token itself.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QrPayload {
    Identity {
        customer_id: i64,
    },
    VoucherRedemption {
        customer_id: i64,
        voucher_id: i64,
        voucher_instance_id: Uuid,
        expires_at: DateTime<Utc>,
    },
}

impl QrPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            QrPayload::Identity { .. } => "identity",
            QrPayload::VoucherRedemption { .. } => "voucher_redemption",
        }
    }

    pub fn customer_id(&self) -> i64 {
        match self {
            QrPayload::Identity { customer_id } => *customer_id,
            QrPayload::VoucherRedemption { customer_id, .. } => *customer_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct QrClaims {
    #[serde(flatten)]
    payload: QrPayload,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct QrTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    pos_ttl: Duration,
    static_identity_ttl: Duration,
}

impl QrTokenService {
    pub fn new(secret: &str, pos_ttl_secs: i64, static_identity_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            pos_ttl: Duration::seconds(pos_ttl_secs),
            static_identity_ttl: Duration::seconds(static_identity_ttl_secs),
        }
    }

    pub fn pos_ttl(&self) -> Duration {
        self.pos_ttl
    }

    pub fn static_identity_ttl(&self) -> Duration {
        self.static_identity_ttl
    }

    pub fn issue_token(&self, payload: QrPayload, ttl: Duration) -> AppResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = QrClaims {
            payload,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(format!("Failed to sign QR token: {e}")))?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify_token(&self, token: &str) -> AppResult<QrPayload> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        decode::<QrClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.payload)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => {
                    log::debug!("QR token rejected: {e}");
                    AppError::TokenInvalid
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn service() -> QrTokenService {
        QrTokenService::new(SECRET, 90, 3600)
    }

    #[test]
    fn test_identity_token_round_trip() {
        let svc = service();
        let issued = svc
            .issue_token(QrPayload::Identity { customer_id: 42 }, svc.pos_ttl())
            .unwrap();
        let payload = svc.verify_token(&issued.token).unwrap();
        assert_eq!(payload, QrPayload::Identity { customer_id: 42 });
        assert_eq!(payload.kind(), "identity");
        assert!(issued.expires_at > Utc::now());
    }

    #[test]
    fn test_voucher_token_round_trip() {
        let svc = service();
        let instance = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::days(3);
        let payload = QrPayload::VoucherRedemption {
            customer_id: 5,
            voucher_id: 9,
            voucher_instance_id: instance,
            expires_at,
        };
        let issued = svc.issue_token(payload.clone(), svc.pos_ttl()).unwrap();
        let verified = svc.verify_token(&issued.token).unwrap();
        assert_eq!(verified.kind(), "voucher_redemption");
        match verified {
            QrPayload::VoucherRedemption {
                customer_id,
                voucher_instance_id,
                ..
            } => {
                assert_eq!(customer_id, 5);
                assert_eq!(voucher_instance_id, instance);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_expired_token() {
        let svc = service();
        let issued = svc
            .issue_token(QrPayload::Identity { customer_id: 1 }, Duration::seconds(-5))
            .unwrap();
        assert!(matches!(
            svc.verify_token(&issued.token),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let other = QrTokenService::new("ffffffffffffffffffffffffffffffff", 90, 3600);
        let issued = other
            .issue_token(QrPayload::Identity { customer_id: 1 }, Duration::seconds(60))
            .unwrap();
        assert!(matches!(
            service().verify_token(&issued.token),
            Err(AppError::TokenInvalid)
        ));
    }

    #[test]
    fn test_swapped_payload_is_invalid() {
        let svc = service();
        let mine = svc
            .issue_token(QrPayload::Identity { customer_id: 1 }, Duration::seconds(60))
            .unwrap();
        let theirs = svc
            .issue_token(QrPayload::Identity { customer_id: 2 }, Duration::seconds(60))
            .unwrap();

        // 用别人的签名拼接自己的 payload
        let mine_parts: Vec<&str> = mine.token.split('.').collect();
        let theirs_parts: Vec<&str> = theirs.token.split('.').collect();
        let forged = format!("{}.{}.{}", mine_parts[0], theirs_parts[1], mine_parts[2]);
        assert!(matches!(svc.verify_token(&forged), Err(AppError::TokenInvalid)));

        let unsigned = format!("{}.{}.", mine_parts[0], mine_parts[1]);
        assert!(matches!(svc.verify_token(&unsigned), Err(AppError::TokenInvalid)));
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(
            service().verify_token("not-a-token"),
            Err(AppError::TokenInvalid)
        ));
    }
}
