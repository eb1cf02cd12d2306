use crate::entities::{AccountType, account_entity as accounts};
use crate::error::{AppError, AppResult};
use crate::models::{AccountResponse, CreateAccountRequest, QrTokenResponse};
use crate::utils::{QrPayload, QrTokenService};
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

#[derive(Clone)]
pub struct AccountService {
    pool: DatabaseConnection,
    qr_service: QrTokenService,
}

impl AccountService {
    pub fn new(pool: DatabaseConnection, qr_service: QrTokenService) -> Self {
        Self { pool, qr_service }
    }

    pub async fn create_account(&self, req: CreateAccountRequest) -> AppResult<AccountResponse> {
        validate_birthday(req.birthday_month, req.birthday_day)?;

        let now = Utc::now();
        let account = accounts::ActiveModel {
            account_type: Set(req.account_type),
            display_name: Set(req
                .display_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())),
            points_balance: Set(0),
            total_spend: Set(0),
            purchase_count: Set(0),
            birthday_month: Set(req.birthday_month),
            birthday_day: Set(req.birthday_day),
            streak_days: Set(0),
            last_visit_on: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!(
            "Account created: id={}, type={}",
            account.id,
            account.account_type
        );
        Ok(account.into())
    }

    pub async fn get_account(&self, account_id: i64) -> AppResult<accounts::Model> {
        accounts::Entity::find_by_id(account_id)
            .one(&self.pool)
            .await?
            .ok_or(AppError::AccountNotFound)
    }

    /// 会员身份码：POS 短时效码，或打印 / 钱包卡片用的长期码
    pub async fn issue_identity_token(
        &self,
        account_id: i64,
        static_code: bool,
    ) -> AppResult<QrTokenResponse> {
        let account = self
            .require_type(account_id, &[AccountType::Customer])
            .await?;
        let payload = QrPayload::Identity {
            customer_id: account.id,
        };
        let ttl = if static_code {
            self.qr_service.static_identity_ttl()
        } else {
            self.qr_service.pos_ttl()
        };
        let token_type = payload.kind().to_string();
        let issued = self.qr_service.issue_token(payload, ttl)?;
        Ok(QrTokenResponse {
            token: issued.token,
            token_type,
            expires_at: issued.expires_at,
        })
    }

    /// 账户必须存在且为指定类型
    pub async fn require_type(
        &self,
        account_id: i64,
        expected: &[AccountType],
    ) -> AppResult<accounts::Model> {
        let account = self.get_account(account_id).await?;
        if !expected.contains(&account.account_type) {
            return Err(AppError::ValidationError(format!(
                "Account {account_id} is a {} account",
                account.account_type
            )));
        }
        Ok(account)
    }
}

/// 生日月日必须成对出现且是合法日期（允许 2 月 29 日）
fn validate_birthday(month: Option<i16>, day: Option<i16>) -> AppResult<()> {
    match (month, day) {
        (None, None) => Ok(()),
        (Some(m), Some(d)) => {
            let valid = u32::try_from(m)
                .ok()
                .zip(u32::try_from(d).ok())
                .and_then(|(m, d)| NaiveDate::from_ymd_opt(2000, m, d))
                .is_some();
            if valid {
                Ok(())
            } else {
                Err(AppError::ValidationError(format!(
                    "Invalid birthday {m:02}-{d:02}"
                )))
            }
        }
        _ => Err(AppError::ValidationError(
            "Birthday month and day must be given together".into(),
        )),
    }
}
