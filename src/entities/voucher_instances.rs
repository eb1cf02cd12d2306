//! A user's claim of a catalog voucher and its lifecycle.
//!
//! Legal transitions are `active -> used` and `active -> expired`; both targets are terminal.
//! Expiry is derived at read time from `expires_at`, so a stored `active` row past its
//! deadline is reported (and treated) as `expired` without being rewritten.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum VoucherInstanceStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "used")]
    Used,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl std::fmt::Display for VoucherInstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoucherInstanceStatus::Active => write!(f, "active"),
            VoucherInstanceStatus::Used => write!(f, "used"),
            VoucherInstanceStatus::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoucherEvent {
    Use,
    Expire,
}

impl VoucherInstanceStatus {
    /// Transition table. Any event on a terminal state is rejected with the error the
    /// point-of-sale caller should see.
    pub fn apply(self, event: VoucherEvent) -> Result<VoucherInstanceStatus, AppError> {
        match (self, event) {
            (VoucherInstanceStatus::Active, VoucherEvent::Use) => Ok(VoucherInstanceStatus::Used),
            (VoucherInstanceStatus::Active, VoucherEvent::Expire) => {
                Ok(VoucherInstanceStatus::Expired)
            }
            (VoucherInstanceStatus::Used, _) => Err(AppError::AlreadyUsed),
            (VoucherInstanceStatus::Expired, _) => Err(AppError::Expired),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "voucher_instances")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// 对外标识，嵌入二维码令牌
    pub public_id: Uuid,
    pub user_id: i64,
    pub voucher_id: i64,
    pub status: VoucherInstanceStatus,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by_staff_id: Option<i64>,
    pub used_at_outlet: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// 展示用状态：`used` 优先；`active` 且已过 `expires_at` 视为 `expired`
    pub fn effective_status(&self, now: DateTime<Utc>) -> VoucherInstanceStatus {
        match self.status {
            VoucherInstanceStatus::Active if self.expires_at <= now => {
                VoucherInstanceStatus::Expired
            }
            status => status,
        }
    }

    /// 校验当前是否可以核销
    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.effective_status(now)
            .apply(VoucherEvent::Use)
            .map(|_| ())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn instance(status: VoucherInstanceStatus, expires_in: Duration) -> Model {
        let now = Utc::now();
        Model {
            id: 1,
            public_id: Uuid::new_v4(),
            user_id: 10,
            voucher_id: 20,
            status,
            expires_at: now + expires_in,
            used_at: None,
            used_by_staff_id: None,
            used_at_outlet: None,
            created_at: now,
        }
    }

    #[test]
    fn test_transition_table() {
        use VoucherEvent::*;
        use VoucherInstanceStatus::*;

        assert_eq!(Active.apply(Use).unwrap(), Used);
        assert_eq!(Active.apply(Expire).unwrap(), Expired);
        assert!(matches!(Used.apply(Use), Err(AppError::AlreadyUsed)));
        assert!(matches!(Used.apply(Expire), Err(AppError::AlreadyUsed)));
        assert!(matches!(Expired.apply(Use), Err(AppError::Expired)));
        assert!(matches!(Expired.apply(Expire), Err(AppError::Expired)));
    }

    #[test]
    fn test_expiry_is_derived() {
        let now = Utc::now();
        let past = instance(VoucherInstanceStatus::Active, Duration::minutes(-1));
        assert_eq!(past.effective_status(now), VoucherInstanceStatus::Expired);
        // 存储状态保持不变
        assert_eq!(past.status, VoucherInstanceStatus::Active);
        assert!(matches!(past.check_usable(now), Err(AppError::Expired)));

        let live = instance(VoucherInstanceStatus::Active, Duration::days(1));
        assert_eq!(live.effective_status(now), VoucherInstanceStatus::Active);
        assert!(live.check_usable(now).is_ok());
    }

    #[test]
    fn test_used_wins_over_expiry() {
        let now = Utc::now();
        let used = instance(VoucherInstanceStatus::Used, Duration::minutes(-5));
        assert_eq!(used.effective_status(now), VoucherInstanceStatus::Used);
        assert!(matches!(used.check_usable(now), Err(AppError::AlreadyUsed)));
    }
}
