use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{AccountType, account_entity};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateAccountRequest {
    pub account_type: AccountType,
    pub display_name: Option<String>,
    /// 1-12
    pub birthday_month: Option<i16>,
    /// 1-31
    pub birthday_day: Option<i16>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountResponse {
    pub id: i64,
    pub account_type: AccountType,
    pub display_name: Option<String>,
    pub points_balance: i64,
    pub total_spend: i64,
    pub purchase_count: i64,
    pub streak_days: i32,
    pub created_at: DateTime<Utc>,
}

impl From<account_entity::Model> for AccountResponse {
    fn from(m: account_entity::Model) -> Self {
        Self {
            id: m.id,
            account_type: m.account_type,
            display_name: m.display_name,
            points_balance: m.points_balance,
            total_spend: m.total_spend,
            purchase_count: m.purchase_count,
            streak_days: m.streak_days,
            created_at: m.created_at,
        }
    }
}
