use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{CreditCategory, credit_account_entity};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct AllocateCreditRequest {
    pub category: CreditCategory,
    pub owner_account_id: i64,
    /// 仅 investor_outlet 需要
    pub outlet: Option<String>,
    pub annual_allocation: i64,
    pub auto_renew: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ConsumeCreditRequest {
    pub amount: i64,
    pub outlet: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreditAccountResponse {
    pub id: i64,
    pub category: CreditCategory,
    pub owner_account_id: i64,
    pub outlet: Option<String>,
    pub balance: i64,
    pub annual_allocation: i64,
    pub spent_this_year: i64,
    pub auto_renew: bool,
    pub expires_at: DateTime<Utc>,
}

impl From<credit_account_entity::Model> for CreditAccountResponse {
    fn from(m: credit_account_entity::Model) -> Self {
        Self {
            id: m.id,
            category: m.category,
            owner_account_id: m.owner_account_id,
            outlet: m.outlet,
            balance: m.balance,
            annual_allocation: m.annual_allocation,
            spent_this_year: m.spent_this_year,
            auto_renew: m.auto_renew,
            expires_at: m.expires_at,
        }
    }
}
