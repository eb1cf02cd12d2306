use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(24))")]
#[serde(rename_all = "snake_case")]
pub enum CreditCategory {
    /// 投资人在单个门店的额度
    #[sea_orm(string_value = "investor_outlet")]
    InvestorOutlet,
    /// 投资人集团级额度
    #[sea_orm(string_value = "investor_group")]
    InvestorGroup,
    /// 媒体年度预算
    #[sea_orm(string_value = "media_budget")]
    MediaBudget,
}

impl CreditCategory {
    /// 续期批处理的执行顺序
    pub const RENEWAL_ORDER: [CreditCategory; 3] = [
        CreditCategory::InvestorOutlet,
        CreditCategory::InvestorGroup,
        CreditCategory::MediaBudget,
    ];
}

impl std::fmt::Display for CreditCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CreditCategory::InvestorOutlet => write!(f, "investor_outlet"),
            CreditCategory::InvestorGroup => write!(f, "investor_group"),
            CreditCategory::MediaBudget => write!(f, "media_budget"),
        }
    }
}

/// 额度账户。`balance` 是带 `credit_account_id` 的分录之和的缓存。
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "credit_accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub category: CreditCategory,
    pub owner_account_id: i64,
    pub outlet: Option<String>,
    pub balance: i64,
    pub annual_allocation: i64,
    pub spent_this_year: i64,
    pub auto_renew: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// 本周期是否已结束
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
