use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    #[sea_orm(string_value = "customer")]
    Customer,
    #[sea_orm(string_value = "investor")]
    Investor,
    #[sea_orm(string_value = "media")]
    Media,
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountType::Customer => write!(f, "customer"),
            AccountType::Investor => write!(f, "investor"),
            AccountType::Media => write!(f, "media"),
        }
    }
}

/// 账户（顾客 / 投资人 / 媒体）
///
/// `points_balance` 只是 ledger_entries 的缓存，只能由 LedgerService 在写分录的同一事务里修改。
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub account_type: AccountType,
    pub display_name: Option<String>,
    pub points_balance: i64,
    pub total_spend: i64,
    pub purchase_count: i64,
    pub birthday_month: Option<i16>,
    pub birthday_day: Option<i16>,
    pub streak_days: i32,
    pub last_visit_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
