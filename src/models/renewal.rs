use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::CreditCategory;

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct CategoryOutcome {
    pub category: CreditCategory,
    pub renewed: u64,
    pub expired: u64,
    /// 该类别整体回滚时的错误信息
    pub error: Option<String>,
}

impl CategoryOutcome {
    pub fn changes(&self) -> u64 {
        self.renewed + self.expired
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RenewalReport {
    pub started_at: DateTime<Utc>,
    pub categories: Vec<CategoryOutcome>,
    pub vouchers_expired: u64,
}

impl RenewalReport {
    pub fn total_changes(&self) -> u64 {
        self.categories.iter().map(CategoryOutcome::changes).sum::<u64>() + self.vouchers_expired
    }

    pub fn has_failures(&self) -> bool {
        self.categories.iter().any(|c| c.error.is_some())
    }
}
