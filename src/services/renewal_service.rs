//! Annual renewal of investor credits and media budgets.
//!
//! Whether a row needs work is decided only by its `expires_at` against the current time,
//! so the batch can run as often as it likes: a renewed row has moved its deadline into
//! the future and an expired row has a zero balance, and neither is touched again.

use crate::database::with_storage_timeout;
use crate::entities::{
    AuditSeverity, CreditCategory, LedgerEntryKind, credit_account_entity as credits,
};
use crate::error::{AppError, AppResult};
use crate::models::{CategoryOutcome, EntryMetadata, RenewalReport};
use crate::services::{AuditEntry, AuditService, LedgerService, VoucherService};
use chrono::{DateTime, Months, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde_json::json;

#[derive(Clone)]
pub struct RenewalService {
    pool: DatabaseConnection,
    vouchers: VoucherService,
    audit: AuditService,
    cycle_months: u32,
    timeout: std::time::Duration,
}

impl RenewalService {
    pub fn new(
        pool: DatabaseConnection,
        vouchers: VoucherService,
        audit: AuditService,
        cycle_months: u32,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            pool,
            vouchers,
            audit,
            cycle_months,
            timeout,
        }
    }

    pub async fn run_annual_renewal(&self) -> AppResult<RenewalReport> {
        let started_at = Utc::now();
        let mut categories = Vec::with_capacity(CreditCategory::RENEWAL_ORDER.len());

        for category in CreditCategory::RENEWAL_ORDER {
            let outcome = match self.renew_category(category, started_at).await {
                Ok((renewed, expired)) => {
                    if renewed + expired > 0 {
                        log::info!("Renewal {category}: renewed={renewed} expired={expired}");
                    }
                    CategoryOutcome {
                        category,
                        renewed,
                        expired,
                        error: None,
                    }
                }
                Err(e) => {
                    log::error!("Renewal {category} rolled back: {e}");
                    self.audit
                        .record_now(
                            AuditEntry::new("renewal", category, "renew")
                                .severity(AuditSeverity::Critical)
                                .after(json!({ "error": e.to_string() }))
                                .failed(),
                        )
                        .await;
                    CategoryOutcome {
                        category,
                        renewed: 0,
                        expired: 0,
                        error: Some(e.to_string()),
                    }
                }
            };
            categories.push(outcome);
        }

        let vouchers_expired = match self.vouchers.expire_overdue(started_at).await {
            Ok(n) => n,
            Err(e) => {
                log::error!("Voucher expiry sweep failed: {e}");
                0
            }
        };

        let report = RenewalReport {
            started_at,
            categories,
            vouchers_expired,
        };
        if report.total_changes() > 0 || report.has_failures() {
            self.audit
                .record_now(
                    AuditEntry::new("renewal", started_at.to_rfc3339(), "run")
                        .severity(if report.has_failures() {
                            AuditSeverity::Warning
                        } else {
                            AuditSeverity::Info
                        })
                        .after(serde_json::to_value(&report)?),
                )
                .await;
        }
        Ok(report)
    }

    /// 单个类别在一个事务内完成，返回 (续期数, 清零数)
    async fn renew_category(
        &self,
        category: CreditCategory,
        now: DateTime<Utc>,
    ) -> AppResult<(u64, u64)> {
        with_storage_timeout(self.timeout, async {
            let txn = self.pool.begin().await?;
            let due = credits::Entity::find()
                .filter(credits::Column::Category.eq(category))
                .filter(credits::Column::ExpiresAt.lte(now))
                .order_by_asc(credits::Column::Id)
                .all(&txn)
                .await?;

            let (mut renewed, mut expired) = (0u64, 0u64);
            for credit in due {
                if credit.auto_renew {
                    let next_end = next_cycle_end(credit.expires_at, now, self.cycle_months)?;
                    let res = credits::Entity::update_many()
                        .col_expr(credits::Column::SpentThisYear, Expr::value(0i64))
                        .col_expr(credits::Column::ExpiresAt, Expr::value(next_end))
                        .filter(credits::Column::Id.eq(credit.id))
                        .filter(credits::Column::ExpiresAt.eq(credit.expires_at))
                        .exec(&txn)
                        .await?;
                    if res.rows_affected == 0 {
                        // 另一次批处理已经续过
                        continue;
                    }
                    LedgerService::reset_credit_balance_in(
                        &txn,
                        credit.id,
                        credit.annual_allocation,
                        LedgerEntryKind::Renewal,
                        EntryMetadata {
                            outlet: credit.outlet.clone(),
                            description: Some(format!(
                                "Renewed until {}",
                                next_end.format("%Y-%m-%d")
                            )),
                            ..Default::default()
                        },
                    )
                    .await?;
                    renewed += 1;
                } else if credit.balance != 0 {
                    LedgerService::reset_credit_balance_in(
                        &txn,
                        credit.id,
                        0,
                        LedgerEntryKind::Expiry,
                        EntryMetadata {
                            outlet: credit.outlet.clone(),
                            description: Some("Cycle ended without renewal".into()),
                            ..Default::default()
                        },
                    )
                    .await?;
                    expired += 1;
                }
            }

            txn.commit().await?;
            Ok((renewed, expired))
        })
        .await
    }
}

/// 从 `expires_at` 起按整周期推进，直到晚于 `now`
pub fn next_cycle_end(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    cycle_months: u32,
) -> AppResult<DateTime<Utc>> {
    if cycle_months == 0 {
        return Err(AppError::ConfigError("renewal cycle must be positive".into()));
    }
    let mut next = expires_at;
    while next <= now {
        next = next
            .checked_add_months(Months::new(cycle_months))
            .ok_or_else(|| AppError::InternalError("Cycle end out of range".into()))?;
    }
    Ok(next)
}
