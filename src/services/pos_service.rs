//! Point-of-sale scan handling.
//!
//! A scan carries a signed QR token. Identity tokens earn points for a purchase; voucher
//! tokens consume the named instance. Each branch commits as one transaction, and the
//! audit record and customer notification are sent only after that commit.

use crate::config::LoyaltyConfig;
use crate::database::with_storage_timeout;
use crate::entities::{
    LedgerEntryKind, account_entity as accounts, voucher_entity as vouchers,
    voucher_instance_entity as instances,
};
use crate::error::{AppError, AppResult};
use crate::external::{SharedNotifier, notify_in_background};
use crate::models::{EntryMetadata, ScanResult};
use crate::services::{AuditEntry, AuditService, LedgerService, VoucherService};
use crate::utils::{QrPayload, QrTokenService};
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
};
use serde_json::json;
use uuid::Uuid;

const VISIT_UPDATE_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct PosService {
    pool: DatabaseConnection,
    qr_service: QrTokenService,
    audit: AuditService,
    notifier: SharedNotifier,
    loyalty: LoyaltyConfig,
    timeout: std::time::Duration,
}

impl PosService {
    pub fn new(
        pool: DatabaseConnection,
        qr_service: QrTokenService,
        audit: AuditService,
        notifier: SharedNotifier,
        loyalty: LoyaltyConfig,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            pool,
            qr_service,
            audit,
            notifier,
            loyalty,
            timeout,
        }
    }

    pub async fn process_pos_scan(
        &self,
        token: &str,
        amount: Option<i64>,
        outlet: &str,
        staff_id: i64,
    ) -> AppResult<ScanResult> {
        let payload = self.qr_service.verify_token(token)?;
        if outlet.trim().is_empty() {
            return Err(AppError::ValidationError("Outlet is required".into()));
        }

        match payload {
            QrPayload::Identity { customer_id } => {
                let amount = amount.filter(|a| *a > 0).ok_or_else(|| {
                    AppError::ValidationError("Purchase amount must be positive".into())
                })?;
                self.award_points(customer_id, amount, outlet, staff_id)
                    .await
            }
            QrPayload::VoucherRedemption {
                customer_id,
                voucher_id,
                voucher_instance_id,
                ..
            } => {
                self.redeem_instance(customer_id, voucher_id, voucher_instance_id, outlet, staff_id)
                    .await
            }
        }
    }

    async fn award_points(
        &self,
        customer_id: i64,
        amount: i64,
        outlet: &str,
        staff_id: i64,
    ) -> AppResult<ScanResult> {
        let now = Utc::now();
        let today = now.date_naive();
        let points = points_for_amount(amount, self.loyalty.currency_units_per_point);

        let (earn, bonus) = with_storage_timeout(self.timeout, async {
            let txn = self.pool.begin().await?;
            let streak = Self::record_visit_in(&txn, customer_id, amount, today).await?;

            let earn = LedgerService::append_entry_in(
                &txn,
                customer_id,
                LedgerEntryKind::Earn,
                points,
                EntryMetadata {
                    amount_value: Some(amount),
                    outlet: Some(outlet.to_string()),
                    staff_id: Some(staff_id),
                    ..Default::default()
                },
            )
            .await?;

            let bonus = if streak.advanced
                && self.loyalty.streak_length_days > 0
                && streak.days % self.loyalty.streak_length_days == 0
                && self.loyalty.streak_bonus_points > 0
            {
                Some(
                    LedgerService::append_entry_in(
                        &txn,
                        customer_id,
                        LedgerEntryKind::Streak,
                        self.loyalty.streak_bonus_points,
                        EntryMetadata {
                            outlet: Some(outlet.to_string()),
                            staff_id: Some(staff_id),
                            description: Some(format!("{}-day visit streak", streak.days)),
                            ..Default::default()
                        },
                    )
                    .await?,
                )
            } else {
                None
            };

            txn.commit().await?;
            Ok((earn, bonus))
        })
        .await?;

        let streak_bonus = bonus.as_ref().map_or(0, |b| b.points_delta);
        let new_balance = bonus.as_ref().map_or(earn.balance_after, |b| b.balance_after);
        log::info!(
            "Points awarded: customer={customer_id} amount={amount} points={points} bonus={streak_bonus} outlet={outlet}"
        );

        self.audit.record(
            AuditEntry::new("account", customer_id, "earn")
                .actor(staff_id)
                .after(json!({
                    "ledger_entry_id": earn.id,
                    "amount": amount,
                    "points": points,
                    "streak_bonus": streak_bonus,
                    "balance": new_balance,
                    "outlet": outlet,
                })),
        );

        Ok(ScanResult::PointsAwarded {
            customer_id,
            points_awarded: points,
            streak_bonus,
            new_balance,
            ledger_entry_id: earn.id,
        })
    }

    /// 累加消费额、消费次数并推进连续天数。以读到的快照为条件更新，
    /// 快照过期时重新读取，同一天的首笔消费只会被推进一次。
    async fn record_visit_in<C: ConnectionTrait>(
        conn: &C,
        customer_id: i64,
        amount: i64,
        today: NaiveDate,
    ) -> AppResult<StreakUpdate> {
        for _ in 0..VISIT_UPDATE_ATTEMPTS {
            let account = accounts::Entity::find_by_id(customer_id)
                .one(conn)
                .await?
                .ok_or(AppError::AccountNotFound)?;
            if let Some(streak) = Self::advance_visit_in(conn, &account, amount, today).await? {
                return Ok(streak);
            }
            log::debug!("Account {customer_id} visit changed concurrently, retrying");
        }
        Err(AppError::StorageUnavailable(format!(
            "account {customer_id} kept changing during visit update"
        )))
    }

    /// 基于 `snapshot` 的条件更新；快照已被其他事务改写时返回 `None` 且不写入
    pub async fn advance_visit_in<C: ConnectionTrait>(
        conn: &C,
        snapshot: &accounts::Model,
        amount: i64,
        today: NaiveDate,
    ) -> AppResult<Option<StreakUpdate>> {
        let streak = next_streak(snapshot.last_visit_on, snapshot.streak_days, today);
        let same_last_visit = match snapshot.last_visit_on {
            Some(day) => accounts::Column::LastVisitOn.eq(day),
            None => accounts::Column::LastVisitOn.is_null(),
        };
        let res = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::TotalSpend,
                Expr::col(accounts::Column::TotalSpend).add(amount),
            )
            .col_expr(
                accounts::Column::PurchaseCount,
                Expr::col(accounts::Column::PurchaseCount).add(1),
            )
            .col_expr(accounts::Column::StreakDays, Expr::value(streak.days))
            .col_expr(accounts::Column::LastVisitOn, Expr::value(Some(today)))
            .filter(accounts::Column::Id.eq(snapshot.id))
            .filter(accounts::Column::StreakDays.eq(snapshot.streak_days))
            .filter(same_last_visit)
            .exec(conn)
            .await?;
        Ok((res.rows_affected == 1).then_some(streak))
    }

    async fn redeem_instance(
        &self,
        customer_id: i64,
        voucher_id: i64,
        public_id: Uuid,
        outlet: &str,
        staff_id: i64,
    ) -> AppResult<ScanResult> {
        let now = Utc::now();
        let result = with_storage_timeout(self.timeout, async {
            let txn = self.pool.begin().await?;
            let instance = instances::Entity::find()
                .filter(instances::Column::PublicId.eq(public_id))
                .one(&txn)
                .await?
                .ok_or(AppError::InstanceNotFound)?;
            // 令牌里的归属必须与券一致
            if instance.user_id != customer_id || instance.voucher_id != voucher_id {
                return Err(AppError::TokenInvalid);
            }

            let voucher = vouchers::Entity::find_by_id(instance.voucher_id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound("Voucher not found".into()))?;

            let used = VoucherService::mark_used_in(&txn, public_id, staff_id, outlet, now).await?;
            let entry = LedgerService::append_entry_in(
                &txn,
                used.user_id,
                LedgerEntryKind::Redeem,
                0,
                EntryMetadata {
                    amount_value: Some(voucher.cash_value),
                    outlet: Some(outlet.to_string()),
                    staff_id: Some(staff_id),
                    voucher_id: Some(voucher.id),
                    voucher_instance_id: Some(used.id),
                    description: Some(format!("Redeemed voucher: {}", voucher.title)),
                    ..Default::default()
                },
            )
            .await?;

            txn.commit().await?;
            Ok((used, voucher, entry))
        })
        .await;

        let (used, voucher, entry) = match result {
            Ok(v) => v,
            Err(e) => {
                if matches!(
                    e,
                    AppError::AlreadyUsed | AppError::Expired | AppError::TokenInvalid
                ) {
                    log::warn!("Rejected redemption of {public_id} at {outlet}: {e}");
                    self.audit.record(
                        AuditEntry::new("voucher_instance", public_id, "redeem")
                            .actor(staff_id)
                            .after(json!({ "outlet": outlet, "error": e.code() }))
                            .failed(),
                    );
                }
                return Err(e);
            }
        };

        log::info!(
            "Voucher redeemed: instance={public_id} customer={} outlet={outlet} staff={staff_id}",
            used.user_id
        );
        self.audit.record(
            AuditEntry::new("voucher_instance", public_id, "redeem")
                .actor(staff_id)
                .before(json!({ "status": "active" }))
                .after(serde_json::to_value(&used)?),
        );
        notify_in_background(
            self.notifier.clone(),
            used.user_id,
            "voucher_redeemed",
            json!({
                "voucher_instance_id": public_id,
                "title": voucher.title,
                "outlet": outlet,
                "used_at": now,
            }),
        );

        Ok(ScanResult::VoucherRedeemed {
            customer_id: used.user_id,
            voucher_instance_id: used.public_id,
            voucher_id: voucher.id,
            title: voucher.title,
            cash_value: voucher.cash_value,
            used_at: used.used_at.unwrap_or(now),
            ledger_entry_id: entry.id,
        })
    }
}

/// 每 `units_per_point` 个货币单位 1 积分，向下取整
pub fn points_for_amount(amount: i64, units_per_point: i64) -> i64 {
    if amount <= 0 || units_per_point <= 0 {
        return 0;
    }
    amount / units_per_point
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub days: i32,
    /// 今天是否第一次到店（同一天多次消费不推进）
    pub advanced: bool,
}

pub fn next_streak(last_visit: Option<NaiveDate>, current: i32, today: NaiveDate) -> StreakUpdate {
    match last_visit {
        Some(last) if last == today => StreakUpdate {
            days: current.max(1),
            advanced: false,
        },
        Some(last) if last.succ_opt() == Some(today) => StreakUpdate {
            days: current + 1,
            advanced: true,
        },
        _ => StreakUpdate {
            days: 1,
            advanced: true,
        },
    }
}
