//! Append-only ledger with cached balances.
//!
//! Every balance change in the system goes through this module: the cached
//! `accounts.points_balance` / `credit_accounts.balance` is moved by the same statement
//! sequence that inserts the ledger row, always on the caller's connection or
//! transaction. Entries are never updated or deleted; corrections are reversing rows.

use crate::database::with_storage_timeout;
use crate::entities::{
    LedgerEntryKind, account_entity as accounts, credit_account_entity as credits,
    ledger_entry_entity as entries,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    EntryMetadata, LedgerEntryResponse, PaginatedResponse, PaginationParams, Reconciliation,
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::time::Duration;

/// 额度账本是否允许余额变为负数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativePolicy {
    Reject,
    /// 仅续期批处理的显式调整使用
    Allow,
}

const CREDIT_RESET_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct LedgerService {
    pool: DatabaseConnection,
    timeout: Duration,
}

impl LedgerService {
    pub fn new(pool: DatabaseConnection, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Appends a points entry in its own transaction.
    pub async fn append_entry(
        &self,
        account_id: i64,
        kind: LedgerEntryKind,
        points_delta: i64,
        metadata: EntryMetadata,
    ) -> AppResult<entries::Model> {
        with_storage_timeout(self.timeout, async {
            let txn = self.pool.begin().await?;
            let entry =
                Self::append_entry_in(&txn, account_id, kind, points_delta, metadata).await?;
            txn.commit().await?;
            Ok(entry)
        })
        .await
    }

    /// 在调用方的事务内写积分分录并同步缓存余额。
    ///
    /// 余额更新带条件 `points_balance >= -delta`，不会出现负数积分。
    pub async fn append_entry_in<C: ConnectionTrait>(
        conn: &C,
        account_id: i64,
        kind: LedgerEntryKind,
        points_delta: i64,
        metadata: EntryMetadata,
    ) -> AppResult<entries::Model> {
        let now = Utc::now();
        let mut update = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::PointsBalance,
                Expr::col(accounts::Column::PointsBalance).add(points_delta),
            )
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(account_id));
        if points_delta < 0 {
            update = update.filter(accounts::Column::PointsBalance.gte(-points_delta));
        }

        if update.exec(conn).await?.rows_affected == 0 {
            let exists = accounts::Entity::find_by_id(account_id)
                .one(conn)
                .await?
                .is_some();
            return Err(if exists {
                AppError::InsufficientBalance
            } else {
                AppError::AccountNotFound
            });
        }

        let account = accounts::Entity::find_by_id(account_id)
            .one(conn)
            .await?
            .ok_or(AppError::AccountNotFound)?;

        let entry = Self::insert_entry(
            conn,
            account_id,
            None,
            kind,
            points_delta,
            account.points_balance,
            metadata,
        )
        .await?;
        Ok(entry)
    }

    /// 在调用方事务内调整额度账户余额并写分录
    pub async fn append_credit_entry_in<C: ConnectionTrait>(
        conn: &C,
        credit_account_id: i64,
        kind: LedgerEntryKind,
        delta: i64,
        metadata: EntryMetadata,
        policy: NegativePolicy,
    ) -> AppResult<entries::Model> {
        let now = Utc::now();
        let mut update = credits::Entity::update_many()
            .col_expr(
                credits::Column::Balance,
                Expr::col(credits::Column::Balance).add(delta),
            )
            .col_expr(credits::Column::UpdatedAt, Expr::value(now))
            .filter(credits::Column::Id.eq(credit_account_id));
        if delta < 0 && policy == NegativePolicy::Reject {
            update = update.filter(credits::Column::Balance.gte(-delta));
        }

        if update.exec(conn).await?.rows_affected == 0 {
            let exists = credits::Entity::find_by_id(credit_account_id)
                .one(conn)
                .await?
                .is_some();
            return Err(if exists {
                AppError::InsufficientBalance
            } else {
                AppError::NotFound("Credit account not found".into())
            });
        }

        let credit = credits::Entity::find_by_id(credit_account_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Credit account not found".into()))?;

        Self::insert_entry(
            conn,
            credit.owner_account_id,
            Some(credit.id),
            kind,
            delta,
            credit.balance,
            metadata,
        )
        .await
    }

    /// 把额度余额重置为 `target`，写一条带符号差额的分录。
    ///
    /// 以读到的余额做比较交换，期间若有并发消费则重读重试，差额总是相对于实际被替换的余额。
    pub async fn reset_credit_balance_in<C: ConnectionTrait>(
        conn: &C,
        credit_account_id: i64,
        target: i64,
        kind: LedgerEntryKind,
        metadata: EntryMetadata,
    ) -> AppResult<entries::Model> {
        for _ in 0..CREDIT_RESET_ATTEMPTS {
            let current = credits::Entity::find_by_id(credit_account_id)
                .one(conn)
                .await?
                .ok_or_else(|| AppError::NotFound("Credit account not found".into()))?;

            let delta = target.checked_sub(current.balance).ok_or_else(|| {
                AppError::InternalError(format!(
                    "credit account {credit_account_id} balance out of range"
                ))
            })?;
            let res = credits::Entity::update_many()
                .col_expr(credits::Column::Balance, Expr::value(target))
                .col_expr(credits::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(credits::Column::Id.eq(credit_account_id))
                .filter(credits::Column::Balance.eq(current.balance))
                .exec(conn)
                .await?;
            if res.rows_affected == 1 {
                return Self::insert_entry(
                    conn,
                    current.owner_account_id,
                    Some(current.id),
                    kind,
                    delta,
                    target,
                    metadata,
                )
                .await;
            }
            log::debug!("Credit account {credit_account_id} changed during reset, retrying");
        }
        Err(AppError::StorageUnavailable(format!(
            "credit account {credit_account_id} kept changing during reset"
        )))
    }

    async fn insert_entry<C: ConnectionTrait>(
        conn: &C,
        account_id: i64,
        credit_account_id: Option<i64>,
        kind: LedgerEntryKind,
        delta: i64,
        balance_after: i64,
        metadata: EntryMetadata,
    ) -> AppResult<entries::Model> {
        let entry = entries::ActiveModel {
            account_id: Set(account_id),
            credit_account_id: Set(credit_account_id),
            kind: Set(kind),
            points_delta: Set(delta),
            balance_after: Set(balance_after),
            amount_value: Set(metadata.amount_value),
            outlet: Set(metadata.outlet),
            staff_id: Set(metadata.staff_id),
            voucher_id: Set(metadata.voucher_id),
            voucher_instance_id: Set(metadata.voucher_instance_id),
            reverses_entry_id: Set(metadata.reverses_entry_id),
            description: Set(metadata.description),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        Ok(entry)
    }

    pub async fn balance_of(&self, account_id: i64) -> AppResult<i64> {
        accounts::Entity::find_by_id(account_id)
            .one(&self.pool)
            .await?
            .map(|a| a.points_balance)
            .ok_or(AppError::AccountNotFound)
    }

    pub async fn grant_points(
        &self,
        account_id: i64,
        points: i64,
        admin_id: i64,
        description: Option<String>,
    ) -> AppResult<entries::Model> {
        if points <= 0 {
            return Err(AppError::ValidationError(
                "Granted points must be positive".into(),
            ));
        }
        self.append_entry(
            account_id,
            LedgerEntryKind::Grant,
            points,
            EntryMetadata {
                staff_id: Some(admin_id),
                description,
                ..Default::default()
            },
        )
        .await
    }

    /// 冲正：写一条反向分录，原分录保持不变
    pub async fn reverse_entry(
        &self,
        entry_id: i64,
        staff_id: i64,
        reason: String,
    ) -> AppResult<entries::Model> {
        with_storage_timeout(self.timeout, async {
            let txn = self.pool.begin().await?;
            let original = entries::Entity::find_by_id(entry_id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound("Ledger entry not found".into()))?;

            match original.kind {
                LedgerEntryKind::Adjustment => {
                    return Err(AppError::ValidationError(
                        "Adjustments cannot be reversed".into(),
                    ));
                }
                // 领券/核销记录与券状态绑定，单独冲正会让券与余额脱节
                LedgerEntryKind::Claim | LedgerEntryKind::Redeem => {
                    return Err(AppError::ValidationError(
                        "Voucher entries cannot be reversed".into(),
                    ));
                }
                _ => {}
            }
            let already = entries::Entity::find()
                .filter(entries::Column::ReversesEntryId.eq(entry_id))
                .count(&txn)
                .await?;
            if already > 0 {
                return Err(AppError::ValidationError(
                    "Ledger entry already reversed".into(),
                ));
            }

            let metadata = EntryMetadata {
                staff_id: Some(staff_id),
                voucher_id: original.voucher_id,
                voucher_instance_id: original.voucher_instance_id,
                reverses_entry_id: Some(original.id),
                description: Some(reason),
                ..Default::default()
            };
            let reversal = match original.credit_account_id {
                None => {
                    Self::append_entry_in(
                        &txn,
                        original.account_id,
                        LedgerEntryKind::Adjustment,
                        -original.points_delta,
                        metadata,
                    )
                    .await?
                }
                Some(credit_id) => {
                    Self::append_credit_entry_in(
                        &txn,
                        credit_id,
                        LedgerEntryKind::Adjustment,
                        -original.points_delta,
                        metadata,
                        NegativePolicy::Reject,
                    )
                    .await?
                }
            };
            txn.commit().await?;
            Ok(reversal)
        })
        .await
    }

    pub async fn list_entries(
        &self,
        account_id: i64,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<LedgerEntryResponse>> {
        let base = entries::Entity::find()
            .filter(entries::Column::AccountId.eq(account_id))
            .filter(entries::Column::CreditAccountId.is_null());

        let total = base.clone().count(&self.pool).await?;
        let items = base
            .order_by_desc(entries::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            items.into_iter().map(Into::into).collect(),
            params,
            total,
        ))
    }

    /// 重放积分分录并与缓存余额对比
    pub async fn reconcile(&self, account_id: i64) -> AppResult<Reconciliation> {
        let account = accounts::Entity::find_by_id(account_id)
            .one(&self.pool)
            .await?
            .ok_or(AppError::AccountNotFound)?;

        let deltas: Vec<i64> = entries::Entity::find()
            .select_only()
            .column(entries::Column::PointsDelta)
            .filter(entries::Column::AccountId.eq(account_id))
            .filter(entries::Column::CreditAccountId.is_null())
            .into_tuple()
            .all(&self.pool)
            .await?;

        let replayed: i64 = deltas.iter().sum();
        let reconciliation = Reconciliation {
            account_id,
            cached_balance: account.points_balance,
            replayed_balance: replayed,
            entry_count: deltas.len() as u64,
            consistent: replayed == account.points_balance,
        };
        if !reconciliation.consistent {
            log::error!(
                "Ledger drift on account {account_id}: cached={} replayed={replayed}",
                account.points_balance
            );
        }
        Ok(reconciliation)
    }

    /// 额度账户的同类校验，返回 (缓存余额, 重放余额)
    pub async fn reconcile_credit(&self, credit_account_id: i64) -> AppResult<(i64, i64)> {
        let credit = credits::Entity::find_by_id(credit_account_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Credit account not found".into()))?;

        let deltas: Vec<i64> = entries::Entity::find()
            .select_only()
            .column(entries::Column::PointsDelta)
            .filter(entries::Column::CreditAccountId.eq(credit_account_id))
            .into_tuple()
            .all(&self.pool)
            .await?;

        Ok((credit.balance, deltas.iter().sum()))
    }
}
