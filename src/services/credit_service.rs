use crate::database::with_storage_timeout;
use crate::entities::{
    AccountType, CreditCategory, LedgerEntryKind, account_entity as accounts,
    credit_account_entity as credits,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    AllocateCreditRequest, ConsumeCreditRequest, CreditAccountResponse, EntryMetadata,
};
use crate::services::{AuditEntry, AuditService, LedgerService, NegativePolicy};
use chrono::{Months, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde_json::json;

/// 投资人门店额度、集团额度与媒体预算
#[derive(Clone)]
pub struct CreditService {
    pool: DatabaseConnection,
    audit: AuditService,
    cycle_months: u32,
    timeout: std::time::Duration,
}

impl CreditService {
    pub fn new(
        pool: DatabaseConnection,
        audit: AuditService,
        cycle_months: u32,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            pool,
            audit,
            cycle_months,
            timeout,
        }
    }

    /// 开立额度账户并发放首期额度
    pub async fn allocate(
        &self,
        admin_id: i64,
        req: AllocateCreditRequest,
    ) -> AppResult<CreditAccountResponse> {
        if req.annual_allocation <= 0 {
            return Err(AppError::ValidationError(
                "Annual allocation must be positive".into(),
            ));
        }
        let outlet = req
            .outlet
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string);
        match (req.category, &outlet) {
            (CreditCategory::InvestorOutlet, None) => {
                return Err(AppError::ValidationError(
                    "Outlet is required for investor_outlet credit".into(),
                ));
            }
            (CreditCategory::InvestorGroup | CreditCategory::MediaBudget, Some(_)) => {
                return Err(AppError::ValidationError(format!(
                    "Outlet is not allowed for {} credit",
                    req.category
                )));
            }
            _ => {}
        }

        let now = Utc::now();
        let expires_at = now
            .checked_add_months(Months::new(self.cycle_months))
            .ok_or_else(|| AppError::InternalError("Cycle end out of range".into()))?;

        let credit = with_storage_timeout(self.timeout, async {
            let txn = self.pool.begin().await?;
            let owner = accounts::Entity::find_by_id(req.owner_account_id)
                .one(&txn)
                .await?
                .ok_or(AppError::AccountNotFound)?;
            if owner.account_type != owner_type_for(req.category) {
                return Err(AppError::ValidationError(format!(
                    "{} credit requires a {} account",
                    req.category,
                    owner_type_for(req.category)
                )));
            }
            let duplicate = credits::Entity::find()
                .filter(credits::Column::Category.eq(req.category))
                .filter(credits::Column::OwnerAccountId.eq(owner.id))
                .filter(match &outlet {
                    Some(o) => credits::Column::Outlet.eq(o.as_str()),
                    None => credits::Column::Outlet.is_null(),
                })
                .one(&txn)
                .await?;
            if duplicate.is_some() {
                return Err(AppError::ValidationError(
                    "Credit account already exists".into(),
                ));
            }

            let created = credits::ActiveModel {
                category: Set(req.category),
                owner_account_id: Set(owner.id),
                outlet: Set(outlet.clone()),
                balance: Set(0),
                annual_allocation: Set(req.annual_allocation),
                spent_this_year: Set(0),
                auto_renew: Set(req.auto_renew),
                expires_at: Set(expires_at),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            LedgerService::append_credit_entry_in(
                &txn,
                created.id,
                LedgerEntryKind::Grant,
                req.annual_allocation,
                EntryMetadata {
                    staff_id: Some(admin_id),
                    outlet: outlet.clone(),
                    description: Some(format!("Initial {} allocation", req.category)),
                    ..Default::default()
                },
                NegativePolicy::Reject,
            )
            .await?;

            let credit = credits::Entity::find_by_id(created.id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound("Credit account not found".into()))?;
            txn.commit().await?;
            Ok(credit)
        })
        .await?;

        self.audit.record(
            AuditEntry::new("credit_account", credit.id, "allocate")
                .actor(admin_id)
                .after(serde_json::to_value(&credit)?),
        );
        Ok(credit.into())
    }

    /// 消耗额度；周期已结束（等待续期）的账户不可使用
    pub async fn consume(
        &self,
        credit_account_id: i64,
        staff_id: i64,
        req: ConsumeCreditRequest,
    ) -> AppResult<CreditAccountResponse> {
        if req.amount <= 0 {
            return Err(AppError::ValidationError("Amount must be positive".into()));
        }

        let now = Utc::now();
        let credit = with_storage_timeout(self.timeout, async {
            let txn = self.pool.begin().await?;
            let credit = credits::Entity::find_by_id(credit_account_id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound("Credit account not found".into()))?;
            if credit.is_due(now) {
                return Err(AppError::Expired);
            }

            LedgerService::append_credit_entry_in(
                &txn,
                credit.id,
                LedgerEntryKind::Spend,
                -req.amount,
                EntryMetadata {
                    amount_value: Some(req.amount),
                    outlet: req.outlet.clone().or(credit.outlet.clone()),
                    staff_id: Some(staff_id),
                    description: req.description.clone(),
                    ..Default::default()
                },
                NegativePolicy::Reject,
            )
            .await?;

            credits::Entity::update_many()
                .col_expr(
                    credits::Column::SpentThisYear,
                    Expr::col(credits::Column::SpentThisYear).add(req.amount),
                )
                .filter(credits::Column::Id.eq(credit.id))
                .exec(&txn)
                .await?;

            let updated = credits::Entity::find_by_id(credit.id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound("Credit account not found".into()))?;
            txn.commit().await?;
            Ok(updated)
        })
        .await?;

        self.audit.record(
            AuditEntry::new("credit_account", credit.id, "consume")
                .actor(staff_id)
                .after(json!({ "amount": req.amount, "balance": credit.balance })),
        );
        Ok(credit.into())
    }

    pub async fn get(&self, credit_account_id: i64) -> AppResult<credits::Model> {
        credits::Entity::find_by_id(credit_account_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Credit account not found".into()))
    }
}

/// 额度类别对应的账户类型
pub fn owner_type_for(category: CreditCategory) -> AccountType {
    match category {
        CreditCategory::InvestorOutlet | CreditCategory::InvestorGroup => AccountType::Investor,
        CreditCategory::MediaBudget => AccountType::Media,
    }
}
