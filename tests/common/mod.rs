//! Shared setup for the integration tests: an in-memory SQLite database migrated with the
//! production migrations, and the services wired the way `main` wires them.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loyalty_backend::config::{LoyaltyConfig, RenewalConfig};
use loyalty_backend::entities::{
    AccountType, VoucherInstanceStatus, VoucherType, account_entity as accounts,
    ledger_entry_entity as entries, voucher_instance_entity as instances,
};
use loyalty_backend::error::{AppError, AppResult};
use loyalty_backend::external::{LogNotifier, SharedNotifier};
use loyalty_backend::models::{CreateAccountRequest, CreateVoucherRequest, VoucherResponse};
use loyalty_backend::services::*;
use loyalty_backend::utils::QrTokenService;
use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const QR_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const ADMIN_ID: i64 = 1;
pub const STAFF_ID: i64 = 7;

pub struct TestApp {
    pub db: DatabaseConnection,
    pub qr: QrTokenService,
    pub accounts: AccountService,
    pub ledger: LedgerService,
    pub vouchers: VoucherService,
    pub pos: PosService,
    pub credits: CreditService,
    pub renewal: RenewalService,
    pub birthdays: BirthdayRewardService,
}

/// 单连接：内存库在连接关闭时即被销毁，且所有请求都落到同一个库上
pub async fn connect_and_migrate() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
    opt.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opt)
        .await
        .expect("Failed to connect to SQLite");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

pub async fn setup() -> TestApp {
    let db = connect_and_migrate().await;
    setup_with_audit(db.clone(), AuditService::database(db)).await
}

pub async fn setup_with_audit(db: DatabaseConnection, audit: AuditService) -> TestApp {
    let timeout = Duration::from_secs(10);
    let loyalty = LoyaltyConfig::default();
    let renewal_config = RenewalConfig::default();
    let qr = QrTokenService::new(QR_SECRET, 90, 365 * 24 * 3600);
    let notifier: SharedNotifier = Arc::new(LogNotifier);

    let vouchers = VoucherService::new(
        db.clone(),
        qr.clone(),
        audit.clone(),
        loyalty.voucher_validity_days,
        timeout,
    );
    TestApp {
        qr: qr.clone(),
        accounts: AccountService::new(db.clone(), qr.clone()),
        ledger: LedgerService::new(db.clone(), timeout),
        pos: PosService::new(
            db.clone(),
            qr.clone(),
            audit.clone(),
            notifier,
            loyalty.clone(),
            timeout,
        ),
        credits: CreditService::new(db.clone(), audit.clone(), renewal_config.cycle_months, timeout),
        renewal: RenewalService::new(
            db.clone(),
            vouchers.clone(),
            audit.clone(),
            renewal_config.cycle_months,
            Duration::from_secs(renewal_config.timeout_secs),
        ),
        birthdays: BirthdayRewardService::new(db.clone(), loyalty.birthday_bonus_points, timeout),
        vouchers,
        db,
    }
}

/// 总是失败的审计通道
pub struct FailingAuditSink;

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn record(&self, _entry: AuditEntry) -> AppResult<()> {
        Err(AppError::StorageUnavailable("audit store offline".into()))
    }
}

impl TestApp {
    pub async fn create_account(&self, account_type: AccountType) -> i64 {
        self.accounts
            .create_account(CreateAccountRequest {
                account_type,
                display_name: Some("Test".into()),
                birthday_month: None,
                birthday_day: None,
            })
            .await
            .unwrap()
            .id
    }

    pub async fn create_customer_with_points(&self, points: i64) -> i64 {
        let id = self.create_account(AccountType::Customer).await;
        if points > 0 {
            self.ledger
                .grant_points(id, points, ADMIN_ID, Some("seed".into()))
                .await
                .unwrap();
        }
        id
    }

    pub async fn create_voucher(&self, points_required: i64, cash_value: i64) -> VoucherResponse {
        self.vouchers
            .create_voucher(
                ADMIN_ID,
                CreateVoucherRequest {
                    title: "Free Coffee".into(),
                    points_required,
                    cash_value,
                    voucher_type: VoucherType::Product,
                    expires_at: None,
                },
            )
            .await
            .unwrap()
    }

    /// 直接写入一张券（绕过领取流程），用于构造过期或孤立的数据
    pub async fn insert_instance(
        &self,
        user_id: i64,
        voucher_id: i64,
        expires_at: DateTime<Utc>,
    ) -> instances::Model {
        instances::ActiveModel {
            public_id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            voucher_id: Set(voucher_id),
            status: Set(VoucherInstanceStatus::Active),
            expires_at: Set(expires_at),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap()
    }

    pub async fn account(&self, id: i64) -> accounts::Model {
        accounts::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn instance(&self, public_id: Uuid) -> instances::Model {
        self.vouchers.find_instance(public_id).await.unwrap()
    }

    pub async fn points_entries(&self, account_id: i64) -> Vec<entries::Model> {
        entries::Entity::find()
            .filter(entries::Column::AccountId.eq(account_id))
            .filter(entries::Column::CreditAccountId.is_null())
            .order_by_asc(entries::Column::Id)
            .all(&self.db)
            .await
            .unwrap()
    }

    pub async fn entry_count(&self) -> u64 {
        entries::Entity::find().count(&self.db).await.unwrap()
    }

    pub async fn assert_points_consistent(&self, account_id: i64) {
        let r = self.ledger.reconcile(account_id).await.unwrap();
        assert!(
            r.consistent,
            "cached {} != replayed {}",
            r.cached_balance, r.replayed_balance
        );
    }
}
