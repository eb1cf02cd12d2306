mod common;

use chrono::{Duration, Utc};
use common::*;
use futures_util::future::join_all;
use loyalty_backend::entities::{
    AccountType, LedgerEntryKind, VoucherInstanceStatus, account_entity as accounts,
};
use loyalty_backend::error::AppError;
use loyalty_backend::models::{ScanResult, VoucherInstanceQuery};
use loyalty_backend::services::{AuditService, PosService, VoucherService};
use loyalty_backend::utils::QrPayload;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, TransactionTrait};
use std::sync::Arc;

#[tokio::test]
async fn test_identity_scan_awards_floor_of_amount() {
    let app = setup().await;
    let customer = app.create_account(AccountType::Customer).await;
    let token = app
        .accounts
        .issue_identity_token(customer, false)
        .await
        .unwrap();
    assert_eq!(token.token_type, "identity");

    let result = app
        .pos
        .process_pos_scan(&token.token, Some(350), "Central", STAFF_ID)
        .await
        .unwrap();

    match result {
        ScanResult::PointsAwarded {
            customer_id,
            points_awarded,
            streak_bonus,
            new_balance,
            ..
        } => {
            assert_eq!(customer_id, customer);
            assert_eq!(points_awarded, 35);
            assert_eq!(streak_bonus, 0);
            assert_eq!(new_balance, 35);
        }
        other => panic!("unexpected scan result: {other:?}"),
    }

    let entries = app.points_entries(customer).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, LedgerEntryKind::Earn);
    assert_eq!(entries[0].points_delta, 35);
    assert_eq!(entries[0].amount_value, Some(350));
    assert_eq!(entries[0].staff_id, Some(STAFF_ID));

    let account = app.account(customer).await;
    assert_eq!(account.points_balance, 35);
    assert_eq!(account.total_spend, 350);
    assert_eq!(account.purchase_count, 1);
    assert_eq!(account.streak_days, 1);
    app.assert_points_consistent(customer).await;
}

#[tokio::test]
async fn test_identity_scan_requires_positive_amount() {
    let app = setup().await;
    let customer = app.create_account(AccountType::Customer).await;
    let token = app
        .accounts
        .issue_identity_token(customer, false)
        .await
        .unwrap();

    for amount in [None, Some(0), Some(-20)] {
        let err = app
            .pos
            .process_pos_scan(&token.token, amount, "Central", STAFF_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)), "{err}");
    }
    assert_eq!(app.entry_count().await, 0);
}

#[tokio::test]
async fn test_identity_scan_for_missing_account() {
    let app = setup().await;
    let issued = app
        .qr
        .issue_token(QrPayload::Identity { customer_id: 404 }, app.qr.pos_ttl())
        .unwrap();
    let err = app
        .pos
        .process_pos_scan(&issued.token, Some(100), "Central", STAFF_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound));
}

#[tokio::test]
async fn test_bad_tokens_have_no_effect() {
    let app = setup().await;
    let customer = app.create_account(AccountType::Customer).await;
    let expired = app
        .qr
        .issue_token(
            QrPayload::Identity {
                customer_id: customer,
            },
            Duration::seconds(-5),
        )
        .unwrap();

    let err = app
        .pos
        .process_pos_scan(&expired.token, Some(100), "Central", STAFF_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TokenExpired));

    let err = app
        .pos
        .process_pos_scan("not-a-token", Some(100), "Central", STAFF_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TokenInvalid));

    assert_eq!(app.account(customer).await.points_balance, 0);
    assert_eq!(app.entry_count().await, 0);
}

#[tokio::test]
async fn test_streak_bonus_on_milestone() {
    let app = setup().await;
    let customer = app.create_account(AccountType::Customer).await;
    let yesterday = (Utc::now() - Duration::days(1)).date_naive();
    accounts::Entity::update_many()
        .col_expr(accounts::Column::StreakDays, Expr::value(6))
        .col_expr(accounts::Column::LastVisitOn, Expr::value(Some(yesterday)))
        .filter(accounts::Column::Id.eq(customer))
        .exec(&app.db)
        .await
        .unwrap();

    let token = app
        .accounts
        .issue_identity_token(customer, false)
        .await
        .unwrap();
    let result = app
        .pos
        .process_pos_scan(&token.token, Some(100), "Central", STAFF_ID)
        .await
        .unwrap();
    match result {
        ScanResult::PointsAwarded {
            points_awarded,
            streak_bonus,
            new_balance,
            ..
        } => {
            assert_eq!(points_awarded, 10);
            assert_eq!(streak_bonus, 20);
            assert_eq!(new_balance, 30);
        }
        other => panic!("unexpected scan result: {other:?}"),
    }

    // 同一天再次消费不推进连续天数
    app.pos
        .process_pos_scan(&token.token, Some(100), "Central", STAFF_ID)
        .await
        .unwrap();
    let account = app.account(customer).await;
    assert_eq!(account.streak_days, 7);
    assert_eq!(account.points_balance, 40);

    let kinds: Vec<_> = app
        .points_entries(customer)
        .await
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            LedgerEntryKind::Earn,
            LedgerEntryKind::Streak,
            LedgerEntryKind::Earn
        ]
    );
    app.assert_points_consistent(customer).await;
}

#[tokio::test]
async fn test_stale_visit_snapshot_cannot_pay_streak_twice() {
    let app = setup().await;
    let customer = app.create_account(AccountType::Customer).await;
    let today = Utc::now().date_naive();
    let yesterday = (Utc::now() - Duration::days(1)).date_naive();
    accounts::Entity::update_many()
        .col_expr(accounts::Column::StreakDays, Expr::value(6))
        .col_expr(accounts::Column::LastVisitOn, Expr::value(Some(yesterday)))
        .filter(accounts::Column::Id.eq(customer))
        .exec(&app.db)
        .await
        .unwrap();
    // 另一笔并发扫描在更新前读到的快照
    let stale = app.account(customer).await;

    let token = app
        .accounts
        .issue_identity_token(customer, false)
        .await
        .unwrap();
    app.pos
        .process_pos_scan(&token.token, Some(100), "Central", STAFF_ID)
        .await
        .unwrap();
    let after_scan = app.account(customer).await;
    assert_eq!(after_scan.streak_days, 7);

    let advanced = PosService::advance_visit_in(&app.db, &stale, 100, today)
        .await
        .unwrap();
    assert_eq!(advanced, None);
    assert_eq!(app.account(customer).await, after_scan);

    // 重新读取后按同一天处理，不再发放奖励
    match app
        .pos
        .process_pos_scan(&token.token, Some(100), "Harbour", STAFF_ID + 1)
        .await
        .unwrap()
    {
        ScanResult::PointsAwarded { streak_bonus, .. } => assert_eq!(streak_bonus, 0),
        other => panic!("unexpected scan result: {other:?}"),
    }
    let account = app.account(customer).await;
    assert_eq!(account.streak_days, 7);
    assert_eq!(account.purchase_count, 2);
    assert_eq!(account.total_spend, 200);

    let streak_entries = app
        .points_entries(customer)
        .await
        .into_iter()
        .filter(|e| e.kind == LedgerEntryKind::Streak)
        .count();
    assert_eq!(streak_entries, 1);
    app.assert_points_consistent(customer).await;
}

#[tokio::test]
async fn test_claim_then_redeem_once() {
    let app = setup().await;
    let customer = app.create_customer_with_points(120).await;
    let voucher = app.create_voucher(100, 500).await;

    let claimed = app.vouchers.claim(customer, voucher.id).await.unwrap();
    assert_eq!(claimed.points_spent, 100);
    assert_eq!(claimed.remaining_points, 20);
    assert_eq!(claimed.instance.status, VoucherInstanceStatus::Active);

    let qr = app
        .vouchers
        .issue_redemption_token(customer, claimed.instance.id)
        .await
        .unwrap();
    assert_eq!(qr.token_type, "voucher_redemption");

    let result = app
        .pos
        .process_pos_scan(&qr.token, None, "Central", STAFF_ID)
        .await
        .unwrap();
    match &result {
        ScanResult::VoucherRedeemed {
            customer_id,
            voucher_instance_id,
            cash_value,
            ..
        } => {
            assert_eq!(*customer_id, customer);
            assert_eq!(*voucher_instance_id, claimed.instance.id);
            assert_eq!(*cash_value, 500);
        }
        other => panic!("unexpected scan result: {other:?}"),
    }

    let instance = app.instance(claimed.instance.id).await;
    assert_eq!(instance.status, VoucherInstanceStatus::Used);
    assert_eq!(instance.used_by_staff_id, Some(STAFF_ID));
    assert_eq!(instance.used_at_outlet.as_deref(), Some("Central"));

    let entries = app.points_entries(customer).await;
    let redeem: Vec<_> = entries
        .iter()
        .filter(|e| e.kind == LedgerEntryKind::Redeem)
        .collect();
    assert_eq!(redeem.len(), 1);
    assert_eq!(redeem[0].points_delta, 0);
    assert_eq!(redeem[0].amount_value, Some(500));
    let entries_after_first = app.entry_count().await;

    // 同一张券第二次核销
    let err = app
        .pos
        .process_pos_scan(&qr.token, None, "Central", STAFF_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyUsed));
    assert_eq!(app.entry_count().await, entries_after_first);

    // 已使用的券不能再生成核销码
    let err = app
        .vouchers
        .issue_redemption_token(customer, claimed.instance.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyUsed));

    assert_eq!(app.account(customer).await.points_balance, 20);
    app.assert_points_consistent(customer).await;
}

#[tokio::test]
async fn test_mark_used_directly_twice() {
    let app = setup().await;
    let customer = app.create_account(AccountType::Customer).await;
    let voucher = app.create_voucher(0, 300).await;
    let instance = app
        .insert_instance(customer, voucher.id, Utc::now() + Duration::days(3))
        .await;

    let used =
        VoucherService::mark_used_in(&app.db, instance.public_id, STAFF_ID, "Central", Utc::now())
            .await
            .unwrap();
    assert_eq!(used.status, VoucherInstanceStatus::Used);

    let err =
        VoucherService::mark_used_in(&app.db, instance.public_id, STAFF_ID, "Central", Utc::now())
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::AlreadyUsed));

    let err = VoucherService::mark_used_in(
        &app.db,
        uuid::Uuid::new_v4(),
        STAFF_ID,
        "Central",
        Utc::now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InstanceNotFound));
}

#[tokio::test]
async fn test_mark_used_twice_in_one_transaction() {
    let app = setup().await;
    let customer = app.create_account(AccountType::Customer).await;
    let voucher = app.create_voucher(0, 300).await;
    let instance = app
        .insert_instance(customer, voucher.id, Utc::now() + Duration::days(3))
        .await;

    let txn = app.db.begin().await.unwrap();
    let first =
        VoucherService::mark_used_in(&txn, instance.public_id, STAFF_ID, "Central", Utc::now())
            .await
            .unwrap();
    assert_eq!(first.status, VoucherInstanceStatus::Used);

    // 第二次的条件更新匹配不到 active 行，不会覆盖第一次的核销信息
    let err = VoucherService::mark_used_in(
        &txn,
        instance.public_id,
        STAFF_ID + 1,
        "Harbour",
        Utc::now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::AlreadyUsed));
    txn.commit().await.unwrap();

    let stored = app.instance(instance.public_id).await;
    assert_eq!(stored.status, VoucherInstanceStatus::Used);
    assert_eq!(stored.used_by_staff_id, Some(STAFF_ID));
    assert_eq!(stored.used_at_outlet.as_deref(), Some("Central"));
}

#[tokio::test]
async fn test_concurrent_scans_redeem_exactly_once() {
    let app = setup().await;
    let customer = app.create_customer_with_points(50).await;
    let voucher = app.create_voucher(50, 800).await;
    let claimed = app.vouchers.claim(customer, voucher.id).await.unwrap();
    let qr = app
        .vouchers
        .issue_redemption_token(customer, claimed.instance.id)
        .await
        .unwrap();

    // 单连接池下这些扫描会排队执行；条件更新本身由 test_mark_used_twice_in_one_transaction 覆盖
    let scans = (0..8).map(|i| {
        let pos = app.pos.clone();
        let token = qr.token.clone();
        tokio::spawn(async move {
            pos.process_pos_scan(&token, None, &format!("Outlet-{i}"), STAFF_ID + i)
                .await
        })
    });
    let results: Vec<_> = join_all(scans)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let already_used = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::AlreadyUsed)))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(already_used, 7);

    let redeem_entries = app
        .points_entries(customer)
        .await
        .into_iter()
        .filter(|e| e.kind == LedgerEntryKind::Redeem)
        .count();
    assert_eq!(redeem_entries, 1);
    app.assert_points_consistent(customer).await;
}

#[tokio::test]
async fn test_expiry_is_derived_not_stored() {
    let app = setup().await;
    let customer = app.create_account(AccountType::Customer).await;
    let voucher = app.create_voucher(0, 300).await;
    let instance = app
        .insert_instance(customer, voucher.id, Utc::now() - Duration::minutes(1))
        .await;

    let page = app
        .vouchers
        .list_instances(
            customer,
            &VoucherInstanceQuery {
                page: None,
                per_page: None,
                status: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].status, VoucherInstanceStatus::Expired);

    let expired_only = app
        .vouchers
        .list_instances(
            customer,
            &VoucherInstanceQuery {
                page: None,
                per_page: None,
                status: Some(VoucherInstanceStatus::Expired),
            },
        )
        .await
        .unwrap();
    assert_eq!(expired_only.total, 1);

    let err =
        VoucherService::mark_used_in(&app.db, instance.public_id, STAFF_ID, "Central", Utc::now())
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::Expired));

    // 存储状态保持 active
    let stored = app.instance(instance.public_id).await;
    assert_eq!(stored.status, VoucherInstanceStatus::Active);
    assert!(stored.used_at.is_none());
}

#[tokio::test]
async fn test_failed_ledger_write_rolls_back_transition() {
    let app = setup().await;
    let voucher = app.create_voucher(0, 300).await;
    // 券的持有人不存在：状态迁移成功后写分录失败
    let orphan = app
        .insert_instance(999, voucher.id, Utc::now() + Duration::days(1))
        .await;
    let issued = app
        .qr
        .issue_token(
            QrPayload::VoucherRedemption {
                customer_id: 999,
                voucher_id: voucher.id,
                voucher_instance_id: orphan.public_id,
                expires_at: orphan.expires_at,
            },
            app.qr.pos_ttl(),
        )
        .unwrap();

    let err = app
        .pos
        .process_pos_scan(&issued.token, None, "Central", STAFF_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound));

    let stored = app.instance(orphan.public_id).await;
    assert_eq!(stored.status, VoucherInstanceStatus::Active);
    assert!(stored.used_at.is_none());
    assert_eq!(app.entry_count().await, 0);
}

#[tokio::test]
async fn test_token_must_match_instance_owner() {
    let app = setup().await;
    let owner = app.create_account(AccountType::Customer).await;
    let voucher = app.create_voucher(0, 300).await;
    let instance = app
        .insert_instance(owner, voucher.id, Utc::now() + Duration::days(1))
        .await;
    let forged = app
        .qr
        .issue_token(
            QrPayload::VoucherRedemption {
                customer_id: owner + 1,
                voucher_id: voucher.id,
                voucher_instance_id: instance.public_id,
                expires_at: instance.expires_at,
            },
            app.qr.pos_ttl(),
        )
        .unwrap();

    let err = app
        .pos
        .process_pos_scan(&forged.token, None, "Central", STAFF_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TokenInvalid));
    assert_eq!(
        app.instance(instance.public_id).await.status,
        VoucherInstanceStatus::Active
    );

    // 他人的券也不能生成核销码
    let err = app
        .vouchers
        .issue_redemption_token(owner + 1, instance.public_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InstanceNotFound));
}

#[tokio::test]
async fn test_claim_with_insufficient_points_persists_nothing() {
    let app = setup().await;
    let customer = app.create_customer_with_points(30).await;
    let voucher = app.create_voucher(50, 500).await;

    let err = app.vouchers.claim(customer, voucher.id).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance));

    let page = app
        .vouchers
        .list_instances(
            customer,
            &VoucherInstanceQuery {
                page: None,
                per_page: None,
                status: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert_eq!(app.account(customer).await.points_balance, 30);
    assert_eq!(app.points_entries(customer).await.len(), 1);
}

#[tokio::test]
async fn test_failing_audit_sink_does_not_fail_scan() {
    let db = connect_and_migrate().await;
    let app = setup_with_audit(db, AuditService::new(Arc::new(FailingAuditSink))).await;
    let customer = app.create_account(AccountType::Customer).await;
    let token = app
        .accounts
        .issue_identity_token(customer, true)
        .await
        .unwrap();
    assert!(token.expires_at > Utc::now() + Duration::days(300));

    let result = app
        .pos
        .process_pos_scan(&token.token, Some(120), "Central", STAFF_ID)
        .await;
    assert!(result.is_ok());
    assert_eq!(app.account(customer).await.points_balance, 12);
}

#[tokio::test]
async fn test_reversal_and_reconcile() {
    let app = setup().await;
    let customer = app.create_customer_with_points(100).await;
    let grant = app.points_entries(customer).await.remove(0);

    let reversal = app
        .ledger
        .reverse_entry(grant.id, ADMIN_ID, "granted by mistake".into())
        .await
        .unwrap();
    assert_eq!(reversal.kind, LedgerEntryKind::Adjustment);
    assert_eq!(reversal.points_delta, -100);
    assert_eq!(reversal.balance_after, 0);
    assert_eq!(reversal.reverses_entry_id, Some(grant.id));

    let err = app
        .ledger
        .reverse_entry(grant.id, ADMIN_ID, "again".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let err = app
        .ledger
        .reverse_entry(reversal.id, ADMIN_ID, "undo".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let r = app.ledger.reconcile(customer).await.unwrap();
    assert!(r.consistent);
    assert_eq!(r.cached_balance, 0);
    assert_eq!(r.entry_count, 2);
}

#[tokio::test]
async fn test_voucher_entries_cannot_be_reversed() {
    let app = setup().await;
    let customer = app.create_customer_with_points(150).await;
    let voucher = app.create_voucher(100, 500).await;
    let claimed = app.vouchers.claim(customer, voucher.id).await.unwrap();
    let claim_entry = app
        .points_entries(customer)
        .await
        .into_iter()
        .find(|e| e.kind == LedgerEntryKind::Claim)
        .unwrap();

    let err = app
        .ledger
        .reverse_entry(claim_entry.id, ADMIN_ID, "refund".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
    assert_eq!(app.account(customer).await.points_balance, 50);

    let qr = app
        .vouchers
        .issue_redemption_token(customer, claimed.instance.id)
        .await
        .unwrap();
    app.pos
        .process_pos_scan(&qr.token, None, "Central", STAFF_ID)
        .await
        .unwrap();
    let redeem_entry = app
        .points_entries(customer)
        .await
        .into_iter()
        .find(|e| e.kind == LedgerEntryKind::Redeem)
        .unwrap();
    let err = app
        .ledger
        .reverse_entry(redeem_entry.id, ADMIN_ID, "undo".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    assert_eq!(
        app.instance(claimed.instance.id).await.status,
        VoucherInstanceStatus::Used
    );
    assert_eq!(app.points_entries(customer).await.len(), 3);
    app.assert_points_consistent(customer).await;
}

#[tokio::test]
async fn test_birthday_reward_once_per_year() {
    let app = setup().await;
    let customer = app
        .accounts
        .create_account(loyalty_backend::models::CreateAccountRequest {
            account_type: AccountType::Customer,
            display_name: None,
            birthday_month: Some(2),
            birthday_day: Some(29),
        })
        .await
        .unwrap()
        .id;

    // 平年在 2 月 28 日发放
    let feb_28 = chrono::NaiveDate::from_ymd_opt(2027, 2, 28).unwrap();
    assert_eq!(app.birthdays.grant_birthdays_on(feb_28).await.unwrap(), 1);
    assert_eq!(app.birthdays.grant_birthdays_on(feb_28).await.unwrap(), 0);

    let entries = app.points_entries(customer).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, LedgerEntryKind::Birthday);
    assert_eq!(entries[0].points_delta, 100);

    let other_day = chrono::NaiveDate::from_ymd_opt(2027, 3, 1).unwrap();
    assert_eq!(app.birthdays.grant_birthdays_on(other_day).await.unwrap(), 0);
    app.assert_points_consistent(customer).await;
}
