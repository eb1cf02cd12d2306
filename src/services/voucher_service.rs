use crate::database::with_storage_timeout;
use crate::entities::{
    LedgerEntryKind, VoucherEvent, VoucherInstanceStatus, voucher_entity as vouchers,
    voucher_instance_entity as instances,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::{AuditEntry, AuditService, LedgerService};
use crate::utils::{QrPayload, QrTokenService};
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

#[derive(Clone)]
pub struct VoucherService {
    pool: DatabaseConnection,
    qr_service: QrTokenService,
    audit: AuditService,
    validity: Duration,
    timeout: std::time::Duration,
}

impl VoucherService {
    pub fn new(
        pool: DatabaseConnection,
        qr_service: QrTokenService,
        audit: AuditService,
        validity_days: i64,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            pool,
            qr_service,
            audit,
            validity: Duration::days(validity_days),
            timeout,
        }
    }

    pub async fn create_voucher(
        &self,
        admin_id: i64,
        req: CreateVoucherRequest,
    ) -> AppResult<VoucherResponse> {
        if req.title.trim().is_empty() {
            return Err(AppError::ValidationError("Title is required".into()));
        }
        if req.points_required < 0 || req.cash_value < 0 {
            return Err(AppError::ValidationError(
                "Points and cash value cannot be negative".into(),
            ));
        }

        let now = Utc::now();
        let voucher = vouchers::ActiveModel {
            title: Set(req.title.trim().to_string()),
            points_required: Set(req.points_required),
            cash_value: Set(req.cash_value),
            voucher_type: Set(req.voucher_type),
            is_active: Set(true),
            expires_at: Set(req.expires_at),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        self.audit.record(
            AuditEntry::new("voucher", voucher.id, "create")
                .actor(admin_id)
                .after(serde_json::to_value(&voucher)?),
        );
        Ok(voucher.into())
    }

    /// 当前可领取的优惠券目录
    pub async fn list_active_vouchers(&self) -> AppResult<Vec<VoucherResponse>> {
        let now = Utc::now();
        let list = vouchers::Entity::find()
            .filter(vouchers::Column::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(vouchers::Column::ExpiresAt.is_null())
                    .add(vouchers::Column::ExpiresAt.gt(now)),
            )
            .order_by_asc(vouchers::Column::PointsRequired)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    /// 领取：扣积分 + 生成券，同一事务
    pub async fn claim(&self, user_id: i64, voucher_id: i64) -> AppResult<ClaimVoucherResponse> {
        let now = Utc::now();
        let (instance, entry) = with_storage_timeout(self.timeout, async {
            let txn = self.pool.begin().await?;

            let voucher = vouchers::Entity::find_by_id(voucher_id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound("Voucher not found".into()))?;
            if !voucher.is_claimable(now) {
                return Err(AppError::ValidationError(
                    "Voucher is not available".into(),
                ));
            }

            let instance = instances::ActiveModel {
                public_id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                voucher_id: Set(voucher.id),
                status: Set(VoucherInstanceStatus::Active),
                expires_at: Set(instance_expiry(now, self.validity, voucher.expires_at)),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            let entry = LedgerService::append_entry_in(
                &txn,
                user_id,
                LedgerEntryKind::Claim,
                -voucher.points_required,
                EntryMetadata {
                    amount_value: Some(voucher.cash_value),
                    voucher_id: Some(voucher.id),
                    voucher_instance_id: Some(instance.id),
                    description: Some(format!("Claimed voucher: {}", voucher.title)),
                    ..Default::default()
                },
            )
            .await?;

            txn.commit().await?;
            Ok((instance, entry))
        })
        .await?;

        self.audit.record(
            AuditEntry::new("voucher_instance", instance.public_id, "claim")
                .actor(user_id)
                .after(serde_json::to_value(&instance)?),
        );

        Ok(ClaimVoucherResponse {
            points_spent: -entry.points_delta,
            remaining_points: entry.balance_after,
            instance: VoucherInstanceResponse::from_model(instance, now),
        })
    }

    pub async fn list_instances(
        &self,
        user_id: i64,
        query: &VoucherInstanceQuery,
    ) -> AppResult<PaginatedResponse<VoucherInstanceResponse>> {
        let now = Utc::now();
        let params = PaginationParams::new(query.page, query.per_page);

        let mut base = instances::Entity::find().filter(instances::Column::UserId.eq(user_id));
        if let Some(status) = query.status {
            base = base.filter(status_condition(status, now));
        }

        let total = base.clone().count(&self.pool).await?;
        let items = base
            .order_by_desc(instances::Column::CreatedAt)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            items
                .into_iter()
                .map(|m| VoucherInstanceResponse::from_model(m, now))
                .collect(),
            &params,
            total,
        ))
    }

    pub async fn find_instance(&self, public_id: Uuid) -> AppResult<instances::Model> {
        instances::Entity::find()
            .filter(instances::Column::PublicId.eq(public_id))
            .one(&self.pool)
            .await?
            .ok_or(AppError::InstanceNotFound)
    }

    /// 为自己的有效券生成核销二维码
    pub async fn issue_redemption_token(
        &self,
        user_id: i64,
        public_id: Uuid,
    ) -> AppResult<QrTokenResponse> {
        let instance = self.find_instance(public_id).await?;
        if instance.user_id != user_id {
            return Err(AppError::InstanceNotFound);
        }
        instance.check_usable(Utc::now())?;

        let payload = QrPayload::VoucherRedemption {
            customer_id: instance.user_id,
            voucher_id: instance.voucher_id,
            voucher_instance_id: instance.public_id,
            expires_at: instance.expires_at,
        };
        let token_type = payload.kind().to_string();
        let issued = self
            .qr_service
            .issue_token(payload, self.qr_service.pos_ttl())?;
        Ok(QrTokenResponse {
            token: issued.token,
            token_type,
            expires_at: issued.expires_at,
        })
    }

    /// `active -> used` 的带条件更新（比较交换）。
    ///
    /// 只有仍为 active 且未过期的行会被更新；并发核销中只有一个能拿到 1 行，
    /// 其余根据重新读到的状态返回 AlreadyUsed / Expired。
    pub async fn mark_used_in<C: ConnectionTrait>(
        conn: &C,
        public_id: Uuid,
        staff_id: i64,
        outlet: &str,
        now: DateTime<Utc>,
    ) -> AppResult<instances::Model> {
        let from = VoucherInstanceStatus::Active;
        let to = from.apply(VoucherEvent::Use)?;
        let res = instances::Entity::update_many()
            .col_expr(instances::Column::Status, Expr::value(to))
            .col_expr(instances::Column::UsedAt, Expr::value(Some(now)))
            .col_expr(instances::Column::UsedByStaffId, Expr::value(Some(staff_id)))
            .col_expr(
                instances::Column::UsedAtOutlet,
                Expr::value(Some(outlet.to_string())),
            )
            .filter(instances::Column::PublicId.eq(public_id))
            .filter(instances::Column::Status.eq(from))
            .filter(instances::Column::ExpiresAt.gt(now))
            .exec(conn)
            .await?;

        let current = instances::Entity::find()
            .filter(instances::Column::PublicId.eq(public_id))
            .one(conn)
            .await?
            .ok_or(AppError::InstanceNotFound)?;

        if res.rows_affected == 0 {
            current.check_usable(now)?;
            // 条件更新失败但读到 active：只可能是并发的另一笔刚刚完成
            return Err(AppError::AlreadyUsed);
        }
        Ok(current)
    }

    /// 把已过期但仍存为 active 的券落库为 expired，返回更新条数。
    /// 读路径本来就会推导为 expired，这里只是整理存储。
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let from = VoucherInstanceStatus::Active;
        let to = from.apply(VoucherEvent::Expire)?;
        let res = instances::Entity::update_many()
            .col_expr(instances::Column::Status, Expr::value(to))
            .filter(instances::Column::Status.eq(from))
            .filter(instances::Column::ExpiresAt.lte(now))
            .exec(&self.pool)
            .await?;
        Ok(res.rows_affected)
    }
}

/// 单张券过期时间：领取时间 + 有效天数，但不晚于目录过期时间
pub fn instance_expiry(
    now: DateTime<Utc>,
    validity: Duration,
    catalog_expires_at: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    let own = now + validity;
    match catalog_expires_at {
        Some(catalog) if catalog < own => catalog,
        _ => own,
    }
}

/// 与 `Model::effective_status` 一致的查询条件
fn status_condition(status: VoucherInstanceStatus, now: DateTime<Utc>) -> Condition {
    match status {
        VoucherInstanceStatus::Active => Condition::all()
            .add(instances::Column::Status.eq(VoucherInstanceStatus::Active))
            .add(instances::Column::ExpiresAt.gt(now)),
        VoucherInstanceStatus::Used => {
            Condition::all().add(instances::Column::Status.eq(VoucherInstanceStatus::Used))
        }
        VoucherInstanceStatus::Expired => Condition::any()
            .add(instances::Column::Status.eq(VoucherInstanceStatus::Expired))
            .add(
                Condition::all()
                    .add(instances::Column::Status.eq(VoucherInstanceStatus::Active))
                    .add(instances::Column::ExpiresAt.lte(now)),
            ),
    }
}
