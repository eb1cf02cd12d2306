use crate::entities::{AuditSeverity, audit_record_entity as audit};
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use std::sync::Arc;

/// 一条审计记录（写入前）
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub entity_type: &'static str,
    pub entity_id: String,
    pub action: &'static str,
    pub actor_id: Option<i64>,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub severity: AuditSeverity,
    pub success: bool,
}

impl AuditEntry {
    pub fn new(entity_type: &'static str, entity_id: impl ToString, action: &'static str) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.to_string(),
            action,
            actor_id: None,
            before: None,
            after: None,
            severity: AuditSeverity::Info,
            success: true,
        }
    }

    pub fn actor(mut self, actor_id: i64) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn before(mut self, snapshot: Value) -> Self {
        self.before = Some(snapshot);
        self
    }

    pub fn after(mut self, snapshot: Value) -> Self {
        self.after = Some(snapshot);
        self
    }

    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> AppResult<()>;
}

/// 写入 audit_records 表
pub struct DbAuditSink {
    pool: DatabaseConnection,
}

impl DbAuditSink {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for DbAuditSink {
    async fn record(&self, entry: AuditEntry) -> AppResult<()> {
        audit::ActiveModel {
            entity_type: Set(entry.entity_type.to_string()),
            entity_id: Set(entry.entity_id),
            action: Set(entry.action.to_string()),
            actor_id: Set(entry.actor_id),
            before: Set(entry.before),
            after: Set(entry.after),
            severity: Set(entry.severity),
            success: Set(entry.success),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;
        Ok(())
    }
}

/// Best-effort front for an [`AuditSink`]. Nothing here ever returns an error to the
/// business operation that produced the record.
#[derive(Clone)]
pub struct AuditService {
    sink: Arc<dyn AuditSink>,
}

impl AuditService {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub fn database(pool: DatabaseConnection) -> Self {
        Self::new(Arc::new(DbAuditSink::new(pool)))
    }

    /// 在后台任务中写入，不阻塞调用方
    pub fn record(&self, entry: AuditEntry) {
        let sink = self.sink.clone();
        tokio::spawn(async move {
            Self::write(sink.as_ref(), entry).await;
        });
    }

    /// 同步等待写入完成（批处理使用），失败同样只记日志
    pub async fn record_now(&self, entry: AuditEntry) {
        Self::write(self.sink.as_ref(), entry).await;
    }

    async fn write(sink: &dyn AuditSink, entry: AuditEntry) {
        let label = format!("{}:{}:{}", entry.entity_type, entry.entity_id, entry.action);
        if let Err(e) = sink.record(entry).await {
            log::warn!("Failed to write audit record {label}: {e}");
        }
    }
}
