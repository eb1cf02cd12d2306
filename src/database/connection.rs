use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::future::Future;
use std::time::Duration;

pub type DbPool = DatabaseConnection;

pub async fn create_pool(config: &DatabaseConfig) -> AppResult<DbPool> {
    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.statement_timeout_secs))
        .sqlx_logging(false);

    let pool = Database::connect(opt).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> AppResult<()> {
    Migrator::up(pool, None).await?;
    Ok(())
}

/// 给一个原子单元加超时；超时后 future 被丢弃，未提交的事务随之回滚。
pub async fn with_storage_timeout<T, F>(limit: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            log::error!("Storage call exceeded {}ms", limit.as_millis());
            Err(AppError::StorageUnavailable(format!(
                "storage call timed out after {}ms",
                limit.as_millis()
            )))
        }
    }
}
