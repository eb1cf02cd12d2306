use crate::database::with_storage_timeout;
use crate::entities::{
    AccountType, LedgerEntryKind, account_entity as accounts, birthday_reward_entity as br,
};
use crate::error::AppResult;
use crate::models::EntryMetadata;
use crate::services::LedgerService;
use chrono::{Datelike, NaiveDate, Utc};
use sea_orm::sea_query::{Condition, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TransactionTrait,
};

#[derive(Clone)]
pub struct BirthdayRewardService {
    pool: DatabaseConnection,
    bonus_points: i64,
    timeout: std::time::Duration,
}

impl BirthdayRewardService {
    pub fn new(pool: DatabaseConnection, bonus_points: i64, timeout: std::time::Duration) -> Self {
        Self {
            pool,
            bonus_points,
            timeout,
        }
    }

    // 给今天生日且今年未领取过的顾客发放生日积分；返回发放人数
    pub async fn grant_today_birthdays(&self) -> AppResult<u64> {
        self.grant_birthdays_on(Utc::now().date_naive()).await
    }

    pub async fn grant_birthdays_on(&self, today: NaiveDate) -> AppResult<u64> {
        if self.bonus_points <= 0 {
            return Ok(0);
        }

        let mut day_match = Condition::all()
            .add(accounts::Column::BirthdayMonth.eq(today.month() as i16))
            .add(accounts::Column::BirthdayDay.eq(today.day() as i16));
        // 平年 2 月 28 日同时发放 2 月 29 日生日
        if is_feb_29_stand_in(today) {
            day_match = Condition::any().add(day_match).add(
                Condition::all()
                    .add(accounts::Column::BirthdayMonth.eq(2i16))
                    .add(accounts::Column::BirthdayDay.eq(29i16)),
            );
        }

        let customers = accounts::Entity::find()
            .filter(accounts::Column::AccountType.eq(AccountType::Customer))
            .filter(day_match)
            .all(&self.pool)
            .await?;

        let mut granted = 0u64;
        for c in customers {
            match self.grant_single(c.id, today.year()).await {
                Ok(true) => granted += 1,
                Ok(false) => {}
                Err(e) => log::error!("Failed to grant birthday reward to {}: {e}", c.id),
            }
        }
        Ok(granted)
    }

    /// 标记与分录同一事务；标记已存在则什么都不做
    async fn grant_single(&self, account_id: i64, year: i32) -> AppResult<bool> {
        with_storage_timeout(self.timeout, async {
            let txn = self.pool.begin().await?;
            let inserted = br::Entity::insert(br::ActiveModel {
                account_id: Set(account_id),
                reward_year: Set(year),
                points: Set(self.bonus_points),
                created_at: Set(Utc::now()),
                ..Default::default()
            })
            .on_conflict(
                OnConflict::columns([br::Column::AccountId, br::Column::RewardYear])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;
            if inserted == 0 {
                // 已发放过，跳过
                txn.commit().await?;
                return Ok(false);
            }

            LedgerService::append_entry_in(
                &txn,
                account_id,
                LedgerEntryKind::Birthday,
                self.bonus_points,
                EntryMetadata {
                    description: Some(format!("Birthday reward {year}")),
                    ..Default::default()
                },
            )
            .await?;

            txn.commit().await?;
            Ok(true)
        })
        .await
    }
}

fn is_feb_29_stand_in(day: NaiveDate) -> bool {
    day.month() == 2 && day.day() == 28 && NaiveDate::from_ymd_opt(day.year(), 2, 29).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feb_29_stand_in_only_in_common_years() {
        assert!(is_feb_29_stand_in(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()));
        assert!(!is_feb_29_stand_in(NaiveDate::from_ymd_opt(2028, 2, 28).unwrap()));
        assert!(!is_feb_29_stand_in(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()));
    }
}
