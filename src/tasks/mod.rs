//! Background scheduled tasks for the application.
//!
//! Both jobs are safe to run at any frequency: renewal decides from each row's
//! `expires_at`, birthday rewards from the per-year marker. Call `spawn_all` once during
//! startup to launch them.

use crate::services::{BirthdayRewardService, RenewalService};
use std::time::Duration;

pub fn spawn_all(
    renewal_service: RenewalService,
    birthday_reward_service: BirthdayRewardService,
    renewal_interval: Duration,
) {
    // 额度续期 / 到期清零，以及过期优惠券整理
    {
        let svc = renewal_service.clone();
        tokio::spawn(async move {
            loop {
                match svc.run_annual_renewal().await {
                    Ok(report) if report.has_failures() => {
                        log::warn!("Renewal batch finished with failures: {report:?}")
                    }
                    Ok(report) if report.total_changes() > 0 => {
                        log::info!("Renewal batch applied {} changes", report.total_changes())
                    }
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to run renewal batch: {e:?}"),
                }
                tokio::time::sleep(renewal_interval).await;
            }
        });
    }

    // 生日积分发放（每小时）
    {
        let svc = birthday_reward_service.clone();
        tokio::spawn(async move {
            loop {
                match svc.grant_today_birthdays().await {
                    Ok(n) if n > 0 => log::info!("Birthday rewards granted: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to grant birthday rewards: {e:?}"),
                }
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        });
    }
}
