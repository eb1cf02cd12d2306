use crate::config::NotificationConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Push notification capability. Callers never wait on it; see [`notify_in_background`].
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: i64, event: &str, payload: Value) -> AppResult<()>;
}

pub type SharedNotifier = Arc<dyn Notifier>;

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    user_id: i64,
    event: &'a str,
    payload: Value,
}

/// 通过推送网关 webhook 发送
#[derive(Clone)]
pub struct PushNotifier {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl PushNotifier {
    pub fn new(url: String, api_key: Option<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl Notifier for PushNotifier {
    async fn notify(&self, user_id: i64, event: &str, payload: Value) -> AppResult<()> {
        let mut request = self.client.post(&self.url).json(&PushRequest {
            user_id,
            event,
            payload,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if response.status().is_success() {
            log::debug!("Push notification sent: user={user_id} event={event}");
            Ok(())
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(AppError::InternalError(format!(
                "Push gateway returned {status}: {error_text}"
            )))
        }
    }
}

/// 未配置推送网关时只写日志
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: i64, event: &str, payload: Value) -> AppResult<()> {
        log::info!("Notification (not delivered): user={user_id} event={event} payload={payload}");
        Ok(())
    }
}

pub fn build_notifier(config: &NotificationConfig) -> AppResult<SharedNotifier> {
    match &config.push_webhook_url {
        Some(url) if !url.is_empty() => Ok(Arc::new(PushNotifier::new(
            url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        _ => Ok(Arc::new(LogNotifier)),
    }
}

/// Fire-and-forget delivery on a detached task; failures are only logged.
pub fn notify_in_background(
    notifier: SharedNotifier,
    user_id: i64,
    event: &'static str,
    payload: Value,
) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(user_id, event, payload).await {
            log::warn!("Failed to notify user {user_id} ({event}): {e}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_notifier_without_url_falls_back_to_log() {
        let config = NotificationConfig::default();
        assert!(build_notifier(&config).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_an_error_not_a_panic() {
        let notifier = PushNotifier::new(
            "http://127.0.0.1:9/push".to_string(),
            None,
            Duration::from_millis(200),
        )
        .unwrap();
        let res = notifier
            .notify(1, "voucher_redeemed", serde_json::json!({}))
            .await;
        assert!(res.is_err());
    }
}
