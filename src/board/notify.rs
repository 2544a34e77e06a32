//! Outbound webhook notifications.
//!
//! Two external automations are triggered with the full production record:
//! the promotion endpoint (new or re-submitted items) and the review-complete
//! endpoint (items leaving review for the publish queue).

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// Item entered `rewrite` (promotion or re-submission).
    Promotion,
    /// Item moved from `review` to `send`.
    ReviewComplete,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Promotion => "promotion",
            Self::ReviewComplete => "review_complete",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the backend `record` to `endpoint`. Success is any 2xx answer.
    async fn notify(&self, endpoint: Endpoint, record: &serde_json::Value) -> Result<()>;
}

/// Exponential backoff between notification attempts, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): `base * 2^retry`, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds or the attempts are used up. The last
    /// error is returned.
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Attempt failed, retrying: {:#}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Posts the backend record, unchanged, to the configured webhook URLs.
pub struct WebhookNotifier {
    client: reqwest::Client,
    promotion_url: Option<String>,
    review_complete_url: Option<String>,
    retry: RetryPolicy,
}

impl WebhookNotifier {
    pub fn new(
        promotion_url: Option<String>,
        review_complete_url: Option<String>,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build webhook client")?;
        Ok(Self {
            client,
            promotion_url,
            review_complete_url,
            retry,
        })
    }

    fn url_for(&self, endpoint: Endpoint) -> Option<&str> {
        match endpoint {
            Endpoint::Promotion => self.promotion_url.as_deref(),
            Endpoint::ReviewComplete => self.review_complete_url.as_deref(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, endpoint: Endpoint, record: &serde_json::Value) -> Result<()> {
        let Some(url) = self.url_for(endpoint) else {
            bail!("No webhook URL configured for {}", endpoint);
        };
        debug!(endpoint = %endpoint, item_id = %record["id"], "Posting webhook");

        let client = &self.client;
        let body = record;
        self.retry
            .run(|_| async move {
                let resp = client
                    .post(url)
                    .json(body)
                    .send()
                    .await
                    .with_context(|| format!("Failed to reach {} webhook", endpoint))?;
                let status = resp.status();
                if !status.is_success() {
                    bail!("{} webhook answered {}", endpoint, status);
                }
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::rows::ProductionRow;
    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
    use newsboard_common::{Column, ProductionItem};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Hook {
        bodies: Mutex<Vec<serde_json::Value>>,
        failures_left: AtomicU32,
    }

    async fn receive(
        State(hook): State<Arc<Hook>>,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        hook.bodies.lock().unwrap().push(body);
        let left = hook.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            hook.failures_left.store(left - 1, Ordering::SeqCst);
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        }
    }

    async fn spawn_hook(failures: u32) -> (String, Arc<Hook>) {
        let hook = Arc::new(Hook {
            bodies: Mutex::new(Vec::new()),
            failures_left: AtomicU32::new(failures),
        });
        let app = Router::new()
            .route("/hook", post(receive))
            .with_state(hook.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/hook", addr), hook)
    }

    fn record() -> serde_json::Value {
        serde_json::to_value(ProductionRow::from_item(&item())).unwrap()
    }

    fn item() -> ProductionItem {
        ProductionItem {
            id: "p1".into(),
            title: Some("Rates hold".into()),
            image_url: None,
            news_url: Some("https://news.example.com/1".into()),
            source: Some("Wire".into()),
            published_at: None,
            position: None,
            column: Column::Rewrite,
            content: Some("<p>draft</p>".into()),
            description: None,
            keywords: vec!["rates".into()],
            updated_at: None,
            origin_id: Some("c1".into()),
            user_id: Some("u1".into()),
            email: None,
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_posts_backend_shaped_record() {
        let (url, hook) = spawn_hook(0).await;
        let notifier =
            WebhookNotifier::new(Some(url), None, fast_retry(1), Duration::from_secs(5)).unwrap();

        notifier.notify(Endpoint::Promotion, &record()).await.unwrap();

        let bodies = hook.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["id"], "p1");
        assert_eq!(bodies[0]["news_title"], "Rates hold");
        assert_eq!(bodies[0]["google_news_id"], "c1");
        assert_eq!(bodies[0]["status"], "rewrite");
    }

    #[tokio::test]
    async fn test_posts_record_unchanged() {
        let (url, hook) = spawn_hook(0).await;
        let notifier =
            WebhookNotifier::new(None, Some(url), fast_retry(1), Duration::from_secs(5)).unwrap();
        let row = serde_json::json!({
            "id": "p1",
            "status": "send",
            "news_date": "2024-01-01",
            "user_email": "u1@example.com"
        });

        notifier.notify(Endpoint::ReviewComplete, &row).await.unwrap();

        let bodies = hook.bodies.lock().unwrap();
        assert_eq!(bodies[0], row);
    }

    #[tokio::test]
    async fn test_single_attempt_by_default_reports_failure() {
        let (url, hook) = spawn_hook(1).await;
        let notifier = WebhookNotifier::new(
            None,
            Some(url),
            RetryPolicy::default(),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = notifier
            .notify(Endpoint::ReviewComplete, &record())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
        assert_eq!(hook.bodies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let (url, hook) = spawn_hook(2).await;
        let notifier =
            WebhookNotifier::new(Some(url), None, fast_retry(3), Duration::from_secs(5)).unwrap();

        notifier.notify(Endpoint::Promotion, &record()).await.unwrap();
        assert_eq!(hook.bodies.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unconfigured_endpoint_is_an_error() {
        let notifier =
            WebhookNotifier::new(None, None, fast_retry(1), Duration::from_secs(5)).unwrap();
        let err = notifier
            .notify(Endpoint::ReviewComplete, &record())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("review_complete"));
    }
}
