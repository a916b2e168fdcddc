//! Politeness delay between requests to the remote service

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Enforces a minimum interval between consecutive requests
#[derive(Clone)]
pub struct RequestSpacer {
    inner: Arc<Mutex<SpacerInner>>,
}

struct SpacerInner {
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RequestSpacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SpacerInner {
                last_request: None,
                min_interval,
            })),
        }
    }

    /// Wait until the next request is allowed
    pub async fn wait(&self) {
        let mut inner = self.inner.lock().await;

        if let Some(last) = inner.last_request {
            let elapsed = last.elapsed();
            if elapsed < inner.min_interval {
                let wait_time = inner.min_interval - elapsed;
                trace!("Politeness delay: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        inner.last_request = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spacer_enforces_interval() {
        let spacer = RequestSpacer::new(Duration::from_millis(100));

        let start = std::time::Instant::now();
        spacer.wait().await;
        spacer.wait().await;
        spacer.wait().await;

        // 3 requests = 2 intervals
        assert!(start.elapsed() >= Duration::from_millis(180));
    }

    #[tokio::test]
    async fn test_zero_interval_does_not_wait() {
        let spacer = RequestSpacer::new(Duration::ZERO);
        let start = std::time::Instant::now();
        for _ in 0..10 {
            spacer.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
