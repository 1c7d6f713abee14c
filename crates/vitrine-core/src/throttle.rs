//! Per-host request pacing for polite retailer lookups.
//!
//! Wraps any [`Fetcher`] with a minimum delay between consecutive requests
//! to the same host. The resolver fans candidate fetches across a short
//! list of retailer sites; this keeps repeated candidates on one site from
//! hammering it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use url::Url;

use crate::error::AppError;
use crate::traits::Fetcher;

/// A [`Fetcher`] wrapper enforcing a per-host minimum delay.
#[derive(Clone)]
pub struct PoliteFetcher<F> {
    inner: F,
    delay: Duration,
    last_request: Arc<Mutex<HashMap<String, Instant>>>,
}

impl<F: Fetcher> PoliteFetcher<F> {
    pub fn new(inner: F, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            last_request: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn host_key(url_str: &str) -> Option<String> {
        let url = Url::parse(url_str).ok()?;
        url.host_str().map(str::to_string)
    }

    async fn wait_for_host(&self, host: &str) {
        let sleep_for = {
            let mut map = self.last_request.lock().await;
            match map.get(host) {
                Some(&last) if last.elapsed() < self.delay => Some(self.delay - last.elapsed()),
                _ => {
                    map.insert(host.to_string(), Instant::now());
                    None
                }
            }
        };

        // Sleep outside the lock so other hosts are not blocked.
        if let Some(d) = sleep_for {
            tracing::debug!(host = %host, sleep_ms = %d.as_millis(), "Pacing lookup request");
            tokio::time::sleep(d).await;
            let mut map = self.last_request.lock().await;
            map.insert(host.to_string(), Instant::now());
        }
    }
}

impl<F: Fetcher> Fetcher for PoliteFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        if let Some(host) = Self::host_key(url) {
            self.wait_for_host(&host).await;
        }
        self.inner.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockFetcher;

    #[test]
    fn host_key_ignores_path_and_port() {
        assert_eq!(
            PoliteFetcher::<MockFetcher>::host_key("https://example.com/p?q=1"),
            Some("example.com".to_string())
        );
        assert_eq!(
            PoliteFetcher::<MockFetcher>::host_key("http://example.com:8080/x"),
            Some("example.com".to_string())
        );
        assert_eq!(PoliteFetcher::<MockFetcher>::host_key("not-a-url"), None);
    }

    #[tokio::test]
    async fn same_host_requests_are_paced() {
        let fetcher = PoliteFetcher::new(
            MockFetcher::new("<html>ok</html>"),
            Duration::from_millis(100),
        );

        let start = Instant::now();
        fetcher.fetch("http://example.com/a").await.unwrap();
        fetcher.fetch("http://example.com/b").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn different_hosts_are_not_paced_against_each_other() {
        let fetcher = PoliteFetcher::new(
            MockFetcher::new("<html>ok</html>"),
            Duration::from_millis(200),
        );

        let start = Instant::now();
        fetcher.fetch("http://a.example.com/").await.unwrap();
        fetcher.fetch("http://b.example.com/").await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn passes_through_results_and_errors() {
        let ok = PoliteFetcher::new(MockFetcher::new("<html>hi</html>"), Duration::ZERO);
        assert_eq!(ok.fetch("http://example.com").await.unwrap(), "<html>hi</html>");

        let err = PoliteFetcher::new(
            MockFetcher::with_error(AppError::HttpError("fail".into())),
            Duration::ZERO,
        );
        assert!(matches!(
            err.fetch("http://example.com").await.unwrap_err(),
            AppError::HttpError(_)
        ));
    }
}
