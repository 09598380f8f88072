use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use reqwest::{Request, Response, StatusCode};
use tower::{retry::Policy, Layer, Service};
use tracing::warn;

pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);
/// Ten attempts in total, counting the first request.
pub const DEFAULT_MAX_RETRIES: u32 = 9;

/// Retries rate-limited (HTTP 429) requests with exponential backoff. Every
/// other outcome, including transport errors, is returned as is.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    backoff: Duration,
    max_backoff: Duration,
    retries: u32,
    max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF, DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    pub fn new(backoff: Duration, max_retries: u32) -> Self {
        Self {
            backoff,
            max_backoff: DEFAULT_MAX_BACKOFF,
            retries: 0,
            max_retries,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay before the next attempt: `backoff * 2^retries`, capped.
    pub fn delay(&self) -> Duration {
        self.backoff
            .checked_mul(1u32.checked_shl(self.retries).unwrap_or(u32::MAX))
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}

impl Policy<Request, Response, reqwest::Error> for RetryPolicy {
    type Future = Pin<Box<dyn Future<Output = Self> + Send + 'static>>;

    fn retry(
        &self,
        req: &Request,
        result: Result<&Response, &reqwest::Error>,
    ) -> Option<Self::Future> {
        let rate_limited =
            matches!(result, Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS);
        if rate_limited && self.retries < self.max_retries {
            let mut policy = self.clone();
            let delay = self.delay();
            warn!(url = %req.url(), retry = self.retries + 1, ?delay, "rate limited, retrying");
            Some(Box::pin(async move {
                tokio::time::sleep(delay).await;
                policy.retries += 1;
                policy
            }))
        } else {
            None
        }
    }

    fn clone_request(&self, req: &Request) -> Option<Request> {
        req.try_clone()
    }
}

pub struct RetryLayer {
    policy: RetryPolicy,
}

impl RetryLayer {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            policy: self.policy.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryService<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Service<Request> for RetryService<S>
where
    S: Service<Request, Response = Response, Error = reqwest::Error> + Send + 'static + Clone,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = reqwest::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let inner = self.inner.clone();
        let mut policy = self.policy.clone();

        let mut inner = std::mem::replace(&mut self.inner, inner);
        Box::pin(async move {
            // requests with streaming bodies cannot be replayed
            let Some(first) = policy.clone_request(&req) else {
                return inner.call(req).await;
            };
            let mut res = inner.call(first).await;

            while let Some(new_policy) = policy.retry(&req, res.as_ref()) {
                policy = new_policy.await;
                let Some(attempt) = policy.clone_request(&req) else {
                    break;
                };
                res = inner.call(attempt).await;
            }

            res
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let mut policy = RetryPolicy::new(Duration::from_millis(100), 10);
        assert_eq!(policy.delay(), Duration::from_millis(100));
        policy.retries = 3;
        assert_eq!(policy.delay(), Duration::from_millis(800));
        policy.retries = 9;
        assert_eq!(policy.delay(), DEFAULT_MAX_BACKOFF);
        policy.retries = 40;
        assert_eq!(policy.delay(), DEFAULT_MAX_BACKOFF);
    }

    #[test]
    fn clones_bodiless_requests() {
        let policy = RetryPolicy::default();
        let req = Request::new(
            reqwest::Method::GET,
            "http://localhost/block/1".parse().unwrap(),
        );
        assert!(policy.clone_request(&req).is_some());
    }
}
