//! HTTP client with rate limiting and retries for the Spotify Web API.
//!
//! This module provides a wrapper around `reqwest::Client` that adds:
//! * Client-side rate limiting, so that a burst of dashboard views does not
//!   run into Spotify's rolling-window limit
//! * Mapping of unsuccessful statuses to [`Error`] kinds
//! * A bounded number of retries with a fixed delay for transient failures
//!
//! Retries apply to connection failures, timeouts, `429 Too Many Requests`
//! and `5xx` responses. There is no backoff: every retry waits the same
//! delay.

use std::{num::NonZeroU32, time::Duration};

use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    Method, Url,
};

use crate::{
    config::Config,
    error::{Error, Result},
    protocol::web_api::ErrorResponse,
};

pub struct Client {
    /// Unlimited request client.
    ///
    /// Direct access to the underlying client without rate limiting or
    /// retries.
    pub unlimited: reqwest::Client,

    rate_limiter: DefaultDirectRateLimiter,

    retries: u8,
    retry_delay: Duration,
}

impl Client {
    /// Spotify rate limits over a rolling 30-second window.
    const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(30);

    /// Own limit on calls per interval, well below what Spotify tolerates.
    const RATE_LIMIT_CALLS_PER_INTERVAL: u8 = 100;

    /// Duration to keep idle connections alive.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Duration to wait for individual network reads.
    const READ_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    ///
    /// # Panics
    ///
    /// Panics if rate limit parameters are zero.
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .read_timeout(Self::READ_TIMEOUT)
            .user_agent(&config.user_agent)
            .build()?;

        // Rate limit own requests as to not get throttled by Spotify.
        let replenish_interval =
            Self::RATE_LIMIT_INTERVAL / u32::from(Self::RATE_LIMIT_CALLS_PER_INTERVAL);
        let quota = Quota::with_period(replenish_interval)
            .expect("quota time interval is zero")
            .allow_burst(
                NonZeroU32::new(Self::RATE_LIMIT_CALLS_PER_INTERVAL.into())
                    .expect("calls per interval is zero"),
            );

        Ok(Self {
            unlimited: http_client,
            rate_limiter: governor::RateLimiter::direct(quota),
            retries: config.retries,
            retry_delay: config.retry_delay,
        })
    }

    /// Builds a request authorized with `access_token`.
    ///
    /// # Errors
    ///
    /// Returns error if the token cannot be used as a header value.
    pub fn request(&self, method: Method, url: Url, access_token: &str) -> Result<reqwest::Request> {
        let mut request = reqwest::Request::new(method, url);
        let mut authorization = HeaderValue::from_str(&format!("Bearer {access_token}"))?;
        authorization.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, authorization);
        Ok(request)
    }

    /// Builds a GET request.
    ///
    /// # Errors
    ///
    /// Returns error if the token cannot be used as a header value.
    pub fn get(&self, url: Url, access_token: &str) -> Result<reqwest::Request> {
        self.request(Method::GET, url, access_token)
    }

    /// Builds a PUT request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns error if the token cannot be used as a header value or the
    /// body cannot be serialized.
    pub fn put_json<T>(&self, url: Url, access_token: &str, body: &T) -> Result<reqwest::Request>
    where
        T: serde::Serialize,
    {
        let mut request = self.request(Method::PUT, url, access_token)?;
        let body = serde_json::to_vec(body)?;
        request.headers_mut().insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        *request.body_mut() = Some(body.into());
        Ok(request)
    }

    /// Builds a PUT request with an empty body.
    ///
    /// # Errors
    ///
    /// Returns error if the token cannot be used as a header value.
    pub fn put(&self, url: Url, access_token: &str) -> Result<reqwest::Request> {
        let mut request = self.request(Method::PUT, url, access_token)?;
        // Spotify answers 411 Length Required to bodiless commands.
        *request.body_mut() = Some(reqwest::Body::from(""));
        Ok(request)
    }

    /// Builds a POST request with an empty body.
    ///
    /// # Errors
    ///
    /// Returns error if the token cannot be used as a header value.
    pub fn post(&self, url: Url, access_token: &str) -> Result<reqwest::Request> {
        let mut request = self.request(Method::POST, url, access_token)?;
        *request.body_mut() = Some(reqwest::Body::from(""));
        Ok(request)
    }

    /// Executes a request with rate limiting and retries.
    ///
    /// A successful (`2xx`) response is returned as is; any other status is
    /// turned into an error carrying Spotify's error message. Transient
    /// failures are retried up to the configured number of times.
    ///
    /// # Errors
    ///
    /// Returns the last error if all attempts failed, or the first
    /// non-transient error.
    pub async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        let mut attempt: u8 = 0;
        loop {
            let this_try = request
                .try_clone()
                .ok_or_else(|| Error::internal("request body cannot be retried"))?;

            // No need to await with jitter because the level of concurrency is low.
            self.rate_limiter.until_ready().await;
            let result = match self.unlimited.execute(this_try).await {
                Ok(response) => Self::check_status(response).await,
                Err(e) => Err(e.into()),
            };

            match result {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "{} {}: {e}; retry {attempt}/{} in {:.1}s",
                        request.method(),
                        request.url().path(),
                        self.retries,
                        self.retry_delay.as_secs_f32()
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                result => return result,
            }
        }
    }

    /// Passes successful responses through and converts the others.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|response| response.error.message)
            .ok()
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_owned()
            });

        Err(Error::from_status(status, message))
    }
}
