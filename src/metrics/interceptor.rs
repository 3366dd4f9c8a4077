//! HTTP interceptor feeding the metrics collector.
//!
//! The interceptor has three stages, matching an HTTP client middleware
//! chain: [`MetricsInterceptor::request`] before sending, then exactly one of
//! [`MetricsInterceptor::response`] or [`MetricsInterceptor::error`].
//! The [`RequestContext`] returned by the first stage is consumed by the
//! second, so a request can never be resolved twice and nothing has to be
//! kept in a side table. A context that is dropped unresolved records
//! nothing.

use std::sync::Arc;

use super::{ApiRequestMetric, Timer};
use crate::traits::{ErrorSink, MetricsSink, TimeProvider};

/// Per-request state carried from the request stage to its outcome.
#[derive(Debug)]
#[must_use = "resolve the context with response() or error()"]
pub struct RequestContext {
    method: String,
    url: String,
    timer: Timer,
}

impl RequestContext {
    /// HTTP method of the request.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// URL of the request.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Records the outcome of every request it sees.
#[derive(Clone)]
pub struct MetricsInterceptor {
    sink: Arc<dyn MetricsSink>,
    errors: Option<Arc<dyn ErrorSink>>,
    clock: Arc<dyn TimeProvider>,
}

impl std::fmt::Debug for MetricsInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsInterceptor")
            .field("forwards_errors", &self.errors.is_some())
            .finish_non_exhaustive()
    }
}

impl MetricsInterceptor {
    /// Create an interceptor recording into `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn MetricsSink>, clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            sink,
            errors: None,
            clock,
        }
    }

    /// Also report failed requests to `errors`.
    #[must_use]
    pub fn with_error_sink(mut self, errors: Arc<dyn ErrorSink>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Request stage: start timing.
    pub fn request(&self, method: &str, url: &str) -> RequestContext {
        RequestContext {
            method: method.to_string(),
            url: url.to_string(),
            timer: Timer::start(),
        }
    }

    /// Response stage. Statuses of 400 and above take the error path.
    pub fn response(&self, ctx: RequestContext, status: u16) {
        if status >= 400 {
            let message = format!("Request failed with status code {status}");
            self.error(ctx, Some(status), &message);
            return;
        }

        let metric = ApiRequestMetric::new(
            ctx.url,
            ctx.method,
            Some(status),
            ctx.timer.elapsed_ms(),
            self.clock.now_millis(),
        );
        self.record(metric);
    }

    /// Error stage: the request failed, with or without a response.
    pub fn error(&self, ctx: RequestContext, status: Option<u16>, message: &str) {
        let metric = ApiRequestMetric::new(
            ctx.url,
            ctx.method,
            status,
            ctx.timer.elapsed_ms(),
            self.clock.now_millis(),
        )
        .with_error(message);

        if let Some(errors) = &self.errors {
            if let Err(e) = errors.log_api_error(&metric.url, status, message) {
                tracing::warn!(error = %e, "Failed to persist error log snapshot");
            }
        }
        self.record(metric);
    }

    fn record(&self, metric: ApiRequestMetric) {
        tracing::trace!(
            method = %metric.method,
            url = %metric.url,
            status = ?metric.status,
            duration_ms = metric.duration,
            "API request recorded"
        );
        if let Err(e) = self.sink.record_request(metric) {
            tracing::warn!(error = %e, "Failed to persist API metrics snapshot");
        }
    }
}

/// `reqwest` client that runs every request through a [`MetricsInterceptor`].
///
/// Responses and errors are returned unchanged.
#[derive(Debug, Clone)]
pub struct InstrumentedClient {
    client: reqwest::Client,
    interceptor: MetricsInterceptor,
}

impl InstrumentedClient {
    /// Wrap `client`.
    #[must_use]
    pub const fn new(client: reqwest::Client, interceptor: MetricsInterceptor) -> Self {
        Self {
            client,
            interceptor,
        }
    }

    /// The wrapped client.
    #[must_use]
    pub const fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// Start building a request.
    pub fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client.request(method, url)
    }

    /// Start building a GET request.
    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.get(url)
    }

    /// Build and execute a request.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the request cannot be built or sent.
    /// Requests that fail to build are not recorded.
    pub async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let request = builder.build()?;
        self.execute(request).await
    }

    /// Execute a request, recording its outcome.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the request fails in transport.
    pub async fn execute(
        &self,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let ctx = self
            .interceptor
            .request(request.method().as_str(), request.url().as_str());

        match self.client.execute(request).await {
            Ok(response) => {
                self.interceptor.response(ctx, response.status().as_u16());
                Ok(response)
            }
            Err(err) => {
                let status = err.status().map(|s| s.as_u16());
                self.interceptor.error(ctx, status, &err.to_string());
                Err(err)
            }
        }
    }
}
