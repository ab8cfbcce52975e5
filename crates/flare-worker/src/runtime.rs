//! Session runtime client.
//!
//! The worker never implements isolation itself; it drives an external
//! sandbox host through this narrow capability: create a session, open a
//! fresh execution context inside it, run code with a timeout, destroy the
//! session. The underlying isolation technology is replaceable behind the
//! traits.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use flare_common::ExecError;

/// Captured output of one code run inside a session.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// Runtime-level failure (container died, run rejected); takes
    /// precedence over anything in the captured streams.
    pub error: Option<String>,
}

/// Fresh interpreter state within a session. Each run gets a new context so
/// an execution starts clean even when the session itself is reused.
#[derive(Debug, Clone)]
pub struct ContextId(pub String);

#[async_trait]
pub trait SessionRuntime: Send + Sync {
    async fn create_session(&self, session_id: &str) -> Result<Box<dyn Session>, ExecError>;
}

#[async_trait]
pub trait Session: Send + Sync {
    async fn create_context(&self, language: &str) -> Result<ContextId, ExecError>;

    async fn run(
        &self,
        code: &str,
        context: &ContextId,
        timeout: Duration,
    ) -> Result<ExecOutput, ExecError>;

    async fn destroy(&self) -> Result<(), ExecError>;
}

/// HTTP client for a sandbox host exposing session endpoints.
#[derive(Debug, Clone)]
pub struct HttpSandboxRuntime {
    base_url: String,
    http: reqwest::Client,
}

impl HttpSandboxRuntime {
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .build()
            .expect("reqwest client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }
}

#[async_trait]
impl SessionRuntime for HttpSandboxRuntime {
    async fn create_session(&self, session_id: &str) -> Result<Box<dyn Session>, ExecError> {
        let url = format!("{}/sessions", self.base_url);
        let body = serde_json::json!({ "id": session_id });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| ExecError::Session(format!("session create request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            tracing::error!(%status, body=%text, session_id=%session_id, "sandbox host rejected session create");
            return Err(ExecError::Session(format!(
                "session create returned {status}: {text}"
            )));
        }

        Ok(Box::new(HttpSession {
            base_url: self.base_url.clone(),
            session_id: session_id.to_string(),
            http: self.http.clone(),
        }))
    }
}

struct HttpSession {
    base_url: String,
    session_id: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ContextResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl Session for HttpSession {
    async fn create_context(&self, language: &str) -> Result<ContextId, ExecError> {
        let url = format!("{}/sessions/{}/contexts", self.base_url, self.session_id);
        let body = serde_json::json!({ "language": language });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| ExecError::Session(format!("context create request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(ExecError::Session(format!(
                "context create returned {status}"
            )));
        }

        let ctx: ContextResponse = resp
            .json()
            .await
            .map_err(|e| ExecError::Session(format!("invalid context response: {e}")))?;
        Ok(ContextId(ctx.id))
    }

    async fn run(
        &self,
        code: &str,
        context: &ContextId,
        timeout: Duration,
    ) -> Result<ExecOutput, ExecError> {
        let url = format!("{}/sessions/{}/exec", self.base_url, self.session_id);
        let body = serde_json::json!({
            "code": code,
            "context": context.0,
            "timeout_ms": timeout.as_millis() as u64,
        });

        // The sandbox host enforces the execution timeout; the extra buffer
        // covers network overhead so the HTTP call does not fire first.
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .timeout(timeout + Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| ExecError::Session(format!("exec request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ExecError::Session(format!("exec returned {status}: {text}")));
        }

        let run: RunResponse = resp
            .json()
            .await
            .map_err(|e| ExecError::Session(format!("invalid exec response: {e}")))?;

        Ok(ExecOutput {
            stdout: run.stdout,
            stderr: run.stderr,
            error: run.error,
        })
    }

    async fn destroy(&self) -> Result<(), ExecError> {
        let url = format!("{}/sessions/{}", self.base_url, self.session_id);

        let resp = self
            .http
            .delete(&url)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| ExecError::Session(format!("session destroy request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(ExecError::Session(format!(
                "session destroy returned {status}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scriptable in-memory runtime used by executor, dispatcher, and
    //! handler tests. Records lifecycle calls so tests can assert the
    //! isolation and teardown guarantees.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{ContextId, ExecOutput, Session, SessionRuntime};
    use flare_common::ExecError;

    /// What the mock session returns when asked to run code. The behavior
    /// function sees the full wrapper script.
    pub type RunBehavior =
        Arc<dyn Fn(&str) -> Result<ExecOutput, ExecError> + Send + Sync>;

    #[derive(Default)]
    pub struct Recorded {
        pub created: Mutex<Vec<String>>,
        pub destroyed: Mutex<Vec<String>>,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    pub struct MockRuntime {
        pub recorded: Arc<Recorded>,
        behavior: RunBehavior,
        /// Per-run artificial delay, to exercise concurrency interleavings.
        delay: Duration,
        fail_create: bool,
        fail_destroy: bool,
    }

    impl MockRuntime {
        pub fn new(behavior: RunBehavior) -> Self {
            Self {
                recorded: Arc::new(Recorded::default()),
                behavior,
                delay: Duration::ZERO,
                fail_create: false,
                fail_destroy: false,
            }
        }

        pub fn echoing_result(payload: &str) -> Self {
            let payload = payload.to_string();
            Self::new(Arc::new(move |_script| {
                Ok(ExecOutput {
                    stdout: format!(
                        "{m}{p}{m}\n",
                        m = crate::protocol::RESULT_MARKER,
                        p = payload
                    ),
                    stderr: String::new(),
                    error: None,
                })
            }))
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn with_failing_create(mut self) -> Self {
            self.fail_create = true;
            self
        }

        pub fn with_failing_destroy(mut self) -> Self {
            self.fail_destroy = true;
            self
        }
    }

    #[async_trait]
    impl SessionRuntime for MockRuntime {
        async fn create_session(&self, session_id: &str) -> Result<Box<dyn Session>, ExecError> {
            if self.fail_create {
                return Err(ExecError::Session("create refused".into()));
            }
            self.recorded
                .created
                .lock()
                .unwrap()
                .push(session_id.to_string());
            Ok(Box::new(MockSession {
                id: session_id.to_string(),
                recorded: self.recorded.clone(),
                behavior: self.behavior.clone(),
                delay: self.delay,
                fail_destroy: self.fail_destroy,
            }))
        }
    }

    struct MockSession {
        id: String,
        recorded: Arc<Recorded>,
        behavior: RunBehavior,
        delay: Duration,
        fail_destroy: bool,
    }

    #[async_trait]
    impl Session for MockSession {
        async fn create_context(&self, _language: &str) -> Result<ContextId, ExecError> {
            Ok(ContextId(format!("{}-ctx", self.id)))
        }

        async fn run(
            &self,
            code: &str,
            _context: &ContextId,
            _timeout: Duration,
        ) -> Result<ExecOutput, ExecError> {
            let current = self.recorded.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.recorded
                .max_in_flight
                .fetch_max(current, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let out = (self.behavior)(code);

            self.recorded.in_flight.fetch_sub(1, Ordering::SeqCst);
            out
        }

        async fn destroy(&self) -> Result<(), ExecError> {
            self.recorded.destroyed.lock().unwrap().push(self.id.clone());
            if self.fail_destroy {
                return Err(ExecError::Session("destroy refused".into()));
            }
            Ok(())
        }
    }
}
