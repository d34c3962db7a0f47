//! # Request Context
//!
//! Deadline and cancellation carried by every service call.
//!
//! ```text
//! ctx.run(work)
//!    │
//!    ├── work finishes first       ──► its result
//!    ├── ctx.cancel() fires        ──► Unavailable("request cancelled")
//!    └── deadline passes           ──► Unavailable("deadline exceeded")
//!
//! In the last two cases `work` is dropped where it stands. An open
//! transaction inside it rolls back when its handle is dropped.
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// No deadline; runs until done or cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        RequestContext {
            deadline: Some(Instant::now() + timeout),
            cancel: CancellationToken::new(),
        }
    }

    /// Ties this context to a parent token (e.g. the owning connection).
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs `work`, abandoning it on cancellation or deadline.
    pub async fn run<T, F>(&self, work: F) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ServiceError::Unavailable("request cancelled".into()));
        }

        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(ServiceError::Unavailable("request cancelled".into()))
            }
            _ = deadline => {
                Err(ServiceError::Unavailable("deadline exceeded".into()))
            }
            result = work => result,
        }
    }
}
