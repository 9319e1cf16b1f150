use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::error::Cancellation;

/// Cancellation and deadline carrier for every operation that may suspend.
///
/// Children share their parent's cancellation (cancelling a parent cancels all of
/// its children, never the reverse) and keep the earlier of the two deadlines.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that never ends on its own.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context ending when `token` is cancelled.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self { token, deadline: None }
    }

    /// A child that can be cancelled independently of this context.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// A child ending after `timeout`, or earlier if this context ends first.
    ///
    /// A timeout too large to represent as an instant adds no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// A child ending at `deadline`, or earlier if this context ends first.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };

        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancels this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The reason this context has ended, or `None` while it is live.
    pub fn cause(&self) -> Option<Cancellation> {
        if self.token.is_cancelled() {
            return Some(Cancellation::Cancelled);
        }

        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(Cancellation::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context ends.
    pub async fn done(&self) -> Cancellation {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Cancellation::Cancelled,
                    _ = sleep_until(deadline) => Cancellation::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                Cancellation::Cancelled
            }
        }
    }

    /// Runs `future` until it completes or the context ends, whichever is first.
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, Cancellation> {
        if let Some(cause) = self.cause() {
            return Err(cause);
        }

        tokio::select! {
            biased;
            cause = self.done() => Err(cause),
            output = future => Ok(output),
        }
    }
}
