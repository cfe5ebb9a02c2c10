//! Cancellation and deadline propagation
//!
//! A [`Context`] bounds every suspension point of a connect call: the
//! candidate source read and each dial attempt. Contexts form a tree; a child
//! never outlives its parent's deadline and is cancelled with its parent.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{ConnectError, ConnectResult};

/// Deadline and cancellation state carried through one connect call
#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A context without deadline that is only cancelled explicitly
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// Derive a child context that expires at `deadline` or at the parent's
    /// deadline, whichever comes first
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            token: self.token.child_token(),
        }
    }

    /// Derive a child context that expires `timeout` from now.
    ///
    /// A timeout too large to represent as an instant imposes no deadline of
    /// its own; the child keeps the parent's.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.with_cancel(),
        }
    }

    /// Derive a child context that can be cancelled on its own
    pub fn with_cancel(&self) -> Self {
        Self {
            deadline: self.deadline,
            token: self.token.child_token(),
        }
    }

    /// Cancel this context and every context derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// The reason this context is done, if it is
    pub fn err(&self) -> Option<ConnectError> {
        if self.token.is_cancelled() {
            return Some(ConnectError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(ConnectError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Drive `operation` until it completes or the context ends.
    ///
    /// When the context ends first the operation future is dropped, which
    /// aborts any in-flight I/O it owns.
    pub async fn run<F, T>(&self, operation: F) -> ConnectResult<T>
    where
        F: Future<Output = ConnectResult<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ConnectError::Cancelled),
            _ = expired => Err(ConnectError::DeadlineExceeded),
            result = operation => result,
        }
    }
}
