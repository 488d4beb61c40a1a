/*!
 * Cooperative cancellation.
 *
 * A composition checks its token between cue-processing steps. Clones share
 * the cancel flag, so the job queue can cancel a running job through the
 * copy it kept.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::errors::CaptionError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// `Send + Sync + Clone` handle checked at cancellation points
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<DateTime<Utc>>,
}

impl CancellationToken {
    /// Token that only cancels when asked to
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that additionally cancels once `budget` has elapsed
    pub fn with_timeout(budget: Duration) -> Self {
        let millis = i64::try_from(budget.as_millis()).unwrap_or(i64::MAX);
        // Saturate so huge budgets never wrap into the past
        let deadline = Utc::now()
            .checked_add_signed(chrono::Duration::milliseconds(millis))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Child sharing the cancel flag, with the earlier of both deadlines
    pub fn child_with_timeout(&self, budget: Duration) -> Self {
        let child = Self::with_timeout(budget);
        let deadline = match (self.deadline, child.deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline,
        }
    }

    /// Request cancellation of every holder of this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.checkpoint().is_err()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Fail with [`CaptionError::Cancelled`] once cancelled or past the deadline
    pub fn checkpoint(&self) -> Result<(), CaptionError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(CaptionError::Cancelled("composition cancelled".to_string()));
        }
        if let Some(deadline) = self.deadline {
            if Utc::now() >= deadline {
                return Err(CaptionError::Cancelled("composition deadline exceeded".to_string()));
            }
        }
        Ok(())
    }

    /// Resolve once the token is cancelled or its deadline passes
    ///
    /// Polls, so it can be raced against a long external call.
    pub async fn cancelled(&self) -> CaptionError {
        loop {
            if let Err(e) = self.checkpoint() {
                return e;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
