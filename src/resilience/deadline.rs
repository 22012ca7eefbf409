use crate::{Error, Result};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Slot for a final value that must survive a late deadline.
pub struct Capture<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Capture<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn store(&self, value: T) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn take(&self) -> Option<T> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_captured(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<T> Clone for Capture<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> Default for Capture<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handed to a bounded operation: cooperative cancellation plus the capture slot.
pub struct OperationContext<T> {
    cancel: CancellationToken,
    captured: Capture<T>,
}

impl<T> OperationContext<T> {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            captured: Capture::new(),
        }
    }

    /// Cancelled on deadline expiry or when the caller abandons the operation.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Record the final value as soon as it is known, before any cleanup.
    pub fn capture(&self, value: T) {
        self.captured.store(value);
    }

    pub(crate) fn capture_slot(&self) -> Capture<T> {
        self.captured.clone()
    }
}

/// Run `factory`'s operation until the first of: its own completion, cancellation of
/// `parent`, or `deadline`.
///
/// On deadline the operation is cancelled and dropped (dropping releases its
/// resources). The result is then the captured value if one was stored, otherwise
/// [`Error::Timeout`]. Exactly one outcome is produced.
pub async fn with_deadline<T, F, Fut>(
    operation: &str,
    deadline: Duration,
    parent: &CancellationToken,
    factory: F,
) -> Result<T>
where
    F: FnOnce(OperationContext<T>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let ctx = OperationContext::new(parent.child_token());
    let cancel = ctx.cancellation().clone();
    let captured = ctx.capture_slot();
    let started = tokio::time::Instant::now();

    let fut = factory(ctx);
    tokio::pin!(fut);

    tokio::select! {
        biased;
        res = &mut fut => res,
        _ = parent.cancelled() => {
            cancel.cancel();
            debug!(operation, "operation abandoned by caller");
            Err(Error::cancelled(operation))
        }
        _ = tokio::time::sleep(deadline) => {
            cancel.cancel();
            match captured.take() {
                Some(value) => {
                    debug!(operation, "deadline reached after the result was captured");
                    Ok(value)
                }
                None => {
                    warn!(
                        operation,
                        deadline_ms = deadline.as_millis() as u64,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "operation timed out"
                    );
                    Err(Error::timeout(operation, deadline))
                }
            }
        }
    }
}
