use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

/// Trailing-edge debounce timer.
///
/// Every call to [`schedule()`](Self::schedule) replaces the previously
/// scheduled job; only the job from the last call in a burst runs, `delay`
/// after that call. Replacing a job drops the sender half of its cancellation
/// channel, which wakes the sleeping timer task and lets it exit quietly.
///
/// Once a timer has fired its job is no longer cancellable: rescheduling or
/// cancelling only affects jobs that are still waiting. A job that is half-way
/// through a network request must be allowed to finish (or be discarded by
/// whoever consumes its result), otherwise the state it was guarding is left
/// stuck mid-flight.
///
/// Must be used from within a tokio runtime.
///
/// # Examples
///
/// ```
/// use curio_asyncutils::Debouncer;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let runs = Arc::new(AtomicUsize::new(0));
/// let debouncer = Debouncer::new(Duration::from_millis(100));
/// for _ in 0..3 {
///     let runs = runs.clone();
///     debouncer.schedule(async move {
///         runs.fetch_add(1, Ordering::SeqCst);
///     });
/// }
/// tokio::time::sleep(Duration::from_millis(150)).await;
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
/// # }
/// ```
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<oneshot::Sender<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: Mutex::new(None) }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `job` to run after the configured delay, superseding any job
    /// that hasn't fired yet.
    pub fn schedule<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (cancel, cancelled) = oneshot::channel::<()>();
        let delay = self.delay;
        tokio::spawn(async move {
            // The receiver must be gone before the job starts, so that the
            // job no longer counts as pending once it's running.
            let fired = tokio::select! {
                // Resolves (with an error) as soon as the sender is dropped.
                _ = cancelled => false,
                _ = tokio::time::sleep(delay) => true,
            };
            if fired {
                job.await;
            } else {
                tracing::trace!("debounced job superseded");
            }
        });
        let previous = self.lock().replace(cancel);
        drop(previous);
    }

    /// Drop the waiting job, if any. Returns `true` if a job was waiting.
    pub fn cancel(&self) -> bool {
        self.lock().take().is_some_and(|sender| !sender.is_closed())
    }

    /// Whether a job is still waiting for its timer to fire.
    ///
    /// The sender side of the channel reports "closed" once the timer task has
    /// dropped its receiver, i.e. after the timer fired (or the task died).
    pub fn is_pending(&self) -> bool {
        self.lock().as_ref().is_some_and(|sender| !sender.is_closed())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<()>>> {
        // Nothing in the critical sections can panic half-way through.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
