//! Call-status transitions and timed reversion
//!
//! Calling a visit starts a reversion timer. When it fires the visit drops
//! back to the normal queue, but only if it is still `BeingCalled`. Timers
//! are keyed by visit id with a generation number: a re-call, reset or
//! mark replaces or cancels the pending timer, and a timer that lost the
//! race to the lock finds its generation stale and does nothing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::AbortHandle;

use super::state::CallStatus;
use crate::error::Result;
use crate::store::QueueStore;

/// Default time a visit stays `BeingCalled`
pub const DEFAULT_REVERSION_DELAY: Duration = Duration::from_secs(5 * 60);

struct PendingReversion {
    generation: u64,
    handle: AbortHandle,
}

type Timers = Arc<Mutex<HashMap<String, PendingReversion>>>;

/// Applies call, reset and mark actions to the status store
///
/// Every transition runs under the timer-table lock, so a firing timer and
/// a new call for the same visit never interleave their store writes.
pub struct CallStatusMachine<S> {
    store: Arc<S>,
    delay: Duration,
    timers: Timers,
    next_generation: AtomicU64,
}

impl<S: QueueStore> CallStatusMachine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_delay(store, DEFAULT_REVERSION_DELAY)
    }

    pub fn with_delay(store: Arc<S>, delay: Duration) -> Self {
        Self {
            store,
            delay,
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn reversion_delay(&self) -> Duration {
        self.delay
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Make `visit_id` the one visit being called in `room_code`
    ///
    /// Any other being-called visit in the room is cleared, and the visit's
    /// reversion timer is (re)started.
    pub async fn call(&self, visit_id: &str, room_code: &str) -> Result<()> {
        let mut timers = self.timers.lock().await;

        self.store.set_being_called(visit_id, room_code).await?;

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let handle = self.spawn_reversion(visit_id.to_string(), generation);
        if let Some(previous) = timers.insert(
            visit_id.to_string(),
            PendingReversion { generation, handle },
        ) {
            previous.handle.abort();
        }

        tracing::info!(
            visit = %visit_id,
            room = %room_code,
            revert_after_secs = self.delay.as_secs(),
            "Visit being called"
        );
        Ok(())
    }

    /// Return a visit to the normal queue, whatever its status
    ///
    /// Resetting a visit with no status succeeds and removes nothing.
    pub async fn reset(&self, visit_id: &str) -> Result<u64> {
        let mut timers = self.timers.lock().await;
        cancel(&mut timers, visit_id);

        let removed = self.store.clear_status(visit_id).await?;
        tracing::info!(visit = %visit_id, removed, "Visit status reset");
        Ok(removed)
    }

    /// Record whether the patient answered the call
    ///
    /// Absent patients are marked missed; present ones go back to the
    /// normal queue.
    pub async fn mark(&self, visit_id: &str, room_code: &str, present: bool) -> Result<()> {
        let mut timers = self.timers.lock().await;
        cancel(&mut timers, visit_id);

        if present {
            self.store.clear_status(visit_id).await?;
        } else {
            self.store.set_missed(visit_id, room_code).await?;
        }

        tracing::info!(visit = %visit_id, room = %room_code, present, "Visit marked");
        Ok(())
    }

    /// Number of reversion timers not yet fired
    pub async fn pending_reversions(&self) -> usize {
        self.timers.lock().await.len()
    }

    /// Abort every pending reversion timer
    pub async fn cancel_all(&self) {
        let mut timers = self.timers.lock().await;
        for (_, pending) in timers.drain() {
            pending.handle.abort();
        }
    }

    fn spawn_reversion(&self, visit_id: String, generation: u64) -> AbortHandle {
        let store = Arc::clone(&self.store);
        let timers = Arc::clone(&self.timers);
        let delay = self.delay;

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut timers = timers.lock().await;
            let current = timers
                .get(&visit_id)
                .is_some_and(|pending| pending.generation == generation);
            if !current {
                return;
            }
            timers.remove(&visit_id);

            match store
                .clear_status_if(&visit_id, CallStatus::BeingCalled)
                .await
            {
                Ok(removed) => {
                    tracing::info!(visit = %visit_id, removed, "Call reverted");
                }
                Err(e) => {
                    tracing::warn!(visit = %visit_id, error = %e, "Call reversion failed");
                }
            }
        });

        task.abort_handle()
    }
}

fn cancel(timers: &mut HashMap<String, PendingReversion>, visit_id: &str) {
    if let Some(pending) = timers.remove(visit_id) {
        pending.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn machine() -> (Arc<MemoryStore>, CallStatusMachine<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let machine = CallStatusMachine::new(Arc::clone(&store));
        (store, machine)
    }

    async fn status(store: &MemoryStore, visit: &str) -> Option<CallStatus> {
        store.call_status(visit).await.unwrap().map(|r| r.status)
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_being_called_per_room() {
        let (store, machine) = machine();

        for visit in ["V1", "V2", "V3"] {
            machine.call(visit, "R1").await.unwrap();

            let called: Vec<_> = store
                .status_records()
                .await
                .into_iter()
                .filter(|r| r.room_code == "R1" && r.status == CallStatus::BeingCalled)
                .collect();
            assert_eq!(called.len(), 1);
            assert_eq!(called[0].visit_id, visit);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_reverts_after_delay() {
        let (store, machine) = machine();
        machine.call("V1", "R1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(status(&store, "V1").await, Some(CallStatus::BeingCalled));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(status(&store, "V1").await, None);
        assert_eq!(machine.pending_reversions().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reversion_after_clock_advance() {
        let (store, machine) = machine();
        tokio_test::assert_ok!(machine.call("V1", "R1").await);

        // let the timer task arm its sleep before the clock moves
        tokio::task::yield_now().await;
        tokio::time::advance(DEFAULT_REVERSION_DELAY + Duration::from_secs(1)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(status(&store, "V1").await, None);
        assert_eq!(tokio_test::assert_ok!(machine.reset("V1").await), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_does_not_clobber_missed() {
        let (store, machine) = machine();
        machine.call("V1", "R1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        machine.mark("V1", "R1", false).await.unwrap();

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(status(&store, "V1").await, Some(CallStatus::Missed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recall_restarts_timer() {
        let (store, machine) = machine();
        machine.call("V1", "R1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(200)).await;
        machine.call("V1", "R1").await.unwrap();
        assert_eq!(machine.pending_reversions().await, 1);

        // The first timer would have fired here
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(status(&store, "V1").await, Some(CallStatus::BeingCalled));

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(status(&store, "V1").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conditional_delete_backstop() {
        let (store, machine) = machine();
        machine.call("V1", "R1").await.unwrap();

        // Written behind the machine's back, so the timer stays armed
        store.set_missed("V1", "R1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(status(&store, "V1").await, Some(CallStatus::Missed));
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let (store, machine) = machine();

        assert_eq!(machine.reset("V9").await.unwrap(), 0);
        assert_eq!(status(&store, "V9").await, None);

        machine.mark("V9", "R1", false).await.unwrap();
        assert_eq!(machine.reset("V9").await.unwrap(), 1);
        assert_eq!(machine.reset("V9").await.unwrap(), 0);
        assert_eq!(status(&store, "V9").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_timer() {
        let (_store, machine) = machine();
        machine.call("V1", "R1").await.unwrap();
        machine.reset("V1").await.unwrap();
        assert_eq!(machine.pending_reversions().await, 0);
    }

    #[tokio::test]
    async fn test_mark_present_clears_status() {
        let (store, machine) = machine();
        machine.mark("V1", "R1", false).await.unwrap();
        assert_eq!(status(&store, "V1").await, Some(CallStatus::Missed));

        machine.mark("V1", "R1", true).await.unwrap();
        assert_eq!(status(&store, "V1").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_overrides_missed() {
        let (store, machine) = machine();
        machine.mark("V1", "R1", false).await.unwrap();
        machine.call("V1", "R1").await.unwrap();
        assert_eq!(status(&store, "V1").await, Some(CallStatus::BeingCalled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_delay_and_cancel_all() {
        let store = Arc::new(MemoryStore::new());
        let machine = CallStatusMachine::with_delay(Arc::clone(&store), Duration::from_secs(10));
        assert_eq!(machine.reversion_delay(), Duration::from_secs(10));

        machine.call("V1", "R1").await.unwrap();
        machine.call("V2", "R2").await.unwrap();
        machine.cancel_all().await;

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(status(&store, "V1").await, Some(CallStatus::BeingCalled));
        assert_eq!(status(&store, "V2").await, Some(CallStatus::BeingCalled));
    }
}
