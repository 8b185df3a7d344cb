//! Shared request state

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::board::QueueBoard;
use crate::call::CallDesk;
use crate::calendar::BusinessDay;
use crate::registry::ConnectionRegistry;
use crate::router::RouterHandle;
use crate::status::CallStatusMachine;
use crate::store::QueueStore;
use crate::tts::{AudioGenerator, SpeechSynthesizer};

/// Everything a handler needs, cheap to clone per request
pub struct AppState<S, V> {
    pub store: Arc<S>,
    pub registry: Arc<ConnectionRegistry>,
    pub status: Arc<CallStatusMachine<S>>,
    pub board: Arc<QueueBoard<S>>,
    pub desk: CallDesk<S, V>,
    connection_limit: Option<Arc<Semaphore>>,
    fixed_day: Option<BusinessDay>,
}

impl<S: QueueStore, V: SpeechSynthesizer> AppState<S, V> {
    pub fn new(
        store: Arc<S>,
        registry: Arc<ConnectionRegistry>,
        router: RouterHandle,
        status: Arc<CallStatusMachine<S>>,
        audio: Arc<AudioGenerator<V>>,
        audio_timeout: Duration,
        max_connections: usize,
    ) -> Self {
        let connection_limit = if max_connections > 0 {
            Some(Arc::new(Semaphore::new(max_connections)))
        } else {
            None
        };

        Self {
            board: Arc::new(QueueBoard::new(Arc::clone(&store))),
            desk: CallDesk::new(router, Arc::clone(&status), audio).audio_timeout(audio_timeout),
            store,
            registry,
            status,
            connection_limit,
            fixed_day: None,
        }
    }

    /// Pin the business day instead of following the clock
    pub fn with_fixed_day(mut self, day: BusinessDay) -> Self {
        self.set_fixed_day(day);
        self
    }

    pub fn set_fixed_day(&mut self, day: BusinessDay) {
        self.fixed_day = Some(day);
    }

    /// Business day used by every queue query
    pub fn today(&self) -> BusinessDay {
        self.fixed_day.clone().unwrap_or_else(BusinessDay::today)
    }

    /// Reserve a push connection slot; `None` once the limit is reached
    pub fn acquire_connection(&self) -> Option<ConnectionSlot> {
        match &self.connection_limit {
            Some(sem) => sem
                .clone()
                .try_acquire_owned()
                .ok()
                .map(|permit| ConnectionSlot(Some(permit))),
            None => Some(ConnectionSlot(None)),
        }
    }
}

/// Held by a push connection for its lifetime
#[derive(Debug)]
pub struct ConnectionSlot(#[allow(dead_code)] Option<OwnedSemaphorePermit>);

impl<S, V> Clone for AppState<S, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            status: Arc::clone(&self.status),
            board: Arc::clone(&self.board),
            desk: self.desk.clone(),
            connection_limit: self.connection_limit.clone(),
            fixed_day: self.fixed_day.clone(),
        }
    }
}
