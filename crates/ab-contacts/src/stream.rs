//! Bulk enumeration
//!
//! A traversal runs on its own tokio task, paging through the store and
//! normalizing as it goes. The caller consumes an [`Enumeration`]: zero or
//! more `Progress` events followed by exactly one terminal item, either
//! `Completed` with every contact or an `Err(StoreUnavailable)`.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ContactsError, Result};
use crate::models::NormalizedContact;
use crate::normalize::normalize;
use crate::store::{ContactStore, EnumerationSlot};

const EVENT_BUFFER: usize = 16;

/// Tuning for bulk enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationOptions {
    /// Records fetched per store round-trip
    pub page_size: usize,
    /// Minimum percent advance between two progress events
    pub progress_step: u8,
    /// Reject a second concurrent enumeration with `Busy`
    pub exclusive: bool,
}

impl Default for EnumerationOptions {
    fn default() -> Self {
        Self {
            page_size: 50,
            progress_step: 1,
            exclusive: false,
        }
    }
}

/// Item yielded by an [`Enumeration`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumerationEvent {
    /// Percent of records processed, in `1..=100`
    Progress(u8),
    /// Every contact, in store order
    Completed(Vec<NormalizedContact>),
}

/// Lifecycle of a traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnumerationState {
    Idle = 0,
    Enumerating = 1,
    Completed = 2,
    Failed = 3,
}

impl EnumerationState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Enumerating,
            2 => Self::Completed,
            3 => Self::Failed,
            _ => Self::Idle,
        }
    }
}

/// Turns a processed-record count into coarse, non-decreasing percentages
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    step: u8,
    last: u8,
}

impl ProgressTracker {
    pub fn new(total: usize, step: u8) -> Self {
        Self {
            total,
            step: step.max(1),
            last: 0,
        }
    }

    /// Percent to report after `processed` records, if one is due
    pub fn advance(&mut self, processed: usize) -> Option<u8> {
        if self.total == 0 || processed == 0 {
            return None;
        }

        let processed = processed.min(self.total);
        let percent = (processed * 100).div_ceil(self.total).clamp(1, 100) as u8;

        if percent <= self.last {
            return None;
        }
        if percent == 100 || percent - self.last >= self.step {
            self.last = percent;
            return Some(percent);
        }
        None
    }
}

/// A running traversal
///
/// Dropping it stops the traversal task.
pub struct Enumeration {
    events: mpsc::Receiver<Result<EnumerationEvent>>,
    state: Arc<AtomicU8>,
    task: JoinHandle<()>,
}

impl Enumeration {
    pub(crate) fn start(
        store: Arc<dyn ContactStore>,
        options: EnumerationOptions,
        slot: Option<EnumerationSlot>,
    ) -> Self {
        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let state = Arc::new(AtomicU8::new(EnumerationState::Idle as u8));
        let task = tokio::spawn(traverse(store, options, tx, Arc::clone(&state), slot));

        Self {
            events,
            state,
            task,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> EnumerationState {
        EnumerationState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Next event, `None` once the terminal item has been taken
    pub async fn next_event(&mut self) -> Option<Result<EnumerationEvent>> {
        self.events.recv().await
    }

    /// Drain the traversal, reporting progress, and return every contact
    pub async fn collect_with<F>(mut self, mut on_progress: F) -> Result<Vec<NormalizedContact>>
    where
        F: FnMut(u8),
    {
        while let Some(event) = self.events.recv().await {
            match event? {
                EnumerationEvent::Progress(percent) => on_progress(percent),
                EnumerationEvent::Completed(contacts) => return Ok(contacts),
            }
        }

        // The task went away without a terminal event (it panicked).
        self.state
            .store(EnumerationState::Failed as u8, Ordering::SeqCst);
        Err(ContactsError::StoreUnavailable(
            "enumeration ended without completing".to_string(),
        ))
    }
}

impl Stream for Enumeration {
    type Item = Result<EnumerationEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

impl Drop for Enumeration {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum Interrupted {
    /// The consumer dropped the enumeration
    Cancelled,
    Failed(ContactsError),
}

async fn traverse(
    store: Arc<dyn ContactStore>,
    options: EnumerationOptions,
    tx: mpsc::Sender<Result<EnumerationEvent>>,
    state: Arc<AtomicU8>,
    slot: Option<EnumerationSlot>,
) {
    state.store(EnumerationState::Enumerating as u8, Ordering::SeqCst);
    debug!("Enumerating {} (page size {})", store.name(), options.page_size);

    let outcome = walk(store.as_ref(), &options, &tx).await;

    // The slot is free before the terminal event is sent.
    drop(slot);

    match outcome {
        Ok(contacts) => {
            state.store(EnumerationState::Completed as u8, Ordering::SeqCst);
            info!("Enumerated {} contacts from {}", contacts.len(), store.name());
            let _ = tx.send(Ok(EnumerationEvent::Completed(contacts))).await;
        }
        Err(Interrupted::Cancelled) => {
            debug!("Enumeration of {} dropped by consumer", store.name());
        }
        Err(Interrupted::Failed(e)) => {
            state.store(EnumerationState::Failed as u8, Ordering::SeqCst);
            warn!("Enumeration of {} failed: {}", store.name(), e);
            let _ = tx.send(Err(e.into_unavailable())).await;
        }
    }
}

async fn walk(
    store: &dyn ContactStore,
    options: &EnumerationOptions,
    tx: &mpsc::Sender<Result<EnumerationEvent>>,
) -> std::result::Result<Vec<NormalizedContact>, Interrupted> {
    let total = store.count().await.map_err(Interrupted::Failed)?;
    let page_size = options.page_size.max(1);
    let mut tracker = ProgressTracker::new(total, options.progress_step);
    let mut contacts = Vec::with_capacity(total);

    let mut start = 0;
    while start < total {
        let len = page_size.min(total - start);
        let page = store.page(start, len).await.map_err(Interrupted::Failed)?;

        if page.len() != len {
            return Err(Interrupted::Failed(ContactsError::StoreUnavailable(format!(
                "store changed during traversal: expected {} records at {}, got {}",
                len,
                start,
                page.len()
            ))));
        }

        contacts.extend(page.into_iter().map(normalize));
        start += len;

        if let Some(percent) = tracker.advance(start) {
            if tx.send(Ok(EnumerationEvent::Progress(percent))).await.is_err() {
                return Err(Interrupted::Cancelled);
            }
        }
    }

    Ok(contacts)
}
