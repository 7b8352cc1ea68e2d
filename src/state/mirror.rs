//! Single-slot subscription cell: one mirrored value, at most one live forwarding task.

use std::sync::Arc;

use futures::StreamExt;
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::dao::document_store::SnapshotStream;

/// Local mirror of remote state, written only by the current subscription.
///
/// Rebinding bumps a generation under the same lock the forwarding task takes before
/// publishing, so a replaced subscription can never publish after its replacement.
pub struct Mirror<T> {
    shared: Arc<Shared<T>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Shared<T> {
    value: watch::Sender<T>,
    generation: Mutex<u64>,
}

impl<T: PartialEq> Shared<T> {
    fn publish(&self, value: T) {
        self.value.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}

impl<T> Mirror<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create an unbound mirror holding `initial`.
    pub fn new(initial: T) -> Self {
        let (value, _) = watch::channel(initial);
        Self {
            shared: Arc::new(Shared {
                value,
                generation: Mutex::new(0),
            }),
            task: Mutex::new(None),
        }
    }

    /// Receiver notified on every change of the mirrored value.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.shared.value.subscribe()
    }

    /// Clone of the mirrored value.
    pub fn current(&self) -> T {
        self.shared.value.borrow().clone()
    }

    /// Whether a subscription is currently feeding the mirror.
    pub async fn is_bound(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Replace the live subscription with one publishing `project(snapshot)` for every
    /// snapshot of `snapshots`.
    pub async fn bind<U, F>(&self, snapshots: SnapshotStream<U>, label: &'static str, project: F)
    where
        U: Send + 'static,
        F: Fn(U) -> T + Send + 'static,
    {
        let mut task = self.task.lock().await;
        let generation = {
            let mut current = self.shared.generation.lock().await;
            *current += 1;
            *current
        };
        if let Some(previous) = task.take() {
            previous.abort();
        }
        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(forward(
            shared, generation, snapshots, label, project,
        )));
    }

    /// Cancel the live subscription, publishing `reset` if given.
    pub async fn release(&self, reset: Option<T>) {
        let mut task = self.task.lock().await;
        {
            let mut current = self.shared.generation.lock().await;
            *current += 1;
            if let Some(value) = reset {
                self.shared.publish(value);
            }
        }
        if let Some(previous) = task.take() {
            previous.abort();
        }
    }
}

impl<T> Drop for Mirror<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

async fn forward<T, U, F>(
    shared: Arc<Shared<T>>,
    generation: u64,
    mut snapshots: SnapshotStream<U>,
    label: &'static str,
    project: F,
) where
    T: PartialEq,
    F: Fn(U) -> T,
{
    while let Some(next) = snapshots.next().await {
        match next {
            Ok(snapshot) => {
                let value = project(snapshot);
                let current = shared.generation.lock().await;
                if *current != generation {
                    return;
                }
                shared.publish(value);
            }
            Err(err) => {
                warn!(subscription = label, error = %err, "subscription failed; mirrored state is stale until resubscribed");
                return;
            }
        }
    }
    debug!(subscription = label, "subscription stream ended");
}
