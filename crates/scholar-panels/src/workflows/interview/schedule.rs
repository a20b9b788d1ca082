use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PendingJob {
    generation: u64,
    job: Job,
    timer: Option<JoinHandle<()>>,
}

struct Slots<K> {
    next_generation: u64,
    pending: HashMap<K, PendingJob>,
}

/// Cancelable delayed jobs, at most one outstanding per key.
///
/// Scheduling a key that already has a job replaces it and restarts the delay. Timers run on
/// the ambient tokio runtime; without one, the job is held until `fire_now` or `cancel`.
pub struct SaveScheduler<K> {
    slots: Arc<Mutex<Slots<K>>>,
}

impl<K> Default for SaveScheduler<K> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_generation: 0,
                pending: HashMap::new(),
            })),
        }
    }
}

impl<K> fmt::Debug for SaveScheduler<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self
            .slots
            .lock()
            .map(|slots| slots.pending.len())
            .unwrap_or(0);
        f.debug_struct("SaveScheduler")
            .field("pending", &pending)
            .finish()
    }
}

impl<K> SaveScheduler<K>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, key: K, delay: Duration, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slots = self.slots.lock().expect("scheduler mutex poisoned");
        slots.next_generation += 1;
        let generation = slots.next_generation;

        let timer = match Handle::try_current() {
            Ok(runtime) => {
                let shared = Arc::clone(&self.slots);
                let owner = key.clone();
                Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let due = {
                        let mut slots = shared.lock().expect("scheduler mutex poisoned");
                        match slots.pending.get(&owner) {
                            Some(entry) if entry.generation == generation => {
                                slots.pending.remove(&owner).map(|entry| entry.job)
                            }
                            _ => None,
                        }
                    };
                    if let Some(job) = due {
                        debug!(key = ?owner, "delayed job fired");
                        job();
                    }
                }))
            }
            Err(_) => {
                debug!(key = ?key, "no runtime available; job waits for an explicit flush");
                None
            }
        };

        let replaced = slots.pending.insert(
            key,
            PendingJob {
                generation,
                job: Box::new(job),
                timer,
            },
        );
        if let Some(previous) = replaced {
            abort(previous);
        }
    }

    /// Drop the pending job for `key` without running it.
    pub fn cancel(&self, key: &K) -> bool {
        let removed = self
            .slots
            .lock()
            .expect("scheduler mutex poisoned")
            .pending
            .remove(key);
        match removed {
            Some(entry) => {
                abort(entry);
                true
            }
            None => false,
        }
    }

    /// Run the pending job for `key` now, on the calling thread. Returns false if none was pending.
    pub fn fire_now(&self, key: &K) -> bool {
        let removed = self
            .slots
            .lock()
            .expect("scheduler mutex poisoned")
            .pending
            .remove(key);
        match removed {
            Some(entry) => {
                if let Some(timer) = entry.timer {
                    timer.abort();
                }
                (entry.job)();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.slots
            .lock()
            .expect("scheduler mutex poisoned")
            .pending
            .contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.slots
            .lock()
            .expect("scheduler mutex poisoned")
            .pending
            .len()
    }
}

fn abort(entry: PendingJob) {
    if let Some(timer) = entry.timer {
        timer.abort();
    }
}
