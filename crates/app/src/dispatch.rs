//! Background task dispatch and hand-off to the UI loop.
//!
//! Every user action that touches the database becomes one task. Tasks run
//! on the tokio pool, bounded by a semaphore, and finish by sending a
//! continuation over a bounded channel. Only [`UiLoop`] applies
//! continuations, so UI state has exactly one writer.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use metrics::counter;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

use crate::state::Screen;

/// Work slot within a screen. Two tasks with the same screen and slot
/// compete; the later one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    List,
    Lookup,
    Mutation,
    Kpis,
    Revenue,
    TopProducts,
    Results,
    Files,
}

impl Slot {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Lookup => "lookup",
            Self::Mutation => "mutation",
            Self::Kpis => "kpis",
            Self::Revenue => "revenue",
            Self::TopProducts => "top_products",
            Self::Results => "results",
            Self::Files => "files",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub screen: Screen,
    pub slot: Slot,
}

impl TaskKey {
    pub const fn new(screen: Screen, slot: Slot) -> Self {
        Self { screen, slot }
    }
}

/// Identifies one submission. A superseding ticket stays relevant until
/// another task is submitted under its key or its screen is navigated away
/// from. A committed ticket carries no generation and is always relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub key: TaskKey,
    generation: Option<u64>,
}

pub type Continuation<S> = Box<dyn FnOnce(&mut S) + Send>;

/// A finished task waiting to be applied on the UI loop.
pub struct Update<S> {
    pub ticket: Ticket,
    apply: Continuation<S>,
}

#[derive(Clone, Default)]
struct Generations(Arc<Mutex<HashMap<TaskKey, u64>>>);

impl Generations {
    fn lock(&self) -> MutexGuard<'_, HashMap<TaskKey, u64>> {
        // The map holds plain counters; a panic mid-update cannot corrupt it.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn advance(&self, key: TaskKey) -> Ticket {
        let mut map = self.lock();
        let generation = map.entry(key).or_insert(0);
        *generation += 1;
        Ticket {
            key,
            generation: Some(*generation),
        }
    }

    fn bump(&self, key: TaskKey) {
        *self.lock().entry(key).or_insert(0) += 1;
    }

    fn bump_screen(&self, screen: Screen) {
        for (key, generation) in self.lock().iter_mut() {
            if key.screen == screen {
                *generation += 1;
            }
        }
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        match ticket.generation {
            Some(generation) => self.lock().get(&ticket.key) == Some(&generation),
            None => true,
        }
    }
}

/// Submits background tasks whose results are applied to `S` on the UI loop.
pub struct Dispatcher<S> {
    generations: Generations,
    workers: Arc<Semaphore>,
    updates: mpsc::Sender<Update<S>>,
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            generations: self.generations.clone(),
            workers: Arc::clone(&self.workers),
            updates: self.updates.clone(),
        }
    }
}

impl<S: 'static> Dispatcher<S> {
    /// Creates a dispatcher and the single consumer of its updates.
    pub fn new(max_workers: usize, queue_depth: usize) -> (Self, UiLoop<S>) {
        let (updates, receiver) = mpsc::channel(queue_depth.max(1));
        let generations = Generations::default();
        let dispatcher = Self {
            generations: generations.clone(),
            workers: Arc::new(Semaphore::new(max_workers.max(1))),
            updates,
        };
        (
            dispatcher,
            UiLoop {
                receiver,
                generations,
            },
        )
    }

    /// Runs `task` in the background and schedules `render` with its output
    /// on the UI loop. Supersedes any earlier task submitted under `key`.
    /// Use for reads whose result is only worth showing while it is current.
    pub fn submit<T, F, R>(&self, key: TaskKey, task: F, render: R) -> Ticket
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        R: FnOnce(&mut S, T) + Send + 'static,
    {
        let ticket = self.generations.advance(key);
        self.spawn(ticket, task, render);
        ticket
    }

    /// Runs `task` to completion no matter what is submitted or navigated
    /// afterwards, and always applies `render`. Use for mutations, whose
    /// outcome the user must see.
    pub fn submit_committed<T, F, R>(&self, key: TaskKey, task: F, render: R) -> Ticket
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        R: FnOnce(&mut S, T) + Send + 'static,
    {
        let ticket = Ticket {
            key,
            generation: None,
        };
        self.spawn(ticket, task, render);
        ticket
    }

    fn spawn<T, F, R>(&self, ticket: Ticket, task: F, render: R)
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        R: FnOnce(&mut S, T) + Send + 'static,
    {
        let key = ticket.key;
        counter!("dispatch_tasks_total", "screen" => key.screen.as_str(), "slot" => key.slot.as_str())
            .increment(1);

        let generations = self.generations.clone();
        let workers = Arc::clone(&self.workers);
        let updates = self.updates.clone();

        tokio::spawn(async move {
            let Ok(permit) = workers.acquire_owned().await else {
                return;
            };
            if !generations.is_current(ticket) {
                superseded(ticket, "before start");
                return;
            }

            let output = task.await;
            drop(permit);

            if !generations.is_current(ticket) {
                superseded(ticket, "after finish");
                return;
            }

            let update = Update {
                ticket,
                apply: Box::new(move |state: &mut S| render(state, output)),
            };
            if updates.send(update).await.is_err() {
                debug!(stage = "dispatch", screen = ticket.key.screen.as_str(), "ui loop closed; dropping update");
            }
        });
    }

    /// Makes any in-flight task under `key` irrelevant.
    pub fn invalidate(&self, key: TaskKey) {
        self.generations.bump(key);
    }

    /// Makes every in-flight task of `screen` irrelevant. Called on navigation.
    pub fn invalidate_screen(&self, screen: Screen) {
        self.generations.bump_screen(screen);
        debug!(stage = "dispatch", screen = screen.as_str(), "screen tasks invalidated");
    }
}

fn superseded(ticket: Ticket, phase: &'static str) {
    counter!("dispatch_superseded_total", "screen" => ticket.key.screen.as_str()).increment(1);
    debug!(
        stage = "dispatch",
        screen = ticket.key.screen.as_str(),
        slot = ticket.key.slot.as_str(),
        phase,
        "task superseded"
    );
}

/// Receiving end of the dispatcher. Owned by the UI loop.
pub struct UiLoop<S> {
    receiver: mpsc::Receiver<Update<S>>,
    generations: Generations,
}

impl<S> UiLoop<S> {
    /// Waits for the next finished task. `None` once every dispatcher is gone.
    pub async fn next_update(&mut self) -> Option<Update<S>> {
        self.receiver.recv().await
    }

    /// Applies `update` unless it was superseded while queued. Returns whether
    /// the state changed.
    pub fn apply(&self, state: &mut S, update: Update<S>) -> bool {
        let ticket = update.ticket;
        if !self.generations.is_current(ticket) {
            superseded(ticket, "queued");
            return false;
        }
        (update.apply)(state);
        counter!("dispatch_applied_total", "screen" => ticket.key.screen.as_str()).increment(1);
        true
    }

    /// Applies every update already waiting without blocking. Returns how many
    /// were applied.
    pub fn drain(&mut self, state: &mut S) -> usize {
        let mut applied = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(update) => {
                    if self.apply(state, update) {
                        applied += 1;
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => return applied,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    warn!(stage = "dispatch", "update channel disconnected");
                    return applied;
                }
            }
        }
    }
}
