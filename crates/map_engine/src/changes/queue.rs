//! # Change Queue
//!
//! Multi-producer, single-consumer command list. Producers append under a
//! short lock; the render thread swaps the whole list out once per frame so
//! producers keep appending to a fresh list while the old one is applied.
//!
//! Every drain is one *cycle*. A [`DrainTicket`] names the cycle that will
//! carry a command, which lets a producer block until its commands have been
//! applied. Waiters are woken once per cycle, not once per command.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use super::command::{ChangeCommand, ChangeSet};
use crate::foundation::sync::lock;

/// Names the drain cycle that will apply a batch of commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrainTicket {
    cycle: u64,
}

impl DrainTicket {
    /// Zero-based index of the drain cycle
    pub const fn cycle(self) -> u64 {
        self.cycle
    }
}

#[derive(Debug, Default)]
struct Pending {
    commands: Vec<ChangeCommand>,
    cycle: u64,
}

/// Ordered queue of scene mutations
#[derive(Debug, Default)]
pub struct ChangeQueue {
    pending: Mutex<Pending>,
    /// Number of drain cycles fully applied
    completed: Mutex<u64>,
    applied: Condvar,
}

impl ChangeQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one command
    pub fn enqueue(&self, command: ChangeCommand) -> DrainTicket {
        let mut pending = lock(&self.pending);
        pending.commands.push(command);
        DrainTicket {
            cycle: pending.cycle,
        }
    }

    /// Append a whole change set contiguously
    pub fn enqueue_all(&self, changes: ChangeSet) -> DrainTicket {
        let mut pending = lock(&self.pending);
        pending.commands.extend(changes.into_commands());
        DrainTicket {
            cycle: pending.cycle,
        }
    }

    /// Number of commands waiting for the next drain
    pub fn pending_len(&self) -> usize {
        lock(&self.pending).commands.len()
    }

    /// Number of drain cycles applied so far
    pub fn completed_cycles(&self) -> u64 {
        *lock(&self.completed)
    }

    /// Swap out the pending commands and hand them to `apply` as one batch
    ///
    /// Render thread only. Waiters for this cycle are released after `apply`
    /// returns.
    pub fn drain_with<R>(&self, apply: impl FnOnce(Vec<ChangeCommand>) -> R) -> R {
        let (commands, cycle) = {
            let mut pending = lock(&self.pending);
            let cycle = pending.cycle;
            pending.cycle += 1;
            (std::mem::take(&mut pending.commands), cycle)
        };

        let result = apply(commands);

        *lock(&self.completed) = cycle + 1;
        self.applied.notify_all();
        result
    }

    /// Drain and apply each command in submission order
    ///
    /// Returns the number of commands applied.
    pub fn drain_and_apply(&self, mut apply: impl FnMut(ChangeCommand)) -> usize {
        self.drain_with(|commands| {
            let count = commands.len();
            for command in commands {
                apply(command);
            }
            count
        })
    }

    /// Block until the cycle named by `ticket` has been applied
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_for(&self, ticket: DrainTicket, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut completed = lock(&self.completed);

        while *completed <= ticket.cycle {
            completed = match deadline {
                None => self
                    .applied
                    .wait(completed)
                    .unwrap_or_else(std::sync::PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.applied
                        .wait_timeout(completed, deadline - now)
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .0
                }
            };
        }
        true
    }
}
