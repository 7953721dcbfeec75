//! # Sync Queue
//!
//! Pending requests in one global FIFO, at most one entry per type.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Global FIFO with Dedup                               │
//! │                                                                         │
//! │   front                                                     back        │
//! │   ┌──────────┐  ┌──────────┐  ┌──────────┐                              │
//! │   │ contacts │  │  email   │  │ messages │  ◄── enqueue(email, force)   │
//! │   │ t=10     │  │ t=12     │  │ t=15     │                              │
//! │   └──────────┘  └────▲─────┘  └──────────┘                              │
//! │                      │                                                  │
//! │             merged in place: keeps t=12, force escalated                │
//! │                                                                         │
//! │  The UI lists queued work in this order, not in a per-type order.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::VecDeque;

use keel_core::{SyncRequest, SyncType};
use tracing::debug;

/// What `enqueue` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// New entry at the back of the queue.
    Inserted,
    /// Folded into the existing entry for the same type.
    Merged { force_escalated: bool },
}

/// FIFO of pending requests.
#[derive(Debug, Default)]
pub struct SyncQueue {
    entries: VecDeque<SyncRequest>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a request, merging with an existing entry of the same type.
    pub fn enqueue(&mut self, request: SyncRequest) -> EnqueueOutcome {
        match self.entries.iter_mut().find(|e| e.sync_type == request.sync_type) {
            Some(existing) => {
                let force_escalated = existing.merge(&request);
                debug!(
                    sync_type = %request.sync_type,
                    force_escalated,
                    "Merged duplicate sync request"
                );
                EnqueueOutcome::Merged { force_escalated }
            }
            None => {
                self.entries.push_back(request);
                EnqueueOutcome::Inserted
            }
        }
    }

    pub fn contains(&self, sync_type: &SyncType) -> bool {
        self.get(sync_type).is_some()
    }

    pub fn get(&self, sync_type: &SyncType) -> Option<&SyncRequest> {
        self.entries.iter().find(|e| &e.sync_type == sync_type)
    }

    /// Removes the entry for a type.
    pub fn remove(&mut self, sync_type: &SyncType) -> Option<SyncRequest> {
        let index = self.entries.iter().position(|e| &e.sync_type == sync_type)?;
        self.entries.remove(index)
    }

    /// Removes and returns the oldest entry matching `eligible`.
    pub fn pop_first_where<F>(&mut self, mut eligible: F) -> Option<SyncRequest>
    where
        F: FnMut(&SyncRequest) -> bool,
    {
        let index = self.entries.iter().position(|e| eligible(e))?;
        self.entries.remove(index)
    }

    /// Pending requests, oldest first.
    pub fn pending(&self) -> Vec<SyncRequest> {
        self.entries.iter().cloned().collect()
    }

    /// Empties the queue, returning entries oldest first.
    pub fn drain(&mut self) -> Vec<SyncRequest> {
        self.entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
