//! In-memory source of truth for monitored targets.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use super::target::{NewTarget, Target, TargetError, TargetUpdate};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A website with URL {0} is already registered")]
    DuplicateUrl(String),
    #[error("Website {0} not found")]
    NotFound(i32),
    #[error(transparent)]
    Invalid(#[from] TargetError),
}

#[derive(Default)]
struct RegistryState {
    targets: HashMap<i32, Target>,
    next_id: i32,
}

/// Registry of live targets.
///
/// Every operation takes the lock once, so readers never see a half-applied
/// mutation. Each successful mutation bumps a revision published on a
/// `watch` channel; the supervisor subscribes to it to reconcile right away.
pub struct TargetRegistry {
    state: RwLock<RegistryState>,
    revision_tx: watch::Sender<u64>,
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::with_targets(Vec::new())
    }

    /// Seeds the registry with already-persisted targets. Ids handed out by
    /// later `add` calls continue after the largest loaded id.
    pub fn with_targets(targets: Vec<Target>) -> Self {
        Self::with_targets_after(targets, 0)
    }

    /// Like [`with_targets`](Self::with_targets), but new ids also stay above
    /// `highest_stored_id`, which covers stored rows that were not loaded.
    pub fn with_targets_after(targets: Vec<Target>, highest_stored_id: i32) -> Self {
        let next_id = targets
            .iter()
            .map(|t| t.id)
            .chain(std::iter::once(highest_stored_id))
            .max()
            .unwrap_or(0)
            + 1;
        let targets = targets.into_iter().map(|t| (t.id, t)).collect();
        let (revision_tx, _) = watch::channel(0);
        Self {
            state: RwLock::new(RegistryState { targets, next_id }),
            revision_tx,
        }
    }

    pub fn add(&self, new_target: NewTarget) -> Result<Target, RegistryError> {
        let target = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.targets.values().any(|t| t.url == new_target.url) {
                return Err(RegistryError::DuplicateUrl(new_target.url));
            }
            let id = state.next_id;
            state.next_id += 1;
            let target = new_target.into_target(id);
            state.targets.insert(id, target.clone());
            target
        };
        debug!(website_id = target.id, url = %target.url, "Target registered.");
        self.bump_revision();
        Ok(target)
    }

    /// Applies `update` and returns the target as it was before and after.
    pub fn update(&self, id: i32, update: &TargetUpdate) -> Result<(Target, Target), RegistryError> {
        let (previous, updated) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let target = state.targets.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
            let previous = target.clone();
            update.apply(target);
            (previous, target.clone())
        };
        if !previous.same_schedule(&updated) {
            debug!(website_id = id, "Target reconfigured.");
            self.bump_revision();
        }
        Ok((previous, updated))
    }

    /// Undoes an [`update`](Self::update) by putting `previous` back, but only
    /// while the target still equals `applied`, the state that update produced.
    /// Returns `false` and leaves the target alone if it changed since.
    pub fn revert_update(&self, applied: &Target, previous: Target) -> Result<bool, RegistryError> {
        let reschedules = !applied.same_schedule(&previous);
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let target = state
                .targets
                .get_mut(&applied.id)
                .ok_or(RegistryError::NotFound(applied.id))?;
            if *target != *applied {
                return Ok(false);
            }
            *target = previous;
        }
        if reschedules {
            self.bump_revision();
        }
        Ok(true)
    }

    pub fn remove(&self, id: i32) -> Result<Target, RegistryError> {
        let removed = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .targets
            .remove(&id)
            .ok_or(RegistryError::NotFound(id))?;
        debug!(website_id = id, "Target removed.");
        self.bump_revision();
        Ok(removed)
    }

    /// Puts back a target removed by [`remove`](Self::remove), keeping its id.
    pub fn restore(&self, target: Target) -> Result<(), RegistryError> {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.targets.values().any(|t| t.url == target.url) {
                return Err(RegistryError::DuplicateUrl(target.url));
            }
            state.next_id = state.next_id.max(target.id + 1);
            state.targets.insert(target.id, target);
        }
        self.bump_revision();
        Ok(())
    }

    pub fn get(&self, id: i32) -> Result<Target, RegistryError> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .targets
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    pub fn find_by_url(&self, url: &str) -> Option<Target> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .targets
            .values()
            .find(|t| t.url == url)
            .cloned()
    }

    /// Snapshot of all live targets, in no particular order.
    pub fn list(&self) -> Vec<Target> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .targets
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receiver that changes whenever the set of targets or their schedules change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    fn bump_revision(&self) {
        self.revision_tx.send_modify(|revision| *revision += 1);
    }
}
