use std::collections::VecDeque;

use chrono::Utc;
use tracing::{debug, warn};

use super::{
    backing::{Backing, ListQuery, MirrorError, MirrorItem, MirrorResult},
    reducer::{reduce, ListAction, ListState},
};

/// Keys handed out before a backing confirms an add start with this prefix.
pub const PROVISIONAL_PREFIX: &str = "pending-";

pub fn is_provisional(key: &str) -> bool {
    key.starts_with(PROVISIONAL_PREFIX)
}

/// When local changes reach the backing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Every mutation awaits the backing and is undone if it fails.
    WriteThrough,
    /// Mutations queue up until `flush`.
    WriteBehind,
}

#[derive(Debug, Clone)]
pub enum PendingWrite<T: MirrorItem> {
    Add { key: String, draft: T::Draft },
    Update { key: String, patch: T::Patch },
    Remove { key: String },
}

impl<T: MirrorItem> PendingWrite<T> {
    pub fn key(&self) -> &str {
        match self {
            PendingWrite::Add { key, .. }
            | PendingWrite::Update { key, .. }
            | PendingWrite::Remove { key } => key,
        }
    }

    fn rekey(&mut self, from: &str, to: &str) {
        let key = match self {
            PendingWrite::Add { key, .. }
            | PendingWrite::Update { key, .. }
            | PendingWrite::Remove { key } => key,
        };
        if key == from {
            *key = to.to_string();
        }
    }
}

/// A list held in memory and kept in sync with a backing.
///
/// Every change goes through [`reduce`]; the list only decides which actions
/// to dispatch and when to talk to the backing.
pub struct MirroredList<T: MirrorItem, B: Backing<T>> {
    backing: B,
    mode: SyncMode,
    query: ListQuery,
    state: ListState<T>,
    pending: VecDeque<PendingWrite<T>>,
    next_provisional: u64,
}

impl<T: MirrorItem, B: Backing<T>> MirroredList<T, B> {
    pub fn new(backing: B, mode: SyncMode) -> Self {
        MirroredList {
            backing,
            mode,
            query: ListQuery::default(),
            state: ListState::default(),
            pending: VecDeque::new(),
            next_provisional: 0,
        }
    }

    pub fn with_query(mut self, query: ListQuery) -> Self {
        self.query = query;
        self
    }

    pub fn state(&self) -> &ListState<T> {
        &self.state
    }

    pub fn items(&self) -> &[T] {
        &self.state.items
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingWrite<T>> {
        self.pending.iter()
    }

    fn dispatch(&mut self, action: ListAction<T>) {
        self.state = reduce(std::mem::take(&mut self.state), action);
    }

    fn fail(&mut self, err: MirrorError) -> MirrorError {
        self.dispatch(ListAction::Failed(err.to_string()));
        err
    }

    fn rollback(&mut self, snapshot: ListState<T>, err: MirrorError) -> MirrorError {
        warn!(error = %err, "write failed, rolling back optimistic change");
        self.dispatch(ListAction::RolledBack {
            snapshot: Box::new(snapshot),
            error: err.to_string(),
        });
        err
    }

    fn provisional_key(&mut self) -> String {
        self.next_provisional += 1;
        format!("{PROVISIONAL_PREFIX}{}", self.next_provisional)
    }

    /// Reloads the current page from the backing.
    pub async fn refresh(&mut self) -> MirrorResult<()> {
        if !self.pending.is_empty() {
            return Err(self.fail(MirrorError::Conflict(format!(
                "{} unflushed writes would be discarded by a refresh",
                self.pending.len()
            ))));
        }
        self.dispatch(ListAction::FetchStarted);
        match self.backing.fetch(&self.query).await {
            Ok(page) => {
                debug!(items = page.items.len(), total = page.pagination.total_items, "list refreshed");
                self.dispatch(ListAction::Fetched(page));
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Changes the query and reloads.
    pub async fn load(&mut self, query: ListQuery) -> MirrorResult<()> {
        self.query = query;
        self.refresh().await
    }

    pub async fn add(&mut self, draft: T::Draft) -> MirrorResult<T> {
        self.dispatch(ListAction::ClearError);
        if let Err(e) = T::validate_draft(&draft) {
            return Err(self.fail(e.into()));
        }
        let owner = self.backing.owner().to_string();
        if self.state.items.iter().any(|i| i.conflicts_with(&owner, &draft)) {
            return Err(self.fail(MirrorError::Conflict("item is already in the list".to_string())));
        }

        let key = self.provisional_key();
        let item = T::from_draft(key.clone(), &owner, &draft, Utc::now());
        let snapshot = self.state.clone();
        self.dispatch(ListAction::Added(item.clone()));

        match self.mode {
            SyncMode::WriteThrough => match self.backing.add(&draft).await {
                Ok(confirmed) => {
                    self.dispatch(ListAction::Replaced {
                        key,
                        item: confirmed.clone(),
                    });
                    Ok(confirmed)
                }
                Err(e) => Err(self.rollback(snapshot, e)),
            },
            SyncMode::WriteBehind => {
                self.pending.push_back(PendingWrite::Add { key, draft });
                Ok(item)
            }
        }
    }

    pub async fn update(&mut self, key: &str, patch: T::Patch) -> MirrorResult<T> {
        self.dispatch(ListAction::ClearError);
        if let Err(e) = T::validate_patch(&patch) {
            return Err(self.fail(e.into()));
        }
        let Some(current) = self.state.get(key).cloned() else {
            return Err(self.fail(MirrorError::NotFound(format!("no item with key {key}"))));
        };

        let mut item = current;
        item.apply_patch(&patch, Utc::now());
        let snapshot = self.state.clone();
        self.dispatch(ListAction::Replaced {
            key: key.to_string(),
            item: item.clone(),
        });

        match self.mode {
            SyncMode::WriteThrough => match self.backing.update(key, &patch).await {
                Ok(confirmed) => {
                    self.dispatch(ListAction::Replaced {
                        key: key.to_string(),
                        item: confirmed.clone(),
                    });
                    Ok(confirmed)
                }
                Err(e) => Err(self.rollback(snapshot, e)),
            },
            SyncMode::WriteBehind => {
                self.pending.push_back(PendingWrite::Update {
                    key: key.to_string(),
                    patch,
                });
                Ok(item)
            }
        }
    }

    pub async fn remove(&mut self, key: &str) -> MirrorResult<()> {
        self.dispatch(ListAction::ClearError);
        if self.state.get(key).is_none() {
            return Err(self.fail(MirrorError::NotFound(format!("no item with key {key}"))));
        }
        let snapshot = self.state.clone();
        self.dispatch(ListAction::Removed(key.to_string()));

        match self.mode {
            SyncMode::WriteThrough => match self.backing.remove(key).await {
                Ok(()) => Ok(()),
                Err(e) => Err(self.rollback(snapshot, e)),
            },
            SyncMode::WriteBehind => {
                if is_provisional(key) {
                    // Never reached the backing: drop its queued writes instead.
                    self.pending.retain(|w| w.key() != key);
                } else {
                    self.pending.push_back(PendingWrite::Remove {
                        key: key.to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Re-applies updates still queued behind the head write, so a confirmed
    /// record never hides a change that has not reached the backing yet.
    fn with_queued_patches(&self, mut item: T) -> T {
        let now = Utc::now();
        for write in self.pending.iter().skip(1) {
            if let PendingWrite::Update { key, patch } = write {
                if key == item.key() {
                    item.apply_patch(patch, now);
                }
            }
        }
        item
    }

    /// Replays queued writes in order and returns how many were applied.
    ///
    /// Stops at the first failure, which stays at the head of the queue.
    pub async fn flush(&mut self) -> MirrorResult<usize> {
        let mut applied = 0;
        while let Some(write) = self.pending.front().cloned() {
            let result = match &write {
                PendingWrite::Add { key, draft } => self.backing.add(draft).await.map(|confirmed| {
                    let server_key = confirmed.key().to_string();
                    for queued in self.pending.iter_mut().skip(1) {
                        queued.rekey(key, &server_key);
                    }
                    let item = self.with_queued_patches(confirmed);
                    self.dispatch(ListAction::Replaced {
                        key: key.clone(),
                        item,
                    });
                }),
                PendingWrite::Update { key, patch } => {
                    self.backing.update(key, patch).await.map(|confirmed| {
                        let item = self.with_queued_patches(confirmed);
                        self.dispatch(ListAction::Replaced {
                            key: key.clone(),
                            item,
                        });
                    })
                }
                PendingWrite::Remove { key } => self.backing.remove(key).await,
            };

            match result {
                Ok(()) => {
                    self.pending.pop_front();
                    applied += 1;
                }
                Err(e) => {
                    warn!(key = write.key(), error = %e, remaining = self.pending.len(), "flush stopped");
                    return Err(self.fail(e));
                }
            }
        }
        self.dispatch(ListAction::ClearError);
        debug!(applied, "pending writes flushed");
        Ok(applied)
    }
}
