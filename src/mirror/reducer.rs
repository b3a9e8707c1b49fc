use super::backing::MirrorItem;
use crate::models::{Page, Pagination};

/// In-memory view of one page of a list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
    pub items: Vec<T>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub pagination: Option<Pagination>,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        ListState {
            items: Vec::new(),
            is_loading: false,
            error: None,
            pagination: None,
        }
    }
}

impl<T: MirrorItem> ListState<T> {
    pub fn get(&self, key: &str) -> Option<&T> {
        self.items.iter().find(|item| item.key() == key)
    }
}

#[derive(Debug, Clone)]
pub enum ListAction<T> {
    FetchStarted,
    Fetched(Page<T>),
    Failed(String),
    ClearError,
    /// Prepends a new record.
    Added(T),
    /// Swaps the record stored under `key`, which may change its key.
    Replaced { key: String, item: T },
    Removed(String),
    /// Restores a snapshot taken before an optimistic change.
    RolledBack { snapshot: Box<ListState<T>>, error: String },
}

fn recount(pagination: Option<Pagination>, total_items: u64) -> Option<Pagination> {
    pagination.map(|p| Pagination::new(p.current_page, p.items_per_page, total_items))
}

pub fn reduce<T: MirrorItem>(mut state: ListState<T>, action: ListAction<T>) -> ListState<T> {
    match action {
        ListAction::FetchStarted => {
            state.is_loading = true;
            state.error = None;
        }
        ListAction::Fetched(page) => {
            state.items = page.items;
            state.pagination = Some(page.pagination);
            state.is_loading = false;
        }
        ListAction::Failed(error) => {
            state.is_loading = false;
            state.error = Some(error);
        }
        ListAction::ClearError => state.error = None,
        ListAction::Added(item) => {
            state.items.insert(0, item);
            let total = state.pagination.map_or(0, |p| p.total_items) + 1;
            state.pagination = recount(state.pagination, total);
        }
        ListAction::Replaced { key, item } => {
            if let Some(slot) = state.items.iter_mut().find(|i| i.key() == key) {
                *slot = item;
            }
        }
        ListAction::Removed(key) => {
            let before = state.items.len();
            state.items.retain(|i| i.key() != key);
            if state.items.len() < before {
                let total = state.pagination.map_or(0, |p| p.total_items.saturating_sub(1));
                state.pagination = recount(state.pagination, total);
            }
        }
        ListAction::RolledBack { snapshot, error } => {
            state = *snapshot;
            state.is_loading = false;
            state.error = Some(error);
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        watchlist_model::{WatchlistAdd, WatchlistEntry},
        PageRequest,
    };
    use chrono::Utc;

    fn entry(key: &str, movie_id: &str) -> WatchlistEntry {
        WatchlistEntry::from_draft(key.into(), "u1", &WatchlistAdd::for_movie(movie_id), Utc::now())
    }

    fn loaded(total: u64) -> ListState<WatchlistEntry> {
        let items = (0..total.min(20))
            .map(|i| entry(&format!("k{i}"), &format!("tt{i:07}")))
            .collect();
        reduce(
            ListState::default(),
            ListAction::Fetched(Page::new(items, PageRequest { page: 1, limit: 20 }, total)),
        )
    }

    #[test]
    fn fetch_lifecycle() {
        let state = reduce(ListState::<WatchlistEntry>::default(), ListAction::FetchStarted);
        assert!(state.is_loading);
        let state = reduce(state, ListAction::Failed("offline".into()));
        assert!(!state.is_loading);
        assert_eq!(state.error.as_deref(), Some("offline"));
        let state = reduce(state, ListAction::FetchStarted);
        assert_eq!(state.error, None);
    }

    #[test]
    fn add_prepends_and_recounts() {
        let state = loaded(20);
        assert_eq!(state.pagination.unwrap().total_pages, 1);

        let state = reduce(state, ListAction::Added(entry("new", "tt9999999")));
        assert_eq!(state.items[0].key(), "new");
        let p = state.pagination.unwrap();
        assert_eq!(p.total_items, 21);
        assert_eq!(p.total_pages, 2);
        assert!(p.has_next);
    }

    #[test]
    fn remove_recounts_only_when_present() {
        let state = loaded(21);
        let state = reduce(state, ListAction::Removed("missing".into()));
        assert_eq!(state.pagination.unwrap().total_items, 21);

        let state = reduce(state, ListAction::Removed("k3".into()));
        assert!(state.get("k3").is_none());
        let p = state.pagination.unwrap();
        assert_eq!(p.total_items, 20);
        assert!(!p.has_next);
    }

    #[test]
    fn replace_swaps_key_in_place() {
        let state = loaded(2);
        let state = reduce(
            state,
            ListAction::Replaced {
                key: "k1".into(),
                item: entry("server-1", "tt0000001"),
            },
        );
        assert_eq!(state.items[1].key(), "server-1");
        assert!(state.get("k1").is_none());
    }

    #[test]
    fn rollback_restores_snapshot_with_error() {
        let before = loaded(3);
        let changed = reduce(before.clone(), ListAction::Removed("k0".into()));
        let restored = reduce(
            changed,
            ListAction::RolledBack {
                snapshot: Box::new(before.clone()),
                error: "write failed".into(),
            },
        );
        assert_eq!(restored.items, before.items);
        assert_eq!(restored.pagination, before.pagination);
        assert_eq!(restored.error.as_deref(), Some("write failed"));
    }
}
