//! Client-side mirror of a user's lists.
//!
//! A [`MirroredList`] holds one page of watchlist entries or reviews in
//! memory, applies changes optimistically and syncs them to a [`Backing`]:
//! the REST API ([`RemoteWatchlist`], [`RemoteReviews`]) or a JSON file
//! ([`LocalBacking`]).

mod backing;
mod items;
mod list;
mod local;
mod reducer;
mod remote;

pub use backing::{Backing, ListQuery, MirrorError, MirrorItem, MirrorResult};
pub use list::{is_provisional, MirroredList, PendingWrite, SyncMode, PROVISIONAL_PREFIX};
pub use local::LocalBacking;
pub use reducer::{reduce, ListAction, ListState};
pub use remote::{ApiClient, RemoteReviews, RemoteWatchlist};
