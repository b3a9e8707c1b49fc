use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use tokio::sync::Mutex;
use tracing::debug;

use super::backing::{Backing, ListQuery, MirrorError, MirrorItem, MirrorResult};
use crate::models::Page;

/// Keeps one user's list in a JSON file.
pub struct LocalBacking<T> {
    path: PathBuf,
    owner: String,
    items: Mutex<Vec<T>>,
}

impl<T: MirrorItem> LocalBacking<T> {
    /// Loads the file at `path`; a missing file is an empty list.
    pub async fn open(path: impl Into<PathBuf>, owner: impl Into<String>) -> MirrorResult<Self> {
        let path = path.into();
        let items = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(LocalBacking {
            path,
            owner: owner.into(),
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> Vec<T> {
        self.items.lock().await.clone()
    }

    /// Writes through a temporary file so a crash never leaves half a list.
    async fn persist(&self, items: &[T]) -> MirrorResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(items)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), items = items.len(), "local list saved");
        Ok(())
    }

    /// Applies `change` to a copy and only keeps it once it is on disk.
    async fn commit<R>(
        &self,
        change: impl FnOnce(&mut Vec<T>) -> MirrorResult<R>,
    ) -> MirrorResult<R> {
        let mut items = self.items.lock().await;
        let mut next = items.clone();
        let result = change(&mut next)?;
        self.persist(&next).await?;
        *items = next;
        Ok(result)
    }
}

fn not_found(key: &str) -> MirrorError {
    MirrorError::NotFound(format!("no item with key {key}"))
}

#[async_trait]
impl<T: MirrorItem> Backing<T> for LocalBacking<T> {
    fn owner(&self) -> &str {
        &self.owner
    }

    async fn fetch(&self, query: &ListQuery) -> MirrorResult<Page<T>> {
        let mut matching: Vec<T> = self
            .items
            .lock()
            .await
            .iter()
            .filter(|item| item.matches(query))
            .cloned()
            .collect();
        // Later entries win ties on created_at.
        matching.reverse();
        matching.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(Page::slice(matching, query.page))
    }

    async fn add(&self, draft: &T::Draft) -> MirrorResult<T> {
        T::validate_draft(draft)?;
        let owner = self.owner.clone();
        self.commit(|items| {
            if items.iter().any(|i| i.conflicts_with(&owner, draft)) {
                return Err(MirrorError::Conflict("item is already in the list".to_string()));
            }
            let item = T::from_draft(ObjectId::new().to_hex(), &owner, draft, Utc::now());
            items.push(item.clone());
            Ok(item)
        })
        .await
    }

    async fn update(&self, key: &str, patch: &T::Patch) -> MirrorResult<T> {
        T::validate_patch(patch)?;
        self.commit(|items| {
            let item = items
                .iter_mut()
                .find(|i| i.key() == key)
                .ok_or_else(|| not_found(key))?;
            item.apply_patch(patch, Utc::now());
            Ok(item.clone())
        })
        .await
    }

    async fn remove(&self, key: &str) -> MirrorResult<()> {
        self.commit(|items| {
            let index = items
                .iter()
                .position(|i| i.key() == key)
                .ok_or_else(|| not_found(key))?;
            items.remove(index);
            Ok(())
        })
        .await
    }
}
