//! Process-wide cache of extracted repositories

use anyhow::Result;
use hirehiker_core::ProjectFile;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::archive::extract_tarball;
use crate::client::{GitHubClient, RepoRef};

static GLOBAL_CACHE: Lazy<TarballCache> = Lazy::new(TarballCache::new);

/// Extracted project files keyed by `owner/repo@ref`
#[derive(Default)]
pub struct TarballCache {
    entries: RwLock<HashMap<String, Arc<Vec<ProjectFile>>>>,
}

impl TarballCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared cache used by [`fetch_project_files`]
    pub fn global() -> &'static TarballCache {
        &GLOBAL_CACHE
    }

    pub async fn get(&self, repo: &RepoRef) -> Option<Arc<Vec<ProjectFile>>> {
        self.entries.read().await.get(&repo.to_string()).cloned()
    }

    pub async fn insert(&self, repo: &RepoRef, files: Vec<ProjectFile>) -> Arc<Vec<ProjectFile>> {
        let files = Arc::new(files);
        self.entries
            .write()
            .await
            .insert(repo.to_string(), files.clone());
        files
    }

    /// Return the cached files or run `load` and cache its result.
    /// Failed loads are not cached.
    pub async fn get_or_load<F, Fut>(&self, repo: &RepoRef, load: F) -> Result<Arc<Vec<ProjectFile>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<ProjectFile>>>,
    {
        if let Some(files) = self.get(repo).await {
            debug!("Tarball cache hit for {}", repo);
            return Ok(files);
        }

        debug!("Tarball cache miss for {}", repo);
        let files = load().await?;
        Ok(self.insert(repo, files).await)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

/// Download and extract a repository once per process
pub async fn fetch_project_files(
    client: &GitHubClient,
    repo: &RepoRef,
) -> Result<Arc<Vec<ProjectFile>>> {
    TarballCache::global()
        .get_or_load(repo, || async {
            let bytes = client.download_tarball(repo).await?;
            tokio::task::spawn_blocking(move || extract_tarball(&bytes)).await?
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::github_tarball;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_loads_once_per_repo() {
        let cache = TarballCache::new();
        let repo = RepoRef::new("acme", "shop");
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let files = cache
                .get_or_load(&repo, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    extract_tarball(&github_tarball())
                })
                .await
                .unwrap();
            assert_eq!(files.len(), 2);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_refs_are_cached_separately() {
        let cache = TarballCache::new();
        let main = RepoRef::new("acme", "shop");
        let tag = RepoRef::new("acme", "shop").with_reference("v1");

        cache.insert(&main, vec![ProjectFile::new("a.txt", "a")]).await;
        assert!(cache.get(&tag).await.is_none());
        assert_eq!(cache.get(&main).await.unwrap()[0].path, "a.txt");
    }

    #[tokio::test]
    async fn test_failed_load_not_cached() {
        let cache = TarballCache::new();
        let repo = RepoRef::new("acme", "missing");

        let result = cache
            .get_or_load(&repo, || async { Err(anyhow::anyhow!("404")) })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty().await);

        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }
}
