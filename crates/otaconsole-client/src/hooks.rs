//! Cached reads and invalidating mutations over the management API.
//!
//! Collections are cached under `"releases"` and `"bundles"`. Single-record
//! reads are derived from the cached collection and cached under
//! `"releases/{id}"` / `"bundles/{id}"`. A successful mutation invalidates its
//! collection and every derived record key.
//!
//! Cached data never outlives the session: once the session is logged out,
//! including the forced logout after a 401, the caches are dropped.

use std::sync::Arc;

use otaconsole_core::{
    Bundle, BundleModifiedResponse, CreateReleaseRequest, DeleteReleaseRequest, GenericResponse,
    ListResponse, Release, ReleaseModifiedResponse, SetActiveBundleRequest, UpdateReleaseRequest,
    UploadBundleRequest,
};

use crate::api::ApiClient;
use crate::cache::{fetcher, Fetcher, Query, QueryCache};
use crate::error::{ClientError, RecordKind, Result};

/// Cache key of the release collection.
pub const RELEASES_KEY: &str = "releases";

/// Cache key of the bundle collection.
pub const BUNDLES_KEY: &str = "bundles";

/// Read and mutation entry points with a shared cache.
#[derive(Debug, Clone)]
pub struct Hooks {
    api: Arc<ApiClient>,
    releases: QueryCache<ListResponse<Release>>,
    bundles: QueryCache<ListResponse<Bundle>>,
    release_records: QueryCache<Release>,
    bundle_records: QueryCache<Bundle>,
}

impl Hooks {
    /// Creates hooks over `api` with empty caches.
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            releases: QueryCache::new(),
            bundles: QueryCache::new(),
            release_records: QueryCache::new(),
            bundle_records: QueryCache::new(),
        }
    }

    /// Returns the underlying API client.
    #[must_use]
    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    /// Subscribes to the release collection.
    #[must_use]
    pub fn use_releases(&self) -> Query<ListResponse<Release>> {
        self.forget_if_logged_out();
        self.releases
            .subscribe(RELEASES_KEY, releases_fetcher(Arc::clone(&self.api)))
    }

    /// Subscribes to the bundle collection.
    #[must_use]
    pub fn use_bundles(&self) -> Query<ListResponse<Bundle>> {
        self.forget_if_logged_out();
        self.bundles
            .subscribe(BUNDLES_KEY, bundles_fetcher(Arc::clone(&self.api)))
    }

    /// Reads the release collection through the cache.
    ///
    /// # Errors
    ///
    /// Returns the list call's error.
    pub async fn releases(&self) -> Result<Arc<ListResponse<Release>>> {
        self.forget_if_logged_out();
        let result = self
            .releases
            .fetch(RELEASES_KEY, releases_fetcher(Arc::clone(&self.api)))
            .await;
        self.settle(result)
    }

    /// Reads the bundle collection through the cache.
    ///
    /// # Errors
    ///
    /// Returns the list call's error.
    pub async fn bundles(&self) -> Result<Arc<ListResponse<Bundle>>> {
        self.forget_if_logged_out();
        let result = self
            .bundles
            .fetch(BUNDLES_KEY, bundles_fetcher(Arc::clone(&self.api)))
            .await;
        self.settle(result)
    }

    /// Subscribes to one release, derived from the release collection.
    #[must_use]
    pub fn use_release(&self, id: &str) -> Query<Release> {
        self.forget_if_logged_out();
        self.release_records
            .subscribe(&record_key(RELEASES_KEY, id), self.release_fetcher(id))
    }

    /// Subscribes to one bundle, derived from the bundle collection.
    #[must_use]
    pub fn use_bundle(&self, id: &str) -> Query<Bundle> {
        self.forget_if_logged_out();
        self.bundle_records
            .subscribe(&record_key(BUNDLES_KEY, id), self.bundle_fetcher(id))
    }

    /// Reads one release.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] when the loaded collection has no
    /// release with this id, or the list call's error.
    pub async fn release(&self, id: &str) -> Result<Arc<Release>> {
        self.forget_if_logged_out();
        let result = self
            .release_records
            .fetch(&record_key(RELEASES_KEY, id), self.release_fetcher(id))
            .await;
        self.settle(result)
    }

    /// Reads one bundle.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] when the loaded collection has no
    /// bundle with this id, or the list call's error.
    pub async fn bundle(&self, id: &str) -> Result<Arc<Bundle>> {
        self.forget_if_logged_out();
        let result = self
            .bundle_records
            .fetch(&record_key(BUNDLES_KEY, id), self.bundle_fetcher(id))
            .await;
        self.settle(result)
    }

    /// Uploads a bundle, then invalidates bundle reads.
    ///
    /// # Errors
    ///
    /// Returns the upload's error; nothing is invalidated then.
    pub async fn upload_bundle(&self, req: &UploadBundleRequest) -> Result<BundleModifiedResponse> {
        let response = self.settle(self.api.upload_bundle(req).await)?;
        self.invalidate_bundles();
        Ok(response)
    }

    /// Creates a release, then invalidates release reads.
    ///
    /// # Errors
    ///
    /// Returns the call's error; nothing is invalidated then.
    pub async fn create_release(
        &self,
        req: &CreateReleaseRequest,
    ) -> Result<ReleaseModifiedResponse> {
        let response = self.settle(self.api.create_release(req).await)?;
        self.invalidate_releases();
        Ok(response)
    }

    /// Updates a release, then invalidates release reads.
    ///
    /// # Errors
    ///
    /// Returns the call's error; nothing is invalidated then.
    pub async fn update_release(
        &self,
        req: &UpdateReleaseRequest,
    ) -> Result<ReleaseModifiedResponse> {
        let response = self.settle(self.api.update_release(req).await)?;
        self.invalidate_releases();
        Ok(response)
    }

    /// Sets the active bundle of a release, then invalidates release reads.
    ///
    /// # Errors
    ///
    /// Returns the call's error; nothing is invalidated then.
    pub async fn set_release_active_bundle(
        &self,
        req: &SetActiveBundleRequest,
    ) -> Result<ReleaseModifiedResponse> {
        let response = self.settle(self.api.set_release_active_bundle(req).await)?;
        self.invalidate_releases();
        Ok(response)
    }

    /// Deletes a release, then invalidates release reads.
    ///
    /// # Errors
    ///
    /// Returns the call's error; nothing is invalidated then.
    pub async fn delete_release(&self, req: &DeleteReleaseRequest) -> Result<GenericResponse> {
        let response = self.settle(self.api.delete_release(req).await)?;
        self.invalidate_releases();
        Ok(response)
    }

    /// Drops every cached read. Mounted readers stop receiving updates.
    pub fn clear(&self) {
        self.releases.clear();
        self.bundles.clear();
        self.release_records.clear();
        self.bundle_records.clear();
    }

    fn forget_if_logged_out(&self) {
        if !self.api.session().is_logged_in() {
            self.clear();
        }
    }

    /// Drops the caches when `result` ended the session.
    fn settle<R>(&self, result: Result<R>) -> Result<R> {
        if result.as_ref().is_err_and(ClientError::is_unauthorized) {
            tracing::debug!("Session ended, dropping cached reads");
            self.clear();
        }
        result
    }

    fn invalidate_releases(&self) {
        self.releases.invalidate(RELEASES_KEY);
        self.release_records
            .invalidate_prefix(&record_key(RELEASES_KEY, ""));
    }

    fn invalidate_bundles(&self) {
        self.bundles.invalidate(BUNDLES_KEY);
        self.bundle_records
            .invalidate_prefix(&record_key(BUNDLES_KEY, ""));
    }

    fn release_fetcher(&self, id: &str) -> Fetcher<Release> {
        let collection = self.releases.clone();
        let list = releases_fetcher(Arc::clone(&self.api));
        let id = id.to_string();
        fetcher(move || {
            let collection = collection.clone();
            let list = Arc::clone(&list);
            let id = id.clone();
            async move {
                let releases = collection.fetch(RELEASES_KEY, list).await?;
                releases
                    .data
                    .iter()
                    .find(|release| release.id == id)
                    .cloned()
                    .ok_or(ClientError::NotFound {
                        kind: RecordKind::Release,
                        id,
                    })
            }
        })
    }

    fn bundle_fetcher(&self, id: &str) -> Fetcher<Bundle> {
        let collection = self.bundles.clone();
        let list = bundles_fetcher(Arc::clone(&self.api));
        let id = id.to_string();
        fetcher(move || {
            let collection = collection.clone();
            let list = Arc::clone(&list);
            let id = id.clone();
            async move {
                let bundles = collection.fetch(BUNDLES_KEY, list).await?;
                bundles
                    .data
                    .iter()
                    .find(|bundle| bundle.id == id)
                    .cloned()
                    .ok_or(ClientError::NotFound {
                        kind: RecordKind::Bundle,
                        id,
                    })
            }
        })
    }
}

fn releases_fetcher(api: Arc<ApiClient>) -> Fetcher<ListResponse<Release>> {
    fetcher(move || {
        let api = Arc::clone(&api);
        async move { api.list_releases().await }
    })
}

fn bundles_fetcher(api: Arc<ApiClient>) -> Fetcher<ListResponse<Bundle>> {
    fetcher(move || {
        let api = Arc::clone(&api);
        async move { api.list_bundles().await }
    })
}

fn record_key(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}
