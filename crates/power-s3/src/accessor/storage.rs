//! Store backends for Zarr access: anonymous S3, HTTP(S) and local paths.
//!
//! Remote stores go through `object_store`, wrapped in `AsyncObjectStore`
//! and an async-to-sync adapter so the synchronous zarrs API can read them.

use std::path::PathBuf;
use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::http::HttpBuilder;
use object_store::{ClientOptions, ObjectStore, RetryConfig};
use tokio::runtime::Runtime;
use url::Url;
use zarrs_filesystem::FilesystemStore;
use zarrs_object_store::AsyncObjectStore;
use zarrs_storage::storage_adapter::async_to_sync::{
    AsyncToSyncBlockOn, AsyncToSyncStorageAdapter,
};
use zarrs_storage::ReadableListableStorage;

use crate::config::ClientConfig;
use crate::error::AccessError;

/// Blocking executor backed by the accessor's own runtime.
///
/// The client is synchronous, so futures are driven with `Runtime::block_on`
/// from the caller's thread. Calling this from inside another tokio runtime
/// panics.
#[derive(Clone)]
pub(crate) struct TokioBlockOn(pub(crate) Arc<Runtime>);

impl AsyncToSyncBlockOn for TokioBlockOn {
    fn block_on<F: core::future::Future>(&self, future: F) -> F::Output {
        self.0.block_on(future)
    }
}

/// A readable store plus the node path of the dataset root inside it.
pub struct OpenedStore {
    pub store: ReadableListableStorage,
    /// Root node path for zarrs (always starts with `/`)
    pub root: String,
}

/// Open the store behind a location string.
///
/// Supported forms:
/// - `s3://bucket/prefix.zarr` (unsigned requests, region from config)
/// - `http://...` / `https://...`
/// - `file:///path` or a plain filesystem path
pub fn open_store(
    location: &str,
    config: &ClientConfig,
    runtime: &Arc<Runtime>,
) -> Result<OpenedStore, AccessError> {
    if !location.contains("://") {
        return open_filesystem_store(PathBuf::from(location));
    }

    let url = Url::parse(location)
        .map_err(|e| AccessError::other(format!("invalid store URL '{}': {}", location, e)))?;

    match url.scheme() {
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| AccessError::other(format!("invalid file URL '{}'", location)))?;
            open_filesystem_store(path)
        }
        "s3" => open_s3_store(&url, config, runtime),
        "http" | "https" => {
            let store = HttpBuilder::new()
                .with_url(location)
                .with_client_options(client_options(config))
                .with_retry(no_retries())
                .build()
                .map_err(|e| AccessError::other(format!("failed to create HTTP client: {}", e)))?;
            Ok(OpenedStore {
                store: wrap_async(store, runtime),
                root: "/".to_string(),
            })
        }
        other => Err(AccessError::other(format!(
            "unsupported store scheme '{}' in '{}'",
            other, location
        ))),
    }
}

fn open_s3_store(
    url: &Url,
    config: &ClientConfig,
    runtime: &Arc<Runtime>,
) -> Result<OpenedStore, AccessError> {
    let bucket = url
        .host_str()
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AccessError::other(format!("missing bucket in '{}'", url)))?;

    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region(&config.region)
        .with_skip_signature(true)
        .with_client_options(client_options(config))
        .with_retry(no_retries());

    if let Some(endpoint) = &config.endpoint {
        builder = builder.with_endpoint(endpoint);
    }

    let s3 = builder
        .build()
        .map_err(|e| AccessError::other(format!("failed to create S3 client: {}", e)))?;

    let prefix = url.path().trim_matches('/');
    let root = if prefix.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", prefix)
    };

    Ok(OpenedStore {
        store: wrap_async(s3, runtime),
        root,
    })
}

fn open_filesystem_store(path: PathBuf) -> Result<OpenedStore, AccessError> {
    if !path.is_dir() {
        return Err(AccessError::not_found(format!(
            "store directory not found: {}",
            path.display()
        )));
    }
    let store = FilesystemStore::new(&path).map_err(|e| {
        AccessError::from_message(format!("failed to open {}: {}", path.display(), e))
    })?;
    Ok(OpenedStore {
        store: Arc::new(store),
        root: "/".to_string(),
    })
}

fn wrap_async<T: ObjectStore>(store: T, runtime: &Arc<Runtime>) -> ReadableListableStorage {
    let async_store = Arc::new(AsyncObjectStore::new(store));
    Arc::new(AsyncToSyncStorageAdapter::new(
        async_store,
        TokioBlockOn(runtime.clone()),
    ))
}

fn client_options(config: &ClientConfig) -> ClientOptions {
    ClientOptions::new()
        .with_allow_http(config.allow_http)
        .with_connect_timeout(config.connect_timeout())
        .with_timeout(config.request_timeout())
}

/// Failed requests surface immediately; the client never retries.
fn no_retries() -> RetryConfig {
    RetryConfig {
        max_retries: 0,
        ..Default::default()
    }
}
