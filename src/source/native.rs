//! Slice loader over a host media library.
//!
//! Each call re-enumerates the library, clamps the requested range, fans out
//! one decode unit per asset and joins them all before returning. Units that
//! fail are dropped; survivors are put back in library order.

use std::sync::Arc;

use anyhow::anyhow;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use super::{AssetSource, SourceKind};
use crate::config::{Configuration, ThumbnailOptions};
use crate::error::Error;
use crate::events::{AssetSlice, PageRequest, Photo};

/// One enumerated library entry, before decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    pub id: String,
    pub creation_timestamp: f64,
}

/// Host media library. All methods block and are driven from `spawn_blocking`.
pub trait MediaLibrary: Send + Sync + 'static {
    /// Every asset, newest first with a stable tie-break.
    fn enumerate(&self) -> Result<Vec<AssetRecord>, Error>;

    /// Decoded, size-reduced, JPEG-compressed thumbnail for one asset.
    fn thumbnail(&self, asset: &AssetRecord, options: &ThumbnailOptions)
    -> anyhow::Result<Vec<u8>>;

    /// Full-size JPEG for the asset with this id.
    fn full_image(&self, id: &str, quality: u8) -> Result<Vec<u8>, Error>;
}

pub struct NativeAssetSource<L> {
    library: Arc<L>,
    kind: SourceKind,
    thumbnail: ThumbnailOptions,
    full_image_quality: u8,
    decode_permits: Arc<Semaphore>,
}

impl<L: MediaLibrary> NativeAssetSource<L> {
    pub fn new(library: L, cfg: &Configuration) -> Self {
        Self::with_options(
            Arc::new(library),
            cfg.thumbnail,
            cfg.full_image_quality,
            cfg.max_concurrent_decodes,
        )
    }

    pub fn with_options(
        library: Arc<L>,
        thumbnail: ThumbnailOptions,
        full_image_quality: u8,
        max_concurrent_decodes: usize,
    ) -> Self {
        Self {
            library,
            kind: SourceKind::Native,
            thumbnail,
            full_image_quality,
            decode_permits: Arc::new(Semaphore::new(max_concurrent_decodes.max(1))),
        }
    }

    /// Report this source as a different capability (used by the local picker).
    #[must_use]
    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }
}

#[instrument(skip_all, fields(offset = request.offset, count = request.count))]
async fn load_slice<L: MediaLibrary>(
    library: Arc<L>,
    request: PageRequest,
    options: ThumbnailOptions,
    permits: Arc<Semaphore>,
) -> Result<AssetSlice, Error> {
    let assets = {
        let library = Arc::clone(&library);
        tokio::task::spawn_blocking(move || library.enumerate())
            .await
            .map_err(|err| Error::Transport(format!("enumeration task failed: {err}")))??
    };
    let total_count = assets.len();
    let range = request.clamped(total_count);
    let requested = range.len();

    let mut units: JoinSet<(usize, AssetRecord, anyhow::Result<Vec<u8>>)> = JoinSet::new();
    for (sequence_index, asset) in assets
        .into_iter()
        .enumerate()
        .skip(range.start)
        .take(requested)
    {
        let library = Arc::clone(&library);
        let permits = Arc::clone(&permits);
        units.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            let record = asset.clone();
            let decoded =
                tokio::task::spawn_blocking(move || library.thumbnail(&record, &options)).await;
            let decoded = match decoded {
                Ok(result) => result,
                Err(err) => Err(anyhow!("decode unit did not complete: {err}")),
            };
            (sequence_index, asset, decoded)
        });
    }

    let mut items = Vec::with_capacity(requested);
    while let Some(joined) = units.join_next().await {
        match joined {
            Ok((sequence_index, asset, Ok(bytes))) => items.push(Photo {
                id: asset.id,
                data: Arc::from(bytes),
                creation_timestamp: asset.creation_timestamp,
                sequence_index,
            }),
            Ok((sequence_index, asset, Err(err))) => {
                debug!(id = %asset.id, index = sequence_index, "dropping asset: {err:#}");
            }
            Err(err) => warn!("decode unit aborted: {err}"),
        }
    }
    // Completion order is arbitrary.
    items.sort_unstable_by_key(|photo| photo.sequence_index);

    info!(
        total = total_count,
        requested,
        loaded = items.len(),
        "slice loaded"
    );
    Ok(AssetSlice { items, total_count })
}

impl<L: MediaLibrary> AssetSource for NativeAssetSource<L> {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn load_slice(&self, request: PageRequest) -> BoxFuture<'static, Result<AssetSlice, Error>> {
        load_slice(
            Arc::clone(&self.library),
            request,
            self.thumbnail,
            Arc::clone(&self.decode_permits),
        )
        .boxed()
    }

    fn full_image(&self, id: &str) -> BoxFuture<'static, Result<Vec<u8>, Error>> {
        let library = Arc::clone(&self.library);
        let id = id.to_owned();
        let quality = self.full_image_quality;
        async move {
            tokio::task::spawn_blocking(move || library.full_image(&id, quality))
                .await
                .map_err(|err| Error::Transport(format!("full image task failed: {err}")))?
        }
        .boxed()
    }
}
