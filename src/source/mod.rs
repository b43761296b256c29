//! Asset source capability, chosen once per gallery session.

pub mod codec;
pub mod library;
pub mod native;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::info;

use crate::config::Configuration;
use crate::error::Error;
use crate::events::{AssetSlice, PageRequest};

pub use library::{DirectoryLibrary, PickedFiles};
pub use native::{AssetRecord, MediaLibrary, NativeAssetSource};

pub type LocalPickerAssetSource = NativeAssetSource<PickedFiles>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Native,
    LocalPicker,
    Empty,
}

/// Produces ordered slices of decoded library assets.
pub trait AssetSource: Send + Sync + 'static {
    fn kind(&self) -> SourceKind;

    /// Materialize `[offset, offset + count)` clamped to the current library size.
    fn load_slice(&self, request: PageRequest) -> BoxFuture<'static, Result<AssetSlice, Error>>;

    /// Full-size encoded image for one asset.
    fn full_image(&self, id: &str) -> BoxFuture<'static, Result<Vec<u8>, Error>>;
}

/// Source for hosts without any library access.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyAssetSource;

impl AssetSource for EmptyAssetSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Empty
    }

    fn load_slice(&self, _request: PageRequest) -> BoxFuture<'static, Result<AssetSlice, Error>> {
        futures::future::ready(Ok(AssetSlice::empty())).boxed()
    }

    fn full_image(&self, id: &str) -> BoxFuture<'static, Result<Vec<u8>, Error>> {
        futures::future::ready(Err(Error::NotFound(id.to_owned()))).boxed()
    }
}

/// The capability selected for a session.
pub enum GallerySource {
    Native(NativeAssetSource<DirectoryLibrary>),
    LocalPicker(LocalPickerAssetSource),
    Empty(EmptyAssetSource),
}

impl GallerySource {
    /// Probe what the host offers: a readable library directory, else picked
    /// files, else nothing.
    pub fn probe(cfg: &Configuration) -> Self {
        if let Some(root) = cfg.photo_library_path.as_ref().filter(|p| p.is_dir()) {
            info!(root = %root.display(), "using native photo library");
            return Self::Native(NativeAssetSource::new(DirectoryLibrary::new(root), cfg));
        }
        if !cfg.picked_files.is_empty() {
            info!(files = cfg.picked_files.len(), "using local picker files");
            return Self::LocalPicker(
                NativeAssetSource::new(PickedFiles::new(cfg.picked_files.clone()), cfg)
                    .with_kind(SourceKind::LocalPicker),
            );
        }
        info!("no photo source available");
        Self::Empty(EmptyAssetSource)
    }

    fn inner(&self) -> &dyn AssetSource {
        match self {
            Self::Native(source) => source as &dyn AssetSource,
            Self::LocalPicker(source) => source,
            Self::Empty(source) => source,
        }
    }
}

impl AssetSource for GallerySource {
    fn kind(&self) -> SourceKind {
        self.inner().kind()
    }

    fn load_slice(&self, request: PageRequest) -> BoxFuture<'static, Result<AssetSlice, Error>> {
        self.inner().load_slice(request)
    }

    fn full_image(&self, id: &str) -> BoxFuture<'static, Result<Vec<u8>, Error>> {
        self.inner().full_image(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn probe_falls_back_through_capabilities() {
        let dir = tempfile::tempdir().unwrap();

        let cfg = Configuration {
            photo_library_path: Some(dir.path().to_path_buf()),
            ..Configuration::default()
        };
        assert_eq!(GallerySource::probe(&cfg).kind(), SourceKind::Native);

        let cfg = Configuration {
            photo_library_path: Some(dir.path().join("missing")),
            picked_files: vec![PathBuf::from("/tmp/picked.jpg")],
            ..Configuration::default()
        };
        assert_eq!(GallerySource::probe(&cfg).kind(), SourceKind::LocalPicker);

        let cfg = Configuration::default();
        assert_eq!(GallerySource::probe(&cfg).kind(), SourceKind::Empty);
    }

    #[tokio::test]
    async fn empty_source_yields_empty_slice() {
        let slice = EmptyAssetSource
            .load_slice(PageRequest {
                offset: 0,
                count: 30,
            })
            .await
            .unwrap();
        assert!(slice.items.is_empty());
        assert_eq!(slice.total_count, 0);
    }
}
