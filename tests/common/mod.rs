#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rust_photo_gallery::config::ThumbnailOptions;
use rust_photo_gallery::error::Error;
use rust_photo_gallery::events::PermissionState;
use rust_photo_gallery::permission::{PermissionGate, StaticAuthorizationStore};
use rust_photo_gallery::source::{AssetRecord, MediaLibrary, NativeAssetSource};

/// In-memory library: `asset-{i}` is the i-th newest asset.
///
/// Decodes sleep a seeded random amount so they complete out of order.
#[derive(Default)]
pub struct FakeLibrary {
    assets: Mutex<Vec<AssetRecord>>,
    failing: Mutex<HashSet<String>>,
    fail_enumerate: AtomicBool,
    max_jitter_ms: u64,
    fixed_delay_ms: u64,
    pub enumerations: AtomicUsize,
    pub decodes: AtomicUsize,
    active_decodes: AtomicUsize,
    peak_decodes: AtomicUsize,
}

impl FakeLibrary {
    pub fn with_assets(count: usize) -> Self {
        Self::with_jitter(count, 0)
    }

    pub fn with_jitter(count: usize, max_jitter_ms: u64) -> Self {
        let assets = (0..count)
            .map(|i| AssetRecord {
                id: format!("asset-{i}"),
                creation_timestamp: (1_000_000 - i) as f64,
            })
            .collect();
        Self {
            assets: Mutex::new(assets),
            max_jitter_ms,
            ..Self::default()
        }
    }

    /// Every decode takes exactly `delay_ms`.
    pub fn with_delay(count: usize, delay_ms: u64) -> Self {
        Self {
            fixed_delay_ms: delay_ms,
            ..Self::with_assets(count)
        }
    }

    /// Most thumbnail decodes observed running at once.
    pub fn peak_decodes(&self) -> usize {
        self.peak_decodes.load(Ordering::SeqCst)
    }

    /// Add `extra` older assets after the current tail.
    pub fn extend_tail(&self, extra: usize) {
        let mut assets = self.assets.lock().unwrap();
        let start = assets.len();
        for i in start..start + extra {
            assets.push(AssetRecord {
                id: format!("asset-{i}"),
                creation_timestamp: (1_000_000 - i) as f64,
            });
        }
    }

    pub fn fail_decode(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_owned());
    }

    pub fn set_enumerate_failure(&self, fail: bool) {
        self.fail_enumerate.store(fail, Ordering::SeqCst);
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }
}

impl MediaLibrary for FakeLibrary {
    fn enumerate(&self) -> Result<Vec<AssetRecord>, Error> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        if self.fail_enumerate.load(Ordering::SeqCst) {
            return Err(Error::Transport("library unavailable".into()));
        }
        Ok(self.assets.lock().unwrap().clone())
    }

    fn thumbnail(
        &self,
        asset: &AssetRecord,
        _options: &ThumbnailOptions,
    ) -> anyhow::Result<Vec<u8>> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        let active = self.active_decodes.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_decodes.fetch_max(active, Ordering::SeqCst);
        let mut delay = self.fixed_delay_ms;
        if self.max_jitter_ms > 0 {
            let seed = asset.id.bytes().map(u64::from).sum::<u64>();
            delay += StdRng::seed_from_u64(seed).random_range(0..=self.max_jitter_ms);
        }
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        self.active_decodes.fetch_sub(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&asset.id) {
            anyhow::bail!("corrupt asset {}", asset.id);
        }
        Ok(asset.id.as_bytes().to_vec())
    }

    fn full_image(&self, id: &str, _quality: u8) -> Result<Vec<u8>, Error> {
        if self.failing.lock().unwrap().contains(id) {
            return Err(Error::DecodeFailed {
                id: id.to_owned(),
                reason: "corrupt".into(),
            });
        }
        self.assets
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .map(|a| format!("full:{}", a.id).into_bytes())
            .ok_or_else(|| Error::NotFound(id.to_owned()))
    }
}

pub fn source(library: Arc<FakeLibrary>) -> NativeAssetSource<FakeLibrary> {
    NativeAssetSource::with_options(library, ThumbnailOptions::default(), 90, 8)
}

pub fn gate(initial: PermissionState, response: PermissionState) -> PermissionGate {
    PermissionGate::new(Arc::new(StaticAuthorizationStore::new(initial, response)))
}

pub fn authorized() -> PermissionGate {
    gate(PermissionState::Authorized, PermissionState::Authorized)
}

pub fn indices(photos: &[rust_photo_gallery::events::Photo]) -> Vec<usize> {
    photos.iter().map(|p| p.sequence_index).collect()
}
