use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::events::PermissionState;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ThumbnailOptions {
    /// Edge length of the aspect-filled square thumbnail, in pixels.
    pub size_px: u32,
    /// JPEG quality for thumbnails (1..=100).
    pub quality: u8,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            size_px: 400,
            quality: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LoadMoreOptions {
    /// Remaining scroll distance below which the next page is requested.
    pub threshold_px: f32,
    /// Sentinel intersection ratio at which the sentinel counts as visible.
    pub sentinel_ratio: f32,
}

impl Default for LoadMoreOptions {
    fn default() -> Self {
        Self {
            threshold_px: 200.0,
            sentinel_ratio: 0.1,
        }
    }
}

/// Authorization states as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionSetting {
    Prompt,
    Granted,
    Limited,
    Denied,
    Restricted,
}

impl From<PermissionSetting> for PermissionState {
    fn from(value: PermissionSetting) -> Self {
        match value {
            PermissionSetting::Prompt => PermissionState::Undetermined,
            PermissionSetting::Granted => PermissionState::Authorized,
            PermissionSetting::Limited => PermissionState::Limited,
            PermissionSetting::Denied => PermissionState::Denied,
            PermissionSetting::Restricted => PermissionState::Restricted,
        }
    }
}

/// Static answers for hosts without an interactive consent dialog (CLI, tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PermissionOptions {
    /// State reported before any prompt.
    pub initial: PermissionSetting,
    /// What the "user" answers when prompted.
    pub prompt_response: PermissionSetting,
}

impl Default for PermissionOptions {
    fn default() -> Self {
        Self {
            initial: PermissionSetting::Prompt,
            prompt_response: PermissionSetting::Granted,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Root directory of the native media library.
    pub photo_library_path: Option<PathBuf>,
    /// Files made available by a local picker when no native library exists.
    pub picked_files: Vec<PathBuf>,
    /// Number of assets requested per page.
    pub page_size: usize,
    /// Maximum number of photos held by the gallery window.
    pub max_window: usize,
    /// Upper bound on concurrently running decode units within one page.
    pub max_concurrent_decodes: usize,
    /// `loadRecentPhotos` count when the caller omits one.
    pub default_request_count: usize,
    pub thumbnail: ThumbnailOptions,
    /// JPEG quality for `getFullImage` (1..=100).
    pub full_image_quality: u8,
    pub load_more: LoadMoreOptions,
    pub permission: PermissionOptions,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(self.page_size > 0, "page-size must be greater than zero");
        ensure!(
            self.max_window >= self.page_size,
            "max-window must be at least page-size"
        );
        ensure!(
            self.max_concurrent_decodes > 0,
            "max-concurrent-decodes must be greater than zero"
        );
        ensure!(
            self.default_request_count > 0,
            "default-request-count must be greater than zero"
        );
        ensure!(
            self.thumbnail.size_px > 0,
            "thumbnail.size-px must be greater than zero"
        );
        ensure!(
            (1..=100).contains(&self.thumbnail.quality),
            "thumbnail.quality must be within 1..=100"
        );
        ensure!(
            (1..=100).contains(&self.full_image_quality),
            "full-image-quality must be within 1..=100"
        );
        ensure!(
            self.load_more.threshold_px >= 0.0,
            "load-more.threshold-px must not be negative"
        );
        ensure!(
            self.load_more.sentinel_ratio > 0.0 && self.load_more.sentinel_ratio <= 1.0,
            "load-more.sentinel-ratio must be within (0, 1]"
        );
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            photo_library_path: None,
            picked_files: Vec::new(),
            page_size: 30,
            max_window: 300,
            max_concurrent_decodes: 8,
            default_request_count: 50,
            thumbnail: ThumbnailOptions::default(),
            full_image_quality: 90,
            load_more: LoadMoreOptions::default(),
            permission: PermissionOptions::default(),
        }
    }
}
