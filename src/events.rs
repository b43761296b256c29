use std::sync::Arc;

/// One decoded library asset as held by the gallery window.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    /// Opaque identifier, stable for the lifetime of the asset.
    pub id: String,
    /// Encoded (JPEG) thumbnail bytes.
    pub data: Arc<[u8]>,
    /// Seconds since the Unix epoch, `0.0` when unknown.
    pub creation_timestamp: f64,
    /// Position in the library's newest-first ordering at fetch time.
    pub sequence_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub count: usize,
}

impl PageRequest {
    /// Half-open range of library positions covered by this request, clamped to `total`.
    #[must_use]
    pub fn clamped(&self, total: usize) -> std::ops::Range<usize> {
        let start = self.offset.min(total);
        let end = self.offset.saturating_add(self.count).min(total);
        start..end
    }
}

/// What an asset source hands back for one slice call.
///
/// `items` are ordered by `sequence_index` and never outnumber the requested
/// count. `total_count` is the size of the library at the moment of the call.
#[derive(Debug, Clone, Default)]
pub struct AssetSlice {
    pub items: Vec<Photo>,
    pub total_count: usize,
}

impl AssetSlice {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attach the `has_more` flag relative to the offset this slice was requested at.
    #[must_use]
    pub fn into_page(self, offset: usize) -> PageResult {
        let has_more = offset + self.items.len() < self.total_count;
        PageResult {
            items: self.items,
            has_more,
            total_count: self.total_count,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageResult {
    pub items: Vec<Photo>,
    pub has_more: bool,
    pub total_count: usize,
}

/// Client-side mirror of the host's library authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionState {
    Undetermined,
    Authorized,
    Limited,
    Denied,
    Restricted,
}

impl PermissionState {
    /// Library reads are allowed.
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Authorized | Self::Limited)
    }

    /// Only an out-of-process settings change can lift this state.
    #[must_use]
    pub const fn is_blocked(self) -> bool {
        matches!(self, Self::Denied | Self::Restricted)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Undetermined)
    }
}

/// Why a fetch trigger was dropped without touching the asset source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another fetch is outstanding for this session.
    InFlight,
    /// The library reported no further items.
    Exhausted,
    /// The gallery session has been closed.
    Closed,
    /// A page size of zero was requested.
    ZeroCount,
}

/// Result of driving one `fetch_initial` / `fetch_more` call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A page arrived. `received` counts what the source returned, `appended`
    /// what was new to the window.
    Loaded {
        received: usize,
        appended: usize,
        offset: usize,
        has_more: bool,
        total_count: usize,
    },
    /// The permission UI needs to be shown; `denied` selects the settings variant.
    NeedsPermission { denied: bool },
    /// A load-more call failed; `has_more` is unchanged so a later trigger may retry.
    Failed,
    /// The trigger was dropped before any source call.
    Skipped(SkipReason),
    /// The session closed while the call was outstanding; its result was ignored.
    Discarded,
}

/// Scroll container geometry, in CSS-like pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f32,
    pub scroll_height: f32,
    pub client_height: f32,
}

impl ScrollMetrics {
    #[must_use]
    pub fn distance_to_bottom(&self) -> f32 {
        (self.scroll_height - self.scroll_top - self.client_height).max(0.0)
    }
}

/// Continuous near-bottom signal coming from the render layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportSignal {
    Scroll(ScrollMetrics),
    /// Visibility of the load-more sentinel placed after the last row.
    Sentinel { intersection_ratio: f32 },
}
