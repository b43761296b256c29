//! JSON plugin boundary: `loadRecentPhotos`, `getFullImage`, `requestPermissions`.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Error;
use crate::events::{PageRequest, PermissionState, Photo};
use crate::permission::PermissionGate;
use crate::source::AssetSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePhoto {
    pub id: String,
    /// Base64 JPEG bytes.
    pub data: String,
    pub creation_date: f64,
}

impl From<&Photo> for WirePhoto {
    fn from(photo: &Photo) -> Self {
        Self {
            id: photo.id.clone(),
            data: STANDARD.encode(&photo.data),
            creation_date: photo.creation_timestamp,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadRecentPhotosArgs {
    pub count: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRecentPhotosResponse {
    pub photos: Vec<WirePhoto>,
    pub has_more: bool,
    pub total_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_permission: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_denied: Option<bool>,
}

impl LoadRecentPhotosResponse {
    fn permission_required(denied: bool) -> Self {
        Self {
            needs_permission: Some(true),
            permission_denied: Some(denied),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FullImageArgs {
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullImageResponse {
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Limited,
    Denied,
    Prompt,
}

impl From<PermissionState> for PermissionStatus {
    fn from(state: PermissionState) -> Self {
        match state {
            PermissionState::Authorized => Self::Granted,
            PermissionState::Limited => Self::Limited,
            PermissionState::Denied | PermissionState::Restricted => Self::Denied,
            PermissionState::Undetermined => Self::Prompt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsResponse {
    pub status: PermissionStatus,
}

/// Rejection payload for a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallError {
    pub code: String,
    pub message: String,
}

impl CallError {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_owned(),
            message: message.into(),
        }
    }
}

impl From<Error> for CallError {
    fn from(err: Error) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CallError {}

#[derive(Clone)]
pub struct PhotoLibraryBridge {
    gate: PermissionGate,
    source: Arc<dyn AssetSource>,
    default_count: usize,
}

impl PhotoLibraryBridge {
    pub fn new(gate: PermissionGate, source: Arc<dyn AssetSource>, default_count: usize) -> Self {
        Self {
            gate,
            source,
            default_count: default_count.max(1),
        }
    }

    /// Load one page, prompting for access first if it was never decided.
    pub async fn load_recent_photos(
        &self,
        args: LoadRecentPhotosArgs,
    ) -> Result<LoadRecentPhotosResponse, CallError> {
        let mut status = self.gate.check_status();
        if status == PermissionState::Undetermined {
            status = self.gate.request_access().await;
        }
        if !status.is_granted() {
            debug!(?status, "loadRecentPhotos without library access");
            return Ok(LoadRecentPhotosResponse::permission_required(
                status.is_blocked(),
            ));
        }

        let offset = args.offset.unwrap_or(0);
        let count = args.count.unwrap_or(self.default_count);
        if count == 0 {
            return Err(CallError::new("InvalidArgument", "count must be positive"));
        }
        let slice = self
            .source
            .load_slice(PageRequest { offset, count })
            .await
            .inspect_err(|err| warn!(offset, count, "loadRecentPhotos failed: {err}"))?;
        let page = slice.into_page(offset);
        Ok(LoadRecentPhotosResponse {
            photos: page.items.iter().map(WirePhoto::from).collect(),
            has_more: page.has_more,
            total_count: page.total_count,
            needs_permission: None,
            permission_denied: None,
        })
    }

    pub async fn get_full_image(&self, args: FullImageArgs) -> Result<FullImageResponse, CallError> {
        if args.identifier.is_empty() {
            return Err(CallError::new("InvalidArgument", "Missing identifier"));
        }
        let status = self.gate.check_status();
        if !status.is_granted() {
            return Err(CallError::new(
                "PermissionDenied",
                format!("photo library access is {status:?}"),
            ));
        }
        let bytes = self.source.full_image(&args.identifier).await?;
        Ok(FullImageResponse {
            data: STANDARD.encode(bytes),
        })
    }

    pub async fn request_permissions(&self) -> PermissionsResponse {
        PermissionsResponse {
            status: self.gate.request_access().await.into(),
        }
    }

    /// Route a named call with JSON arguments.
    pub async fn dispatch(&self, method: &str, args: Value) -> Result<Value, CallError> {
        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };
        match method {
            "loadRecentPhotos" => {
                let args: LoadRecentPhotosArgs = parse_args(args)?;
                to_json(&self.load_recent_photos(args).await?)
            }
            "getFullImage" => {
                let args: FullImageArgs = parse_args(args)?;
                to_json(&self.get_full_image(args).await?)
            }
            "requestPermissions" => to_json(&self.request_permissions().await),
            other => Err(CallError::new(
                "Unimplemented",
                format!("unknown method {other}"),
            )),
        }
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T, CallError> {
    serde_json::from_value(args).map_err(|err| CallError::new("InvalidArgument", err.to_string()))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, CallError> {
    serde_json::to_value(value).map_err(|err| CallError::new("Internal", err.to_string()))
}
