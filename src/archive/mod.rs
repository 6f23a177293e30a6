//! Wire format for project archives.
//!
//! An archive is a zip with exactly one `project.json` entry, the versioned
//! manifest describing the whole entity graph, plus zero or more
//! `assets/<original asset id>.<ext>` entries holding binary payloads. The
//! manifest is a closed world: every id referenced anywhere inside it must
//! resolve to an entity listed in the same manifest, or be null.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Manifest versions this implementation reads and writes.
pub const MANIFEST_VERSION: i64 = 1;

/// Name of the manifest entry inside the archive.
pub const MANIFEST_ENTRY: &str = "project.json";

/// Directory prefix for binary asset entries.
pub const ASSET_DIR: &str = "assets";

/// A finished archive plus the download filename suggested to the caller.
#[derive(Clone, Debug)]
pub struct ProjectArchiveFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifest {
    pub manifest_version: i64,
    pub project: ManifestProject,
    pub scenes: Vec<ManifestScene>,
    pub chat_messages: Vec<ManifestChatMessage>,
    pub assets: Vec<ManifestAsset>,
    pub groups: Vec<ManifestGroup>,
    pub tags: Vec<ManifestTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestProject {
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestScene {
    pub id: String,
    pub description: String,
    pub aspect_ratio: AspectRatio,
    pub order_index: i64,
    pub primary_image_asset_id: Option<String>,
    pub primary_video_asset_id: Option<String>,
    pub group_id: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAsset {
    pub id: String,
    pub scene_id: Option<String>,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub mime_type: String,
    pub file_name: String,
    pub size: i64,
    pub checksum: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestChatMessage {
    pub id: String,
    pub scene_id: Option<String>,
    pub role: ChatRole,
    pub text: String,
    pub image_asset_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestGroup {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub order_index: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestTag {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Square => "1:1",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "16:9" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Portrait),
            "1:1" => Ok(AspectRatio::Square),
            other => Err(format!("unknown aspect ratio: {}", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Image,
    Video,
    Attachment,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Image => "image",
            AssetType::Video => "video",
            AssetType::Attachment => "attachment",
        }
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(AssetType::Image),
            "video" => Ok(AssetType::Video),
            "attachment" => Ok(AssetType::Attachment),
            other => Err(format!("unknown asset type: {}", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ChatRole::User),
            "model" => Ok(ChatRole::Model),
            other => Err(format!("unknown chat role: {}", other)),
        }
    }
}

/// Archive entry path for an asset binary, keyed by the asset's original id
/// plus the extension of its original file name.
pub fn asset_entry_path(asset_id: &str, file_name: &str) -> String {
    match Path::new(file_name).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}/{}.{}", ASSET_DIR, asset_id, ext),
        _ => format!("{}/{}", ASSET_DIR, asset_id),
    }
}

/// Reads `manifestVersion` out of a raw manifest document. Returns `None`
/// for a missing or non-integer value.
pub fn manifest_version(raw: &Value) -> Option<i64> {
    raw.get("manifestVersion").and_then(Value::as_i64)
}
