use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::archive::{
    asset_entry_path, AspectRatio, AssetType, ChatRole, ExportManifest, ManifestAsset,
    ManifestChatMessage, ManifestGroup, ManifestProject, ManifestScene, ManifestTag,
    ProjectArchiveFile, MANIFEST_ENTRY, MANIFEST_VERSION,
};
use crate::assets::AssetStore;
use crate::errors::{ArchiveError, CoreResult};
use crate::store::{Row, Store, StoreError};

/// Builds the manifest for one project and streams it, together with the
/// asset binaries that are still readable, into a zip archive.
pub struct ExportService {
    store: Arc<dyn Store>,
    assets: Arc<AssetStore>,
}

impl ExportService {
    pub fn new(store: Arc<dyn Store>, assets: Arc<AssetStore>) -> Self {
        Self { store, assets }
    }

    pub async fn export_project_archive(&self, project_id: &str) -> CoreResult<ProjectArchiveFile> {
        let manifest = self.build_manifest(project_id).await?;
        let bytes = self.write_archive(project_id, &manifest).await?;

        info!(
            %project_id,
            scenes = manifest.scenes.len(),
            assets = manifest.assets.len(),
            chat_messages = manifest.chat_messages.len(),
            "exported project archive"
        );

        Ok(ProjectArchiveFile {
            filename: format!(
                "{}-project-export.zip",
                sanitize_archive_filename(&manifest.project.name)
            ),
            bytes,
        })
    }

    /// Reads the project's full entity graph into a versioned manifest.
    ///
    /// The reads are issued independently, not as one snapshot; a mutation
    /// racing with an export can produce a momentarily inconsistent
    /// cross-section.
    pub async fn build_manifest(&self, project_id: &str) -> Result<ExportManifest, ArchiveError> {
        let project_row = self
            .store
            .query_one(
                "SELECT name, description, created_at, updated_at FROM projects WHERE id = ?",
                vec![project_id.into()],
            )
            .await?
            .ok_or_else(|| ArchiveError::ProjectNotFound(project_id.to_string()))?;

        let project = ManifestProject {
            name: project_row.text("name")?,
            description: project_row.opt_text("description")?,
            created_at: timestamp(&project_row, "created_at")?,
            updated_at: timestamp(&project_row, "updated_at")?,
        };

        let scene_rows = self
            .store
            .query(
                "SELECT id, description, aspect_ratio, order_index, primary_image_asset_id, \
                 primary_video_asset_id, group_id, created_at, updated_at \
                 FROM scenes WHERE project_id = ? ORDER BY order_index",
                vec![project_id.into()],
            )
            .await?;

        let mut scene_tags: HashMap<String, Vec<String>> = HashMap::new();
        let link_rows = self
            .store
            .query(
                "SELECT l.scene_id, l.tag_id FROM scene_tag_links l \
                 JOIN scenes s ON s.id = l.scene_id WHERE s.project_id = ?",
                vec![project_id.into()],
            )
            .await?;
        for link in &link_rows {
            scene_tags
                .entry(link.text("scene_id")?)
                .or_default()
                .push(link.text("tag_id")?);
        }

        let mut scenes = Vec::with_capacity(scene_rows.len());
        for row in &scene_rows {
            let id = row.text("id")?;
            let tag_ids = scene_tags.remove(&id).unwrap_or_default();
            scenes.push(ManifestScene {
                id,
                description: row.text("description")?,
                aspect_ratio: parse_field::<AspectRatio>(row, "aspect_ratio")?,
                order_index: row.integer("order_index")?,
                primary_image_asset_id: row.opt_text("primary_image_asset_id")?,
                primary_video_asset_id: row.opt_text("primary_video_asset_id")?,
                group_id: row.opt_text("group_id")?,
                tag_ids,
                created_at: timestamp(row, "created_at")?,
                updated_at: timestamp(row, "updated_at")?,
            });
        }

        let chat_rows = self
            .store
            .query(
                "SELECT id, scene_id, role, text, image_asset_id, created_at \
                 FROM chat_messages WHERE project_id = ? ORDER BY created_at",
                vec![project_id.into()],
            )
            .await?;
        let mut chat_messages = Vec::with_capacity(chat_rows.len());
        for row in &chat_rows {
            chat_messages.push(ManifestChatMessage {
                id: row.text("id")?,
                scene_id: row.opt_text("scene_id")?,
                role: parse_field::<ChatRole>(row, "role")?,
                text: row.text("text")?,
                image_asset_id: row.opt_text("image_asset_id")?,
                created_at: timestamp(row, "created_at")?,
            });
        }

        let asset_rows = self
            .store
            .query(
                "SELECT id, scene_id, asset_type, mime_type, file_name, size, checksum, \
                 metadata, created_at FROM assets WHERE project_id = ?",
                vec![project_id.into()],
            )
            .await?;
        let mut assets = Vec::with_capacity(asset_rows.len());
        for row in &asset_rows {
            assets.push(ManifestAsset {
                id: row.text("id")?,
                scene_id: row.opt_text("scene_id")?,
                asset_type: parse_field::<AssetType>(row, "asset_type")?,
                mime_type: row.text("mime_type")?,
                file_name: row.text("file_name")?,
                size: row.integer("size")?,
                checksum: row.opt_text("checksum")?,
                metadata: opt_json(row, "metadata")?.unwrap_or(Value::Null),
                created_at: timestamp(row, "created_at")?,
            });
        }

        let group_rows = self
            .store
            .query(
                "SELECT id, name, color, order_index FROM scene_groups \
                 WHERE project_id = ? ORDER BY order_index",
                vec![project_id.into()],
            )
            .await?;
        let mut groups = Vec::with_capacity(group_rows.len());
        for row in &group_rows {
            groups.push(ManifestGroup {
                id: row.text("id")?,
                name: row.text("name")?,
                color: row.opt_text("color")?,
                order_index: row.integer("order_index")?,
            });
        }

        let tag_rows = self
            .store
            .query(
                "SELECT id, name, color FROM scene_tags WHERE project_id = ?",
                vec![project_id.into()],
            )
            .await?;
        let mut tags = Vec::with_capacity(tag_rows.len());
        for row in &tag_rows {
            tags.push(ManifestTag {
                id: row.text("id")?,
                name: row.text("name")?,
                color: row.opt_text("color")?,
            });
        }

        let settings = match self
            .store
            .query_one(
                "SELECT data FROM project_settings WHERE project_id = ?",
                vec![project_id.into()],
            )
            .await?
        {
            Some(row) => opt_json(&row, "data")?,
            None => None,
        };

        Ok(ExportManifest {
            manifest_version: MANIFEST_VERSION,
            project,
            scenes,
            chat_messages,
            assets,
            groups,
            tags,
            settings,
        })
    }

    async fn write_archive(
        &self,
        project_id: &str,
        manifest: &ExportManifest,
    ) -> Result<Vec<u8>, ArchiveError> {
        // Serialize up front so a manifest failure aborts before any bytes.
        let manifest_bytes = serde_json::to_vec_pretty(manifest)?;

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut cursor);
            let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

            zip.start_file(MANIFEST_ENTRY, options)
                .map_err(|e| ArchiveError::Zip(format!("failed to add {}: {}", MANIFEST_ENTRY, e)))?;
            zip.write_all(&manifest_bytes)?;

            for asset in &manifest.assets {
                if !self.assets.exists(project_id, &asset.id).await? {
                    warn!(
                        asset_id = %asset.id,
                        file_name = %asset.file_name,
                        "asset binary missing from storage, omitting from archive"
                    );
                    continue;
                }
                let bytes = self.assets.read(project_id, &asset.id).await?;
                let entry = asset_entry_path(&asset.id, &asset.file_name);
                zip.start_file(&entry, options)
                    .map_err(|e| ArchiveError::Zip(format!("failed to add {}: {}", entry, e)))?;
                zip.write_all(&bytes)?;
            }

            zip.finish()
                .map_err(|e| ArchiveError::Zip(format!("failed to finalize archive: {}", e)))?;
        }

        Ok(cursor.into_inner())
    }
}

fn timestamp(row: &Row, column: &str) -> Result<DateTime<Utc>, ArchiveError> {
    let raw = row.text(column)?;
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| StoreError::Decode(format!("column {}: {}", column, e)).into())
}

fn parse_field<T>(row: &Row, column: &str) -> Result<T, ArchiveError>
where
    T: FromStr<Err = String>,
{
    let raw = row.text(column)?;
    T::from_str(&raw).map_err(|e| StoreError::Decode(format!("column {}: {}", column, e)).into())
}

fn opt_json(row: &Row, column: &str) -> Result<Option<Value>, ArchiveError> {
    match row.opt_text(column)? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Decode(format!("column {}: {}", column, e)).into()),
    }
}

fn sanitize_archive_filename(name: &str) -> String {
    let filtered: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = filtered.trim_matches('_');
    if trimmed.is_empty() {
        "project".to_string()
    } else {
        trimmed.to_string()
    }
}
