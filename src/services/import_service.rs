use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::{result::ZipError, ZipArchive};

use crate::archive::{asset_entry_path, manifest_version, ExportManifest, MANIFEST_ENTRY, MANIFEST_VERSION};
use crate::assets::AssetStore;
use crate::errors::{ArchiveError, CoreResult};
use crate::store::{SqlValue, Store};

/// Outcome of a completed import.
///
/// `asset_count` reflects the manifest listing, including assets whose
/// binary was missing from the archive and whose record was skipped.
#[derive(Clone, Debug)]
pub struct ImportSummary {
    pub project_id: String,
    pub project_name: String,
    pub scene_count: usize,
    pub asset_count: usize,
    pub chat_message_count: usize,
}

/// Fresh ids for every entity in a manifest, keyed by original id.
///
/// Generated in full before any write. Because this subsystem controls the
/// primary keys it inserts, the table entry is the created row's id; there
/// is no second "id returned by creation" to capture.
struct IdRemap {
    scenes: HashMap<String, String>,
    assets: HashMap<String, String>,
    chat_messages: HashMap<String, String>,
    groups: HashMap<String, String>,
    tags: HashMap<String, String>,
}

fn fresh_ids<'a>(originals: impl Iterator<Item = &'a String>) -> HashMap<String, String> {
    originals
        .map(|old| (old.clone(), Uuid::new_v4().to_string()))
        .collect()
}

impl IdRemap {
    fn generate(manifest: &ExportManifest) -> Self {
        Self {
            scenes: fresh_ids(manifest.scenes.iter().map(|s| &s.id)),
            assets: fresh_ids(manifest.assets.iter().map(|a| &a.id)),
            chat_messages: fresh_ids(manifest.chat_messages.iter().map(|m| &m.id)),
            groups: fresh_ids(manifest.groups.iter().map(|g| &g.id)),
            tags: fresh_ids(manifest.tags.iter().map(|t| &t.id)),
        }
    }

    fn require(table: &HashMap<String, String>, old_id: &str) -> Result<String, ArchiveError> {
        table.get(old_id).cloned().ok_or_else(|| {
            ArchiveError::InvalidArchive(format!("id {} missing from remap table", old_id))
        })
    }
}

/// Disambiguates a project name against the existing names, case
/// insensitively, by appending " (n)" starting at n=1.
///
/// Deterministic for a fixed snapshot of names; two imports racing with the
/// same source name can still resolve to the same result.
fn resolve_project_name(desired: &str, existing: &[String]) -> String {
    let taken: HashSet<String> = existing.iter().map(|name| name.to_lowercase()).collect();
    if !taken.contains(&desired.to_lowercase()) {
        return desired.to_string();
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{} ({})", desired, n);
        if !taken.contains(&candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

/// Validates an archive and replays its entity graph as a brand-new project.
pub struct ImportService {
    store: Arc<dyn Store>,
    assets: Arc<AssetStore>,
}

impl ImportService {
    pub fn new(store: Arc<dyn Store>, assets: Arc<AssetStore>) -> Self {
        Self { store, assets }
    }

    pub async fn import_project_archive(&self, archive_bytes: Vec<u8>) -> CoreResult<ImportSummary> {
        let (manifest, mut archive) = read_and_validate(archive_bytes)?;

        let remap = IdRemap::generate(&manifest);
        let existing = self.existing_project_names().await?;
        let resolved_name = resolve_project_name(&manifest.project.name, &existing);

        let summary = self
            .reconstruct(&manifest, &remap, resolved_name, &mut archive)
            .await?;

        info!(
            project_id = %summary.project_id,
            project_name = %summary.project_name,
            scenes = summary.scene_count,
            assets = summary.asset_count,
            chat_messages = summary.chat_message_count,
            "imported project archive"
        );

        Ok(summary)
    }

    async fn existing_project_names(&self) -> Result<Vec<String>, ArchiveError> {
        let rows = self.store.query("SELECT name FROM projects", vec![]).await?;
        rows.iter()
            .map(|row| row.text("name").map_err(ArchiveError::from))
            .collect()
    }

    /// Replays entity creation in dependency order. Every phase after the
    /// project insert is fatal on first error and nothing is rolled back: a
    /// mid-pipeline failure leaves a partially populated project behind.
    async fn reconstruct(
        &self,
        manifest: &ExportManifest,
        remap: &IdRemap,
        resolved_name: String,
        archive: &mut ZipArchive<Cursor<Vec<u8>>>,
    ) -> Result<ImportSummary, ArchiveError> {
        let now = Utc::now();
        let project_id = Uuid::new_v4().to_string();

        self.store
            .execute(
                "INSERT INTO projects (id, name, description, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?)",
                vec![
                    project_id.as_str().into(),
                    resolved_name.as_str().into(),
                    manifest.project.description.clone().into(),
                    now.to_rfc3339().into(),
                    now.to_rfc3339().into(),
                ],
            )
            .await?;
        debug!(%project_id, "created project row");

        self.assets.ensure_project_dir(&project_id).await?;

        // Assets whose binary actually made it into the new storage
        // namespace, old id -> new id. References to anything outside this
        // set are nulled during patching.
        let materialized = self
            .import_assets(manifest, remap, &project_id, archive)
            .await?;

        for group in &manifest.groups {
            let new_id = IdRemap::require(&remap.groups, &group.id)?;
            self.store
                .execute(
                    "INSERT INTO scene_groups (id, project_id, name, color, order_index) \
                     VALUES (?, ?, ?, ?, ?)",
                    vec![
                        new_id.into(),
                        project_id.as_str().into(),
                        group.name.as_str().into(),
                        group.color.clone().into(),
                        group.order_index.into(),
                    ],
                )
                .await?;
        }
        debug!(groups = manifest.groups.len(), "imported scene groups");

        for tag in &manifest.tags {
            let new_id = IdRemap::require(&remap.tags, &tag.id)?;
            self.store
                .execute(
                    "INSERT INTO scene_tags (id, project_id, name, color) VALUES (?, ?, ?, ?)",
                    vec![
                        new_id.into(),
                        project_id.as_str().into(),
                        tag.name.as_str().into(),
                        tag.color.clone().into(),
                    ],
                )
                .await?;
        }
        debug!(tags = manifest.tags.len(), "imported scene tags");

        // Scenes are created with their content fields only; asset, group,
        // and tag references are patched in the next phase.
        for scene in &manifest.scenes {
            let new_id = IdRemap::require(&remap.scenes, &scene.id)?;
            self.store
                .execute(
                    "INSERT INTO scenes (id, project_id, description, aspect_ratio, order_index, \
                     created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
                    vec![
                        new_id.into(),
                        project_id.as_str().into(),
                        scene.description.as_str().into(),
                        scene.aspect_ratio.as_str().into(),
                        scene.order_index.into(),
                        scene.created_at.to_rfc3339().into(),
                        scene.updated_at.to_rfc3339().into(),
                    ],
                )
                .await?;
        }
        debug!(scenes = manifest.scenes.len(), "imported scenes");

        for scene in &manifest.scenes {
            let new_scene_id = IdRemap::require(&remap.scenes, &scene.id)?;
            let primary_image = scene
                .primary_image_asset_id
                .as_deref()
                .and_then(|old| materialized.get(old))
                .cloned();
            let primary_video = scene
                .primary_video_asset_id
                .as_deref()
                .and_then(|old| materialized.get(old))
                .cloned();
            let group_id = scene
                .group_id
                .as_deref()
                .and_then(|old| remap.groups.get(old))
                .cloned();

            if primary_image.is_some() || primary_video.is_some() || group_id.is_some() {
                self.store
                    .execute(
                        "UPDATE scenes SET primary_image_asset_id = ?, \
                         primary_video_asset_id = ?, group_id = ? WHERE id = ?",
                        vec![
                            primary_image.into(),
                            primary_video.into(),
                            group_id.into(),
                            new_scene_id.as_str().into(),
                        ],
                    )
                    .await?;
            }

            for old_tag_id in &scene.tag_ids {
                if let Some(new_tag_id) = remap.tags.get(old_tag_id) {
                    self.store
                        .execute(
                            "INSERT INTO scene_tag_links (scene_id, tag_id) VALUES (?, ?)",
                            vec![new_scene_id.as_str().into(), new_tag_id.as_str().into()],
                        )
                        .await?;
                }
            }
        }
        debug!("patched scene references");

        for message in &manifest.chat_messages {
            let new_id = IdRemap::require(&remap.chat_messages, &message.id)?;
            let scene_id = message
                .scene_id
                .as_deref()
                .and_then(|old| remap.scenes.get(old))
                .cloned();
            let image_asset_id = message
                .image_asset_id
                .as_deref()
                .and_then(|old| materialized.get(old))
                .cloned();
            self.store
                .execute(
                    "INSERT INTO chat_messages (id, project_id, scene_id, role, text, \
                     image_asset_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
                    vec![
                        new_id.into(),
                        project_id.as_str().into(),
                        scene_id.into(),
                        message.role.as_str().into(),
                        message.text.as_str().into(),
                        image_asset_id.into(),
                        message.created_at.to_rfc3339().into(),
                    ],
                )
                .await?;
        }
        debug!(
            chat_messages = manifest.chat_messages.len(),
            "imported chat messages"
        );

        if let Some(settings) = &manifest.settings {
            // Upsert without relying on dialect-specific ON CONFLICT.
            self.store
                .execute(
                    "DELETE FROM project_settings WHERE project_id = ?",
                    vec![project_id.as_str().into()],
                )
                .await?;
            self.store
                .execute(
                    "INSERT INTO project_settings (project_id, data) VALUES (?, ?)",
                    vec![
                        project_id.as_str().into(),
                        serde_json::to_string(settings)?.into(),
                    ],
                )
                .await?;
            debug!("imported project settings");
        }

        Ok(ImportSummary {
            project_id,
            project_name: resolved_name,
            scene_count: manifest.scenes.len(),
            asset_count: manifest.assets.len(),
            chat_message_count: manifest.chat_messages.len(),
        })
    }

    /// Copies asset binaries out of the archive into the new project's
    /// storage namespace and inserts their rows. An asset whose binary is
    /// absent from the archive is skipped entirely; the import continues.
    async fn import_assets(
        &self,
        manifest: &ExportManifest,
        remap: &IdRemap,
        project_id: &str,
        archive: &mut ZipArchive<Cursor<Vec<u8>>>,
    ) -> Result<HashMap<String, String>, ArchiveError> {
        let mut materialized = HashMap::new();

        for asset in &manifest.assets {
            let entry = asset_entry_path(&asset.id, &asset.file_name);
            let bytes = match read_entry_bytes(archive, &entry)? {
                Some(bytes) => bytes,
                None => {
                    warn!(
                        asset_id = %asset.id,
                        entry = %entry,
                        "asset binary missing from archive, skipping asset"
                    );
                    continue;
                }
            };

            let new_id = IdRemap::require(&remap.assets, &asset.id)?;
            self.assets.write(project_id, &new_id, &bytes).await?;

            // The scene row does not exist yet, but its id is already fixed
            // by the remap table, so the reference can be written directly.
            let scene_id = asset
                .scene_id
                .as_deref()
                .and_then(|old| remap.scenes.get(old))
                .cloned();
            let metadata = if asset.metadata.is_null() {
                SqlValue::Null
            } else {
                serde_json::to_string(&asset.metadata)?.into()
            };

            self.store
                .execute(
                    "INSERT INTO assets (id, project_id, scene_id, asset_type, mime_type, \
                     file_name, size, checksum, metadata, created_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    vec![
                        new_id.as_str().into(),
                        project_id.into(),
                        scene_id.into(),
                        asset.asset_type.as_str().into(),
                        asset.mime_type.as_str().into(),
                        asset.file_name.as_str().into(),
                        asset.size.into(),
                        asset.checksum.clone().into(),
                        metadata,
                        asset.created_at.to_rfc3339().into(),
                    ],
                )
                .await?;

            materialized.insert(asset.id.clone(), new_id);
        }

        debug!(
            listed = manifest.assets.len(),
            imported = materialized.len(),
            "imported assets"
        );
        Ok(materialized)
    }
}

/// Opens the archive, extracts `project.json`, and gates on the manifest
/// version before deserializing the full document.
fn read_and_validate(
    bytes: Vec<u8>,
) -> Result<(ExportManifest, ZipArchive<Cursor<Vec<u8>>>), ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ArchiveError::InvalidArchive(format!("not a readable zip archive: {}", e)))?;

    let raw = read_entry_bytes(&mut archive, MANIFEST_ENTRY)?.ok_or_else(|| {
        ArchiveError::InvalidArchive(format!("archive has no {} entry", MANIFEST_ENTRY))
    })?;

    let document: Value = serde_json::from_slice(&raw).map_err(|e| {
        ArchiveError::InvalidArchive(format!("{} is not valid JSON: {}", MANIFEST_ENTRY, e))
    })?;

    match manifest_version(&document) {
        Some(MANIFEST_VERSION) => {}
        Some(other) => {
            return Err(ArchiveError::UnsupportedManifestVersion(other.to_string()));
        }
        None => {
            return Err(ArchiveError::UnsupportedManifestVersion(
                "missing or non-numeric".to_string(),
            ));
        }
    }

    let manifest: ExportManifest = serde_json::from_value(document)
        .map_err(|e| ArchiveError::InvalidArchive(format!("malformed manifest: {}", e)))?;

    Ok((manifest, archive))
}

fn read_entry_bytes(
    archive: &mut ZipArchive<Cursor<Vec<u8>>>,
    path: &str,
) -> Result<Option<Vec<u8>>, ArchiveError> {
    match archive.by_name(path) {
        Ok(mut file) => {
            let mut buffer = Vec::new();
            file.read_to_end(&mut buffer)?;
            Ok(Some(buffer))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(ArchiveError::InvalidArchive(format!(
            "failed to read {}: {}",
            path, e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{AspectRatio, ManifestProject, ManifestScene, ManifestTag};

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unused_name_is_kept() {
        assert_eq!(resolve_project_name("Demo", &names(&["Other"])), "Demo");
        assert_eq!(resolve_project_name("Demo", &[]), "Demo");
    }

    #[test]
    fn collisions_get_numeric_suffixes() {
        assert_eq!(resolve_project_name("Demo", &names(&["Demo"])), "Demo (1)");
        assert_eq!(
            resolve_project_name("Demo", &names(&["Demo", "Demo (1)"])),
            "Demo (2)"
        );
    }

    #[test]
    fn name_comparison_is_case_insensitive() {
        assert_eq!(resolve_project_name("demo", &names(&["DEMO"])), "demo (1)");
        assert_eq!(
            resolve_project_name("Demo", &names(&["demo", "DEMO (1)"])),
            "Demo (2)"
        );
    }

    #[test]
    fn remap_generates_fresh_ids_for_every_entity() {
        let now = Utc::now();
        let manifest = ExportManifest {
            manifest_version: MANIFEST_VERSION,
            project: ManifestProject {
                name: "P".to_string(),
                description: None,
                created_at: now,
                updated_at: now,
            },
            scenes: vec![ManifestScene {
                id: "s1".to_string(),
                description: "scene".to_string(),
                aspect_ratio: AspectRatio::Landscape,
                order_index: 0,
                primary_image_asset_id: None,
                primary_video_asset_id: None,
                group_id: None,
                tag_ids: vec![],
                created_at: now,
                updated_at: now,
            }],
            chat_messages: vec![],
            assets: vec![],
            groups: vec![],
            tags: vec![
                ManifestTag {
                    id: "t1".to_string(),
                    name: "hero".to_string(),
                    color: None,
                },
                ManifestTag {
                    id: "t2".to_string(),
                    name: "b-roll".to_string(),
                    color: None,
                },
            ],
            settings: None,
        };

        let remap = IdRemap::generate(&manifest);
        assert_eq!(remap.scenes.len(), 1);
        assert_eq!(remap.tags.len(), 2);
        assert_ne!(remap.scenes["s1"], "s1");
        assert_ne!(remap.tags["t1"], remap.tags["t2"]);
    }
}
