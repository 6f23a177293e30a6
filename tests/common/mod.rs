use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use sea_orm::Database;
use storyboard::{AssetStore, SeaOrmStore, Store};

pub async fn connect_store() -> Result<Arc<dyn Store>> {
    let db = Database::connect("sqlite::memory:").await?;
    let store: Arc<dyn Store> = Arc::new(SeaOrmStore::new(db));
    create_schema(store.as_ref()).await?;
    Ok(store)
}

/// The schema normally owned by the host application's migrations.
async fn create_schema(store: &dyn Store) -> Result<()> {
    let tables = [
        "CREATE TABLE projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE scenes (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            description TEXT NOT NULL,
            aspect_ratio TEXT NOT NULL,
            order_index INTEGER NOT NULL,
            primary_image_asset_id TEXT,
            primary_video_asset_id TEXT,
            group_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE assets (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            scene_id TEXT,
            asset_type TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            file_name TEXT NOT NULL,
            size INTEGER NOT NULL,
            checksum TEXT,
            metadata TEXT,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE chat_messages (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            scene_id TEXT,
            role TEXT NOT NULL,
            text TEXT NOT NULL,
            image_asset_id TEXT,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE scene_groups (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            name TEXT NOT NULL,
            color TEXT,
            order_index INTEGER NOT NULL
        )",
        "CREATE TABLE scene_tags (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            name TEXT NOT NULL,
            color TEXT
        )",
        "CREATE TABLE scene_tag_links (
            scene_id TEXT NOT NULL,
            tag_id TEXT NOT NULL
        )",
        "CREATE TABLE project_settings (
            project_id TEXT PRIMARY KEY,
            data TEXT NOT NULL
        )",
    ];

    for ddl in tables {
        store.execute(ddl, vec![]).await?;
    }
    Ok(())
}

pub struct DemoProject {
    pub project_id: String,
    pub scene1_id: String,
    pub scene2_id: String,
    pub asset_id: String,
    pub group_id: String,
    pub tag_id: String,
}

pub const DEMO_ASSET_BYTES: &[u8] = b"fake png payload";

/// Seeds the "Demo" project: scene S1 with an image asset, a group and a
/// tag, scene S2 bare, two chat messages, and a settings blob.
pub async fn seed_demo_project(store: &dyn Store, assets: &AssetStore) -> Result<DemoProject> {
    let now = Utc::now();
    let ts = now.to_rfc3339();

    store
        .execute(
            "INSERT INTO projects (id, name, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
            vec![
                "p-src".into(),
                "Demo".into(),
                "demo storyboard".into(),
                ts.as_str().into(),
                ts.as_str().into(),
            ],
        )
        .await?;

    store
        .execute(
            "INSERT INTO scene_groups (id, project_id, name, color, order_index) \
             VALUES (?, ?, ?, ?, ?)",
            vec![
                "g-1".into(),
                "p-src".into(),
                "Intro".into(),
                "#ff8800".into(),
                0i64.into(),
            ],
        )
        .await?;

    store
        .execute(
            "INSERT INTO scene_tags (id, project_id, name, color) VALUES (?, ?, ?, ?)",
            vec!["t-1".into(), "p-src".into(), "hero".into(), None::<String>.into()],
        )
        .await?;

    store
        .execute(
            "INSERT INTO scenes (id, project_id, description, aspect_ratio, order_index, \
             primary_image_asset_id, primary_video_asset_id, group_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            vec![
                "s-1".into(),
                "p-src".into(),
                "Opening shot".into(),
                "16:9".into(),
                0i64.into(),
                "a-1".into(),
                None::<String>.into(),
                "g-1".into(),
                ts.as_str().into(),
                ts.as_str().into(),
            ],
        )
        .await?;
    store
        .execute(
            "INSERT INTO scene_tag_links (scene_id, tag_id) VALUES (?, ?)",
            vec!["s-1".into(), "t-1".into()],
        )
        .await?;

    // Non-contiguous order index on purpose.
    store
        .execute(
            "INSERT INTO scenes (id, project_id, description, aspect_ratio, order_index, \
             primary_image_asset_id, primary_video_asset_id, group_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            vec![
                "s-2".into(),
                "p-src".into(),
                "Closing shot".into(),
                "9:16".into(),
                10i64.into(),
                None::<String>.into(),
                None::<String>.into(),
                None::<String>.into(),
                ts.as_str().into(),
                ts.as_str().into(),
            ],
        )
        .await?;

    store
        .execute(
            "INSERT INTO assets (id, project_id, scene_id, asset_type, mime_type, file_name, \
             size, checksum, metadata, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            vec![
                "a-1".into(),
                "p-src".into(),
                "s-1".into(),
                "image".into(),
                "image/png".into(),
                "opening.png".into(),
                (DEMO_ASSET_BYTES.len() as i64).into(),
                None::<String>.into(),
                r#"{"width":1920,"height":1080}"#.into(),
                ts.as_str().into(),
            ],
        )
        .await?;
    assets.write("p-src", "a-1", DEMO_ASSET_BYTES).await?;

    let later = (now + Duration::seconds(1)).to_rfc3339();
    store
        .execute(
            "INSERT INTO chat_messages (id, project_id, scene_id, role, text, image_asset_id, \
             created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            vec![
                "m-1".into(),
                "p-src".into(),
                "s-1".into(),
                "user".into(),
                "make the opening warmer".into(),
                "a-1".into(),
                ts.as_str().into(),
            ],
        )
        .await?;
    store
        .execute(
            "INSERT INTO chat_messages (id, project_id, scene_id, role, text, image_asset_id, \
             created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            vec![
                "m-2".into(),
                "p-src".into(),
                None::<String>.into(),
                "model".into(),
                "done, warmed the color grade".into(),
                None::<String>.into(),
                later.as_str().into(),
            ],
        )
        .await?;

    store
        .execute(
            "INSERT INTO project_settings (project_id, data) VALUES (?, ?)",
            vec!["p-src".into(), r#"{"theme":"dark"}"#.into()],
        )
        .await?;

    Ok(DemoProject {
        project_id: "p-src".to_string(),
        scene1_id: "s-1".to_string(),
        scene2_id: "s-2".to_string(),
        asset_id: "a-1".to_string(),
        group_id: "g-1".to_string(),
        tag_id: "t-1".to_string(),
    })
}
