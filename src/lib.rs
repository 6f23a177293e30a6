pub mod archive;
pub mod assets;
pub mod errors;
pub mod services;
pub mod store;

pub use archive::{ExportManifest, ProjectArchiveFile, MANIFEST_VERSION};
pub use assets::AssetStore;
pub use errors::{ArchiveError, CoreError, CoreErrorKind, CoreResult};
pub use services::{ExportService, ImportService, ImportSummary};
pub use store::{Row, SeaOrmStore, SqlValue, Store, StoreError};
