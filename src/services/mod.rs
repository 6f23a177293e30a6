pub mod export_service;
pub mod import_service;

pub use export_service::*;
pub use import_service::*;
