pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod run_context;
pub mod services;
pub mod webdav_xml_parser;

pub use config::{Config, ConfigOverrides};
pub use errors::{EngineError, MirrorError, SyncError};
pub use models::SyncReport;
pub use run_context::{ExecutionEnvironment, RunContext};
pub use services::webdav::WebDAVMirrorService;
