//! Live registry of file templates.
//!
//! Templates are discovered in a prioritized list of directories, resolved
//! to a MIME type (desktop entries included), merged per MIME type and kept
//! current as the directories change. [`Registry::create_file`] instantiates
//! a template and opens the result with an application.

pub mod config;
pub mod desktop_entry;
pub mod error;
pub mod launch;
pub mod locations;
pub mod logging;
pub mod mime;
pub mod registry;
pub mod watcher;

pub use config::{LoggingConfig, Settings, TemplatesConfig};
pub use error::{ConfigError, CreateError, CreateResult, TemplateError};
pub use launch::{AppInfo, AppLauncher, LaunchError, SystemLauncher};
pub use locations::TemplateLocation;
pub use mime::{MimeGuesser, MimeType, SystemMimeGuesser};
pub use registry::{DirId, Icon, ListedFile, Registry, RegistryBuilder, Template, TemplateName};
pub use watcher::WatchEvent;
