//! Discovery of the prioritized template directory list.
//!
//! Order, highest priority first:
//! 1. the user's XDG Templates directory (created when missing)
//! 2. `<user data dir>/templates`
//! 3. `<system data dir>/templates` for each existing system data dir

use std::path::{Path, PathBuf};

use crate::config::TemplatesConfig;

/// Subdirectory of data directories holding templates.
const TEMPLATES_SUBDIR: &str = "templates";

/// Fallback for `XDG_DATA_DIRS`.
const DEFAULT_SYSTEM_DATA_DIRS: &str = "/usr/local/share/:/usr/share/";

/// One watched template directory and whether it belongs to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLocation {
    pub path: PathBuf,
    pub user_dir: bool,
}

impl TemplateLocation {
    pub fn user(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            user_dir: true,
        }
    }

    pub fn system(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            user_dir: false,
        }
    }
}

/// Compute the ordered template directories for `config`.
pub fn discover(config: &TemplatesConfig) -> Vec<TemplateLocation> {
    let mut locations = Vec::new();

    let xdg_templates = config
        .user_templates_dir
        .clone()
        .or_else(dirs::template_dir)
        .or_else(|| dirs::home_dir().map(|home| home.join("Templates")))
        .unwrap_or_else(|| PathBuf::from("Templates"));
    if config.create_user_templates_dir && !xdg_templates.exists() {
        if let Err(e) = std::fs::create_dir_all(&xdg_templates) {
            crate::debug_event!(
                "registry",
                "cannot create templates dir",
                "{}: {e}",
                xdg_templates.display()
            );
        }
    }
    locations.push(TemplateLocation::user(xdg_templates));

    if let Some(data_dir) = config.user_data_dir.clone().or_else(dirs::data_dir) {
        locations.push(TemplateLocation::user(data_dir.join(TEMPLATES_SUBDIR)));
    }

    let system_dirs = config
        .system_data_dirs
        .clone()
        .unwrap_or_else(system_data_dirs_from_env);
    for data_dir in system_dirs {
        let path = data_dir.join(TEMPLATES_SUBDIR);
        if path.exists() {
            locations.push(TemplateLocation::system(path));
        }
    }

    dedup_keep_first(locations)
}

fn system_data_dirs_from_env() -> Vec<PathBuf> {
    let raw = std::env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_DATA_DIRS.to_string());
    split_path_list(&raw)
}

fn split_path_list(raw: &str) -> Vec<PathBuf> {
    raw.split(':')
        .filter(|part| !part.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Drop repeated directories, keeping the highest-priority occurrence.
///
/// A directory watched twice would register each file twice.
fn dedup_keep_first(locations: Vec<TemplateLocation>) -> Vec<TemplateLocation> {
    let mut seen: Vec<PathBuf> = Vec::new();
    let mut out = Vec::with_capacity(locations.len());
    for location in locations {
        let key = normalize(&location.path);
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(location);
    }
    out
}

fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}
