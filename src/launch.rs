//! Application lookup and launching for created files.
//!
//! [`SystemLauncher`] resolves default handlers from `mimeapps.list` files
//! (falling back to `mimeinfo.cache`) and runs desktop entry `Exec` lines.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::desktop_entry::{DesktopEntry, KeyFile};
use crate::mime::MimeType;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Empty command line")]
    EmptyCommand,

    #[error("Unbalanced quote in command line '{0}'")]
    UnbalancedQuote(String),

    #[error("Failed to spawn process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Application not found: {0}")]
    NotFound(String),
}

/// An application able to open files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    /// Display name.
    pub name: Option<String>,
    /// Desktop entry `Exec` line, possibly with field codes.
    pub exec: String,
    pub icon: Option<String>,
    /// Desktop file the application was read from.
    pub desktop_file: Option<PathBuf>,
}

impl AppInfo {
    /// Application described by a bare command line.
    pub fn from_commandline(command: &str) -> Result<Self, LaunchError> {
        split_exec(command)?;
        Ok(Self {
            name: None,
            exec: command.to_string(),
            icon: None,
            desktop_file: None,
        })
    }

    /// Application described by a desktop entry; `None` for entries that
    /// are not launchable applications.
    pub fn from_desktop_entry(entry: &DesktopEntry) -> Option<Self> {
        if entry.string("Type").as_deref() != Some("Application") || entry.boolean("Hidden") {
            return None;
        }
        let exec = entry.string("Exec")?;
        Some(Self {
            name: entry.locale_string("Name"),
            exec,
            icon: entry.string("Icon"),
            desktop_file: Some(entry.path().to_path_buf()),
        })
    }

    /// Argument vector for opening `paths`.
    ///
    /// `%f %u` take the first path, `%F %U` all of them; paths are appended
    /// when the line has no file field code.
    pub fn command_line(&self, paths: &[PathBuf]) -> Result<Vec<String>, LaunchError> {
        let tokens = split_exec(&self.exec)?;
        let mut argv = Vec::with_capacity(tokens.len() + paths.len());
        let mut used_files = false;

        for token in tokens {
            match token.as_str() {
                "%F" | "%U" => {
                    argv.extend(paths.iter().map(|p| p.to_string_lossy().into_owned()));
                    used_files = true;
                }
                "%i" => {
                    if let Some(icon) = &self.icon {
                        argv.push("--icon".to_string());
                        argv.push(icon.clone());
                    }
                }
                _ => {
                    let (expanded, used) = expand_field_codes(&token, self, paths);
                    used_files |= used;
                    if !expanded.is_empty() || !token.starts_with('%') {
                        argv.push(expanded);
                    }
                }
            }
        }

        if !used_files {
            argv.extend(paths.iter().map(|p| p.to_string_lossy().into_owned()));
        }
        if argv.is_empty() {
            return Err(LaunchError::EmptyCommand);
        }
        Ok(argv)
    }
}

fn expand_field_codes(token: &str, app: &AppInfo, paths: &[PathBuf]) -> (String, bool) {
    let mut out = String::with_capacity(token.len());
    let mut used_files = false;
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('f') | Some('u') => {
                if let Some(first) = paths.first() {
                    out.push_str(&first.to_string_lossy());
                }
                used_files = true;
            }
            Some('c') => out.push_str(app.name.as_deref().unwrap_or_default()),
            Some('k') => {
                if let Some(file) = &app.desktop_file {
                    out.push_str(&file.to_string_lossy());
                }
            }
            // Deprecated and unsupported codes expand to nothing.
            Some(_) | None => {}
        }
    }
    (out, used_files)
}

/// Split an `Exec` value into arguments.
///
/// Arguments are separated by spaces; double quotes group an argument and,
/// inside them, a backslash escapes `"`, `` ` ``, `$` and `\`.
pub fn split_exec(command: &str) -> Result<Vec<String>, LaunchError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.peek() {
                            Some(&next @ ('"' | '`' | '$' | '\\')) => {
                                current.push(next);
                                chars.next();
                            }
                            _ => current.push('\\'),
                        },
                        Some(other) => current.push(other),
                        None => return Err(LaunchError::UnbalancedQuote(command.to_string())),
                    }
                }
            }
            ' ' | '\t' | '\n' => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            other => {
                current.push(other);
                in_token = true;
            }
        }
    }
    if in_token {
        args.push(current);
    }
    if args.is_empty() {
        return Err(LaunchError::EmptyCommand);
    }
    Ok(args)
}

/// Application resolution and launching service.
pub trait AppLauncher: Send + Sync {
    /// Default application for `mime_type`.
    fn default_for_type(&self, mime_type: &MimeType) -> Option<AppInfo>;

    /// Application running `command`.
    fn from_commandline(&self, command: &str) -> Result<AppInfo, LaunchError> {
        AppInfo::from_commandline(command)
    }

    /// Start `app` on `paths` without waiting for it.
    fn launch(&self, app: &AppInfo, paths: &[PathBuf]) -> Result<(), LaunchError>;
}

/// Launcher resolving handlers from XDG `mimeapps.list` files.
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    /// Directories searched for `mimeapps.list`, most important first.
    config_dirs: Vec<PathBuf>,
    /// Data directories; applications live in `<dir>/applications`.
    data_dirs: Vec<PathBuf>,
}

impl SystemLauncher {
    /// Directories from the XDG environment.
    pub fn from_env() -> Self {
        let mut config_dirs: Vec<PathBuf> = dirs::config_dir().into_iter().collect();
        config_dirs.extend(env_path_list("XDG_CONFIG_DIRS", "/etc/xdg"));
        let mut data_dirs: Vec<PathBuf> = dirs::data_dir().into_iter().collect();
        data_dirs.extend(env_path_list("XDG_DATA_DIRS", "/usr/local/share:/usr/share"));
        Self::with_dirs(config_dirs, data_dirs)
    }

    pub fn with_dirs(config_dirs: Vec<PathBuf>, data_dirs: Vec<PathBuf>) -> Self {
        Self {
            config_dirs,
            data_dirs,
        }
    }

    /// `mimeapps.list` files in lookup order.
    fn mimeapps_lists(&self) -> Vec<PathBuf> {
        self.config_dirs
            .iter()
            .map(|dir| dir.join("mimeapps.list"))
            .chain(
                self.data_dirs
                    .iter()
                    .map(|dir| dir.join("applications").join("mimeapps.list")),
            )
            .collect()
    }

    fn find_desktop_file(&self, id: &str) -> Option<PathBuf> {
        // `foo-bar.desktop` may live at `applications/foo/bar.desktop`.
        let nested = id.replacen('-', "/", 1);
        self.data_dirs.iter().find_map(|dir| {
            let apps = dir.join("applications");
            [apps.join(id), apps.join(&nested)]
                .into_iter()
                .find(|candidate| candidate.is_file())
        })
    }

    fn app_for_ids(&self, ids: &str) -> Option<AppInfo> {
        ids.split(';')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .find_map(|id| {
                let path = self.find_desktop_file(id)?;
                let entry = DesktopEntry::load(&path).ok()?;
                AppInfo::from_desktop_entry(&entry)
            })
    }
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self::from_env()
    }
}

impl AppLauncher for SystemLauncher {
    fn default_for_type(&self, mime_type: &MimeType) -> Option<AppInfo> {
        let defaults = self.mimeapps_lists().into_iter().find_map(|list| {
            let keys = KeyFile::load(&list).ok()?;
            let ids = keys.string("Default Applications", mime_type.as_str())?;
            self.app_for_ids(&ids)
        });
        defaults.or_else(|| {
            self.data_dirs.iter().find_map(|dir| {
                let cache = dir.join("applications").join("mimeinfo.cache");
                let keys = KeyFile::load(&cache).ok()?;
                let ids = keys.string("MIME Cache", mime_type.as_str())?;
                self.app_for_ids(&ids)
            })
        })
    }

    fn launch(&self, app: &AppInfo, paths: &[PathBuf]) -> Result<(), LaunchError> {
        let argv = app.command_line(paths)?;
        let (program, args) = argv.split_first().ok_or(LaunchError::EmptyCommand)?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => LaunchError::NotFound(program.clone()),
                _ => LaunchError::Spawn(e),
            })?;
        crate::debug_event!("create", "spawned", "{program} (pid {})", child.id());
        // Reap the child in the background so it does not linger as a zombie.
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

fn env_path_list(var: &str, default: &str) -> Vec<PathBuf> {
    let raw = std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string());
    raw.split(':')
        .filter(|part| !part.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_split_exec_quoting() {
        assert_eq!(
            split_exec(r#"libreoffice --writer %U"#).unwrap(),
            vec!["libreoffice", "--writer", "%U"]
        );
        assert_eq!(
            split_exec(r#""/opt/My App/bin" "say \"hi\"" x"#).unwrap(),
            vec!["/opt/My App/bin", "say \"hi\"", "x"]
        );
        assert_eq!(split_exec(r#"a "" b"#).unwrap(), vec!["a", "", "b"]);
        assert!(matches!(split_exec("   "), Err(LaunchError::EmptyCommand)));
        assert!(matches!(
            split_exec(r#"a "b"#),
            Err(LaunchError::UnbalancedQuote(_))
        ));
    }

    #[test]
    fn test_command_line_field_codes() {
        let app = AppInfo {
            name: Some("Editor".to_string()),
            exec: "editor --title=%c %f %i %k %% %d".to_string(),
            icon: Some("accessories-text-editor".to_string()),
            desktop_file: Some(PathBuf::from("/apps/editor.desktop")),
        };
        let argv = app.command_line(&[PathBuf::from("/tmp/new.txt")]).unwrap();
        assert_eq!(
            argv,
            vec![
                "editor",
                "--title=Editor",
                "/tmp/new.txt",
                "--icon",
                "accessories-text-editor",
                "/apps/editor.desktop",
                "%",
            ]
        );
    }

    #[test]
    fn test_command_line_appends_paths() {
        let app = AppInfo::from_commandline("viewer --new").unwrap();
        let argv = app.command_line(&[PathBuf::from("/tmp/a b.txt")]).unwrap();
        assert_eq!(argv, vec!["viewer", "--new", "/tmp/a b.txt"]);
    }

    #[test]
    fn test_default_for_type_from_mimeapps() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config");
        let data = temp.path().join("data");
        let apps = data.join("applications");
        fs::create_dir_all(&config).unwrap();
        fs::create_dir_all(apps.join("org")).unwrap();

        fs::write(
            config.join("mimeapps.list"),
            "[Default Applications]\ntext/plain=missing.desktop;org-editor.desktop;\n",
        )
        .unwrap();
        fs::write(
            apps.join("org/editor.desktop"),
            "[Desktop Entry]\nType=Application\nName=Editor\nExec=editor %F\n",
        )
        .unwrap();
        fs::write(
            apps.join("mimeinfo.cache"),
            "[MIME Cache]\nimage/png=viewer.desktop;\n",
        )
        .unwrap();
        fs::write(
            apps.join("viewer.desktop"),
            "[Desktop Entry]\nType=Application\nName=Viewer\nExec=viewer\n",
        )
        .unwrap();

        let launcher = SystemLauncher::with_dirs(vec![config], vec![data]);
        let editor = launcher
            .default_for_type(&MimeType::from_name("text/plain"))
            .unwrap();
        assert_eq!(editor.name.as_deref(), Some("Editor"));
        assert_eq!(editor.exec, "editor %F");

        let viewer = launcher
            .default_for_type(&MimeType::from_name("image/png"))
            .unwrap();
        assert_eq!(viewer.exec, "viewer");

        assert!(
            launcher
                .default_for_type(&MimeType::from_name("application/x-nothing"))
                .is_none()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_missing_program() {
        let launcher = SystemLauncher::with_dirs(Vec::new(), Vec::new());
        let app = AppInfo::from_commandline("/nonexistent/program-xyz").unwrap();
        let err = launcher
            .launch(&app, &[PathBuf::from("/tmp/x")])
            .unwrap_err();
        assert!(matches!(err, LaunchError::NotFound(_)));
    }
}
