//! Creating a new file from a template.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::Path;

use super::{Registry, Template};
use crate::error::{CreateError, CreateResult};
use crate::launch::AppLauncher;

impl Registry {
    /// Create `destination` from `template` and open it with the template's
    /// command or the default application of its MIME type.
    ///
    /// Blocks on file I/O and process creation; run it off any
    /// latency-sensitive thread. Nothing is retried.
    pub fn create_file(&self, template: &Template, destination: &Path) -> CreateResult<()> {
        create_file(self.launcher.as_ref(), template, destination)
    }
}

pub(crate) fn create_file(
    launcher: &dyn AppLauncher,
    template: &Template,
    destination: &Path,
) -> CreateResult<()> {
    let resolved = template.snapshot();

    let app = match resolved.command {
        Some(command) => launcher
            .from_commandline(&command)
            .map_err(|e| CreateError::InvalidCommand {
                command: command.clone(),
                reason: e.to_string(),
            })?,
        None => launcher
            .default_for_type(template.mime_type())
            .ok_or_else(|| CreateError::NoHandler {
                mime_type: template.mime_type().clone(),
            })?,
    };

    if let Some(source) = resolved.target_file {
        // A failed copy would most probably fail the application too.
        copy_template(&source, destination)?;
    }

    launcher
        .launch(&app, &[destination.to_path_buf()])
        .map_err(|e| CreateError::LaunchFailed {
            reason: e.to_string(),
        })?;
    crate::log_event!(
        "create",
        "launched",
        "{} for {}",
        app.exec,
        destination.display()
    );
    Ok(())
}

/// Copy the template payload without overwriting `destination`.
///
/// A missing source is not an error: the template then has no content to
/// seed and the application starts on an absent file. Directory templates
/// produce an empty directory.
fn copy_template(source: &Path, destination: &Path) -> CreateResult<()> {
    let copy_failed = |cause: io::Error| CreateError::CopyFailed {
        source_path: source.to_path_buf(),
        destination: destination.to_path_buf(),
        cause,
    };

    let metadata = match fs::metadata(source) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            crate::debug_event!("create", "template file missing", "{}", source.display());
            return Ok(());
        }
        Err(e) => return Err(copy_failed(e)),
    };

    if metadata.is_dir() {
        return fs::create_dir(destination).map_err(copy_failed);
    }

    let mut input = match File::open(source) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(copy_failed(e)),
    };
    let mut output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
        .map_err(copy_failed)?;
    io::copy(&mut input, &mut output).map_err(copy_failed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::{AppInfo, LaunchError};
    use std::path::PathBuf;
    use crate::mime::MimeType;
    use crate::registry::template::{Resolved, TemplateRecord};
    use parking_lot::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeLauncher {
        default_app: Option<AppInfo>,
        fail_launch: bool,
        launched: Mutex<Vec<(String, Vec<PathBuf>)>>,
    }

    impl AppLauncher for FakeLauncher {
        fn default_for_type(&self, _mime_type: &MimeType) -> Option<AppInfo> {
            self.default_app.clone()
        }

        fn launch(&self, app: &AppInfo, paths: &[PathBuf]) -> Result<(), LaunchError> {
            if self.fail_launch {
                return Err(LaunchError::NotFound(app.exec.clone()));
            }
            self.launched.lock().push((app.exec.clone(), paths.to_vec()));
            Ok(())
        }
    }

    fn template(resolved: Resolved) -> Template {
        let record = TemplateRecord::new(MimeType::from_name("text/plain"));
        record.store(resolved);
        Template::from_record(record)
    }

    #[test]
    fn test_copy_then_launch_command() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("empty.txt");
        fs::write(&source, "seed").unwrap();
        let destination = temp.path().join("new.txt");

        let launcher = FakeLauncher::default();
        let template = template(Resolved {
            target_file: Some(source),
            command: Some("editor %f".to_string()),
            ..Resolved::default()
        });

        create_file(&launcher, &template, &destination).unwrap();
        assert_eq!(fs::read_to_string(&destination).unwrap(), "seed");
        let launched = launcher.launched.lock();
        assert_eq!(launched.len(), 1);
        assert_eq!(launched[0].0, "editor %f");
        assert_eq!(launched[0].1, vec![destination.clone()]);
    }

    #[test]
    fn test_missing_source_still_launches_default_handler() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("new.txt");
        let launcher = FakeLauncher {
            default_app: Some(AppInfo::from_commandline("viewer").unwrap()),
            ..FakeLauncher::default()
        };
        let template = template(Resolved {
            target_file: Some(temp.path().join("does-not-exist.txt")),
            ..Resolved::default()
        });

        create_file(&launcher, &template, &destination).unwrap();
        assert!(!destination.exists());
        assert_eq!(launcher.launched.lock()[0].0, "viewer");
    }

    #[test]
    fn test_no_handler() {
        let temp = TempDir::new().unwrap();
        let launcher = FakeLauncher::default();
        let template = template(Resolved::default());
        let err = create_file(&launcher, &template, &temp.path().join("x")).unwrap_err();
        assert!(matches!(err, CreateError::NoHandler { .. }));
    }

    #[test]
    fn test_existing_destination_aborts_before_launch() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("empty.txt");
        fs::write(&source, "seed").unwrap();
        let destination = temp.path().join("taken.txt");
        fs::write(&destination, "keep me").unwrap();

        let launcher = FakeLauncher::default();
        let template = template(Resolved {
            target_file: Some(source),
            command: Some("editor".to_string()),
            ..Resolved::default()
        });

        let err = create_file(&launcher, &template, &destination).unwrap_err();
        assert!(matches!(err, CreateError::CopyFailed { .. }));
        assert_eq!(fs::read_to_string(&destination).unwrap(), "keep me");
        assert!(launcher.launched.lock().is_empty());
    }

    #[test]
    fn test_invalid_command_and_launch_failure() {
        let temp = TempDir::new().unwrap();
        let launcher = FakeLauncher {
            fail_launch: true,
            ..FakeLauncher::default()
        };

        let bad = template(Resolved {
            command: Some("editor \"unterminated".to_string()),
            ..Resolved::default()
        });
        let err = create_file(&launcher, &bad, &temp.path().join("a")).unwrap_err();
        assert!(matches!(err, CreateError::InvalidCommand { .. }));

        let good = template(Resolved {
            command: Some("editor".to_string()),
            ..Resolved::default()
        });
        let err = create_file(&launcher, &good, &temp.path().join("b")).unwrap_err();
        assert!(matches!(err, CreateError::LaunchFailed { .. }));
    }

    #[test]
    fn test_directory_template_creates_directory() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("Folder");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("inner.txt"), "x").unwrap();
        let destination = temp.path().join("New Folder");

        let launcher = FakeLauncher::default();
        let template = template(Resolved {
            target_file: Some(source),
            command: Some("browser".to_string()),
            ..Resolved::default()
        });
        create_file(&launcher, &template, &destination).unwrap();
        assert!(destination.is_dir());
        assert!(!destination.join("inner.txt").exists());
    }
}
