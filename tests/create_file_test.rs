//! Template instantiation through the public registry surface.

use file_templates::{
    AppInfo, AppLauncher, CreateError, LaunchError, MimeType, Registry, TemplateLocation,
    WatchEvent,
};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Launcher that records launches instead of spawning processes.
#[derive(Clone, Default)]
struct RecordingLauncher {
    default_app: Option<AppInfo>,
    launched: Arc<Mutex<Vec<(AppInfo, Vec<PathBuf>)>>>,
}

impl AppLauncher for RecordingLauncher {
    fn default_for_type(&self, _mime_type: &MimeType) -> Option<AppInfo> {
        self.default_app.clone()
    }

    fn launch(&self, app: &AppInfo, paths: &[PathBuf]) -> Result<(), LaunchError> {
        self.launched.lock().push((app.clone(), paths.to_vec()));
        Ok(())
    }
}

fn registry(dir: &Path, launcher: RecordingLauncher) -> Registry {
    let registry = Registry::builder()
        .locations(vec![TemplateLocation::user(dir)])
        .launcher(launcher)
        .watch(false)
        .build();
    registry.initialize();
    registry.wait_for_listings();
    registry
}

#[test]
fn test_create_from_desktop_command() {
    let templates = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::write(templates.path().join("letter.txt"), "Dear ,").unwrap();
    fs::write(
        templates.path().join("letter.desktop"),
        "[Desktop Entry]\nType=Application\nMimeType=text/plain\nName=Letter\nExec=editor --new %f\nURL=letter.txt\n",
    )
    .unwrap();

    let launcher = RecordingLauncher::default();
    let registry = registry(templates.path(), launcher.clone());
    let template = registry.find(&MimeType::from_name("text/plain")).unwrap();
    assert_eq!(template.command().as_deref(), Some("editor --new %f"));

    let destination = out.path().join("Letter.txt");
    registry.create_file(&template, &destination).unwrap();

    assert_eq!(fs::read_to_string(&destination).unwrap(), "Dear ,");
    let launched = launcher.launched.lock();
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0].0.exec, "editor --new %f");
    assert_eq!(launched[0].1, vec![destination.clone()]);
    assert_eq!(
        launched[0].0.command_line(&launched[0].1).unwrap(),
        vec![
            "editor".to_string(),
            "--new".to_string(),
            destination.to_string_lossy().into_owned(),
        ]
    );
}

#[test]
fn test_missing_target_with_default_handler_launches() {
    let templates = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let payload = templates.path().join("empty.txt");
    fs::write(&payload, "").unwrap();

    let launcher = RecordingLauncher {
        default_app: Some(AppInfo::from_commandline("gedit").unwrap()),
        ..RecordingLauncher::default()
    };
    let registry = registry(templates.path(), launcher.clone());
    let template = registry.find(&MimeType::from_name("text/plain")).unwrap();

    // The payload disappears without the registry noticing.
    fs::remove_file(&payload).unwrap();
    assert_eq!(template.target_file(), Some(payload));

    let destination = out.path().join("new.txt");
    registry.create_file(&template, &destination).unwrap();
    assert!(!destination.exists());
    assert_eq!(launcher.launched.lock()[0].0.exec, "gedit");
}

#[test]
fn test_no_default_handler() {
    let templates = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::write(templates.path().join("page.html"), "<html></html>").unwrap();

    let launcher = RecordingLauncher::default();
    let registry = registry(templates.path(), launcher.clone());
    let template = registry.find(&MimeType::from_name("text/html")).unwrap();

    let destination = out.path().join("new.html");
    let err = registry.create_file(&template, &destination).unwrap_err();
    assert!(matches!(err, CreateError::NoHandler { .. }));
    assert!(!destination.exists());
    assert!(launcher.launched.lock().is_empty());
}

#[test]
fn test_template_handle_outlives_removal() {
    let templates = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let payload = templates.path().join("empty.txt");
    fs::write(&payload, "content").unwrap();

    let launcher = RecordingLauncher {
        default_app: Some(AppInfo::from_commandline("gedit").unwrap()),
        ..RecordingLauncher::default()
    };
    let registry = registry(templates.path(), launcher.clone());
    let template = registry.list_all(true).pop().unwrap();

    registry.dispatch(0, WatchEvent::Deleted(payload.clone()));
    assert!(registry.list_all(false).is_empty());

    let destination = out.path().join("copy.txt");
    registry.create_file(&template, &destination).unwrap();
    assert_eq!(fs::read_to_string(&destination).unwrap(), "content");
}
