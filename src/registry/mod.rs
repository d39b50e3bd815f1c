//! The template registry.
//!
//! # Architecture
//!
//! ```text
//! Registry
//!   - Shared (Arc)
//!       - Mutex<RegistryState>   directories, entries, MIME -> template chains
//!       - MimeGuesser            classification, called without the lock
//!   - WatchManager               one listing + watch thread per directory
//!   - AppLauncher                used by create_file
//! ```
//!
//! Listing jobs and watch workers call into the directory index
//! ([`index`]), which applies changes through the merge engine ([`merge`]).

mod create;
mod index;
mod merge;
mod state;
mod template;

use std::sync::Arc;

use parking_lot::Mutex;

pub use index::ListedFile;
pub use state::DirId;
pub use template::{Icon, Template, TemplateName};

use state::RegistryState;

use crate::config::Settings;
use crate::launch::{AppLauncher, SystemLauncher};
use crate::locations::{self, TemplateLocation};
use crate::mime::{MimeGuesser, MimeType, SystemMimeGuesser};
use crate::watcher::{WatchEvent, WatchManager};

/// State shared between the registry and its background workers.
pub(crate) struct Shared {
    pub(crate) state: Mutex<RegistryState>,
    pub(crate) guesser: Arc<dyn MimeGuesser>,
}

/// Live registry of file templates merged from prioritized directories.
///
/// Create one per process (or one per test) and call [`initialize`]; the
/// registry fills asynchronously as directory listings complete.
///
/// [`initialize`]: Registry::initialize
pub struct Registry {
    shared: Arc<Shared>,
    launcher: Arc<dyn AppLauncher>,
    settings: Settings,
    locations: Option<Vec<TemplateLocation>>,
    watch: bool,
    manager: Mutex<Option<WatchManager>>,
}

impl Registry {
    /// Create a builder for configuring the registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry with system services and the given settings.
    pub fn new(settings: Settings) -> Self {
        Self::builder().settings(settings).build()
    }

    /// Build the directory list and start listing and watching it.
    ///
    /// Returns before the listings complete. Calling it again while
    /// initialized does nothing.
    pub fn initialize(&self) {
        let mut manager = self.manager.lock();
        if manager.is_some() {
            crate::debug_event!("registry", "already initialized");
            return;
        }

        let locations = self
            .locations
            .clone()
            .unwrap_or_else(|| locations::discover(&self.settings.templates));
        self.shared.state.lock().set_directories(&locations);

        crate::log_event!("registry", "initializing", "{} directories", locations.len());
        for (rank, location) in locations.iter().enumerate() {
            crate::debug_event!(
                "registry",
                "directory",
                "#{rank} {}{}",
                location.path.display(),
                if location.user_dir { " (user)" } else { "" }
            );
        }

        *manager = Some(WatchManager::start(&self.shared, &locations, self.watch));
    }

    /// Detach all watches and drop every directory, entry and template.
    ///
    /// Template handles held by callers keep their last values.
    pub fn teardown(&self) {
        let mut guard = self.manager.lock();
        let Some(manager) = guard.take() else {
            return;
        };
        manager.shutdown();
        self.shared.state.lock().clear();
        crate::log_event!("registry", "torn down");
    }

    pub fn is_initialized(&self) -> bool {
        self.manager.lock().is_some()
    }

    /// Block until the initial listing of every directory has been applied.
    pub fn wait_for_listings(&self) {
        if let Some(manager) = self.manager.lock().as_mut() {
            manager.wait_for_listings();
        }
    }

    /// Visible templates. With `user_only`, only templates whose most
    /// relevant definition lives in a user directory.
    ///
    /// Order is unspecified.
    pub fn list_all(&self, user_only: bool) -> Vec<Template> {
        self.shared.state.lock().list_all(user_only)
    }

    /// Template registered for `mime_type`, visible or not.
    pub fn find(&self, mime_type: &MimeType) -> Option<Template> {
        self.shared.state.lock().find(mime_type)
    }

    /// Watched directories, highest priority first.
    pub fn directories(&self) -> Vec<TemplateLocation> {
        self.shared
            .state
            .lock()
            .dirs
            .iter()
            .map(|d| TemplateLocation {
                path: d.path.clone(),
                user_dir: d.user_dir,
            })
            .collect()
    }

    /// Apply a watch event for directory `dir` synchronously.
    ///
    /// Used by the built-in watch workers; embedders with their own change
    /// notification can feed events here.
    pub fn dispatch(&self, dir: DirId, event: WatchEvent) {
        self.shared.dispatch(dir, event);
    }

    /// Apply a listing of directory `dir` synchronously.
    pub fn apply_listing(&self, dir: DirId, files: Vec<ListedFile>) {
        self.shared.apply_listing(dir, files);
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Builder for constructing a [`Registry`].
pub struct RegistryBuilder {
    settings: Settings,
    locations: Option<Vec<TemplateLocation>>,
    guesser: Option<Arc<dyn MimeGuesser>>,
    launcher: Option<Arc<dyn AppLauncher>>,
    watch: Option<bool>,
}

impl RegistryBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            locations: None,
            guesser: None,
            launcher: None,
            watch: None,
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Use an explicit directory list instead of discovering one.
    pub fn locations(mut self, locations: Vec<TemplateLocation>) -> Self {
        self.locations = Some(locations);
        self
    }

    pub fn mime_guesser(mut self, guesser: impl MimeGuesser + 'static) -> Self {
        self.guesser = Some(Arc::new(guesser));
        self
    }

    pub fn launcher(mut self, launcher: impl AppLauncher + 'static) -> Self {
        self.launcher = Some(Arc::new(launcher));
        self
    }

    /// Override `templates.watch` from the settings.
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = Some(watch);
        self
    }

    pub fn build(self) -> Registry {
        let watch = self.watch.unwrap_or(self.settings.templates.watch);
        Registry {
            shared: Arc::new(Shared {
                state: Mutex::new(RegistryState::default()),
                guesser: self
                    .guesser
                    .unwrap_or_else(|| Arc::new(SystemMimeGuesser::new())),
            }),
            launcher: self
                .launcher
                .unwrap_or_else(|| Arc::new(SystemLauncher::from_env())),
            settings: self.settings,
            locations: self.locations,
            watch,
            manager: Mutex::new(None),
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
