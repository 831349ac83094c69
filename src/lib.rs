//! In-application update subsystem for ParaImage.
//!
//! Answers three questions for the host application: is a newer release
//! published, how to fetch the right asset for this machine, and how to
//! swap the installed files while the running process exits. The swap
//! itself is handed to a detached platform script; a successful
//! [`Updater::install`] means the updater was armed, not that the update
//! completed.

pub mod config;
pub mod download;
pub mod install;
pub mod platform;
pub mod progress;
pub mod release;
pub mod version;

use std::path::{Path, PathBuf};

pub use config::{updater_config, ConfigError, UpdaterConfig};
pub use download::DownloadError;
pub use install::InstallError;
pub use platform::{AssetKind, Platform};
pub use progress::{DownloadProgress, ProgressHandle};
pub use release::{AssetSummary, ReleaseError, UpdateSummary};

/// Facade owning the configuration and the process-wide download progress
/// state. Construct one per process at updater startup.
pub struct Updater {
    config: UpdaterConfig,
    progress: ProgressHandle,
}

impl Updater {
    pub fn new(config: UpdaterConfig) -> Self {
        Self {
            config,
            progress: ProgressHandle::new(),
        }
    }

    /// Build from the environment (per-user data dir, env overrides).
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(updater_config()?))
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// A cloneable handle onto the shared progress state, for pollers on
    /// other threads.
    pub fn progress_handle(&self) -> ProgressHandle {
        self.progress.clone()
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> DownloadProgress {
        self.progress.snapshot()
    }

    pub fn check_for_updates(&self) -> Result<UpdateSummary, ReleaseError> {
        release::check_for_updates(&self.config)
    }

    pub fn download(&self, url: &str) -> Result<PathBuf, DownloadError> {
        download::download_asset(&self.config, &self.progress, url)
    }

    pub fn install(&self, asset_path: &Path) -> Result<(), InstallError> {
        install::install(&self.config, asset_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(data_dir: &Path) -> UpdaterConfig {
        UpdaterConfig {
            data_dir: data_dir.to_path_buf(),
            updates_dir: data_dir.join("updates"),
            api_base: "https://api.github.com".to_string(),
            repo_owner: "paraimage".to_string(),
            repo_name: "paraimage".to_string(),
            product_name: "ParaImage".to_string(),
            product_version: "1.9.0".to_string(),
            packaged: false,
        }
    }

    #[test]
    fn progress_handle_shares_state_with_updater() {
        let dir = tempdir().unwrap();
        let updater = Updater::new(make_config(dir.path()));
        let handle = updater.progress_handle();
        handle.begin(Some(10));
        handle.record(5);
        assert_eq!(updater.progress().downloaded, 5);
    }

    #[test]
    fn download_validation_error_passes_through_facade() {
        let dir = tempdir().unwrap();
        let updater = Updater::new(make_config(dir.path()));
        let err = updater.download("https://example.com/a.zip").unwrap_err();
        assert!(matches!(err, DownloadError::NotReleaseAsset));
    }

    #[test]
    fn install_refused_when_not_packaged() {
        let dir = tempdir().unwrap();
        let updater = Updater::new(make_config(dir.path()));
        let err = updater.install(Path::new("/tmp/x.tar.gz")).unwrap_err();
        assert!(matches!(err, InstallError::NotPackaged));
    }
}
