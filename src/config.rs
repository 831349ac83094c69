use std::path::{Path, PathBuf};
use thiserror::Error;

/// GitHub API host. Overridable via `PARAIMAGE_API_BASE` so tests and
/// proxies can point the release check elsewhere.
const DEFAULT_API_BASE: &str = "https://api.github.com";

const DEFAULT_REPO_OWNER: &str = "paraimage";
const DEFAULT_REPO_NAME: &str = "paraimage";

#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    pub data_dir: PathBuf, // %APPDATA%\ParaImage, ~/Library/Application Support/ParaImage, ~/.local/share/ParaImage
    pub updates_dir: PathBuf, // data_dir/updates — the only trusted install source
    pub api_base: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub product_name: String,    // "ParaImage" (User-Agent)
    pub product_version: String, // currently running version
    /// True when running from a packaged install rather than a cargo
    /// checkout. Install is refused otherwise.
    pub packaged: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine per-user data directory")]
    NoDataDir,
}

pub fn updater_config() -> Result<UpdaterConfig, ConfigError> {
    let data_dir = if let Ok(v) = std::env::var("PARAIMAGE_DATA_DIR") {
        PathBuf::from(v)
    } else {
        dirs::data_dir()
            .ok_or(ConfigError::NoDataDir)?
            .join("ParaImage")
    };

    let updates_dir = data_dir.join("updates");

    let api_base = std::env::var("PARAIMAGE_API_BASE")
        .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

    let packaged = match std::env::var("PARAIMAGE_PACKAGED").as_deref() {
        Ok("1") => true,
        Ok("0") => false,
        _ => exe_looks_packaged(),
    };

    Ok(UpdaterConfig {
        data_dir,
        updates_dir,
        api_base,
        repo_owner: DEFAULT_REPO_OWNER.to_string(),
        repo_name: DEFAULT_REPO_NAME.to_string(),
        product_name: "ParaImage".to_string(),
        product_version: env!("CARGO_PKG_VERSION").to_string(),
        packaged,
    })
}

impl UpdaterConfig {
    /// `owner/name` slug used in API and download URLs.
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.repo_owner, self.repo_name)
    }

    pub fn repo_url(&self) -> String {
        format!("https://github.com/{}", self.repo_slug())
    }

    pub fn user_agent(&self) -> String {
        format!("{}/{}", self.product_name, self.product_version)
    }
}

/// Packaged-mode heuristic: a dev build runs from somewhere under a cargo
/// `target/` tree; a packaged install does not. The Python original keyed
/// this off `sys.frozen`.
fn exe_looks_packaged() -> bool {
    let exe = match std::env::current_exe() {
        Ok(p) => p,
        Err(_) => return false,
    };
    !path_has_target_dir(&exe)
}

fn path_has_target_dir(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str() == std::ffi::OsStr::new("target"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-var tests to prevent interference between parallel test threads.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn data_dir_env_override_respected() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("PARAIMAGE_DATA_DIR", "/tmp/test-paraimage-override");
        let config = updater_config().unwrap();
        std::env::remove_var("PARAIMAGE_DATA_DIR");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/test-paraimage-override"));
        assert_eq!(
            config.updates_dir,
            PathBuf::from("/tmp/test-paraimage-override/updates")
        );
    }

    #[test]
    fn data_dir_under_platform_data_dir() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("PARAIMAGE_DATA_DIR");
        let config = updater_config().unwrap();
        let base = dirs::data_dir().unwrap();
        assert!(config.data_dir.starts_with(&base));
        assert!(config.data_dir.ends_with("ParaImage"));
    }

    #[test]
    fn updates_dir_under_data_dir() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("PARAIMAGE_DATA_DIR");
        let config = updater_config().unwrap();
        assert_eq!(config.updates_dir, config.data_dir.join("updates"));
    }

    #[test]
    fn packaged_env_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("PARAIMAGE_PACKAGED", "1");
        let packaged = updater_config().unwrap().packaged;
        std::env::set_var("PARAIMAGE_PACKAGED", "0");
        let unpackaged = updater_config().unwrap().packaged;
        std::env::remove_var("PARAIMAGE_PACKAGED");
        assert!(packaged);
        assert!(!unpackaged);
    }

    #[test]
    fn test_exe_is_not_packaged() {
        // Tests run out of the cargo target tree.
        assert!(!exe_looks_packaged());
    }

    #[test]
    fn repo_slug_and_user_agent() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("PARAIMAGE_API_BASE");
        let config = updater_config().unwrap();
        assert_eq!(config.repo_slug(), "paraimage/paraimage");
        assert!(config.repo_url().starts_with("https://github.com/"));
        assert!(config.user_agent().starts_with("ParaImage/"));
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn api_base_env_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("PARAIMAGE_API_BASE", "http://127.0.0.1:9999");
        let config = updater_config().unwrap();
        std::env::remove_var("PARAIMAGE_API_BASE");
        assert_eq!(config.api_base, "http://127.0.0.1:9999");
    }
}
