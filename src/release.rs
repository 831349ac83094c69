//! Release resolution: query the GitHub releases API for the latest
//! published release and pick the asset that fits the running platform.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::UpdaterConfig;
use crate::install;
use crate::platform::{self, AssetKind, Platform};
use crate::version;

const CHECK_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("release check failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("release check failed: HTTP {0}")]
    Status(u16),
    #[error("missing release tag")]
    MissingTag,
}

/// `releases/latest` payload, as returned by the GitHub API.
#[derive(Debug, Deserialize)]
pub struct GitHubRelease {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAsset {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub browser_download_url: String,
}

/// The chosen asset, as handed to the host UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSummary {
    pub name: String,
    pub size: u64,
    pub url: String,
    /// Whether `install()` can apply this asset on this machine.
    pub installable: bool,
}

/// Result of an update check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    pub repo_url: String,
    pub current_version: String,
    pub latest_version: String,
    pub update_available: bool,
    pub release_url: Option<String>,
    pub published_at: Option<String>,
    pub notes: String,
    pub asset: Option<AssetSummary>,
}

/// Query `releases/latest` for the configured repository and evaluate it
/// against the running version and platform. Network, timeout, and
/// malformed-JSON failures all surface as an `Err`; nothing is retried.
pub fn check_for_updates(config: &UpdaterConfig) -> Result<UpdateSummary, ReleaseError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(config.user_agent())
        .timeout(CHECK_TIMEOUT)
        .build()?;

    let url = format!(
        "{}/repos/{}/releases/latest",
        config.api_base,
        config.repo_slug()
    );
    let response = client
        .get(&url)
        .header("Accept", "application/vnd.github+json")
        .send()?;

    if !response.status().is_success() {
        return Err(ReleaseError::Status(response.status().as_u16()));
    }

    let release: GitHubRelease = response.json()?;

    let current = Platform::current();
    let target_writable = match current {
        Platform::Windows => install::install_target_writable(),
        _ => true,
    };
    evaluate_release(release, config, current, target_writable)
}

/// Pure half of the update check: no network, no filesystem.
pub fn evaluate_release(
    release: GitHubRelease,
    config: &UpdaterConfig,
    platform: Platform,
    target_writable: bool,
) -> Result<UpdateSummary, ReleaseError> {
    let tag = release.tag_name.trim();
    if tag.is_empty() {
        return Err(ReleaseError::MissingTag);
    }
    let latest_version = tag.trim_start_matches(['v', 'V']).to_string();

    // When the Windows install dir needs elevation, steer selection toward
    // the installer instead of a bare-file copy that would fail.
    let prefer_installer = platform == Platform::Windows && !target_writable;
    let asset = select_asset(&release.assets, platform, prefer_installer).map(|a| {
        let kind = platform::asset_kind(&a.name, platform);
        AssetSummary {
            name: a.name.clone(),
            size: a.size,
            url: a.browser_download_url.clone(),
            installable: asset_installable(kind, platform, target_writable),
        }
    });

    Ok(UpdateSummary {
        repo_url: config.repo_url(),
        current_version: config.product_version.clone(),
        latest_version: latest_version.clone(),
        update_available: version::is_newer(&latest_version, &config.product_version),
        release_url: release.html_url,
        published_at: release.published_at,
        notes: release.body.unwrap_or_default(),
        asset,
    })
}

/// Pick one asset for `platform`. Candidates are assets that token-match
/// the platform; failing that, assets with no platform marker at all
/// (generic builds); failing that, none. Within the pool the preference is
/// requested-installer, then archive, then installer, then first.
pub fn select_asset(
    assets: &[GitHubAsset],
    platform: Platform,
    prefer_installer: bool,
) -> Option<&GitHubAsset> {
    let mut pool: Vec<&GitHubAsset> = assets
        .iter()
        .filter(|a| platform::name_matches_platform(&a.name, platform))
        .collect();
    if pool.is_empty() {
        pool = assets
            .iter()
            .filter(|a| platform::name_is_generic(&a.name))
            .collect();
    }
    if pool.is_empty() {
        return None;
    }

    let by_kind = |kind: AssetKind| {
        pool.iter()
            .find(|a| platform::asset_kind(&a.name, platform) == kind)
            .copied()
    };

    if prefer_installer {
        if let Some(asset) = by_kind(AssetKind::Installer) {
            return Some(asset);
        }
    }
    by_kind(AssetKind::Archive)
        .or_else(|| by_kind(AssetKind::Installer))
        .or_else(|| pool.first().copied())
}

/// Whether `install()` could apply an asset of this kind here. Archives are
/// installable unless the Windows install dir is not writable; native
/// installers only exist as an install path on Windows.
fn asset_installable(kind: AssetKind, platform: Platform, target_writable: bool) -> bool {
    match kind {
        AssetKind::Archive => !(platform == Platform::Windows && !target_writable),
        AssetKind::Installer => platform == Platform::Windows,
        AssetKind::Unknown => false,
    }
}
