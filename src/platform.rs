//! Platform detection and the pure string heuristics used to match release
//! assets to a platform. Everything here takes the platform as a parameter
//! so the matching rules stay unit-testable on any host.

/// The platforms ParaImage ships release assets for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Macos,
    Linux,
}

impl Platform {
    /// The platform this process is running on.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::Macos
        } else {
            Self::Linux
        }
    }
}

/// How an asset would be applied if selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// A file tree to extract and swap into the install directory.
    Archive,
    /// A platform-native setup executable run out-of-process.
    Installer,
    Unknown,
}

const WINDOWS_ARCHIVE_SUFFIXES: &[&str] = &[".zip"];
const WINDOWS_INSTALLER_SUFFIXES: &[&str] = &[".exe", ".msi"];
const MACOS_ARCHIVE_SUFFIXES: &[&str] = &[".zip"];
const MACOS_INSTALLER_SUFFIXES: &[&str] = &[".dmg", ".pkg"];
const LINUX_ARCHIVE_SUFFIXES: &[&str] = &[".tar.gz", ".tgz", ".tar"];
const LINUX_INSTALLER_SUFFIXES: &[&str] = &[".appimage"];

/// Name tokens that mark an asset as Linux without a "linux" prefix.
const LINUX_DISTRO_TOKENS: &[&str] = &["ubuntu", "debian", "fedora", "centos", "appimage"];

fn suffix_table(platform: Platform) -> (&'static [&'static str], &'static [&'static str]) {
    match platform {
        Platform::Windows => (WINDOWS_ARCHIVE_SUFFIXES, WINDOWS_INSTALLER_SUFFIXES),
        Platform::Macos => (MACOS_ARCHIVE_SUFFIXES, MACOS_INSTALLER_SUFFIXES),
        Platform::Linux => (LINUX_ARCHIVE_SUFFIXES, LINUX_INSTALLER_SUFFIXES),
    }
}

/// Classify an asset filename by its suffix for the given platform.
pub fn asset_kind(name: &str, platform: Platform) -> AssetKind {
    let lowered = name.to_lowercase();
    let (archives, installers) = suffix_table(platform);
    if archives.iter().any(|s| lowered.ends_with(s)) {
        AssetKind::Archive
    } else if installers.iter().any(|s| lowered.ends_with(s)) {
        AssetKind::Installer
    } else {
        AssetKind::Unknown
    }
}

/// Split a filename into lowercase alphanumeric tokens.
pub fn tokenize(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// The set of platforms an asset filename token-matches. Empty means the
/// asset carries no recognized platform marker (generic / cross-platform).
pub fn platforms_for_name(name: &str) -> Vec<Platform> {
    let tokens = tokenize(name);
    let mut platforms = Vec::new();
    if tokens.iter().any(|t| t == "windows" || t.starts_with("win")) {
        platforms.push(Platform::Windows);
    }
    if tokens
        .iter()
        .any(|t| t == "macos" || t == "osx" || t == "darwin" || t.starts_with("mac"))
    {
        platforms.push(Platform::Macos);
    }
    if tokens
        .iter()
        .any(|t| t.starts_with("linux") || LINUX_DISTRO_TOKENS.contains(&t.as_str()))
    {
        platforms.push(Platform::Linux);
    }
    platforms
}

/// True if the filename token-matches `platform`.
pub fn name_matches_platform(name: &str, platform: Platform) -> bool {
    platforms_for_name(name).contains(&platform)
}

/// True if the filename carries no recognized platform marker at all.
pub fn name_is_generic(name: &str) -> bool {
    platforms_for_name(name).is_empty()
}
