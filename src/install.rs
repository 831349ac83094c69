//! Install orchestration: validate a downloaded asset, generate a detached
//! platform script that waits for this process to exit, swaps the installed
//! files (or runs a native installer), and relaunches the application.
//!
//! `install()` returning `Ok` means the updater was *armed*, not that the
//! update completed: the script takes over after this process exits, and
//! there is no result channel back from it.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;

use crate::config::UpdaterConfig;
use crate::platform::{self, AssetKind, Platform};

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("update install only supported in packaged app")]
    NotPackaged,
    #[error("updates directory unavailable: {0}")]
    UpdatesDir(std::io::Error),
    #[error("update archive not found")]
    NotFound,
    #[error("update asset outside updates directory")]
    OutsideUpdatesDir,
    #[error("unsupported update asset")]
    UnsupportedAsset,
    #[error("update archive is corrupt: {0}")]
    CorruptArchive(String),
    #[error("install target not writable; use installer instead")]
    TargetNotWritable,
    #[error("unable to resolve install path: {0}")]
    ResolveInstallPath(String),
    #[error("failed to write update script: {0}")]
    ScriptWrite(std::io::Error),
    #[error("failed to launch update script: {0}")]
    ScriptLaunch(std::io::Error),
}

/// Everything needed to arm the update: the script to write and the
/// detached command that runs it.
#[derive(Debug)]
pub struct InstallPlan {
    pub script_path: PathBuf,
    pub script_body: &'static str,
    pub program: &'static str,
    pub args: Vec<OsString>,
}

/// Validate `asset_path` and hand the update over to a detached script.
pub fn install(config: &UpdaterConfig, asset_path: &Path) -> Result<(), InstallError> {
    let plan = plan_install(config, asset_path, std::process::id())?;
    write_script(&plan.script_path, plan.script_body)?;
    spawn_detached(&plan)?;
    Ok(())
}

/// Build the install plan without touching the filesystem beyond path
/// resolution and read-only archive inspection. Separated from `install`
/// so the precondition chain and the generated command are testable
/// without launching a process waiter.
pub fn plan_install(
    config: &UpdaterConfig,
    asset_path: &Path,
    pid: u32,
) -> Result<InstallPlan, InstallError> {
    if !config.packaged {
        return Err(InstallError::NotPackaged);
    }

    let archive = normalize_update_path(config, asset_path)?;
    let filename = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let current = Platform::current();
    match platform::asset_kind(&filename, current) {
        AssetKind::Installer if current == Platform::Windows => {
            plan_installer(config, &archive, pid)
        }
        AssetKind::Archive => {
            validate_archive_structure(&archive)?;
            plan_archive(config, &archive, pid)
        }
        _ => Err(InstallError::UnsupportedAsset),
    }
}

fn plan_archive(
    config: &UpdaterConfig,
    archive: &Path,
    pid: u32,
) -> Result<InstallPlan, InstallError> {
    let (target_dir, launch_path) = resolve_install_paths()?;
    if cfg!(windows) && !dir_is_writable(&target_dir) {
        return Err(InstallError::TargetNotWritable);
    }

    let staging_dir = config.updates_dir.join(format!("staging-{pid}"));

    if cfg!(windows) {
        let script_path = config.updates_dir.join(format!("apply-update-{pid}.ps1"));
        let mut args = powershell_args(&script_path);
        args.push(pid.to_string().into());
        args.push(archive.into());
        args.push(target_dir.into_os_string());
        args.push(launch_path.into_os_string());
        args.push(staging_dir.into_os_string());
        Ok(InstallPlan {
            script_path,
            script_body: WINDOWS_UPDATE_SCRIPT,
            program: "powershell",
            args,
        })
    } else {
        let script_path = config.updates_dir.join(format!("apply-update-{pid}.sh"));
        let args = vec![
            script_path.clone().into_os_string(),
            pid.to_string().into(),
            archive.into(),
            target_dir.into_os_string(),
            launch_path.into_os_string(),
            staging_dir.into_os_string(),
        ];
        Ok(InstallPlan {
            script_path,
            script_body: UNIX_UPDATE_SCRIPT,
            program: "/bin/sh",
            args,
        })
    }
}

fn plan_installer(
    config: &UpdaterConfig,
    installer: &Path,
    pid: u32,
) -> Result<InstallPlan, InstallError> {
    let (_, launch_path) = resolve_install_paths()?;
    let script_path = config.updates_dir.join(format!("run-installer-{pid}.ps1"));
    let mut args = powershell_args(&script_path);
    args.push(pid.to_string().into());
    args.push(installer.into());
    args.push(launch_path.into_os_string());
    Ok(InstallPlan {
        script_path,
        script_body: WINDOWS_INSTALLER_SCRIPT,
        program: "powershell",
        args,
    })
}

fn powershell_args(script_path: &Path) -> Vec<OsString> {
    vec![
        "-NoProfile".into(),
        "-ExecutionPolicy".into(),
        "Bypass".into(),
        "-File".into(),
        script_path.into(),
    ]
}

/// Resolve the asset path and require it to land strictly inside the
/// updates directory. Canonicalization follows symlinks and collapses
/// relative segments, so both `../` traversal and symlink redirection are
/// caught here.
fn normalize_update_path(
    config: &UpdaterConfig,
    asset_path: &Path,
) -> Result<PathBuf, InstallError> {
    std::fs::create_dir_all(&config.updates_dir).map_err(InstallError::UpdatesDir)?;
    let updates_root = config
        .updates_dir
        .canonicalize()
        .map_err(InstallError::UpdatesDir)?;

    let resolved = asset_path
        .canonicalize()
        .map_err(|_| InstallError::NotFound)?;
    if !resolved.starts_with(&updates_root) || resolved == updates_root {
        return Err(InstallError::OutsideUpdatesDir);
    }
    if !resolved.is_file() {
        return Err(InstallError::NotFound);
    }
    Ok(resolved)
}

/// Read-only structural check before the target directory is destroyed:
/// tar archives must yield at least one entry, zips must start with the
/// local-file-header magic. Failures inside the detached script are not
/// observable, so a corrupt download has to be caught here.
fn validate_archive_structure(archive: &Path) -> Result<(), InstallError> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let corrupt = |msg: String| InstallError::CorruptArchive(msg);

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let file = std::fs::File::open(archive).map_err(|e| corrupt(e.to_string()))?;
        first_tar_entry(flate2::read::GzDecoder::new(file))
    } else if name.ends_with(".tar") {
        let file = std::fs::File::open(archive).map_err(|e| corrupt(e.to_string()))?;
        first_tar_entry(file)
    } else if name.ends_with(".zip") {
        let mut file = std::fs::File::open(archive).map_err(|e| corrupt(e.to_string()))?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)
            .map_err(|e| corrupt(e.to_string()))?;
        if magic != [0x50, 0x4b, 0x03, 0x04] {
            return Err(corrupt("not a zip archive".to_string()));
        }
        Ok(())
    } else {
        Ok(())
    }
}

fn first_tar_entry<R: Read>(reader: R) -> Result<(), InstallError> {
    let mut tar = tar::Archive::new(reader);
    let mut entries = tar
        .entries()
        .map_err(|e| InstallError::CorruptArchive(e.to_string()))?;
    match entries.next() {
        Some(Ok(_)) => Ok(()),
        Some(Err(e)) => Err(InstallError::CorruptArchive(e.to_string())),
        None => Err(InstallError::CorruptArchive("empty archive".to_string())),
    }
}

/// The directory that gets replaced and the path the script relaunches.
/// On macOS an enclosing `.app` bundle is both; elsewhere the executable's
/// parent directory is the target and the executable itself is relaunched.
fn resolve_install_paths() -> Result<(PathBuf, PathBuf), InstallError> {
    let exe = std::env::current_exe()
        .map_err(|e| InstallError::ResolveInstallPath(e.to_string()))?;
    let exe = exe.canonicalize().unwrap_or(exe);

    if cfg!(target_os = "macos") {
        if let Some(bundle) = resolve_app_bundle(&exe) {
            return Ok((bundle.to_path_buf(), bundle.to_path_buf()));
        }
    }

    let dir = exe
        .parent()
        .ok_or_else(|| {
            InstallError::ResolveInstallPath("executable has no parent directory".to_string())
        })?
        .to_path_buf();
    let launch = exe.clone();
    Ok((dir, launch))
}

/// The enclosing `.app` bundle of an executable path, if any.
fn resolve_app_bundle(exe: &Path) -> Option<&Path> {
    exe.ancestors()
        .find(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("app")))
}

/// True if the current user can create files in `dir`.
pub(crate) fn dir_is_writable(dir: &Path) -> bool {
    let probe = dir.join(format!(".write-probe-{}", std::process::id()));
    match std::fs::write(&probe, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

/// Whether the resolved install target is writable; drives the Windows
/// archive-vs-installer `installable` flag during the update check.
pub fn install_target_writable() -> bool {
    match resolve_install_paths() {
        Ok((target, _)) => dir_is_writable(&target),
        Err(_) => false,
    }
}

fn write_script(path: &Path, body: &str) -> Result<(), InstallError> {
    std::fs::write(path, body).map_err(InstallError::ScriptWrite)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .map_err(InstallError::ScriptWrite)?;
    }
    Ok(())
}

/// Launch the script as a new process group with null stdio so it outlives
/// this process. The child is never waited on.
fn spawn_detached(plan: &InstallPlan) -> Result<(), InstallError> {
    let mut cmd = std::process::Command::new(plan.program);
    cmd.args(&plan.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP | DETACHED_PROCESS | CREATE_NO_WINDOW);
    }

    cmd.spawn().map_err(InstallError::ScriptLaunch)?;
    Ok(())
}

// Wait loops poll every 400 ms; after 20 s the still-running process is
// force-terminated instead of waiting indefinitely.

const UNIX_UPDATE_SCRIPT: &str = r#"#!/bin/sh
set -eu
pid="$1"
archive="$2"
target="$3"
launch="$4"
staging="$5"

waited=0
while kill -0 "$pid" 2>/dev/null; do
  if [ "$waited" -ge 50 ]; then
    kill -9 "$pid" 2>/dev/null || true
    sleep 1
    break
  fi
  sleep 0.4
  waited=$((waited + 1))
done

rm -rf "$staging"
mkdir -p "$staging"

case "$archive" in
  *.tar.gz|*.tgz) tar -xzf "$archive" -C "$staging" ;;
  *.tar) tar -xf "$archive" -C "$staging" ;;
  *.zip)
    if command -v ditto >/dev/null 2>&1; then
      ditto -x -k "$archive" "$staging"
    else
      unzip -q "$archive" -d "$staging"
    fi
    ;;
  *) echo "unsupported archive" >&2; exit 1 ;;
esac

source="$staging"
if [ "$(ls -1 "$staging" | wc -l | tr -d ' ')" -eq 1 ]; then
  first="$(ls -1 "$staging" | head -n 1)"
  if [ -d "$staging/$first" ]; then
    source="$staging/$first"
  fi
fi

rm -rf "$target"
mv "$source" "$target"

case "$launch" in
  *.app) open "$launch" ;;
  *) "$launch" >/dev/null 2>&1 & ;;
esac
"#;

const WINDOWS_UPDATE_SCRIPT: &str = r#"param(
  [int]$ProcessId,
  [string]$ArchivePath,
  [string]$TargetDir,
  [string]$LaunchPath,
  [string]$StagingDir
)
$ErrorActionPreference = "Stop"
$waited = 0
while (Get-Process -Id $ProcessId -ErrorAction SilentlyContinue) {
  if ($waited -ge 20000) {
    Stop-Process -Id $ProcessId -Force -ErrorAction SilentlyContinue
    Start-Sleep -Milliseconds 1000
    break
  }
  Start-Sleep -Milliseconds 400
  $waited += 400
}
if (Test-Path $StagingDir) { Remove-Item -Recurse -Force $StagingDir }
New-Item -ItemType Directory -Path $StagingDir | Out-Null
Expand-Archive -Path $ArchivePath -DestinationPath $StagingDir -Force
$items = Get-ChildItem -Path $StagingDir
if ($items.Count -eq 1 -and $items[0].PSIsContainer) {
  $source = $items[0].FullName
} else {
  $source = $StagingDir
}
if (Test-Path $TargetDir) { Remove-Item -Recurse -Force $TargetDir }
Move-Item -Path $source -Destination $TargetDir
Start-Process -FilePath $LaunchPath
"#;

const WINDOWS_INSTALLER_SCRIPT: &str = r#"param(
  [int]$ProcessId,
  [string]$InstallerPath,
  [string]$LaunchPath
)
$ErrorActionPreference = "Stop"
$waited = 0
while (Get-Process -Id $ProcessId -ErrorAction SilentlyContinue) {
  if ($waited -ge 20000) {
    Stop-Process -Id $ProcessId -Force -ErrorAction SilentlyContinue
    Start-Sleep -Milliseconds 1000
    break
  }
  Start-Sleep -Milliseconds 400
  $waited += 400
}
if ($InstallerPath.ToLower().EndsWith(".msi")) {
  Start-Process -FilePath "msiexec" -ArgumentList "/i", "`"$InstallerPath`"" -Wait
} else {
  Start-Process -FilePath $InstallerPath -Wait
}
if (Test-Path $LaunchPath) {
  Start-Process -FilePath $LaunchPath
}
"#;
