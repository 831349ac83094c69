//! Progress-tracked asset download into the updates directory.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::config::UpdaterConfig;
use crate::progress::ProgressHandle;

/// Streaming chunk size. Progress is published after every chunk.
const CHUNK_SIZE: usize = 1024 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid asset url")]
    InvalidUrl,
    #[error("asset url not from release")]
    NotReleaseAsset,
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("download failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Download a release asset into the updates directory, publishing progress
/// through `progress`. The URL must be HTTPS and point at a release
/// download of the configured repository; anything else is rejected before
/// any network access. A failed transfer leaves the partial file in place —
/// a retry simply overwrites it.
pub fn download_asset(
    config: &UpdaterConfig,
    progress: &ProgressHandle,
    url: &str,
) -> Result<PathBuf, DownloadError> {
    let filename = validate_asset_url(config, url)?;

    std::fs::create_dir_all(&config.updates_dir)?;
    let dest = config.updates_dir.join(filename);

    progress.begin(None);

    let outcome = fetch_to_file(config, progress, url, &dest);
    match outcome {
        Ok(()) => {
            progress.finish();
            Ok(dest)
        }
        Err(err) => {
            progress.fail(&err.to_string());
            Err(err)
        }
    }
}

fn fetch_to_file(
    config: &UpdaterConfig,
    progress: &ProgressHandle,
    url: &str,
    dest: &Path,
) -> Result<(), DownloadError> {
    // No whole-request timeout: large assets on slow links take minutes.
    let client = reqwest::blocking::Client::builder()
        .user_agent(config.user_agent())
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(None)
        .build()?;

    let mut response = client.get(url).send()?.error_for_status()?;
    progress.set_total(response.content_length());

    stream_to_file(&mut response, dest, progress)?;
    Ok(())
}

/// Copy `reader` into `dest` in fixed-size chunks, updating `progress`
/// with cumulative bytes after each chunk.
fn stream_to_file<R: Read>(
    reader: &mut R,
    dest: &Path,
    progress: &ProgressHandle,
) -> std::io::Result<u64> {
    let mut file = std::fs::File::create(dest)?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut downloaded: u64 = 0;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        downloaded += n as u64;
        progress.record(downloaded);
    }
    Ok(downloaded)
}

/// Check the URL against the release-download contract and return the
/// destination filename (the final path segment).
fn validate_asset_url(config: &UpdaterConfig, url: &str) -> Result<String, DownloadError> {
    if !url.starts_with("https://") {
        return Err(DownloadError::InvalidUrl);
    }
    let marker = format!("/{}/releases/download/", config.repo_slug());
    if !url.contains(&marker) {
        return Err(DownloadError::NotReleaseAsset);
    }

    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let filename = path.rsplit('/').next().unwrap_or_default();
    if filename.is_empty() || filename == "." || filename == ".." || filename.contains('\\') {
        return Err(DownloadError::InvalidUrl);
    }
    Ok(filename.to_string())
}
