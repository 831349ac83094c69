//! Process-wide download progress, written by the in-flight download and
//! polled by any number of concurrent readers through one mutex.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

/// Snapshot of the current download. Serialized camelCase for the host UI.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub active: bool,
    pub done: bool,
    pub downloaded: u64,
    pub total: Option<u64>,
    /// 0–100, present only when the total size is known.
    pub percent: Option<u8>,
    pub error: Option<String>,
}

/// Shared handle to the single progress record. Cloning is cheap; all
/// clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle {
    inner: Arc<Mutex<DownloadProgress>>,
}

impl ProgressHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DownloadProgress> {
        // A writer panicking mid-update leaves no torn state worth
        // preserving; recover the guard rather than propagate the poison.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reset to a fresh active state at the start of a download.
    pub fn begin(&self, total: Option<u64>) {
        let mut state = self.lock();
        *state = DownloadProgress {
            active: true,
            done: false,
            downloaded: 0,
            total,
            percent: total.map(|_| 0),
            error: None,
        };
    }

    /// Set the expected total once the response's content-length is known.
    pub fn set_total(&self, total: Option<u64>) {
        let mut state = self.lock();
        state.total = total;
        state.percent = total.map(|t| percent_of(state.downloaded, t));
    }

    /// Record cumulative bytes after a chunk.
    pub fn record(&self, downloaded: u64) {
        let mut state = self.lock();
        state.downloaded = downloaded;
        state.percent = state.total.map(|total| percent_of(downloaded, total));
    }

    /// Finalize after a successful download.
    pub fn finish(&self) {
        let mut state = self.lock();
        state.done = true;
        if state.total.is_some() {
            state.percent = Some(100);
        }
    }

    /// Finalize after a failed download, recording the error message.
    pub fn fail(&self, message: &str) {
        let mut state = self.lock();
        state.done = true;
        state.error = Some(message.to_string());
    }

    /// Current state; safe to poll at any rate from any thread.
    pub fn snapshot(&self) -> DownloadProgress {
        self.lock().clone()
    }
}

fn percent_of(downloaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (downloaded.saturating_mul(100) / total).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_is_inactive() {
        let handle = ProgressHandle::new();
        let snap = handle.snapshot();
        assert!(!snap.active);
        assert!(!snap.done);
        assert_eq!(snap.downloaded, 0);
        assert!(snap.percent.is_none());
        assert!(snap.error.is_none());
    }

    #[test]
    fn begin_resets_previous_state() {
        let handle = ProgressHandle::new();
        handle.begin(Some(100));
        handle.record(50);
        handle.fail("boom");

        handle.begin(Some(200));
        let snap = handle.snapshot();
        assert!(snap.active);
        assert!(!snap.done);
        assert_eq!(snap.downloaded, 0);
        assert_eq!(snap.total, Some(200));
        assert_eq!(snap.percent, Some(0));
        assert!(snap.error.is_none());
    }

    #[test]
    fn record_tracks_percent_when_total_known() {
        let handle = ProgressHandle::new();
        handle.begin(Some(1000));
        handle.record(250);
        assert_eq!(handle.snapshot().percent, Some(25));
        handle.record(1000);
        assert_eq!(handle.snapshot().percent, Some(100));
    }

    #[test]
    fn record_without_total_has_no_percent() {
        let handle = ProgressHandle::new();
        handle.begin(None);
        handle.record(4096);
        let snap = handle.snapshot();
        assert_eq!(snap.downloaded, 4096);
        assert!(snap.percent.is_none());
    }

    #[test]
    fn finish_pins_percent_to_100() {
        let handle = ProgressHandle::new();
        handle.begin(Some(10));
        handle.record(10);
        handle.finish();
        let snap = handle.snapshot();
        assert!(snap.done);
        assert_eq!(snap.percent, Some(100));
        assert!(snap.error.is_none());
    }

    #[test]
    fn fail_is_done_with_error() {
        let handle = ProgressHandle::new();
        handle.begin(Some(10));
        handle.fail("connection reset");
        let snap = handle.snapshot();
        assert!(snap.done);
        assert_eq!(snap.error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn clones_share_state() {
        let handle = ProgressHandle::new();
        let reader = handle.clone();
        handle.begin(Some(8));
        handle.record(4);
        assert_eq!(reader.snapshot().downloaded, 4);
    }

    #[test]
    fn percent_never_exceeds_100() {
        // Server lied about content-length; downloaded overshoots.
        assert_eq!(percent_of(150, 100), 100);
        assert_eq!(percent_of(0, 0), 100);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let handle = ProgressHandle::new();
        handle.begin(Some(10));
        let json = serde_json::to_string(&handle.snapshot()).unwrap();
        assert!(json.contains("\"downloaded\""));
        assert!(json.contains("\"percent\""));
        assert!(json.contains("\"active\":true"));
    }
}
