use crate::config::CaptureConfig;
use crate::error::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, info, warn};

/// Distinct from the library's `video_` assets so cleanup never matches them
pub const SCRATCH_PREFIX: &str = "scratch_video_";

pub(crate) fn resolve_timestamp_timezone(tz_name: &str) -> Tz {
    match tz_name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!(
                "Invalid timestamp timezone '{}', falling back to UTC",
                tz_name
            );
            chrono_tz::UTC
        }
    }
}

/// `YYYYMMDD_HHMMSS_mmm` in `timezone`, used in every file name we create
pub(crate) fn file_timestamp(timezone: Tz, at: SystemTime) -> String {
    DateTime::<Utc>::from(at)
        .with_timezone(&timezone)
        .format("%Y%m%d_%H%M%S_%3f")
        .to_string()
}

/// Scratch path for a recording started at `started_at`, e.g.
/// `<scratch>/scratch_video_20240101_120000_000.mov`. A numeric suffix is
/// appended if the name is already taken.
pub async fn recording_path(
    config: &CaptureConfig,
    timezone: Tz,
    started_at: SystemTime,
) -> PathBuf {
    let stamp = file_timestamp(timezone, started_at);

    let dir = config.scratch_path();
    let mut candidate = dir.join(format!("{}{}.{}", SCRATCH_PREFIX, stamp, config.video_extension));
    let mut suffix = 1;
    while fs::try_exists(&candidate).await.unwrap_or(false) {
        candidate = dir.join(format!(
            "{}{}_{}.{}",
            SCRATCH_PREFIX, stamp, suffix, config.video_extension
        ));
        suffix += 1;
    }
    candidate
}

/// Remove recordings left in the scratch directory by an earlier run
pub async fn clean_scratch_dir(config: &CaptureConfig) -> Result<usize> {
    let dir = config.scratch_path();
    if !fs::try_exists(&dir).await? {
        return Ok(0);
    }

    let suffix = format!(".{}", config.video_extension);
    let mut removed = 0;
    let mut entries = fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(SCRATCH_PREFIX) || !name.ends_with(&suffix) {
            continue;
        }
        match fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove stale scratch file {}: {}", name, e),
        }
    }

    if removed > 0 {
        info!(
            "Removed {} stale scratch recording(s) from {}",
            removed,
            dir.display()
        );
    }
    Ok(removed)
}

/// Delete a scratch recording, treating an already-missing file as success
pub async fn remove_scratch_file(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed scratch file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove scratch file {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SnapcamConfig;
    use std::time::{Duration, UNIX_EPOCH};

    fn capture_config(dir: &Path) -> CaptureConfig {
        let mut config = SnapcamConfig::default().capture;
        config.scratch_dir = dir.to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn test_recording_path_is_timestamp_qualified() {
        let dir = tempfile::tempdir().unwrap();
        let config = capture_config(dir.path());
        let started_at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);

        let path = recording_path(&config, chrono_tz::UTC, started_at).await;

        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "scratch_video_20231114_221320_123.mov"
        );
    }

    #[tokio::test]
    async fn test_recording_path_uses_given_timezone() {
        let dir = tempfile::tempdir().unwrap();
        let config = capture_config(dir.path());
        let started_at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);

        let path = recording_path(&config, chrono_tz::Europe::Berlin, started_at).await;

        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "scratch_video_20231114_231320_123.mov"
        );
    }

    #[tokio::test]
    async fn test_recording_path_avoids_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = capture_config(dir.path());
        let started_at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        let first = recording_path(&config, chrono_tz::UTC, started_at).await;
        fs::write(&first, b"taken").await.unwrap();
        let second = recording_path(&config, chrono_tz::UTC, started_at).await;

        assert_ne!(first, second);
        assert!(second
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_1.mov"));
    }

    #[tokio::test]
    async fn test_clean_scratch_dir_only_removes_recordings() {
        let dir = tempfile::tempdir().unwrap();
        let config = capture_config(dir.path());
        fs::write(dir.path().join("scratch_video_1.mov"), b"a").await.unwrap();
        fs::write(dir.path().join("scratch_video_2.mov"), b"b").await.unwrap();
        fs::write(dir.path().join("notes.txt"), b"keep").await.unwrap();
        // Library assets share the extension but not the prefix
        fs::write(dir.path().join("video_20240101_120000_000.mov"), b"saved")
            .await
            .unwrap();

        let removed = clean_scratch_dir(&config).await.unwrap();

        assert_eq!(removed, 2);
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("video_20240101_120000_000.mov").exists());
    }

    #[tokio::test]
    async fn test_clean_missing_scratch_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let config = capture_config(&dir.path().join("absent"));
        assert_eq!(clean_scratch_dir(&config).await.unwrap(), 0);
    }

    #[test]
    fn test_invalid_timezone_falls_back_to_utc() {
        assert_eq!(resolve_timestamp_timezone("Mars/Olympus"), chrono_tz::UTC);
        assert_eq!(
            resolve_timestamp_timezone("Europe/Berlin"),
            chrono_tz::Europe::Berlin
        );
    }
}
