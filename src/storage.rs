//! Output file naming and cleanup
//!
//! Recordings are named `<prefix><yyyyMMdd_HHmmss_SSS>.<ext>` inside a fixed
//! directory. The millisecond stamp is forced to increase across calls in
//! this process, so two paths built back to back never collide.

use crate::errors::CameraError;
use chrono::{DateTime, Local, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_STAMP_MS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Claim a millisecond stamp strictly greater than any handed out before
fn next_stamp_ms(now_ms: i64) -> i64 {
    let mut last = LAST_STAMP_MS.load(Ordering::Relaxed);
    loop {
        let next = now_ms.max(last.saturating_add(1));
        match LAST_STAMP_MS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Format a timestamp the way recordings are named
pub fn format_stamp<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// Build a fresh output path, creating `dir` if needed
pub fn output_file_path(dir: &Path, prefix: &str, extension: &str) -> Result<PathBuf, CameraError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            CameraError::IoError(format!("Failed to create directory {}: {}", dir.display(), e))
        })?;
        log::debug!("Created output directory {}", dir.display());
    }
    if !dir.is_dir() {
        return Err(CameraError::IoError(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let stamp_ms = next_stamp_ms(Local::now().timestamp_millis());
    let time = Local
        .timestamp_millis_opt(stamp_ms)
        .single()
        .ok_or_else(|| CameraError::IoError(format!("Invalid timestamp: {}", stamp_ms)))?;

    Ok(dir.join(format!("{}{}.{}", prefix, format_stamp(&time), extension)))
}

/// A recording's destination; owned by the controller until the clip completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    path: PathBuf,
}

impl OutputFile {
    pub fn create(dir: &Path, prefix: &str, extension: &str) -> Result<Self, CameraError> {
        Ok(Self {
            path: output_file_path(dir, prefix, extension)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove a partially written recording. Missing files are not an error.
    pub fn discard(self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::info!("Deleted partial recording {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to delete {}: {}", self.path.display(), e),
        }
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_paths_in_quick_succession_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let paths: HashSet<PathBuf> = (0..50)
            .map(|_| output_file_path(dir.path(), "VID_", "mp4").unwrap())
            .collect();
        assert_eq!(paths.len(), 50);
    }

    #[test]
    fn test_path_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_file_path(dir.path(), "VID_", "mp4").unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("VID_"));
        assert!(name.ends_with(".mp4"));
        // VID_ + yyyyMMdd_HHmmss_SSS + .mp4
        assert_eq!(name.len(), 4 + 19 + 4);
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let path = output_file_path(&nested, "VID_", "mp4").unwrap();
        assert!(nested.is_dir());
        assert!(path.starts_with(&nested));
    }

    #[test]
    fn test_file_in_place_of_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();
        assert!(output_file_path(&blocker, "VID_", "mp4").is_err());
    }

    #[test]
    fn test_discard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputFile::create(dir.path(), "VID_", "mp4").unwrap();
        fs::write(output.path(), b"partial").unwrap();
        let path = output.path().to_path_buf();
        output.discard();
        assert!(!path.exists());
    }

    #[test]
    fn test_stamp_is_monotonic() {
        let a = next_stamp_ms(1_000);
        let b = next_stamp_ms(1_000);
        assert!(b > a);
    }
}
