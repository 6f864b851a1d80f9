//! Log file location and timestamp helpers.
use std::fs;
use std::path::PathBuf;

use crate::config::modules::home_dir;

/// Log file for `command` under `$XDG_CACHE_HOME/dull/` (or `~/.cache/dull/`),
/// creating the directory if needed.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    let dir = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|home| home.join(".cache")))
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("dull");
    fs::create_dir_all(&dir).ok()?;
    Some(dir.join(format!("{command}.log")))
}

/// Format the current UTC time as `YYYY-MM-DD HH:MM:SS`.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format the current UTC time as `HH:MM:SS`.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
#[allow(unsafe_code)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::TEST_ENV_MUTEX;

    #[test]
    fn format_utc_time_has_correct_format() {
        let s = format_utc_time();
        assert_eq!(s.len(), 8, "HH:MM:SS should be 8 chars");
        assert_eq!(&s[2..3], ":", "colon at position 2");
        assert_eq!(&s[5..6], ":", "colon at position 5");
    }

    #[test]
    #[allow(unsafe_code)]
    fn log_file_path_uses_xdg_cache_home() {
        let tmp = tempfile::tempdir().unwrap();
        let _lock = TEST_ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        unsafe {
            std::env::set_var("XDG_CACHE_HOME", tmp.path());
        }
        let path = log_file_path("deploy");
        unsafe {
            std::env::remove_var("XDG_CACHE_HOME");
        }
        assert_eq!(path, Some(tmp.path().join("dull").join("deploy.log")));
        assert!(tmp.path().join("dull").is_dir());
    }

    #[test]
    fn format_utc_datetime_has_correct_format() {
        let s = format_utc_datetime();
        assert_eq!(s.len(), 19, "YYYY-MM-DD HH:MM:SS should be 19 chars");
        assert_eq!(&s[4..5], "-", "dash at position 4");
        assert_eq!(&s[7..8], "-", "dash at position 7");
        assert_eq!(&s[10..11], " ", "space at position 10");
    }
}
