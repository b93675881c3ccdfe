use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;

use crate::error::FlowResult;

pub mod mesh_import;
pub mod param_parser;
pub mod write_to_csv;
pub mod write_to_vtu;

/// `outputs/<MMDD_HHMM_SS>`, fixed for the lifetime of the process.
pub static OUTPUT_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let secs_in_day = 24 * 60 * 60;
    // approximate: 365-day years and 30-day months, UTC
    let day_of_year = (timestamp / secs_in_day) % 365 + 1;
    let month = (day_of_year - 1) / 30 + 1;
    let day = (day_of_year - 1) % 30 + 1;
    let seconds_today = timestamp % secs_in_day;
    let stamp = format!(
        "{:02}{:02}_{:02}{:02}_{:02}",
        month,
        day,
        seconds_today / 3600,
        (seconds_today % 3600) / 60,
        seconds_today % 60
    );
    Path::new("outputs").join(stamp)
});

/// Create `dir` (or the default timestamped directory) and return it.
pub fn prepare_output_dir(dir: Option<&Path>) -> FlowResult<PathBuf> {
    let dir = dir.map_or_else(|| OUTPUT_DIR.clone(), Path::to_path_buf);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_dir_is_stamped() {
        assert!(OUTPUT_DIR.starts_with("outputs"));
        let stamp = OUTPUT_DIR
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap()
            .to_string();
        assert_eq!(stamp.len(), 12);
        assert_eq!(&stamp[4..5], "_");
        assert_eq!(&stamp[9..10], "_");
        assert!(stamp.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_explicit_output_dir_is_created() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("run").join("a");
        let dir = prepare_output_dir(Some(&target)).unwrap();
        assert_eq!(dir, target);
        assert!(dir.is_dir());
    }
}
