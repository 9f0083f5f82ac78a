use anyhow::{Context, Result};
use filetime::FileTime;
use std::{fs, path::{Path, PathBuf}};
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};

const STAMP_FORMAT: &[FormatItem<'_>] =
    format_description!("[year][month][day]_[hour][minute][second]");

/// Copy `target` into the backup directory before it gets overwritten.
///
/// Backups are append-only: nothing here ever reads or deletes one, and a
/// same-second rerun gets a counter suffix instead of clobbering the earlier
/// copy. Returns `Ok(None)` when there is nothing at `target` to save.
pub fn backup_file(backup_dir: &Path, target: &Path) -> Result<Option<PathBuf>> {
    let metadata = match fs::metadata(target) {
        Ok(metadata) => metadata,
        Err(_) => return Ok(None),
    };

    fs::create_dir_all(backup_dir).context("create backups dir")?;

    let name = target
        .file_name()
        .context("backup target has no file name")?
        .to_string_lossy()
        .to_string();
    let stamp = OffsetDateTime::now_utc()
        .format(STAMP_FORMAT)
        .context("format backup timestamp")?;

    let mut backup_path = backup_dir.join(format!("{name}.{stamp}.backup"));
    let mut counter = 1u32;
    while backup_path.exists() {
        backup_path = backup_dir.join(format!("{name}.{stamp}-{counter}.backup"));
        counter += 1;
    }

    fs::copy(target, &backup_path).with_context(|| format!("back up {}", target.display()))?;
    let mtime = FileTime::from_last_modification_time(&metadata);
    let _ = filetime::set_file_mtime(&backup_path, mtime);

    println!("  Backed up existing {name} to {}", backup_path.display());
    Ok(Some(backup_path))
}
