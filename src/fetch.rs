use anyhow::{Context, Result};
use filetime::{set_file_mtime, FileTime};
use std::{fs, io, path::Path, time::Duration};
use time::{Date, Month, PrimitiveDateTime, Time as TimeOfDay};

const USER_AGENT: &str = "ffxiv-linux-reshade";

/// Stream a URL to a local file. Connect timeout only: shader archives can be
/// large and a stalled mirror hanging the run is a documented limitation.
pub fn download(url: &str, dest: &Path) -> Result<()> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(10))
        .build();
    let response = agent
        .get(url)
        .set("User-Agent", USER_AGENT)
        .call()
        .with_context(|| format!("fetch {url}"))?;
    let mut reader = response.into_reader();
    let mut file = fs::File::create(dest)
        .with_context(|| format!("create {}", dest.display()))?;
    io::copy(&mut reader, &mut file).context("write downloaded file")?;
    Ok(())
}

pub fn extract_zip(path: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(path).context("open zip")?;
    let mut archive = zip::ZipArchive::new(file).context("read zip")?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).context("zip entry")?;
        let Some(out_path) = file.enclosed_name() else {
            continue;
        };

        let out_path = dest.join(out_path);
        if file.is_dir() {
            fs::create_dir_all(&out_path).context("create zip dir")?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).context("create zip dir")?;
        }

        let mut out_file = fs::File::create(&out_path).context("write zip entry")?;
        io::copy(&mut file, &mut out_file).context("extract zip entry")?;
        if let Some(dt) = file.last_modified() {
            if let Some(mtime) = zip_time_to_unix(dt) {
                let mtime = FileTime::from_unix_time(mtime, 0);
                let _ = set_file_mtime(&out_path, mtime);
            }
        }
    }

    Ok(())
}

fn zip_time_to_unix(dt: zip::DateTime) -> Option<i64> {
    let month = Month::try_from(dt.month()).ok()?;
    let date = Date::from_calendar_date(dt.year() as i32, month, dt.day()).ok()?;
    let time = TimeOfDay::from_hms(dt.hour(), dt.minute(), dt.second()).ok()?;
    let datetime = PrimitiveDateTime::new(date, time).assume_utc();
    Some(datetime.unix_timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    #[test]
    fn extract_zip_recreates_the_tree() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("pkg.zip");

        let file = fs::File::create(&archive_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        writer
            .add_directory("pkg-main/Shaders/", options)
            .unwrap();
        writer
            .start_file("pkg-main/Shaders/glow.fx", options)
            .unwrap();
        writer.write_all(b"technique Glow {}").unwrap();
        writer.finish().unwrap();

        let out = dir.path().join("out");
        extract_zip(&archive_path, &out).unwrap();
        assert_eq!(
            fs::read_to_string(out.join("pkg-main").join("Shaders").join("glow.fx")).unwrap(),
            "technique Glow {}"
        );
    }
}
