use anyhow::{Context, Result};
use std::{fs, path::Path};

/// Line-preserving INI document. ReShade rewrites its own config and users
/// hand-edit it, so everything this tool does not manage must round-trip
/// byte-for-byte; only whitelisted keys are replaced or appended.
#[derive(Debug, Clone)]
pub struct IniDocument {
    lines: Vec<String>,
}

impl IniDocument {
    pub fn parse(raw: &str) -> Self {
        Self {
            lines: raw.split('\n').map(|line| line.to_string()).collect(),
        }
    }

    pub fn serialize(&self) -> String {
        self.lines.join("\n")
    }

    fn section_header(line: &str) -> Option<&str> {
        let trimmed = line.trim();
        trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
    }

    /// Line range of a section body: (first line after the header, first line
    /// of the next section or end of document).
    fn section_range(&self, section: &str) -> Option<(usize, usize)> {
        let start = self
            .lines
            .iter()
            .position(|line| Self::section_header(line) == Some(section))?;
        let end = self.lines[start + 1..]
            .iter()
            .position(|line| Self::section_header(line).is_some())
            .map(|offset| start + 1 + offset)
            .unwrap_or(self.lines.len());
        Some((start + 1, end))
    }

    pub fn ensure_section(&mut self, section: &str) {
        if self.section_range(section).is_some() {
            return;
        }
        // Drop the trailing empty line (the final newline), append, restore.
        let had_trailing = self.lines.last().is_some_and(|line| line.is_empty());
        if had_trailing {
            self.lines.pop();
        }
        if self.lines.last().is_some_and(|line| !line.trim().is_empty()) {
            self.lines.push(String::new());
        }
        self.lines.push(format!("[{section}]"));
        self.lines.push(String::new());
    }

    /// Replace the key in place if present (key comparison is case-sensitive,
    /// case is preserved on write), otherwise append it to the section body.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ensure_section(section);
        let (start, end) = self
            .section_range(section)
            .expect("section exists after ensure_section");

        for index in start..end {
            let line = &self.lines[index];
            if let Some((name, _)) = line.split_once('=') {
                if name.trim() == key {
                    self.lines[index] = format!("{key}={value}");
                    return;
                }
            }
        }

        // Insert after the last non-blank line of the section.
        let mut insert_at = end;
        while insert_at > start && self.lines[insert_at - 1].trim().is_empty() {
            insert_at -= 1;
        }
        self.lines.insert(insert_at, format!("{key}={value}"));
    }
}

/// Translate a native path to the form Wine presents it as on its X: drive.
/// Paths under the home directory are mapped relative to it; anything else
/// gets the drive letter prefixed onto the full path.
pub fn wine_path(path: &Path, home: &Path) -> String {
    match path.strip_prefix(home) {
        Ok(relative) => format!("X:\\{}", backslashed(relative)),
        Err(_) => format!("X:\\{}", backslashed(path)),
    }
}

fn backslashed(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .filter(|part| part != "/")
        .collect::<Vec<_>>()
        .join("\\")
}

/// Bring ReShade.ini to a known-good state for a Wine install. A missing file
/// means the installer stage was skipped or failed earlier; this component
/// never creates the document, so that is a skip, not an error.
///
/// The pinned IntermediateCachePath matters: ReShade's default temp handling
/// under Wine leaks memory without an absolute cache location.
pub fn patch(game_path: &Path, home: &Path) -> Result<bool> {
    let ini_path = game_path.join("ReShade.ini");
    if !ini_path.exists() {
        return Ok(false);
    }

    let raw = fs::read_to_string(&ini_path).context("read ReShade.ini")?;
    let patched = apply(&raw, game_path, home);
    fs::write(&ini_path, patched).context("write ReShade.ini")?;
    Ok(true)
}

fn apply(raw: &str, game_path: &Path, home: &Path) -> String {
    let game = wine_path(game_path, home);
    let mut doc = IniDocument::parse(raw);

    doc.set(
        "GENERAL",
        "EffectSearchPaths",
        &format!("{game}\\reshade-shaders\\Shaders\\**"),
    );
    doc.set(
        "GENERAL",
        "TextureSearchPaths",
        &format!("{game}\\reshade-shaders\\Textures\\**"),
    );
    doc.set(
        "GENERAL",
        "IntermediateCachePath",
        &format!("{game}\\reshade-cache"),
    );
    doc.set("GENERAL", "NoReloadOnInit", "1");
    doc.set("GENERAL", "PerformanceMode", "1");
    // Shift+F2: key code 113, shift modifier set.
    doc.set("INPUT", "KeyOverlay", "113,0,1,0");

    doc.serialize()
}
