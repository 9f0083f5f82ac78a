use std::{collections::HashMap, fs, path::PathBuf};

pub const FFXIV_STEAM_APP_ID: &str = "39210";
pub const FFXIV_PATH_ENV: &str = "FFXIV_PATH";
pub const WINE_PREFIX_ENV: &str = "WINE_PREFIX";

/// Snapshot of the ambient process state the detectors read. Passing it
/// explicitly keeps every strategy testable against a fake home/env.
#[derive(Debug, Clone)]
pub struct DetectEnv {
    pub home: PathBuf,
    pub vars: HashMap<String, String>,
}

impl DetectEnv {
    pub fn from_process() -> Self {
        // No HOME only rules out the strategies that look under it; the
        // explicit env override must still work.
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default();
        let vars = std::env::vars().collect();
        Self { home, vars }
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectMethod {
    Environment,
    XLCore,
    Steam,
}

impl DetectMethod {
    pub fn label(self) -> &'static str {
        match self {
            DetectMethod::Environment => "Environment",
            DetectMethod::XLCore => "XLCore",
            DetectMethod::Steam => "Steam",
        }
    }
}

/// A resolved install. Constructed only by a strategy that matched, so both
/// paths are always set; existence on disk is not guaranteed.
#[derive(Debug, Clone)]
pub struct InstallInfo {
    pub method: DetectMethod,
    pub game_path: PathBuf,
    pub wine_prefix: PathBuf,
    /// XLCore keeps a second prefix for its managed Proton builds.
    pub proton_prefix: Option<PathBuf>,
}

/// Try each detection strategy in priority order; first match wins. Strategy
/// internals never error out — any parse or lookup failure just advances to
/// the next strategy.
pub fn resolve(env: &DetectEnv) -> Option<InstallInfo> {
    from_environment(env)
        .or_else(|| from_xlcore(env))
        .or_else(|| from_steam(env))
}

pub fn from_environment(env: &DetectEnv) -> Option<InstallInfo> {
    let game_path = env.var(FFXIV_PATH_ENV)?;
    let wine_prefix = env.var(WINE_PREFIX_ENV)?;
    Some(InstallInfo {
        method: DetectMethod::Environment,
        game_path: PathBuf::from(game_path),
        wine_prefix: PathBuf::from(wine_prefix),
        proton_prefix: None,
    })
}

pub fn from_xlcore(env: &DetectEnv) -> Option<InstallInfo> {
    let xlcore = env.home.join(".xlcore");
    let raw = fs::read_to_string(xlcore.join("launcher.ini")).ok()?;
    // XLCore's GamePath points at the base directory; the game lives in game/.
    let base = unnamed_section_value(&raw, "GamePath")?;
    Some(InstallInfo {
        method: DetectMethod::XLCore,
        game_path: PathBuf::from(base).join("game"),
        wine_prefix: xlcore.join("wineprefix"),
        proton_prefix: Some(xlcore.join("protonprefix")),
    })
}

pub fn from_steam(env: &DetectEnv) -> Option<InstallInfo> {
    let vdf = env
        .home
        .join(".steam")
        .join("steam")
        .join("config")
        .join("libraryfolders.vdf");
    let raw = fs::read_to_string(vdf).ok()?;

    let library = parse_library_paths(&raw)
        .into_iter()
        .filter(|path| path.is_dir())
        .find(|path| {
            path.join("steamapps")
                .join(format!("appmanifest_{FFXIV_STEAM_APP_ID}.acf"))
                .exists()
        })?;

    let steamapps = library.join("steamapps");
    Some(InstallInfo {
        method: DetectMethod::Steam,
        game_path: steamapps
            .join("common")
            .join("FINAL FANTASY XIV Online")
            .join("game"),
        wine_prefix: steamapps
            .join("compatdata")
            .join(FFXIV_STEAM_APP_ID)
            .join("pfx"),
        proton_prefix: None,
    })
}

/// Key lookup in the leading, unnamed section of an INI-like file. XLCore
/// writes its settings before any [section] header.
fn unnamed_section_value(raw: &str, key: &str) -> Option<String> {
    for line in raw.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            break;
        }
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        if name.trim() == key {
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            return Some(value.to_string());
        }
    }
    None
}

fn parse_library_paths(raw: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if !line.contains("\"path\"") {
            continue;
        }

        let parts: Vec<&str> = line.split('"').collect();
        if parts.len() >= 4 {
            let path = parts[3].replace("\\\\", "\\");
            paths.push(PathBuf::from(path));
        }
    }

    paths
}
