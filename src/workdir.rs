use anyhow::{Context, Result};
use directories::BaseDirs;
use std::{fs, path::PathBuf};

/// Layout of the tool's persistent directory tree under the XDG data home.
/// Cache directories are shared across runs; nothing in here is versioned.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub backups: PathBuf,
    pub installer_repo: PathBuf,
    pub reshade_data: PathBuf,
    pub gposingway: PathBuf,
}

impl Workspace {
    pub fn open() -> Result<Self> {
        let base = BaseDirs::new().context("resolve home dir")?;
        let root = base.data_local_dir().join("ffxiv-linux-reshade");
        fs::create_dir_all(&root).context("create working dir")?;

        Ok(Self {
            backups: root.join("backups"),
            installer_repo: root.join("reshade-installer"),
            reshade_data: root.join("reshade"),
            gposingway: root.join("gposingway"),
            root,
        })
    }

    /// Cache directory for an optional shader package.
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.root.join(name.to_lowercase())
    }

    pub fn winetricks_cache(home: &std::path::Path) -> PathBuf {
        home.join(".cache")
            .join("winetricks")
            .join("d3dcompiler_47")
            .join("d3dcompiler_47.dll")
    }
}
