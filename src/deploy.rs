use crate::{backup, fetch, tools, workdir::Workspace};
use anyhow::{Context, Result};
use filetime::FileTime;
use std::{fs, io, path::Path};
use walkdir::WalkDir;

pub const GPOSINGWAY_REPO_URL: &str = "https://github.com/gposingway/gposingway.git";

/// Directory entries in the game tree that become symlinks into the
/// GPosingway cache.
const BUNDLE_LINKS: [&str; 2] = ["reshade-presets", "reshade-shaders"];

/// Configuration templates copied (not linked) from the bundle, with a backup
/// of whatever was there before.
const CONFIG_TEMPLATES: [&str; 2] = ["ReShade.ini", "ReShadePreset.ini"];

/// An archive-distributed shader package. Fetched once into its cache
/// directory and never refreshed; deployment failure is isolated per package.
#[derive(Debug, Clone, Copy)]
pub struct OptionalPackage {
    pub name: &'static str,
    pub url: &'static str,
    /// Top-level directory inside the archive.
    pub archive_root: &'static str,
}

pub const OPTIONAL_PACKAGES: [OptionalPackage; 2] = [
    OptionalPackage {
        name: "iMMERSE",
        url: "https://github.com/martymcmodding/iMMERSE/archive/refs/heads/master.zip",
        archive_root: "iMMERSE-main",
    },
    OptionalPackage {
        name: "METEOR",
        url: "https://github.com/martymcmodding/METEOR/archive/refs/heads/master.zip",
        archive_root: "METEOR-main",
    },
];

/// Delete whatever sits at `path`: plain file, symlink, or directory tree.
/// Deployment never merges into pre-existing entries.
pub fn remove_entry(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(_) => return Ok(()),
    };
    if metadata.file_type().is_dir() {
        fs::remove_dir_all(path).with_context(|| format!("remove dir {}", path.display()))?;
    } else {
        fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
    }
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn create_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Other,
        "symlink unavailable on this platform",
    ))
}

pub fn ensure_gposingway(workspace: &Workspace) -> Result<()> {
    if workspace.gposingway.join(".git").exists() {
        println!("Getting updates for GPosingway...");
        tools::clone_or_update(GPOSINGWAY_REPO_URL, &workspace.gposingway)?;
        println!("GPosingway updated.");
    } else {
        println!("Downloading GPosingway...");
        tools::clone_or_update(GPOSINGWAY_REPO_URL, &workspace.gposingway)?;
        println!("GPosingway downloaded.");
    }
    Ok(())
}

/// Recreate the bundle symlinks in the game tree. Anything already at the
/// link path is removed first, so stale deployments (including a real
/// directory left by an older install) are replaced, never merged into.
pub fn link_bundle_dirs(game_path: &Path, bundle_dir: &Path) -> Result<()> {
    for name in BUNDLE_LINKS {
        let link = game_path.join(name);
        let target = bundle_dir.join(name);

        remove_entry(&link)?;
        create_symlink(&target, &link)
            .with_context(|| format!("symlink {} -> {}", link.display(), target.display()))?;
    }
    Ok(())
}

pub fn install_config_templates(
    game_path: &Path,
    bundle_dir: &Path,
    backup_dir: &Path,
) -> Result<()> {
    println!("Installing GPosingway configuration files...");
    for name in CONFIG_TEMPLATES {
        let dest = game_path.join(name);
        backup::backup_file(backup_dir, &dest)?;
        fs::copy(bundle_dir.join(name), &dest)
            .with_context(|| format!("install {name}"))?;
    }
    Ok(())
}

/// Make sure a package's cache directory is populated. An existing cache is
/// trusted unconditionally; there is no freshness check. Fetch or extract
/// failure is a warning, not an error, and the half-made cache is removed so
/// the next run retries.
pub fn ensure_package(cache_dir: &Path, package: &OptionalPackage) -> Result<bool> {
    if cache_dir.exists() {
        return Ok(true);
    }

    fs::create_dir_all(cache_dir).context("create package cache dir")?;
    let archive = cache_dir.join(format!("{}.zip", package.name));

    println!("  Downloading {}...", package.name);
    if let Err(err) = fetch::download(package.url, &archive) {
        println!(
            "  WARNING: Failed to download {}: {err:#}, skipping...",
            package.name
        );
        let _ = fs::remove_dir_all(cache_dir);
        return Ok(false);
    }

    if let Err(err) = fetch::extract_zip(&archive, cache_dir) {
        println!(
            "  WARNING: Failed to extract {}: {err:#}, skipping...",
            package.name
        );
        let _ = fs::remove_dir_all(cache_dir);
        return Ok(false);
    }

    println!("  {} downloaded and extracted.", package.name);
    Ok(true)
}

/// Copy a package's Shaders/ and Textures/ subtrees into the game's shader
/// directories. Top-level files overwrite in place; subdirectories (header
/// collections and the like) replace any same-named destination wholesale.
pub fn copy_package_trees(package_root: &Path, game_path: &Path) -> Result<()> {
    for subtree in ["Shaders", "Textures"] {
        let source = package_root.join(subtree);
        if !source.exists() {
            continue;
        }
        let dest_root = game_path.join("reshade-shaders").join(subtree);
        fs::create_dir_all(&dest_root).context("create shader dest dir")?;

        for entry in fs::read_dir(&source).context("read package subtree")? {
            let entry = entry.context("read package entry")?;
            let dest = dest_root.join(entry.file_name());
            if entry.file_type().context("package entry type")?.is_dir() {
                remove_entry(&dest)?;
                copy_tree(&entry.path(), &dest)?;
            } else {
                copy_file_preserving(&entry.path(), &dest)?;
            }
        }
    }
    Ok(())
}

/// Fetch and deploy every optional package. One package failing leaves the
/// others, and the primary bundle, untouched.
pub fn deploy_optional_packages(workspace: &Workspace, game_path: &Path) -> Result<()> {
    println!("Installing optional shader packages (iMMERSE and METEOR)...");
    deploy_packages(workspace, game_path, &OPTIONAL_PACKAGES)?;
    println!("Optional shader packages installed.");
    Ok(())
}

fn deploy_packages(
    workspace: &Workspace,
    game_path: &Path,
    packages: &[OptionalPackage],
) -> Result<()> {
    for package in packages {
        let cache_dir = workspace.package_dir(package.name);
        if !ensure_package(&cache_dir, package)? {
            continue;
        }
        copy_package_trees(&cache_dir.join(package.archive_root), game_path)?;
    }
    Ok(())
}

/// Remove the installer's baseline shader directory so the bundle's curated
/// set is the only one ReShade finds.
pub fn remove_baseline_shaders(game_path: &Path) -> Result<()> {
    println!("Cleaning out baseline shaders and configuration");
    remove_entry(&game_path.join("ReShade_shaders"))
}

fn copy_file_preserving(source: &Path, dest: &Path) -> Result<()> {
    fs::copy(source, dest)
        .with_context(|| format!("copy {} -> {}", source.display(), dest.display()))?;
    if let Ok(metadata) = fs::metadata(source) {
        let mtime = FileTime::from_last_modification_time(&metadata);
        let _ = filetime::set_file_mtime(dest, mtime);
    }
    Ok(())
}

fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.context("walk package dir")?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .context("package relative path")?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).context("create package dir")?;
        } else {
            copy_file_preserving(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn remove_entry_handles_files_dirs_and_symlinks() {
        let dir = TempDir::new().unwrap();

        let file = dir.path().join("plain");
        touch(&file, "x");
        remove_entry(&file).unwrap();
        assert!(!file.exists());

        let tree = dir.path().join("tree");
        touch(&tree.join("nested").join("leaf"), "x");
        remove_entry(&tree).unwrap();
        assert!(!tree.exists());

        let link = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("gone"), &link).unwrap();
        remove_entry(&link).unwrap();
        assert!(fs::symlink_metadata(&link).is_err());

        // Nothing there at all is fine too.
        remove_entry(&dir.path().join("absent")).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn bundle_links_replace_whatever_was_there() {
        let dir = TempDir::new().unwrap();
        let game = dir.path().join("game");
        let bundle = dir.path().join("gposingway");
        fs::create_dir_all(&game).unwrap();
        for name in BUNDLE_LINKS {
            fs::create_dir_all(bundle.join(name)).unwrap();
        }

        // A stale real directory with content must not be merged into.
        touch(&game.join("reshade-shaders").join("stale.fx"), "old");

        link_bundle_dirs(&game, &bundle).unwrap();
        for name in BUNDLE_LINKS {
            let link = game.join(name);
            assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
            assert_eq!(fs::read_link(&link).unwrap(), bundle.join(name));
        }

        // Idempotent: a second pass converges to the same links.
        link_bundle_dirs(&game, &bundle).unwrap();
        for name in BUNDLE_LINKS {
            assert_eq!(fs::read_link(game.join(name)).unwrap(), bundle.join(name));
        }
    }

    #[test]
    fn config_templates_are_copied_with_backup() {
        let dir = TempDir::new().unwrap();
        let game = dir.path().join("game");
        let bundle = dir.path().join("gposingway");
        let backups = dir.path().join("backups");
        fs::create_dir_all(&game).unwrap();
        touch(&bundle.join("ReShade.ini"), "[GENERAL]\n");
        touch(&bundle.join("ReShadePreset.ini"), "Techniques=\n");

        // Pre-existing file gets backed up before the overwrite.
        touch(&game.join("ReShade.ini"), "user edited");

        install_config_templates(&game, &bundle, &backups).unwrap();
        assert_eq!(
            fs::read_to_string(game.join("ReShade.ini")).unwrap(),
            "[GENERAL]\n"
        );
        assert_eq!(
            fs::read_to_string(game.join("ReShadePreset.ini")).unwrap(),
            "Techniques=\n"
        );
        let backups: Vec<_> = fs::read_dir(&backups).unwrap().collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn package_trees_overwrite_files_and_replace_subdirs() {
        let dir = TempDir::new().unwrap();
        let game = dir.path().join("game");
        let package = dir.path().join("immerse").join("iMMERSE-main");
        touch(&package.join("Shaders").join("MXAO.fx"), "new mxao");
        touch(
            &package.join("Shaders").join("MartysMods").join("core.fxh"),
            "new header",
        );
        touch(&package.join("Textures").join("blue.png"), "png");

        let shaders = game.join("reshade-shaders").join("Shaders");
        touch(&shaders.join("MXAO.fx"), "old mxao");
        touch(&shaders.join("MartysMods").join("stale.fxh"), "stale");

        copy_package_trees(&package, &game).unwrap();

        assert_eq!(fs::read_to_string(shaders.join("MXAO.fx")).unwrap(), "new mxao");
        assert_eq!(
            fs::read_to_string(shaders.join("MartysMods").join("core.fxh")).unwrap(),
            "new header"
        );
        // Replace-don't-merge: the stale file inside the subdir is gone.
        assert!(!shaders.join("MartysMods").join("stale.fxh").exists());
        assert_eq!(
            fs::read_to_string(game.join("reshade-shaders").join("Textures").join("blue.png"))
                .unwrap(),
            "png"
        );
    }

    #[test]
    fn existing_package_cache_is_never_refetched() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("immerse");
        fs::create_dir_all(&cache).unwrap();

        // The URL is unreachable; an existing cache must short-circuit
        // before any network activity.
        let package = OptionalPackage {
            name: "iMMERSE",
            url: "http://127.0.0.1:1/immerse.zip",
            archive_root: "iMMERSE-main",
        };
        assert!(ensure_package(&cache, &package).unwrap());
    }

    #[test]
    fn failed_fetch_is_isolated_and_retriable() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("meteor");

        let package = OptionalPackage {
            name: "METEOR",
            url: "http://127.0.0.1:1/meteor.zip",
            archive_root: "METEOR-main",
        };
        // Non-fatal: reports absence instead of erroring out.
        assert!(!ensure_package(&cache, &package).unwrap());
        // The half-made cache dir is gone, so a later run retries the fetch.
        assert!(!cache.exists());
    }

    #[test]
    fn one_failed_package_does_not_block_the_others() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("workdir");
        let workspace = Workspace {
            backups: root.join("backups"),
            installer_repo: root.join("reshade-installer"),
            reshade_data: root.join("reshade"),
            gposingway: root.join("gposingway"),
            root,
        };
        let game = dir.path().join("game");
        fs::create_dir_all(&game).unwrap();

        // Package B's cache already holds an extracted archive; package A
        // points at an unreachable host and has no cache.
        let packages = [
            OptionalPackage {
                name: "iMMERSE",
                url: "http://127.0.0.1:1/immerse.zip",
                archive_root: "iMMERSE-main",
            },
            OptionalPackage {
                name: "METEOR",
                url: "http://127.0.0.1:1/meteor.zip",
                archive_root: "METEOR-main",
            },
        ];
        let meteor_root = workspace.package_dir("METEOR").join("METEOR-main");
        touch(&meteor_root.join("Shaders").join("Rays.fx"), "rays");
        touch(&meteor_root.join("Textures").join("noise.png"), "noise");

        deploy_packages(&workspace, &game, &packages).unwrap();

        // The surviving package deployed as if the failed one were never
        // requested.
        let shaders = game.join("reshade-shaders");
        assert_eq!(
            fs::read_to_string(shaders.join("Shaders").join("Rays.fx")).unwrap(),
            "rays"
        );
        assert_eq!(
            fs::read_to_string(shaders.join("Textures").join("noise.png")).unwrap(),
            "noise"
        );
        assert!(!workspace.package_dir("iMMERSE").exists());
    }

    #[test]
    fn baseline_shader_dir_is_removed() {
        let dir = TempDir::new().unwrap();
        let game = dir.path().to_path_buf();
        touch(&game.join("ReShade_shaders").join("Standard.fx"), "x");
        remove_baseline_shaders(&game).unwrap();
        assert!(!game.join("ReShade_shaders").exists());
    }
}
