use crate::{
    d3dcompiler, deploy,
    detect::{
        self, DetectEnv, DetectMethod, InstallInfo, FFXIV_PATH_ENV, FFXIV_STEAM_APP_ID,
        WINE_PREFIX_ENV,
    },
    error::InstallError,
    reshade_config, tools,
    workdir::Workspace,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, time::{SystemTime, UNIX_EPOCH}};

const INSTALLER_REPO_URL: &str = "https://github.com/kevinlekiller/reshade-steam-proton.git";
const INSTALLER_SCRIPT: &str = "reshade-linux.sh";

/// Pinned for GPosingway compatibility; addon support is required.
const RESHADE_VERSION: &str = "6.5.1";

/// Answer sequence for reshade-linux.sh, in prompt order: install, game
/// directory, confirm directory, skip shader download, 64-bit, dxgi, confirm,
/// trailing newline. Brittle coupling to the script's prompts; keep in sync
/// with upstream.
fn installer_answers(info: &InstallInfo) -> Vec<String> {
    vec![
        "i".to_string(),
        info.game_path.to_string_lossy().to_string(),
        "y".to_string(),
        "n".to_string(),
        "64".to_string(),
        "dxgi".to_string(),
        "y".to_string(),
        String::new(),
    ]
}

/// Record of the last successful run, written for the user's reference.
/// Never read back to skip work; every run redoes the full pipeline.
#[derive(Debug, Serialize, Deserialize)]
struct LastInstall {
    method: String,
    game_path: String,
    wine_prefix: String,
    proton_prefix: Option<String>,
    timestamp: u64,
}

pub fn run() -> Result<()> {
    tools::require("git")?;
    tools::require("winetricks")?;

    let workspace = Workspace::open()?;
    println!("Using {} as our working directory.", workspace.root.display());
    println!("Backups will be saved to {}", workspace.backups.display());

    let env = DetectEnv::from_process();
    let info = match detect::resolve(&env) {
        Some(info) => info,
        None => {
            println!("Couldn't auto-detect your FFXIV install.");
            println!("Set environment variables and try again, e.g.:");
            println!("  export {FFXIV_PATH_ENV}=\"/path/to/FINAL FANTASY XIV Online/game\"");
            println!(
                "  export {WINE_PREFIX_ENV}=\"/path/to/SteamLibrary/steamapps/compatdata/{FFXIV_STEAM_APP_ID}/pfx\""
            );
            println!("...or install via XLCore or Steam so I can detect it automatically.");
            return Err(InstallError::InstallNotFound.into());
        }
    };

    println!(
        "Found the following FFXIV install information via {}",
        info.method.label()
    );
    println!("\tGame location:\t{}", info.game_path.display());
    println!("\tWine prefix:\t{}", info.wine_prefix.display());

    install_reshade(&workspace, &info)?;
    d3dcompiler::ensure_dlls(&info, &env.home)?;
    deploy::remove_baseline_shaders(&info.game_path)?;

    deploy::ensure_gposingway(&workspace)?;
    deploy::link_bundle_dirs(&info.game_path, &workspace.gposingway)?;
    deploy::install_config_templates(&info.game_path, &workspace.gposingway, &workspace.backups)?;
    deploy::deploy_optional_packages(&workspace, &info.game_path)?;

    println!("Fixing ReShade configuration for Linux...");
    fs::create_dir_all(info.game_path.join("reshade-cache")).context("create reshade cache dir")?;
    if reshade_config::patch(&info.game_path, &env.home)? {
        println!("ReShade configuration updated.");
    }

    record_last_install(&workspace, &info)?;
    print_instructions(info.method);
    Ok(())
}

fn install_reshade(workspace: &Workspace, info: &InstallInfo) -> Result<()> {
    if workspace.installer_repo.join(".git").exists() {
        println!("Getting updates for the ReShade installer...");
        tools::clone_or_update(INSTALLER_REPO_URL, &workspace.installer_repo)?;
        println!("ReShade installer updated.");
    } else {
        println!("Downloading ReShade installer...");
        tools::clone_or_update(INSTALLER_REPO_URL, &workspace.installer_repo)?;
        println!("ReShade installer downloaded.");
    }

    let mut extra_env = HashMap::new();
    extra_env.insert(
        "MAIN_PATH".to_string(),
        workspace.reshade_data.to_string_lossy().to_string(),
    );
    extra_env.insert("SHADER_REPOS".to_string(), String::new());
    extra_env.insert("RESHADE_VERSION".to_string(), RESHADE_VERSION.to_string());
    extra_env.insert("RESHADE_ADDON_SUPPORT".to_string(), "1".to_string());

    println!(
        "Installing ReShade {RESHADE_VERSION} with addon support for FFXIV at {}...",
        info.game_path.display()
    );
    let answers = installer_answers(info);
    let answers: Vec<&str> = answers.iter().map(String::as_str).collect();
    let result = tools::run_installer_script(
        &workspace.installer_repo.join(INSTALLER_SCRIPT),
        &workspace.installer_repo,
        &extra_env,
        &answers,
    );

    match result {
        Ok(_) => Ok(()),
        Err(err) => {
            if let Some(InstallError::InstallerFailed { stdout, stderr }) =
                err.downcast_ref::<InstallError>()
            {
                println!("ERROR: ReShade installation failed.");
                println!("stdout: {stdout}");
                println!("stderr: {stderr}");
            }
            Err(err)
        }
    }
}

fn record_last_install(workspace: &Workspace, info: &InstallInfo) -> Result<()> {
    let record = LastInstall {
        method: info.method.label().to_string(),
        game_path: info.game_path.to_string_lossy().to_string(),
        wine_prefix: info.wine_prefix.to_string_lossy().to_string(),
        proton_prefix: info
            .proton_prefix
            .as_ref()
            .map(|path| path.to_string_lossy().to_string()),
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
    };
    let raw = serde_json::to_string_pretty(&record).context("serialize install record")?;
    fs::write(workspace.root.join("last_install.json"), raw).context("write install record")?;
    Ok(())
}

fn print_instructions(method: DetectMethod) {
    println!("All done!");
    println!();
    println!("{}", "=".repeat(80));
    println!("IMPORTANT SETUP INSTRUCTIONS:");
    println!("{}", "=".repeat(80));
    println!();
    println!("1. Set WINEDLLOVERRIDES for shader compilation to work:");

    match method {
        DetectMethod::Steam => {
            println!("   For Steam, set the following launch options:");
            println!(
                "   WINEDLLOVERRIDES=\"d3dcompiler_43=n,b;d3dcompiler_47=n,b;dxgi=n,b\" %command%"
            );
        }
        DetectMethod::XLCore => {
            println!(
                "   For XIVLauncher-rb/XLCore, go to Wine tab and set Extra WINEDLLOVERRIDES to:"
            );
            println!("   d3dcompiler_43=n,b;d3dcompiler_47=n,b");
            println!();
            println!("   NOTE: If using 'Managed Proton', make sure to use a GE-Proton version");
            println!("   (not Wine-XIV-Staging)");
        }
        DetectMethod::Environment => {
            println!("   Set the following environment variable when launching FFXIV:");
            println!("   WINEDLLOVERRIDES=\"d3dcompiler_43=n,b;d3dcompiler_47=n,b;dxgi=n,b\"");
        }
    }

    println!();
    println!("2. Using GPosingway:");
    println!("   - Press Shift+F2 in-game to open ReShade menu");
    println!("   - Select a preset from the dropdown at the top");
    println!("   - Some shaders (AS_StageFX) may show compile errors - these are expected due to incompatibility with newer ReShade version");
    println!("   - Core presets like ipsuShade should work fine");
    println!();
    println!("{}", "=".repeat(80));
}
