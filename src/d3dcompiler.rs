use crate::{detect::InstallInfo, error::InstallError, tools, workdir::Workspace};
use anyhow::{Context, Result};
use std::{fs, path::Path};

/// Anything smaller than this is a Wine placeholder or a truncated download,
/// not the real Microsoft DLL.
const DLL_MIN_BYTES: u64 = 1_000_000;

fn healthy(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() >= DLL_MIN_BYTES).unwrap_or(false)
}

/// Make sure native d3dcompiler DLLs are present in the game directory and
/// every prefix's system32. ReShade compiles shaders through d3dcompiler, and
/// Wine's builtin version conflicts with vkd3d, so the real DLL is fetched
/// through winetricks when missing.
pub fn ensure_dlls(info: &InstallInfo, home: &Path) -> Result<()> {
    let d3d47 = info.game_path.join("d3dcompiler_47.dll");
    let d3d43 = info.game_path.join("d3dcompiler_43.dll");
    let sys32 = info
        .wine_prefix
        .join("drive_c")
        .join("windows")
        .join("system32");

    if !healthy(&d3d47) {
        println!("Downloading native Windows d3dcompiler_47.dll via winetricks...");
        tools::winetricks_verb(&info.wine_prefix, "d3dcompiler_47")?;

        // winetricks caches the DLL; it may also install straight into the
        // prefix. Either location is acceptable.
        let cache = Workspace::winetricks_cache(home);
        let prefix_copy = sys32.join("d3dcompiler_47.dll");
        if healthy(&cache) {
            fs::copy(&cache, &d3d47).context("copy d3dcompiler_47 from winetricks cache")?;
            println!("d3dcompiler_47.dll downloaded and installed.");
        } else if healthy(&prefix_copy) {
            fs::copy(&prefix_copy, &d3d47).context("copy d3dcompiler_47 from prefix")?;
            println!("d3dcompiler_47.dll installed from Wine prefix.");
        } else {
            println!("ERROR: Failed to download d3dcompiler_47.dll via winetricks.");
            println!("Try manually: winetricks d3dcompiler_47");
            return Err(InstallError::DllUnavailable.into());
        }
    }

    // Wine sometimes asks for the _43 variant; a byte copy of _47 satisfies it.
    if !healthy(&d3d43) {
        println!("Creating d3dcompiler_43.dll (copy of 47) for compatibility...");
        fs::copy(&d3d47, &d3d43).context("copy d3dcompiler_43")?;
        println!("d3dcompiler DLLs placed in game directory.");
    }

    println!("Copying d3dcompiler DLLs to Wine system32 for ReShade...");
    fs::create_dir_all(&sys32).context("create prefix system32")?;
    fs::copy(&d3d47, sys32.join("d3dcompiler_47.dll")).context("install DLL to prefix")?;
    fs::copy(&d3d47, sys32.join("d3dcompiler_43.dll")).context("install DLL to prefix")?;
    println!("d3dcompiler DLLs installed to Wine prefix.");

    if let Some(proton_prefix) = &info.proton_prefix {
        let proton_sys32 = proton_prefix
            .join("drive_c")
            .join("windows")
            .join("system32");
        if proton_sys32.exists() {
            println!("Installing d3dcompiler DLLs to XLCore Proton prefix...");
            fs::copy(&d3d47, proton_sys32.join("d3dcompiler_47.dll"))
                .context("install DLL to Proton prefix")?;
            fs::copy(&d3d47, proton_sys32.join("d3dcompiler_43.dll"))
                .context("install DLL to Proton prefix")?;
            println!("d3dcompiler DLLs installed to Proton prefix.");
        }
    }

    Ok(())
}
