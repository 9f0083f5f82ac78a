mod backup;
mod d3dcompiler;
mod deploy;
mod detect;
mod error;
mod fetch;
mod installer;
mod reshade_config;
mod tools;
mod workdir;

use error::InstallError;
use std::process::ExitCode;

fn main() -> ExitCode {
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("ffxiv-linux-reshade");
                println!("Installs ReShade and GPosingway into a Wine/Proton FFXIV install.");
                println!();
                println!("Detection order: {} + {} environment variables, XLCore, Steam.",
                    detect::FFXIV_PATH_ENV, detect::WINE_PREFIX_ENV);
                println!("Run with no arguments to install.");
                return ExitCode::SUCCESS;
            }
            "--version" | "-V" => {
                println!("ffxiv-linux-reshade v{}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            other => {
                eprintln!("unrecognized argument: {other}");
                return ExitCode::FAILURE;
            }
        }
    }

    match installer::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            match err.downcast_ref::<InstallError>() {
                Some(fatal) => fatal.exit_code(),
                None => ExitCode::FAILURE,
            }
        }
    }
}
