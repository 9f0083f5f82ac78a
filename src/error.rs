use std::process::ExitCode;

/// Fatal conditions with a dedicated process exit code. Everything else
/// propagates as a plain `anyhow::Error` and exits with code 1.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("`{name}` not found on your PATH")]
    MissingTool { name: &'static str },

    #[error("couldn't auto-detect the FFXIV install")]
    InstallNotFound,

    #[error("ReShade installer script failed")]
    InstallerFailed { stdout: String, stderr: String },

    #[error("failed to obtain a native d3dcompiler_47.dll")]
    DllUnavailable,
}

impl InstallError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            InstallError::MissingTool { .. } => ExitCode::from(2),
            InstallError::InstallNotFound => ExitCode::from(3),
            InstallError::InstallerFailed { .. } => ExitCode::from(4),
            InstallError::DllUnavailable => ExitCode::from(5),
        }
    }
}
