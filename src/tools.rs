use crate::error::InstallError;
use anyhow::{bail, Context, Result};
use std::{collections::HashMap, io::Write, path::Path, process::{Command, Output, Stdio}};

/// Fail fast when a required executable is missing, with distro-specific
/// install hints. Called once per tool before any other work starts.
pub fn require(name: &'static str) -> Result<()> {
    if which::which(name).is_ok() {
        return Ok(());
    }

    println!("`{name}` not found on your path. Please install it:");
    match name {
        "git" => {
            println!("  Arch: sudo pacman -S git");
            println!("  Ubuntu/Debian: sudo apt install git");
            println!("  Fedora: sudo dnf install git");
        }
        "winetricks" => {
            println!("  Arch: sudo pacman -S winetricks");
            println!("  Ubuntu/Debian: sudo apt install winetricks");
            println!("  Fedora: sudo dnf install winetricks");
        }
        other => println!("  Install `{other}` with your distribution's package manager."),
    }

    Err(InstallError::MissingTool { name }.into())
}

/// Fresh clone when `dir` has no git metadata, fast-forward update otherwise.
/// Repository content is load-bearing downstream, so either path failing is a
/// hard error rather than a warning.
pub fn clone_or_update(url: &str, dir: &Path) -> Result<()> {
    if dir.join(".git").exists() {
        let output = Command::new("git")
            .arg("pull")
            .arg("--rebase")
            .current_dir(dir)
            .output()
            .context("run git pull")?;
        if !output.status.success() {
            bail!(
                "git pull failed in {}: {}",
                dir.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
    } else {
        let output = Command::new("git")
            .arg("clone")
            .arg(url)
            .arg(dir)
            .output()
            .context("run git clone")?;
        if !output.status.success() {
            bail!(
                "git clone of {url} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
    }
    Ok(())
}

/// Drive an interactive installer script with a fixed answer sequence on
/// stdin. `extra_env` is merged over the inherited environment so the script
/// still sees WINE/Proton variables.
pub fn run_installer_script(
    script: &Path,
    cwd: &Path,
    extra_env: &HashMap<String, String>,
    answers: &[&str],
) -> Result<Output> {
    let mut child = Command::new(script)
        .current_dir(cwd)
        .envs(extra_env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawn {}", script.display()))?;

    let scripted = answers.join("\n");
    child
        .stdin
        .take()
        .context("installer stdin unavailable")?
        .write_all(scripted.as_bytes())
        .context("write installer answers")?;

    let output = child.wait_with_output().context("wait for installer")?;
    if !output.status.success() {
        return Err(InstallError::InstallerFailed {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
        .into());
    }
    Ok(output)
}

/// Run `winetricks --unattended <verb>` against a prefix. The exit status is
/// advisory: winetricks reports failure for some already-installed verbs, so
/// callers verify the expected files on disk instead.
pub fn winetricks_verb(prefix: &Path, verb: &str) -> Result<Output> {
    Command::new("winetricks")
        .arg("--unattended")
        .arg(verb)
        .env("WINEPREFIX", prefix)
        .output()
        .context("run winetricks")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstallError;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn tool_lookup_rejects_non_executable_files() {
        let dir = TempDir::new().unwrap();
        // A plain mode-0644 file named like the tool must not satisfy the
        // prerequisite gate; only a real executable does.
        fs::write(dir.path().join("git"), "not a binary").unwrap();
        let path_var = format!("/nonexistent:{}", dir.path().display());
        assert!(which::which_in("git", Some(&path_var), dir.path()).is_err());

        let tool = dir.path().join("sometool");
        fs::write(&tool, "#!/bin/sh\n").unwrap();
        make_executable(&tool);
        assert_eq!(
            which::which_in("sometool", Some(&path_var), dir.path()).unwrap(),
            tool
        );
        assert!(which::which_in("othertool", Some(&path_var), dir.path()).is_err());
    }

    #[test]
    #[cfg(unix)]
    fn installer_script_receives_scripted_answers() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("echo-stdin.sh");
        fs::write(&script, "#!/bin/sh\ncat > answers.txt\n").unwrap();
        make_executable(&script);

        let env = HashMap::new();
        run_installer_script(&script, dir.path(), &env, &["i", "/games/ffxiv", "y", ""]).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("answers.txt")).unwrap(),
            "i\n/games/ffxiv\ny\n"
        );
    }

    #[test]
    #[cfg(unix)]
    fn installer_failure_surfaces_captured_output() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("fail.sh");
        fs::write(&script, "#!/bin/sh\necho broken >&2\nexit 3\n").unwrap();
        make_executable(&script);

        let env = HashMap::new();
        let err = run_installer_script(&script, dir.path(), &env, &[""]).unwrap_err();
        match err.downcast_ref::<InstallError>() {
            Some(InstallError::InstallerFailed { stderr, .. }) => {
                assert!(stderr.contains("broken"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
