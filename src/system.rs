// OS-facing helpers: finding, installing and updating yt-dlp, probing for
// ffmpeg, and opening folders in the platform file browser.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Resolve the yt-dlp binary (a name looked up on `PATH`, or a path).
pub fn locate_downloader(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

/// Make sure yt-dlp is available, installing it with pip when it is not.
/// This is the only failure that stops the program.
pub fn ensure_downloader(program: &str) -> Result<PathBuf> {
    if let Some(path) = locate_downloader(program) {
        return Ok(path);
    }

    println!("\n  yt-dlp not found. Installing yt-dlp...\n");
    match pip_install_ytdlp() {
        Ok(()) => println!("\n  Done.\n"),
        Err(e) => tracing::warn!(error = %e, "pip install failed"),
    }

    match locate_downloader(program) {
        Some(path) => Ok(path),
        None => bail!(
            "{program} is not installed and could not be installed automatically.\n\
             Install it with `python -m pip install -U yt-dlp` or download a release from \
             https://github.com/yt-dlp/yt-dlp/releases, then run this program again."
        ),
    }
}

/// Python interpreters to try for pip, in order.
fn python_candidates() -> &'static [&'static str] {
    if cfg!(windows) {
        &["py", "python", "python3"]
    } else {
        &["python3", "python"]
    }
}

fn pip_install_ytdlp() -> Result<()> {
    for python in python_candidates() {
        let Ok(exe) = which::which(python) else {
            continue;
        };
        let status = Command::new(exe)
            .args(["-m", "pip", "install", "-U", "yt-dlp"])
            .status()?;
        if status.success() {
            return Ok(());
        }
        bail!("pip exited with {status}");
    }
    bail!("no Python interpreter found on PATH")
}

/// Update yt-dlp in place. Self-update (`yt-dlp -U`) covers the standalone
/// release binaries; pip installs refuse it, so pip is the fallback.
pub fn update_downloader(program: &Path) -> Result<()> {
    let self_update = Command::new(program).arg("-U").status();
    match self_update {
        Ok(status) if status.success() => return Ok(()),
        Ok(status) => tracing::info!(%status, "yt-dlp -U failed, trying pip"),
        Err(e) => tracing::info!(error = %e, "yt-dlp -U could not run, trying pip"),
    }
    pip_install_ytdlp()
}

/// ffmpeg and ffprobe are both needed for audio extraction.
pub fn has_audio_toolchain() -> bool {
    which::which("ffmpeg").is_ok() && which::which("ffprobe").is_ok()
}

/// Platform-specific install commands for ffmpeg.
pub fn ffmpeg_install_hints() -> &'static [&'static str] {
    if cfg!(windows) {
        &["winget install --id Gyan.FFmpeg"]
    } else if cfg!(target_os = "macos") {
        &["brew install ffmpeg"]
    } else {
        &["sudo apt install ffmpeg", "(or your distribution's package manager)"]
    }
}

/// Open a folder in the file browser. Fire-and-forget: errors are logged
/// and otherwise ignored.
pub fn open_folder(path: &Path) {
    let opener = if cfg!(windows) {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    let spawned = Command::new(opener)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    if let Err(e) = spawned {
        tracing::debug!(opener, path = %path.display(), error = %e, "could not open folder");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_programs_are_not_located() {
        assert_eq!(locate_downloader("definitely-not-a-real-binary-4b1d"), None);
    }

    #[test]
    fn there_is_always_an_install_hint() {
        assert!(!ffmpeg_install_hints().is_empty());
        assert!(!python_candidates().is_empty());
    }
}
