// Settings module: everything configurable lives here and is read once at
// startup from environment variables, falling back to sensible defaults.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "Nokky TikTok Downloader";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the history log written next to the executable.
pub const HISTORY_FILE_NAME: &str = "download_history.jsonl";

/// Desktop browser User-Agent sent with every download request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Runtime settings for a session.
#[derive(Debug, Clone)]
pub struct Settings {
    /// yt-dlp binary name or path.
    pub ytdlp: String,
    /// Initial output folder.
    pub output_dir: PathBuf,
    /// JSON-lines history log.
    pub history_file: PathBuf,
    pub user_agent: String,
    /// Directory holding the executable. Relative folder paths typed by
    /// the user are resolved against it.
    pub program_dir: PathBuf,
}

impl Settings {
    /// Build settings from the environment:
    /// `TIKTOK_DL_YTDLP`, `TIKTOK_DL_OUTPUT_DIR`, `TIKTOK_DL_HISTORY` and
    /// `TIKTOK_DL_USER_AGENT`. Unset variables use the defaults.
    pub fn from_env() -> Result<Self> {
        let program_dir = program_dir().context("Failed to locate the program directory")?;

        let ytdlp = env_or("TIKTOK_DL_YTDLP", "yt-dlp");
        let user_agent = env_or("TIKTOK_DL_USER_AGENT", DEFAULT_USER_AGENT);
        let history_file = std::env::var("TIKTOK_DL_HISTORY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| normalize_path(&v, &program_dir))
            .unwrap_or_else(|| program_dir.join(HISTORY_FILE_NAME));
        let output_dir = match std::env::var("TIKTOK_DL_OUTPUT_DIR") {
            Ok(v) if !v.trim().is_empty() => normalize_path(&v, &program_dir),
            _ => default_save_dir(),
        };
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output folder {}", output_dir.display()))?;

        Ok(Settings {
            ytdlp,
            output_dir,
            history_file,
            user_agent,
            program_dir,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn program_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(dir)
}

/// `~/TikTok Downloads`, or `./TikTok Downloads` when there is no home.
pub fn default_save_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    absolute(&home.join("TikTok Downloads"))
}

/// Clean up a user-typed path: trim whitespace and surrounding quotes, and
/// resolve relative paths (like `Downloads`) under `base`.
/// Returns an empty path for empty input.
pub fn normalize_path(input: &str, base: &Path) -> PathBuf {
    let cleaned = input.trim().trim_matches('"').trim();
    if cleaned.is_empty() {
        return PathBuf::new();
    }
    let path = Path::new(cleaned);
    if path.is_absolute() {
        absolute(path)
    } else {
        absolute(&base.join(path))
    }
}

/// Best-effort absolute path that does not require the path to exist.
pub fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
