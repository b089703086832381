// Media fetcher: the seam between the orchestration logic and the actual
// downloader. `YtDlp` runs the yt-dlp executable and turns its
// machine-readable progress lines into `ProgressEvent`s.

use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

/// Everything the downloader needs for one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    /// Output path template, e.g. `/out/%(uploader)s_%(id)s.%(ext)s`.
    pub output_template: String,
    /// yt-dlp format selector.
    pub format: String,
    pub user_agent: String,
    /// Convert the result to mp3 after download (needs ffmpeg).
    pub extract_audio: bool,
}

/// Progress reported while a request runs. Fields are `None` when the
/// downloader does not know them.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Downloading {
        downloaded: u64,
        total: Option<u64>,
        /// Bytes per second.
        speed: Option<f64>,
        /// Seconds remaining.
        eta: Option<u64>,
        filename: Option<String>,
    },
    /// A file finished transferring; post-processing may follow.
    Finished { filename: Option<String> },
    /// Final location after all post-processing and moves.
    Saved { filename: String },
}

impl ProgressEvent {
    pub fn filename(&self) -> Option<&str> {
        match self {
            ProgressEvent::Downloading { filename, .. } | ProgressEvent::Finished { filename } => {
                filename.as_deref()
            }
            ProgressEvent::Saved { filename } => Some(filename),
        }
    }
}

/// Anything that can fetch media for a request, reporting progress as it
/// goes. An `Err` carries the reason the download failed.
pub trait MediaFetcher {
    fn fetch(&self, request: &FetchRequest, on_progress: &mut dyn FnMut(ProgressEvent)) -> Result<()>;
}

const PROGRESS_TAG: &str = "[tiktok-dl:progress]";
const SAVED_TAG: &str = "[tiktok-dl:saved]";

/// yt-dlp process runner.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        YtDlp { program: program.into() }
    }

    /// Command-line arguments for a request. The URL goes last, after `--`,
    /// so it is never read as an option.
    pub fn build_args(request: &FetchRequest) -> Vec<String> {
        let mut args: Vec<String> = [
            "--newline",
            "--progress",
            "--no-warnings",
            "--no-simulate",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.push("--progress-template".into());
        args.push(format!(
            "download:{PROGRESS_TAG} %(progress.status)s|%(progress.downloaded_bytes)s|\
             %(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|\
             %(progress.eta)s|%(progress.filename)s"
        ));
        args.push("--print".into());
        args.push(format!("after_move:{SAVED_TAG} %(filepath)s"));

        args.push("-f".into());
        args.push(request.format.clone());
        args.push("-o".into());
        args.push(request.output_template.clone());
        args.push("--add-headers".into());
        args.push(format!("User-Agent:{}", request.user_agent));

        if request.extract_audio {
            args.extend(
                ["-x", "--audio-format", "mp3", "--audio-quality", "0"]
                    .iter()
                    .map(|s| s.to_string()),
            );
        }

        args.push("--".into());
        args.push(request.url.clone());
        args
    }
}

impl MediaFetcher for YtDlp {
    fn fetch(&self, request: &FetchRequest, on_progress: &mut dyn FnMut(ProgressEvent)) -> Result<()> {
        let args = Self::build_args(request);
        tracing::debug!(program = %self.program.display(), ?args, "starting yt-dlp");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program.display()))?;

        // Drain stderr on the side so a chatty child can't block on a full pipe.
        let stderr = child.stderr.take();
        let stderr_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut err) = stderr {
                if let Err(e) = err.read_to_end(&mut buf) {
                    tracing::debug!(error = %e, "reading yt-dlp stderr failed");
                }
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        let pumped = match child.stdout.take() {
            Some(stdout) => pump_events(stdout, on_progress),
            None => Ok(()),
        };
        if pumped.is_err() {
            // Reading stopped early; the child must not outlive us.
            let _ = child.kill();
        }

        // Always reap the child and the stderr thread before reporting.
        let status = child.wait().context("Failed to wait for yt-dlp");
        let stderr_text = stderr_reader.join().unwrap_or_default();
        pumped.context("Failed to read yt-dlp output")?;
        let status = status?;

        if !status.success() {
            match last_error_line(&stderr_text) {
                Some(msg) => bail!("{msg}"),
                None => bail!("yt-dlp exited with {status}"),
            }
        }
        Ok(())
    }
}

/// Feed stdout to `parse_line` one line at a time. Lines are decoded
/// lossily: yt-dlp writes the console code page on Windows, so a
/// non-UTF-8 uploader name must not end the download.
fn pump_events(out: impl Read, on_progress: &mut dyn FnMut(ProgressEvent)) -> io::Result<()> {
    let mut reader = BufReader::new(out);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        match parse_line(&line) {
            Some(event) => on_progress(event),
            None => tracing::trace!(line = %line.trim_end(), "yt-dlp"),
        }
    }
}

/// Parse one stdout line printed through our progress template or the
/// `after_move` print. Anything else yields `None`.
pub fn parse_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(rest) = line.trim_start().strip_prefix(SAVED_TAG) {
        let filename = rest.trim();
        if filename.is_empty() || filename == "NA" {
            return None;
        }
        return Some(ProgressEvent::Saved {
            filename: filename.to_string(),
        });
    }

    let rest = line.trim_start().strip_prefix(PROGRESS_TAG)?.trim_start();
    let fields: Vec<&str> = rest.splitn(7, '|').collect();
    if fields.len() != 7 {
        return None;
    }
    let filename = text_field(fields[6]);
    match fields[0].trim() {
        "downloading" => Some(ProgressEvent::Downloading {
            downloaded: number(fields[1]).map(|n| n as u64).unwrap_or(0),
            total: number(fields[2]).or_else(|| number(fields[3])).map(|n| n as u64),
            speed: number(fields[4]),
            eta: number(fields[5]).map(|n| n as u64),
            filename,
        }),
        "finished" => Some(ProgressEvent::Finished { filename }),
        _ => None,
    }
}

fn number(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|n| n.is_finite() && *n >= 0.0)
}

fn text_field(field: &str) -> Option<String> {
    let field = field.trim();
    if field.is_empty() || field == "NA" {
        None
    } else {
        Some(field.to_string())
    }
}

/// The last `ERROR:` line, without its prefix; otherwise the last
/// non-empty line.
fn last_error_line(stderr: &str) -> Option<String> {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find_map(|l| l.strip_prefix("ERROR:"))
        .map(|l| l.trim().to_string())
        .or_else(|| lines.last().map(|l| l.to_string()))
}
