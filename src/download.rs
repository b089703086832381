// Download orchestration: URL check, quality presets, and the single
// download attempt that ties the fetcher, history, clipboard and folder
// opener together. Output goes straight to the terminal with the active
// palette; progress is drawn with an indicatif bar.

use crate::clipboard::Clipboard;
use crate::fetcher::{FetchRequest, MediaFetcher, ProgressEvent};
use crate::history::{HistoryEntry, HistoryStore};
use crate::system;
use crate::theme::Palette;
use crossterm::style::Stylize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const TIKTOK_HOSTS: [&str; 3] = ["tiktok.com", "vm.tiktok", "vt.tiktok"];

/// Loose TikTok check: the URL only has to mention one of the known hosts.
pub fn is_tiktok_url(input: &str) -> bool {
    let s = input.trim().to_lowercase();
    TIKTOK_HOSTS.iter().any(|host| s.contains(host))
}

/// Why a typed URL was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlRejection {
    Empty,
    NotTikTok,
}

/// Trim and check a typed URL.
pub fn validate_url(input: &str) -> Result<String, UrlRejection> {
    let url = input.trim();
    if url.is_empty() {
        Err(UrlRejection::Empty)
    } else if !is_tiktok_url(url) {
        Err(UrlRejection::NotTikTok)
    } else {
        Ok(url.to_string())
    }
}

/// The five quality presets offered in the quality prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Best,
    Max1080,
    Max720,
    Max480,
    AudioOnly,
}

impl Quality {
    pub const ALL: [Quality; 5] = [
        Quality::Best,
        Quality::Max1080,
        Quality::Max720,
        Quality::Max480,
        Quality::AudioOnly,
    ];

    /// Map a typed choice (`1`..`5`) to a preset. Anything else is `Best`.
    pub fn from_choice(choice: &str) -> Quality {
        match choice.trim() {
            "2" => Quality::Max1080,
            "3" => Quality::Max720,
            "4" => Quality::Max480,
            "5" => Quality::AudioOnly,
            _ => Quality::Best,
        }
    }

    /// yt-dlp format selector.
    pub fn format_selector(self) -> &'static str {
        match self {
            Quality::Best => "bestvideo+bestaudio/best",
            Quality::Max1080 => "bv*[height<=1080]+ba/b[height<=1080]/best",
            Quality::Max720 => "bv*[height<=720]+ba/b[height<=720]/best",
            Quality::Max480 => "bv*[height<=480]+ba/b[height<=480]/best",
            Quality::AudioOnly => "bestaudio/best",
        }
    }

    /// Label stored in the history log.
    pub fn label(self) -> &'static str {
        match self {
            Quality::Best => "Best",
            Quality::Max1080 => "Max 1080p",
            Quality::Max720 => "Max 720p",
            Quality::Max480 => "Max 480p",
            Quality::AudioOnly => "Audio only",
        }
    }

    /// Text shown in the quality prompt.
    pub fn menu_label(self) -> &'static str {
        match self {
            Quality::Best => "Best (default)",
            Quality::Max1080 => "1080p max",
            Quality::Max720 => "720p max",
            Quality::Max480 => "480p max",
            Quality::AudioOnly => "Audio only (requires FFmpeg)",
        }
    }

    pub fn is_audio_only(self) -> bool {
        matches!(self, Quality::AudioOnly)
    }
}

/// Result of one download attempt, shared by the history log and the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Completed {
        /// Saved file, when yt-dlp reported one.
        file: Option<PathBuf>,
        elapsed: Duration,
    },
    Failed { reason: String },
    /// Audio-only was requested without ffmpeg; nothing was attempted.
    MissingAudioToolchain,
}

impl DownloadOutcome {
    /// The saved file for a completed download.
    pub fn output_path(&self) -> Option<&Path> {
        match self {
            DownloadOutcome::Completed { file, .. } => file.as_deref(),
            _ => None,
        }
    }
}

/// Runs downloads through a `MediaFetcher` and records them.
///
/// The audio toolchain probe and the folder opener are plain function
/// pointers so tests can swap them out.
pub struct Downloader<F, C> {
    fetcher: F,
    clipboard: C,
    history: HistoryStore,
    user_agent: String,
    has_audio_toolchain: fn() -> bool,
    open_folder: fn(&Path),
}

impl<F: MediaFetcher, C: Clipboard> Downloader<F, C> {
    pub fn new(fetcher: F, clipboard: C, history: HistoryStore, user_agent: String) -> Self {
        Downloader {
            fetcher,
            clipboard,
            history,
            user_agent,
            has_audio_toolchain: system::has_audio_toolchain,
            open_folder: system::open_folder,
        }
    }

    pub fn with_audio_probe(mut self, probe: fn() -> bool) -> Self {
        self.has_audio_toolchain = probe;
        self
    }

    pub fn with_folder_opener(mut self, opener: fn(&Path)) -> Self {
        self.open_folder = opener;
        self
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn clipboard(&mut self) -> &mut C {
        &mut self.clipboard
    }

    pub fn audio_toolchain_available(&self) -> bool {
        (self.has_audio_toolchain)()
    }

    pub fn open_folder(&self, path: &Path) {
        (self.open_folder)(path)
    }

    /// One download attempt. Never retries; every outcome except a missing
    /// audio toolchain is written to the history log.
    pub fn download(
        &mut self,
        url: &str,
        save_dir: &Path,
        quality: Quality,
        palette: &Palette,
    ) -> DownloadOutcome {
        if quality.is_audio_only() && !self.audio_toolchain_available() {
            print_ffmpeg_help(palette);
            return DownloadOutcome::MissingAudioToolchain;
        }

        if let Err(e) = std::fs::create_dir_all(save_dir) {
            let reason = format!("Failed to create {}: {e}", save_dir.display());
            return self.fail(url, save_dir, quality, reason, palette);
        }

        let request = FetchRequest {
            url: url.to_string(),
            output_template: save_dir
                .join("%(uploader)s_%(id)s.%(ext)s")
                .to_string_lossy()
                .into_owned(),
            format: quality.format_selector().to_string(),
            user_agent: self.user_agent.clone(),
            extract_audio: quality.is_audio_only(),
        };
        tracing::info!(url, quality = quality.label(), dir = %save_dir.display(), "download started");

        let started = Instant::now();
        let mut progress = ProgressLine::new(palette);
        let result = self.fetcher.fetch(&request, &mut |event: ProgressEvent| progress.update(&event));
        let last_file = progress.finish();

        match result {
            Ok(()) => {
                let file = last_file.map(|f| crate::config::absolute(&f));
                self.succeed(url, save_dir, quality, file, started.elapsed(), palette)
            }
            Err(e) => self.fail(url, save_dir, quality, format!("{e:#}"), palette),
        }
    }

    fn succeed(
        &mut self,
        url: &str,
        save_dir: &Path,
        quality: Quality,
        file: Option<PathBuf>,
        elapsed: Duration,
        palette: &Palette,
    ) -> DownloadOutcome {
        let accent = palette.accent();
        println!();
        println!("{}", format!("  [+] Done in {:.1}s.", elapsed.as_secs_f64()).with(accent));
        if let Some(f) = &file {
            println!("{} {}", "  [+] Saved file:".with(accent), f.display());
        }
        println!("{} {}\n", "  [+] Output folder:".with(accent), save_dir.display());
        tracing::info!(url, file = ?file, "download finished");

        self.history
            .append(&HistoryEntry::success(url, quality.label(), file.as_deref(), save_dir));

        let to_copy = file.as_deref().unwrap_or(save_dir).display().to_string();
        if self.clipboard.write_text(&to_copy) {
            println!("{}\n", format!("  (Copied to clipboard) {to_copy}").with(palette.text));
        }

        self.open_folder(save_dir);
        DownloadOutcome::Completed { file, elapsed }
    }

    fn fail(
        &mut self,
        url: &str,
        save_dir: &Path,
        quality: Quality,
        reason: String,
        palette: &Palette,
    ) -> DownloadOutcome {
        println!("\n{}\n", format!("  [!] Download failed: {reason}").with(palette.alert()));
        println!(
            "{}\n",
            "      Tip: Make sure the URL is correct and the account is public.".with(palette.text)
        );
        tracing::warn!(url, %reason, "download failed");

        self.history
            .append(&HistoryEntry::failure(url, quality.label(), save_dir, &reason));
        DownloadOutcome::Failed { reason }
    }
}

/// Install guidance shown when audio-only is picked without ffmpeg.
pub fn print_ffmpeg_help(palette: &Palette) {
    let alert = palette.alert();
    let text = palette.text;
    let border = palette.border;
    println!("\n{}", "  [!] Audio-only requires FFmpeg (ffmpeg + ffprobe).".with(alert));
    println!("{}\n", "      Install it, then restart the terminal.".with(text));
    println!("{}", "      Install:".with(border));
    for hint in system::ffmpeg_install_hints() {
        println!("{}", format!("      {hint}").with(text));
    }
    println!();
    println!("{}", "      Check it works:".with(border));
    println!("{}", "      ffmpeg -version".with(text));
    println!("{}\n", "      ffprobe -version".with(text));
}

/// The single overwritten progress line. A new bar is started for each
/// file yt-dlp transfers (video and audio streams come separately). When
/// the size is unknown the line shows a spinner and a byte count instead
/// of a percentage.
struct ProgressLine {
    bar: Option<ProgressBar>,
    sized: ProgressStyle,
    r#unsized: ProgressStyle,
    finished_line: String,
    last_file: Option<String>,
}

impl ProgressLine {
    fn new(palette: &Palette) -> Self {
        let sized = ProgressStyle::with_template("  Downloading... {percent:>3}% [{bar:30}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        let r#unsized = ProgressStyle::with_template("  Downloading... {spinner} {bytes} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        ProgressLine {
            bar: None,
            sized,
            r#unsized,
            finished_line: format!(
                "{}",
                "  [+] Download finished. Processing...".with(palette.accent())
            ),
            last_file: None,
        }
    }

    fn update(&mut self, event: &ProgressEvent) {
        if let Some(name) = event.filename() {
            self.last_file = Some(name.to_string());
        }
        match event {
            ProgressEvent::Downloading {
                downloaded,
                total,
                speed,
                eta,
                ..
            } => {
                let bar = self.bar_for(*total);
                if let Some(total) = total {
                    bar.set_length((*total).max(*downloaded));
                } else if let Some(len) = bar.length() {
                    // Size dropped out mid-transfer; keep the last known one.
                    bar.set_length(len.max(*downloaded));
                }
                bar.set_position(*downloaded);
                bar.set_message(rate_and_eta(*speed, *eta));
            }
            ProgressEvent::Finished { .. } => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_and_clear();
                }
                println!("{}", self.finished_line);
            }
            ProgressEvent::Saved { .. } => {}
        }
    }

    /// The live bar, started or swapped to a sized one once a total shows up.
    fn bar_for(&mut self, total: Option<u64>) -> &ProgressBar {
        let needs_sized = total.is_some() && self.bar.as_ref().map_or(true, |b| b.length().is_none());
        if needs_sized {
            if let Some(spinner) = self.bar.take() {
                spinner.finish_and_clear();
            }
            let bar = ProgressBar::new(0);
            bar.set_style(self.sized.clone());
            self.bar = Some(bar);
        }
        let r#unsized = &self.r#unsized;
        self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(r#unsized.clone());
            bar
        })
    }

    /// Clear any live bar and hand back the last filename seen.
    fn finish(mut self) -> Option<PathBuf> {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        self.last_file.map(PathBuf::from)
    }
}

/// `1.25 MiB/s | ETA   3s`
pub fn rate_and_eta(speed: Option<f64>, eta: Option<u64>) -> String {
    let mib = speed.unwrap_or(0.0) / 1024.0 / 1024.0;
    format!("{mib:.2} MiB/s | ETA {:>3}s", eta.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::Theme;
    use anyhow::bail;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use tempfile::tempdir;

    /// Fetcher double that replays scripted events and counts calls.
    struct FakeFetcher {
        events: Vec<ProgressEvent>,
        error: Option<String>,
        calls: Rc<Cell<usize>>,
        last_request: Rc<RefCell<Option<FetchRequest>>>,
    }

    impl FakeFetcher {
        fn new(events: Vec<ProgressEvent>, error: Option<&str>) -> Self {
            FakeFetcher {
                events,
                error: error.map(str::to_string),
                calls: Rc::new(Cell::new(0)),
                last_request: Rc::new(RefCell::new(None)),
            }
        }
    }

    impl MediaFetcher for FakeFetcher {
        fn fetch(
            &self,
            request: &FetchRequest,
            on_progress: &mut dyn FnMut(ProgressEvent),
        ) -> anyhow::Result<()> {
            self.calls.set(self.calls.get() + 1);
            *self.last_request.borrow_mut() = Some(request.clone());
            for e in &self.events {
                on_progress(e.clone());
            }
            match &self.error {
                Some(msg) => bail!("{msg}"),
                None => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct FakeClipboard {
        copied: Vec<String>,
    }

    impl Clipboard for FakeClipboard {
        fn read_text(&mut self) -> Option<String> {
            None
        }

        fn write_text(&mut self, text: &str) -> bool {
            self.copied.push(text.to_string());
            true
        }
    }

    fn no_open(_: &Path) {}

    fn downloader(fetcher: FakeFetcher, dir: &Path) -> Downloader<FakeFetcher, FakeClipboard> {
        Downloader::new(
            fetcher,
            FakeClipboard::default(),
            HistoryStore::new(dir.join("history.jsonl")),
            "UA".into(),
        )
        .with_audio_probe(|| true)
        .with_folder_opener(no_open)
    }

    #[test]
    fn url_check_is_a_loose_substring_match() {
        assert!(is_tiktok_url("https://www.TikTok.com/@a/video/1"));
        assert!(is_tiktok_url("  https://vm.tiktok.com/ZM123/ "));
        assert!(is_tiktok_url("vt.tiktok.com/abc"));
        assert!(!is_tiktok_url("https://youtube.com/watch?v=1"));
        assert!(!is_tiktok_url(""));
    }

    #[test]
    fn non_tiktok_urls_are_rejected() {
        assert_eq!(validate_url("https://example.com/video"), Err(UrlRejection::NotTikTok));
        assert_eq!(validate_url("   "), Err(UrlRejection::Empty));
        assert_eq!(
            validate_url(" https://tiktok.com/a "),
            Ok("https://tiktok.com/a".to_string())
        );
    }

    #[test]
    fn choices_map_to_presets() {
        assert_eq!(Quality::from_choice("1"), Quality::Best);
        assert_eq!(Quality::from_choice(""), Quality::Best);
        assert_eq!(Quality::from_choice("9"), Quality::Best);
        assert_eq!(Quality::from_choice(" 3 "), Quality::Max720);
        assert_eq!(Quality::from_choice("5").format_selector(), "bestaudio/best");
        assert_eq!(
            Quality::Max1080.format_selector(),
            "bv*[height<=1080]+ba/b[height<=1080]/best"
        );
        assert_eq!(Quality::Max480.label(), "Max 480p");
    }

    #[test]
    fn audio_without_toolchain_never_calls_the_fetcher() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::new(vec![], None);
        let calls = fetcher.calls.clone();
        let mut dl = downloader(fetcher, dir.path()).with_audio_probe(|| false);

        let outcome = dl.download(
            "https://tiktok.com/a",
            &dir.path().join("out"),
            Quality::from_choice("5"),
            &Theme::Fire.palette(),
        );

        assert_eq!(outcome, DownloadOutcome::MissingAudioToolchain);
        assert_eq!(outcome.output_path(), None);
        assert_eq!(calls.get(), 0);
        assert!(dl.history().read(10).is_empty());
    }

    #[test]
    fn success_records_history_and_copies_the_last_filename() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let file = out.join("someone_1.mp4");
        let events = vec![
            ProgressEvent::Downloading {
                downloaded: 10,
                total: Some(100),
                speed: Some(1024.0),
                eta: Some(1),
                filename: Some(out.join("someone_1.f1.mp4").display().to_string()),
            },
            ProgressEvent::Finished {
                filename: Some(out.join("someone_1.f1.mp4").display().to_string()),
            },
            ProgressEvent::Saved {
                filename: file.display().to_string(),
            },
        ];
        let fetcher = FakeFetcher::new(events, None);
        let request = fetcher.last_request.clone();
        let mut dl = downloader(fetcher, dir.path());

        let outcome = dl.download("https://tiktok.com/a", &out, Quality::Max720, &Theme::Fire.palette());

        assert_eq!(outcome.output_path(), Some(file.as_path()));
        assert!(out.is_dir());

        let req = request.borrow().clone().unwrap();
        assert_eq!(req.format, Quality::Max720.format_selector());
        assert!(req.output_template.ends_with("%(uploader)s_%(id)s.%(ext)s"));
        assert_eq!(req.user_agent, "UA");
        assert!(!req.extract_audio);

        let history = dl.history().read(10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].url, "https://tiktok.com/a");
        assert_eq!(history[0].quality, "Max 720p");
        assert_eq!(history[0].output_file(), Some(file.display().to_string().as_str()));
        assert_eq!(dl.clipboard().copied, [file.display().to_string()]);
    }

    #[test]
    fn success_without_filename_copies_the_folder() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let mut dl = downloader(FakeFetcher::new(vec![], None), dir.path());

        let outcome = dl.download("https://tiktok.com/a", &out, Quality::Best, &Theme::Stealth.palette());

        assert!(matches!(outcome, DownloadOutcome::Completed { file: None, .. }));
        assert_eq!(dl.clipboard().copied, [out.display().to_string()]);
        assert_eq!(dl.history().read(1)[0].output_file(), None);
    }

    #[test]
    fn failure_is_logged_with_the_error_text() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let fetcher = FakeFetcher::new(vec![], Some("Unable to extract video data"));
        let calls = fetcher.calls.clone();
        let mut dl = downloader(fetcher, dir.path());

        let outcome = dl.download("https://tiktok.com/b", &out, Quality::AudioOnly, &Theme::Fire.palette());

        assert_eq!(
            outcome,
            DownloadOutcome::Failed {
                reason: "Unable to extract video data".into()
            }
        );
        assert_eq!(calls.get(), 1);
        assert!(dl.clipboard().copied.is_empty());

        let history = dl.history().read(10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, crate::history::EntryStatus::Failed);
        assert_eq!(history[0].error.as_deref(), Some("Unable to extract video data"));
        assert_eq!(history[0].quality, "Audio only");
    }

    #[test]
    fn rate_line_formats_mib_and_eta() {
        assert_eq!(rate_and_eta(Some(1.5 * 1024.0 * 1024.0), Some(7)), "1.50 MiB/s | ETA   7s");
        assert_eq!(rate_and_eta(None, None), "0.00 MiB/s | ETA   0s");
    }

    #[test]
    fn unknown_size_shows_a_byte_count_not_a_percentage() {
        let mut line = ProgressLine::new(&Theme::Fire.palette());
        let downloading = |downloaded, total| ProgressEvent::Downloading {
            downloaded,
            total,
            speed: None,
            eta: None,
            filename: Some("/out/a_1.mp4".into()),
        };

        line.update(&downloading(4096, None));
        let bar = line.bar.as_ref().unwrap();
        assert_eq!(bar.length(), None);
        assert_eq!(bar.position(), 4096);

        line.update(&downloading(8192, Some(16384)));
        let bar = line.bar.as_ref().unwrap();
        assert_eq!(bar.length(), Some(16384));
        assert_eq!(bar.position(), 8192);

        line.update(&downloading(20000, None));
        assert_eq!(line.bar.as_ref().unwrap().length(), Some(20000));

        assert_eq!(line.finish(), Some(PathBuf::from("/out/a_1.mp4")));
    }
}
