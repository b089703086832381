// UI layer: draws the menu screen and runs the numbered-command loop.
// Prompts use `dialoguer`, colors and screen clearing use `crossterm`.
// Every handler is synchronous: it takes the session state, performs one
// action and returns the updated state for the next redraw.

use crate::clipboard::Clipboard;
use crate::config::{normalize_path, Settings, APP_NAME, APP_VERSION};
use crate::download::{
    is_tiktok_url, validate_url, DownloadOutcome, Downloader, Quality, UrlRejection,
};
use crate::fetcher::MediaFetcher;
use crate::history::DEFAULT_VIEW_LIMIT;
use crate::session::{Command, SessionState, Status, Transition};
use crate::system;
use crate::theme::Palette;
use anyhow::Result;
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::{Color, Stylize};
use crossterm::terminal::{Clear, ClearType};
use dialoguer::{Confirm, Input};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const NOKKY: [&str; 6] = [
    "███╗   ██╗ ██████╗ ██╗  ██╗██╗  ██╗██╗   ██╗",
    "████╗  ██║██╔═══██╗██║ ██╔╝██║ ██╔╝╚██╗ ██╔╝",
    "██╔██╗ ██║██║   ██║█████╔╝ █████╔╝  ╚████╔╝",
    "██║╚██╗██║██║   ██║██╔═██╗ ██╔═██╗   ╚██╔╝",
    "██║ ╚████║╚██████╔╝██║  ██╗██║  ██╗   ██║",
    "╚═╝  ╚═══╝ ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝   ╚═╝",
];

const TIKTOK: [&str; 6] = [
    "████████╗██╗██╗  ██╗████████╗ ██████╗ ██╗  ██╗",
    "╚══██╔══╝██║██║ ██╔╝╚══██╔══╝██╔═══██╗██║ ██╔╝",
    "   ██║   ██║█████╔╝    ██║   ██║   ██║█████╔╝",
    "   ██║   ██║██╔═██╗    ██║   ██║   ██║██╔═██╗",
    "   ██║   ██║██║  ██╗   ██║   ╚██████╔╝██║  ██╗",
    "   ╚═╝   ╚═╝╚═╝  ╚═╝   ╚═╝    ╚═════╝ ╚═╝  ╚═╝",
];

const DOWNLOADER: [&str; 6] = [
    "██████╗  ██████╗ ██╗    ██╗███╗   ██╗██╗      ██████╗  █████╗ ██████╗ ███████╗██████╗",
    "██╔══██╗██╔═══██╗██║    ██║████╗  ██║██║     ██╔═══██╗██╔══██╗██╔══██╗██╔════╝██╔══██╗",
    "██║  ██║██║   ██║██║ █╗ ██║██╔██╗ ██║██║     ██║   ██║███████║██║  ██║█████╗  ██████╔╝",
    "██║  ██║██║   ██║██║███╗██║██║╚██╗██║██║     ██║   ██║██╔══██║██║  ██║██╔══╝  ██╔══██╗",
    "██████╔╝╚██████╔╝╚███╔███╔╝██║ ╚████║███████╗╚██████╔╝██║  ██║██████╔╝███████╗██║  ██║",
    "╚═════╝  ╚═════╝  ╚══╝╚══╝ ╚═╝  ╚═══╝╚══════╝ ╚═════╝ ╚═╝  ╚═╝╚═════╝ ╚══════╝╚═╝  ╚═╝",
];

const MENU_ITEMS: [&str; 6] = [
    "[1] - Download a TikTok video",
    "[2] - Change output folder",
    "[3] - View download history",
    "[4] - Toggle stealth mode",
    "[5] - Update yt-dlp",
    "[6] - Exit",
];

const PANEL: &str = "                      ";

fn paint(text: impl AsRef<str>, color: Color) -> String {
    format!("{}", text.as_ref().with(color))
}

/// The OS user name shown in the welcome line.
pub fn safe_username() -> String {
    ["USERNAME", "USER"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "User".to_string())
}

/// Build the whole menu screen as one string. Pure: no terminal access.
pub fn render_menu(state: &SessionState, user: &str) -> String {
    let p = state.theme.palette();
    let g = p.gradient;
    let mut lines: Vec<String> = vec![String::new()];

    for (i, row) in NOKKY.iter().enumerate() {
        lines.push(format!("{:39}{}", "", paint(row, g[i])));
    }
    lines.push(String::new());
    for (i, row) in TIKTOK.iter().enumerate() {
        lines.push(format!("{:37}{}", "", paint(row, g[i])));
    }
    lines.push(String::new());
    // The bottom banner runs the gradient in reverse.
    for (i, row) in DOWNLOADER.iter().enumerate() {
        lines.push(format!("{:17}{}", "", paint(row, g[5 - i])));
    }
    lines.push(String::new());

    let badge_edge = "═".repeat(19);
    let badges = [
        format!("╔{badge_edge}╗    ╔{badge_edge}╗    ╔{badge_edge}╗"),
        format!("║ Created By @Nokky ║    ║ TikTok DL v{APP_VERSION:<6} ║    ║ This Tool Is Free ║"),
        format!("╚{badge_edge}╝    ╚{badge_edge}╝    ╚{badge_edge}╝"),
    ];
    for row in badges {
        lines.push(format!("{:23}{}", "", paint(row, p.badge)));
    }
    lines.push(String::new());

    for row in [
        format!("Welcome to {APP_NAME} {user}!"),
        "Note: Only download content you have rights to. Educational use only.".to_string(),
        format!("Status: {}", state.status),
        format!("Theme: {}", state.theme.name()),
    ] {
        lines.push(format!("{PANEL}{}", paint(row, p.text)));
    }

    let wide = "═".repeat(69);
    let narrow = "═".repeat(36);
    let mut frame = vec![
        format!("╔{wide}╗"),
        format!("║{:69}║", ""),
        format!("║{:22}╔{narrow}╗{:9}║", "", ""),
    ];
    for item in MENU_ITEMS {
        frame.push(format!("║{:22}║ {item:<35}║{:9}║", "", ""));
    }
    frame.extend([
        format!("║{:22}╚{narrow}╝{:9}║", "", ""),
        format!("║{:69}║", ""),
        format!("╠{wide}╝"),
        "║".to_string(),
        format!("╠   Output Folder: {}", state.output_dir.display()),
        "║".to_string(),
    ]);
    for row in frame {
        lines.push(format!("{PANEL}{}", paint(row, p.border)));
    }

    lines.join("\n")
}

fn draw_menu(out: &mut impl Write, state: &SessionState, user: &str) -> Result<()> {
    execute!(out, Clear(ClearType::All), MoveTo(0, 0))?;
    writeln!(out, "{}", render_menu(state, user))?;
    out.flush()?;
    Ok(())
}

/// Source of user answers. The terminal implementation uses dialoguer;
/// tests script the answers.
pub trait Prompt {
    /// One line of free text, trimmed. Empty input is allowed.
    fn line(&mut self, prompt: &str) -> Result<String>;
    /// Yes/no question with a default for a bare Enter.
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;
}

/// Interactive prompts on the controlling terminal.
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn line(&mut self, prompt: &str) -> Result<String> {
        let line: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(line.trim().to_string())
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        let answer = Confirm::new().with_prompt(prompt).default(default).interact()?;
        Ok(answer)
    }
}

fn pause(prompt: &mut impl Prompt, p: &Palette, message: &str) -> Result<()> {
    prompt.line(&paint(format!("  {message}"), p.text))?;
    Ok(())
}

/// Main interactive menu on the terminal. Blocks until the user exits.
pub fn main_menu<F: MediaFetcher, C: Clipboard>(
    settings: &Settings,
    program: &Path,
    downloader: Downloader<F, C>,
) -> Result<()> {
    run_session(settings, program, downloader, &mut TerminalPrompt, &mut io::stdout())?;
    Ok(())
}

/// The command loop: draw, read one command, run it, repeat. Returns the
/// state at exit.
pub fn run_session<F: MediaFetcher, C: Clipboard>(
    settings: &Settings,
    program: &Path,
    mut downloader: Downloader<F, C>,
    prompt: &mut impl Prompt,
    screen: &mut impl Write,
) -> Result<SessionState> {
    let user = safe_username();
    let mut state = SessionState::new(settings.output_dir.clone());

    loop {
        draw_menu(screen, &state, &user)?;
        let p = state.theme.palette();
        let input = prompt.line(&paint(format!("{PANEL}╠   Please enter a command"), p.border))?;
        let command = Command::parse(&input);
        tracing::debug!(?command, "menu command");

        let transition = match command {
            Command::Download => {
                Transition::Continue(handle_download(state, &mut downloader, prompt)?)
            }
            Command::ChangeFolder => {
                Transition::Continue(change_folder(state, &settings.program_dir, prompt)?)
            }
            Command::ViewHistory => Transition::Continue(view_history(state, &downloader, prompt)?),
            Command::ToggleTheme => {
                let toggled = state.toggle_theme().with_status(Status::ThemeToggled);
                tracing::debug!(theme = toggled.theme.name(), "theme toggled");
                Transition::Continue(toggled)
            }
            Command::UpdateTool => Transition::Continue(update_tool(state, program, prompt)?),
            Command::Exit => {
                println!("\n{}\n", paint("  Later!", p.text));
                Transition::Exit(state)
            }
            Command::Invalid(_) => {
                println!("\n{}\n", paint("  [!] Invalid option. Pick 1-6.", p.alert()));
                pause(prompt, &p, "Press Enter to continue...")?;
                Transition::Continue(state.with_status(Status::InvalidOption))
            }
        };

        match transition {
            Transition::Continue(next) => state = next,
            Transition::Exit(last) => return Ok(last),
        }
    }
}

/// URL → quality → download. Rejected input skips straight to the pause.
fn handle_download<F: MediaFetcher, C: Clipboard>(
    state: SessionState,
    downloader: &mut Downloader<F, C>,
    prompt: &mut impl Prompt,
) -> Result<SessionState> {
    let p = state.theme.palette();
    let mut status = Status::Ready;

    if let Some(url) = prompt_url(downloader.clipboard(), prompt, &p)? {
        let quality = choose_quality(prompt, &p, downloader.audio_toolchain_available())?;
        let outcome = downloader.download(&url, &state.output_dir, quality, &p);
        tracing::debug!(?outcome, "download handled");
        status = match outcome {
            DownloadOutcome::Completed { .. } => Status::Downloaded,
            DownloadOutcome::Failed { .. } | DownloadOutcome::MissingAudioToolchain => {
                Status::DownloadFailed
            }
        };
    }

    pause(prompt, &p, "Press Enter to return to menu...")?;
    Ok(state.with_status(status))
}

/// Offer a TikTok URL found on the clipboard, otherwise ask for one.
/// Returns `None` for empty or non-TikTok input.
pub fn prompt_url(
    clipboard: &mut impl Clipboard,
    prompt: &mut impl Prompt,
    p: &Palette,
) -> Result<Option<String>> {
    if let Some(clip) = clipboard.read_text().filter(|c| is_tiktok_url(c)) {
        println!("\n{} {clip}", paint("  Clipboard URL detected:", p.accent()));
        if prompt.confirm(&paint("  Use clipboard URL?", p.text), true)? {
            return Ok(Some(clip));
        }
    }

    println!("{}", paint(format!("{PANEL}╠   Paste the TikTok video URL below:"), p.text));
    let typed = prompt.line(&paint("  >", p.text))?;
    match validate_url(&typed) {
        Ok(url) => Ok(Some(url)),
        Err(UrlRejection::Empty) => {
            println!("\n{}\n", paint("  [!] No URL entered.", p.alert()));
            Ok(None)
        }
        Err(UrlRejection::NotTikTok) => {
            println!(
                "\n{}\n",
                paint("  [!] That doesn't look like a TikTok URL. Try again.", p.alert())
            );
            Ok(None)
        }
    }
}

fn choose_quality(prompt: &mut impl Prompt, p: &Palette, audio_available: bool) -> Result<Quality> {
    println!("\n{}", paint("  Choose quality:", p.text));
    if !audio_available {
        println!(
            "{}",
            paint("  [!] FFmpeg not found, audio-only will fail until you install it.", p.alert())
        );
    }
    for (i, q) in Quality::ALL.iter().enumerate() {
        println!("{} {}", paint(format!("  [{}]", i + 1), p.border), q.menu_label());
    }
    let choice = prompt.line(&paint("  >", p.text))?;
    Ok(Quality::from_choice(&choice))
}

fn change_folder(
    state: SessionState,
    program_dir: &Path,
    prompt: &mut impl Prompt,
) -> Result<SessionState> {
    let p = state.theme.palette();
    let mut state = state.with_status(Status::Ready);

    println!(
        "\n{} {}",
        paint("  Current folder:", p.text),
        paint(state.output_dir.display().to_string(), p.accent())
    );
    let typed = prompt.line(&paint(
        "  Enter new folder path (or press Enter to keep current)",
        p.text,
    ))?;

    let new_dir = normalize_path(&typed, program_dir);
    if !new_dir.as_os_str().is_empty() {
        match std::fs::create_dir_all(&new_dir) {
            Ok(()) => {
                println!(
                    "\n{} {}\n",
                    paint("  [+] Output folder set to:", p.accent()),
                    new_dir.display()
                );
                state.output_dir = new_dir;
                state.status = Status::FolderChanged;
            }
            Err(e) => {
                println!(
                    "\n{}\n",
                    paint(format!("  [!] Could not create {}: {e}", new_dir.display()), p.alert())
                );
            }
        }
    }

    pause(prompt, &p, "Press Enter to return to menu...")?;
    Ok(state)
}

fn view_history<F: MediaFetcher, C: Clipboard>(
    state: SessionState,
    downloader: &Downloader<F, C>,
    prompt: &mut impl Prompt,
) -> Result<SessionState> {
    let p = state.theme.palette();
    let items = downloader.history().read(DEFAULT_VIEW_LIMIT);

    if items.is_empty() {
        println!("\n{}\n", paint("  No history yet.", p.text));
    } else {
        println!("\n{}\n", paint(format!("  Last {} downloads:", items.len()), p.accent()));
        for (i, it) in items.iter().rev().enumerate() {
            println!(
                "{} {} | {} | {}",
                paint(format!("  [{:02}]", i + 1), p.border),
                it.human_time(),
                it.status,
                it.quality
            );
            println!("       URL: {}", it.url);
            if let Some(out) = it.output_file() {
                println!("       OUT: {out}");
            }
            println!();
        }

        if prompt.confirm(&paint("  Open output folder of most recent?", p.text), false)? {
            let most_recent = &items[items.len() - 1];
            let folder = if !most_recent.output_dir.is_empty() {
                Some(PathBuf::from(&most_recent.output_dir))
            } else {
                most_recent.output_file().map(folder_of)
            };
            if let Some(folder) = folder {
                downloader.open_folder(&folder);
            }
        }
    }

    pause(prompt, &p, "Press Enter to return to menu...")?;
    Ok(state.with_status(Status::Ready))
}

/// The folder a history path points at: its parent for files.
fn folder_of(path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_file() {
        path.parent().map(Path::to_path_buf).unwrap_or(path)
    } else {
        path
    }
}

fn update_tool(state: SessionState, program: &Path, prompt: &mut impl Prompt) -> Result<SessionState> {
    let p = state.theme.palette();

    println!("\n{}\n", paint("  Updating yt-dlp...", p.text));
    let status = match system::update_downloader(program) {
        Ok(()) => {
            println!("\n{}\n", paint("  [+] yt-dlp updated.", p.accent()));
            Status::ToolUpdated
        }
        Err(e) => {
            println!("\n{}\n", paint(format!("  [!] Update failed: {e:#}"), p.alert()));
            Status::UpdateFailed
        }
    };

    pause(prompt, &p, "Press Enter to return to menu...")?;
    Ok(state.with_status(status))
}
