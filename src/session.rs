// Session state and menu commands. The state lives only as long as the
// process; handlers in `ui` take it by value and hand back the updated copy.

use crate::theme::Theme;
use std::fmt;
use std::path::PathBuf;

/// Outcome of the last command, shown on the next menu redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Ready,
    Downloaded,
    DownloadFailed,
    FolderChanged,
    ThemeToggled,
    ToolUpdated,
    UpdateFailed,
    InvalidOption,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Ready => "Ready",
            Status::Downloaded => "Download complete",
            Status::DownloadFailed => "Download failed",
            Status::FolderChanged => "Output folder changed",
            Status::ThemeToggled => "Theme toggled",
            Status::ToolUpdated => "yt-dlp updated",
            Status::UpdateFailed => "yt-dlp update failed",
            Status::InvalidOption => "Invalid option",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub output_dir: PathBuf,
    pub theme: Theme,
    pub status: Status,
}

impl SessionState {
    pub fn new(output_dir: PathBuf) -> Self {
        SessionState {
            output_dir,
            theme: Theme::default(),
            status: Status::Ready,
        }
    }

    pub fn with_status(self, status: Status) -> Self {
        SessionState { status, ..self }
    }

    /// Flip between the fire and stealth themes.
    pub fn toggle_theme(self) -> Self {
        SessionState {
            theme: self.theme.toggled(),
            ..self
        }
    }
}

/// One menu command, parsed from a line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Download,
    ChangeFolder,
    ViewHistory,
    ToggleTheme,
    UpdateTool,
    Exit,
    Invalid(String),
}

impl Command {
    pub fn parse(input: &str) -> Command {
        match input.trim() {
            "1" => Command::Download,
            "2" => Command::ChangeFolder,
            "3" => Command::ViewHistory,
            "4" => Command::ToggleTheme,
            "5" => Command::UpdateTool,
            "6" => Command::Exit,
            other => Command::Invalid(other.to_string()),
        }
    }
}

/// What the loop does after a command. Both variants hand the state back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Continue(SessionState),
    Exit(SessionState),
}
