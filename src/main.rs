// Entrypoint for the CLI application.
// - Keeps `main` small: load settings, make sure yt-dlp exists, build the
//   session collaborators and hand them to the UI loop.
// - Returns `anyhow::Result` so a failed yt-dlp install ends the process
//   with a readable message.

use tiktok_dl_cli::{
    clipboard::SystemClipboard,
    config::Settings,
    download::Downloader,
    fetcher::YtDlp,
    history::HistoryStore,
    system,
    ui::main_menu,
};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr and stay quiet unless `TIKTOK_DL_LOG` asks for more,
    // so they never tear the menu screen.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TIKTOK_DL_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env()?;
    let program = system::ensure_downloader(&settings.ytdlp)?;
    tracing::info!(program = %program.display(), "using yt-dlp");

    let downloader = Downloader::new(
        YtDlp::new(program.clone()),
        SystemClipboard::new(),
        HistoryStore::new(&settings.history_file),
        settings.user_agent.clone(),
    );

    // Start the interactive menu. This call blocks until the user exits.
    main_menu(&settings, &program, downloader)?;
    Ok(())
}
