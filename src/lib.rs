// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) wires these modules together and runs the interactive menu.
//
// Module responsibilities:
// - `config`: settings read from environment variables (binary name,
//   output folder, history file, User-Agent).
// - `history`: the append-only JSON-lines download log.
// - `theme`: fire / stealth palettes.
// - `clipboard`: best-effort OS clipboard access.
// - `fetcher`: the narrow "media fetcher" seam and its yt-dlp process
//   implementation.
// - `download`: URL check, quality presets and the download orchestration.
// - `system`: locating/updating yt-dlp, probing ffmpeg, opening folders.
// - `session`: in-memory session state and menu commands.
// - `ui`: screen rendering and the interactive loop.
//
// Everything that touches the network or the OS sits behind `fetcher`,
// `clipboard` and `system`, so the orchestration can be tested with fakes.
pub mod clipboard;
pub mod config;
pub mod download;
pub mod fetcher;
pub mod history;
pub mod session;
pub mod system;
pub mod theme;
pub mod ui;
