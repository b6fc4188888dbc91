use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use anyhow::Context;
use crossterm::terminal;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use tonelab::audio;
use tonelab::middle::Middle;
use tonelab::shared::InputEvent;
use tonelab::tui;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// the terminal belongs to the TUI, so log lines go to a file next to the recordings
fn init_logging(out_dir: &Path) -> anyhow::Result<()> {
    let path = out_dir.join("tonelab.log");
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let out_dir: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    init_logging(&out_dir)?;

    // no device is not fatal: the balls still bounce, nothing sounds
    let mut audio = match audio::start_audio() {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::warn!("audio unavailable, running silent: {e:#}");
            None
        }
    };
    let mut middle = Middle::new();
    if audio.is_none() {
        middle.set_status("no audio device, running silent");
    }

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope
    crossterm::execute!(std::io::stdout(), crossterm::event::EnableMouseCapture)?;

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = Duration::from_millis(16); // ~60fps
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        // Sync readiness from engine → middle → display; middle owns the recording flag
        middle.set_chain_ready(audio.as_ref().is_some_and(|a| a.is_ready()));
        let ds = middle.display_state();
        let spectrum = audio.as_mut().map(|a| a.spectrum()).unwrap_or_default();

        term.draw(|frame| {
            let canvas = tui::view::render(frame, frame.area(), &ds, &spectrum);
            tui_state.canvas_area = Some(canvas);
        })?;

        let events = tui::input::poll_input(tick_rate, &tui_state)?;
        for event in events {
            if event == InputEvent::Quit {
                if let Some(cmd) = middle.stop_recording() {
                    log::info!("quit while recording, take discarded");
                    send(&audio, cmd);
                }
                drop(term);
                drop(audio);
                return Ok(());
            }
            for cmd in middle.handle_input(event) {
                send(&audio, cmd);
            }
        }

        // Check if a recording just finished; save the WAV to the output dir
        if let Some(dropped) = audio.as_ref().map(|a| a.take_dropped_capture()) {
            middle.note_dropped_capture(dropped);
        }
        if let Some(captured) = audio.as_mut().and_then(|a| a.poll_completed_recording()) {
            if let Some(done) = middle.on_recording_complete(&captured, SystemTime::now()) {
                match save_recording(&out_dir, &done.filename, &done.bytes) {
                    Ok(path) => {
                        log::info!("saved {}", path.display());
                        middle.set_status(format!("saved {}", path.display()));
                    }
                    Err(e) => {
                        log::error!("could not save recording: {e:#}");
                        middle.set_status(format!("save failed: {e}"));
                    }
                }
            }
        }

        for cmd in middle.tick(Instant::now()) {
            send(&audio, cmd);
        }
    }
}

fn send(audio: &Option<audio::AudioHandle>, cmd: tonelab::audio_api::AudioCommand) {
    if let Some(a) = audio {
        a.send(cmd);
    }
}

// ':' isn't allowed in filenames everywhere
fn save_recording(dir: &Path, filename: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    let path = dir.join(filename.replace(':', "-"));
    std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(std::io::stdout(), crossterm::event::DisableMouseCapture);
        let _ = terminal::disable_raw_mode();
    }
}
