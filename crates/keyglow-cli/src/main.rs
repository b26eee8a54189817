//! keyglow - play MIDI on a virtual keyboard and export it as video frames.

mod tui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Clear};
use std::io::{self, stdout, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use keyglow_core::{
    build_keyboard, load_performance, AudioEngine, Config, FrameCapture, FrameFormat, JackEngine,
    PngCapture, Rgb, Session, SilentEngine, SvgCapture, TarArchive,
};

#[derive(Parser)]
#[command(name = "keyglow")]
#[command(author, version, about = "MIDI-synchronized keyboard visualization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: ~/.config/keyglow/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Leftmost octave of the keyboard
    #[arg(long, global = true, allow_hyphen_values = true)]
    start_octave: Option<i32>,

    /// Number of octaves on the keyboard
    #[arg(long, global = true)]
    octaves: Option<u32>,

    /// Fill colour of lit keys (#RRGGBB)
    #[arg(long, global = true)]
    highlight: Option<Rgb>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a MIDI or JSON performance on the terminal keyboard
    Play {
        file: PathBuf,

        /// Do not send MIDI to JACK
        #[arg(long)]
        silent: bool,
    },
    /// Export a performance as a tar archive of frames
    Export {
        file: PathBuf,

        /// Output archive (default from config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Frames per second
        #[arg(long)]
        fps: Option<u32>,

        /// Frame image format (png or svg)
        #[arg(long)]
        format: Option<FrameFormat>,
    },
    /// Write the keyboard as an SVG image
    Keyboard {
        #[arg(short, long, default_value = "keyboard.svg")]
        output: PathBuf,
    },
    /// Create a default configuration file
    Init,
    /// Show the configuration file path
    ConfigPath,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // the TUI owns the terminal, so keep logging quiet while it runs
    let default_level = match cli.command {
        Commands::Play { .. } => "warn",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Init => {
            let path = Config::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
            return Ok(());
        }
        Commands::ConfigPath => {
            let path = Config::config_path()?;
            println!("{}", path.display());
            return Ok(());
        }
        _ => {}
    }

    // Load config
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(),
    };

    // Apply CLI overrides
    if let Some(octave) = cli.start_octave {
        config.keyboard.start_octave = octave;
    }
    if let Some(octaves) = cli.octaves {
        config.keyboard.octave_count = octaves;
    }
    if let Some(color) = cli.highlight {
        config.theme.highlight_color = color;
    }

    match cli.command {
        Commands::Play { file, silent } => run_player(config, &file, silent),
        Commands::Export {
            file,
            output,
            fps,
            format,
        } => {
            if let Some(fps) = fps {
                config.export.frame_rate = fps;
            }
            if let Some(format) = format {
                config.export.format = format;
            }
            if let Some(output) = output {
                config.export.output = output;
            }
            run_export(config, &file)
        }
        Commands::Keyboard { output } => {
            let keyboard = build_keyboard(config.layout(), config.label_options())?;
            std::fs::write(&output, keyboard.to_svg())
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Wrote {} keys ({}x{}px) to {}",
                keyboard.keys().len(),
                keyboard.width(),
                keyboard.height(),
                output.display()
            );
            Ok(())
        }
        Commands::Init | Commands::ConfigPath => Ok(()),
    }
}

fn open_session(config: Config, file: &Path) -> Result<Session> {
    let performance = load_performance(file)
        .with_context(|| format!("Failed to load performance from {}", file.display()))?;
    let mut session = Session::new(config)?;
    session.load_performance(performance);
    Ok(session)
}

fn run_export(config: Config, file: &Path) -> Result<()> {
    let output = config.export.output.clone();
    let format = config.export.format;
    let background = config.theme.background_color;
    let mut session = open_session(config, file)?;

    let mut capture: Box<dyn FrameCapture> = match format {
        FrameFormat::Png => Box::new(PngCapture::new(background)),
        FrameFormat::Svg => Box::new(SvgCapture),
    };
    let archive = TarArchive::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let mut stderr = io::stderr();
    let outcome = session.export(capture.as_mut(), archive, |progress| {
        let _ = write!(
            stderr,
            "\rExporting: {:3}% ({}/{})",
            progress.percent(),
            progress.completed,
            progress.total
        );
        let _ = stderr.flush();
    });
    eprintln!();

    let outcome = outcome.context("Export failed, no archive was written")?;
    println!(
        "Exported {} frame(s) to {}",
        outcome.frames,
        outcome.artifact.display()
    );
    Ok(())
}

fn run_player(config: Config, file: &Path, silent: bool) -> Result<()> {
    let title = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    let audio = config.audio.clone();
    let mut session = open_session(config, file)?;

    let make_engine = move || -> Box<dyn AudioEngine> {
        if silent {
            Box::new(SilentEngine::new())
        } else {
            Box::new(JackEngine::new(audio.clone()))
        }
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_event_loop(&mut terminal, &mut session, &title, &make_engine);

    // Cleanup
    session.stop();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &mut Session,
    title: &str,
    make_engine: &dyn Fn() -> Box<dyn AudioEngine>,
) -> Result<()> {
    let duration = session.performance().map(|p| p.duration()).unwrap_or(0.0);
    let mut engine_name = String::from("-");

    let toggle = |session: &mut Session, engine_name: &mut String| -> Option<String> {
        let engine = make_engine();
        let name = engine.name().to_string();
        match session.toggle(engine, Instant::now()) {
            Ok(true) => {
                *engine_name = name;
                None
            }
            Ok(false) => Some("Stopped".to_string()),
            Err(e) => Some(format!("{} (try --silent)", e)),
        }
    };

    let mut message = toggle(session, &mut engine_name);

    loop {
        let now = Instant::now();
        session.tick(now);
        if session.is_finished() {
            session.stop();
            message = Some("Finished".to_string());
        }

        let status = tui::PlayerStatus {
            title,
            engine: &engine_name,
            playing: session.is_playing(),
            position: session.player().position(now),
            duration,
            message: message.as_deref(),
        };
        terminal.draw(|frame| {
            let area = frame.area();
            frame.render_widget(Clear, area);
            let background = Block::default().style(Style::default().bg(Color::Rgb(20, 20, 30)));
            frame.render_widget(background, area);
            tui::render_player(frame, area, session.stage(), &status);
        })?;

        // Poll for terminal events
        if !event::poll(Duration::from_millis(16))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Esc | KeyCode::Char('q') => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(())
                }
                KeyCode::Char(' ') => {
                    message = toggle(session, &mut engine_name);
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let cli = Cli::parse_from([
            "keyglow",
            "export",
            "song.mid",
            "--fps",
            "24",
            "--format",
            "svg",
            "--start-octave",
            "-1",
            "--highlight",
            "#00FF00",
        ]);
        assert_eq!(cli.start_octave, Some(-1));
        assert_eq!(cli.highlight, Some(Rgb::new(0, 0xFF, 0)));
        match cli.command {
            Commands::Export { fps, format, .. } => {
                assert_eq!(fps, Some(24));
                assert_eq!(format, Some(FrameFormat::Svg));
            }
            _ => panic!("expected export"),
        }
    }
}
