pub mod audio;
pub mod config;
pub mod lexicon;
pub mod records;
pub mod reward;
pub mod runtime;
pub mod sentence;
pub mod session;
pub mod staircase;
pub mod ui;
pub mod util;

use crate::audio::SimulatedTalker;
use crate::config::{Config, ConfigStore, FileConfigStore};
use crate::lexicon::Lexicon;
use crate::records::SqliteRecordStore;
use crate::runtime::{CrosstermEventSource, Runner, TrainerEvent};
use crate::session::{SessionPhase, TrainingSession};
use crate::ui::{ResultsPanel, RewardOverlay, SelectionPanel};
use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use directories::ProjectDirs;
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::Terminal;
use std::error::Error;
use std::io::{self, stdin};
use tracing_subscriber::EnvFilter;

/// Host ticks one spoken word occupies in the simulated talker.
const TICKS_PER_WORD: u32 = 6;

pub const VOICES: [&str; 2] = ["female", "male"];

/// adaptive speech-in-noise training in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "An adaptive speech-in-noise training game. A talker speaks a generated sentence against left/right distractor stories; pick the word you heard and the talker level adapts to keep you near threshold."
)]
pub struct Cli {
    /// talker voice (skips the voice menu)
    #[clap(short, long, value_enum)]
    voice: Option<VoiceArg>,

    /// number of scored rounds in a session
    #[clap(short = 'n', long)]
    game_length: Option<usize>,

    /// minimum number of practice rounds before scoring can begin
    #[clap(long)]
    practice_rounds: Option<usize>,

    /// consecutive correct answers needed for a reward
    #[clap(long)]
    reward_hits: Option<u32>,

    /// talker volume offset at session start, in dB
    #[clap(long)]
    start_snr: Option<f32>,

    /// seed for deterministic sentence draws
    #[clap(long)]
    seed: Option<u64>,

    /// keep this session out of the persistent results database
    #[clap(long)]
    no_save: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, ValueEnum, strum_macros::Display)]
pub enum VoiceArg {
    Female,
    Male,
}

impl VoiceArg {
    fn as_voice(&self) -> String {
        self.to_string().to_lowercase()
    }
}

impl Cli {
    fn apply_to(&self, config: &mut Config) {
        if let Some(voice) = self.voice {
            config.voice = voice.as_voice();
        }
        if let Some(n) = self.game_length {
            config.game_length = n;
        }
        if let Some(n) = self.practice_rounds {
            config.min_practice_rounds = n;
        }
        if let Some(n) = self.reward_hits {
            config.reward_hits = n;
        }
        if let Some(snr) = self.start_snr {
            config.start_snr_db = snr;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoundOutcome {
    Hit,
    Miss,
    Unsure,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    VoiceSelect,
    Training,
}

type Session =
    TrainingSession<SimulatedTalker, SelectionPanel, ResultsPanel, RewardOverlay, SqliteRecordStore>;

#[derive(Debug)]
pub struct App {
    pub cli: Option<Cli>,
    pub config: Config,
    pub state: AppState,
    pub voice_cursor: usize,
    pub session: Session,
    pub last_outcome: Option<RoundOutcome>,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self, Box<dyn Error>> {
        let mut config = FileConfigStore::new().load();
        cli.apply_to(&mut config);

        let session = build_session(&cli, &config)?;
        let voice_cursor = VOICES
            .iter()
            .position(|v| *v == config.voice)
            .unwrap_or(0);

        let mut app = Self {
            cli: Some(cli.clone()),
            config,
            state: AppState::VoiceSelect,
            voice_cursor,
            session,
            last_outcome: None,
        };
        if cli.voice.is_some() {
            app.start_training()?;
        }
        Ok(app)
    }

    /// Fresh session with the same settings, back at the voice menu unless
    /// the voice was fixed on the command line.
    pub fn reset(&mut self) -> Result<(), Box<dyn Error>> {
        let cli = self.cli.clone().ok_or("missing cli state")?;
        self.session = build_session(&cli, &self.config)?;
        self.last_outcome = None;
        self.state = AppState::VoiceSelect;
        if cli.voice.is_some() {
            self.start_training()?;
        }
        Ok(())
    }

    fn start_training(&mut self) -> Result<(), Box<dyn Error>> {
        let voice = VOICES.get(self.voice_cursor).copied().unwrap_or("female");
        let lexicon = Lexicon::load(voice)?;
        self.session.start(lexicon)?;
        self.state = AppState::Training;
        Ok(())
    }
}

fn build_session(cli: &Cli, config: &Config) -> Result<Session, Box<dyn Error>> {
    let records = if cli.no_save {
        SqliteRecordStore::in_memory()?
    } else {
        SqliteRecordStore::new()?
    };
    let rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let session_config = config.session_config();

    Ok(TrainingSession::new(
        session_config,
        SimulatedTalker::new(session_config.start_snr_db, TICKS_PER_WORD),
        SelectionPanel::default(),
        ResultsPanel::default(),
        RewardOverlay::default(),
        records,
        rng,
    ))
}

/// Logs go to a file under the user data dir when RUST_LOG is set; the
/// terminal itself belongs to the TUI.
fn init_tracing() {
    if std::env::var("RUST_LOG").is_err() {
        return;
    }
    let Some(dirs) = ProjectDirs::from("", "", "lisn") else {
        return;
    };
    let dir = dirs.data_local_dir().to_path_buf();
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = std::fs::File::create(dir.join("lisn.log")) else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut app = App::new(cli)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermEventSource::new(), app.config.tick_interval());

    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step() {
            TrainerEvent::Tick => {
                if app.state == AppState::Training
                    && !app.session.is_done()
                    && app.session.audio_mut().tick()
                {
                    app.session.on_playing_done()?;
                }
                let size = terminal.size().unwrap_or_default();
                app.session.reward_mut().advance(size.width, size.height);
            }
            TrainerEvent::Resize => {}
            TrainerEvent::Key(key) => {
                if handle_key(app, key)? {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Returns true when the app should quit.
fn handle_key(app: &mut App, key: KeyEvent) -> Result<bool, Box<dyn Error>> {
    if key.code == KeyCode::Esc {
        return Ok(true);
    }
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Ok(true);
    }

    match app.state {
        AppState::VoiceSelect => match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                app.voice_cursor = app.voice_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.voice_cursor = (app.voice_cursor + 1).min(VOICES.len() - 1);
            }
            KeyCode::Enter => {
                app.config.voice = VOICES[app.voice_cursor].to_string();
                app.start_training()?;
            }
            _ => {}
        },
        AppState::Training => match app.session.phase() {
            SessionPhase::Selecting => match key.code {
                KeyCode::Char(c @ '1'..='9') => {
                    let ix = c as usize - '1' as usize;
                    if let Some(hit) = app.session.ui_mut().choose(ix) {
                        if hit {
                            app.last_outcome = Some(RoundOutcome::Hit);
                            app.session.on_hit()?;
                        } else {
                            app.last_outcome = Some(RoundOutcome::Miss);
                            app.session.on_miss()?;
                        }
                    }
                }
                KeyCode::Char('u') => {
                    app.session.on_unsure()?;
                    // a second unsure falls through to review instead of replaying
                    app.last_outcome = (app.session.phase() == SessionPhase::Reviewing)
                        .then_some(RoundOutcome::Unsure);
                }
                _ => {}
            },
            SessionPhase::Reviewing => {
                if key.code == KeyCode::Enter || key.code == KeyCode::Char(' ') {
                    app.last_outcome = None;
                    app.session.on_continue()?;
                }
            }
            SessionPhase::Done => {
                if key.code == KeyCode::Char('r') {
                    app.reset()?;
                }
            }
            SessionPhase::Idle | SessionPhase::Playing => {}
        },
    }
    Ok(false)
}
