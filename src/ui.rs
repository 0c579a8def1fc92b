use chrono::Local;
use itertools::Itertools;
use rand::seq::SliceRandom;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use time_humanize::HumanTime;
use unicode_width::UnicodeWidthStr;

use crate::audio::Cue;
use crate::lexicon::WordOption;
use crate::reward::RewardAnimation;
use crate::session::{
    ResultsPresenter, RewardPresenter, SelectionUi, SessionMode, SessionPhase, SessionSummary,
};
use crate::{App, AppState, RoundOutcome, VOICES};

const HORIZONTAL_MARGIN: u16 = 5;

/// SNR range over which the talker's word goes from fully masked to fully
/// readable. Mirrors what a real staircase sweeps through in a session.
const MASK_FLOOR_DB: f32 = -9.0;
const MASK_CEIL_DB: f32 = 9.0;

const GAUGE_WIDTH: usize = 24;
const GAUGE_FLOOR_DB: f32 = -12.0;
const GAUGE_CEIL_DB: f32 = 12.0;

/// The option grid. Receives options from the session controller with the
/// correct word first, shuffles them for display, and remembers where the
/// correct one landed so key handling can classify a pick.
#[derive(Debug, Default)]
pub struct SelectionPanel {
    options: Vec<WordOption>,
    correct_ix: usize,
    chosen: Option<usize>,
    visible: bool,
}

impl SelectionPanel {
    pub fn options(&self) -> &[WordOption] {
        &self.options
    }

    pub fn correct_ix(&self) -> usize {
        self.correct_ix
    }

    pub fn chosen(&self) -> Option<usize> {
        self.chosen
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn correct_word(&self) -> Option<&str> {
        self.options.get(self.correct_ix).map(|o| o.word.as_str())
    }

    /// Registers the trainee's pick. Returns `Some(true)` when the correct
    /// word was chosen, `None` when the grid is hidden or the index is out
    /// of range.
    pub fn choose(&mut self, display_ix: usize) -> Option<bool> {
        if !self.visible || display_ix >= self.options.len() {
            return None;
        }
        self.chosen = Some(display_ix);
        Some(display_ix == self.correct_ix)
    }
}

impl SelectionUi for SelectionPanel {
    fn start_word_selection(&mut self, options: &[WordOption]) {
        let mut order: Vec<usize> = (0..options.len()).collect();
        order.shuffle(&mut rand::thread_rng());

        self.options = order.iter().map(|&ix| options[ix].clone()).collect();
        self.correct_ix = order.iter().position(|&ix| ix == 0).unwrap_or(0);
        self.chosen = None;
        self.visible = true;
    }

    fn show(&mut self, visible: bool) {
        self.visible = visible;
        if !visible {
            self.chosen = None;
        }
    }
}

/// End-of-session results screen.
#[derive(Debug, Default)]
pub struct ResultsPanel {
    summary: Option<SessionSummary>,
    visible: bool,
}

impl ResultsPanel {
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

impl ResultsPresenter for ResultsPanel {
    fn set_training_results(&mut self, summary: &SessionSummary) {
        self.summary = Some(summary.clone());
    }

    fn show_results(&mut self) {
        self.visible = true;
    }
}

/// Confetti overlay fired on a reward streak. The controller only knows the
/// reward ordinal; the terminal size arrives later, on the next host tick,
/// so the start is deferred until `advance`.
#[derive(Debug, Default)]
pub struct RewardOverlay {
    pending: Option<u32>,
    pub animation: RewardAnimation,
}

impl RewardOverlay {
    /// Called once per host tick with the current terminal size.
    pub fn advance(&mut self, width: u16, height: u16) {
        if let Some(ordinal) = self.pending.take() {
            self.animation.start(ordinal, width, height);
        }
        self.animation.update();
    }
}

impl RewardPresenter for RewardOverlay {
    fn show_reward(&mut self, ordinal: u32) {
        self.pending = Some(ordinal);
    }
}

/// Obscures a word with noise glyphs in proportion to the SNR. This is the
/// terminal stand-in for speech-in-noise: the lower the talker sits relative
/// to the distractor stories, the less of the word survives.
pub fn mask_word(word: &str, snr_db: f32) -> String {
    let clarity = ((snr_db - MASK_FLOOR_DB) / (MASK_CEIL_DB - MASK_FLOOR_DB)).clamp(0.0, 1.0);
    let chars: Vec<char> = word.chars().collect();
    let visible = (clarity * chars.len() as f32).round() as usize;

    chars
        .iter()
        .enumerate()
        .map(|(ix, c)| if ix < visible { *c } else { '▒' })
        .collect()
}

fn snr_gauge(snr_db: f32) -> String {
    let frac = ((snr_db - GAUGE_FLOOR_DB) / (GAUGE_CEIL_DB - GAUGE_FLOOR_DB)).clamp(0.0, 1.0);
    let filled = (frac * GAUGE_WIDTH as f32).round() as usize;
    let mut bar = String::with_capacity(GAUGE_WIDTH);
    for ix in 0..GAUGE_WIDTH {
        bar.push(if ix < filled { '█' } else { '░' });
    }
    bar
}

fn centered_paragraph(lines: Vec<Line<'_>>, area: Rect, buf: &mut Buffer) {
    let content_height = lines.len() as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints(
            [
                Constraint::Length(area.height.saturating_sub(content_height) / 2),
                Constraint::Length(content_height),
                Constraint::Min(0),
            ]
            .as_ref(),
        )
        .split(area);

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::VoiceSelect => render_voice_select(self, area, buf),
            AppState::Training => match self.session.phase() {
                SessionPhase::Idle => render_voice_select(self, area, buf),
                SessionPhase::Playing => render_playing(self, area, buf),
                SessionPhase::Selecting | SessionPhase::Reviewing => {
                    render_selection(self, area, buf)
                }
                SessionPhase::Done => render_results(self, area, buf),
            },
        }

        if self.session.reward().animation.is_active {
            render_reward_overlay(self.session.reward(), area, buf);
        }
    }
}

fn render_voice_select(app: &App, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);
    let highlight = Style::default().patch(bold).fg(Color::Cyan);

    let mut lines = vec![
        Line::from(Span::styled("lisn, a speech-in-noise trainer", bold)),
        Line::from(""),
        Line::from(Span::styled("pick a talker voice", dim)),
        Line::from(""),
    ];
    for (ix, voice) in VOICES.iter().enumerate() {
        let style = if ix == app.voice_cursor {
            highlight
        } else {
            dim
        };
        let marker = if ix == app.voice_cursor { "> " } else { "  " };
        lines.push(Line::from(Span::styled(format!("{marker}{voice}"), style)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "(↑/↓) move (enter) start (esc) quit",
        Style::default().add_modifier(Modifier::ITALIC),
    )));

    centered_paragraph(lines, area, buf);
}

fn render_playing(app: &App, area: Rect, buf: &mut Buffer) {
    let session = &app.session;
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    let round_label = match session.mode() {
        SessionMode::Practice => format!("practice round {}", session.practice_rounds() + 1),
        SessionMode::Main => format!(
            "round {} of {}",
            session.rounds_played().max(1),
            session.config().game_length
        ),
    };

    let talker = match (session.audio().current_slot(), session.sentence()) {
        (Some(slot), Some(sentence)) => sentence
            .word(slot)
            .map(|word| mask_word(word, session.current_snr()))
            .unwrap_or_default(),
        _ => "...".to_string(),
    };

    let spoken = Line::from(vec![
        Span::styled("◀ story   ", dim),
        Span::styled(talker, Style::default().patch(bold).fg(Color::Cyan)),
        Span::styled("   story ▶", dim),
    ]);

    let gauge = Line::from(vec![
        Span::styled(snr_gauge(session.current_snr()), Style::default().fg(Color::Magenta)),
        Span::styled(
            format!("  talker {:+.1} dB", session.current_snr()),
            dim,
        ),
    ]);

    let mut lines = vec![
        Line::from(Span::styled(round_label, dim)),
        Line::from(""),
        spoken,
        Line::from(""),
        gauge,
    ];
    if let Some(cue) = session.audio().cue() {
        lines.push(Line::from(""));
        lines.push(cue_line(cue));
    }

    centered_paragraph(lines, area, buf);
}

fn render_selection(app: &App, area: Rect, buf: &mut Buffer) {
    let session = &app.session;
    let panel = session.ui();
    let reviewing = session.phase() == SessionPhase::Reviewing;

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);
    let dim_bold = Style::default().patch(bold).add_modifier(Modifier::DIM);
    let green_bold = Style::default().patch(bold).fg(Color::Green);
    let red_bold = Style::default().patch(bold).fg(Color::Red);
    let italic = Style::default().add_modifier(Modifier::ITALIC);

    let widest = panel
        .options()
        .iter()
        .map(|o| o.word.width())
        .max()
        .unwrap_or(0);

    let mut lines = vec![
        Line::from(Span::styled("which word did you hear?", bold)),
        Line::from(""),
    ];

    for (ix, option) in panel.options().iter().enumerate() {
        let style = if reviewing && ix == panel.correct_ix() {
            green_bold
        } else if reviewing && panel.chosen() == Some(ix) {
            red_bold
        } else {
            dim_bold
        };
        lines.push(Line::from(Span::styled(
            format!(
                "({}) {}  {:width$}",
                ix + 1,
                option.icon,
                option.word,
                width = widest
            ),
            style,
        )));
    }
    lines.push(Line::from(""));

    if reviewing {
        match app.last_outcome {
            Some(RoundOutcome::Hit) => {
                lines.push(Line::from(Span::styled("correct!", green_bold)));
            }
            Some(RoundOutcome::Miss) => {
                let correct = panel.correct_word().unwrap_or_default();
                lines.push(Line::from(Span::styled(
                    format!("not quite, it was \"{correct}\""),
                    red_bold,
                )));
            }
            Some(RoundOutcome::Unsure) | None => {
                let correct = panel.correct_word().unwrap_or_default();
                lines.push(Line::from(Span::styled(
                    format!("it was \"{correct}\""),
                    dim_bold,
                )));
            }
        }
        if let Some(sentence) = session.sentence() {
            let full = (0..sentence.len())
                .filter_map(|slot| sentence.word(slot).ok())
                .join(" ");
            lines.push(Line::from(Span::styled(full, dim)));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("(enter) next round", italic)));
    } else {
        lines.push(Line::from(Span::styled(
            "(1-4) pick a word (u) not sure",
            italic,
        )));
    }

    centered_paragraph(lines, area, buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let session = &app.session;
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);
    let magenta = Style::default().fg(Color::Magenta);
    let italic = Style::default().add_modifier(Modifier::ITALIC);

    let mut lines = vec![
        Line::from(Span::styled("session complete", bold)),
        Line::from(""),
    ];

    if let Some(summary) = session.results().summary() {
        lines.push(Line::from(Span::styled(
            format!("average SNR {:+.1} dB", summary.average_snr),
            magenta,
        )));
        lines.push(Line::from(Span::styled(
            format!("spread {:.1} dB", summary.snr_std_dev),
            dim,
        )));
        lines.push(Line::from(Span::styled(
            format!(
                "{} hits / {} misses over {} rounds, {} rewards",
                summary.hits, summary.misses, summary.rounds_played, summary.rewards_earned
            ),
            dim,
        )));
    }

    if let Ok(recent) = session.records().recent_results(5) {
        if !recent.is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "recent sessions",
                Style::default().patch(dim).add_modifier(Modifier::UNDERLINED),
            )));
            for record in recent {
                let seconds_ago = (Local::now() - record.finished_at).num_seconds();
                lines.push(Line::from(Span::styled(
                    format!(
                        "{:+.1} dB, {} rewards, {}",
                        record.average_snr,
                        record.rewards,
                        HumanTime::from(-seconds_ago)
                    ),
                    dim,
                )));
            }
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "(r) new session (esc) quit",
        italic,
    )));

    centered_paragraph(lines, area, buf);
}

fn render_reward_overlay(overlay: &RewardOverlay, area: Rect, buf: &mut Buffer) {
    let colors = [
        Color::Yellow,
        Color::Magenta,
        Color::Cyan,
        Color::Green,
        Color::Red,
        Color::Blue,
        Color::LightYellow,
    ];

    for particle in &overlay.animation.particles {
        let x = particle.x as u16;
        let y = particle.y as u16;
        if x >= area.width || y >= area.height {
            continue;
        }

        let color = colors[particle.color_index % colors.len()];
        let alpha = 1.0 - (particle.age / particle.max_age);
        let style = if alpha > 0.7 {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else if alpha > 0.3 {
            Style::default().fg(color)
        } else {
            Style::default().fg(color).add_modifier(Modifier::DIM)
        };

        if let Some(cell) = buf.cell_mut((area.x + x, area.y + y)) {
            cell.set_symbol(&particle.symbol.to_string());
            cell.set_style(style);
        }
    }

    let banner = format!("reward {}!", overlay.animation.ordinal + 1);
    let x = area.x + (area.width.saturating_sub(banner.len() as u16)) / 2;
    let y = area.y + area.height / 2;
    buf.set_string(
        x,
        y,
        banner,
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );
}

fn cue_line(cue: Cue) -> Line<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    match cue {
        Cue::Hit => Line::from(Span::styled("✓", Style::default().patch(bold).fg(Color::Green))),
        Cue::Miss => Line::from(Span::styled("✗", Style::default().patch(bold).fg(Color::Red))),
        Cue::Reward => Line::from(Span::styled(
            "★",
            Style::default().patch(bold).fg(Color::Yellow),
        )),
    }
}
