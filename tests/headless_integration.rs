use std::sync::mpsc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use lisn::audio::SimulatedTalker;
use lisn::lexicon::{Lexicon, WordOption};
use lisn::records::SqliteRecordStore;
use lisn::runtime::{Runner, TestEventSource, TrainerEvent};
use lisn::session::{
    ResultsPresenter, RewardPresenter, SelectionUi, SessionConfig, SessionPhase, SessionSummary,
    TrainingSession,
};

// Headless integration using the internal runtime + session without a TTY.
// The Runner synthesizes ticks; ticks drive the simulated talker; playback
// completion feeds the session controller exactly like the real event loop.

#[derive(Default)]
struct Grid {
    options: Vec<WordOption>,
    visible: bool,
}

impl SelectionUi for Grid {
    fn start_word_selection(&mut self, options: &[WordOption]) {
        self.options = options.to_vec();
        self.visible = true;
    }
    fn show(&mut self, visible: bool) {
        self.visible = visible;
    }
}

#[derive(Default)]
struct Results {
    summary: Option<SessionSummary>,
    shown: bool,
}

impl ResultsPresenter for Results {
    fn set_training_results(&mut self, summary: &SessionSummary) {
        self.summary = Some(summary.clone());
    }
    fn show_results(&mut self) {
        self.shown = true;
    }
}

#[derive(Default)]
struct Rewards {
    ordinals: Vec<u32>,
}

impl RewardPresenter for Rewards {
    fn show_reward(&mut self, ordinal: u32) {
        self.ordinals.push(ordinal);
    }
}

type Session = TrainingSession<SimulatedTalker, Grid, Results, Rewards, SqliteRecordStore>;

fn new_session(config: SessionConfig, seed: u64) -> Session {
    TrainingSession::new(
        config,
        SimulatedTalker::new(config.start_snr_db, 2),
        Grid::default(),
        Results::default(),
        Rewards::default(),
        SqliteRecordStore::in_memory().unwrap(),
        StdRng::seed_from_u64(seed),
    )
}

#[test]
fn headless_session_completes_via_event_loop() {
    let config = SessionConfig {
        min_practice_rounds: 1,
        game_length: 2,
        reward_hits: 2,
        ..Default::default()
    };
    let mut session = new_session(config, 9);
    session.start(Lexicon::load("female").unwrap()).unwrap();

    let (_tx, rx) = mpsc::channel();
    let runner = Runner::new(TestEventSource::new(rx), Duration::from_millis(1));

    // practice: a hit (stays), then a miss past the minimum (exits);
    // main: two hits, which also completes one reward streak
    let mut answers = ["hit", "miss", "hit", "hit"].into_iter();

    for _ in 0..10_000u32 {
        match runner.step() {
            TrainerEvent::Tick => {
                if session.phase() == SessionPhase::Playing && session.audio_mut().tick() {
                    session.on_playing_done().unwrap();
                }
            }
            TrainerEvent::Resize | TrainerEvent::Key(_) => {}
        }

        match session.phase() {
            SessionPhase::Selecting => match answers.next().expect("answer script exhausted") {
                "hit" => session.on_hit().unwrap(),
                _ => session.on_miss().unwrap(),
            },
            SessionPhase::Reviewing => session.on_continue().unwrap(),
            SessionPhase::Done => break,
            _ => {}
        }
    }

    assert!(session.is_done(), "session should have finished");
    let summary = session.summary().expect("summary missing").clone();
    assert_eq!(summary.rounds_played, 2);
    assert_eq!(summary.hits, 2);
    assert_eq!(summary.misses, 0);
    assert_eq!(summary.rewards_earned, 1);

    // practice hit pulled the talker down 3 dB before scoring started
    assert_eq!(session.snr_history(), &[3.0, 1.5]);
    assert!((summary.average_snr - 2.25).abs() < 1e-6);

    assert!(session.results().shown);
    assert_eq!(session.reward().ordinals, vec![0]);

    // the finished session landed in the (in-memory) results database
    assert_eq!(session.records().session_count().unwrap(), 1);
    let stored = &session.records().recent_results(1).unwrap()[0];
    assert!((stored.average_snr - summary.average_snr).abs() < 1e-6);
    assert_eq!(stored.rewards, 1);
}

#[test]
fn headless_unsure_replays_same_sentence_once() {
    let config = SessionConfig {
        min_practice_rounds: 0,
        game_length: 1,
        ..Default::default()
    };
    let mut session = new_session(config, 21);
    session.start(Lexicon::load("male").unwrap()).unwrap();

    // leave practice with a miss
    while !session.audio_mut().tick() {}
    session.on_playing_done().unwrap();
    session.on_miss().unwrap();
    session.on_continue().unwrap();

    // first scored round: unsure, then answer after the replay
    while !session.audio_mut().tick() {}
    session.on_playing_done().unwrap();
    let options_before: Vec<String> =
        session.ui().options.iter().map(|o| o.word.clone()).collect();

    session.on_unsure().unwrap();
    assert_eq!(session.phase(), SessionPhase::Playing);
    assert!(!session.ui().visible);

    while !session.audio_mut().tick() {}
    session.on_playing_done().unwrap();
    let options_after: Vec<String> =
        session.ui().options.iter().map(|o| o.word.clone()).collect();
    assert_eq!(options_before, options_after);
    assert!(session.ui().visible);

    session.on_hit().unwrap();
    session.on_continue().unwrap();
    assert!(session.is_done());
    // the replayed round was recorded exactly once
    assert_eq!(session.snr_history().len(), 1);
}

#[test]
fn talker_completion_is_delivered_exactly_once_per_round() {
    let config = SessionConfig {
        min_practice_rounds: 0,
        game_length: 1,
        ..Default::default()
    };
    let mut session = new_session(config, 3);
    session.start(Lexicon::load("female").unwrap()).unwrap();

    let mut completions = 0;
    for _ in 0..1_000 {
        if session.phase() == SessionPhase::Playing && session.audio_mut().tick() {
            completions += 1;
            session.on_playing_done().unwrap();
        }
        if session.phase() == SessionPhase::Selecting {
            break;
        }
    }
    assert_eq!(completions, 1);
}
