use crate::audio::AudioCoordinator;
use crate::lexicon::{Lexicon, LexiconError, WordOption};
use crate::records::UserRecordStore;
use crate::sentence::{Sentence, SentenceError};
use crate::staircase::Staircase;
use crate::util::{mean, std_dev};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("`{event}` event arrived in {phase:?} phase")]
    UnexpectedEvent {
        event: &'static str,
        phase: SessionPhase,
    },
    #[error("event arrived before the session was started")]
    NotStarted,
    #[error("no scored rounds to average")]
    NoScoredRounds,
    #[error(transparent)]
    Lexicon(#[from] LexiconError),
    #[error(transparent)]
    Sentence(#[from] SentenceError),
    #[error("failed to persist session results: {0}")]
    Record(#[from] rusqlite::Error),
}

/// Presents the option grid and relays the trainee's choice back to the
/// controller as one of the outcome events.
pub trait SelectionUi {
    /// Loads a fresh option set (correct word at position 0) and shows it.
    fn start_word_selection(&mut self, options: &[WordOption]);
    fn show(&mut self, visible: bool);
}

pub trait ResultsPresenter {
    fn set_training_results(&mut self, summary: &SessionSummary);
    fn show_results(&mut self);
}

pub trait RewardPresenter {
    /// `ordinal` is 0-based: the first reward of the session is reward 0.
    fn show_reward(&mut self, ordinal: u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for a voice to be picked.
    Idle,
    /// Target sentence is being spoken.
    Playing,
    /// Option grid is up, waiting for hit/miss/unsure.
    Selecting,
    /// Outcome feedback is up, waiting for continue.
    Reviewing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Practice,
    Main,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Scored rounds per session, excluding practice and replays.
    pub game_length: usize,
    /// Practice continues until a miss/unsure at or past this round count.
    pub min_practice_rounds: usize,
    /// Consecutive hits needed for a reward.
    pub reward_hits: u32,
    /// Options per word-selection round (correct word plus distractors).
    pub selection_options: usize,
    /// Talker volume offset at session start, dB.
    pub start_snr_db: f32,
    pub staircase: Staircase,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            game_length: 10,
            min_practice_rounds: 2,
            reward_hits: 3,
            selection_options: 4,
            start_snr_db: 6.0,
            staircase: Staircase::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub average_snr: f32,
    pub snr_std_dev: f32,
    pub rewards_earned: u32,
    pub hits: u32,
    pub misses: u32,
    pub rounds_played: usize,
}

/// The adaptive staircase state machine. Owns all session state; the injected
/// collaborators receive commands and copies, never mutation rights. Each
/// event entry point runs to completion before the host loop delivers the
/// next event.
#[derive(Debug)]
pub struct TrainingSession<A, S, P, W, R>
where
    A: AudioCoordinator,
    S: SelectionUi,
    P: ResultsPresenter,
    W: RewardPresenter,
    R: UserRecordStore,
{
    config: SessionConfig,
    audio: A,
    ui: S,
    results: P,
    reward: W,
    records: R,
    rng: StdRng,

    lexicon: Option<Lexicon>,
    sentence: Option<Sentence>,
    phase: SessionPhase,
    mode: SessionMode,
    practice_rounds: usize,
    rounds_played: usize,
    hits: u32,
    misses: u32,
    reward_streak: u32,
    rewards_earned: u32,
    current_snr: f32,
    snr_history: Vec<f32>,
    repeat_pending: bool,
    summary: Option<SessionSummary>,
}

impl<A, S, P, W, R> TrainingSession<A, S, P, W, R>
where
    A: AudioCoordinator,
    S: SelectionUi,
    P: ResultsPresenter,
    W: RewardPresenter,
    R: UserRecordStore,
{
    pub fn new(
        config: SessionConfig,
        audio: A,
        ui: S,
        results: P,
        reward: W,
        records: R,
        rng: StdRng,
    ) -> Self {
        let current_snr = config.start_snr_db;
        let snr_history = Vec::with_capacity(config.game_length);
        Self {
            config,
            audio,
            ui,
            results,
            reward,
            records,
            rng,
            lexicon: None,
            sentence: None,
            phase: SessionPhase::Idle,
            mode: SessionMode::Practice,
            practice_rounds: 0,
            rounds_played: 0,
            hits: 0,
            misses: 0,
            reward_streak: 0,
            rewards_earned: 0,
            current_snr,
            snr_history,
            repeat_pending: false,
            summary: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Voice picked: build the first sentence and start playback.
    pub fn start(&mut self, lexicon: Lexicon) -> Result<(), SessionError> {
        self.ensure(SessionPhase::Idle, "start")?;
        info!(voice = %lexicon.name, "starting training session");

        self.audio.set_distracter_tracks(
            lexicon.distracters.left.clone(),
            lexicon.distracters.right.clone(),
        );
        let sentence = Sentence::generate(&lexicon, &mut self.rng)?;
        self.audio.set_target_sentence(sentence.audio().to_vec());
        self.ui.show(false);

        self.lexicon = Some(lexicon);
        self.sentence = Some(sentence);
        self.audio.start_playing();
        self.phase = SessionPhase::Playing;
        Ok(())
    }

    /// The audio coordinator finished the target sentence: record the round
    /// SNR (scored rounds only) and raise the option grid. A replay after an
    /// unsure answer re-shows the previous options untouched.
    pub fn on_playing_done(&mut self) -> Result<(), SessionError> {
        self.ensure(SessionPhase::Playing, "playing_done")?;
        self.phase = SessionPhase::Selecting;

        if self.repeat_pending {
            debug!("replay finished, re-showing previous options");
            self.ui.show(true);
            return Ok(());
        }

        if self.mode == SessionMode::Main {
            self.snr_history.push(self.current_snr);
            debug_assert_eq!(self.snr_history.len(), self.rounds_played);
            debug!(
                round = self.rounds_played,
                snr_db = self.current_snr,
                "recorded round SNR"
            );
        }

        let lexicon = self.lexicon.as_ref().ok_or(SessionError::NotStarted)?;
        let sentence = self.sentence.as_ref().ok_or(SessionError::NotStarted)?;
        let group = *lexicon
            .selectable()
            .choose(&mut self.rng)
            .ok_or(LexiconError::NoSelectableGroups)?;
        let correct = sentence.selectable_word_ix(group)?;
        let options = lexicon.selectable_words(
            group,
            self.config.selection_options,
            correct,
            &mut self.rng,
        )?;
        debug!(group, options = options.len(), "presenting word selection");
        self.ui.start_word_selection(&options);
        Ok(())
    }

    /// Correct word picked.
    pub fn on_hit(&mut self) -> Result<(), SessionError> {
        self.ensure(SessionPhase::Selecting, "hit")?;
        self.audio.play_on_hit();
        self.repeat_pending = false;

        if self.mode == SessionMode::Practice {
            self.adjust_snr(self.config.staircase.practice_step_db);
            self.phase = SessionPhase::Reviewing;
            return Ok(());
        }

        self.adjust_snr(self.config.staircase.on_hit_db);
        self.hits += 1;
        self.reward_streak += 1;
        debug!(hits = self.hits, streak = self.reward_streak, "hit");

        if self.reward_streak >= self.config.reward_hits {
            info!(ordinal = self.rewards_earned, "reward streak achieved");
            self.audio.play_on_reward();
            self.reward.show_reward(self.rewards_earned);
            self.rewards_earned += 1;
            self.reward_streak = 0;
        }

        self.phase = SessionPhase::Reviewing;
        Ok(())
    }

    /// Wrong word picked.
    pub fn on_miss(&mut self) -> Result<(), SessionError> {
        self.ensure(SessionPhase::Selecting, "miss")?;
        self.audio.play_on_miss();
        self.repeat_pending = false;

        if self.mode == SessionMode::Practice {
            self.check_practice_exit();
            self.phase = SessionPhase::Reviewing;
            return Ok(());
        }

        self.misses += 1;
        self.adjust_snr(self.config.staircase.on_miss_db);
        self.reward_streak = 0;
        debug!(misses = self.misses, "miss, streak reset");
        self.phase = SessionPhase::Reviewing;
        Ok(())
    }

    /// "Not sure": ease the SNR and replay the same sentence once. A second
    /// unsure on the same sentence falls through to normal review, so a
    /// sentence is never replayed twice.
    pub fn on_unsure(&mut self) -> Result<(), SessionError> {
        self.ensure(SessionPhase::Selecting, "unsure")?;

        if self.mode == SessionMode::Practice {
            self.check_practice_exit();
        } else {
            self.adjust_snr(self.config.staircase.on_unsure_db);
        }

        if !self.repeat_pending {
            debug!("unsure, replaying sentence");
            self.repeat_pending = true;
            self.audio.start_playing();
            self.ui.show(false);
            self.phase = SessionPhase::Playing;
        } else {
            debug!("second unsure on the same sentence, no further replay");
            self.repeat_pending = false;
            self.phase = SessionPhase::Reviewing;
        }
        Ok(())
    }

    /// Outcome dismissed: advance to the next round or finish the session.
    pub fn on_continue(&mut self) -> Result<(), SessionError> {
        self.ensure(SessionPhase::Reviewing, "continue")?;
        self.ui.show(false);

        if self.rounds_played >= self.config.game_length {
            return self.finish();
        }

        if !self.repeat_pending {
            let lexicon = self.lexicon.as_ref().ok_or(SessionError::NotStarted)?;
            let sentence = Sentence::generate(lexicon, &mut self.rng)?;
            self.audio.set_target_sentence(sentence.audio().to_vec());
            self.sentence = Some(sentence);

            match self.mode {
                SessionMode::Practice => {
                    self.practice_rounds += 1;
                    debug!(
                        practice_round = self.practice_rounds,
                        min = self.config.min_practice_rounds,
                        "practice round"
                    );
                }
                SessionMode::Main => {
                    self.rounds_played += 1;
                    debug!(
                        round = self.rounds_played,
                        of = self.config.game_length,
                        "round"
                    );
                }
            }
        }

        self.audio.start_playing();
        self.phase = SessionPhase::Playing;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SessionError> {
        let average_snr = mean(&self.snr_history).ok_or(SessionError::NoScoredRounds)?;
        let snr_std_dev = std_dev(&self.snr_history).ok_or(SessionError::NoScoredRounds)?;

        let summary = SessionSummary {
            average_snr,
            snr_std_dev,
            rewards_earned: self.rewards_earned,
            hits: self.hits,
            misses: self.misses,
            rounds_played: self.rounds_played,
        };
        info!(
            average_snr,
            hits = summary.hits,
            misses = summary.misses,
            rewards = summary.rewards_earned,
            "training session done"
        );

        self.results.set_training_results(&summary);
        self.results.show_results();
        self.records
            .add_user_results(summary.average_snr, summary.rewards_earned)?;
        self.summary = Some(summary);
        self.phase = SessionPhase::Done;
        Ok(())
    }

    fn check_practice_exit(&mut self) {
        if self.practice_rounds >= self.config.min_practice_rounds {
            info!(
                practice_rounds = self.practice_rounds,
                "leaving practice mode"
            );
            self.mode = SessionMode::Main;
        }
    }

    fn adjust_snr(&mut self, delta_db: f32) {
        self.current_snr += delta_db;
        self.audio.change_talker_volume(delta_db);
    }

    fn ensure(&self, expected: SessionPhase, event: &'static str) -> Result<(), SessionError> {
        if self.phase != expected {
            return Err(SessionError::UnexpectedEvent {
                event,
                phase: self.phase,
            });
        }
        Ok(())
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_done(&self) -> bool {
        self.phase == SessionPhase::Done
    }

    pub fn rounds_played(&self) -> usize {
        self.rounds_played
    }

    pub fn practice_rounds(&self) -> usize {
        self.practice_rounds
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn reward_streak(&self) -> u32 {
        self.reward_streak
    }

    pub fn rewards_earned(&self) -> u32 {
        self.rewards_earned
    }

    pub fn current_snr(&self) -> f32 {
        self.current_snr
    }

    pub fn snr_history(&self) -> &[f32] {
        &self.snr_history
    }

    pub fn repeat_pending(&self) -> bool {
        self.repeat_pending
    }

    pub fn sentence(&self) -> Option<&Sentence> {
        self.sentence.as_ref()
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    pub fn ui(&self) -> &S {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut S {
        &mut self.ui
    }

    pub fn results(&self) -> &P {
        &self.results
    }

    pub fn reward(&self) -> &W {
        &self.reward
    }

    pub fn reward_mut(&mut self) -> &mut W {
        &mut self.reward
    }

    pub fn records(&self) -> &R {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::{DistracterTracks, WordEntry, WordGroup};
    use assert_matches::assert_matches;
    use rand::SeedableRng;

    #[derive(Default)]
    struct MockAudio {
        target: Vec<String>,
        targets_set: u32,
        distracters: Option<(String, String)>,
        volume: f32,
        play_calls: u32,
        cues: Vec<&'static str>,
    }

    impl AudioCoordinator for MockAudio {
        fn set_target_sentence(&mut self, clips: Vec<String>) {
            self.target = clips;
            self.targets_set += 1;
        }
        fn set_distracter_tracks(&mut self, left: String, right: String) {
            self.distracters = Some((left, right));
        }
        fn start_playing(&mut self) {
            self.play_calls += 1;
        }
        fn change_talker_volume(&mut self, delta_db: f32) {
            self.volume += delta_db;
        }
        fn talker_volume(&self) -> f32 {
            self.volume
        }
        fn play_on_hit(&mut self) {
            self.cues.push("hit");
        }
        fn play_on_miss(&mut self) {
            self.cues.push("miss");
        }
        fn play_on_reward(&mut self) {
            self.cues.push("reward");
        }
    }

    #[derive(Default)]
    struct MockUi {
        options: Vec<WordOption>,
        visible: bool,
        presented: u32,
    }

    impl SelectionUi for MockUi {
        fn start_word_selection(&mut self, options: &[WordOption]) {
            self.options = options.to_vec();
            self.visible = true;
            self.presented += 1;
        }
        fn show(&mut self, visible: bool) {
            self.visible = visible;
        }
    }

    #[derive(Default)]
    struct MockResults {
        summary: Option<SessionSummary>,
        shown: bool,
    }

    impl ResultsPresenter for MockResults {
        fn set_training_results(&mut self, summary: &SessionSummary) {
            self.summary = Some(summary.clone());
        }
        fn show_results(&mut self) {
            self.shown = true;
        }
    }

    #[derive(Default)]
    struct MockReward {
        ordinals: Vec<u32>,
    }

    impl RewardPresenter for MockReward {
        fn show_reward(&mut self, ordinal: u32) {
            self.ordinals.push(ordinal);
        }
    }

    #[derive(Default)]
    struct MemoryRecords {
        rows: Vec<(f32, u32)>,
    }

    impl UserRecordStore for MemoryRecords {
        fn add_user_results(&mut self, average_snr: f32, rewards: u32) -> rusqlite::Result<()> {
            self.rows.push((average_snr, rewards));
            Ok(())
        }
    }

    type TestSession = TrainingSession<MockAudio, MockUi, MockResults, MockReward, MemoryRecords>;

    fn test_lexicon() -> Lexicon {
        let entry = |g: usize, w: &str| WordEntry {
            word: w.to_string(),
            clip: format!("test/{g}/{w}.wav"),
            icon: "*".to_string(),
        };
        Lexicon {
            name: "test".to_string(),
            groups: vec![
                WordGroup {
                    label: "name".to_string(),
                    entries: vec![
                        entry(0, "nina"),
                        entry(0, "peter"),
                        entry(0, "laura"),
                        entry(0, "tom"),
                    ],
                },
                WordGroup {
                    label: "object".to_string(),
                    entries: vec![
                        entry(1, "hats"),
                        entry(1, "cups"),
                        entry(1, "kites"),
                        entry(1, "rings"),
                    ],
                },
            ],
            selectable: vec![0, 1],
            distracters: DistracterTracks {
                left: "test/left.wav".to_string(),
                right: "test/right.wav".to_string(),
            },
        }
    }

    fn new_session(config: SessionConfig) -> TestSession {
        TrainingSession::new(
            config,
            MockAudio::default(),
            MockUi::default(),
            MockResults::default(),
            MockReward::default(),
            MemoryRecords::default(),
            StdRng::seed_from_u64(12345),
        )
    }

    fn started(config: SessionConfig) -> TestSession {
        let mut session = new_session(config);
        session.start(test_lexicon()).unwrap();
        session
    }

    /// One full practice round ending in a miss.
    fn practice_miss_round(session: &mut TestSession) {
        session.on_playing_done().unwrap();
        session.on_miss().unwrap();
        session.on_continue().unwrap();
    }

    fn main_config() -> SessionConfig {
        SessionConfig {
            min_practice_rounds: 0,
            ..Default::default()
        }
    }

    /// Shortcut out of practice mode; requires `min_practice_rounds == 0`.
    fn into_main_mode(session: &mut TestSession) {
        session.on_playing_done().unwrap();
        session.on_miss().unwrap();
        session.on_continue().unwrap();
        assert_eq!(session.mode(), SessionMode::Main);
    }

    #[test]
    fn start_primes_audio_and_hides_ui() {
        let session = started(SessionConfig::default());
        assert_eq!(session.phase(), SessionPhase::Playing);
        assert_eq!(session.mode(), SessionMode::Practice);
        assert_eq!(session.audio().play_calls, 1);
        assert_eq!(session.audio().target.len(), 2);
        assert!(session.audio().distracters.is_some());
        assert!(!session.ui().visible);
    }

    #[test]
    fn events_out_of_phase_fail_loudly() {
        let mut session = new_session(SessionConfig::default());
        assert_matches!(
            session.on_hit(),
            Err(SessionError::UnexpectedEvent { event: "hit", .. })
        );
        assert_matches!(
            session.on_playing_done(),
            Err(SessionError::UnexpectedEvent { .. })
        );

        session.start(test_lexicon()).unwrap();
        assert_matches!(
            session.on_continue(),
            Err(SessionError::UnexpectedEvent {
                event: "continue",
                ..
            })
        );
        assert_matches!(
            session.start(test_lexicon()),
            Err(SessionError::UnexpectedEvent { event: "start", .. })
        );
    }

    #[test]
    fn playing_done_presents_four_options_with_correct_included() {
        let mut session = started(SessionConfig::default());
        session.on_playing_done().unwrap();

        assert_eq!(session.phase(), SessionPhase::Selecting);
        assert_eq!(session.ui().options.len(), 4);
        assert!(session.ui().visible);

        // correct option (position 0) must be a word of the spoken sentence
        let correct = session.ui().options[0].word.clone();
        let sentence = session.sentence().unwrap();
        let words: Vec<_> = (0..sentence.len())
            .map(|s| sentence.word(s).unwrap().to_string())
            .collect();
        assert!(words.contains(&correct));
    }

    #[test]
    fn practice_hit_tightens_snr_without_scoring() {
        let mut session = started(SessionConfig::default());
        session.on_playing_done().unwrap();
        session.on_hit().unwrap();

        assert_eq!(session.mode(), SessionMode::Practice);
        assert_eq!(session.hits(), 0);
        assert_eq!(session.reward_streak(), 0);
        assert!((session.current_snr() - 3.0).abs() < 1e-6); // 6.0 - 3.0
        assert!((session.audio().talker_volume() + 3.0).abs() < 1e-6);
        assert_eq!(session.phase(), SessionPhase::Reviewing);
    }

    #[test]
    fn hits_never_exit_practice_mode() {
        let config = SessionConfig {
            min_practice_rounds: 1,
            ..Default::default()
        };
        let mut session = started(config);
        for _ in 0..5 {
            session.on_playing_done().unwrap();
            session.on_hit().unwrap();
            session.on_continue().unwrap();
        }
        assert_eq!(session.mode(), SessionMode::Practice);
        assert!(session.practice_rounds() >= config.min_practice_rounds);
    }

    #[test]
    fn miss_exits_practice_only_after_minimum_rounds() {
        let config = SessionConfig {
            min_practice_rounds: 2,
            ..Default::default()
        };
        let mut session = started(config);

        // practice_rounds 0 and 1: a miss must not exit yet
        practice_miss_round(&mut session);
        assert_eq!(session.mode(), SessionMode::Practice);
        practice_miss_round(&mut session);
        assert_eq!(session.mode(), SessionMode::Practice);

        // practice_rounds now 2: this miss flips to main mode, unscored
        session.on_playing_done().unwrap();
        session.on_miss().unwrap();
        assert_eq!(session.mode(), SessionMode::Main);
        assert_eq!(session.misses(), 0);
        assert!((session.current_snr() - 6.0).abs() < 1e-6);
    }

    #[test]
    fn unsure_exits_practice_like_a_miss_without_snr_change() {
        let mut session = started(main_config());
        session.on_playing_done().unwrap();
        session.on_unsure().unwrap();

        assert_eq!(session.mode(), SessionMode::Main);
        assert!((session.current_snr() - 6.0).abs() < 1e-6);
        // the unsure still triggers a replay
        assert_eq!(session.phase(), SessionPhase::Playing);
        assert!(session.repeat_pending());
    }

    #[test]
    fn main_hit_scores_and_tightens_snr() {
        let mut session = started(main_config());
        into_main_mode(&mut session);

        session.on_playing_done().unwrap();
        session.on_hit().unwrap();

        assert_eq!(session.hits(), 1);
        assert_eq!(session.reward_streak(), 1);
        assert!((session.current_snr() - 4.5).abs() < 1e-6);
        assert_eq!(session.audio().cues, vec!["miss", "hit"]);
    }

    #[test]
    fn main_miss_scores_eases_snr_and_resets_streak() {
        let mut session = started(main_config());
        into_main_mode(&mut session);

        session.on_playing_done().unwrap();
        session.on_hit().unwrap();
        session.on_continue().unwrap();

        session.on_playing_done().unwrap();
        session.on_miss().unwrap();

        assert_eq!(session.hits(), 1);
        assert_eq!(session.misses(), 1);
        assert_eq!(session.reward_streak(), 0);
        // 6.0 - 1.5 + 2.5
        assert!((session.current_snr() - 7.0).abs() < 1e-6);
    }

    #[test]
    fn reward_fires_once_per_streak_with_preincrement_ordinal() {
        let config = SessionConfig {
            min_practice_rounds: 0,
            reward_hits: 2,
            game_length: 20,
            ..Default::default()
        };
        let mut session = started(config);
        into_main_mode(&mut session);

        for _ in 0..4 {
            session.on_playing_done().unwrap();
            session.on_hit().unwrap();
            session.on_continue().unwrap();
        }

        assert_eq!(session.rewards_earned(), 2);
        assert_eq!(session.reward().ordinals, vec![0, 1]);
        assert_eq!(session.reward_streak(), 0);
        let reward_cues = session
            .audio()
            .cues
            .iter()
            .filter(|c| **c == "reward")
            .count();
        assert_eq!(reward_cues, 2);
    }

    #[test]
    fn unsure_replays_once_without_advancing() {
        let mut session = started(main_config());
        into_main_mode(&mut session);

        session.on_playing_done().unwrap();
        let options_before = session.ui().options.clone();
        let targets_before = session.audio().targets_set;
        let history_before = session.snr_history().len();
        let presented_before = session.ui().presented;

        session.on_unsure().unwrap();
        assert_eq!(session.phase(), SessionPhase::Playing);
        assert!(session.repeat_pending());
        assert!(!session.ui().visible);
        // SNR eased but nothing advanced or regenerated
        assert!((session.current_snr() - 7.5).abs() < 1e-6);
        assert_eq!(session.audio().targets_set, targets_before);

        session.on_playing_done().unwrap();
        assert!(session.ui().visible);
        assert_eq!(session.ui().options, options_before);
        assert_eq!(session.ui().presented, presented_before);
        assert_eq!(session.snr_history().len(), history_before);
        assert!(session.repeat_pending(), "flag survives until next outcome");
    }

    #[test]
    fn second_unsure_falls_through_to_review() {
        let mut session = started(main_config());
        into_main_mode(&mut session);

        session.on_playing_done().unwrap();
        let targets_before = session.audio().targets_set;

        session.on_unsure().unwrap();
        session.on_playing_done().unwrap();
        session.on_unsure().unwrap();

        assert_eq!(session.phase(), SessionPhase::Reviewing);
        assert!(!session.repeat_pending());
        // both unsures eased the SNR
        assert!((session.current_snr() - 9.0).abs() < 1e-6);

        // continue now generates exactly one fresh sentence
        session.on_continue().unwrap();
        assert_eq!(session.audio().targets_set, targets_before + 1);
        assert_eq!(session.rounds_played(), 2);
    }

    #[test]
    fn hit_after_replay_clears_repeat_flag() {
        let mut session = started(main_config());
        into_main_mode(&mut session);

        session.on_playing_done().unwrap();
        session.on_unsure().unwrap();
        session.on_playing_done().unwrap();
        session.on_hit().unwrap();

        assert!(!session.repeat_pending());
        session.on_continue().unwrap();
        assert_eq!(session.rounds_played(), 2);
    }

    #[test]
    fn snr_recorded_once_per_scored_round() {
        let config = SessionConfig {
            min_practice_rounds: 0,
            game_length: 3,
            ..Default::default()
        };
        let mut session = started(config);
        into_main_mode(&mut session);

        for _ in 0..3 {
            session.on_playing_done().unwrap();
            session.on_hit().unwrap();
            session.on_continue().unwrap();
        }

        assert!(session.is_done());
        assert_eq!(session.snr_history(), &[6.0, 4.5, 3.0]);
    }

    #[test]
    fn full_session_produces_summary_and_record() {
        let config = SessionConfig {
            min_practice_rounds: 1,
            game_length: 2,
            reward_hits: 2,
            ..Default::default()
        };
        let mut session = started(config);

        // practice: one miss before the minimum (stays), one after (exits)
        practice_miss_round(&mut session);
        assert_eq!(session.mode(), SessionMode::Practice);
        session.on_playing_done().unwrap();
        session.on_miss().unwrap();
        assert_eq!(session.mode(), SessionMode::Main);
        session.on_continue().unwrap();

        // two scored rounds, both hits
        session.on_playing_done().unwrap();
        session.on_hit().unwrap();
        session.on_continue().unwrap();
        session.on_playing_done().unwrap();
        session.on_hit().unwrap();
        session.on_continue().unwrap();

        assert!(session.is_done());
        let summary = session.summary().unwrap().clone();
        assert_eq!(summary.hits, 2);
        assert_eq!(summary.misses, 0);
        assert_eq!(summary.rounds_played, 2);
        assert_eq!(summary.rewards_earned, 1);
        // SNR snapshots at playback-done: 6.0 then 4.5
        assert!((summary.average_snr - 5.25).abs() < 1e-6);

        assert!(session.results().shown);
        assert_eq!(session.results().summary, Some(summary.clone()));
        assert_eq!(
            session.records().rows,
            vec![(summary.average_snr, summary.rewards_earned)]
        );
    }

    #[test]
    fn further_events_after_done_are_rejected() {
        let config = SessionConfig {
            min_practice_rounds: 0,
            game_length: 1,
            ..Default::default()
        };
        let mut session = started(config);
        into_main_mode(&mut session);
        session.on_playing_done().unwrap();
        session.on_hit().unwrap();
        session.on_continue().unwrap();
        assert!(session.is_done());

        assert_matches!(
            session.on_continue(),
            Err(SessionError::UnexpectedEvent { .. })
        );
        assert_matches!(
            session.on_playing_done(),
            Err(SessionError::UnexpectedEvent { .. })
        );
    }

    #[test]
    fn zero_scored_rounds_is_a_guarded_error() {
        let config = SessionConfig {
            min_practice_rounds: 0,
            game_length: 0,
            ..Default::default()
        };
        let mut session = started(config);
        session.on_playing_done().unwrap();
        session.on_miss().unwrap();
        assert_matches!(session.on_continue(), Err(SessionError::NoScoredRounds));
        assert!(!session.is_done());
    }

    #[test]
    fn controller_snr_mirrors_audio_volume() {
        let mut session = started(main_config());
        into_main_mode(&mut session);
        for _ in 0..3 {
            session.on_playing_done().unwrap();
            session.on_hit().unwrap();
            session.on_continue().unwrap();
        }
        let offset = session.current_snr() - session.config().start_snr_db;
        assert!((offset - session.audio().talker_volume()).abs() < 1e-6);
    }
}
