use tracing::debug;

/// Playback side of the training game. The session controller issues
/// fire-and-forget commands; completion of a target sentence is signalled
/// back through the host event loop (see `SimulatedTalker::tick`).
pub trait AudioCoordinator {
    fn set_target_sentence(&mut self, clips: Vec<String>);
    fn set_distracter_tracks(&mut self, left: String, right: String);
    /// (Re)starts the target sentence from the first word.
    fn start_playing(&mut self);
    fn change_talker_volume(&mut self, delta_db: f32);
    fn talker_volume(&self) -> f32;
    fn play_on_hit(&mut self);
    fn play_on_miss(&mut self);
    fn play_on_reward(&mut self);
}

/// Short feedback sound, rendered as a flash in the terminal front-end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cue {
    Hit,
    Miss,
    Reward,
}

#[derive(Debug, Clone, Copy)]
struct Playback {
    slot: usize,
    ticks_left: u32,
}

/// Tick-driven stand-in for a real audio backend: each target word occupies a
/// fixed number of ticks, and a full pass over the sentence produces exactly
/// one completion per `start_playing` call.
#[derive(Debug)]
pub struct SimulatedTalker {
    target: Vec<String>,
    distracters: Option<(String, String)>,
    talker_volume_db: f32,
    ticks_per_word: u32,
    playback: Option<Playback>,
    pending_done: bool,
    cue: Option<(Cue, u32)>,
}

const CUE_TICKS: u32 = 5;

impl SimulatedTalker {
    pub fn new(start_volume_db: f32, ticks_per_word: u32) -> Self {
        Self {
            target: Vec::new(),
            distracters: None,
            talker_volume_db: start_volume_db,
            ticks_per_word: ticks_per_word.max(1),
            playback: None,
            pending_done: false,
            cue: None,
        }
    }

    /// Advances playback by one host tick. Returns true exactly when the
    /// current target sentence finished on this tick.
    pub fn tick(&mut self) -> bool {
        if let Some((cue, age)) = self.cue {
            self.cue = if age > 1 { Some((cue, age - 1)) } else { None };
        }

        if self.pending_done {
            self.pending_done = false;
            return true;
        }

        let Some(ref mut playback) = self.playback else {
            return false;
        };
        playback.ticks_left -= 1;
        if playback.ticks_left == 0 {
            playback.slot += 1;
            if playback.slot >= self.target.len() {
                self.playback = None;
                return true;
            }
            playback.ticks_left = self.ticks_per_word;
        }
        false
    }

    /// Slot of the word currently being spoken, if any.
    pub fn current_slot(&self) -> Option<usize> {
        self.playback.map(|p| p.slot)
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some() || self.pending_done
    }

    pub fn cue(&self) -> Option<Cue> {
        self.cue.map(|(cue, _)| cue)
    }

    pub fn distracters(&self) -> Option<(&str, &str)> {
        self.distracters
            .as_ref()
            .map(|(l, r)| (l.as_str(), r.as_str()))
    }
}

impl AudioCoordinator for SimulatedTalker {
    fn set_target_sentence(&mut self, clips: Vec<String>) {
        self.target = clips;
    }

    fn set_distracter_tracks(&mut self, left: String, right: String) {
        self.distracters = Some((left, right));
    }

    fn start_playing(&mut self) {
        if self.target.is_empty() {
            self.pending_done = true;
            return;
        }
        debug!(words = self.target.len(), "starting target playback");
        self.playback = Some(Playback {
            slot: 0,
            ticks_left: self.ticks_per_word,
        });
    }

    fn change_talker_volume(&mut self, delta_db: f32) {
        self.talker_volume_db += delta_db;
        debug!(volume_db = self.talker_volume_db, "talker volume changed");
    }

    fn talker_volume(&self) -> f32 {
        self.talker_volume_db
    }

    fn play_on_hit(&mut self) {
        self.cue = Some((Cue::Hit, CUE_TICKS));
    }

    fn play_on_miss(&mut self) {
        self.cue = Some((Cue::Miss, CUE_TICKS));
    }

    fn play_on_reward(&mut self) {
        self.cue = Some((Cue::Reward, CUE_TICKS));
    }
}
