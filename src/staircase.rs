/// Fixed-step staircase over the talker volume offset (dB). Negative steps
/// make the task harder, positive steps easier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Staircase {
    pub on_hit_db: f32,
    pub on_miss_db: f32,
    pub on_unsure_db: f32,
    pub practice_step_db: f32,
}

impl Default for Staircase {
    fn default() -> Self {
        Self {
            on_hit_db: -1.5,
            on_miss_db: 2.5,
            on_unsure_db: 1.5,
            practice_step_db: -3.0,
        }
    }
}
