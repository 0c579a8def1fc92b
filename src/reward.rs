use rand::seq::SliceRandom;
use rand::Rng;

/// Confetti glyph for the reward overlay.
#[derive(Debug, Clone)]
pub struct RewardParticle {
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub symbol: char,
    pub color_index: usize,
    pub age: f64,
    pub max_age: f64,
}

impl RewardParticle {
    fn new(x: f64, y: f64, rng: &mut impl Rng) -> Self {
        Self {
            x,
            y,
            vel_x: rng.gen_range(-3.0..3.0),
            vel_y: rng.gen_range(-4.0..-1.0),
            symbol: *['✨', '🎉', '⭐', '💫', '🌟', '🎊']
                .choose(rng)
                .unwrap_or(&'✨'),
            color_index: rng.gen_range(0..7),
            age: 0.0,
            max_age: rng.gen_range(2.0..4.0),
        }
    }

    fn update(&mut self, dt: f64) -> bool {
        self.x += self.vel_x * dt;
        self.y += self.vel_y * dt;
        self.vel_y += 15.0 * dt; // gravity
        self.age += dt;
        self.age < self.max_age
    }
}

/// Overlay animation fired when a reward streak completes. Driven by host
/// ticks rather than wall-clock time so headless tests stay deterministic.
#[derive(Debug)]
pub struct RewardAnimation {
    pub particles: Vec<RewardParticle>,
    pub ordinal: u32,
    pub is_active: bool,
    pub terminal_width: f64,
    pub terminal_height: f64,
    ticks_left: u32,
}

/// Roughly three seconds at the 100ms tick rate.
const REWARD_TICKS: u32 = 30;
const DT_PER_TICK: f64 = 0.1;

impl RewardAnimation {
    pub fn new() -> Self {
        Self {
            particles: Vec::new(),
            ordinal: 0,
            is_active: false,
            terminal_width: 80.0,
            terminal_height: 24.0,
            ticks_left: 0,
        }
    }

    pub fn start(&mut self, ordinal: u32, width: u16, height: u16) {
        let mut rng = rand::thread_rng();

        self.particles.clear();
        self.ordinal = ordinal;
        self.is_active = true;
        self.ticks_left = REWARD_TICKS;
        self.terminal_width = width as f64;
        self.terminal_height = height as f64;

        let center_x = width as f64 / 2.0;
        let center_y = height as f64 / 2.0;
        for _ in 0..30 {
            let offset_x = rng.gen_range(-15.0..15.0);
            let offset_y = rng.gen_range(-6.0..6.0);
            self.particles
                .push(RewardParticle::new(center_x + offset_x, center_y + offset_y, &mut rng));
        }
    }

    pub fn update(&mut self) {
        if !self.is_active {
            return;
        }
        if self.ticks_left == 0 {
            self.is_active = false;
            self.particles.clear();
            return;
        }
        self.ticks_left -= 1;

        let width = self.terminal_width;
        let height = self.terminal_height;
        self.particles.retain_mut(|particle| {
            let alive = particle.update(DT_PER_TICK);
            let buffer = 5.0;
            let off_screen = particle.y > height + buffer
                || particle.x < -buffer
                || particle.x > width + buffer;
            alive && !off_screen
        });
    }
}

impl Default for RewardAnimation {
    fn default() -> Self {
        Self::new()
    }
}
