// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod audio;
pub mod config;
pub mod lexicon;
pub mod records;
pub mod reward;
pub mod runtime;
pub mod sentence;
pub mod session;
pub mod staircase;
pub mod util;
