// src/practice/mod.rs
//
// Guided practice mode.
//
// A session starts at a configured tempo and walks it toward a target:
// enough passes raise the tempo by a fixed step, failures lower it, and
// repeated failures or long sessions suggest a break. Tempos counted in
// different note values are compared by their pulse rate (bpm / unit).

mod engine;
mod journal;
mod session;
mod settings;

pub use engine::*;
pub use journal::*;
pub use session::*;
pub use settings::*;
