// src/engine/mod.rs

pub mod emitter;
pub mod leaderboard;
pub mod registry;
pub mod scoring;
pub mod session;
pub mod timer;
