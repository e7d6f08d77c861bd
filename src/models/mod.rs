// src/models/mod.rs

pub mod player;
pub mod protocol;
pub mod quiz;
pub mod results;
