// src/handlers/mod.rs

pub mod room;
pub mod ws;
