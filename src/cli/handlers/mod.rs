// src/cli/handlers/mod.rs

pub mod check;
pub mod commons;
pub mod lex;
pub mod list;
pub mod media;
pub mod render;
