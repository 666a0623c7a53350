// src/core/mod.rs

pub mod arg_parser;
pub mod config_loader;
pub mod context;
pub mod declared;
pub mod discovery;
pub mod engine;
pub mod lexer;
pub mod loader;
pub mod lookup;
pub mod media;
pub mod options;
pub mod query;
pub mod registry;
pub mod render;
pub mod template;
pub mod values;
pub mod widget;
