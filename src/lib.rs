pub mod annotations;
pub mod cli;
pub mod client;
pub mod config;
pub mod content_types;
pub mod entities;
pub mod error;
pub mod library;
pub mod storage;
pub mod utils;
pub mod web_ui;
