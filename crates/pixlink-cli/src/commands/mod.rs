pub mod auth_cmd;
pub mod chat;
pub mod common;
pub mod completions;
pub mod config;
pub mod gallery;
pub mod generate;
pub mod image;
pub mod language;
pub mod profile;
pub mod upload;
