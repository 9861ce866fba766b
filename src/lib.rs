//! Causerie is a terminal-first chat workbench for remote generative-language
//! models.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns domain state: sampling parameters, prompt templates, the
//!   chat-session collection, and the session manager that orders every
//!   exchange and reconciles replies into the record.
//! - [`generation`] issues outbound generation requests, classifies provider
//!   failures, and synthesizes the degraded replies that keep the chat alive
//!   when the provider is not.
//! - [`persistence`] serializes the session collection and theme preference
//!   to durable local storage and tolerates missing or corrupt payloads.
//! - [`ui`] renders the terminal interface and runs the interactive event
//!   loop that drives user input and display updates.
//! - [`api`] defines the JSON payloads exchanged with the generation
//!   endpoint and its read-only catalog endpoints.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::run`], which dispatches into [`ui::chat_loop`] for
//! interactive sessions and the one-shot subcommands otherwise.

pub mod api;
pub mod cli;
pub mod core;
pub mod generation;
pub mod persistence;
pub mod ui;
pub mod utils;
