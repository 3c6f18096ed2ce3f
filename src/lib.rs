//! Session lifecycle core for a meeting recorder bot.
//!
//! A session is driven by [`state_machine::MeetingStateMachine`] against
//! collaborator traits (browser, provider, recorder, observers) supplied by
//! the embedding binary.

pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod events;
pub mod global;
pub mod meeting;
pub mod paths;
pub mod recording;
pub mod state_machine;

#[cfg(test)]
pub(crate) mod testing;
