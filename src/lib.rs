//! Daily lunch poll bot for a single Telegram group.

pub mod bot;
pub mod classifier;
pub mod config;
pub mod logging;
pub mod message;
pub mod poll;
pub mod schedule;
pub mod telegram;
