//! services/bot/src/lib.rs

pub mod adapters;
pub mod chat;
pub mod config;
pub mod error;
