//! `cipherhunt` - session engine for a social-deduction match
//!
//! A majority faction completes tasks while hidden saboteurs race to
//! decrypt a secret. This library holds the game rules, the session engine
//! that serializes actions per session, the collaborator interfaces, and
//! the CLI used to run seeded bot matches.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod game;
pub mod observability;
pub mod ports;
