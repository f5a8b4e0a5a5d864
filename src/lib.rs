//! Git object store, pack reader and smart HTTP clone client
//!
//! The [`areas`] and [`artifacts`] modules form the engine; [`commands`] holds
//! the command shell built on top of [`areas::repository::Repository`].

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod errors;
