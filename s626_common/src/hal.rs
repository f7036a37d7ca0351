//! Board hardware abstraction: driver traits, channel types and configuration.
//!
//! This module contains the capability contract a board driver supplies and
//! the value types shared between the session, the channel store and hosts.

pub mod config;
pub mod driver;
pub mod types;
