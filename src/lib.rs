//! iHeartRadio station listener - shared modules for both binaries.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod listener;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod station;
pub mod sync;
