//! Core bizdesk library (config, session, request pipeline, API wrappers).

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod session;
