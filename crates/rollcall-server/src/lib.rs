//! # rollcall-server
//!
//! The rollcall agent: owns one scan session and exposes its status,
//! manual check-in and identity over a local REST API.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod shutdown;
pub mod state;
