//! Personal Spotify listening statistics.
//!
//! `spotistat` logs in to the Spotify Web API with the implicit grant,
//! fetches listening history and catalog data through a short-lived cache,
//! and derives the figures of a listening dashboard: top tracks and artists,
//! a genre breakdown, listening totals and a listener personality. It can
//! also control playback on the active device.
//!
//! # Modules
//!
//! * [`auth`] - authorization URL and callback handling
//! * [`session`] - session validity and expiry polling
//! * [`api`] - Web API operations
//! * [`stats`] - derived figures
//! * [`cache`], [`http`] - request plumbing
//! * [`store`], [`config`] - local state and settings
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod nonce;
pub mod protocol;
pub mod schedule;
pub mod session;
pub mod share;
pub mod stats;
pub mod store;
pub mod tokens;
pub mod util;
