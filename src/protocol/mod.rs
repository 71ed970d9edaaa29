//! Wire types for the Spotify accounts service and Web API.
//!
//! # Submodules
//!
//! * [`auth`] - implicit-grant callback parameters
//! * [`web_api`] - Web API response and request bodies
//!
//! Remote entities are pass-through data: fields that Spotify may omit or
//! send as `null` are `Option`s or defaulted, so that a partially filled
//! object never fails to parse.

pub mod auth;
pub mod web_api;

use std::fmt::Debug;

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Parses and logs a JSON value received from `origin`.
///
/// # Errors
///
/// Returns error if the JSON structure doesn't match type `T`.
///
/// # Logging
///
/// * Success: logs the parsed structure at TRACE level
/// * Failure: logs the error at ERROR level and the raw JSON at TRACE level
pub fn from_value<T>(value: serde_json::Value, origin: &str) -> Result<T>
where
    T: DeserializeOwned + Debug,
{
    // Keep a copy only when it may be logged.
    let raw = log_enabled!(log::Level::Trace).then(|| value.clone());

    match serde_json::from_value::<T>(value) {
        Ok(result) => {
            trace!("{origin}: {result:#?}");
            Ok(result)
        }
        Err(e) => {
            error!("{origin}: failed parsing response ({e})");
            if let Some(raw) = raw {
                trace!("{origin}: {raw:#}");
            }
            Err(e.into())
        }
    }
}
