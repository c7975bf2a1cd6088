//! Light actuators: the devices that physically switch the busy light.

mod vesync;

pub use vesync::VeSyncClient;

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Failure to switch the light.
#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
    },
    #[error("login failed: {0}")]
    Auth(String),
    #[error("{endpoint} returned code {code}: {msg}")]
    Api {
        endpoint: String,
        code: i64,
        msg: String,
    },
    /// No supported outlet, optionally restricted to the given name.
    #[error("no supported outlet found (name: {0:?})")]
    NoOutlet(Option<String>),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Something that can turn the light on or off.
///
/// Calls are idempotent: switching to the current state is harmless.
pub trait LightActuator: Send + Sync {
    fn set_light_state(&self, on: bool) -> impl Future<Output = Result<(), ActuatorError>> + Send;
}
