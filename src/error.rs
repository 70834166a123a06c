//! Crate-wide error type.
//!
//! Numeric edge cases (division by zero, interpolation outside the recorded
//! range, overflow readings) are never errors; they are handled locally with
//! sentinels. Only structural problems end up here.

use thiserror::Error;

use crate::data::quantity::MeasuredQuantity;

#[derive(Debug, Error)]
pub enum Error {
    #[error("more than one signal found for {quantity} on channel {channel}")]
    DuplicateSignal {
        channel: String,
        quantity: MeasuredQuantity,
    },
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    #[error("unknown device: {0}")]
    UnknownDevice(String),
    #[error("channel {0} already exists")]
    ChannelExists(String),
    #[error("channel {0} has no signal yet")]
    NoActualSignal(String),
    #[error("channel {0} does not accept pushed samples")]
    ReadOnlyChannel(String),
    #[error("moving average window must be greater than zero")]
    InvalidWindow,
    #[error("{op} expects {expected} input signal(s)")]
    InputArity { op: &'static str, expected: usize },
    #[error("unsupported config file extension: {0}")]
    UnsupportedConfig(String),
    #[error("acquisition sink is closed")]
    SinkClosed,
    #[error("acquisition thread panicked: {0}")]
    AcquisitionPanicked(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
