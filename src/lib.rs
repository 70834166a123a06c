//! livesignal crate root: re-exports and module wiring.
//!
//! Append-only measurement signals, incremental alignment of two signals
//! onto one time base, and derived (math) channels that update as samples
//! arrive:
//! - `data`: signals, the aligner, math evaluators and XY curves
//! - `events`: per-signal notifications
//! - `channel` / `device` / `session`: ownership of signals and channels
//! - `sink`: hand-off of packets from acquisition threads
//! - `config`: JSON/YAML engine configuration

pub mod channel;
pub mod config;
pub mod data;
pub mod device;
pub mod error;
pub mod events;
pub mod session;
pub mod sink;
pub mod util;

// Public re-exports for a compact external API
pub use channel::{Channel, ChannelKind, MathChannel};
pub use config::{EngineConfig, MathChannelDef};
pub use data::combine::{combine_signals, CombineResult, CombineStatus, CombinedSamples};
pub use data::math::{MathEvaluator, MathInputs, MathKind, MathOp, SignalRef};
pub use data::quantity::{MeasuredQuantity, Quantity, QuantityFlag, Unit};
pub use data::signal::AnalogTimeSignal;
pub use data::xy_curve::XyCurve;
pub use device::{Device, DeviceId, DeviceType};
pub use error::{Error, Result};
pub use events::{EventFilter, SignalEvent, SignalEventKind};
pub use session::Session;
pub use sink::{channel_acquisition, join_acquisition, AcquisitionSink, AnalogPacket};
