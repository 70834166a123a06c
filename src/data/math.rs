//! Math channels: signals derived from one or two other signals.
//!
//! This module defines serde-serializable descriptions of the supported
//! operations ([`MathOp`], referencing inputs by channel name) and the
//! incremental evaluation engine ([`MathEvaluator`]). An evaluator owns
//! private read cursors into its inputs and produces output samples only for
//! input samples it has not consumed yet, so it can be stepped after every
//! append notification.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::combine::{combine_signals, CombinedSamples};
use crate::data::signal::AnalogTimeSignal;
use crate::error::{Error, Result};

/// Seconds per hour; integration yields "unit x hour" (Wh, Ah).
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Identifier of an input channel by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalRef(pub String);

impl From<&str> for SignalRef {
    fn from(s: &str) -> Self {
        SignalRef(s.to_string())
    }
}

/// Math operation with its inputs referenced by channel name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MathOp {
    /// a * b, time-aligned
    Multiply { a: SignalRef, b: SignalRef },
    /// dividend / divisor, time-aligned
    Divide { dividend: SignalRef, divisor: SignalRef },
    /// input * factor
    MultiplyFactor { input: SignalRef, factor: f64 },
    /// input + constant
    AddConstant { input: SignalRef, constant: f64 },
    /// Mean of the last `window` samples
    MovingAverage { input: SignalRef, window: usize },
    /// ∫ input dt, with dt in hours
    Integrate { input: SignalRef },
}

impl MathOp {
    pub fn kind(&self) -> MathKind {
        match self {
            MathOp::Multiply { .. } => MathKind::Multiply,
            MathOp::Divide { .. } => MathKind::Divide,
            MathOp::MultiplyFactor { factor, .. } => MathKind::MultiplyFactor { factor: *factor },
            MathOp::AddConstant { constant, .. } => MathKind::AddConstant { constant: *constant },
            MathOp::MovingAverage { window, .. } => MathKind::MovingAverage { window: *window },
            MathOp::Integrate { .. } => MathKind::Integrate,
        }
    }

    /// Referenced inputs in evaluation order.
    pub fn inputs(&self) -> Vec<&SignalRef> {
        match self {
            MathOp::Multiply { a, b } => vec![a, b],
            MathOp::Divide { dividend, divisor } => vec![dividend, divisor],
            MathOp::MultiplyFactor { input, .. }
            | MathOp::AddConstant { input, .. }
            | MathOp::MovingAverage { input, .. }
            | MathOp::Integrate { input } => vec![input],
        }
    }
}

/// Math operation without input references.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MathKind {
    Multiply,
    Divide,
    MultiplyFactor { factor: f64 },
    AddConstant { constant: f64 },
    MovingAverage { window: usize },
    Integrate,
}

impl MathKind {
    pub fn name(&self) -> &'static str {
        match self {
            MathKind::Multiply => "Multiply",
            MathKind::Divide => "Divide",
            MathKind::MultiplyFactor { .. } => "MultiplyFactor",
            MathKind::AddConstant { .. } => "AddConstant",
            MathKind::MovingAverage { .. } => "MovingAverage",
            MathKind::Integrate => "Integrate",
        }
    }

    pub fn input_count(&self) -> usize {
        match self {
            MathKind::Multiply | MathKind::Divide => 2,
            _ => 1,
        }
    }
}

/// Human readable formula, used for channel info strings and logs.
pub fn describe_op(op: &MathOp) -> String {
    match op {
        MathOp::Multiply { a, b } => format!("{} * {}", a.0, b.0),
        MathOp::Divide { dividend, divisor } => format!("{} / {}", dividend.0, divisor.0),
        MathOp::MultiplyFactor { input, factor } => format!("{factor} * {}", input.0),
        MathOp::AddConstant { input, constant } => format!("{} + {constant}", input.0),
        MathOp::MovingAverage { input, window } => format!("avg({}, n={window})", input.0),
        MathOp::Integrate { input } => format!("∫ {} dt", input.0),
    }
}

/// Division with the sentinel used for a zero divisor:
/// `f64::MAX` for a positive dividend, `f64::MIN` otherwise.
#[inline]
pub fn divide(dividend: f64, divisor: f64) -> f64 {
    if divisor == 0.0 {
        if dividend > 0.0 {
            f64::MAX
        } else {
            f64::MIN
        }
    } else {
        dividend / divisor
    }
}

/// Resolved input signals of an evaluator.
#[derive(Debug, Clone)]
pub enum MathInputs {
    Single(Arc<AnalogTimeSignal>),
    Pair(Arc<AnalogTimeSignal>, Arc<AnalogTimeSignal>),
}

impl MathInputs {
    pub fn signals(&self) -> Vec<&Arc<AnalogTimeSignal>> {
        match self {
            MathInputs::Single(s) => vec![s],
            MathInputs::Pair(a, b) => vec![a, b],
        }
    }

    fn len(&self) -> usize {
        match self {
            MathInputs::Single(_) => 1,
            MathInputs::Pair(..) => 2,
        }
    }
}

/// Per-evaluator runtime state carried across steps.
#[derive(Debug, Clone, PartialEq)]
pub enum MathState {
    /// Two time-aligned inputs.
    Aligned { pos1: usize, pos2: usize },
    /// One input, sample-by-sample mapping.
    Mapped { pos: usize },
    /// Zero-initialised ring buffer; the mean includes unfilled slots.
    MovingAverage { pos: usize, ring: Vec<f64> },
    Integrate { pos: usize, last_timestamp: f64, last_value: f64 },
}

impl MathState {
    fn new(kind: &MathKind, start_timestamp: f64) -> Result<Self> {
        Ok(match kind {
            MathKind::Multiply | MathKind::Divide => MathState::Aligned { pos1: 0, pos2: 0 },
            MathKind::MultiplyFactor { .. } | MathKind::AddConstant { .. } => MathState::Mapped { pos: 0 },
            MathKind::MovingAverage { window } => {
                if *window == 0 {
                    return Err(Error::InvalidWindow);
                }
                MathState::MovingAverage {
                    pos: 0,
                    ring: vec![0.0; *window],
                }
            }
            MathKind::Integrate => MathState::Integrate {
                pos: 0,
                last_timestamp: start_timestamp,
                last_value: 0.0,
            },
        })
    }
}

/// Incremental evaluator: operation, resolved inputs and state.
#[derive(Debug)]
pub struct MathEvaluator {
    kind: MathKind,
    inputs: MathInputs,
    state: MathState,
}

impl MathEvaluator {
    /// `start_timestamp` seeds the integration's last timestamp.
    pub fn new(kind: MathKind, inputs: MathInputs, start_timestamp: f64) -> Result<Self> {
        if inputs.len() != kind.input_count() {
            return Err(Error::InputArity {
                op: kind.name(),
                expected: kind.input_count(),
            });
        }
        let state = MathState::new(&kind, start_timestamp)?;
        Ok(Self { kind, inputs, state })
    }

    pub fn kind(&self) -> &MathKind {
        &self.kind
    }

    pub fn inputs(&self) -> &MathInputs {
        &self.inputs
    }

    pub fn state(&self) -> &MathState {
        &self.state
    }

    /// Output precision: the larger digits and the smaller decimal places of
    /// two inputs, or a copy of the single input's precision.
    pub fn output_precision(&self) -> (i32, i32) {
        match &self.inputs {
            MathInputs::Single(s) => (s.digits(), s.decimal_places()),
            MathInputs::Pair(a, b) => (
                a.digits().max(b.digits()),
                a.decimal_places().min(b.decimal_places()),
            ),
        }
    }

    /// An integration that has not seen a start timestamp yet (negative)
    /// adopts the channel's new start timestamp.
    pub fn on_start_timestamp_changed(&mut self, timestamp: f64) {
        if let MathState::Integrate { last_timestamp, .. } = &mut self.state {
            if *last_timestamp < 0.0 {
                *last_timestamp = timestamp;
            }
        }
    }

    /// Consume all newly available input samples and return `[t, y]` output
    /// points in input order.
    pub fn step(&mut self) -> Vec<[f64; 2]> {
        let mut out = Vec::new();
        match (&self.kind, &self.inputs, &mut self.state) {
            (kind @ (MathKind::Multiply | MathKind::Divide), MathInputs::Pair(s1, s2), MathState::Aligned { pos1, pos2 }) => {
                let mut combined = CombinedSamples::new();
                let res = combine_signals(s1, pos1, s2, pos2, &mut combined);
                log::trace!("{} {} / {}: {:?}", kind.name(), s1.name(), s2.name(), res);
                out.reserve(combined.len());
                for (t, v1, v2) in combined.iter() {
                    let y = match kind {
                        MathKind::Multiply => v1 * v2,
                        _ => divide(v1, v2),
                    };
                    out.push([t, y]);
                }
            }
            (MathKind::MultiplyFactor { factor }, MathInputs::Single(s), MathState::Mapped { pos }) => {
                drain(s, pos, |t, v| out.push([t, v * factor]));
            }
            (MathKind::AddConstant { constant }, MathInputs::Single(s), MathState::Mapped { pos }) => {
                drain(s, pos, |t, v| out.push([t, v + constant]));
            }
            (MathKind::MovingAverage { .. }, MathInputs::Single(s), MathState::MovingAverage { pos, ring }) => {
                let window = ring.len();
                let count = s.sample_count();
                while *pos < count {
                    let (t, v) = s.get_sample(*pos, false);
                    ring[*pos % window] = v;
                    let mean = ring.iter().sum::<f64>() / window as f64;
                    out.push([t, mean]);
                    *pos += 1;
                }
            }
            (MathKind::Integrate, MathInputs::Single(s), MathState::Integrate { pos, last_timestamp, last_value }) => {
                drain(s, pos, |t, rate| {
                    let elapsed_hours = (t - *last_timestamp) / SECONDS_PER_HOUR;
                    let value = *last_value + rate * elapsed_hours;
                    out.push([t, value]);
                    *last_timestamp = t;
                    *last_value = value;
                });
            }
            (kind, _, state) => {
                log::error!("math state {:?} does not match {}", state, kind.name());
            }
        }
        out
    }
}

/// Feed every unread sample of `signal` to `f`, advancing `pos`.
fn drain(signal: &AnalogTimeSignal, pos: &mut usize, mut f: impl FnMut(f64, f64)) {
    let count = signal.sample_count();
    while *pos < count {
        let (t, v) = signal.get_sample(*pos, false);
        f(t, v);
        *pos += 1;
    }
}
