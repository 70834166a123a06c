//! Channels: named owners of one or more signals.
//!
//! A channel keeps its signals keyed by [`MeasuredQuantity`]. Exactly one of
//! them is the *actual* signal, the one new samples go to. Incoming samples
//! whose measured quantity differs from the actual signal switch the actual
//! signal, creating it if necessary.

pub mod math;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::data::quantity::{MeasuredQuantity, Unit};
use crate::data::signal::AnalogTimeSignal;
use crate::error::{Error, Result};
use crate::events::lock;
use crate::sink::AnalogPacket;

pub use math::MathChannel;

/// Index of the first channel not backed by hardware.
pub const USER_CHANNEL_START_INDEX: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Fed by device packets.
    Analog,
    /// Fed by user code or scripts.
    User,
    /// Output of a math evaluator.
    Math,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelKind::Analog => "Analog",
            ChannelKind::User => "User",
            ChannelKind::Math => "Math",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct ChannelState {
    groups: Vec<String>,
    signals: BTreeMap<MeasuredQuantity, Vec<Arc<AnalogTimeSignal>>>,
    actual: Option<Arc<AnalogTimeSignal>>,
    start_timestamp: f64,
    fixed_signal: bool,
}

#[derive(Debug)]
pub struct Channel {
    name: String,
    index: u32,
    kind: ChannelKind,
    state: Mutex<ChannelState>,
    math: Option<Arc<MathChannel>>,
}

impl Channel {
    pub fn new(name: impl Into<String>, index: u32, kind: ChannelKind, group: &str, start_timestamp: f64) -> Self {
        let name = name.into();
        log::debug!("Init {} channel {} (index {})", kind, name, index);
        Self {
            name,
            index,
            kind,
            state: Mutex::new(ChannelState {
                groups: vec![group.to_string()],
                signals: BTreeMap::new(),
                actual: None,
                start_timestamp,
                fixed_signal: false,
            }),
            math: None,
        }
    }

    /// Wrap a math channel; its output signal becomes the fixed actual signal.
    pub(crate) fn new_math(index: u32, group: &str, start_timestamp: f64, math: Arc<MathChannel>) -> Self {
        let mut channel = Self::new(math.name(), index, ChannelKind::Math, group, start_timestamp);
        {
            let state = channel.state.get_mut().unwrap_or_else(std::sync::PoisonError::into_inner);
            let output = Arc::clone(math.output());
            state.fixed_signal = true;
            state
                .signals
                .insert(output.measured_quantity().clone(), vec![Arc::clone(&output)]);
            state.actual = Some(output);
        }
        channel.math = Some(math);
        channel
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn math(&self) -> Option<&Arc<MathChannel>> {
        self.math.as_ref()
    }

    pub fn groups(&self) -> Vec<String> {
        lock(&self.state).groups.clone()
    }

    pub(crate) fn add_group(&self, group: &str) {
        let mut st = lock(&self.state);
        if !st.groups.iter().any(|g| g == group) {
            st.groups.push(group.to_string());
        }
    }

    pub fn fixed_signal(&self) -> bool {
        lock(&self.state).fixed_signal
    }

    pub fn set_fixed_signal(&self, fixed: bool) {
        lock(&self.state).fixed_signal = fixed;
    }

    pub fn start_timestamp(&self) -> f64 {
        lock(&self.state).start_timestamp
    }

    pub fn actual_signal(&self) -> Option<Arc<AnalogTimeSignal>> {
        lock(&self.state).actual.clone()
    }

    /// All signals, ordered by measured quantity.
    pub fn signals(&self) -> Vec<Arc<AnalogTimeSignal>> {
        lock(&self.state).signals.values().flatten().cloned().collect()
    }

    pub fn signals_for(&self, quantity: &MeasuredQuantity) -> Vec<Arc<AnalogTimeSignal>> {
        lock(&self.state).signals.get(quantity).cloned().unwrap_or_default()
    }

    /// Create a new signal and make it the actual one.
    ///
    /// Adding to a fixed channel that already has a signal only logs a
    /// warning; the signal is created anyway.
    pub fn add_signal(&self, quantity: MeasuredQuantity, unit: Unit) -> Arc<AnalogTimeSignal> {
        let mut st = lock(&self.state);
        self.add_signal_locked(&mut st, quantity, unit)
    }

    fn add_signal_locked(
        &self,
        st: &mut ChannelState,
        quantity: MeasuredQuantity,
        unit: Unit,
    ) -> Arc<AnalogTimeSignal> {
        if st.fixed_signal {
            if let Some(actual) = &st.actual {
                log::warn!(
                    "Adding unexpected signal {} to fixed channel {} with existing signal {}",
                    quantity,
                    self.name,
                    actual.measured_quantity()
                );
            }
        }
        let signal = AnalogTimeSignal::new_shared(quantity.clone(), unit, self.name.as_str(), st.start_timestamp);
        st.signals.entry(quantity).or_default().push(Arc::clone(&signal));
        st.actual = Some(Arc::clone(&signal));
        signal
    }

    /// Make the signal for `quantity` the actual one, creating it if needed.
    fn select_signal(&self, st: &mut ChannelState, quantity: &MeasuredQuantity, unit: Unit) -> Result<Arc<AnalogTimeSignal>> {
        if let Some(actual) = &st.actual {
            if actual.measured_quantity() == quantity {
                return Ok(Arc::clone(actual));
            }
        }

        let candidates = st.signals.get(quantity).cloned().unwrap_or_default();
        match candidates.as_slice() {
            [] => {
                let signal = self.add_signal_locked(st, quantity.clone(), unit);
                log::warn!("{}: signal {} was not found and was therefore created", self.name, quantity);
                Ok(signal)
            }
            [only] => {
                st.actual = Some(Arc::clone(only));
                Ok(Arc::clone(only))
            }
            [first, ..] => {
                if self.kind != ChannelKind::User {
                    return Err(Error::DuplicateSignal {
                        channel: self.name.clone(),
                        quantity: quantity.clone(),
                    });
                }
                log::warn!(
                    "{}: more than one signal found for {}, using the first one",
                    self.name,
                    quantity
                );
                st.actual = Some(Arc::clone(first));
                Ok(Arc::clone(first))
            }
        }
    }

    fn writable(&self) -> Result<()> {
        if self.kind == ChannelKind::Math {
            return Err(Error::ReadOnlyChannel(self.name.clone()));
        }
        Ok(())
    }

    /// Append one sample to the signal matching `quantity`.
    pub fn push_sample(
        &self,
        value: f64,
        timestamp: f64,
        quantity: &MeasuredQuantity,
        unit: Unit,
        digits: i32,
        decimal_places: i32,
    ) -> Result<()> {
        self.writable()?;
        let signal = {
            let mut st = lock(&self.state);
            self.select_signal(&mut st, quantity, unit)?
        };
        signal.append(value, timestamp, digits, decimal_places);
        Ok(())
    }

    /// Append several equally spaced samples as one batch.
    #[allow(clippy::too_many_arguments)]
    pub fn push_samples(
        &self,
        values: &[f64],
        timestamp: f64,
        sample_interval: f64,
        quantity: &MeasuredQuantity,
        unit: Unit,
        digits: i32,
        decimal_places: i32,
    ) -> Result<()> {
        self.writable()?;
        let signal = {
            let mut st = lock(&self.state);
            self.select_signal(&mut st, quantity, unit)?
        };
        signal.append_batch(values, timestamp, sample_interval, digits, decimal_places);
        Ok(())
    }

    /// Deinterleave this channel's samples (at `offset`) out of `packet` and
    /// append them to the matching signal.
    pub fn push_interleaved_samples(
        &self,
        packet: &AnalogPacket,
        offset: usize,
        digits: i32,
        decimal_places: i32,
    ) -> Result<()> {
        self.writable()?;
        let signal = {
            let mut st = lock(&self.state);
            self.select_signal(&mut st, &packet.quantity, packet.unit)?
        };
        let samples = packet.channel_samples(offset);
        log::debug!(
            "{}: {} sample(s) at {}",
            self.name,
            samples.len(),
            crate::util::format_time_date(packet.timestamp)
        );
        signal.append_batch_f32(&samples, packet.timestamp, packet.sample_interval(), digits, decimal_places);
        Ok(())
    }

    /// Propagate a new start timestamp to every signal (and the evaluator of
    /// a math channel).
    pub fn set_start_timestamp(&self, timestamp: f64) {
        let signals = {
            let mut st = lock(&self.state);
            st.start_timestamp = timestamp;
            st.signals.values().flatten().cloned().collect::<Vec<_>>()
        };
        for signal in signals {
            signal.set_signal_start_timestamp(timestamp);
        }
        if let Some(math) = &self.math {
            math.on_start_timestamp_changed(timestamp);
        }
    }
}
