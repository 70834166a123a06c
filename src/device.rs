//! Devices: channel registry, channel groups, fixed power-supply channels and
//! the consumer side of the acquisition feed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelKind, MathChannel, USER_CHANNEL_START_INDEX};
use crate::config::MathChannelDef;
use crate::data::math::{describe_op, MathInputs, MathKind, MathOp, SignalRef};
use crate::data::quantity::{
    lookup_channel_name, ChannelSuffix, MeasuredQuantity, Quantity, Unit, DEFAULT_DECIMAL_PLACES,
    DEFAULT_DIGITS,
};
use crate::data::signal::AnalogTimeSignal;
use crate::error::{Error, Result};
use crate::events::lock;
use crate::sink::{AcquisitionCommand, AnalogPacket};

/// Numeric identifier of a device within its session.
pub type DeviceId = u32;

/// Group used for channels that show up in a packet without being declared.
pub const DEFAULT_CHANNEL_GROUP: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceType {
    /// Power supply or electronic load.
    #[default]
    SourceSink,
    /// Multimeter, scale, thermometer, ...
    Measurement,
    /// Container for user and math channels only.
    User,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceType::SourceSink => "Source/Sink",
            DeviceType::Measurement => "Measurement",
            DeviceType::User => "User",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct DeviceState {
    channels: BTreeMap<String, Arc<Channel>>,
    groups: BTreeMap<String, Vec<Arc<Channel>>>,
    next_hardware_index: u32,
    next_user_index: u32,
    acquisition_start_timestamp: f64,
    /// Math channels waiting for the first signal of one of their inputs.
    pending_math: Vec<MathChannelDef>,
}

#[derive(Debug)]
pub struct Device {
    id: DeviceId,
    name: String,
    device_type: DeviceType,
    default_digits: i32,
    default_decimal_places: i32,
    state: Mutex<DeviceState>,
}

impl Device {
    pub fn new(id: DeviceId, name: impl Into<String>, device_type: DeviceType, acquisition_start_timestamp: f64) -> Self {
        let name = name.into();
        log::info!(
            "New {} device {} ({}), acquisition_start_timestamp = {}",
            device_type,
            name,
            id,
            crate::util::format_time_date(acquisition_start_timestamp)
        );
        Self {
            id,
            name,
            device_type,
            default_digits: DEFAULT_DIGITS,
            default_decimal_places: DEFAULT_DECIMAL_PLACES,
            state: Mutex::new(DeviceState {
                channels: BTreeMap::new(),
                groups: BTreeMap::new(),
                next_hardware_index: 0,
                next_user_index: USER_CHANNEL_START_INDEX,
                acquisition_start_timestamp,
                pending_math: Vec::new(),
            }),
        }
    }

    /// Precision used for packets that carry none.
    pub fn with_default_precision(mut self, digits: i32, decimal_places: i32) -> Self {
        self.default_digits = digits;
        self.default_decimal_places = decimal_places;
        self
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn channel(&self, name: &str) -> Option<Arc<Channel>> {
        lock(&self.state).channels.get(name).cloned()
    }

    /// All channels ordered by name.
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        lock(&self.state).channels.values().cloned().collect()
    }

    pub fn channel_group_names(&self) -> Vec<String> {
        lock(&self.state).groups.keys().cloned().collect()
    }

    /// Channels of `group` in insertion order.
    pub fn channel_group(&self, group: &str) -> Vec<Arc<Channel>> {
        lock(&self.state).groups.get(group).cloned().unwrap_or_default()
    }

    pub fn acquisition_start_timestamp(&self) -> f64 {
        lock(&self.state).acquisition_start_timestamp
    }

    /// Set the acquisition start and pass it on to every channel.
    pub fn set_acquisition_start_timestamp(&self, timestamp: f64) {
        let channels = {
            let mut st = lock(&self.state);
            st.acquisition_start_timestamp = timestamp;
            st.channels.values().cloned().collect::<Vec<_>>()
        };
        log::info!(
            "{}: acquisition start {}",
            self.name,
            crate::util::format_time_date(timestamp)
        );
        for channel in channels {
            channel.set_start_timestamp(timestamp);
        }
    }

    fn insert_channel(st: &mut DeviceState, channel: &Arc<Channel>, group: &str) {
        st.channels
            .entry(channel.name().to_string())
            .or_insert_with(|| Arc::clone(channel));
        let members = st.groups.entry(group.to_string()).or_default();
        if !members.iter().any(|c| Arc::ptr_eq(c, channel)) {
            members.push(Arc::clone(channel));
        }
        channel.add_group(group);
    }

    /// Add a hardware channel to `group`. A hardware channel of the same name
    /// is reused and only joins the group; a user or math channel of that
    /// name is an error.
    pub fn add_hardware_channel(&self, name: &str, group: &str) -> Result<Arc<Channel>> {
        let mut st = lock(&self.state);
        let existing = st.channels.get(name).cloned();
        let channel = match existing {
            Some(existing) if existing.kind() == ChannelKind::Analog => existing,
            Some(existing) => {
                log::warn!(
                    "{}: {} is a {} channel and cannot take hardware samples",
                    self.name,
                    name,
                    existing.kind()
                );
                return Err(Error::ChannelExists(name.to_string()));
            }
            None => {
                let index = st.next_hardware_index;
                st.next_hardware_index += 1;
                Arc::new(Channel::new(
                    name,
                    index,
                    ChannelKind::Analog,
                    group,
                    st.acquisition_start_timestamp,
                ))
            }
        };
        Self::insert_channel(&mut st, &channel, group);
        Ok(channel)
    }

    pub fn add_user_channel(&self, name: &str, group: &str) -> Result<Arc<Channel>> {
        let mut st = lock(&self.state);
        if st.channels.contains_key(name) {
            return Err(Error::ChannelExists(name.to_string()));
        }
        let index = st.next_user_index;
        st.next_user_index += 1;
        let channel = Arc::new(Channel::new(
            name,
            index,
            ChannelKind::User,
            group,
            st.acquisition_start_timestamp,
        ));
        Self::insert_channel(&mut st, &channel, group);
        log::info!("{}: user channel {} added to group '{}'", self.name, name, group);
        Ok(channel)
    }

    /// Actual signal of the channel named by `signal_ref`.
    pub fn resolve_signal(&self, signal_ref: &SignalRef) -> Result<Arc<AnalogTimeSignal>> {
        let channel = self
            .channel(&signal_ref.0)
            .ok_or_else(|| Error::UnknownChannel(signal_ref.0.clone()))?;
        channel
            .actual_signal()
            .ok_or_else(|| Error::NoActualSignal(signal_ref.0.clone()))
    }

    fn resolve_inputs(&self, op: &MathOp) -> Result<MathInputs> {
        let signals = op
            .inputs()
            .into_iter()
            .map(|r| self.resolve_signal(r))
            .collect::<Result<Vec<_>>>()?;
        let mut it = signals.into_iter();
        match (it.next(), it.next()) {
            (Some(a), Some(b)) => Ok(MathInputs::Pair(a, b)),
            (Some(a), None) => Ok(MathInputs::Single(a)),
            _ => Err(Error::InputArity {
                op: op.kind().name(),
                expected: op.kind().input_count(),
            }),
        }
    }

    /// Create a math channel from a definition whose inputs are channel names
    /// on this device.
    pub fn add_math_channel(&self, def: &MathChannelDef) -> Result<Arc<Channel>> {
        let inputs = self.resolve_inputs(&def.op)?;
        let channel = self.create_math_channel(
            &def.name,
            &def.group,
            def.measured_quantity(),
            def.unit,
            def.op.kind(),
            inputs,
        )?;
        log::info!("{}: {} = {}", self.name, def.name, describe_op(&def.op));
        Ok(channel)
    }

    /// Like [`Device::add_math_channel`], but an input channel that has no
    /// signal yet (a plain hardware channel before its first packet, or a
    /// math channel still waiting itself) defers the creation. Deferred
    /// channels are built by [`Device::resolve_pending_math_channels`], which
    /// runs after every fed packet.
    ///
    /// Returns `None` when the channel was deferred.
    pub fn declare_math_channel(&self, def: &MathChannelDef) -> Result<Option<Arc<Channel>>> {
        {
            let st = lock(&self.state);
            if st.channels.contains_key(&def.name) || st.pending_math.iter().any(|d| d.name == def.name) {
                return Err(Error::ChannelExists(def.name.clone()));
            }
        }
        if self.waits_for_input_signal(&def.op)? {
            log::info!("{}: {} deferred until its inputs have signals", self.name, def.name);
            lock(&self.state).pending_math.push(def.clone());
            return Ok(None);
        }
        self.add_math_channel(def).map(Some)
    }

    /// Names of the math channels still waiting for input signals.
    pub fn pending_math_channels(&self) -> Vec<String> {
        lock(&self.state).pending_math.iter().map(|d| d.name.clone()).collect()
    }

    /// Build every deferred math channel whose inputs now have signals, in
    /// declaration order. Returns the channels created.
    pub fn resolve_pending_math_channels(&self) -> Result<Vec<Arc<Channel>>> {
        let pending = lock(&self.state).pending_math.clone();
        let mut created = Vec::new();
        for def in pending {
            if self.waits_for_input_signal(&def.op)? {
                continue;
            }
            lock(&self.state).pending_math.retain(|d| d.name != def.name);
            created.push(self.add_math_channel(&def)?);
        }
        Ok(created)
    }

    fn waits_for_input_signal(&self, op: &MathOp) -> Result<bool> {
        let st = lock(&self.state);
        let mut waits = false;
        for input in op.inputs() {
            match st.channels.get(&input.0) {
                Some(channel) => waits |= channel.actual_signal().is_none(),
                None if st.pending_math.iter().any(|d| d.name == input.0) => waits = true,
                None => return Err(Error::UnknownChannel(input.0.clone())),
            }
        }
        Ok(waits)
    }

    /// Create a math channel over already resolved input signals.
    pub fn create_math_channel(
        &self,
        name: &str,
        group: &str,
        quantity: MeasuredQuantity,
        unit: Unit,
        kind: MathKind,
        inputs: MathInputs,
    ) -> Result<Arc<Channel>> {
        let start_timestamp = {
            let st = lock(&self.state);
            if st.channels.contains_key(name) {
                return Err(Error::ChannelExists(name.to_string()));
            }
            st.acquisition_start_timestamp
        };
        // Built outside the device lock; creation drains the inputs.
        let math = MathChannel::new(name, quantity, unit, kind, inputs, start_timestamp)?;

        let mut st = lock(&self.state);
        if st.channels.contains_key(name) {
            return Err(Error::ChannelExists(name.to_string()));
        }
        let index = st.next_user_index;
        st.next_user_index += 1;
        let channel = Arc::new(Channel::new_math(index, group, start_timestamp, math));
        Self::insert_channel(&mut st, &channel, group);
        Ok(channel)
    }

    /// Pre-create the signals of power-supply style channels from their
    /// names and add the derived P, R, Wh and Ah channels per group.
    ///
    /// Returns the math channels that were created.
    pub fn init_fixed_channels(&self) -> Result<Vec<Arc<Channel>>> {
        let groups: Vec<(String, Vec<Arc<Channel>>)> = {
            let st = lock(&self.state);
            st.groups.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let mut created = Vec::new();
        for (group, channels) in groups {
            let mut suffix = ChannelSuffix::new();
            for channel in channels.iter().filter(|c| c.kind() == ChannelKind::Analog) {
                let Some(prefix) = lookup_channel_name(channel.name()) else {
                    continue;
                };
                suffix.observe(channel.name(), prefix.prefixes);
                let mq = prefix.measured_quantity();
                channel.set_fixed_signal(true);
                if channel.signals_for(&mq).is_empty() {
                    channel.add_signal(mq, prefix.unit);
                }
            }
            created.extend(self.add_power_supply_channels(&group, &channels, suffix.as_str())?);
        }
        Ok(created)
    }

    fn add_power_supply_channels(
        &self,
        group: &str,
        channels: &[Arc<Channel>],
        suffix: &str,
    ) -> Result<Vec<Arc<Channel>>> {
        let fixed_signal = |quantity: Quantity| {
            channels
                .iter()
                .filter(|c| c.fixed_signal())
                .filter_map(|c| c.actual_signal())
                .find(|s| s.quantity() == quantity)
        };
        let voltage = fixed_signal(Quantity::Voltage);
        let current = fixed_signal(Quantity::Current);
        let mut power = fixed_signal(Quantity::Power);
        let resistance = fixed_signal(Quantity::Resistance);
        let energy = fixed_signal(Quantity::Energy);
        let charge = fixed_signal(Quantity::ElectricCharge);

        let mut created = Vec::new();
        if let (Some(v), Some(i)) = (&voltage, &current) {
            if power.is_none() {
                let ch = self.create_math_channel(
                    &format!("P{suffix}"),
                    group,
                    MeasuredQuantity::plain(Quantity::Power),
                    Unit::Watt,
                    MathKind::Multiply,
                    MathInputs::Pair(Arc::clone(v), Arc::clone(i)),
                )?;
                power = ch.actual_signal();
                created.push(ch);
            }
            if resistance.is_none() {
                created.push(self.create_math_channel(
                    &format!("R{suffix}"),
                    group,
                    MeasuredQuantity::plain(Quantity::Resistance),
                    Unit::Ohm,
                    MathKind::Divide,
                    MathInputs::Pair(Arc::clone(v), Arc::clone(i)),
                )?);
            }
        }
        if let (Some(p), None) = (&power, &energy) {
            created.push(self.create_math_channel(
                &format!("Wh{suffix}"),
                group,
                MeasuredQuantity::plain(Quantity::Energy),
                Unit::WattHour,
                MathKind::Integrate,
                MathInputs::Single(Arc::clone(p)),
            )?);
        }
        if let (Some(i), None) = (&current, &charge) {
            created.push(self.create_math_channel(
                &format!("Ah{suffix}"),
                group,
                MeasuredQuantity::plain(Quantity::ElectricCharge),
                Unit::AmpereHour,
                MathKind::Integrate,
                MathInputs::Single(Arc::clone(i)),
            )?);
        }
        for ch in &created {
            log::info!("{}: created {} in group '{}'", self.name, ch.name(), group);
        }
        Ok(created)
    }

    /// Route one analog packet to its channels. Channels not seen before are
    /// created in [`DEFAULT_CHANNEL_GROUP`].
    pub fn feed_in_analog(&self, packet: &AnalogPacket) -> Result<()> {
        let digits = packet.digits.unwrap_or(self.default_digits);
        let decimal_places = packet.decimal_places.unwrap_or(self.default_decimal_places);
        for (offset, name) in packet.channels.iter().enumerate() {
            let channel = match self.channel(name) {
                Some(c) => c,
                None => {
                    log::warn!("{}: channel {} not found, adding", self.name, name);
                    self.add_hardware_channel(name, DEFAULT_CHANNEL_GROUP)?
                }
            };
            channel.push_interleaved_samples(packet, offset, digits, decimal_places)?;
        }
        self.resolve_pending_math_channels()?;
        Ok(())
    }

    pub fn handle_command(&self, cmd: AcquisitionCommand) -> Result<()> {
        match cmd {
            AcquisitionCommand::Analog(packet) => self.feed_in_analog(&packet),
            AcquisitionCommand::StartTimestamp(ts) => {
                self.set_acquisition_start_timestamp(ts);
                Ok(())
            }
        }
    }

    /// Handle every command currently queued without blocking. Returns the
    /// number of commands handled.
    pub fn process_pending(&self, rx: &Receiver<AcquisitionCommand>) -> Result<usize> {
        let mut handled = 0;
        loop {
            match rx.try_recv() {
                Ok(cmd) => {
                    self.handle_command(cmd)?;
                    handled += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(handled),
            }
        }
    }

    /// Block and handle commands until every sink has been dropped.
    pub fn run_until_closed(&self, rx: &Receiver<AcquisitionCommand>) -> Result<usize> {
        let mut handled = 0;
        while let Ok(cmd) = rx.recv() {
            self.handle_command(cmd)?;
            handled += 1;
        }
        log::debug!("{}: acquisition closed after {} command(s)", self.name, handled);
        Ok(handled)
    }
}
