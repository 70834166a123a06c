//! Physical quantities, quantity flags and units, plus the channel-name
//! conventions used to pre-initialise power supply channels.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Total digits used by channel producers when the device does not report any.
pub const DEFAULT_DIGITS: i32 = 6;
/// Decimal places used by channel producers when the device does not report any.
pub const DEFAULT_DECIMAL_PLACES: i32 = 2;
/// Starting precision of a freshly created signal, before the first sample.
pub const INITIAL_SIGNAL_DIGITS: i32 = 7;
pub const INITIAL_SIGNAL_DECIMAL_PLACES: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quantity {
    Voltage,
    Current,
    Resistance,
    Capacitance,
    Temperature,
    Frequency,
    DutyCycle,
    Continuity,
    PulseWidth,
    Conductance,
    Power,
    ElectricCharge,
    Gain,
    Time,
    Pressure,
    PhaseAngle,
    Difference,
    Count,
    PowerFactor,
    ApparentPower,
    Mass,
    Energy,
    Unknown,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Quantity::Voltage => "Voltage",
            Quantity::Current => "Current",
            Quantity::Resistance => "Resistance",
            Quantity::Capacitance => "Capacitance",
            Quantity::Temperature => "Temperature",
            Quantity::Frequency => "Frequency",
            Quantity::DutyCycle => "Duty Cycle",
            Quantity::Continuity => "Continuity",
            Quantity::PulseWidth => "Pulse Width",
            Quantity::Conductance => "Conductance",
            Quantity::Power => "Power",
            Quantity::ElectricCharge => "Electric Charge",
            Quantity::Gain => "Gain",
            Quantity::Time => "Time",
            Quantity::Pressure => "Pressure",
            Quantity::PhaseAngle => "Phase Angle",
            Quantity::Difference => "Difference",
            Quantity::Count => "Count",
            Quantity::PowerFactor => "Power Factor",
            Quantity::ApparentPower => "Apparent Power",
            Quantity::Mass => "Mass",
            Quantity::Energy => "Energy",
            Quantity::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QuantityFlag {
    AC,
    DC,
    RMS,
    Diode,
    Hold,
    Max,
    Min,
    Autorange,
    Relative,
    Duration,
    Avg,
    Reference,
    Unstable,
    FourWire,
    Unknown,
}

impl fmt::Display for QuantityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuantityFlag::AC => "AC",
            QuantityFlag::DC => "DC",
            QuantityFlag::RMS => "RMS",
            QuantityFlag::Diode => "Diode",
            QuantityFlag::Hold => "Hold",
            QuantityFlag::Max => "Max",
            QuantityFlag::Min => "Min",
            QuantityFlag::Autorange => "Autorange",
            QuantityFlag::Relative => "Relative",
            QuantityFlag::Duration => "Duration",
            QuantityFlag::Avg => "Avg",
            QuantityFlag::Reference => "Reference",
            QuantityFlag::Unstable => "Unstable",
            QuantityFlag::FourWire => "4-Wire",
            QuantityFlag::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Unit {
    Volt,
    Ampere,
    Ohm,
    Farad,
    Kelvin,
    Celsius,
    Hertz,
    Percentage,
    Second,
    Siemens,
    Unitless,
    VoltAmpere,
    Watt,
    WattHour,
    Joule,
    AmpereHour,
    Coulomb,
    Gram,
    Unknown,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Unit::Volt => "V",
            Unit::Ampere => "A",
            Unit::Ohm => "Ω",
            Unit::Farad => "F",
            Unit::Kelvin => "K",
            Unit::Celsius => "°C",
            Unit::Hertz => "Hz",
            Unit::Percentage => "%",
            Unit::Second => "s",
            Unit::Siemens => "S",
            Unit::Unitless => "",
            Unit::VoltAmpere => "VA",
            Unit::Watt => "W",
            Unit::WattHour => "Wh",
            Unit::Joule => "J",
            Unit::AmpereHour => "Ah",
            Unit::Coulomb => "C",
            Unit::Gram => "g",
            Unit::Unknown => "??",
        };
        f.write_str(s)
    }
}

/// What a signal represents: a physical quantity plus its flag set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MeasuredQuantity {
    pub quantity: Quantity,
    #[serde(default)]
    pub flags: BTreeSet<QuantityFlag>,
}

impl MeasuredQuantity {
    pub fn new(quantity: Quantity, flags: impl IntoIterator<Item = QuantityFlag>) -> Self {
        Self {
            quantity,
            flags: flags.into_iter().collect(),
        }
    }

    pub fn plain(quantity: Quantity) -> Self {
        Self {
            quantity,
            flags: BTreeSet::new(),
        }
    }
}

impl fmt::Display for MeasuredQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.quantity)?;
        if !self.flags.is_empty() {
            let flags = self
                .flags
                .iter()
                .map(|fl| fl.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            write!(f, " [{flags}]")?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Channel name conventions
// ─────────────────────────────────────────────────────────────────────────────

/// A known channel-name prefix and the measured quantity it implies.
#[derive(Debug, Clone, Copy)]
pub struct ChannelNamePrefix {
    /// Alternative spellings; the first matching one determines the suffix.
    pub prefixes: &'static [&'static str],
    pub quantity: Quantity,
    pub flags: &'static [QuantityFlag],
    pub unit: Unit,
}

impl ChannelNamePrefix {
    pub fn measured_quantity(&self) -> MeasuredQuantity {
        MeasuredQuantity::new(self.quantity, self.flags.iter().copied())
    }
}

/// Lookup order matters: the first entry whose prefix matches wins.
pub const CHANNEL_NAME_PREFIXES: &[ChannelNamePrefix] = &[
    ChannelNamePrefix { prefixes: &["V"], quantity: Quantity::Voltage, flags: &[QuantityFlag::DC], unit: Unit::Volt },
    ChannelNamePrefix { prefixes: &["I"], quantity: Quantity::Current, flags: &[QuantityFlag::DC], unit: Unit::Ampere },
    ChannelNamePrefix { prefixes: &["P"], quantity: Quantity::Power, flags: &[], unit: Unit::Watt },
    ChannelNamePrefix { prefixes: &["R"], quantity: Quantity::Resistance, flags: &[], unit: Unit::Ohm },
    ChannelNamePrefix { prefixes: &["F"], quantity: Quantity::Frequency, flags: &[], unit: Unit::Hertz },
    ChannelNamePrefix { prefixes: &["Wh", "E"], quantity: Quantity::Energy, flags: &[], unit: Unit::WattHour },
    ChannelNamePrefix { prefixes: &["Ah"], quantity: Quantity::ElectricCharge, flags: &[], unit: Unit::AmpereHour },
];

/// Find the fixed quantity implied by a channel name, if any.
pub fn lookup_channel_name(name: &str) -> Option<&'static ChannelNamePrefix> {
    CHANNEL_NAME_PREFIXES
        .iter()
        .find(|entry| entry.prefixes.iter().any(|p| name.starts_with(p)))
}

/// Tracks the channel-name suffix shared by all channels of one group
/// (e.g. `"1"` for `V1`, `I1`, `P1`).
#[derive(Debug, Clone, Default)]
pub struct ChannelSuffix {
    suffix: Option<String>,
}

impl ChannelSuffix {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first-seen suffix, or an empty string when none was seen yet.
    pub fn as_str(&self) -> &str {
        self.suffix.as_deref().unwrap_or("")
    }

    pub fn is_initialized(&self) -> bool {
        self.suffix.is_some()
    }

    /// Record the suffix of `channel_name` after one of `prefixes`.
    ///
    /// Returns `false` (and logs a warning) when the suffix deviates from the
    /// first one seen in this group. The first-seen suffix is kept.
    pub fn observe(&mut self, channel_name: &str, prefixes: &[&str]) -> bool {
        let mut candidate = "";
        for prefix in prefixes {
            let Some(rest) = channel_name.strip_prefix(prefix) else {
                continue;
            };
            candidate = rest;
            match &self.suffix {
                Some(existing) if existing == rest => return true,
                Some(_) => {}
                None => {
                    self.suffix = Some(rest.to_string());
                    return true;
                }
            }
        }
        log::warn!(
            "Channel suffix for channel {} ({}) differs from previous suffix {}",
            channel_name,
            candidate,
            self.as_str()
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_prefers_table_order() {
        let v = lookup_channel_name("V1").unwrap();
        assert_eq!(v.quantity, Quantity::Voltage);
        assert_eq!(v.measured_quantity(), MeasuredQuantity::new(Quantity::Voltage, [QuantityFlag::DC]));
        assert_eq!(lookup_channel_name("Wh2").unwrap().quantity, Quantity::Energy);
        assert_eq!(lookup_channel_name("E2").unwrap().unit, Unit::WattHour);
        assert_eq!(lookup_channel_name("Ah").unwrap().quantity, Quantity::ElectricCharge);
        assert!(lookup_channel_name("CH1").is_none());
    }

    #[test]
    fn suffix_first_seen_wins() {
        let mut s = ChannelSuffix::new();
        assert!(s.observe("V1", &["V"]));
        assert!(s.observe("I1", &["I"]));
        assert!(!s.observe("P2", &["P"]));
        assert_eq!(s.as_str(), "1");
    }

    #[test]
    fn suffix_tries_alternative_prefixes() {
        let mut s = ChannelSuffix::new();
        assert!(s.observe("V", &["V"]));
        assert!(s.observe("E", &["Wh", "E"]));
        assert!(s.is_initialized());
        assert_eq!(s.as_str(), "");
    }

    #[test]
    fn measured_quantity_display() {
        let mq = MeasuredQuantity::new(Quantity::Current, [QuantityFlag::DC]);
        assert_eq!(mq.to_string(), "Current [DC]");
        assert_eq!(MeasuredQuantity::plain(Quantity::Power).to_string(), "Power");
    }
}
