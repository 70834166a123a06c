//! Demo: a simulated power supply streaming V/I packets from an acquisition
//! thread, with P, R, Wh and Ah derived automatically.
//!
//! ```bash
//! RUST_LOG=debug cargo run --bin livesignal-demo [engine.yaml]
//! ```
//! Without a config file a single-output supply `psu` with `V1`/`I1` is used.

use std::path::Path;
use std::time::Duration;

use livesignal::config::{ChannelGroupConfig, DeviceConfig, EngineConfig};
use livesignal::data::quantity::{MeasuredQuantity, Quantity, QuantityFlag, Unit};
use livesignal::device::DeviceType;
use livesignal::sink::{channel_acquisition, join_acquisition, AnalogPacket};
use livesignal::{Result, Session};

const SAMPLERATE: u64 = 10;
const PACKETS: usize = 20;

fn default_config() -> EngineConfig {
    EngineConfig {
        devices: vec![DeviceConfig {
            name: "psu".into(),
            device_type: DeviceType::SourceSink,
            channel_groups: vec![ChannelGroupConfig {
                name: "1".into(),
                channels: vec!["V1".into(), "I1".into()],
            }],
            fixed_channels: true,
            math_channels: Vec::new(),
        }],
        ..EngineConfig::default()
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(Path::new(&path))?,
        None => default_config(),
    };
    let start = livesignal::util::now_timestamp();
    let session = Session::from_config(&config, start)?;
    let device = session.device_by_name(&config.devices.first().map(|d| d.name.clone()).unwrap_or_default())?;

    let (sink, rx) = channel_acquisition();
    let producer = std::thread::spawn(move || -> Result<()> {
        let dc = |q| MeasuredQuantity::new(q, [QuantityFlag::DC]);
        for n in 0..PACKETS {
            // One packet per second of samples.
            let t0 = start + n as f64;
            let volts: Vec<f32> = (0..SAMPLERATE).map(|k| 12.0 + 0.05 * ((n as u64 + k) % 3) as f32).collect();
            let amps: Vec<f32> = (0..SAMPLERATE).map(|k| 1.5 + 0.01 * ((n as u64 * k) % 5) as f32).collect();
            sink.send_analog(AnalogPacket::single("V1", volts, t0, SAMPLERATE, dc(Quantity::Voltage), Unit::Volt).with_precision(6, 3))?;
            sink.send_analog(AnalogPacket::single("I1", amps, t0, SAMPLERATE, dc(Quantity::Current), Unit::Ampere).with_precision(6, 4))?;
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    });

    let handled = device.run_until_closed(&rx)?;
    if let Err(e) = join_acquisition(producer) {
        log::error!("producer: {e}");
        return Err(e);
    }
    log::info!("handled {handled} packet(s)");

    for channel in device.channels() {
        let Some(signal) = channel.actual_signal() else {
            continue;
        };
        let (t, v) = signal.get_last_sample(true);
        println!(
            "{:>4} {:>6} {:>5} samples  last {:>12.*} {} at +{:.1}s  (min {:.3}, max {:.3})",
            channel.name(),
            channel.kind().to_string(),
            signal.sample_count(),
            signal.decimal_places().max(0) as usize,
            v,
            signal.unit(),
            t,
            signal.min_value(),
            signal.max_value(),
        );
    }
    Ok(())
}
