//! Acquisition side of a device: packet types and the channel used to hand
//! them from an acquisition thread to the consumer.
//!
//! An acquisition thread owns an [`AcquisitionSink`] and pushes
//! [`AnalogPacket`]s into it. The consumer side keeps the matching
//! `Receiver<AcquisitionCommand>` and drains it with
//! [`Device::process_pending`](crate::device::Device::process_pending) or
//! [`Device::run_until_closed`](crate::device::Device::run_until_closed).

use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;

use crate::data::quantity::{MeasuredQuantity, Unit};
use crate::error::{Error, Result};

/// One analog data packet as delivered by a device driver.
///
/// `data` is interleaved: sample `k` of `channels[i]` is at
/// `data[k * stride + i]`, with `stride == channels.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogPacket {
    pub channels: Vec<String>,
    pub data: Vec<f32>,
    /// Samples per channel.
    pub count: usize,
    /// Timestamp of the first sample (seconds since epoch).
    pub timestamp: f64,
    /// Samples per second; 0 when all samples share `timestamp`.
    pub samplerate: u64,
    pub quantity: MeasuredQuantity,
    pub unit: Unit,
    /// Total digits; the device default is used when absent.
    pub digits: Option<i32>,
    /// Decimal places; the device default is used when absent.
    pub decimal_places: Option<i32>,
}

impl AnalogPacket {
    /// Packet for a single channel.
    pub fn single(
        channel: impl Into<String>,
        data: Vec<f32>,
        timestamp: f64,
        samplerate: u64,
        quantity: MeasuredQuantity,
        unit: Unit,
    ) -> Self {
        let count = data.len();
        Self {
            channels: vec![channel.into()],
            data,
            count,
            timestamp,
            samplerate,
            quantity,
            unit,
            digits: None,
            decimal_places: None,
        }
    }

    pub fn with_precision(mut self, digits: i32, decimal_places: i32) -> Self {
        self.digits = Some(digits);
        self.decimal_places = Some(decimal_places);
        self
    }

    pub fn stride(&self) -> usize {
        self.channels.len().max(1)
    }

    /// Seconds between two consecutive samples.
    pub fn sample_interval(&self) -> f64 {
        if self.samplerate == 0 {
            0.0
        } else {
            1.0 / self.samplerate as f64
        }
    }

    /// Deinterleave the samples of the channel at `offset`. Stops early if the
    /// payload is shorter than `count * stride`.
    pub fn channel_samples(&self, offset: usize) -> Vec<f32> {
        let stride = self.stride();
        self.data
            .iter()
            .skip(offset)
            .step_by(stride)
            .take(self.count)
            .copied()
            .collect()
    }
}

/// Messages sent from an acquisition thread to its device.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionCommand {
    /// Feed one analog packet.
    Analog(AnalogPacket),
    /// Acquisition (re)started at the given timestamp.
    StartTimestamp(f64),
}

/// Producer handle for one device's acquisition thread.
#[derive(Debug, Clone)]
pub struct AcquisitionSink {
    tx: Sender<AcquisitionCommand>,
}

impl AcquisitionSink {
    pub fn send_analog(&self, packet: AnalogPacket) -> Result<()> {
        self.tx
            .send(AcquisitionCommand::Analog(packet))
            .map_err(|_| Error::SinkClosed)
    }

    pub fn send_start_timestamp(&self, timestamp: f64) -> Result<()> {
        self.tx
            .send(AcquisitionCommand::StartTimestamp(timestamp))
            .map_err(|_| Error::SinkClosed)
    }
}

/// Create a new acquisition channel returning the producer sink and the
/// receiver the device drains.
pub fn channel_acquisition() -> (AcquisitionSink, Receiver<AcquisitionCommand>) {
    let (tx, rx) = std::sync::mpsc::channel();
    (AcquisitionSink { tx }, rx)
}

/// Wait for an acquisition thread. A panic becomes
/// [`Error::AcquisitionPanicked`] carrying the panic message.
pub fn join_acquisition(handle: JoinHandle<Result<()>>) -> Result<()> {
    match handle.join() {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(Error::AcquisitionPanicked(msg))
        }
    }
}
