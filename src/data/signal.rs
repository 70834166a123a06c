//! Append-only analog time series.
//!
//! An [`AnalogTimeSignal`] stores `(timestamp, value)` samples in
//! non-decreasing timestamp order together with cached statistics and a
//! display precision hint. It is written by exactly one producer (a channel
//! or a math channel) and read by any number of consumers, which keep their
//! own read cursors.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::data::quantity::{
    MeasuredQuantity, Quantity, QuantityFlag, Unit, INITIAL_SIGNAL_DECIMAL_PLACES, INITIAL_SIGNAL_DIGITS,
};
use crate::events::{SignalEvent, SignalEventKind, SignalNotifier};

/// `(timestamp, value)`
pub type AnalogTimeSample = (f64, f64);

#[derive(Debug)]
struct SignalData {
    time: Vec<f64>,
    data: Vec<f64>,
    digits: i32,
    decimal_places: i32,
    last_value: f64,
    last_timestamp: f64,
    min_value: f64,
    max_value: f64,
    signal_start_timestamp: f64,
}

impl SignalData {
    fn push(&mut self, timestamp: f64, value: f64) {
        if self.min_value > value {
            self.min_value = value;
        }
        // A single overflow reading must not poison the displayed max.
        if self.max_value < value && value != f64::INFINITY {
            self.max_value = value;
        }
        self.time.push(timestamp);
        self.data.push(value);
        self.last_timestamp = timestamp;
        self.last_value = value;
    }

    /// Returns true when the precision changed.
    fn update_digits(&mut self, digits: i32, decimal_places: i32) -> bool {
        let mut changed = false;
        if digits != self.digits {
            self.digits = digits;
            changed = true;
        }
        if decimal_places != self.decimal_places {
            self.decimal_places = decimal_places;
            changed = true;
        }
        changed
    }
}

#[derive(Debug)]
pub struct AnalogTimeSignal {
    measured_quantity: MeasuredQuantity,
    unit: Unit,
    name: String,
    inner: RwLock<SignalData>,
    notifier: SignalNotifier,
}

impl AnalogTimeSignal {
    pub fn new(
        measured_quantity: MeasuredQuantity,
        unit: Unit,
        name: impl Into<String>,
        signal_start_timestamp: f64,
    ) -> Self {
        let name = name.into();
        log::debug!(
            "Init analog time signal {}, signal_start_timestamp = {}",
            name,
            crate::util::format_time_date(signal_start_timestamp)
        );
        Self {
            measured_quantity,
            unit,
            name,
            inner: RwLock::new(SignalData {
                time: Vec::new(),
                data: Vec::new(),
                digits: INITIAL_SIGNAL_DIGITS,
                decimal_places: INITIAL_SIGNAL_DECIMAL_PLACES,
                last_value: 0.0,
                last_timestamp: 0.0,
                min_value: f64::MAX,
                max_value: f64::MIN,
                signal_start_timestamp,
            }),
            notifier: SignalNotifier::new(),
        }
    }

    /// Convenience constructor returning a shared handle.
    pub fn new_shared(
        measured_quantity: MeasuredQuantity,
        unit: Unit,
        name: impl Into<String>,
        signal_start_timestamp: f64,
    ) -> Arc<Self> {
        Arc::new(Self::new(measured_quantity, unit, name, signal_start_timestamp))
    }

    fn read(&self) -> RwLockReadGuard<'_, SignalData> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SignalData> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn measured_quantity(&self) -> &MeasuredQuantity {
        &self.measured_quantity
    }

    pub fn quantity(&self) -> Quantity {
        self.measured_quantity.quantity
    }

    pub fn quantity_flags(&self) -> &std::collections::BTreeSet<QuantityFlag> {
        &self.measured_quantity.flags
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn notifier(&self) -> &SignalNotifier {
        &self.notifier
    }

    // ─────────────────────────────────────────────────────────────────────
    // Append paths
    // ─────────────────────────────────────────────────────────────────────

    /// Append a single sample.
    pub fn append(&self, value: f64, timestamp: f64, digits: i32, decimal_places: i32) {
        let (count, digits_changed) = {
            let mut d = self.write();
            d.push(timestamp, value);
            (d.time.len(), d.update_digits(digits, decimal_places))
        };
        self.emit_appended(count, digits_changed.then_some((digits, decimal_places)));
    }

    /// Append a run of equally spaced samples. Only one `SAMPLE_APPENDED`
    /// event is emitted for the whole batch.
    pub fn append_batch(
        &self,
        values: &[f64],
        start_timestamp: f64,
        sample_interval: f64,
        digits: i32,
        decimal_places: i32,
    ) {
        self.append_iter(values.iter().copied(), start_timestamp, sample_interval, digits, decimal_places);
    }

    /// Same as [`append_batch`](Self::append_batch) for the `f32` payloads
    /// delivered by the device layer.
    pub fn append_batch_f32(
        &self,
        values: &[f32],
        start_timestamp: f64,
        sample_interval: f64,
        digits: i32,
        decimal_places: i32,
    ) {
        self.append_iter(
            values.iter().map(|&v| f64::from(v)),
            start_timestamp,
            sample_interval,
            digits,
            decimal_places,
        );
    }

    fn append_iter<I>(&self, values: I, start_timestamp: f64, sample_interval: f64, digits: i32, decimal_places: i32)
    where
        I: Iterator<Item = f64>,
    {
        let (count, digits_changed) = {
            let mut d = self.write();
            let before = d.time.len();
            for (i, value) in values.enumerate() {
                d.push(start_timestamp + i as f64 * sample_interval, value);
            }
            if d.time.len() == before {
                return;
            }
            (d.time.len(), d.update_digits(digits, decimal_places))
        };
        self.emit_appended(count, digits_changed.then_some((digits, decimal_places)));
    }

    fn emit_appended(&self, count: usize, digits: Option<(i32, i32)>) {
        self.notifier
            .emit(&SignalEvent::new(SignalEventKind::SAMPLE_APPENDED, self.name.as_str(), count));
        if let Some(d) = digits {
            let mut evt = SignalEvent::new(SignalEventKind::DIGITS_CHANGED, self.name.as_str(), count);
            evt.digits = Some(d);
            self.notifier.emit(&evt);
        }
    }

    /// Remove all samples.
    pub fn clear(&self) {
        {
            let mut d = self.write();
            d.time.clear();
            d.data.clear();
        }
        self.notifier
            .emit(&SignalEvent::new(SignalEventKind::SAMPLES_CLEARED, self.name.as_str(), 0));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Read paths
    // ─────────────────────────────────────────────────────────────────────

    pub fn sample_count(&self) -> usize {
        self.read().time.len()
    }

    /// Sample at `pos`, or `(0, 0)` when out of range.
    pub fn get_sample(&self, pos: usize, relative_time: bool) -> AnalogTimeSample {
        let d = self.read();
        match (d.time.get(pos), d.data.get(pos)) {
            (Some(&t), Some(&v)) => {
                let t = if relative_time { t - d.signal_start_timestamp } else { t };
                (t, v)
            }
            _ => (0.0, 0.0),
        }
    }

    /// Last sample, or `(0, 0)` when the signal is empty.
    pub fn get_last_sample(&self, relative_time: bool) -> AnalogTimeSample {
        let d = self.read();
        match (d.time.last(), d.data.last()) {
            (Some(&t), Some(&v)) => {
                let t = if relative_time { t - d.signal_start_timestamp } else { t };
                (t, v)
            }
            _ => (0.0, 0.0),
        }
    }

    /// Value at `timestamp`, linearly interpolated between the bracketing
    /// samples when no sample matches exactly. `None` outside
    /// `[first_timestamp, last_timestamp]`.
    pub fn get_value_at_timestamp(&self, timestamp: f64, relative_time: bool) -> Option<f64> {
        let d = self.read();
        let ts = if relative_time { timestamp + d.signal_start_timestamp } else { timestamp };
        let (&first, &last) = (d.time.first()?, d.time.last()?);
        if ts.is_nan() || ts < first || ts > last {
            return None;
        }

        let lower = d.time.partition_point(|&t| t < ts);
        if *d.time.get(lower)? == ts {
            return d.data.get(lower).copied();
        }

        let lower_pos = lower.checked_sub(1)?;
        let upper_pos = lower;
        let (lower_ts, upper_ts) = (d.time[lower_pos], d.time[upper_pos]);
        let (lower_val, upper_val) = (d.data[lower_pos], d.data[upper_pos]);
        let factor = (ts - lower_ts) / (upper_ts - lower_ts);
        Some(lower_val + (upper_val - lower_val) * factor)
    }

    /// Copy of all samples as `[t, y]` points.
    pub fn points(&self, relative_time: bool) -> Vec<[f64; 2]> {
        let d = self.read();
        let offset = if relative_time { d.signal_start_timestamp } else { 0.0 };
        d.time.iter().zip(d.data.iter()).map(|(&t, &v)| [t - offset, v]).collect()
    }

    pub fn first_timestamp(&self, relative_time: bool) -> f64 {
        let d = self.read();
        match d.time.first() {
            Some(&t) if relative_time => t - d.signal_start_timestamp,
            Some(&t) => t,
            None => 0.0,
        }
    }

    pub fn last_timestamp(&self, relative_time: bool) -> f64 {
        let d = self.read();
        if d.time.is_empty() {
            return 0.0;
        }
        if relative_time {
            d.last_timestamp - d.signal_start_timestamp
        } else {
            d.last_timestamp
        }
    }

    pub fn signal_start_timestamp(&self) -> f64 {
        self.read().signal_start_timestamp
    }

    pub fn set_signal_start_timestamp(&self, timestamp: f64) {
        let count = {
            let mut d = self.write();
            d.signal_start_timestamp = timestamp;
            d.time.len()
        };
        let mut evt = SignalEvent::new(SignalEventKind::START_TIMESTAMP_CHANGED, self.name.as_str(), count);
        evt.start_timestamp = Some(timestamp);
        self.notifier.emit(&evt);
    }

    pub fn digits(&self) -> i32 {
        self.read().digits
    }

    pub fn decimal_places(&self) -> i32 {
        self.read().decimal_places
    }

    pub fn last_value(&self) -> f64 {
        self.read().last_value
    }

    pub fn min_value(&self) -> f64 {
        self.read().min_value
    }

    pub fn max_value(&self) -> f64 {
        self.read().max_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventFilter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn voltage(start: f64) -> AnalogTimeSignal {
        AnalogTimeSignal::new(MeasuredQuantity::plain(Quantity::Voltage), Unit::Volt, "V", start)
    }

    #[test]
    fn interpolates_between_samples() {
        let s = voltage(0.0);
        s.append(0.0, 0.0, 7, 3);
        s.append(10.0, 10.0, 7, 3);
        assert_eq!(s.get_value_at_timestamp(5.0, false), Some(5.0));
        assert_eq!(s.get_value_at_timestamp(2.5, false), Some(2.5));
    }

    #[test]
    fn exact_match_returns_sample_value() {
        let s = voltage(0.0);
        s.append(1.5, 1.0, 7, 3);
        s.append(2.5, 2.0, 7, 3);
        s.append(9.0, 3.0, 7, 3);
        assert_eq!(s.get_value_at_timestamp(2.0, false), Some(2.5));
        assert_eq!(s.get_value_at_timestamp(1.0, false), Some(1.5));
        assert_eq!(s.get_value_at_timestamp(3.0, false), Some(9.0));
    }

    #[test]
    fn out_of_range_is_not_found() {
        let s = voltage(0.0);
        assert_eq!(s.get_value_at_timestamp(0.0, false), None);
        s.append(1.0, 1.0, 7, 3);
        s.append(2.0, 2.0, 7, 3);
        assert_eq!(s.get_value_at_timestamp(0.5, false), None);
        assert_eq!(s.get_value_at_timestamp(2.5, false), None);
        assert_eq!(s.get_value_at_timestamp(f64::NAN, false), None);
    }

    #[test]
    fn relative_time_uses_start_timestamp() {
        let s = voltage(100.0);
        s.append(0.0, 100.0, 7, 3);
        s.append(10.0, 110.0, 7, 3);
        assert_eq!(s.get_value_at_timestamp(5.0, true), Some(5.0));
        assert_eq!(s.get_sample(1, true), (10.0, 10.0));
        assert_eq!(s.get_last_sample(true), (10.0, 10.0));
        assert_eq!(s.first_timestamp(true), 0.0);
        assert_eq!(s.last_timestamp(false), 110.0);
    }

    #[test]
    fn get_sample_out_of_range_is_zero() {
        let s = voltage(0.0);
        assert_eq!(s.get_sample(0, false), (0.0, 0.0));
        assert_eq!(s.get_last_sample(false), (0.0, 0.0));
        s.append(3.0, 1.0, 7, 3);
        assert_eq!(s.get_sample(1, false), (0.0, 0.0));
    }

    #[test]
    fn max_ignores_positive_infinity() {
        let s = voltage(0.0);
        s.append(2.0, 0.0, 7, 3);
        s.append(f64::INFINITY, 1.0, 7, 3);
        assert_eq!(s.last_value(), f64::INFINITY);
        assert_eq!(s.max_value(), 2.0);
        assert_eq!(s.min_value(), 2.0);
        s.append(-1.0, 2.0, 7, 3);
        assert_eq!(s.min_value(), -1.0);
    }

    #[test]
    fn batch_emits_single_append_event() {
        let s = voltage(0.0);
        let appended = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&appended);
        s.notifier().connect(EventFilter::only(SignalEventKind::SAMPLE_APPENDED), move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });

        s.append_batch(&[1.0, 2.0, 3.0, 4.0], 10.0, 0.5, 7, 3);
        assert_eq!(appended.load(Ordering::SeqCst), 1);
        assert_eq!(s.sample_count(), 4);
        assert_eq!(s.get_sample(3, false), (11.5, 4.0));
        assert_eq!(s.last_timestamp(false), 11.5);

        s.append_batch(&[], 20.0, 0.5, 7, 3);
        assert_eq!(appended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn digits_change_is_notified_once() {
        let s = voltage(0.0);
        let rx = s.notifier().subscribe(EventFilter::only(SignalEventKind::DIGITS_CHANGED));
        s.append(1.0, 0.0, 7, 3);
        assert!(rx.try_recv().is_err());
        s.append(1.0, 1.0, 5, 2);
        let evt = rx.try_recv().unwrap();
        assert_eq!(evt.digits, Some((5, 2)));
        s.append(1.0, 2.0, 5, 2);
        assert!(rx.try_recv().is_err());
        assert_eq!((s.digits(), s.decimal_places()), (5, 2));
    }

    #[test]
    fn clear_resets_count_and_notifies() {
        let s = voltage(0.0);
        let rx = s.notifier().subscribe(EventFilter::only(SignalEventKind::SAMPLES_CLEARED));
        s.append_batch_f32(&[1.0, 2.0], 0.0, 1.0, 7, 3);
        s.clear();
        assert_eq!(s.sample_count(), 0);
        assert_eq!(s.last_timestamp(false), 0.0);
        assert!(rx.try_recv().is_ok());
    }
}
