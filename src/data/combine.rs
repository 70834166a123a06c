//! Incremental alignment of two independently timestamped signals.
//!
//! [`combine_signals`] merges two signals onto a common time base. Where
//! timestamps coincide both values are taken as-is; otherwise the signal that
//! is ahead is linearly interpolated at the timestamp of the one behind. The
//! caller keeps two read cursors between calls, so repeated invocations
//! resume exactly where the previous one stopped.
//!
//! Example (`pos1 = pos2 = 0`, all samples present):
//!
//! | Time | S1 | S2 | combined S1 | combined S2 |
//! |------|----|----|-------------|-------------|
//! |    1 |  1 |    |             |             |
//! |    3 |  2 |    |             |             |
//! |    5 |  3 |    |             |             |
//! |    6 |    | 10 |         3.5 |          10 |
//! |    7 |  4 |    |           4 |         9.5 |
//! |    8 |    |  9 |         4.5 |           9 |
//! |    9 |  5 |    |           5 |         8.5 |
//! |   10 |    |  8 |             |             |
//! |   12 |    |  7 |             |             |
//!
//! The leading samples of whichever signal started first are discarded.

use crate::data::signal::AnalogTimeSignal;

/// Synchronized output of one [`combine_signals`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedSamples {
    pub time: Vec<f64>,
    pub data1: Vec<f64>,
    pub data2: Vec<f64>,
}

impl CombinedSamples {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    fn push(&mut self, time: f64, value1: f64, value2: f64) {
        self.time.push(time);
        self.data1.push(value1);
        self.data2.push(value2);
    }

    /// Iterate over `(time, value1, value2)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.time
            .iter()
            .zip(self.data1.iter())
            .zip(self.data2.iter())
            .map(|((&t, &v1), &v2)| (t, v1, v2))
    }
}

/// Why a [`combine_signals`] call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineStatus {
    /// At least one signal has no samples at all.
    Empty,
    /// A cursor reached the live edge of its signal. Normal termination.
    WaitingForMoreData,
    /// The signal that is ahead cannot be interpolated at the other signal's
    /// timestamp with the data recorded so far.
    OutOfRange,
}

/// Outcome of one [`combine_signals`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombineResult {
    pub emitted: usize,
    pub status: CombineStatus,
}

/// Merge newly available samples of `signal1` and `signal2` into `out`.
///
/// `pos1` / `pos2` are the caller's read cursors. They are advanced past every
/// consumed sample and must be passed back unchanged on the next call.
pub fn combine_signals(
    signal1: &AnalogTimeSignal,
    pos1: &mut usize,
    signal2: &AnalogTimeSignal,
    pos2: &mut usize,
    out: &mut CombinedSamples,
) -> CombineResult {
    let emitted_before = out.len();
    let result = |out: &CombinedSamples, status| CombineResult {
        emitted: out.len() - emitted_before,
        status,
    };

    if signal1.sample_count() == 0 || signal2.sample_count() == 0 {
        return result(out, CombineStatus::Empty);
    }

    // Leading edge: skip the samples of whichever signal started earlier.
    if *pos1 == 0 || *pos2 == 0 {
        let count1 = signal1.sample_count();
        let count2 = signal2.sample_count();
        if count1 <= *pos1 || count2 <= *pos2 {
            return result(out, CombineStatus::WaitingForMoreData);
        }
        let mut ts1 = signal1.get_sample(*pos1, false).0;
        let mut ts2 = signal2.get_sample(*pos2, false).0;
        if ts1 < ts2 {
            while ts1 < ts2 && count1 > *pos1 + 1 {
                *pos1 += 1;
                ts1 = signal1.get_sample(*pos1, false).0;
            }
        } else if ts1 > ts2 {
            while ts1 > ts2 && count2 > *pos2 + 1 {
                *pos2 += 1;
                ts2 = signal2.get_sample(*pos2, false).0;
            }
        }
    }

    loop {
        let count1 = signal1.sample_count();
        let count2 = signal2.sample_count();
        if count1 <= *pos1 || count2 <= *pos2 {
            return result(out, CombineStatus::WaitingForMoreData);
        }

        let (ts1, value1) = signal1.get_sample(*pos1, false);
        let (ts2, value2) = signal2.get_sample(*pos2, false);

        if ts1 == ts2 {
            out.push(ts1, value1, value2);
            *pos1 += 1;
            *pos2 += 1;
        } else if ts1 < ts2 && count2 > *pos2 {
            let Some(interpolated) = signal2.get_value_at_timestamp(ts1, false) else {
                log::trace!(
                    "combine_signals(): {} not interpolatable at {}",
                    signal2.name(),
                    ts1
                );
                return result(out, CombineStatus::OutOfRange);
            };
            out.push(ts1, value1, interpolated);
            *pos1 += 1;
        } else if ts1 > ts2 && count1 > *pos1 {
            let Some(interpolated) = signal1.get_value_at_timestamp(ts2, false) else {
                log::trace!(
                    "combine_signals(): {} not interpolatable at {}",
                    signal1.name(),
                    ts2
                );
                return result(out, CombineStatus::OutOfRange);
            };
            out.push(ts2, interpolated, value2);
            *pos2 += 1;
        } else {
            return result(out, CombineStatus::WaitingForMoreData);
        }
    }
}
