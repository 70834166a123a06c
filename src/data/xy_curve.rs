//! X/Y curve built from two time-aligned signals, e.g. current over voltage.

use std::sync::Arc;

use crate::data::combine::{combine_signals, CombineStatus, CombinedSamples};
use crate::data::signal::AnalogTimeSignal;

/// Pairs `x_signal` and `y_signal` sample-by-sample on a common time base.
///
/// Call [`update`](Self::update) whenever either signal grew; only samples not
/// consumed before are aligned.
#[derive(Debug)]
pub struct XyCurve {
    x_signal: Arc<AnalogTimeSignal>,
    y_signal: Arc<AnalogTimeSignal>,
    x_pos: usize,
    y_pos: usize,
    points: Vec<[f64; 2]>,
}

impl XyCurve {
    pub fn new(x_signal: Arc<AnalogTimeSignal>, y_signal: Arc<AnalogTimeSignal>) -> Self {
        Self {
            x_signal,
            y_signal,
            x_pos: 0,
            y_pos: 0,
            points: Vec::new(),
        }
    }

    /// Align newly available samples. Returns the number of points added.
    pub fn update(&mut self) -> usize {
        let mut combined = CombinedSamples::new();
        let res = combine_signals(&self.x_signal, &mut self.x_pos, &self.y_signal, &mut self.y_pos, &mut combined);
        if res.status == CombineStatus::OutOfRange {
            log::trace!("xy curve {}: out of range", self.title());
        }
        self.points
            .extend(combined.data1.iter().zip(combined.data2.iter()).map(|(&x, &y)| [x, y]));
        res.emitted
    }

    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(x_min, y_min, x_max, y_max)` from the signals' running statistics.
    pub fn bounding_rect(&self) -> (f64, f64, f64, f64) {
        (
            self.x_signal.min_value(),
            self.y_signal.min_value(),
            self.x_signal.max_value(),
            self.y_signal.max_value(),
        )
    }

    pub fn x_title(&self) -> String {
        format!("{} [{}]", self.x_signal.measured_quantity(), self.x_signal.unit())
    }

    pub fn y_title(&self) -> String {
        format!("{} [{}]", self.y_signal.measured_quantity(), self.y_signal.unit())
    }

    pub fn title(&self) -> String {
        format!("{} over {}", self.y_signal.name(), self.x_signal.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::quantity::{MeasuredQuantity, Quantity, Unit};

    #[test]
    fn pairs_values_on_common_time_base() {
        let v = AnalogTimeSignal::new_shared(MeasuredQuantity::plain(Quantity::Voltage), Unit::Volt, "V", 0.0);
        let i = AnalogTimeSignal::new_shared(MeasuredQuantity::plain(Quantity::Current), Unit::Ampere, "I", 0.0);
        v.append(1.0, 0.0, 7, 3);
        v.append(3.0, 2.0, 7, 3);
        i.append(0.1, 0.0, 7, 3);
        i.append(0.2, 1.0, 7, 3);

        let mut curve = XyCurve::new(Arc::clone(&v), Arc::clone(&i));
        assert_eq!(curve.update(), 2);
        assert_eq!(curve.points(), &[[1.0, 0.1], [2.0, 0.2]]);

        i.append(0.3, 2.0, 7, 3);
        assert_eq!(curve.update(), 1);
        assert_eq!(curve.points()[2], [3.0, 0.3]);
        assert_eq!(curve.bounding_rect(), (1.0, 0.1, 3.0, 0.3));
        assert_eq!(curve.x_title(), "Voltage [V]");
        assert_eq!(curve.title(), "I over V");
    }
}
