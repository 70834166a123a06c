use std::sync::Arc;

use livesignal::data::quantity::{MeasuredQuantity, Quantity, Unit};
use livesignal::{combine_signals, AnalogTimeSignal, CombineStatus, CombinedSamples, MathChannel, MathInputs, MathKind};

fn signal(name: &str, samples: &[(f64, f64)]) -> Arc<AnalogTimeSignal> {
    let s = AnalogTimeSignal::new_shared(MeasuredQuantity::plain(Quantity::Voltage), Unit::Volt, name, 0.0);
    for &(t, v) in samples {
        s.append(v, t, 7, 3);
    }
    s
}

#[test]
fn interpolation_at_midpoint() {
    let s = signal("S", &[(0.0, 0.0), (10.0, 10.0)]);
    assert_eq!(s.get_value_at_timestamp(5.0, false), Some(5.0));
}

#[test]
fn live_alignment_matches_offline_alignment() {
    let s1_samples = [(1.0, 1.0), (3.0, 2.0), (5.0, 3.0), (7.0, 4.0), (9.0, 5.0)];
    let s2_samples = [(6.0, 10.0), (8.0, 9.0), (10.0, 8.0), (12.0, 7.0)];

    let offline = {
        let (a, b) = (signal("S1", &s1_samples), signal("S2", &s2_samples));
        let (mut p1, mut p2) = (0, 0);
        let mut out = CombinedSamples::new();
        combine_signals(&a, &mut p1, &b, &mut p2, &mut out);
        out
    };

    // Same samples interleaved one by one, aligning after every append.
    let (a, b) = (signal("S1", &[]), signal("S2", &[]));
    let (mut p1, mut p2) = (0, 0);
    let mut live = CombinedSamples::new();
    let mut events: Vec<(f64, bool, f64)> = s1_samples
        .iter()
        .map(|&(t, v)| (t, true, v))
        .chain(s2_samples.iter().map(|&(t, v)| (t, false, v)))
        .collect();
    events.sort_by(|x, y| x.0.total_cmp(&y.0));
    for (t, first, v) in events {
        if first {
            a.append(v, t, 7, 3);
        } else {
            b.append(v, t, 7, 3);
        }
        combine_signals(&a, &mut p1, &b, &mut p2, &mut live);
    }

    assert_eq!(offline.time, vec![6.0, 7.0, 8.0, 9.0]);
    assert_eq!(offline.data1, vec![3.5, 4.0, 4.5, 5.0]);
    assert_eq!(offline.data2, vec![10.0, 9.5, 9.0, 8.5]);
    assert_eq!(live, offline);
    assert_eq!((p1, p2), (5, 2));
}

#[test]
fn leading_edge_is_discarded() {
    let s1 = signal("S1", &[(1.0, 1.0), (3.0, 2.0), (5.0, 3.0)]);
    let s2 = signal("S2", &[(6.0, 10.0)]);
    let (mut p1, mut p2) = (0, 0);
    let mut out = CombinedSamples::new();
    let res = combine_signals(&s1, &mut p1, &s2, &mut p2, &mut out);
    assert_eq!(p1, 2);
    assert!(out.is_empty());
    assert_eq!(res.status, CombineStatus::OutOfRange);
}

#[test]
fn moving_average_and_integration_through_channels() {
    let input = signal("X", &[]);
    let avg = MathChannel::new(
        "avg",
        MeasuredQuantity::plain(Quantity::Voltage),
        Unit::Volt,
        MathKind::MovingAverage { window: 3 },
        MathInputs::Single(Arc::clone(&input)),
        0.0,
    )
    .unwrap();
    let rate = signal("rate", &[]);
    let total = MathChannel::new(
        "total",
        MeasuredQuantity::plain(Quantity::Energy),
        Unit::WattHour,
        MathKind::Integrate,
        MathInputs::Single(Arc::clone(&rate)),
        0.0,
    )
    .unwrap();

    input.append(2.0, 0.0, 7, 3);
    assert!((avg.output().last_value() - 2.0 / 3.0).abs() < 1e-12);
    input.append(4.0, 1.0, 7, 3);
    input.append(6.0, 2.0, 7, 3);
    assert_eq!(avg.output().last_value(), 4.0);

    for t in [0.0, 3600.0, 7200.0] {
        rate.append(10.0, t, 7, 3);
    }
    let values: Vec<f64> = total.output().points(false).iter().map(|p| p[1]).collect();
    assert_eq!(values, vec![0.0, 10.0, 20.0]);
}

#[test]
fn overflow_reading_does_not_become_maximum() {
    let s = signal("S", &[(0.0, 1.0), (1.0, f64::INFINITY), (2.0, 3.0)]);
    assert_eq!(s.max_value(), 3.0);
    assert_eq!(s.get_sample(1, false).1, f64::INFINITY);
}
