use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use livesignal::data::quantity::{MeasuredQuantity, Quantity, QuantityFlag, Unit};
use livesignal::device::{Device, DeviceType};
use livesignal::events::{EventFilter, SignalEventKind};
use livesignal::sink::{channel_acquisition, AnalogPacket};

fn psu() -> Device {
    let dev = Device::new(1, "psu", DeviceType::SourceSink, 0.0);
    dev.add_hardware_channel("V1", "1").unwrap();
    dev.add_hardware_channel("I1", "1").unwrap();
    dev.init_fixed_channels().unwrap();
    dev
}

fn interleaved(t0: f64, n: usize) -> AnalogPacket {
    let mut data = Vec::with_capacity(2 * n);
    for _ in 0..n {
        data.extend_from_slice(&[12.0, 0.5]);
    }
    AnalogPacket {
        channels: vec!["V1".into(), "I1".into()],
        data,
        count: n,
        timestamp: t0,
        samplerate: 2,
        quantity: MeasuredQuantity::new(Quantity::Voltage, [QuantityFlag::DC]),
        unit: Unit::Volt,
        digits: None,
        decimal_places: None,
    }
}

#[test]
fn producer_thread_feeds_device() {
    let dev = psu();
    let (sink, rx) = channel_acquisition();
    let producer = std::thread::spawn(move || {
        let dc = |q| MeasuredQuantity::new(q, [QuantityFlag::DC]);
        sink.send_start_timestamp(0.0).unwrap();
        for k in 0..10 {
            let t0 = k as f64 * 2.0;
            sink.send_analog(AnalogPacket::single("V1", vec![12.0; 4], t0, 2, dc(Quantity::Voltage), Unit::Volt))
                .unwrap();
            sink.send_analog(AnalogPacket::single("I1", vec![0.5; 4], t0, 2, dc(Quantity::Current), Unit::Ampere))
                .unwrap();
        }
    });

    let handled = dev.run_until_closed(&rx).unwrap();
    producer.join().unwrap();
    assert_eq!(handled, 21);

    let p = dev.channel("P1").unwrap().actual_signal().unwrap();
    assert_eq!(p.sample_count(), 40);
    assert_eq!(p.last_value(), 6.0);
    assert_eq!(p.last_timestamp(false), 19.5);
}

#[test]
fn process_pending_does_not_block() {
    let dev = psu();
    let (sink, rx) = channel_acquisition();
    assert_eq!(dev.process_pending(&rx).unwrap(), 0);
    sink.send_start_timestamp(5.0).unwrap();
    assert_eq!(dev.process_pending(&rx).unwrap(), 1);
    assert_eq!(dev.acquisition_start_timestamp(), 5.0);
}

#[test]
fn interleaved_packet_uses_packet_quantity_for_every_channel() {
    // One measured quantity per packet: a packet spanning V1 and I1 tagged as
    // voltage adds a voltage signal to I1 as well.
    let dev = psu();
    dev.feed_in_analog(&interleaved(0.0, 3)).unwrap();
    let i1 = dev.channel("I1").unwrap();
    assert_eq!(i1.signals().len(), 2);
    assert_eq!(i1.actual_signal().unwrap().points(false), vec![[0.0, 0.5], [0.5, 0.5], [1.0, 0.5]]);
}

#[test]
fn math_output_events_reach_subscribers() {
    let dev = psu();
    let wh = dev.channel("Wh1").unwrap().actual_signal().unwrap();
    let rx = wh.notifier().subscribe(EventFilter::only(SignalEventKind::SAMPLE_APPENDED));

    let (sink, acq_rx) = channel_acquisition();
    let dc = |q| MeasuredQuantity::new(q, [QuantityFlag::DC]);
    sink.send_analog(AnalogPacket::single("V1", vec![1.0, 1.0], 0.0, 1, dc(Quantity::Voltage), Unit::Volt))
        .unwrap();
    sink.send_analog(AnalogPacket::single("I1", vec![1.0, 1.0], 0.0, 1, dc(Quantity::Current), Unit::Ampere))
        .unwrap();
    drop(sink);
    dev.run_until_closed(&acq_rx).unwrap();

    let mut counts = Vec::new();
    loop {
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(evt) => counts.push(evt.sample_count),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    assert_eq!(counts, vec![1, 2]);
}
