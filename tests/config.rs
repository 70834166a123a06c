use livesignal::config::EngineConfig;
use livesignal::data::math::{MathOp, SignalRef};
use livesignal::data::quantity::{MeasuredQuantity, Quantity, Unit};
use livesignal::{ChannelKind, Error, Session};

const PSU_YAML: &str = r#"
default_digits: 7
default_decimal_places: 4
devices:
  - name: psu
    device_type: SourceSink
    fixed_channels: true
    channel_groups:
      - name: "1"
        channels: [V1, I1]
    math_channels:
      - name: P1_avg
        group: "1"
        quantity: Power
        unit: Watt
        op:
          kind: MovingAverage
          input: P1
          window: 4
      - name: P1_mW
        group: "1"
        quantity: Power
        unit: Watt
        op:
          kind: MultiplyFactor
          input: P1_avg
          factor: 1000
  - name: scratch
    device_type: User
    channel_groups:
      - name: user
        channels: [T]
"#;

#[test]
fn yaml_builds_devices_and_chained_math_channels() {
    let cfg = EngineConfig::from_yaml_str(PSU_YAML).unwrap();
    let session = Session::from_config(&cfg, 0.0).unwrap();

    let psu = session.device_by_name("psu").unwrap();
    for name in ["V1", "I1", "P1", "R1", "Wh1", "Ah1", "P1_avg", "P1_mW"] {
        assert!(psu.channel(name).is_some(), "missing {name}");
    }
    assert_eq!(psu.channel("P1_mW").unwrap().kind(), ChannelKind::Math);

    let scratch = session.device_by_name("scratch").unwrap();
    let t = scratch.channel("T").unwrap();
    assert_eq!(t.kind(), ChannelKind::User);
    t.push_sample(21.5, 0.0, &MeasuredQuantity::plain(Quantity::Temperature), Unit::Celsius, 4, 1)
        .unwrap();
    assert_eq!(t.actual_signal().unwrap().last_value(), 21.5);
}

#[test]
fn device_defaults_come_from_config() {
    let cfg = EngineConfig::from_yaml_str(PSU_YAML).unwrap();
    let session = Session::from_config(&cfg, 0.0).unwrap();
    let psu = session.device_by_name("psu").unwrap();
    let packet = livesignal::AnalogPacket::single(
        "V1",
        vec![3.3],
        1.0,
        0,
        MeasuredQuantity::new(Quantity::Voltage, [livesignal::QuantityFlag::DC]),
        Unit::Volt,
    );
    psu.feed_in_analog(&packet).unwrap();
    let v = psu.channel("V1").unwrap().actual_signal().unwrap();
    assert_eq!((v.digits(), v.decimal_places()), (7, 4));
}

#[test]
fn json_and_yaml_agree() {
    let cfg = EngineConfig::from_yaml_str(PSU_YAML).unwrap();
    let json = cfg.to_json_string().unwrap();
    assert_eq!(EngineConfig::from_json_str(&json).unwrap(), cfg);
    let yaml = cfg.to_yaml_string().unwrap();
    assert_eq!(EngineConfig::from_yaml_str(&yaml).unwrap(), cfg);
}

#[test]
fn json_divide_definition() {
    let json = r#"{
        "devices": [{
            "name": "load",
            "channel_groups": [{ "name": "in", "channels": ["V", "I"] }],
            "fixed_channels": true,
            "math_channels": [{
                "name": "G",
                "quantity": "Conductance",
                "unit": "Siemens",
                "op": { "kind": "Divide", "dividend": "I", "divisor": "V" }
            }]
        }]
    }"#;
    let cfg = EngineConfig::from_json_str(json).unwrap();
    assert_eq!(
        cfg.devices[0].math_channels[0].op,
        MathOp::Divide {
            dividend: SignalRef("I".into()),
            divisor: SignalRef("V".into())
        }
    );
    let session = Session::from_config(&cfg, 0.0).unwrap();
    let load = session.device_by_name("load").unwrap();
    assert_eq!(load.channel("G").unwrap().groups(), vec![String::new()]);
}

#[test]
fn math_channel_on_missing_input_is_reported() {
    let yaml = r#"
devices:
  - name: dmm
    device_type: Measurement
    channel_groups:
      - name: main
        channels: [CH1]
    math_channels:
      - name: Q
        quantity: ElectricCharge
        unit: AmpereHour
        op: { kind: Integrate, input: CH2 }
"#;
    let cfg = EngineConfig::from_yaml_str(yaml).unwrap();
    let err = Session::from_config(&cfg, 0.0).unwrap_err();
    assert!(matches!(err, Error::UnknownChannel(ref name) if name == "CH2"));
}

#[test]
fn math_channels_on_plain_hardware_channel_wait_for_first_packet() {
    let yaml = r#"
devices:
  - name: dmm
    device_type: Measurement
    channel_groups:
      - name: main
        channels: [CH1]
    math_channels:
      - name: CH1_avg
        group: main
        quantity: Voltage
        unit: Volt
        op: { kind: MovingAverage, input: CH1, window: 2 }
      - name: CH1_int
        group: main
        quantity: Energy
        unit: WattHour
        op: { kind: Integrate, input: CH1_avg }
"#;
    let cfg = EngineConfig::from_yaml_str(yaml).unwrap();
    let session = Session::from_config(&cfg, 0.0).unwrap();
    let dmm = session.device_by_name("dmm").unwrap();
    assert!(dmm.channel("CH1_avg").is_none());
    assert_eq!(dmm.pending_math_channels(), vec!["CH1_avg".to_string(), "CH1_int".to_string()]);

    let packet = livesignal::AnalogPacket::single(
        "CH1",
        vec![4.0, 6.0],
        0.0,
        1,
        MeasuredQuantity::plain(Quantity::Voltage),
        Unit::Volt,
    );
    dmm.feed_in_analog(&packet).unwrap();
    assert!(dmm.pending_math_channels().is_empty());

    let avg = dmm.channel("CH1_avg").unwrap().actual_signal().unwrap();
    assert_eq!(avg.points(false), vec![[0.0, 2.0], [1.0, 5.0]]);
    let int = dmm.channel("CH1_int").unwrap().actual_signal().unwrap();
    assert_eq!(int.sample_count(), 2);
    assert!((int.last_value() - 5.0 / 3600.0).abs() < 1e-12);
}

#[test]
fn load_and_save_pick_format_from_extension() {
    let dir = std::env::temp_dir().join(format!("livesignal-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let cfg = EngineConfig::from_yaml_str(PSU_YAML).unwrap();
    for file in ["engine.json", "engine.yml"] {
        let path = dir.join(file);
        cfg.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), cfg);
    }
    let _ = std::fs::remove_dir_all(&dir);
}
