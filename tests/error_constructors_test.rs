use chademo_ctl::error::ChademoError;

#[test]
fn error_constructors_group_1() {
    assert!(matches!(
        ChademoError::config("x"),
        ChademoError::Config { .. }
    ));
    assert!(matches!(ChademoError::bus("x"), ChademoError::Bus { .. }));
    assert!(matches!(
        ChademoError::signal("x"),
        ChademoError::Signal { .. }
    ));
    assert!(matches!(
        ChademoError::codec(0x100, "x"),
        ChademoError::Codec { id: 0x100, .. }
    ));
}

#[test]
fn error_constructors_group_2() {
    let ser = ChademoError::Serialization {
        message: "s".into(),
    };
    assert!(matches!(ser, ChademoError::Serialization { .. }));
    assert!(matches!(ChademoError::io("x"), ChademoError::Io { .. }));
    assert!(matches!(
        ChademoError::validation("f", "m"),
        ChademoError::Validation { .. }
    ));
}

#[test]
fn every_variant_names_its_boundary() {
    let all = [
        ChademoError::config("x"),
        ChademoError::validation("f", "m"),
        ChademoError::io("x"),
        ChademoError::Serialization {
            message: "x".into(),
        },
        ChademoError::bus("x"),
        ChademoError::signal("x"),
        ChademoError::codec(0x7FF, "x"),
    ];
    for err in &all {
        // No wildcard: every variant must be raised somewhere and listed here
        let prefix = match err {
            ChademoError::Config { .. } => "Configuration error",
            ChademoError::Validation { .. } => "Validation error",
            ChademoError::Io { .. } => "I/O error",
            ChademoError::Serialization { .. } => "Serialization error",
            ChademoError::Bus { .. } => "Bus error",
            ChademoError::Signal { .. } => "Signal error",
            ChademoError::Codec { .. } => "Codec error",
        };
        assert!(err.to_string().starts_with(prefix), "{}", err);
    }
}

#[test]
fn conversions_from_io_and_serde() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    assert!(matches!(ChademoError::from(io), ChademoError::Io { .. }));

    let yaml = serde_yaml::from_str::<u8>("not a number").unwrap_err();
    assert!(matches!(
        ChademoError::from(yaml),
        ChademoError::Serialization { .. }
    ));

    let json = serde_json::from_str::<u8>("{").unwrap_err();
    assert!(matches!(
        ChademoError::from(json),
        ChademoError::Serialization { .. }
    ));
}

#[test]
fn display_messages() {
    let e = ChademoError::validation("field", "bad");
    let s = format!("{}", e);
    assert!(s.contains("Validation error"));

    let e = ChademoError::bus("bus-off");
    assert_eq!(format!("{}", e), "Bus error: bus-off");
}
