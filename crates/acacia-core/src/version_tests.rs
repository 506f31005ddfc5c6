use crate::{McVersion, VersionParseError};

#[test]
fn parse_round_trip() {
    let v: McVersion = "1.19.50".parse().unwrap();
    assert_eq!(v, McVersion::new(1, 19, 50));
    assert_eq!(v.to_string(), "1.19.50");
}

#[test]
fn parse_rejects_wrong_shape() {
    assert_eq!(
        "1.19".parse::<McVersion>(),
        Err(VersionParseError::WrongShape)
    );
    assert_eq!(
        "1.19.50.1".parse::<McVersion>(),
        Err(VersionParseError::WrongShape)
    );
}

#[test]
fn parse_rejects_garbage_component() {
    assert_eq!(
        "1.x.50".parse::<McVersion>(),
        Err(VersionParseError::InvalidNumber("x".to_string()))
    );
}

#[test]
fn ordering_is_component_wise() {
    let old: McVersion = "1.18.30".parse().unwrap();
    let new: McVersion = "1.19.0".parse().unwrap();
    assert!(old < new);
    assert!(new >= McVersion::new(1, 19, 0));
}
