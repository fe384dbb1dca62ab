#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use std::time::Duration;

use pressurize::domain::{parse_duration, Magnitude, SizeError};

#[test]
fn absolute_sizes() {
    assert_eq!("1GB".parse(), Ok(Magnitude::AbsoluteBytes(1_073_741_824)));
    assert_eq!("500MB".parse(), Ok(Magnitude::AbsoluteBytes(524_288_000)));
    assert_eq!("512".parse(), Ok(Magnitude::AbsoluteBytes(512)));
    assert_eq!("512B".parse(), Ok(Magnitude::AbsoluteBytes(512)));
    assert_eq!("10k".parse(), Ok(Magnitude::AbsoluteBytes(10_240)));
    assert_eq!("2 MB".parse(), Ok(Magnitude::AbsoluteBytes(2 * 1024 * 1024)));
    assert_eq!("1.5KB".parse(), Ok(Magnitude::AbsoluteBytes(1_536)));
    assert_eq!("3T".parse(), Ok(Magnitude::AbsoluteBytes(3 * (1u64 << 40))));
}

#[test]
fn percentage_directive() {
    assert_eq!("80%".parse(), Ok(Magnitude::PercentageOfFree(80.0)));
    assert_eq!("0%".parse(), Ok(Magnitude::PercentageOfFree(0.0)));
    assert_eq!("100%".parse(), Ok(Magnitude::PercentageOfFree(100.0)));
    assert_eq!(
        " 99.5% ".parse::<Magnitude>(),
        Ok(Magnitude::PercentageOfFree(99.5))
    );
}

#[test]
fn percentage_out_of_range() {
    assert!(matches!(
        "101%".parse::<Magnitude>(),
        Err(SizeError::InvalidPercentage(_))
    ));
    assert!(matches!(
        "-5%".parse::<Magnitude>(),
        Err(SizeError::InvalidPercentage(_))
    ));
    assert!(matches!(
        "x%".parse::<Magnitude>(),
        Err(SizeError::InvalidPercentage(_))
    ));
}

#[test]
fn malformed_sizes() {
    assert!(matches!(
        "abc".parse::<Magnitude>(),
        Err(SizeError::InvalidSizeFormat(_))
    ));
    assert!(matches!(
        "".parse::<Magnitude>(),
        Err(SizeError::InvalidSizeFormat(_))
    ));
    assert!(matches!(
        "12.3.4MB".parse::<Magnitude>(),
        Err(SizeError::InvalidSizeFormat(_))
    ));
    assert!(matches!(
        "10XB".parse::<Magnitude>(),
        Err(SizeError::UnsupportedUnit(_))
    ));
    assert!(matches!(
        "5PB".parse::<Magnitude>(),
        Err(SizeError::UnsupportedUnit(_))
    ));
}

#[test]
fn durations() {
    assert_eq!(parse_duration("30s").expect("ok"), Duration::from_secs(30));
    assert_eq!(parse_duration("5m").expect("ok"), Duration::from_secs(300));
    assert_eq!(parse_duration("1h").expect("ok"), Duration::from_secs(3_600));
    assert_eq!(
        parse_duration("1.5h").expect("ok"),
        Duration::from_secs(5_400)
    );
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("10d").is_err());
    assert!(parse_duration("fast").is_err());
}
