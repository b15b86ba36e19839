use nom::{
    character::complete::{i64, space0},
    combinator::{all_consuming, map},
    error::Error,
    sequence::delimited,
    Finish, IResult,
};

use std::str::FromStr;

/// One timing reading reported by the controller: the acoustic time of
/// flight in microseconds. The firmware computes it from a CPU tick
/// difference, so a wrapped counter can legitimately produce a negative
/// value; anything that fits a signed 64-bit integer is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingReading(pub i64);

fn parse_reading(s: &str) -> IResult<&str, TimingReading> {
    map(delimited(space0, i64, space0), TimingReading)(s)
}

impl FromStr for TimingReading {
    type Err = Error<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match all_consuming(parse_reading)(s).finish() {
            Ok((_remaining, reading)) => Ok(reading),
            Err(Error { input, code }) => Err(Error {
                input: input.to_string(),
                code,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_1() {
        let (leftover, res) = parse_reading("2941").unwrap();

        assert_eq!(leftover, "");
        assert_eq!(res, TimingReading(2941));
    }

    #[test]
    fn test_2() {
        // The firmware pads nothing, but be tolerant of stray spaces around
        // the digits.
        assert_eq!("  4412 ".parse(), Ok(TimingReading(4412)));
    }

    #[test]
    fn test_3() {
        // Wrapped tick counters show up as negative differences.
        assert_eq!("-17".parse(), Ok(TimingReading(-17)));
    }

    #[test]
    fn test_rejects_non_numeric() {
        assert!(TimingReading::from_str("abc").is_err());
        assert!(TimingReading::from_str("").is_err());
    }

    #[test]
    fn test_rejects_trailing_garbage() {
        assert!(TimingReading::from_str("2941us").is_err());
        assert!(TimingReading::from_str("29 41").is_err());
    }
}
