use crate::TransformError;
use std::str::FromStr;

const FIELD_SEPARATOR: &str = "//";
const TRAVEL_SEPARATOR: char = '-';

/// Parsed form of `payload.flight_details`
///
/// The raw value is `date//number//ORIGIN-DEST//class//distance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightDetails {
    pub flight_date: String,
    pub flight_number: String,
    pub flight_class: String,
    pub distance: String,
    pub origin: String,
    pub destination: String,
}

impl FlightDetails {
    pub fn parse(raw: &str) -> Result<Self, TransformError> {
        let parts: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
        let [flight_date, flight_number, travel, flight_class, distance] = parts.as_slice() else {
            return Err(TransformError::FlightDetailsArity {
                value: raw.to_string(),
                found: parts.len(),
            });
        };

        let legs: Vec<&str> = travel.split(TRAVEL_SEPARATOR).collect();
        let [origin, destination] = legs.as_slice() else {
            return Err(TransformError::TravelArity {
                value: travel.to_string(),
                found: legs.len(),
            });
        };

        Ok(Self {
            flight_date: flight_date.to_string(),
            flight_number: flight_number.to_string(),
            flight_class: flight_class.to_string(),
            distance: distance.to_string(),
            origin: origin.to_string(),
            destination: destination.to_string(),
        })
    }
}

impl FromStr for FlightDetails {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_segments() {
        let details: FlightDetails = "2024-01-05//AB123//LHR-JFK//Economy//5500".parse().unwrap();
        assert_eq!(
            details,
            FlightDetails {
                flight_date: "2024-01-05".into(),
                flight_number: "AB123".into(),
                flight_class: "Economy".into(),
                distance: "5500".into(),
                origin: "LHR".into(),
                destination: "JFK".into(),
            }
        );
    }

    #[test]
    fn empty_segments_are_kept() {
        let details = FlightDetails::parse("////-////").unwrap();
        assert_eq!(details.flight_date, "");
        assert_eq!(details.origin, "");
        assert_eq!(details.destination, "");
    }

    #[test]
    fn too_few_segments() {
        let err = FlightDetails::parse("2024-01-05//AB123//LHR-JFK//Economy").unwrap_err();
        assert_eq!(
            err,
            TransformError::FlightDetailsArity {
                value: "2024-01-05//AB123//LHR-JFK//Economy".into(),
                found: 4,
            }
        );
    }

    #[test]
    fn too_many_segments() {
        let err = FlightDetails::parse("a//b//C-D//e//f//g").unwrap_err();
        assert!(matches!(err, TransformError::FlightDetailsArity { found: 6, .. }));
    }

    #[test]
    fn single_slash_is_not_a_separator() {
        let err = FlightDetails::parse("2024/01/05//AB123//LHR-JFK//Economy").unwrap_err();
        assert!(matches!(err, TransformError::FlightDetailsArity { found: 4, .. }));
    }

    #[test]
    fn travel_without_dash() {
        let err = FlightDetails::parse("2024-01-05//AB123//LHRJFK//Economy//5500").unwrap_err();
        assert_eq!(
            err,
            TransformError::TravelArity {
                value: "LHRJFK".into(),
                found: 1,
            }
        );
    }

    #[test]
    fn travel_with_extra_leg() {
        let err = FlightDetails::parse("2024-01-05//AB123//LHR-JFK-SFO//Economy//5500").unwrap_err();
        assert!(matches!(err, TransformError::TravelArity { found: 3, .. }));
    }
}
