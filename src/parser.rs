//! JSON parser for raw API payloads.

use anyhow::{Result, bail};
use serde::de::DeserializeOwned;

/// Decodes a JSON body returned by the API (or read back from a raw archive).
///
/// # Errors
///
/// Returns an error if the body is empty or whitespace, or if it is not valid
/// JSON for `T`. The backend sometimes answers 200 with an empty body, which
/// is treated the same as a malformed one.
pub fn parse_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        bail!("empty response body");
    }
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::types::{RoutePointsResponse, TimetableResponse};

    #[test]
    fn test_parse_empty_bytes_is_an_error() {
        let result: Result<RoutePointsResponse> = parse_payload(b"");
        assert!(result.is_err());
        let result: Result<RoutePointsResponse> = parse_payload(b"  \n");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_invalid_json() {
        let result: Result<RoutePointsResponse> = parse_payload(b"<html>502</html>");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_valid_timetable() {
        let body = br#"{"data":[{"tostationname":"Kempegowda Bus Station","tripdetails":[{"starttime":"06:10","endtime":"07:05"}]}]}"#;
        let timetable: TimetableResponse = parse_payload(body).unwrap();
        assert_eq!(timetable.data.len(), 1);
        assert_eq!(timetable.data[0].tripdetails[0].starttime.as_deref(), Some("06:10"));
        assert!(!timetable.has_no_records());
    }
}
