use super::ApiError;

pub fn validate_photo_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid photo ID: {id}. Must be a positive integer"
        )));
    }
    Ok(id)
}

pub fn validate_user_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid user ID: {id}. Must be a positive integer"
        )));
    }
    Ok(id)
}

/// Parse an optional numeric form field. Blank values count as absent.
pub fn parse_coordinate(field: &str, value: Option<&str>) -> Result<Option<f64>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| ApiError::validation(format!("{field} must be a number, got '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ids() {
        assert_eq!(validate_photo_id(7).unwrap(), 7);
        assert!(validate_photo_id(0).is_err());
        assert!(validate_user_id(-3).is_err());
    }

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate("lat", None).unwrap(), None);
        assert_eq!(parse_coordinate("lat", Some("  ")).unwrap(), None);
        assert_eq!(parse_coordinate("lat", Some("37.5")).unwrap(), Some(37.5));
        assert!(parse_coordinate("lat", Some("north")).is_err());
        assert!(parse_coordinate("lat", Some("NaN")).is_err());
    }
}
