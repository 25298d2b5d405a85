use super::ApiError;
use crate::models::MediaType;

pub fn validate_id(resource: &str, id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid {resource} ID: {id}. ID must be a positive integer"
        )));
    }
    Ok(id)
}

pub fn validate_limit(limit: usize) -> Result<usize, ApiError> {
    const MAX_LIMIT: usize = 1000;
    const MIN_LIMIT: usize = 1;

    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::validation(format!(
            "Invalid limit: {limit}. Limit must be between {MIN_LIMIT} and {MAX_LIMIT}"
        )));
    }
    Ok(limit)
}

pub fn validate_search_query(query: &str) -> Result<&str, ApiError> {
    let trimmed = query.trim();

    if trimmed.is_empty() {
        return Err(ApiError::validation("Search query cannot be empty"));
    }

    if trimmed.len() > 200 {
        return Err(ApiError::validation(
            "Search query must be 200 characters or less",
        ));
    }

    Ok(trimmed)
}

pub fn validate_media_type(raw: &str) -> Result<MediaType, ApiError> {
    raw.parse::<MediaType>()
        .map_err(|e| ApiError::validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert_eq!(validate_id("client", 3).unwrap(), 3);
        assert!(validate_id("client", 0).is_err());
        assert!(validate_id("client", -1).is_err());
    }

    #[test]
    fn test_validate_limit() {
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(1000).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(1001).is_err());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("  heat ").unwrap(), "heat");
        assert!(validate_search_query("   ").is_err());
        assert!(validate_search_query(&"a".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_media_type() {
        assert_eq!(validate_media_type("Movie").unwrap(), MediaType::Movie);
        assert!(matches!(
            validate_media_type("podcast"),
            Err(ApiError::ValidationError(_))
        ));
    }
}
