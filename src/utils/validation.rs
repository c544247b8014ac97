use crate::utils::error::{AgentError, Result};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> AgentError {
    AgentError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(invalid(field_name, url_str, format!("Invalid URL format: {}", e))),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }
    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

/// Checks that `file` ends in one of `allowed_extensions` (case-insensitive).
pub fn validate_file_extension(field_name: &str, file: &str, allowed_extensions: &[&str]) -> Result<()> {
    let allowed_set: HashSet<String> = allowed_extensions
        .iter()
        .map(|ext| ext.to_ascii_lowercase())
        .collect();

    match std::path::Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some(extension) if allowed_set.contains(&extension.to_ascii_lowercase()) => Ok(()),
        Some(extension) => Err(invalid(
            field_name,
            file,
            format!(
                "Unsupported file extension: {}. Allowed extensions: {}",
                extension,
                allowed_extensions.join(", ")
            ),
        )),
        None => Err(invalid(field_name, file, "File has no extension or invalid filename")),
    }
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| AgentError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field_name, value, "Value cannot be empty or whitespace-only"));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

/// `low` must not exceed `high`; both named for the error.
pub fn validate_ordered<T: PartialOrd + std::fmt::Display + Copy>(
    low_field: &str,
    low: T,
    high_field: &str,
    high: T,
) -> Result<()> {
    if low > high {
        return Err(AgentError::ConfigValidationError {
            message: format!(
                "{} ({}) must not exceed {} ({})",
                low_field, low, high_field, high
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("vision.endpoint", "https://example.com").is_ok());
        assert!(validate_url("vision.endpoint", "http://localhost:8080/infer").is_ok());
        assert!(validate_url("vision.endpoint", "").is_err());
        assert!(validate_url("vision.endpoint", "invalid-url").is_err());
        assert!(validate_url("vision.endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("board_region.width", 800, 8).is_ok());
        assert!(validate_positive_number("board_region.width", 7, 8).is_err());
    }

    #[test]
    fn test_validate_file_extension() {
        let images = ["png", "jpg", "jpeg"];
        assert!(validate_file_extension("vision.frame_path", "shots/board.png", &images).is_ok());
        assert!(validate_file_extension("vision.frame_path", "board.JPG", &images).is_ok());
        assert!(validate_file_extension("vision.frame_path", "board.txt", &images).is_err());
        assert!(validate_file_extension("vision.frame_path", "board", &images).is_err());
    }

    #[test]
    fn test_validate_range_and_order() {
        assert!(validate_range("humanizer.hover_probability", 0.3, 0.0, 1.0).is_ok());
        assert!(validate_range("humanizer.hover_probability", 1.5, 0.0, 1.0).is_err());
        assert!(validate_ordered("min_delay_secs", 1.0, "max_delay_secs", 3.5).is_ok());
        assert!(matches!(
            validate_ordered("min_delay_secs", 4.0, "max_delay_secs", 3.5),
            Err(AgentError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_validate_required_field() {
        let missing: Option<u32> = None;
        assert!(matches!(
            validate_required_field("board_region", &missing),
            Err(AgentError::MissingConfigError { .. })
        ));
        assert_eq!(validate_required_field("x", &Some(3)).unwrap(), &3);
    }
}
