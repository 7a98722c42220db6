use crate::error::{AppError, Result};

/// Instance names end up in file paths and script arguments.
pub fn validate_instance_name(name: &str) -> Result<()> {
    let is_safe = !name.is_empty()
        && !name.starts_with(['-', '.'])
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if !is_safe {
        return Err(AppError::invalid_request(format!(
            "Invalid instance name: {:?}",
            name
        )));
    }
    Ok(())
}

/// Certbot notification address passed through to the creation script.
pub fn validate_email(email: &str) -> Result<()> {
    let is_plausible = !email.starts_with('-')
        && !email.chars().any(char::is_whitespace)
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));

    if !is_plausible {
        return Err(AppError::invalid_request(format!(
            "Invalid notification email: {:?}",
            email
        )));
    }
    Ok(())
}

/// Requested tail window for log queries.
pub fn validate_line_count(lines: usize) -> Result<()> {
    if lines == 0 {
        return Err(AppError::invalid_request("Line count must be at least 1"));
    }
    Ok(())
}
