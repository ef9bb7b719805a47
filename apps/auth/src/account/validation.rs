use crate::errors::AppError;

const MAX_USERNAME_LEN: usize = 50;
const MAX_EMAIL_LEN: usize = 100;

/// The stored form of a username. Register and login both look users up by it.
pub fn normalize_username(username: &str) -> &str {
    username.trim()
}

pub fn validate_username(username: &str) -> Result<(), AppError> {
    let username = normalize_username(username);
    if username.is_empty() {
        return Err(AppError::Validation("username cannot be empty".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Structural email check: one `@`, a non-empty local part and a dotted domain.
pub fn validate_email(email: &str) -> Result<(), AppError> {
    let invalid = || AppError::Validation(format!("'{email}' is not a valid email address"));

    if email.chars().count() > MAX_EMAIL_LEN {
        return Err(AppError::Validation(format!(
            "email must be at most {MAX_EMAIL_LEN} characters"
        )));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::Validation("password cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("a.b+tag@mail.example.co.kr").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        for email in [
            "",
            "alice",
            "@example.com",
            "alice@",
            "alice@localhost",
            "alice@@example.com",
            "alice@example..com",
            "al ice@example.com",
        ] {
            assert!(validate_email(email).is_err(), "accepted {email:?}");
        }
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("   ").is_err());
        assert!(validate_username("has space").is_ok());
        assert!(validate_username(" alice ").is_ok());
        assert!(validate_username(&"x".repeat(51)).is_err());
        assert!(validate_username(&"x".repeat(50)).is_ok());
    }

    #[test]
    fn test_normalized_username_matches_across_register_and_login() {
        assert_eq!(normalize_username(" alice"), "alice");
        assert_eq!(normalize_username("alice\t"), normalize_username("alice"));
        assert_eq!(normalize_username("mary ann"), "mary ann");
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(validate_password("").is_err());
        assert!(validate_password("pw").is_ok());
    }
}
