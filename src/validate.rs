use std::sync::LazyLock;

use regex::Regex;

use crate::error::AppError;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z\s]+$").unwrap());
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Normalize an email for storage and lookup. Uniqueness is case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn check_name(name: &str, issues: &mut Vec<String>) {
    if name.chars().count() < 3 {
        issues.push("Name must be at least 3 characters long".to_string());
    } else if name.chars().count() > 50 {
        issues.push("Name must be at most 50 characters long".to_string());
    } else if !NAME_RE.is_match(name) {
        issues.push("Name can only contain letters and spaces".to_string());
    }
}

pub fn check_email(email: &str, issues: &mut Vec<String>) {
    if !EMAIL_RE.is_match(email) {
        issues.push("Invalid email format".to_string());
    }
}

pub fn check_password(password: &str, issues: &mut Vec<String>) {
    if password.chars().count() < 8 {
        issues.push("Password must be at least 8 characters long".to_string());
        return;
    }
    if password.chars().count() > 32 {
        issues.push("Password must be at most 32 characters long".to_string());
        return;
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| "@$!%*?&".contains(c));
    if !(has_lower && has_upper && has_digit && has_special) {
        issues.push(
            "Password must contain at least one lowercase letter, one uppercase letter, \
             one number, and one special character"
                .to_string(),
        );
    }
}

/// Full schema check for the validated user endpoints (create/update).
pub fn validate_new_user(name: &str, email: &str, password: &str) -> Result<(), AppError> {
    let mut issues = Vec::new();
    check_name(name, &mut issues);
    check_email(email, &mut issues);
    check_password(password, &mut issues);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_valid_user() {
        assert!(validate_new_user("Ann Stokes", "ann@x.com", "Secret1!").is_ok());
    }

    #[test]
    fn rejects_short_and_non_alpha_names() {
        let mut issues = Vec::new();
        check_name("Al", &mut issues);
        check_name("R2-D2", &mut issues);
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn rejects_bad_email_formats() {
        for bad in ["not-an-email", "a@b", "a b@x.com", "@x.com"] {
            let mut issues = Vec::new();
            check_email(bad, &mut issues);
            assert!(!issues.is_empty(), "expected {bad:?} to be rejected");
        }
    }

    #[test]
    fn normalizes_email_case() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn password_complexity_rules() {
        let mut issues = Vec::new();
        check_password("Secret1!", &mut issues);
        assert!(issues.is_empty());

        for bad in ["short1!", "nouppercase1!", "NOLOWERCASE1!", "NoDigits!!", "NoSpecial11"] {
            let mut issues = Vec::new();
            check_password(bad, &mut issues);
            assert!(!issues.is_empty(), "expected {bad:?} to be rejected");
        }
    }
}
