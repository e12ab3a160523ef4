use regex::Regex;

pub mod accident;
pub mod auth;
pub mod geo;
pub mod hospital;
pub mod media;
pub mod volunteer;

pub const MIN_PASSWORD_LENGTH: usize = 8;

const EMAIL_PATTERN: &str =
    r"^([a-z0-9_+]([a-z0-9_+.]*[a-z0-9_+])?)@([a-z0-9]+([\-\.]{1}[a-z0-9]+)*\.[a-z]{2,6})$";

pub fn is_valid_email(email: &str) -> bool {
    Regex::new(EMAIL_PATTERN)
        .map(|regex| regex.is_match(&email.to_lowercase()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("volunteer@lifeline.org"));
        assert!(is_valid_email("First.Last+tag@Mail.Example.com"));
        assert!(!is_valid_email("missing-at.example.com"));
        assert!(!is_valid_email("trailing@dot."));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email(""));
    }
}
