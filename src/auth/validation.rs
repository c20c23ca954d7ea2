use lazy_static::lazy_static;
use regex::Regex;

use super::dto::{LoginRequest, SignupRequest};
use crate::{error::AppError, response::FieldIssue};

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn check_email(email: &str, issues: &mut Vec<FieldIssue>) {
    if email.is_empty() {
        issues.push(FieldIssue::new("email", "Email is required"));
    } else if !is_valid_email(email) {
        issues.push(FieldIssue::new("email", "Invalid email address"));
    }
}

fn finish(issues: Vec<FieldIssue>) -> Result<(), AppError> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(issues))
    }
}

pub fn validate_signup(req: &SignupRequest) -> Result<(), AppError> {
    let mut issues = Vec::new();
    check_email(&req.email, &mut issues);

    let len = req.password.chars().count();
    if req.password.is_empty() {
        issues.push(FieldIssue::new("password", "Password is required"));
    } else if len < PASSWORD_MIN_LEN {
        issues.push(FieldIssue::new(
            "password",
            format!("Password must be at least {PASSWORD_MIN_LEN} characters"),
        ));
    } else if len > PASSWORD_MAX_LEN {
        issues.push(FieldIssue::new(
            "password",
            format!("Password must be at most {PASSWORD_MAX_LEN} characters"),
        ));
    }
    finish(issues)
}

pub fn validate_login(req: &LoginRequest) -> Result<(), AppError> {
    let mut issues = Vec::new();
    check_email(&req.email, &mut issues);
    if req.password.is_empty() {
        issues.push(FieldIssue::new("password", "Password is required"));
    }
    finish(issues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    fn issues(err: AppError) -> Vec<FieldIssue> {
        match err {
            AppError::Validation(issues) => issues,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("First.Last+tag@sub.example.org"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@x.com"));
        assert!(!is_valid_email("@x.com"));
    }

    #[test]
    fn accepts_well_formed_signup() {
        assert!(validate_signup(&signup("a@x.com", "Secret123")).is_ok());
    }

    #[test]
    fn reports_every_bad_field() {
        let found = issues(validate_signup(&signup("nope", "short")).unwrap_err());
        let fields: Vec<_> = found.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, ["email", "password"]);
    }

    #[test]
    fn missing_fields_are_required() {
        let found = issues(validate_signup(&SignupRequest::default()).unwrap_err());
        assert_eq!(found[0].message, "Email is required");
        assert_eq!(found[1].message, "Password is required");
    }

    #[test]
    fn password_upper_bound() {
        let long = "a".repeat(PASSWORD_MAX_LEN + 1);
        assert!(validate_signup(&signup("a@x.com", &long)).is_err());
    }

    #[test]
    fn login_does_not_apply_password_policy() {
        let req = LoginRequest {
            email: "a@x.com".into(),
            password: "short".into(),
        };
        assert!(validate_login(&req).is_ok());
    }
}
