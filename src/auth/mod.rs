//! Authentication and authorization for ComponentVault
//!
//! Provides:
//! - JWT verification of identity provider bearer tokens
//! - The authenticated caller (`AuthUser`) handed to handlers
//! - Ownership checks against a document's owner field

pub mod jwt;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};

use crate::types::VaultError;

/// Authenticated caller, derived from a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Token subject, used as the user document ID
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl AuthUser {
    /// Name to denormalize onto authored documents
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Anonymous".to_string())
    }

    /// Fail with 403 unless this caller owns the document
    pub fn ensure_owner(&self, owner_id: &str, what: &str) -> Result<(), VaultError> {
        if self.uid == owner_id {
            Ok(())
        } else {
            Err(VaultError::Forbidden(format!(
                "You do not have permission to modify this {}",
                what
            )))
        }
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
            name: claims.name,
        }
    }
}

/// Verify the bearer token of a request, failing with 401
pub fn require_user(
    validator: &JwtValidator,
    auth_header: Option<&str>,
) -> Result<AuthUser, VaultError> {
    let token = extract_token_from_header(auth_header)
        .ok_or_else(|| VaultError::Unauthorized("No token provided".into()))?;

    let result = validator.verify_token(token);
    match result.claims {
        Some(claims) if result.valid => Ok(claims.into()),
        _ => Err(VaultError::Unauthorized(
            result.error.unwrap_or_else(|| "Invalid token".to_string()),
        )),
    }
}

/// Verify the bearer token if present; an absent or invalid token is anonymous
pub fn optional_user(validator: &JwtValidator, auth_header: Option<&str>) -> Option<AuthUser> {
    auth_header?;
    require_user(validator, auth_header).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_for(validator: &JwtValidator, uid: &str) -> String {
        let token = validator
            .generate_token(TokenInput {
                user_id: uid.into(),
                email: Some("grace@example.com".into()),
                name: None,
            })
            .unwrap();
        format!("Bearer {}", token)
    }

    #[test]
    fn test_require_user_ok() {
        let validator = JwtValidator::new_dev();
        let header = token_for(&validator, "u1");
        let user = require_user(&validator, Some(&header)).unwrap();
        assert_eq!(user.uid, "u1");
        assert_eq!(user.display_name(), "grace");
    }

    #[test]
    fn test_require_user_missing_token() {
        let validator = JwtValidator::new_dev();
        let err = require_user(&validator, None).unwrap_err();
        assert!(matches!(err, VaultError::Unauthorized(_)));
    }

    #[test]
    fn test_require_user_garbage_token() {
        let validator = JwtValidator::new_dev();
        let err = require_user(&validator, Some("Bearer nope")).unwrap_err();
        assert!(matches!(err, VaultError::Unauthorized(_)));
        assert!(optional_user(&validator, Some("Bearer nope")).is_none());
    }

    #[test]
    fn test_ensure_owner() {
        let user = AuthUser {
            uid: "u1".into(),
            email: None,
            name: Some("Ada".into()),
        };
        assert!(user.ensure_owner("u1", "component").is_ok());
        assert!(matches!(
            user.ensure_owner("u2", "component"),
            Err(VaultError::Forbidden(_))
        ));
    }
}
