//! Account registration, login and session resolution.

use std::sync::Arc;

use crate::adapters::StorageError;
use crate::domain::{NewAccount, PasswordPolicy, SessionToken, UserId};
use crate::ports::AccountStore;
use crate::GlimpseError;

/// Strip an optional `Bearer ` prefix from an `Authorization` header value.
#[must_use]
pub fn token_from_header(value: &str) -> &str {
    let value = value.trim();
    match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => value[7..].trim(),
        _ => value,
    }
}

pub struct AuthService<S>
where
    S: AccountStore,
{
    storage: Arc<S>,
    policy: PasswordPolicy,
}

impl<S> AuthService<S>
where
    S: AccountStore,
    S::Error: Into<StorageError>,
{
    pub fn new(storage: Arc<S>, policy: PasswordPolicy) -> Self {
        Self { storage, policy }
    }

    /// Create an account. The email is trimmed and lower-cased.
    ///
    /// # Errors
    /// `InvalidRequest` for empty fields, `EmailTaken` for a duplicate email.
    pub fn register(&self, email: &str, name: &str, password: &str) -> Result<UserId, GlimpseError> {
        let email = email.trim().to_lowercase();
        let name = name.trim();
        if email.is_empty() || name.is_empty() || password.is_empty() {
            return Err(GlimpseError::InvalidRequest(
                "email, name and password are required".into(),
            ));
        }

        let password_hash = self.policy.hash(password)?;
        let account = NewAccount {
            email,
            name: name.to_string(),
            password_hash,
        };

        let created: Result<UserId, StorageError> =
            self.storage.create_account(&account).map_err(Into::into);
        match created {
            Ok(id) => Ok(id),
            Err(StorageError::Conflict(_)) => Err(GlimpseError::EmailTaken),
            Err(e) => Err(GlimpseError::Storage(e)),
        }
    }

    /// Check credentials and issue a fresh session token, replacing any
    /// previous one.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email or a wrong password.
    pub fn login(&self, email: &str, password: &str) -> Result<SessionToken, GlimpseError> {
        let email = email.trim().to_lowercase();
        let account = self
            .storage
            .find_by_email(&email)
            .map_err(|e| GlimpseError::Storage(e.into()))?
            .ok_or(GlimpseError::InvalidCredentials)?;

        if !self.policy.verify(password, &account.password_hash)? {
            tracing::warn!(user = %account.id, "Rejected login: wrong password");
            return Err(GlimpseError::InvalidCredentials);
        }

        let token = SessionToken::generate();
        self.storage
            .set_session(account.id, &token)
            .map_err(|e| GlimpseError::Storage(e.into()))?;
        tracing::info!(user = %account.id, "Session issued");
        Ok(token)
    }

    /// Resolve an `Authorization` header value to its owner.
    ///
    /// # Errors
    /// `Unauthenticated` if the header is empty or the token unknown.
    pub fn resolve(&self, header: &str) -> Result<UserId, GlimpseError> {
        let raw = token_from_header(header);
        if raw.is_empty() {
            return Err(GlimpseError::Unauthenticated);
        }
        self.storage
            .resolve_session(&SessionToken::from_client(raw))
            .map_err(|e| GlimpseError::Storage(e.into()))?
            .ok_or(GlimpseError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteStorage;

    fn create_test_service() -> AuthService<SqliteStorage> {
        let storage = Arc::new(SqliteStorage::in_memory().expect("Should create db"));
        AuthService::new(
            storage,
            PasswordPolicy {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
        )
    }

    #[test]
    fn test_token_from_header() {
        assert_eq!(token_from_header("Bearer abc"), "abc");
        assert_eq!(token_from_header("bearer  abc "), "abc");
        assert_eq!(token_from_header("abc"), "abc");
        assert_eq!(token_from_header(""), "");
    }

    #[test]
    fn test_register_login_resolve() {
        let service = create_test_service();
        let id = service
            .register(" Ana@Example.com ", "Ana", "s3cret")
            .expect("register");

        let token = service.login("ana@example.com", "s3cret").expect("login");
        assert_eq!(token.as_str().len(), 32);
        assert_eq!(service.resolve(token.as_str()).expect("resolve"), id);
        assert_eq!(
            service
                .resolve(&format!("Bearer {}", token.as_str()))
                .expect("resolve"),
            id
        );
    }

    #[test]
    fn test_duplicate_email() {
        let service = create_test_service();
        service.register("a@example.com", "A", "pw").expect("register");
        assert!(matches!(
            service.register("A@EXAMPLE.COM", "B", "pw2"),
            Err(GlimpseError::EmailTaken)
        ));
    }

    #[test]
    fn test_empty_fields_rejected() {
        let service = create_test_service();
        assert!(matches!(
            service.register("", "A", "pw"),
            Err(GlimpseError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.register("a@example.com", "A", ""),
            Err(GlimpseError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_bad_credentials() {
        let service = create_test_service();
        service.register("a@example.com", "A", "pw").expect("register");
        assert!(matches!(
            service.login("a@example.com", "nope"),
            Err(GlimpseError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("b@example.com", "pw"),
            Err(GlimpseError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_relogin_invalidates_old_token() {
        let service = create_test_service();
        service.register("a@example.com", "A", "pw").expect("register");
        let first = service.login("a@example.com", "pw").expect("login");
        let second = service.login("a@example.com", "pw").expect("login");

        assert!(matches!(
            service.resolve(first.as_str()),
            Err(GlimpseError::Unauthenticated)
        ));
        assert!(service.resolve(second.as_str()).is_ok());
        assert!(matches!(service.resolve("  "), Err(GlimpseError::Unauthenticated)));
    }
}
