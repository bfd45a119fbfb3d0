//! Storage ports: prediction history and accounts.
//!
//! The SQLite adapter implements both; services depend only on these traits.

use crate::domain::{Account, Domain, NewAccount, PredictionRecord, SessionToken, UserId};

/// A page of prediction records with pagination metadata.
#[derive(Debug, Clone)]
pub struct PredictionPage {
    /// Records in this page, newest first
    pub items: Vec<PredictionRecord>,
    /// Total count matching the query
    pub total_count: usize,
    /// Current page offset
    pub offset: usize,
    /// Page size limit
    pub limit: usize,
    /// Whether there are more pages
    pub has_more: bool,
}

impl PredictionPage {
    /// Create a new prediction page.
    #[must_use]
    pub fn new(items: Vec<PredictionRecord>, total_count: usize, offset: usize, limit: usize) -> Self {
        let has_more = offset.saturating_add(items.len()) < total_count;
        Self {
            items,
            total_count,
            offset,
            limit,
            has_more,
        }
    }

    /// Get the next page offset.
    #[must_use]
    pub fn next_offset(&self) -> Option<usize> {
        if self.has_more {
            self.offset.checked_add(self.limit)
        } else {
            None
        }
    }
}

/// Append-only store of prediction records.
pub trait PredictionStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Append one record.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn record(&self, record: &PredictionRecord) -> Result<(), Self::Error>;

    /// Every record owned by `user`, both domains, oldest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn history(&self, user: UserId) -> Result<Vec<PredictionRecord>, Self::Error>;

    /// Records owned by `user`, newest first, optionally restricted to a domain.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn history_page(
        &self,
        user: UserId,
        domain: Option<Domain>,
        offset: usize,
        limit: usize,
    ) -> Result<PredictionPage, Self::Error>;
}

/// Account and session persistence.
pub trait AccountStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert an account.
    ///
    /// # Errors
    /// Returns a conflict error if the email is already registered.
    fn create_account(&self, account: &NewAccount) -> Result<UserId, Self::Error>;

    /// Look up an account by (normalized) email.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn find_by_email(&self, email: &str) -> Result<Option<Account>, Self::Error>;

    /// Attach a session token to an account, replacing any previous one.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn set_session(&self, user: UserId, token: &SessionToken) -> Result<(), Self::Error>;

    /// Resolve a session token to its owner.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn resolve_session(&self, token: &SessionToken) -> Result<Option<UserId>, Self::Error>;
}
