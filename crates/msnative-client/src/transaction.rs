//! Transaction statements.
//!
//! Transactions are plain SQL batches run as one-shot requests. Names are
//! validated before any SQL is built, so a name never reaches the server
//! unless it is a plain identifier.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// A transaction control statement with an optional transaction or
/// savepoint name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatement {
    /// `BEGIN TRANSACTION <name>;`
    Begin(String),
    /// `COMMIT TRANSACTION <name>;`
    Commit(String),
    /// `ROLLBACK TRANSACTION <name>;` (a savepoint name rolls back partially)
    Rollback(String),
    /// `SAVE TRANSACTION <name>;`
    Save(String),
}

impl TransactionStatement {
    /// Build a statement after validating its name.
    ///
    /// An empty name is accepted for `Begin`, `Commit`, and `Rollback` and
    /// addresses the outermost transaction. A savepoint always needs a name.
    pub fn new(kind: TransactionKind, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if !name.is_empty() || kind == TransactionKind::Save {
            validate_identifier(&name)?;
        }
        Ok(match kind {
            TransactionKind::Begin => Self::Begin(name),
            TransactionKind::Commit => Self::Commit(name),
            TransactionKind::Rollback => Self::Rollback(name),
            TransactionKind::Save => Self::Save(name),
        })
    }

    /// The kind of statement.
    #[must_use]
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Begin(_) => TransactionKind::Begin,
            Self::Commit(_) => TransactionKind::Commit,
            Self::Rollback(_) => TransactionKind::Rollback,
            Self::Save(_) => TransactionKind::Save,
        }
    }

    /// The transaction or savepoint name; empty when none was given.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Begin(name) | Self::Commit(name) | Self::Rollback(name) | Self::Save(name) => {
                name
            }
        }
    }

    /// The SQL text to submit.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TransactionStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} TRANSACTION {};", self.kind().keyword(), self.name())
    }
}

/// The four transaction control operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Start a transaction.
    Begin,
    /// Commit a transaction.
    Commit,
    /// Roll back a transaction or to a savepoint.
    Rollback,
    /// Create a savepoint.
    Save,
}

impl TransactionKind {
    /// The leading SQL keyword.
    #[must_use]
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Rollback => "ROLLBACK",
            Self::Save => "SAVE",
        }
    }
}

/// Validate a SQL Server identifier (transaction or savepoint name).
///
/// Names must start with a letter or underscore, contain only alphanumerics,
/// `_`, `@`, `#`, or `$`, and be 1-128 characters long.
pub fn validate_identifier(name: &str) -> Result<()> {
    #[allow(clippy::unwrap_used)] // literal pattern
    static IDENTIFIER_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_@#$]{0,127}$").unwrap());

    if name.is_empty() {
        return Err(Error::InvalidIdentifier(
            "identifier cannot be empty".into(),
        ));
    }

    if !IDENTIFIER_RE.is_match(name) {
        return Err(Error::InvalidIdentifier(format!(
            "invalid identifier '{name}': must start with letter/underscore, \
             contain only alphanumerics/_/@/#/$, and be 1-128 characters"
        )));
    }

    Ok(())
}
