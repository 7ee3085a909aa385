//! Database transaction utilities
//!
//! Multi-statement operations that must be atomic (role deletion, cascading deletes,
//! switching the primary file of a media item) run through [`TransactionGuard`].

use anyhow::{Context, Result};
use sqlx::Transaction;
use std::ops::{Deref, DerefMut};

use super::database::{Db, DbPool};

/// A database transaction wrapper that commits explicitly and rolls back otherwise
///
/// # Example
///
/// ```ignore
/// let mut tx = db.begin().await?;
/// sqlx::query("DELETE FROM log_entries WHERE collection_id = $1")
///     .bind(id)
///     .execute(&mut **tx)
///     .await?;
/// tx.commit().await?;
/// ```
pub struct TransactionGuard<'a> {
    transaction: Option<Transaction<'a, Db>>,
}

impl<'a> TransactionGuard<'a> {
    /// Begin a new database transaction
    pub async fn begin(pool: &'a DbPool) -> Result<Self> {
        let transaction = pool
            .begin()
            .await
            .context("Failed to begin database transaction")?;

        Ok(Self {
            transaction: Some(transaction),
        })
    }

    /// Commit the transaction
    pub async fn commit(mut self) -> Result<()> {
        if let Some(tx) = self.transaction.take() {
            tx.commit()
                .await
                .context("Failed to commit database transaction")?;
        }
        Ok(())
    }

    /// Rollback the transaction
    pub async fn rollback(mut self) -> Result<()> {
        if let Some(tx) = self.transaction.take() {
            tx.rollback()
                .await
                .context("Failed to rollback database transaction")?;
        }
        Ok(())
    }
}

impl<'a> Deref for TransactionGuard<'a> {
    type Target = Transaction<'a, Db>;

    #[allow(clippy::expect_used)]
    fn deref(&self) -> &Self::Target {
        self.transaction
            .as_ref()
            .expect("Transaction was already committed or rolled back")
    }
}

impl<'a> DerefMut for TransactionGuard<'a> {
    #[allow(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.transaction
            .as_mut()
            .expect("Transaction was already committed or rolled back")
    }
}

impl<'a> Drop for TransactionGuard<'a> {
    fn drop(&mut self) {
        // sqlx queues a rollback when the inner transaction is dropped unfinished
        if self.transaction.is_some() {
            tracing::debug!("Transaction dropped without commit - rolling back");
        }
    }
}
