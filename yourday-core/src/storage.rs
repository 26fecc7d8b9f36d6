//! Local persistence collaborator.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;
use crate::evaluation::DailySummary;
use crate::identity::Identity;
use crate::ledger::PlayerStats;
use crate::tasks::Task;

/// Trait for abstracting ledger persistence.
/// Platform-specific implementations should provide this.
pub trait LedgerStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the ledger for an identity, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read or decoded.
    fn load_ledger(&self, identity: &Identity) -> Result<Option<PlayerStats>, Self::Error>;

    /// Save the ledger for an identity, replacing any previous copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be encoded or written.
    fn save_ledger(&self, identity: &Identity, stats: &PlayerStats) -> Result<(), Self::Error>;

    /// Remove the persisted ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be removed.
    fn delete_ledger(&self, identity: &Identity) -> Result<(), Self::Error>;

    /// Tasks owned by the identity, in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if tasks cannot be read.
    fn load_tasks(&self, identity: &Identity) -> Result<Vec<Task>, Self::Error>;

    /// Append an evaluation receipt.
    ///
    /// # Errors
    ///
    /// Returns an error if the receipt cannot be written.
    fn append_daily_summary(
        &self,
        identity: &Identity,
        summary: &DailySummary,
    ) -> Result<(), Self::Error>;

    /// Append one evaluation's receipts. Stores that can write them
    /// atomically should override this so a failure leaves none behind.
    ///
    /// # Errors
    ///
    /// Returns the first receipt write failure.
    fn append_daily_summaries(
        &self,
        identity: &Identity,
        summaries: &[DailySummary],
    ) -> Result<(), Self::Error> {
        summaries
            .iter()
            .try_for_each(|summary| self.append_daily_summary(identity, summary))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    ledgers: HashMap<Identity, String>,
    tasks: HashMap<Identity, Vec<Task>>,
    summaries: HashMap<Identity, Vec<DailySummary>>,
    fail_writes: bool,
    fail_summary_writes: bool,
}

/// In-process store keeping ledgers as JSON text. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Replace the task list for an identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn set_tasks(&self, identity: &Identity, tasks: Vec<Task>) -> Result<(), StoreError> {
        self.lock()?.tasks.insert(identity.clone(), tasks);
        Ok(())
    }

    /// Receipts appended for an identity so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn summaries(&self, identity: &Identity) -> Result<Vec<DailySummary>, StoreError> {
        Ok(self
            .lock()?
            .summaries
            .get(identity)
            .cloned()
            .unwrap_or_default())
    }

    /// Make every subsequent write fail, to exercise persistence errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn set_fail_writes(&self, fail: bool) -> Result<(), StoreError> {
        self.lock()?.fail_writes = fail;
        Ok(())
    }

    /// Make only receipt writes fail; ledger saves keep working.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn set_fail_summary_writes(&self, fail: bool) -> Result<(), StoreError> {
        self.lock()?.fail_summary_writes = fail;
        Ok(())
    }

    /// Raw JSON of a saved ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn raw_ledger(&self, identity: &Identity) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.ledgers.get(identity).cloned())
    }
}

impl LedgerStore for MemoryStore {
    type Error = StoreError;

    fn load_ledger(&self, identity: &Identity) -> Result<Option<PlayerStats>, Self::Error> {
        let state = self.lock()?;
        state
            .ledgers
            .get(identity)
            .map(|json| serde_json::from_str(json))
            .transpose()
            .map_err(StoreError::from)
    }

    fn save_ledger(&self, identity: &Identity, stats: &PlayerStats) -> Result<(), Self::Error> {
        let json = serde_json::to_string(stats)?;
        let mut state = self.lock()?;
        if state.fail_writes {
            return Err(StoreError::Unavailable);
        }
        state.ledgers.insert(identity.clone(), json);
        Ok(())
    }

    fn delete_ledger(&self, identity: &Identity) -> Result<(), Self::Error> {
        let mut state = self.lock()?;
        state.ledgers.remove(identity);
        state.summaries.remove(identity);
        Ok(())
    }

    fn load_tasks(&self, identity: &Identity) -> Result<Vec<Task>, Self::Error> {
        Ok(self
            .lock()?
            .tasks
            .get(identity)
            .cloned()
            .unwrap_or_default())
    }

    fn append_daily_summary(
        &self,
        identity: &Identity,
        summary: &DailySummary,
    ) -> Result<(), Self::Error> {
        self.append_daily_summaries(identity, std::slice::from_ref(summary))
    }

    fn append_daily_summaries(
        &self,
        identity: &Identity,
        summaries: &[DailySummary],
    ) -> Result<(), Self::Error> {
        let mut state = self.lock()?;
        if state.fail_writes || state.fail_summary_writes {
            return Err(StoreError::Unavailable);
        }
        state
            .summaries
            .entry(identity.clone())
            .or_default()
            .extend_from_slice(summaries);
        Ok(())
    }
}
