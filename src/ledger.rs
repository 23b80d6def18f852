//! Ledger de livraison : dernier instant livré ou congédié par alarme.
//!
//! C'est l'unique garde d'idempotence : aucune occurrence n'est armée à un
//! instant inférieur ou égal à l'entrée du ledger pour le même identifiant.

use chrono::{DateTime, TimeZone, Utc};

use crate::model::AlarmId;
use crate::storage::{KeyValueStore, StorageError};

pub const LEDGER_PREFIX: &str = "DLV_";

pub trait DeliveryLedger {
    fn last(&self, id: &AlarmId) -> Result<Option<DateTime<Utc>>, StorageError>;
    /// Enregistre `at` ; une entrée plus récente n'est jamais reculée.
    fn record(&self, id: &AlarmId, at: DateTime<Utc>) -> Result<(), StorageError>;
    fn clear(&self, id: &AlarmId) -> Result<(), StorageError>;
    fn clear_all(&self) -> Result<usize, StorageError>;
}

/// Ledger adossé à un `KeyValueStore` (`DLV_<id>` → millisecondes epoch).
pub struct StoreLedger<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: KeyValueStore + ?Sized> StoreLedger<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    fn key(id: &AlarmId) -> String {
        format!("{LEDGER_PREFIX}{id}")
    }
}

impl<S: KeyValueStore + ?Sized> DeliveryLedger for StoreLedger<'_, S> {
    fn last(&self, id: &AlarmId) -> Result<Option<DateTime<Utc>>, StorageError> {
        let key = Self::key(id);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };
        let millis: i64 = raw.trim().parse().map_err(|_| StorageError::Corrupt {
            key: key.clone(),
            reason: format!("not a timestamp: {raw}"),
        })?;
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(Some)
            .ok_or(StorageError::Corrupt {
                key,
                reason: format!("timestamp out of range: {millis}"),
            })
    }

    fn record(&self, id: &AlarmId, at: DateTime<Utc>) -> Result<(), StorageError> {
        if let Some(existing) = self.last(id).unwrap_or(None) {
            if existing >= at {
                return Ok(());
            }
        }
        self.store
            .set(&Self::key(id), &at.timestamp_millis().to_string())
    }

    fn clear(&self, id: &AlarmId) -> Result<(), StorageError> {
        self.store.delete(&Self::key(id))
    }

    fn clear_all(&self) -> Result<usize, StorageError> {
        self.store.delete_prefix(LEDGER_PREFIX)
    }
}
