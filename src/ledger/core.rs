//! Main bookkeeping object that owns the ledger state

use tracing::{debug, info};

use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_company_info;

/// Single-user fiscal ledger
///
/// Owns the whole [`Snapshot`] in memory and writes it through the
/// [`SnapshotStore`] after every mutating operation. All mutations take
/// `&mut self`, so there is never more than one writer.
pub struct Bookkeeper<S: SnapshotStore> {
    pub(crate) state: Snapshot,
    storage: S,
    pub(crate) entity_validator: Box<dyn EntityValidator>,
    pub(crate) record_validator: Box<dyn RecordValidator>,
}

impl<S: SnapshotStore> Bookkeeper<S> {
    /// Open a ledger, loading the last saved snapshot from `storage`
    pub async fn open(storage: S) -> LedgerResult<Self> {
        Self::open_with_validators(
            storage,
            Box::new(DefaultEntityValidator),
            Box::new(DefaultRecordValidator),
        )
        .await
    }

    /// Open a ledger with custom validators
    pub async fn open_with_validators(
        storage: S,
        entity_validator: Box<dyn EntityValidator>,
        record_validator: Box<dyn RecordValidator>,
    ) -> LedgerResult<Self> {
        let state = match storage.load().await? {
            Some(mut snapshot) => {
                let repaired = snapshot.assign_missing_ids();
                if repaired > 0 {
                    debug!(repaired, "Assigned ids to stored records without one");
                }
                info!(
                    sales = snapshot.sales_records.len(),
                    purchases = snapshot.purchase_records.len(),
                    "Loaded ledger snapshot"
                );
                snapshot
            }
            None => Snapshot::default(),
        };

        Ok(Self {
            state,
            storage,
            entity_validator,
            record_validator,
        })
    }

    /// Read-only view of the whole state
    pub fn snapshot(&self) -> &Snapshot {
        &self.state
    }

    /// The storage backend
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub(crate) async fn persist(&mut self) -> LedgerResult<()> {
        self.storage.save(&self.state).await
    }

    /// Replace the whole state and persist it
    pub(crate) async fn replace_state(&mut self, snapshot: Snapshot) -> LedgerResult<()> {
        self.state = snapshot;
        self.persist().await
    }

    /// Company data used on reports
    pub fn company_info(&self) -> &CompanyInfo {
        &self.state.company_info
    }

    /// Replace the company data; name and NIT are mandatory
    pub async fn set_company_info(&mut self, info: CompanyInfo) -> LedgerResult<CompanyInfo> {
        let info = CompanyInfo {
            name: info.name.trim().to_string(),
            nit: info.nit.trim().to_string(),
            nrc: info.nrc.trim().to_string(),
            dui: info.dui.trim().to_string(),
            activity: info.activity.trim().to_string(),
            address: info.address.trim().to_string(),
            phone: info.phone.trim().to_string(),
        };
        validate_company_info(&info)?;

        self.state.company_info = info.clone();
        self.persist().await?;
        Ok(info)
    }

    /// Erase every entity, record and setting
    pub async fn reset(&mut self) -> LedgerResult<()> {
        info!("Resetting ledger to an empty state");
        self.replace_state(Snapshot::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;

    #[tokio::test]
    async fn test_open_merges_partial_snapshot() {
        let storage = MemoryStorage::new();
        let partial: Snapshot = serde_json::from_str(
            r#"{ "clients": [{ "name": "Sin id", "nit": "0614" }], "nextCorrelatives": { "salesCF": 7 } }"#,
        )
        .unwrap();
        storage.preload(partial);

        let book = Bookkeeper::open(storage).await.unwrap();

        assert_eq!(book.snapshot().next_correlatives.sales_cf, 7);
        assert_eq!(book.snapshot().next_correlatives.sales_ccf, 1);
        assert!(!book.snapshot().clients[0].id.is_empty());
    }

    #[tokio::test]
    async fn test_company_info_validation_and_persistence() {
        let storage = MemoryStorage::new();
        let mut book = Bookkeeper::open(storage.clone()).await.unwrap();

        let missing_nit = CompanyInfo {
            name: "Ferreteria Central".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            book.set_company_info(missing_nit).await,
            Err(LedgerError::Validation(_))
        ));
        assert_eq!(storage.save_count(), 0);

        let saved = book
            .set_company_info(CompanyInfo {
                name: " Ferreteria Central ".to_string(),
                nit: "0614-010190-101-1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(saved.name, "Ferreteria Central");
        assert_eq!(storage.stored().unwrap().company_info, saved);
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let storage = MemoryStorage::new();
        let mut book = Bookkeeper::open(storage.clone()).await.unwrap();
        book.state.next_correlatives.sales_ccf = 30;

        book.reset().await.unwrap();

        assert_eq!(book.snapshot(), &Snapshot::default());
        assert_eq!(storage.stored().unwrap(), Snapshot::default());
    }
}
