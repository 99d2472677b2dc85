//! Traits for storage abstraction and extensibility

use async_trait::async_trait;

use crate::ledger::purchase::PurchaseInput;
use crate::ledger::sales::{SaleAmounts, SaleInput};
use crate::tax::iva::zero;
use crate::types::*;

/// Persistence collaborator for the ledger
///
/// The ledger keeps its whole state in memory as a [`Snapshot`]. A store
/// hands back the last saved snapshot once at startup and receives the full
/// snapshot after every mutating operation.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved snapshot, `None` when nothing was saved yet
    async fn load(&self) -> LedgerResult<Option<Snapshot>>;

    /// Persist the complete snapshot
    async fn save(&mut self, snapshot: &Snapshot) -> LedgerResult<()>;
}

/// Trait for implementing custom client/supplier validation rules
pub trait EntityValidator: Send + Sync {
    /// Validate an entity before it is stored
    fn validate_entity(&self, kind: EntityKind, entity: &Entity) -> LedgerResult<()>;
}

/// Trait for implementing custom sales and purchase validation rules
pub trait RecordValidator: Send + Sync {
    /// Validate sales input before derivation
    fn validate_sale(&self, sale: &SaleInput) -> LedgerResult<()>;

    /// Validate purchase input before the total is computed
    fn validate_purchase(&self, purchase: &PurchaseInput) -> LedgerResult<()>;
}

/// Default entity validator: NIT mandatory, phone shape
pub struct DefaultEntityValidator;

impl EntityValidator for DefaultEntityValidator {
    fn validate_entity(&self, kind: EntityKind, entity: &Entity) -> LedgerResult<()> {
        if entity.nit.trim().is_empty() {
            return Err(LedgerError::Validation(format!(
                "NIT is mandatory for {}",
                kind
            )));
        }

        if let Some(phone) = &entity.phone {
            crate::utils::validation::validate_phone(phone)?;
        }

        Ok(())
    }
}

/// Default record validator with the rules every document must satisfy
pub struct DefaultRecordValidator;

impl RecordValidator for DefaultRecordValidator {
    fn validate_sale(&self, sale: &SaleInput) -> LedgerResult<()> {
        match &sale.amounts {
            SaleAmounts::CreditFiscal { taxable, exempt } => {
                let has_nrc = sale
                    .client_nrc
                    .as_deref()
                    .is_some_and(|nrc| !nrc.trim().is_empty());
                if !has_nrc {
                    return Err(LedgerError::Validation(
                        "A CCF requires the client's NRC".to_string(),
                    ));
                }
                if *taxable < zero() || *exempt < zero() {
                    return Err(LedgerError::Validation(
                        "CCF amounts cannot be negative".to_string(),
                    ));
                }
            }
            SaleAmounts::FinalConsumer { total } => {
                if *total < zero() {
                    return Err(LedgerError::Validation(
                        "CF total cannot be negative".to_string(),
                    ));
                }
            }
        }

        for item in &sale.items {
            if item.qty == 0 {
                return Err(LedgerError::Validation(format!(
                    "Item '{}' must have a quantity greater than zero",
                    item.desc
                )));
            }
            if item.price < zero() {
                return Err(LedgerError::Validation(format!(
                    "Item '{}' cannot have a negative price",
                    item.desc
                )));
            }
        }

        Ok(())
    }

    fn validate_purchase(&self, _purchase: &PurchaseInput) -> LedgerResult<()> {
        // Any amounts are accepted; the total may go negative after withholding
        Ok(())
    }
}
