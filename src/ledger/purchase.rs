//! Purchase documents

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::debug;

use crate::ledger::Bookkeeper;
use crate::tax::iva::{round2, vat, zero};
use crate::traits::*;
use crate::types::*;

/// IVA credit a form would pre-fill for a taxable purchase amount.
///
/// The ledger never applies it by itself; the four purchase amounts are
/// always stored as given.
pub fn suggested_iva_credit(taxable: &BigDecimal) -> BigDecimal {
    vat(taxable)
}

/// Data for a new purchase document
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseInput {
    pub date: NaiveDate,
    pub document_type: String,
    pub supplier_nrc: String,
    pub document_number: String,
    pub taxable_amount: BigDecimal,
    pub exempt_amount: BigDecimal,
    pub iva_credit: BigDecimal,
    pub iva_withheld: BigDecimal,
}

impl PurchaseInput {
    pub fn new(
        date: NaiveDate,
        document_type: impl Into<String>,
        supplier_nrc: impl Into<String>,
        document_number: impl Into<String>,
    ) -> Self {
        Self {
            date,
            document_type: document_type.into(),
            supplier_nrc: supplier_nrc.into(),
            document_number: document_number.into(),
            taxable_amount: zero(),
            exempt_amount: zero(),
            iva_credit: zero(),
            iva_withheld: zero(),
        }
    }

    /// Set the taxable amount together with the suggested IVA credit
    pub fn taxable_with_credit(mut self, taxable: BigDecimal) -> Self {
        self.iva_credit = suggested_iva_credit(&taxable);
        self.taxable_amount = taxable;
        self
    }

    pub fn amounts(
        mut self,
        taxable: BigDecimal,
        exempt: BigDecimal,
        iva_credit: BigDecimal,
        iva_withheld: BigDecimal,
    ) -> Self {
        self.taxable_amount = taxable;
        self.exempt_amount = exempt;
        self.iva_credit = iva_credit;
        self.iva_withheld = iva_withheld;
        self
    }

    /// taxable + exempt + credit - withheld
    pub fn total(&self) -> BigDecimal {
        round2(
            &(&self.taxable_amount + &self.exempt_amount + &self.iva_credit
                - &self.iva_withheld),
        )
    }

    fn into_record(self, id: String, correlative: u64) -> PurchaseRecord {
        let total = self.total();
        PurchaseRecord {
            id,
            correlative,
            document_type: self.document_type.trim().to_string(),
            date: self.date,
            supplier_nrc: self.supplier_nrc.trim().to_string(),
            document_number: self.document_number.trim().to_string(),
            taxable_amount: round2(&self.taxable_amount),
            exempt_amount: round2(&self.exempt_amount),
            iva_credit: round2(&self.iva_credit),
            iva_withheld: round2(&self.iva_withheld),
            total,
        }
    }
}

/// Partial update of a purchase record. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurchasePatch {
    pub date: Option<NaiveDate>,
    pub document_type: Option<String>,
    pub supplier_nrc: Option<String>,
    pub document_number: Option<String>,
    pub taxable_amount: Option<BigDecimal>,
    pub exempt_amount: Option<BigDecimal>,
    pub iva_credit: Option<BigDecimal>,
    pub iva_withheld: Option<BigDecimal>,
}

impl PurchasePatch {
    fn merge(self, record: &PurchaseRecord) -> PurchaseInput {
        PurchaseInput {
            date: self.date.unwrap_or(record.date),
            document_type: self
                .document_type
                .unwrap_or_else(|| record.document_type.clone()),
            supplier_nrc: self
                .supplier_nrc
                .unwrap_or_else(|| record.supplier_nrc.clone()),
            document_number: self
                .document_number
                .unwrap_or_else(|| record.document_number.clone()),
            taxable_amount: self
                .taxable_amount
                .unwrap_or_else(|| record.taxable_amount.clone()),
            exempt_amount: self
                .exempt_amount
                .unwrap_or_else(|| record.exempt_amount.clone()),
            iva_credit: self
                .iva_credit
                .unwrap_or_else(|| record.iva_credit.clone()),
            iva_withheld: self
                .iva_withheld
                .unwrap_or_else(|| record.iva_withheld.clone()),
        }
    }
}

impl<S: SnapshotStore> Bookkeeper<S> {
    /// Purchase records in insertion order
    pub fn purchases(&self) -> &[PurchaseRecord] {
        &self.state.purchase_records
    }

    pub fn get_purchase(&self, id: &str) -> Option<&PurchaseRecord> {
        self.state.purchase_records.iter().find(|r| r.id == id)
    }

    /// Record a purchase with the next purchases correlative
    pub async fn add_purchase(&mut self, input: PurchaseInput) -> LedgerResult<PurchaseRecord> {
        self.record_validator.validate_purchase(&input)?;

        let correlative = self.state.next_correlatives.take(Series::Purchases);
        let record = input.into_record(new_id(), correlative);

        self.state.purchase_records.push(record.clone());
        self.persist().await?;

        debug!(id = %record.id, correlative, total = %record.total, "Purchase recorded");
        Ok(record)
    }

    /// Update a purchase and recompute its total
    pub async fn update_purchase(
        &mut self,
        id: &str,
        patch: PurchasePatch,
    ) -> LedgerResult<PurchaseRecord> {
        let index = self
            .state
            .purchase_records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("purchase with id '{}'", id)))?;

        let current = &self.state.purchase_records[index];
        let input = patch.merge(current);
        self.record_validator.validate_purchase(&input)?;
        let updated = input.into_record(current.id.clone(), current.correlative);

        self.state.purchase_records[index] = updated.clone();
        self.persist().await?;

        debug!(id, total = %updated.total, "Purchase updated");
        Ok(updated)
    }

    /// Delete a purchase; returns whether anything was removed
    pub async fn delete_purchase(&mut self, id: &str) -> LedgerResult<bool> {
        let before = self.state.purchase_records.len();
        self.state.purchase_records.retain(|r| r.id != id);

        if self.state.purchase_records.len() == before {
            return Ok(false);
        }

        self.persist().await?;
        debug!(id, "Purchase deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_total_formula() {
        let input = PurchaseInput::new(date(1), "CCF", "900-1", "A-001").amounts(
            dec("100"),
            dec("15.25"),
            dec("13"),
            dec("1"),
        );
        assert_eq!(input.total(), dec("127.25"));
    }

    #[test]
    fn test_suggested_credit() {
        assert_eq!(suggested_iva_credit(&dec("200")), dec("26.00"));
        let input = PurchaseInput::new(date(1), "CCF", "900-1", "A-2").taxable_with_credit(dec("10"));
        assert_eq!(input.iva_credit, dec("1.30"));
    }

    #[tokio::test]
    async fn test_add_purchase_keeps_given_credit() {
        let storage = MemoryStorage::new();
        let mut book = Bookkeeper::open(storage.clone()).await.unwrap();

        let first = book
            .add_purchase(PurchaseInput::new(date(2), "Importacion", "900-1", "I-77").amounts(
                dec("100"),
                dec("0"),
                dec("5"),
                dec("0"),
            ))
            .await
            .unwrap();
        let second = book
            .add_purchase(PurchaseInput::new(date(3), "CCF", "900-2", "B-1"))
            .await
            .unwrap();

        assert_eq!(first.iva_credit, dec("5"));
        assert_eq!(first.total, dec("105"));
        assert_eq!((first.correlative, second.correlative), (1, 2));
        assert_eq!(book.next_correlatives().purchases, 3);
        assert_eq!(storage.stored().unwrap().purchase_records.len(), 2);
    }

    #[tokio::test]
    async fn test_update_purchase_recomputes_total() {
        let mut book = Bookkeeper::open(MemoryStorage::new()).await.unwrap();
        let purchase = book
            .add_purchase(PurchaseInput::new(date(4), "CCF", "900-1", "C-9").taxable_with_credit(dec("100")))
            .await
            .unwrap();
        assert_eq!(purchase.total, dec("113.00"));

        let updated = book
            .update_purchase(
                &purchase.id,
                PurchasePatch {
                    iva_withheld: Some(dec("1.00")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.correlative, purchase.correlative);
        assert_eq!(updated.iva_credit, dec("13.00"));
        assert_eq!(updated.total, dec("112.00"));

        let missing = book.update_purchase("nope", PurchasePatch::default()).await;
        assert!(matches!(missing, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_purchase_is_idempotent() {
        let mut book = Bookkeeper::open(MemoryStorage::new()).await.unwrap();
        let purchase = book
            .add_purchase(PurchaseInput::new(date(5), "Otros", "", ""))
            .await
            .unwrap();

        assert!(book.delete_purchase(&purchase.id).await.unwrap());
        assert!(!book.delete_purchase(&purchase.id).await.unwrap());
    }
}
