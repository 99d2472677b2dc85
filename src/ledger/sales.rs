//! Sales documents and the CCF/CF IVA derivation

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::debug;

use crate::ledger::Bookkeeper;
use crate::tax::iva::{round2, vat, zero, IvaCalculation};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::normalize_optional;

/// Authoritative amounts of a sale, one variant per document type
#[derive(Debug, Clone, PartialEq)]
pub enum SaleAmounts {
    /// Taxable base and exempt amount are given, IVA is added on top
    CreditFiscal {
        taxable: BigDecimal,
        exempt: BigDecimal,
    },
    /// Gross total is given, base and IVA are extracted from it
    FinalConsumer { total: BigDecimal },
}

/// Amounts stored on a sales record after derivation
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedAmounts {
    pub taxable: BigDecimal,
    pub exempt: BigDecimal,
    pub iva_debit: BigDecimal,
    pub total: BigDecimal,
}

impl SaleAmounts {
    pub fn document_type(&self) -> DocumentType {
        match self {
            SaleAmounts::CreditFiscal { .. } => DocumentType::CreditFiscal,
            SaleAmounts::FinalConsumer { .. } => DocumentType::FinalConsumer,
        }
    }

    /// Run the derivation for this mode
    pub fn derive(&self) -> DerivedAmounts {
        match self {
            SaleAmounts::CreditFiscal { taxable, exempt } => {
                let taxable = round2(taxable);
                let exempt = round2(exempt);
                let iva_debit = vat(&taxable);
                let total = &taxable + &exempt + &iva_debit;
                DerivedAmounts {
                    taxable,
                    exempt,
                    iva_debit,
                    total,
                }
            }
            SaleAmounts::FinalConsumer { total } => {
                let calc = IvaCalculation::reverse_calculate(total);
                DerivedAmounts {
                    taxable: calc.base,
                    exempt: zero(),
                    iva_debit: calc.iva,
                    total: calc.total,
                }
            }
        }
    }

    /// Replace the CCF taxable base with the sum of `items` when they add up
    /// to something. CF amounts are returned unchanged.
    fn with_items(self, items: &[LineItem]) -> Self {
        match self {
            SaleAmounts::CreditFiscal { taxable, exempt } => {
                let items_base: BigDecimal = items.iter().map(LineItem::line_total).sum();
                let taxable = if items_base > zero() { items_base } else { taxable };
                SaleAmounts::CreditFiscal { taxable, exempt }
            }
            cf => cf,
        }
    }
}

/// Data for a new sales document
#[derive(Debug, Clone, PartialEq)]
pub struct SaleInput {
    pub date: NaiveDate,
    pub client_nrc: Option<String>,
    pub description: Option<String>,
    pub items: Vec<LineItem>,
    pub amounts: SaleAmounts,
}

impl SaleInput {
    /// A CCF sale to a registered client
    pub fn credit_fiscal(
        date: NaiveDate,
        client_nrc: impl Into<String>,
        taxable: BigDecimal,
        exempt: BigDecimal,
    ) -> Self {
        Self {
            date,
            client_nrc: Some(client_nrc.into()),
            description: None,
            items: Vec::new(),
            amounts: SaleAmounts::CreditFiscal { taxable, exempt },
        }
    }

    /// A CF sale given its VAT-inclusive total
    pub fn final_consumer(date: NaiveDate, total: BigDecimal) -> Self {
        Self {
            date,
            client_nrc: None,
            description: None,
            items: Vec::new(),
            amounts: SaleAmounts::FinalConsumer { total },
        }
    }

    pub fn with_items(mut self, items: Vec<LineItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn document_type(&self) -> DocumentType {
        self.amounts.document_type()
    }

    /// Authoritative amounts after line items are taken into account
    pub fn effective_amounts(&self) -> SaleAmounts {
        self.amounts.clone().with_items(&self.items)
    }
}

/// Partial update of a sales record. `None` keeps the stored value.
///
/// The document type is fixed at creation, so a patch only carries the
/// authoritative amounts of the record's own mode: `taxable_amount` and
/// `exempt_amount` for CCF, `total` for CF.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalePatch {
    pub date: Option<NaiveDate>,
    pub client_nrc: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub items: Option<Vec<LineItem>>,
    pub taxable_amount: Option<BigDecimal>,
    pub exempt_amount: Option<BigDecimal>,
    pub total: Option<BigDecimal>,
}

impl SalePatch {
    /// Merge onto the authoritative fields of `record`. Derived fields of the
    /// stored record are never read back.
    fn merge(self, record: &SalesRecord) -> LedgerResult<SaleInput> {
        let items_supplied = self.items.is_some();
        let items = self.items.unwrap_or_else(|| record.items.clone());

        let amounts = match record.document_type {
            DocumentType::CreditFiscal => {
                if self.total.is_some() {
                    return Err(LedgerError::Validation(
                        "The total of a CCF sale is derived; update its taxable or exempt amount"
                            .to_string(),
                    ));
                }
                SaleAmounts::CreditFiscal {
                    taxable: self
                        .taxable_amount
                        .unwrap_or_else(|| record.taxable_amount.clone()),
                    exempt: self
                        .exempt_amount
                        .unwrap_or_else(|| record.exempt_amount.clone()),
                }
            }
            DocumentType::FinalConsumer => {
                if self.taxable_amount.is_some() || self.exempt_amount.is_some() {
                    return Err(LedgerError::Validation(
                        "The amounts of a CF sale are derived from its total".to_string(),
                    ));
                }
                SaleAmounts::FinalConsumer {
                    total: self.total.unwrap_or_else(|| record.total.clone()),
                }
            }
        };
        // Stored items only drive the base again when the patch resends them
        let amounts = if items_supplied {
            amounts.with_items(&items)
        } else {
            amounts
        };

        Ok(SaleInput {
            date: self.date.unwrap_or(record.date),
            client_nrc: self.client_nrc.unwrap_or_else(|| record.client_nrc.clone()),
            description: self
                .description
                .unwrap_or_else(|| record.description.clone()),
            items,
            amounts,
        })
    }
}

fn build_record(id: String, correlative: u64, input: SaleInput, amounts: SaleAmounts) -> SalesRecord {
    let document_type = amounts.document_type();
    let derived = amounts.derive();
    let client_nrc = match document_type {
        DocumentType::CreditFiscal => normalize_optional(input.client_nrc.as_deref()),
        DocumentType::FinalConsumer => None,
    };

    SalesRecord {
        id,
        correlative,
        document_type,
        date: input.date,
        client_nrc,
        description: normalize_optional(input.description.as_deref()),
        items: input.items,
        taxable_amount: derived.taxable,
        exempt_amount: derived.exempt,
        iva_debit: derived.iva_debit,
        total: derived.total,
    }
}

impl<S: SnapshotStore> Bookkeeper<S> {
    /// Sales records in insertion order
    pub fn sales(&self) -> &[SalesRecord] {
        &self.state.sales_records
    }

    pub fn get_sale(&self, id: &str) -> Option<&SalesRecord> {
        self.state.sales_records.iter().find(|r| r.id == id)
    }

    /// Record a sale: derive its amounts, number it and persist
    pub async fn add_sale(&mut self, input: SaleInput) -> LedgerResult<SalesRecord> {
        self.record_validator.validate_sale(&input)?;

        let amounts = input.effective_amounts();
        let series = Series::from(input.document_type());
        let correlative = self.state.next_correlatives.take(series);
        let record = build_record(new_id(), correlative, input, amounts);

        self.state.sales_records.push(record.clone());
        self.persist().await?;

        debug!(
            id = %record.id,
            document_type = %record.document_type,
            correlative,
            total = %record.total,
            "Sale recorded"
        );
        Ok(record)
    }

    /// Update a sale and re-run its derivation from scratch.
    /// The id, document type and correlative never change.
    pub async fn update_sale(&mut self, id: &str, patch: SalePatch) -> LedgerResult<SalesRecord> {
        let index = self
            .state
            .sales_records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("sale with id '{}'", id)))?;

        let current = &self.state.sales_records[index];
        let input = patch.merge(current)?;
        self.record_validator.validate_sale(&input)?;

        let amounts = input.amounts.clone();
        let updated = build_record(current.id.clone(), current.correlative, input, amounts);

        self.state.sales_records[index] = updated.clone();
        self.persist().await?;

        debug!(id, total = %updated.total, "Sale updated");
        Ok(updated)
    }

    /// Delete a sale; returns whether anything was removed
    pub async fn delete_sale(&mut self, id: &str) -> LedgerResult<bool> {
        let before = self.state.sales_records.len();
        self.state.sales_records.retain(|r| r.id != id);

        if self.state.sales_records.len() == before {
            return Ok(false);
        }

        self.persist().await?;
        debug!(id, "Sale deleted");
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
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    async fn book() -> (Bookkeeper<MemoryStorage>, MemoryStorage) {
        let storage = MemoryStorage::new();
        (Bookkeeper::open(storage.clone()).await.unwrap(), storage)
    }

    #[test]
    fn test_ccf_derivation() {
        let derived = SaleAmounts::CreditFiscal {
            taxable: dec("150"),
            exempt: dec("0"),
        }
        .derive();

        assert_eq!(derived.iva_debit, dec("19.50"));
        assert_eq!(derived.total, dec("169.50"));
    }

    #[test]
    fn test_cf_derivation() {
        let derived = SaleAmounts::FinalConsumer { total: dec("113.00") }.derive();

        assert_eq!(derived.taxable, dec("100.00"));
        assert_eq!(derived.iva_debit, dec("13.00"));
        assert_eq!(derived.exempt, dec("0"));
    }

    #[test]
    fn test_cf_reconstructs_total() {
        for gross in ["0.01", "1", "9.99", "57.77", "1234.56", "100000.03"] {
            let derived = SaleAmounts::FinalConsumer { total: dec(gross) }.derive();
            let diff = (&derived.taxable + &derived.iva_debit - dec(gross)).abs();
            assert!(diff <= dec("0.01"), "{gross}");
        }
    }

    #[test]
    fn test_items_drive_ccf_base() {
        let input = SaleInput::credit_fiscal(date(1), "1234-5", dec("999"), dec("0")).with_items(
            vec![
                LineItem::new(2, "Cemento", dec("10.00")),
                LineItem::new(1, "Arena", dec("5.50")),
            ],
        );

        match input.effective_amounts() {
            SaleAmounts::CreditFiscal { taxable, .. } => assert_eq!(taxable, dec("25.50")),
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_add_ccf_sale() {
        let (mut book, storage) = book().await;

        let sale = book
            .add_sale(SaleInput::credit_fiscal(date(2), "1234-5", dec("150"), dec("0")))
            .await
            .unwrap();

        assert_eq!(sale.correlative, 1);
        assert_eq!(sale.iva_debit, dec("19.50"));
        assert_eq!(sale.total, dec("169.50"));
        assert_eq!(book.snapshot().next_correlatives.sales_ccf, 2);
        assert_eq!(book.snapshot().next_correlatives.sales_cf, 1);
        assert_eq!(storage.stored().unwrap().sales_records, vec![sale]);
    }

    #[tokio::test]
    async fn test_cf_forces_no_client_and_no_exempt() {
        let (mut book, _) = book().await;
        let mut input = SaleInput::final_consumer(date(3), dec("113.00"));
        input.client_nrc = Some("1234-5".to_string());

        let sale = book.add_sale(input).await.unwrap();

        assert_eq!(sale.document_type, DocumentType::FinalConsumer);
        assert_eq!(sale.client_nrc, None);
        assert_eq!(sale.exempt_amount, dec("0"));
        assert_eq!(sale.taxable_amount, dec("100.00"));
        assert_eq!(sale.iva_debit, dec("13.00"));
    }

    #[tokio::test]
    async fn test_ccf_requires_client_nrc() {
        let (mut book, storage) = book().await;

        let result = book
            .add_sale(SaleInput::credit_fiscal(date(4), "  ", dec("10"), dec("0")))
            .await;

        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert!(book.sales().is_empty());
        assert_eq!(book.snapshot().next_correlatives.sales_ccf, 1);
        assert_eq!(storage.save_count(), 0);
    }

    #[tokio::test]
    async fn test_correlatives_are_per_series_and_gapless() {
        let (mut book, _) = book().await;
        let mut ccf = Vec::new();
        let mut cf = Vec::new();

        for n in 0..5 {
            let sale = book
                .add_sale(SaleInput::credit_fiscal(date(5), "77-1", dec("10"), dec("0")))
                .await
                .unwrap();
            ccf.push(sale.correlative);
            if n % 2 == 0 {
                let sale = book
                    .add_sale(SaleInput::final_consumer(date(5), dec("11.30")))
                    .await
                    .unwrap();
                cf.push(sale.correlative);
            }
        }

        assert_eq!(ccf, vec![1, 2, 3, 4, 5]);
        assert_eq!(cf, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_update_rederives_ccf() {
        let (mut book, _) = book().await;
        let sale = book
            .add_sale(SaleInput::credit_fiscal(date(6), "1234-5", dec("100"), dec("0")))
            .await
            .unwrap();
        assert_eq!(sale.iva_debit, dec("13.00"));

        let updated = book
            .update_sale(
                &sale.id,
                SalePatch {
                    taxable_amount: Some(dec("200")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, sale.id);
        assert_eq!(updated.correlative, sale.correlative);
        assert_eq!(updated.iva_debit, dec("26.00"));
        assert_eq!(updated.total, dec("226.00"));
        assert_eq!(book.get_sale(&sale.id), Some(&updated));
    }

    #[tokio::test]
    async fn test_update_cf_rederives_from_new_total() {
        let (mut book, _) = book().await;
        let sale = book
            .add_sale(SaleInput::final_consumer(date(7), dec("113")))
            .await
            .unwrap();

        let updated = book
            .update_sale(
                &sale.id,
                SalePatch {
                    total: Some(dec("56.50")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.document_type, DocumentType::FinalConsumer);
        assert_eq!(updated.correlative, sale.correlative);
        assert_eq!(updated.taxable_amount, dec("50.00"));
        assert_eq!(updated.iva_debit, dec("6.50"));
    }

    #[tokio::test]
    async fn test_update_rejects_amounts_of_the_other_mode() {
        let (mut book, storage) = book().await;
        let ccf = book
            .add_sale(SaleInput::credit_fiscal(date(7), "1234-5", dec("100"), dec("0")))
            .await
            .unwrap();
        let cf = book
            .add_sale(SaleInput::final_consumer(date(7), dec("113")))
            .await
            .unwrap();
        let before = book.snapshot().clone();
        let saves = storage.save_count();

        let on_ccf = book
            .update_sale(
                &ccf.id,
                SalePatch {
                    total: Some(dec("10")),
                    ..Default::default()
                },
            )
            .await;
        let on_cf = book
            .update_sale(
                &cf.id,
                SalePatch {
                    taxable_amount: Some(dec("100")),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(on_ccf, Err(LedgerError::Validation(_))));
        assert!(matches!(on_cf, Err(LedgerError::Validation(_))));
        assert_eq!(book.snapshot(), &before);
        assert_eq!(storage.save_count(), saves);

        // The CF series is untouched: the next CF follows the existing one
        let next_cf = book
            .add_sale(SaleInput::final_consumer(date(8), dec("10")))
            .await
            .unwrap();
        assert_eq!(next_cf.correlative, cf.correlative + 1);
    }

    #[tokio::test]
    async fn test_update_unknown_sale_leaves_store_untouched() {
        let (mut book, storage) = book().await;
        book.add_sale(SaleInput::final_consumer(date(8), dec("10")))
            .await
            .unwrap();
        let before = book.snapshot().clone();

        let result = book.update_sale("missing", SalePatch::default()).await;

        assert!(matches!(result, Err(LedgerError::NotFound(_))));
        assert_eq!(book.snapshot(), &before);
        assert_eq!(storage.save_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_sale_is_idempotent() {
        let (mut book, _) = book().await;
        let sale = book
            .add_sale(SaleInput::final_consumer(date(9), dec("10")))
            .await
            .unwrap();

        assert!(book.delete_sale(&sale.id).await.unwrap());
        assert!(!book.delete_sale(&sale.id).await.unwrap());
        assert!(!book.delete_sale(&sale.id).await.unwrap());
    }
}
