//! Monthly IVA books: sales book, purchase book and the IVA summary

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::ledger::Bookkeeper;
use crate::traits::*;
use crate::types::*;

/// Calendar month a book covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> LedgerResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(LedgerError::Validation(format!(
                "Month must be between 1 and 12, got {}",
                month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

/// Counterparty as printed on a book line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
    pub nrc: Option<String>,
    pub nit: Option<String>,
    pub name: String,
}

/// CCF line of the sales book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditFiscalLine {
    pub date: NaiveDate,
    pub correlative: u64,
    pub client: PartyRef,
    pub taxable_amount: BigDecimal,
    pub exempt_amount: BigDecimal,
    pub iva_debit: BigDecimal,
    pub total: BigDecimal,
}

/// CF line of the sales book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalConsumerLine {
    pub date: NaiveDate,
    pub correlative: u64,
    pub taxable_amount: BigDecimal,
    pub iva_debit: BigDecimal,
    pub total: BigDecimal,
}

/// Column totals of a group of sales lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesTotals {
    pub taxable_amount: BigDecimal,
    pub exempt_amount: BigDecimal,
    pub iva_debit: BigDecimal,
    pub total: BigDecimal,
}

impl SalesTotals {
    fn of<'a>(records: impl Iterator<Item = &'a SalesRecord> + Clone) -> Self {
        Self {
            taxable_amount: records.clone().map(|r| &r.taxable_amount).sum(),
            exempt_amount: records.clone().map(|r| &r.exempt_amount).sum(),
            iva_debit: records.clone().map(|r| &r.iva_debit).sum(),
            total: records.map(|r| &r.total).sum(),
        }
    }
}

/// Libro de ventas for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesBook {
    pub period: Period,
    pub credit_fiscal: Vec<CreditFiscalLine>,
    pub credit_fiscal_totals: SalesTotals,
    pub final_consumer: Vec<FinalConsumerLine>,
    pub final_consumer_totals: SalesTotals,
    /// IVA débito of both document types
    pub total_iva_debit: BigDecimal,
}

/// Line of the purchase book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub date: NaiveDate,
    pub correlative: u64,
    pub document_type: String,
    pub document_number: String,
    pub supplier: PartyRef,
    pub taxable_amount: BigDecimal,
    pub exempt_amount: BigDecimal,
    pub iva_credit: BigDecimal,
    pub iva_withheld: BigDecimal,
    pub total: BigDecimal,
}

/// Libro de compras for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseBook {
    pub period: Period,
    pub lines: Vec<PurchaseLine>,
    pub total_taxable: BigDecimal,
    pub total_exempt: BigDecimal,
    pub total_iva_credit: BigDecimal,
    pub total_iva_withheld: BigDecimal,
    pub total: BigDecimal,
}

/// Year-to-date figures of the summary year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualTotals {
    pub year: i32,
    /// Taxable plus exempt sales
    pub sales_excluding_iva: BigDecimal,
    /// Taxable plus exempt purchases
    pub purchases_excluding_iva: BigDecimal,
    pub sales_including_iva: BigDecimal,
}

/// Monthly IVA position with the yearly accumulators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatSummary {
    pub period: Period,
    pub total_sales: BigDecimal,
    pub total_purchases: BigDecimal,
    pub iva_debit: BigDecimal,
    pub iva_credit: BigDecimal,
    /// Reported on its own, not netted into `payable`
    pub iva_withheld: BigDecimal,
    /// debit - credit; negative means a remaining credit
    pub payable: BigDecimal,
    /// total_sales - total_purchases - payable
    pub utility: BigDecimal,
    pub annual: AnnualTotals,
}

impl<S: SnapshotStore> Bookkeeper<S> {
    fn resolve_party(&self, kind: EntityKind, nrc: Option<&str>) -> PartyRef {
        let nrc = nrc.map(str::trim).filter(|nrc| !nrc.is_empty());
        match nrc.and_then(|nrc| self.find_entity_by_nrc(kind, nrc)) {
            Some(entity) => PartyRef {
                nrc: entity.nrc.clone(),
                nit: Some(entity.nit.clone()),
                name: entity.name.clone(),
            },
            None => PartyRef {
                nrc: nrc.map(str::to_string),
                nit: None,
                name: UNKNOWN_PARTY.to_string(),
            },
        }
    }

    fn sales_in(&self, period: Period) -> Vec<&SalesRecord> {
        let mut sales: Vec<&SalesRecord> = self
            .state
            .sales_records
            .iter()
            .filter(|r| period.contains(r.date))
            .collect();
        sales.sort_by_key(|r| r.date);
        sales
    }

    fn purchases_in(&self, period: Period) -> Vec<&PurchaseRecord> {
        let mut purchases: Vec<&PurchaseRecord> = self
            .state
            .purchase_records
            .iter()
            .filter(|r| period.contains(r.date))
            .collect();
        purchases.sort_by_key(|r| r.date);
        purchases
    }

    /// Sales book for a calendar month
    pub fn sales_book(&self, year: i32, month: u32) -> LedgerResult<SalesBook> {
        let period = Period::new(year, month)?;
        let sales = self.sales_in(period);

        let ccf = sales
            .iter()
            .copied()
            .filter(|r| r.document_type == DocumentType::CreditFiscal);
        let cf = sales
            .iter()
            .copied()
            .filter(|r| r.document_type == DocumentType::FinalConsumer);

        let credit_fiscal = ccf
            .clone()
            .map(|r| CreditFiscalLine {
                date: r.date,
                correlative: r.correlative,
                client: self.resolve_party(EntityKind::Clients, r.client_nrc.as_deref()),
                taxable_amount: r.taxable_amount.clone(),
                exempt_amount: r.exempt_amount.clone(),
                iva_debit: r.iva_debit.clone(),
                total: r.total.clone(),
            })
            .collect();
        let final_consumer = cf
            .clone()
            .map(|r| FinalConsumerLine {
                date: r.date,
                correlative: r.correlative,
                taxable_amount: r.taxable_amount.clone(),
                iva_debit: r.iva_debit.clone(),
                total: r.total.clone(),
            })
            .collect();

        let credit_fiscal_totals = SalesTotals::of(ccf);
        let final_consumer_totals = SalesTotals::of(cf);
        let total_iva_debit = &credit_fiscal_totals.iva_debit + &final_consumer_totals.iva_debit;

        Ok(SalesBook {
            period,
            credit_fiscal,
            credit_fiscal_totals,
            final_consumer,
            final_consumer_totals,
            total_iva_debit,
        })
    }

    /// Purchase book for a calendar month
    pub fn purchase_book(&self, year: i32, month: u32) -> LedgerResult<PurchaseBook> {
        let period = Period::new(year, month)?;
        let purchases = self.purchases_in(period);

        let lines: Vec<PurchaseLine> = purchases
            .iter()
            .map(|r| PurchaseLine {
                date: r.date,
                correlative: r.correlative,
                document_type: r.document_type.clone(),
                document_number: r.document_number.clone(),
                supplier: self.resolve_party(EntityKind::Suppliers, Some(r.supplier_nrc.as_str())),
                taxable_amount: r.taxable_amount.clone(),
                exempt_amount: r.exempt_amount.clone(),
                iva_credit: r.iva_credit.clone(),
                iva_withheld: r.iva_withheld.clone(),
                total: r.total.clone(),
            })
            .collect();

        Ok(PurchaseBook {
            period,
            total_taxable: lines.iter().map(|l| &l.taxable_amount).sum(),
            total_exempt: lines.iter().map(|l| &l.exempt_amount).sum(),
            total_iva_credit: lines.iter().map(|l| &l.iva_credit).sum(),
            total_iva_withheld: lines.iter().map(|l| &l.iva_withheld).sum(),
            total: lines.iter().map(|l| &l.total).sum(),
            lines,
        })
    }

    /// IVA débito against crédito for a calendar month, plus sales and
    /// purchase totals for the month and its year
    pub fn vat_summary(&self, year: i32, month: u32) -> LedgerResult<VatSummary> {
        let period = Period::new(year, month)?;

        let sales = self.sales_in(period);
        let purchases = self.purchases_in(period);
        let total_sales: BigDecimal = sales.iter().map(|r| &r.total).sum();
        let iva_debit: BigDecimal = sales.iter().map(|r| &r.iva_debit).sum();
        let total_purchases: BigDecimal = purchases.iter().map(|r| &r.total).sum();
        let iva_credit: BigDecimal = purchases.iter().map(|r| &r.iva_credit).sum();
        let iva_withheld: BigDecimal = purchases.iter().map(|r| &r.iva_withheld).sum();

        let payable = &iva_debit - &iva_credit;
        let utility = &total_sales - &total_purchases - &payable;

        Ok(VatSummary {
            period,
            total_sales,
            total_purchases,
            iva_debit,
            iva_credit,
            iva_withheld,
            payable,
            utility,
            annual: self.annual_totals(year),
        })
    }

    fn annual_totals(&self, year: i32) -> AnnualTotals {
        let sales = self
            .state
            .sales_records
            .iter()
            .filter(|r| r.date.year() == year);
        let purchases = self
            .state
            .purchase_records
            .iter()
            .filter(|r| r.date.year() == year);

        AnnualTotals {
            year,
            sales_excluding_iva: sales
                .clone()
                .map(|r| &r.taxable_amount + &r.exempt_amount)
                .sum(),
            purchases_excluding_iva: purchases
                .map(|r| &r.taxable_amount + &r.exempt_amount)
                .sum(),
            sales_including_iva: sales.map(|r| &r.total).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::entity::EntityDraft;
    use crate::ledger::purchase::PurchaseInput;
    use crate::ledger::sales::SaleInput;
    use crate::utils::memory_storage::MemoryStorage;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    async fn sample_book() -> Bookkeeper<MemoryStorage> {
        let mut book = Bookkeeper::open(MemoryStorage::new()).await.unwrap();

        book.add_entity(
            EntityKind::Clients,
            EntityDraft::new("Comercial Maya", "0614-1").nrc("100-1"),
        )
        .await
        .unwrap();
        book.add_entity(
            EntityKind::Suppliers,
            EntityDraft::new("Importadora Sur", "0614-2").nrc("200-2"),
        )
        .await
        .unwrap();

        book.add_sale(SaleInput::credit_fiscal(date(3, 20), "100-1", dec("200"), dec("0")))
            .await
            .unwrap();
        book.add_sale(SaleInput::credit_fiscal(date(3, 5), "999-9", dec("100"), dec("10")))
            .await
            .unwrap();
        book.add_sale(SaleInput::final_consumer(date(3, 10), dec("113")))
            .await
            .unwrap();
        book.add_sale(SaleInput::final_consumer(date(4, 1), dec("226")))
            .await
            .unwrap();

        book.add_purchase(
            PurchaseInput::new(date(3, 2), "CCF", "200-2", "F-10")
                .amounts(dec("100"), dec("0"), dec("13"), dec("1")),
        )
        .await
        .unwrap();
        book.add_purchase(
            PurchaseInput::new(date(2, 28), "CCF", "200-2", "F-9")
                .amounts(dec("50"), dec("0"), dec("6.50"), dec("0")),
        )
        .await
        .unwrap();

        book
    }

    #[tokio::test]
    async fn test_sales_book_filters_sorts_and_resolves() {
        let book = sample_book().await;
        let report = book.sales_book(2024, 3).unwrap();

        assert_eq!(report.credit_fiscal.len(), 2);
        assert_eq!(report.credit_fiscal[0].date, date(3, 5));
        assert_eq!(report.credit_fiscal[0].client.name, UNKNOWN_PARTY);
        assert_eq!(report.credit_fiscal[1].client.name, "Comercial Maya");
        assert_eq!(report.credit_fiscal[1].client.nit.as_deref(), Some("0614-1"));

        assert_eq!(report.credit_fiscal_totals.taxable_amount, dec("300"));
        assert_eq!(report.credit_fiscal_totals.exempt_amount, dec("10"));
        assert_eq!(report.credit_fiscal_totals.iva_debit, dec("39.00"));
        assert_eq!(report.final_consumer.len(), 1);
        assert_eq!(report.final_consumer_totals.iva_debit, dec("13.00"));
        assert_eq!(report.total_iva_debit, dec("52.00"));
    }

    #[tokio::test]
    async fn test_purchase_book_and_summary() {
        let book = sample_book().await;

        let purchases = book.purchase_book(2024, 3).unwrap();
        assert_eq!(purchases.lines.len(), 1);
        assert_eq!(purchases.lines[0].supplier.name, "Importadora Sur");
        assert_eq!(purchases.total_iva_credit, dec("13"));
        assert_eq!(purchases.total_iva_withheld, dec("1"));
        assert_eq!(purchases.total, dec("112"));

        let summary = book.vat_summary(2024, 3).unwrap();
        assert_eq!(summary.iva_debit, dec("52.00"));
        assert_eq!(summary.iva_credit, dec("13"));
        assert_eq!(summary.iva_withheld, dec("1"));
        assert_eq!(summary.payable, dec("39.00"));
    }

    #[tokio::test]
    async fn test_summary_totals_and_utility() {
        let book = sample_book().await;
        let summary = book.vat_summary(2024, 3).unwrap();

        // 226.00 + 123.00 + 113.00
        assert_eq!(summary.total_sales, dec("462.00"));
        assert_eq!(summary.total_purchases, dec("112"));
        assert_eq!(summary.utility, dec("311.00"));
    }

    #[tokio::test]
    async fn test_summary_annual_totals_span_the_year() {
        let book = sample_book().await;
        let annual = book.vat_summary(2024, 3).unwrap().annual;

        assert_eq!(annual.year, 2024);
        // March 200 + 110 + 100, April CF 200
        assert_eq!(annual.sales_excluding_iva, dec("610.00"));
        assert_eq!(annual.purchases_excluding_iva, dec("150"));
        assert_eq!(annual.sales_including_iva, dec("688.00"));

        let next_year = book.vat_summary(2025, 3).unwrap();
        assert_eq!(next_year.annual.sales_including_iva, dec("0"));
        assert_eq!(next_year.total_sales, dec("0"));
    }

    #[tokio::test]
    async fn test_invalid_month() {
        let book = Bookkeeper::open(MemoryStorage::new()).await.unwrap();
        assert!(matches!(book.sales_book(2024, 13), Err(LedgerError::Validation(_))));
        assert!(matches!(book.vat_summary(2024, 0), Err(LedgerError::Validation(_))));
    }
}
