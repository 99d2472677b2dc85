//! Correlative numbering per document series

use tracing::{info, warn};

use crate::ledger::Bookkeeper;
use crate::traits::*;
use crate::types::*;

impl CorrelativeState {
    /// Next number of a series without consuming it
    pub fn peek(&self, series: Series) -> u64 {
        match series {
            Series::SalesCreditFiscal => self.sales_ccf,
            Series::SalesFinalConsumer => self.sales_cf,
            Series::Purchases => self.purchases,
        }
    }

    /// Hand out the next number of a series and advance it
    pub fn take(&mut self, series: Series) -> u64 {
        let slot = match series {
            Series::SalesCreditFiscal => &mut self.sales_ccf,
            Series::SalesFinalConsumer => &mut self.sales_cf,
            Series::Purchases => &mut self.purchases,
        };
        // Values below 1 can only come from a hand-edited snapshot
        let current = (*slot).max(1);
        *slot = current + 1;
        current
    }
}

/// Parse a correlative typed by a user: an integer of at least 1
pub fn parse_correlative(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|n| *n >= 1)
}

impl<S: SnapshotStore> Bookkeeper<S> {
    /// Next numbers of every series
    pub fn next_correlatives(&self) -> CorrelativeState {
        self.state.next_correlatives
    }

    /// Override the next CCF and CF sales numbers.
    ///
    /// Each value is applied on its own when it is at least 1; an invalid
    /// value leaves its series as it was. Fails only when neither value is
    /// valid. Returns whether a series changed. The purchases series cannot
    /// be overridden.
    pub async fn set_sales_correlatives(&mut self, next_ccf: i64, next_cf: i64) -> LedgerResult<bool> {
        let ccf = u64::try_from(next_ccf).ok().filter(|n| *n >= 1);
        let cf = u64::try_from(next_cf).ok().filter(|n| *n >= 1);
        self.override_sales_series(ccf, cf, &next_ccf.to_string(), &next_cf.to_string())
            .await
    }

    /// Text form of [`Bookkeeper::set_sales_correlatives`]
    pub async fn set_sales_correlatives_text(&mut self, next_ccf: &str, next_cf: &str) -> LedgerResult<bool> {
        let ccf = parse_correlative(next_ccf);
        let cf = parse_correlative(next_cf);
        self.override_sales_series(ccf, cf, next_ccf, next_cf).await
    }

    async fn override_sales_series(
        &mut self,
        ccf: Option<u64>,
        cf: Option<u64>,
        raw_ccf: &str,
        raw_cf: &str,
    ) -> LedgerResult<bool> {
        if ccf.is_none() && cf.is_none() {
            return Err(LedgerError::Validation(format!(
                "Correlatives must be integers of at least 1 (got CCF '{}', CF '{}')",
                raw_ccf, raw_cf
            )));
        }
        if ccf.is_none() {
            warn!(raw_ccf, "Ignoring invalid CCF correlative");
        }
        if cf.is_none() {
            warn!(raw_cf, "Ignoring invalid CF correlative");
        }

        let before = self.state.next_correlatives;
        if let Some(ccf) = ccf {
            self.state.next_correlatives.sales_ccf = ccf;
        }
        if let Some(cf) = cf {
            self.state.next_correlatives.sales_cf = cf;
        }

        let changed = self.state.next_correlatives != before;
        if changed {
            self.persist().await?;
            info!(
                sales_ccf = self.state.next_correlatives.sales_ccf,
                sales_cf = self.state.next_correlatives.sales_cf,
                "Sales correlatives overridden"
            );
        }
        Ok(changed)
    }
}
