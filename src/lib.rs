//! # IVA Ledger
//!
//! Sales and purchase bookkeeping for El Salvador's 13% IVA regime.
//!
//! ## Features
//!
//! - **Clients and suppliers**: keyed collections with NIT/NRC/phone rules
//! - **IVA derivation**: CCF documents add IVA on top of the taxable base,
//!   CF receipts extract it from the gross total
//! - **Correlatives**: independent CCF, CF and purchase numbering
//! - **Bulk import**: quote-aware comma-separated templates with section markers
//! - **Backups**: text and JSON round trips of the whole ledger
//! - **Monthly books**: sales book, purchase book and IVA summary
//! - **Storage abstraction**: snapshot persistence behind a trait
//!
//! ## Quick Start
//!
//! ```rust
//! use iva_ledger::{Bookkeeper, MemoryStorage, SaleInput};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! # async fn demo() -> iva_ledger::LedgerResult<()> {
//! let mut book = Bookkeeper::open(MemoryStorage::new()).await?;
//! let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//!
//! let sale = book
//!     .add_sale(SaleInput::final_consumer(date, BigDecimal::from(113)))
//!     .await?;
//! assert_eq!(sale.taxable_amount, BigDecimal::from(100));
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod codec;
pub mod config;
pub mod ledger;
pub mod logging;
pub mod tax;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use backup::{bulk_template, parse_backup, parse_date};
pub use config::{BookConfig, LoggingConfig, StorageConfig};
pub use ledger::*;
pub use logging::init_logging;
pub use tax::iva::*;
pub use traits::*;
pub use types::*;
pub use utils::{JsonFileStorage, MemoryStorage};
