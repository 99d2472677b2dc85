//! Tax arithmetic

pub mod iva;

pub use iva::{round2, to_number, vat, vat_rate, IvaCalculation, VAT_RATE_PERCENT};
