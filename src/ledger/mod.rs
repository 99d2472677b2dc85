//! Ledger module containing the entity store, sales and purchase books,
//! correlative numbering and monthly reports

pub mod core;
pub mod entity;
pub mod purchase;
pub mod reports;
pub mod sales;
pub mod sequencer;

pub use core::*;
pub use entity::*;
pub use purchase::*;
pub use reports::*;
pub use sales::*;
pub use sequencer::*;
