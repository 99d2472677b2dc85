//! Core types and data structures for the IVA ledger

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::tax::iva::serde_amount;
use crate::utils::dates::serde_date;

/// Label used when a weak NRC reference does not resolve to a known party
pub const UNKNOWN_PARTY: &str = "Desconocido";

/// Entity collections kept by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    /// Customers, referenced by sales through their NRC
    Clients,
    /// Vendors, referenced by purchases through their NRC
    Suppliers,
}

impl EntityKind {
    /// Collection name as used in snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Clients => "clients",
            EntityKind::Suppliers => "suppliers",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every dataset that travels through bulk templates and backups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DatasetKind {
    Clients,
    Suppliers,
    SalesRecords,
    PurchaseRecords,
}

impl DatasetKind {
    /// All datasets in import/export order
    pub const ALL: [DatasetKind; 4] = [
        DatasetKind::Clients,
        DatasetKind::Suppliers,
        DatasetKind::SalesRecords,
        DatasetKind::PurchaseRecords,
    ];

    /// Collection name as used in snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Clients => "clients",
            DatasetKind::Suppliers => "suppliers",
            DatasetKind::SalesRecords => "salesRecords",
            DatasetKind::PurchaseRecords => "purchaseRecords",
        }
    }

    /// Key written inside section markers (`#== TEMPLATE_START: CLIENTS ==#`)
    pub fn section_key(&self) -> &'static str {
        match self {
            DatasetKind::Clients => "CLIENTS",
            DatasetKind::Suppliers => "SUPPLIERS",
            DatasetKind::SalesRecords => "SALESRECORDS",
            DatasetKind::PurchaseRecords => "PURCHASERECORDS",
        }
    }

    /// Resolve a section marker key, ignoring case and underscores
    pub fn from_section_key(key: &str) -> Option<Self> {
        let normalized: String = key
            .trim()
            .chars()
            .filter(|c| *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.section_key() == normalized)
    }

    /// The entity collection behind this dataset, if it is one
    pub fn entity_kind(&self) -> Option<EntityKind> {
        match self {
            DatasetKind::Clients => Some(EntityKind::Clients),
            DatasetKind::Suppliers => Some(EntityKind::Suppliers),
            DatasetKind::SalesRecords | DatasetKind::PurchaseRecords => None,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client or supplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Unique identifier, assigned once at creation
    #[serde(default)]
    pub id: String,
    /// Name or business name (razón social)
    #[serde(default)]
    pub name: String,
    /// Taxpayer registration number; `None` when not registered
    #[serde(default)]
    pub nrc: Option<String>,
    /// Tax identification number (mandatory)
    #[serde(default)]
    pub nit: String,
    /// Postal address
    #[serde(default)]
    pub address: String,
    /// Economic activity (giro)
    #[serde(default)]
    pub activity: String,
    /// Contact person
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    /// Digits-only phone number, 7 to 10 digits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Sales document types. The document type alone selects the derivation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// Comprobante de Crédito Fiscal: taxable base is authoritative
    #[serde(rename = "CCF")]
    CreditFiscal,
    /// Factura de Consumidor Final: gross total is authoritative
    #[serde(rename = "CF")]
    FinalConsumer,
}

impl DocumentType {
    pub fn code(&self) -> &'static str {
        match self {
            DocumentType::CreditFiscal => "CCF",
            DocumentType::FinalConsumer => "CF",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DocumentType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CCF" => Ok(DocumentType::CreditFiscal),
            "CF" => Ok(DocumentType::FinalConsumer),
            other => Err(LedgerError::Validation(format!(
                "Invalid sales document type '{}', expected CCF or CF",
                other
            ))),
        }
    }
}

/// Line of a sales document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Quantity, a positive integer
    pub qty: u32,
    /// Item description
    #[serde(default)]
    pub desc: String,
    /// Unit price before VAT
    #[serde(with = "serde_amount")]
    pub price: BigDecimal,
}

impl LineItem {
    pub fn new(qty: u32, desc: impl Into<String>, price: BigDecimal) -> Self {
        Self {
            qty,
            desc: desc.into(),
            price,
        }
    }

    /// Quantity times unit price
    pub fn line_total(&self) -> BigDecimal {
        BigDecimal::from(self.qty) * &self.price
    }
}

/// Recorded sales document with its derived amounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesRecord {
    #[serde(default)]
    pub id: String,
    /// Number taken from the series of `document_type`
    pub correlative: u64,
    pub document_type: DocumentType,
    #[serde(with = "serde_date", default = "crate::utils::dates::undated")]
    pub date: NaiveDate,
    /// Client NRC; always `None` for CF
    #[serde(default)]
    pub client_nrc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(with = "serde_amount", default = "crate::tax::iva::zero")]
    pub taxable_amount: BigDecimal,
    #[serde(with = "serde_amount", default = "crate::tax::iva::zero")]
    pub exempt_amount: BigDecimal,
    #[serde(with = "serde_amount", default = "crate::tax::iva::zero")]
    pub iva_debit: BigDecimal,
    #[serde(with = "serde_amount", default = "crate::tax::iva::zero")]
    pub total: BigDecimal,
}

/// Recorded purchase document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    #[serde(default)]
    pub id: String,
    /// Number taken from the purchases series
    pub correlative: u64,
    /// Free-form document type (CCF, Importacion, Otros, ...)
    #[serde(default)]
    pub document_type: String,
    #[serde(with = "serde_date", default = "crate::utils::dates::undated")]
    pub date: NaiveDate,
    #[serde(default)]
    pub supplier_nrc: String,
    #[serde(default)]
    pub document_number: String,
    #[serde(with = "serde_amount", default = "crate::tax::iva::zero")]
    pub taxable_amount: BigDecimal,
    #[serde(with = "serde_amount", default = "crate::tax::iva::zero")]
    pub exempt_amount: BigDecimal,
    #[serde(with = "serde_amount", default = "crate::tax::iva::zero")]
    pub iva_credit: BigDecimal,
    #[serde(with = "serde_amount", default = "crate::tax::iva::zero")]
    pub iva_withheld: BigDecimal,
    #[serde(with = "serde_amount", default = "crate::tax::iva::zero")]
    pub total: BigDecimal,
}

/// Next number to assign for each correlative series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelativeState {
    #[serde(rename = "salesCF")]
    pub sales_cf: u64,
    #[serde(rename = "salesCCF")]
    pub sales_ccf: u64,
    pub purchases: u64,
}

impl Default for CorrelativeState {
    fn default() -> Self {
        Self {
            sales_cf: 1,
            sales_ccf: 1,
            purchases: 1,
        }
    }
}

/// Correlative series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Series {
    SalesCreditFiscal,
    SalesFinalConsumer,
    Purchases,
}

impl From<DocumentType> for Series {
    fn from(document_type: DocumentType) -> Self {
        match document_type {
            DocumentType::CreditFiscal => Series::SalesCreditFiscal,
            DocumentType::FinalConsumer => Series::SalesFinalConsumer,
        }
    }
}

/// Descriptive data of the reporting company
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    pub name: String,
    pub nit: String,
    pub nrc: String,
    pub dui: String,
    pub activity: String,
    pub address: String,
    pub phone: String,
}

/// Entire persisted state of the ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub clients: Vec<Entity>,
    pub suppliers: Vec<Entity>,
    pub sales_records: Vec<SalesRecord>,
    pub purchase_records: Vec<PurchaseRecord>,
    pub next_correlatives: CorrelativeState,
    pub company_info: CompanyInfo,
}

impl Snapshot {
    /// Entity collection by kind
    pub fn entities(&self, kind: EntityKind) -> &Vec<Entity> {
        match kind {
            EntityKind::Clients => &self.clients,
            EntityKind::Suppliers => &self.suppliers,
        }
    }

    pub fn entities_mut(&mut self, kind: EntityKind) -> &mut Vec<Entity> {
        match kind {
            EntityKind::Clients => &mut self.clients,
            EntityKind::Suppliers => &mut self.suppliers,
        }
    }

    /// Give every record or entity without an id a fresh one.
    /// Returns how many ids were assigned.
    pub fn assign_missing_ids(&mut self) -> usize {
        let mut assigned = 0;
        let mut fill = |id: &mut String| {
            if id.trim().is_empty() {
                *id = new_id();
                assigned += 1;
            }
        };
        self.clients.iter_mut().for_each(|e| fill(&mut e.id));
        self.suppliers.iter_mut().for_each(|e| fill(&mut e.id));
        self.sales_records.iter_mut().for_each(|r| fill(&mut r.id));
        self.purchase_records.iter_mut().for_each(|r| fill(&mut r.id));
        assigned
    }
}

/// Fresh collision-free identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Records successfully inserted per dataset by a bulk import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCounts {
    pub clients: usize,
    pub suppliers: usize,
    pub sales_records: usize,
    pub purchase_records: usize,
    /// Records rejected by the engine and skipped
    pub failed: usize,
}

impl ImportCounts {
    /// Imported count for one dataset
    pub fn get(&self, kind: DatasetKind) -> usize {
        match kind {
            DatasetKind::Clients => self.clients,
            DatasetKind::Suppliers => self.suppliers,
            DatasetKind::SalesRecords => self.sales_records,
            DatasetKind::PurchaseRecords => self.purchase_records,
        }
    }

    pub(crate) fn bump(&mut self, kind: DatasetKind) {
        match kind {
            DatasetKind::Clients => self.clients += 1,
            DatasetKind::Suppliers => self.suppliers += 1,
            DatasetKind::SalesRecords => self.sales_records += 1,
            DatasetKind::PurchaseRecords => self.purchase_records += 1,
        }
    }

    /// Total records imported across datasets
    pub fn total(&self) -> usize {
        self.clients + self.suppliers + self.sales_records + self.purchase_records
    }
}

/// Errors that can occur in the ledger system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Malformed import data: {0}")]
    MalformedImport(String),
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
