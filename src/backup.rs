//! Bulk import and full backups
//!
//! Three payloads travel in and out of the ledger:
//!
//! - bulk-load templates (`TEMPLATE_START` sections) whose rows are fed
//!   through the regular add operations, so every imported record is derived
//!   and numbered like a hand-entered one;
//! - text backups (`BACKUP_START` sections) carrying every stored field;
//! - JSON snapshots, restored verbatim.

use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::codec::tabular::{decode_table, marker, split_sections, Row, UTF8_BOM};
use crate::codec::template::{
    backup_layout, blank_template, decode_section, encode_section, BACKUP_PREFIX,
    COMPANY_INFO_KEY, KEY_VALUE_LAYOUT, NEXT_CORRELATIVES_KEY, TEMPLATE_PREFIX,
};
use crate::ledger::entity::EntityDraft;
use crate::ledger::purchase::PurchaseInput;
use crate::ledger::sales::SaleInput;
use crate::ledger::sequencer::parse_correlative;
use crate::ledger::Bookkeeper;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::normalize_optional;

pub use crate::utils::dates::parse_date;

/// Blank bulk-load template with one section per dataset
pub fn bulk_template() -> String {
    blank_template()
}

fn required_date(row: &Row) -> LedgerResult<NaiveDate> {
    let raw = row.text("date");
    parse_date(&raw).ok_or_else(|| LedgerError::Validation(format!("Invalid date '{}'", raw)))
}

/// Copy of `snapshot` with sales by correlative and purchases by date
fn ordered(snapshot: &Snapshot) -> Snapshot {
    let mut ordered = snapshot.clone();
    ordered.sales_records.sort_by_key(|r| r.correlative);
    ordered.purchase_records.sort_by_key(|r| r.date);
    ordered
}

fn entity_row(entity: &Entity) -> Row {
    Row::new()
        .with("id", entity.id.as_str())
        .with("name", entity.name.as_str())
        .with("nrc", entity.nrc.clone().unwrap_or_default())
        .with("nit", entity.nit.as_str())
        .with("address", entity.address.as_str())
        .with("activity", entity.activity.as_str())
        .with("contact", entity.contact.clone().unwrap_or_default())
        .with("phone", entity.phone.clone().unwrap_or_default())
}

fn sale_row(record: &SalesRecord) -> LedgerResult<Row> {
    let items = serde_json::to_string(&record.items)
        .map_err(|e| LedgerError::Serialization(format!("Failed to encode items: {}", e)))?;

    Ok(Row::new()
        .with("id", record.id.as_str())
        .with("correlative", record.correlative.to_string())
        .with("documentType", record.document_type.code())
        .with("date", record.date.format("%Y-%m-%d").to_string())
        .with("clientNrc", record.client_nrc.clone().unwrap_or_default())
        .with("description", record.description.clone().unwrap_or_default())
        .with("items", items)
        .with("taxableAmount", record.taxable_amount.clone())
        .with("exemptAmount", record.exempt_amount.clone())
        .with("ivaDebit", record.iva_debit.clone())
        .with("total", record.total.clone()))
}

fn purchase_row(record: &PurchaseRecord) -> Row {
    Row::new()
        .with("id", record.id.as_str())
        .with("correlative", record.correlative.to_string())
        .with("documentType", record.document_type.as_str())
        .with("date", record.date.format("%Y-%m-%d").to_string())
        .with("supplierNrc", record.supplier_nrc.as_str())
        .with("documentNumber", record.document_number.as_str())
        .with("taxableAmount", record.taxable_amount.clone())
        .with("exemptAmount", record.exempt_amount.clone())
        .with("ivaCredit", record.iva_credit.clone())
        .with("ivaWithheld", record.iva_withheld.clone())
        .with("total", record.total.clone())
}

fn backed_up_correlative(row: &Row) -> LedgerResult<u64> {
    let raw = row.text("correlative");
    parse_correlative(&raw)
        .ok_or_else(|| LedgerError::MalformedImport(format!("Invalid correlative '{}'", raw)))
}

fn entity_from_backup(row: &Row) -> Entity {
    Entity {
        id: row.text("id"),
        name: row.text("name"),
        nrc: normalize_optional(Some(&row.text("nrc"))),
        nit: row.text("nit"),
        address: row.text("address"),
        activity: row.text("activity"),
        contact: normalize_optional(Some(&row.text("contact"))),
        phone: normalize_optional(Some(&row.text("phone"))),
    }
}

fn sale_from_backup(row: &Row) -> LedgerResult<SalesRecord> {
    let raw_items = row.text("items");
    let items = if raw_items.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&raw_items)
            .map_err(|e| LedgerError::MalformedImport(format!("Invalid items column: {}", e)))?
    };

    Ok(SalesRecord {
        id: row.text("id"),
        correlative: backed_up_correlative(row)?,
        document_type: row.text("documentType").parse()?,
        date: required_date(row)?,
        client_nrc: normalize_optional(Some(&row.text("clientNrc"))),
        description: normalize_optional(Some(&row.text("description"))),
        items,
        taxable_amount: row.number("taxableAmount"),
        exempt_amount: row.number("exemptAmount"),
        iva_debit: row.number("ivaDebit"),
        total: row.number("total"),
    })
}

fn purchase_from_backup(row: &Row) -> LedgerResult<PurchaseRecord> {
    Ok(PurchaseRecord {
        id: row.text("id"),
        correlative: backed_up_correlative(row)?,
        document_type: row.text("documentType"),
        date: required_date(row)?,
        supplier_nrc: row.text("supplierNrc"),
        document_number: row.text("documentNumber"),
        taxable_amount: row.number("taxableAmount"),
        exempt_amount: row.number("exemptAmount"),
        iva_credit: row.number("ivaCredit"),
        iva_withheld: row.number("ivaWithheld"),
        total: row.number("total"),
    })
}

fn company_info_rows(info: &CompanyInfo) -> Vec<Row> {
    [
        ("name", &info.name),
        ("nit", &info.nit),
        ("nrc", &info.nrc),
        ("dui", &info.dui),
        ("activity", &info.activity),
        ("address", &info.address),
        ("phone", &info.phone),
    ]
    .into_iter()
    .map(|(key, value)| Row::new().with("key", key).with("value", value.as_str()))
    .collect()
}

fn apply_company_info(info: &mut CompanyInfo, rows: &[Row]) {
    for row in rows {
        let value = row.text("value");
        match row.text("key").as_str() {
            "name" => info.name = value,
            "nit" => info.nit = value,
            "nrc" => info.nrc = value,
            "dui" => info.dui = value,
            "activity" => info.activity = value,
            "address" => info.address = value,
            "phone" => info.phone = value,
            other => warn!(key = other, "Ignoring unknown company info field"),
        }
    }
}

fn correlative_rows(state: &CorrelativeState) -> Vec<Row> {
    [
        ("salesCF", state.sales_cf),
        ("salesCCF", state.sales_ccf),
        ("purchases", state.purchases),
    ]
    .into_iter()
    .map(|(key, value)| Row::new().with("key", key).with("value", value.to_string()))
    .collect()
}

fn apply_correlatives(state: &mut CorrelativeState, rows: &[Row]) {
    for row in rows {
        let key = row.text("key");
        let Some(value) = parse_correlative(&row.text("value")) else {
            warn!(key = %key, "Ignoring invalid correlative in backup");
            continue;
        };
        match key.as_str() {
            "salesCF" => state.sales_cf = value,
            "salesCCF" => state.sales_ccf = value,
            "purchases" => state.purchases = value,
            other => warn!(key = other, "Ignoring unknown correlative series"),
        }
    }
}

/// Decode a text backup produced by [`Bookkeeper::export_backup`].
///
/// Rows that cannot be converted are skipped with a warning. Sections that
/// are missing leave their part of the snapshot at its default.
pub fn parse_backup(text: &str) -> LedgerResult<Snapshot> {
    let sections = split_sections(text, BACKUP_PREFIX);
    if sections.is_empty() {
        return Err(LedgerError::MalformedImport(format!(
            "No {} sections found",
            BACKUP_PREFIX
        )));
    }

    let mut snapshot = Snapshot::default();
    for (key, body) in sections {
        if key == COMPANY_INFO_KEY {
            let rows = decode_table(body, &KEY_VALUE_LAYOUT, &key);
            apply_company_info(&mut snapshot.company_info, &rows);
            continue;
        }
        if key == NEXT_CORRELATIVES_KEY {
            let rows = decode_table(body, &KEY_VALUE_LAYOUT, &key);
            apply_correlatives(&mut snapshot.next_correlatives, &rows);
            continue;
        }

        let Some(kind) = DatasetKind::from_section_key(&key) else {
            warn!(section = %key, "Ignoring unknown backup section");
            continue;
        };

        let rows = decode_table(body, backup_layout(kind), kind.as_str());
        for (index, row) in rows.iter().enumerate() {
            let skipped = match kind {
                DatasetKind::Clients => {
                    snapshot.clients.push(entity_from_backup(row));
                    None
                }
                DatasetKind::Suppliers => {
                    snapshot.suppliers.push(entity_from_backup(row));
                    None
                }
                DatasetKind::SalesRecords => match sale_from_backup(row) {
                    Ok(record) => {
                        snapshot.sales_records.push(record);
                        None
                    }
                    Err(e) => Some(e),
                },
                DatasetKind::PurchaseRecords => match purchase_from_backup(row) {
                    Ok(record) => {
                        snapshot.purchase_records.push(record);
                        None
                    }
                    Err(e) => Some(e),
                },
            };
            if let Some(e) = skipped {
                warn!(section = %kind, record = index + 1, error = %e, "Skipping backup record");
            }
        }
    }

    snapshot.assign_missing_ids();
    Ok(snapshot)
}

fn entity_draft(row: &Row) -> EntityDraft {
    EntityDraft {
        name: row.text("name"),
        nrc: Some(row.text("nrc")),
        nit: row.text("nit"),
        address: row.text("address"),
        activity: row.text("activity"),
        contact: None,
        phone: None,
    }
}

fn sale_input(row: &Row) -> LedgerResult<SaleInput> {
    let date = required_date(row)?;
    let input = match row.text("documentType").parse::<DocumentType>()? {
        DocumentType::CreditFiscal => SaleInput::credit_fiscal(
            date,
            row.text("clientNrc"),
            row.number("taxableAmount"),
            row.number("exemptAmount"),
        ),
        DocumentType::FinalConsumer => SaleInput::final_consumer(date, row.number("total")),
    };
    Ok(input)
}

fn purchase_input(row: &Row) -> LedgerResult<PurchaseInput> {
    Ok(PurchaseInput::new(
        required_date(row)?,
        row.text("documentType"),
        row.text("supplierNrc"),
        row.text("documentNumber"),
    )
    .amounts(
        row.number("taxableAmount"),
        row.number("exemptAmount"),
        row.number("ivaCredit"),
        row.number("ivaWithheld"),
    ))
}

impl<S: SnapshotStore> Bookkeeper<S> {
    /// Text backup of the whole ledger under `BACKUP_START` markers
    pub fn export_backup(&self) -> LedgerResult<String> {
        let snapshot = ordered(&self.state);
        let mut out = String::new();
        out.push(UTF8_BOM);

        for kind in DatasetKind::ALL {
            let rows: Vec<Row> = match kind {
                DatasetKind::Clients => snapshot.clients.iter().map(entity_row).collect(),
                DatasetKind::Suppliers => snapshot.suppliers.iter().map(entity_row).collect(),
                DatasetKind::SalesRecords => snapshot
                    .sales_records
                    .iter()
                    .map(sale_row)
                    .collect::<LedgerResult<Vec<_>>>()?,
                DatasetKind::PurchaseRecords => {
                    snapshot.purchase_records.iter().map(purchase_row).collect()
                }
            };
            push_section(&mut out, kind.section_key(), &encode_section(&rows, backup_layout(kind)));
        }

        push_section(
            &mut out,
            COMPANY_INFO_KEY,
            &encode_section(&company_info_rows(&snapshot.company_info), &KEY_VALUE_LAYOUT),
        );
        push_section(
            &mut out,
            NEXT_CORRELATIVES_KEY,
            &encode_section(&correlative_rows(&snapshot.next_correlatives), &KEY_VALUE_LAYOUT),
        );

        Ok(out)
    }

    /// Pretty JSON snapshot, ordered like the text backup
    pub fn export_json(&self) -> LedgerResult<String> {
        serde_json::to_string_pretty(&ordered(&self.state))
            .map_err(|e| LedgerError::Serialization(format!("Failed to encode snapshot: {}", e)))
    }

    /// Replace the ledger with the content of a text backup
    pub async fn restore_backup_text(&mut self, text: &str) -> LedgerResult<()> {
        let snapshot = parse_backup(text)?;
        info!(
            clients = snapshot.clients.len(),
            suppliers = snapshot.suppliers.len(),
            sales = snapshot.sales_records.len(),
            purchases = snapshot.purchase_records.len(),
            "Restoring text backup"
        );
        self.replace_state(snapshot).await
    }

    /// Feed decoded template rows through the add operations.
    ///
    /// A record that fails validation is logged and skipped; earlier
    /// insertions stay committed. Storage failures abort the import.
    pub async fn import_bulk(
        &mut self,
        sections: BTreeMap<DatasetKind, Vec<Row>>,
    ) -> LedgerResult<ImportCounts> {
        let mut counts = ImportCounts::default();

        for kind in DatasetKind::ALL {
            let Some(rows) = sections.get(&kind) else {
                continue;
            };

            for (index, row) in rows.iter().enumerate() {
                match self.import_row(kind, row).await {
                    Ok(()) => counts.bump(kind),
                    Err(e @ LedgerError::Storage(_)) => return Err(e),
                    Err(e) => {
                        warn!(dataset = %kind, record = index + 1, error = %e, "Skipping import record");
                        counts.failed += 1;
                    }
                }
            }
        }

        info!(
            clients = counts.clients,
            suppliers = counts.suppliers,
            sales = counts.sales_records,
            purchases = counts.purchase_records,
            failed = counts.failed,
            "Bulk import finished"
        );
        Ok(counts)
    }

    async fn import_row(&mut self, kind: DatasetKind, row: &Row) -> LedgerResult<()> {
        match kind {
            DatasetKind::Clients => {
                self.add_entity(EntityKind::Clients, entity_draft(row)).await?;
            }
            DatasetKind::Suppliers => {
                self.add_entity(EntityKind::Suppliers, entity_draft(row)).await?;
            }
            DatasetKind::SalesRecords => {
                self.add_sale(sale_input(row)?).await?;
            }
            DatasetKind::PurchaseRecords => {
                self.add_purchase(purchase_input(row)?).await?;
            }
        }
        Ok(())
    }

    /// Decode a filled-in bulk template and import it
    pub async fn import_bulk_text(&mut self, text: &str) -> LedgerResult<ImportCounts> {
        let found = split_sections(text, TEMPLATE_PREFIX);
        if found.is_empty() {
            return Err(LedgerError::MalformedImport(format!(
                "No {} sections found",
                TEMPLATE_PREFIX
            )));
        }

        let mut sections: BTreeMap<DatasetKind, Vec<Row>> = BTreeMap::new();
        for (key, body) in found {
            match DatasetKind::from_section_key(&key) {
                Some(kind) => sections
                    .entry(kind)
                    .or_default()
                    .extend(decode_section(body, kind)),
                None => warn!(section = %key, "Ignoring unknown template section"),
            }
        }

        self.import_bulk(sections).await
    }

    /// Replace the whole ledger with a JSON snapshot.
    ///
    /// `salesRecords`, `purchaseRecords` and `nextCorrelatives` must be
    /// present; everything else falls back to defaults. Values are trusted
    /// as they are, no derivation runs.
    pub async fn import_full_backup(&mut self, value: Value) -> LedgerResult<bool> {
        let Some(object) = value.as_object() else {
            return Err(LedgerError::InvalidSnapshot(
                "Backup must be a JSON object".to_string(),
            ));
        };

        for key in ["salesRecords", "purchaseRecords"] {
            if !object.get(key).is_some_and(Value::is_array) {
                return Err(LedgerError::InvalidSnapshot(format!(
                    "Missing '{}' array",
                    key
                )));
            }
        }
        if !object.get("nextCorrelatives").is_some_and(Value::is_object) {
            return Err(LedgerError::InvalidSnapshot(
                "Missing 'nextCorrelatives' object".to_string(),
            ));
        }

        let mut snapshot: Snapshot = serde_json::from_value(value)
            .map_err(|e| LedgerError::InvalidSnapshot(e.to_string()))?;
        let repaired = snapshot.assign_missing_ids();

        info!(
            sales = snapshot.sales_records.len(),
            purchases = snapshot.purchase_records.len(),
            repaired,
            "Restoring full backup"
        );
        self.replace_state(snapshot).await?;
        Ok(true)
    }

    /// [`Bookkeeper::import_full_backup`] from JSON text
    pub async fn import_full_backup_str(&mut self, text: &str) -> LedgerResult<bool> {
        let value: Value = serde_json::from_str(text.trim_start_matches(UTF8_BOM))
            .map_err(|e| LedgerError::InvalidSnapshot(format!("Not valid JSON: {}", e)))?;
        self.import_full_backup(value).await
    }
}

fn push_section(out: &mut String, key: &str, body: &str) {
    out.push_str(&marker(BACKUP_PREFIX, key));
    out.push('\n');
    out.push_str(body);
    out.push_str("\n\n");
}
