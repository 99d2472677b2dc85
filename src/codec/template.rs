//! Section layouts for bulk-load templates and text backups

use super::tabular::{decode_table, encode_table, marker, Row, SectionLayout, UTF8_BOM};
use crate::types::DatasetKind;

/// Marker prefix of bulk-load template sections
pub const TEMPLATE_PREFIX: &str = "TEMPLATE_START";

/// Marker prefix of text backup sections
pub const BACKUP_PREFIX: &str = "BACKUP_START";

/// Backup section holding company data as key/value rows
pub const COMPANY_INFO_KEY: &str = "COMPANY_INFO";

/// Backup section holding the correlative series as key/value rows
pub const NEXT_CORRELATIVES_KEY: &str = "NEXT_CORRELATIVES";

const ENTITY_TEMPLATE: SectionLayout = SectionLayout {
    keys: &["name", "nrc", "nit", "address", "activity"],
    descriptions: &[
        "Nombre/Razon Social",
        "NRC",
        "NIT",
        "Direccion",
        "Giro/Actividad Economica",
    ],
};

const SALES_TEMPLATE: SectionLayout = SectionLayout {
    keys: &[
        "date",
        "documentType",
        "clientNrc",
        "taxableAmount",
        "exemptAmount",
        "total",
    ],
    descriptions: &[
        "Fecha (YYYY-MM-DD)",
        "Tipo Doc (CCF/CF)",
        "NRC Cliente (Obligatorio si CCF)",
        "Venta Gravada (Obligatorio si CCF, 0 si CF)",
        "Venta Exenta (0 si CF)",
        "Total Bruto (Obligatorio si CF, 0 si CCF)",
    ],
};

const PURCHASES_TEMPLATE: SectionLayout = SectionLayout {
    keys: &[
        "date",
        "documentType",
        "supplierNrc",
        "documentNumber",
        "taxableAmount",
        "exemptAmount",
        "ivaCredit",
        "ivaWithheld",
    ],
    descriptions: &[
        "Fecha (YYYY-MM-DD)",
        "Tipo Doc (CCF/Importacion/Otros)",
        "NRC Proveedor",
        "Numero Documento",
        "Gravado",
        "Exento",
        "IVA Credito (13% Gravado)",
        "Retencion IVA",
    ],
};

const ENTITY_BACKUP: SectionLayout = SectionLayout {
    keys: &[
        "id", "name", "nrc", "nit", "address", "activity", "contact", "phone",
    ],
    descriptions: &[
        "ID",
        "Nombre/Razon Social",
        "NRC",
        "NIT",
        "Direccion",
        "Giro/Actividad Economica",
        "Contacto",
        "Telefono",
    ],
};

const SALES_BACKUP: SectionLayout = SectionLayout {
    keys: &[
        "id",
        "correlative",
        "documentType",
        "date",
        "clientNrc",
        "description",
        "items",
        "taxableAmount",
        "exemptAmount",
        "ivaDebit",
        "total",
    ],
    descriptions: &[
        "ID",
        "Correlativo",
        "Tipo Doc",
        "Fecha",
        "NRC Cliente",
        "Descripcion",
        "Items (JSON)",
        "Venta Gravada",
        "Venta Exenta",
        "IVA Debito",
        "Total",
    ],
};

const PURCHASES_BACKUP: SectionLayout = SectionLayout {
    keys: &[
        "id",
        "correlative",
        "documentType",
        "date",
        "supplierNrc",
        "documentNumber",
        "taxableAmount",
        "exemptAmount",
        "ivaCredit",
        "ivaWithheld",
        "total",
    ],
    descriptions: &[
        "ID",
        "Correlativo",
        "Tipo Doc",
        "Fecha",
        "NRC Proveedor",
        "Numero Documento",
        "Gravado",
        "Exento",
        "IVA Credito",
        "Retencion IVA",
        "Total",
    ],
};

/// Layout of the key/value auxiliary backup sections
pub const KEY_VALUE_LAYOUT: SectionLayout = SectionLayout {
    keys: &["key", "value"],
    descriptions: &["Campo", "Valor"],
};

/// Columns of a bulk-load template section
pub fn template_layout(kind: DatasetKind) -> &'static SectionLayout {
    match kind {
        DatasetKind::Clients | DatasetKind::Suppliers => &ENTITY_TEMPLATE,
        DatasetKind::SalesRecords => &SALES_TEMPLATE,
        DatasetKind::PurchaseRecords => &PURCHASES_TEMPLATE,
    }
}

/// Columns of a backup section, carrying every stored field
pub fn backup_layout(kind: DatasetKind) -> &'static SectionLayout {
    match kind {
        DatasetKind::Clients | DatasetKind::Suppliers => &ENTITY_BACKUP,
        DatasetKind::SalesRecords => &SALES_BACKUP,
        DatasetKind::PurchaseRecords => &PURCHASES_BACKUP,
    }
}

/// Decode one bulk-load template section for `kind`
pub fn decode_section(text: &str, kind: DatasetKind) -> Vec<Row> {
    decode_table(text, template_layout(kind), kind.as_str())
}

/// Encode rows as one section body
pub fn encode_section(rows: &[Row], layout: &SectionLayout) -> String {
    encode_table(rows, layout)
}

/// Empty bulk-load template with one section per dataset
pub fn blank_template() -> String {
    let mut out = String::new();
    out.push(UTF8_BOM);

    for kind in DatasetKind::ALL {
        out.push_str(&marker(TEMPLATE_PREFIX, kind.section_key()));
        out.push('\n');
        out.push_str(&encode_section(&[], template_layout(kind)));
        out.push_str("\n\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tabular::{split_sections, FieldValue};
    use bigdecimal::BigDecimal;

    #[test]
    fn test_layouts_have_matching_descriptions() {
        for kind in DatasetKind::ALL {
            for layout in [template_layout(kind), backup_layout(kind)] {
                assert_eq!(layout.keys.len(), layout.descriptions.len(), "{kind}");
            }
        }
    }

    #[test]
    fn test_decode_sales_section_coerces_amounts() {
        let text = "date,documentType,clientNrc,taxableAmount,exemptAmount,total\n\
                    Fecha,Tipo,NRC,Gravada,Exenta,Total\n\
                    2024-03-01,CCF,1234-5,\"$1,000.00\",0,0\n";
        let rows = decode_section(text, DatasetKind::SalesRecords);

        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get("taxableAmount"),
            Some(&FieldValue::Number(BigDecimal::from(1000)))
        );
        assert_eq!(rows[0].text("clientNrc"), "1234-5");
    }

    #[test]
    fn test_blank_template_lists_every_dataset() {
        let template = blank_template();
        let sections = split_sections(&template, TEMPLATE_PREFIX);

        let keys: Vec<&str> = sections.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["CLIENTS", "SUPPLIERS", "SALESRECORDS", "PURCHASERECORDS"]
        );
        for (key, body) in sections {
            let kind = DatasetKind::from_section_key(&key).unwrap();
            assert!(decode_section(body, kind).is_empty());
            assert!(body.contains(&template_layout(kind).keys.join(",")));
        }
    }
}
