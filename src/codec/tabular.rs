//! Quote-aware comma-separated tables with section markers
//!
//! A file is a sequence of sections. Each section starts with a marker line
//! `#== <PREFIX>: <KEY> ==#` followed by a table whose first line holds the
//! machine field names, whose second line holds human descriptions, and
//! whose remaining lines are records.

use bigdecimal::BigDecimal;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use crate::tax::iva::to_number;

/// Byte order mark prepended to exported files so spreadsheets detect UTF-8
pub const UTF8_BOM: char = '\u{feff}';

static SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#==\s*([A-Z_]+)\s*:\s*([A-Za-z_]+)\s*==#").expect("section marker pattern")
});

/// Field names and their human descriptions for one kind of table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionLayout {
    pub keys: &'static [&'static str],
    pub descriptions: &'static [&'static str],
}

/// Single decoded cell
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(BigDecimal),
}

impl FieldValue {
    /// Text form as it would be written to a file
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Number(number) => number.to_string(),
        }
    }

    /// Numeric form; text is coerced tolerantly
    pub fn to_number(&self) -> BigDecimal {
        match self {
            FieldValue::Text(text) => to_number(text),
            FieldValue::Number(number) => number.clone(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

impl From<BigDecimal> for FieldValue {
    fn from(number: BigDecimal) -> Self {
        FieldValue::Number(number)
    }
}

/// One decoded record, keyed by field name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: BTreeMap<String, FieldValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Text of a field, empty when absent
    pub fn text(&self, key: &str) -> String {
        self.get(key).map(FieldValue::as_text).unwrap_or_default()
    }

    /// Numeric value of a field, zero when absent
    pub fn number(&self, key: &str) -> BigDecimal {
        self.get(key)
            .map(FieldValue::to_number)
            .unwrap_or_else(crate::tax::iva::zero)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Whether values under this key are monetary or quantities
pub fn is_numeric_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.contains("amount") || key.contains("iva") || key.contains("total")
}

/// Split one line on commas that are not inside a quoted field.
///
/// Quoted fields keep their content verbatim (with `""` unescaped to `"`);
/// unquoted fields are trimmed.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut buf = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    buf.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if !quoted && buf.trim().is_empty() => {
                buf.clear();
                quoted = true;
                in_quotes = true;
            }
            ',' if !in_quotes => {
                fields.push(finish_field(std::mem::take(&mut buf), quoted));
                quoted = false;
            }
            c if quoted && !in_quotes && c.is_whitespace() => {}
            c => buf.push(c),
        }
    }
    fields.push(finish_field(buf, quoted));

    fields
}

fn finish_field(buf: String, quoted: bool) -> String {
    if quoted {
        buf
    } else {
        buf.trim().to_string()
    }
}

/// Quote a value when it would not survive [`split_fields`] unquoted
pub fn quote_field(value: &str) -> String {
    let flat = value.replace(['\r', '\n'], " ");
    let needs_quotes = flat.contains(',')
        || flat.contains('"')
        || flat.starts_with(char::is_whitespace)
        || flat.ends_with(char::is_whitespace);

    if needs_quotes {
        format!("\"{}\"", flat.replace('"', "\"\""))
    } else {
        flat
    }
}

/// Join values into one encoded line
pub fn join_fields<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|value| quote_field(value.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Section marker line
pub fn marker(prefix: &str, key: &str) -> String {
    format!("#== {}: {} ==#", prefix, key)
}

/// Split a file into `(key, body)` pairs for every marker with `prefix`.
///
/// Bodies run until the next marker of any prefix. Text before the first
/// marker is ignored.
pub fn split_sections<'a>(text: &'a str, prefix: &str) -> Vec<(String, &'a str)> {
    let markers: Vec<_> = SECTION_MARKER.captures_iter(text).collect();
    let mut sections = Vec::new();

    for (index, captures) in markers.iter().enumerate() {
        let (Some(whole), Some(found_prefix), Some(key)) =
            (captures.get(0), captures.get(1), captures.get(2))
        else {
            continue;
        };
        if found_prefix.as_str() != prefix {
            continue;
        }

        let body_end = markers
            .get(index + 1)
            .and_then(|next| next.get(0))
            .map(|next| next.start())
            .unwrap_or(text.len());
        sections.push((key.as_str().to_string(), &text[whole.end()..body_end]));
    }

    sections
}

/// Decode a table whose header must equal `layout.keys`, in order.
///
/// A header mismatch yields no rows. Lines with the wrong number of columns
/// are skipped individually.
pub fn decode_table(text: &str, layout: &SectionLayout, label: &str) -> Vec<Row> {
    let mut lines = text
        .trim_start_matches(UTF8_BOM)
        .lines()
        .map(|line| line.trim_start_matches(UTF8_BOM))
        .filter(|line| !line.trim().is_empty());

    let Some(header_line) = lines.next() else {
        tracing::warn!(section = label, "Section is empty");
        return Vec::new();
    };

    let header = split_fields(header_line);
    if header.len() != layout.keys.len()
        || header.iter().zip(layout.keys).any(|(found, expected)| found.as_str() != *expected)
    {
        tracing::warn!(
            section = label,
            expected = ?layout.keys,
            found = ?header,
            "Header keys mismatch, section ignored"
        );
        return Vec::new();
    }

    // Description row
    lines.next();

    let mut rows = Vec::new();
    for (offset, line) in lines.enumerate() {
        let values = split_fields(line);
        if values.len() != layout.keys.len() {
            tracing::warn!(
                section = label,
                record = offset + 1,
                found = values.len(),
                expected = layout.keys.len(),
                "Skipping malformed line"
            );
            continue;
        }

        let mut row = Row::new();
        for (key, value) in layout.keys.iter().zip(values) {
            if is_numeric_key(key) {
                row.set(key, FieldValue::Number(to_number(&value)));
            } else {
                row.set(key, FieldValue::Text(value));
            }
        }
        rows.push(row);
    }

    rows
}

/// Encode rows under a key header and a description row.
///
/// Missing fields are written empty.
pub fn encode_table(rows: &[Row], layout: &SectionLayout) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(join_fields(layout.keys));
    lines.push(join_fields(layout.descriptions));

    for row in rows {
        let values: Vec<String> = layout.keys.iter().map(|key| row.text(key)).collect();
        lines.push(join_fields(&values));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const LAYOUT: SectionLayout = SectionLayout {
        keys: &["name", "nit", "totalAmount"],
        descriptions: &["Nombre", "NIT", "Total"],
    };

    #[test]
    fn test_split_fields_handles_quotes() {
        assert_eq!(split_fields("a, b ,c"), vec!["a", "b", "c"]);
        assert_eq!(
            split_fields(r#""San Salvador, Av. 1",x"#),
            vec!["San Salvador, Av. 1", "x"]
        );
        assert_eq!(
            split_fields(r#""say ""hi""", " padded ""#),
            vec![r#"say "hi""#, " padded "]
        );
        assert_eq!(split_fields(""), vec![""]);
        assert_eq!(split_fields("a,,"), vec!["a", "", ""]);
    }

    #[test]
    fn test_quote_field_escapes() {
        assert_eq!(quote_field("plain"), "plain");
        assert_eq!(quote_field("a,b"), "\"a,b\"");
        assert_eq!(quote_field("5\" pipe"), "\"5\"\" pipe\"");
        assert_eq!(quote_field("line\nbreak"), "line break");
        assert_eq!(quote_field(" lead"), "\" lead\"");
    }

    #[test]
    fn test_split_sections_by_prefix() {
        let text = "preamble\n#== TEMPLATE_START: CLIENTS ==#\nA\n#== BACKUP_START: OTHER ==#\nB\n#== TEMPLATE_START: SUPPLIERS ==#\nC\n";
        let sections = split_sections(text, "TEMPLATE_START");

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, "CLIENTS");
        assert_eq!(sections[0].1.trim(), "A");
        assert_eq!(sections[1].0, "SUPPLIERS");
        assert_eq!(sections[1].1.trim(), "C");
    }

    #[test]
    fn test_decode_table_skips_metadata_and_bad_lines() {
        let text = "\u{feff}name,nit,totalAmount\nNombre,NIT,Total\n\n\"ACME, S.A.\",0614,$1,200.50\nBroken,line\nSolo,0101,10\n";
        let rows = decode_table(text, &LAYOUT, "test");

        // "$1,200.50" is unquoted and splits into an extra column
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("name"), "Solo");
        assert_eq!(
            rows[0].get("totalAmount"),
            Some(&FieldValue::Number(BigDecimal::from(10)))
        );
        assert_eq!(rows[0].get("nit"), Some(&FieldValue::Text("0101".to_string())));
    }

    #[test]
    fn test_decode_table_rejects_header_mismatch() {
        let text = "nit,name,totalAmount\nd,d,d\nx,y,1\n";
        assert!(decode_table(text, &LAYOUT, "test").is_empty());
    }

    #[test]
    fn test_encode_then_decode_preserves_values() {
        let rows = vec![
            Row::new()
                .with("name", "Comercial \"La Esquina\", S.A.")
                .with("nit", "0614-010190-101-1")
                .with("totalAmount", BigDecimal::from_str("1500.75").unwrap()),
            Row::new()
                .with("name", "Sin NIT")
                .with("nit", "")
                .with("totalAmount", BigDecimal::from(0)),
        ];

        let encoded = encode_table(&rows, &LAYOUT);
        assert!(encoded.starts_with("name,nit,totalAmount\nNombre,NIT,Total\n"));

        let decoded = decode_table(&encoded, &LAYOUT, "test");
        assert_eq!(decoded, rows);
    }
}
