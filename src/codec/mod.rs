//! Text codecs for bulk templates and backups

pub mod tabular;
pub mod template;

pub use tabular::{
    decode_table, encode_table, split_fields, split_sections, FieldValue, Row, SectionLayout,
};
pub use template::{
    backup_layout, blank_template, decode_section, encode_section, template_layout,
    BACKUP_PREFIX, TEMPLATE_PREFIX,
};
