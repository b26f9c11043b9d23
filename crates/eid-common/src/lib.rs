//! eID Common - Record decoding and shared helpers for eID card files
//!
//! Everything in this crate works on byte buffers that were already read
//! from the card. Nothing here talks to a reader.

pub mod fields;
pub mod records;

pub use fields::{get_field_name, RecordFile};
pub use records::{encode_fields, field_map, split_fields, FieldRecord, RecordError};

/// File name used when dumping an elementary file, e.g. `ef_0F_02.bin`
pub fn dump_file_name(path: &[u8]) -> String {
    let parts: Vec<String> = path.iter().map(|b| format!("{:02X}", b)).collect();
    format!("ef_{}.bin", parts.join("_"))
}

/// Decode a field value as text.
///
/// Values are UTF-8 on current cards; invalid sequences are replaced rather
/// than rejected and surrounding whitespace and NUL padding are trimmed.
pub fn field_text(value: &[u8]) -> String {
    String::from_utf8_lossy(value)
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}
