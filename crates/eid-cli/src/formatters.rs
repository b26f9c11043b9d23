//! Field formatters for human-readable output

use clap::ValueEnum;
use eid_common::fields::residence;
use eid_common::{field_text, get_field_name, FieldRecord, RecordFile};

/// Hex character range of the GET DATA 0101 response printed on the card
const PRINTED_NUMBER_RANGE: std::ops::Range<usize> = 18..32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatMode {
    /// Raw hex output
    Raw,
    /// Human-readable formatted output
    Human,
}

impl FormatMode {
    pub fn description(&self) -> &'static str {
        match self {
            FormatMode::Raw => "Raw",
            FormatMode::Human => "Human-Readable",
        }
    }
}

/// Format a field value for display
pub fn format_value(value: &[u8], mode: FormatMode) -> String {
    match mode {
        FormatMode::Raw => hex::encode_upper(value),
        FormatMode::Human => field_text(value),
    }
}

/// Number printed on the card body, taken from the GET DATA 0101 header
pub fn printed_number(header: &[u8]) -> Option<String> {
    hex::encode_upper(header)
        .get(PRINTED_NUMBER_RANGE)
        .map(str::to_string)
}

/// One line per record: `[id] Name: value`
pub fn format_records(file: RecordFile, records: &[FieldRecord], mode: FormatMode) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            format!(
                "  [{:02}] {}: {}",
                record.id,
                get_field_name(file, record.id),
                format_value(&record.value, mode)
            )
        })
        .collect()
}

/// Single-line address: street and trailing groups, then place, municipality
/// and country code.
///
/// Empty values are skipped.
pub fn format_address(records: &[FieldRecord]) -> String {
    let text_of = |id: u8| {
        records
            .iter()
            .rev()
            .find(|r| r.id == id)
            .map(|r| field_text(&r.value))
            .unwrap_or_default()
    };

    let mut street: Vec<String> = records
        .iter()
        .filter(|r| r.id >= residence::STREET)
        .map(|r| field_text(&r.value))
        .collect();
    street.retain(|s| !s.is_empty());

    let mut parts = Vec::new();
    if !street.is_empty() {
        parts.push(street.join(" "));
    }
    for id in [residence::PLACE, residence::MUNICIPALITY, residence::COUNTRY_CODE] {
        let text = text_of(id);
        if !text.is_empty() {
            parts.push(text);
        }
    }
    parts.join(", ")
}
