//! Length-prefixed record stream used inside eID elementary files
//!
//! A file body is a flat concatenation of records:
//!
//! ```text
//! [id] [06] [len] [00] [len bytes of value] | [id] [06] [len] [00] ...
//! ```
//!
//! Bytes 1 and 3 of each record header have always been `06` and `00` on the
//! cards seen so far. They are not validated.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::trace;

/// Size of the header in front of every record value
pub const RECORD_HEADER_LEN: usize = 4;

/// Filler byte expected at offset 1 of a record header
pub const RECORD_TYPE_BYTE: u8 = 0x06;

/// Filler byte expected at offset 3 of a record header
pub const RECORD_PAD_BYTE: u8 = 0x00;

/// Errors raised while decoding or encoding a record stream
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("malformed record at offset {offset}: needs {needed} bytes, body has {available}")]
    Malformed {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("value for field {id} is {len} bytes, at most 255 fit in a record")]
    ValueTooLong { id: u8, len: usize },
}

/// One decoded unit of a file body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRecord {
    pub id: u8,
    pub value: Vec<u8>,
}

impl FieldRecord {
    pub fn new(id: u8, value: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}

/// Split a file body into its ordered list of records.
///
/// Fails instead of truncating when a record header or a declared value
/// length runs past the end of `body`.
pub fn split_fields(body: &[u8]) -> Result<Vec<FieldRecord>, RecordError> {
    let mut records = Vec::new();
    let mut pos = 0;

    while pos < body.len() {
        if pos + RECORD_HEADER_LEN > body.len() {
            return Err(RecordError::Malformed {
                offset: pos,
                needed: RECORD_HEADER_LEN,
                available: body.len() - pos,
            });
        }

        let id = body[pos];
        let len = body[pos + 2] as usize;

        if body[pos + 1] != RECORD_TYPE_BYTE || body[pos + 3] != RECORD_PAD_BYTE {
            trace!(
                offset = pos,
                id,
                filler = %hex::encode_upper([body[pos + 1], body[pos + 3]]),
                "Unexpected record filler bytes"
            );
        }

        let start = pos + RECORD_HEADER_LEN;
        let end = start + len;
        if end > body.len() {
            return Err(RecordError::Malformed {
                offset: pos,
                needed: RECORD_HEADER_LEN + len,
                available: body.len() - pos,
            });
        }

        records.push(FieldRecord::new(id, &body[start..end]));
        pos = end;
    }

    Ok(records)
}

/// Encode `(id, value)` pairs into a record stream.
///
/// `split_fields` reproduces the input exactly for any output of this function.
pub fn encode_fields(fields: &[(u8, &[u8])]) -> Result<Vec<u8>, RecordError> {
    let capacity = fields.iter().map(|(_, v)| RECORD_HEADER_LEN + v.len()).sum();
    let mut out = Vec::with_capacity(capacity);

    for &(id, value) in fields {
        let len = u8::try_from(value.len()).map_err(|_| RecordError::ValueTooLong {
            id,
            len: value.len(),
        })?;
        out.extend_from_slice(&[id, RECORD_TYPE_BYTE, len, RECORD_PAD_BYTE]);
        out.extend_from_slice(value);
    }

    Ok(out)
}

/// Map field ids to values. A repeated id keeps its last value.
pub fn field_map(records: &[FieldRecord]) -> BTreeMap<u8, Vec<u8>> {
    records
        .iter()
        .map(|r| (r.id, r.value.clone()))
        .collect()
}
