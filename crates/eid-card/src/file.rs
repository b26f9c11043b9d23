//! Elementary file reads: SELECT, length discovery and windowed READ BINARY

use tracing::debug;

use crate::apdu::{commands, CardChannel, Transport};
use crate::error::CardError;
use crate::profile::CardVariant;

/// Size of the plain-variant file header
pub const HEADER_LEN: usize = 6;

/// Largest length READ BINARY accepts in one command
pub const MAX_READ_WINDOW: usize = 0xFF;

/// One elementary file as read from the card
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFile {
    pub path: Vec<u8>,
    /// Plain cards: the 6 header bytes. Outer-AID cards: the framing bytes
    /// stripped from the first chunk.
    pub header: Vec<u8>,
    pub body: Vec<u8>,
}

impl CardFile {
    /// True for files that exist but hold no data
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Header followed by body, as stored on the card
    pub fn raw(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(self.header.len() + self.body.len());
        raw.extend_from_slice(&self.header);
        raw.extend_from_slice(&self.body);
        raw
    }
}

/// Result of inspecting a freshly selected file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLayout {
    /// File exists but holds no data
    Empty { header: Vec<u8> },
    /// Content lies at offsets `start..total`
    Content {
        header: Vec<u8>,
        start: usize,
        total: usize,
    },
}

/// First read window split into framing and content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstChunk {
    pub framing: Vec<u8>,
    pub content: Vec<u8>,
    /// Real content length announced inside the framing
    pub content_len: Option<usize>,
}

impl CardVariant {
    /// Total file length from the plain header or the outer-AID SELECT response
    pub fn compute_length(&self, source: &[u8]) -> Option<usize> {
        match self {
            CardVariant::Plain => {
                if source.len() < HEADER_LEN {
                    return None;
                }
                Some(u16::from_le_bytes([source[4], source[5]]) as usize + HEADER_LEN)
            }
            CardVariant::OuterAid(layout) => source
                .get(layout.length_offset..layout.length_offset + 2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize),
        }
    }

    /// Work out where the content of the selected file lies
    pub fn read_header<C: CardChannel>(
        &self,
        transport: &mut Transport<C>,
        path: &[u8],
        select_response: &[u8],
    ) -> Result<FileLayout, CardError> {
        match self {
            CardVariant::Plain => {
                let header = read_window(transport, 0, HEADER_LEN)?;
                if header.len() < HEADER_LEN {
                    return Err(CardError::HeaderRead {
                        path: hex::encode_upper(path),
                        got: header.len(),
                        expected: HEADER_LEN,
                    });
                }
                if header.iter().all(|&b| b == 0xFF) {
                    return Ok(FileLayout::Empty { header });
                }
                let total = self.compute_length(&header).unwrap_or(HEADER_LEN);
                Ok(FileLayout::Content {
                    header,
                    start: HEADER_LEN,
                    total,
                })
            }
            CardVariant::OuterAid(layout) => {
                let total = self.compute_length(select_response).ok_or_else(|| {
                    CardError::HeaderRead {
                        path: hex::encode_upper(path),
                        got: select_response.len(),
                        expected: layout.length_offset + 2,
                    }
                })?;
                if total == 0 {
                    return Ok(FileLayout::Empty { header: Vec::new() });
                }
                Ok(FileLayout::Content {
                    header: Vec::new(),
                    start: 0,
                    total,
                })
            }
        }
    }

    /// Strip framing from the first read window
    pub fn adjust_first_chunk(&self, path: &[u8], chunk: &[u8]) -> Result<FirstChunk, CardError> {
        match self {
            CardVariant::Plain => Ok(FirstChunk {
                framing: Vec::new(),
                content: chunk.to_vec(),
                content_len: None,
            }),
            CardVariant::OuterAid(layout) => {
                let framing_len = layout.framing_len();
                if chunk.len() < framing_len {
                    return Err(CardError::HeaderRead {
                        path: hex::encode_upper(path),
                        got: chunk.len(),
                        expected: framing_len,
                    });
                }
                let len_bytes = [chunk[framing_len - 2], chunk[framing_len - 1]];
                Ok(FirstChunk {
                    framing: chunk[..framing_len].to_vec(),
                    content: chunk[framing_len..].to_vec(),
                    content_len: Some(u16::from_le_bytes(len_bytes) as usize),
                })
            }
        }
    }
}

/// Issue one READ BINARY at `offset` for `length` bytes (at most 255)
fn read_window<C: CardChannel>(
    transport: &mut Transport<C>,
    offset: usize,
    length: usize,
) -> Result<Vec<u8>, CardError> {
    let p1p2 = u16::try_from(offset).map_err(|_| CardError::OffsetOutOfRange(offset))?;
    let le = length.min(MAX_READ_WINDOW) as u8;
    transport.send(&commands::read_binary(p1p2, le))
}

/// Reads whole elementary files through a [`Transport`]
pub struct FileReader<C> {
    transport: Transport<C>,
    variant: CardVariant,
}

impl<C: CardChannel> FileReader<C> {
    pub fn new(transport: Transport<C>, variant: CardVariant) -> Self {
        Self { transport, variant }
    }

    pub fn variant(&self) -> CardVariant {
        self.variant
    }

    /// Underlying transport, for commands that are not file reads
    pub fn transport(&mut self) -> &mut Transport<C> {
        &mut self.transport
    }

    pub fn into_transport(self) -> Transport<C> {
        self.transport
    }

    /// Make `path` the current file and return the SELECT payload
    pub fn select(&mut self, path: &[u8]) -> Result<Vec<u8>, CardError> {
        let command = commands::select_path(path, self.variant.select_le())?;
        self.transport.send(&command)
    }

    /// Select and read a complete file
    pub fn read_file(&mut self, path: &[u8]) -> Result<CardFile, CardError> {
        let select_response = self.select(path)?;

        let layout = self
            .variant
            .read_header(&mut self.transport, path, &select_response)?;

        let (mut header, start, total) = match layout {
            FileLayout::Empty { header } => {
                debug!(path = %hex::encode_upper(path), "File is empty");
                return Ok(CardFile {
                    path: path.to_vec(),
                    header,
                    body: Vec::new(),
                });
            }
            FileLayout::Content {
                header,
                start,
                total,
            } => (header, start, total),
        };

        debug!(path = %hex::encode_upper(path), total, "Reading file");

        let mut body = Vec::with_capacity(total.saturating_sub(start));
        let mut content_len = None;
        let mut offset = start;

        while offset < total {
            let window = (total - offset).min(MAX_READ_WINDOW);
            let chunk = read_window(&mut self.transport, offset, window)?;

            if offset == start {
                let first = self.variant.adjust_first_chunk(path, &chunk)?;
                header.extend_from_slice(&first.framing);
                body.extend_from_slice(&first.content);
                content_len = first.content_len;
            } else {
                body.extend_from_slice(&chunk);
            }

            offset += window;
        }

        if let Some(len) = content_len {
            body.truncate(len);
        }

        Ok(CardFile {
            path: path.to_vec(),
            header,
            body,
        })
    }
}
