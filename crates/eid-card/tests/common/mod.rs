//! In-memory card answering SELECT, READ BINARY and GET DATA

#![allow(dead_code)]

pub mod readers;

use std::collections::HashMap;

use eid_card::{CardChannel, PcscError};

const OK: [u8; 2] = [0x90, 0x00];

/// Scripted card with a flat file system
#[derive(Default)]
pub struct FakeCard {
    files: HashMap<Vec<u8>, Vec<u8>>,
    selected: Option<Vec<u8>>,
    outer_aid: bool,
    get_data: Vec<u8>,
    pub fail_with: Option<PcscError>,
    pub commands: Vec<Vec<u8>>,
}

impl FakeCard {
    pub fn new() -> Self {
        Self::default()
    }

    /// SELECT answers with the file length at bytes 2..4, big-endian
    pub fn outer_aid() -> Self {
        Self {
            outer_aid: true,
            ..Self::default()
        }
    }

    pub fn with_file(mut self, path: &[u8], content: Vec<u8>) -> Self {
        self.files.insert(path.to_vec(), content);
        self
    }

    pub fn with_get_data(mut self, data: Vec<u8>) -> Self {
        self.get_data = data;
        self
    }

    /// READ BINARY commands received so far as `(offset, length)`
    pub fn reads(&self) -> Vec<(usize, usize)> {
        self.commands
            .iter()
            .filter(|c| c.len() == 5 && c[0] == 0x00 && c[1] == 0xB0)
            .map(|c| (u16::from_be_bytes([c[2], c[3]]) as usize, c[4] as usize))
            .collect()
    }

    fn reply(data: &[u8], sw: [u8; 2]) -> Vec<u8> {
        let mut out = data.to_vec();
        out.extend_from_slice(&sw);
        out
    }

    fn select(&mut self, path: &[u8], le: u8) -> Vec<u8> {
        let Some(content) = self.files.get(path) else {
            return Self::reply(&[], [0x6A, 0x82]);
        };
        let len = content.len() as u16;
        self.selected = Some(path.to_vec());

        let response = if self.outer_aid {
            let [hi, lo] = len.to_be_bytes();
            vec![0x62, 0x00, hi, lo]
        } else {
            vec![0x00]
        };
        let take = (le as usize).min(response.len());
        Self::reply(&response[..take], OK)
    }

    fn read_binary(&self, offset: usize, le: usize) -> Vec<u8> {
        let Some(content) = self.selected.as_ref().and_then(|p| self.files.get(p)) else {
            return Self::reply(&[], [0x69, 0x86]);
        };
        if offset > content.len() {
            return Self::reply(&[], [0x6B, 0x00]);
        }
        let end = (offset + le).min(content.len());
        Self::reply(&content[offset..end], OK)
    }
}

impl CardChannel for FakeCard {
    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, PcscError> {
        self.commands.push(command.to_vec());
        if let Some(err) = self.fail_with {
            return Err(err);
        }

        let response = match command {
            [0x00, 0xCA, 0x01, 0x01, le] => {
                let take = (*le as usize).min(self.get_data.len());
                Self::reply(&self.get_data[..take], OK)
            }
            [0x00, 0xA4, 0x08, 0x00, lc, rest @ ..] if rest.len() == *lc as usize + 1 => {
                let (path, le) = rest.split_at(*lc as usize);
                self.select(path, le[0])
            }
            [0x00, 0xB0, hi, lo, le] => {
                self.read_binary(u16::from_be_bytes([*hi, *lo]) as usize, *le as usize)
            }
            _ => Self::reply(&[], [0x6D, 0x00]),
        };
        Ok(response)
    }
}

/// Plain-variant file: 6-byte header with little-endian body length
pub fn plain_file(body: &[u8]) -> Vec<u8> {
    let [lo, hi] = (body.len() as u16).to_le_bytes();
    let mut file = vec![0x01, 0x00, 0x00, 0x00, lo, hi];
    file.extend_from_slice(body);
    file
}
