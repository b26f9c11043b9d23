//! APDU (Application Protocol Data Unit) command handling

use tracing::debug;

use crate::error::CardError;

/// Largest Lc a short APDU can encode
pub const MAX_COMMAND_DATA: usize = 0xFF;

/// APDU response containing data and status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    /// Response data (without status word)
    pub data: Vec<u8>,
    /// Status word SW1
    pub sw1: u8,
    /// Status word SW2
    pub sw2: u8,
}

impl ApduResponse {
    /// Split a raw response into payload and status word
    pub fn from_raw(raw: &[u8]) -> Result<Self, CardError> {
        if raw.len() < 2 {
            return Err(CardError::MissingStatusWord(raw.len()));
        }

        let (data, sw) = raw.split_at(raw.len() - 2);
        Ok(Self {
            data: data.to_vec(),
            sw1: sw[0],
            sw2: sw[1],
        })
    }

    /// Check if the response indicates success (9000)
    pub fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Get the full status word as a 16-bit value
    pub fn status_word(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Get status word as hex string (e.g., "9000")
    pub fn status_string(&self) -> String {
        format!("{:02X}{:02X}", self.sw1, self.sw2)
    }

    /// Payload of a successful response, or the card's status as an error
    pub fn into_data(self) -> Result<Vec<u8>, CardError> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(CardError::CardStatus {
                status_word: self.status_word(),
            })
        }
    }
}

/// APDU command builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduCommand {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Vec<u8>,
    le: Option<u8>,
}

impl ApduCommand {
    /// Create a new APDU command
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    /// Set command data. Short APDUs carry at most 255 data bytes.
    pub fn data(mut self, data: &[u8]) -> Result<Self, CardError> {
        if data.len() > MAX_COMMAND_DATA {
            return Err(CardError::CommandDataTooLong(data.len()));
        }
        self.data = data.to_vec();
        Ok(self)
    }

    /// Set expected response length
    pub fn le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Build the APDU command bytes
    pub fn build(&self) -> Vec<u8> {
        let mut apdu = vec![self.cla, self.ins, self.p1, self.p2];

        if !self.data.is_empty() {
            apdu.push(self.data.len() as u8);
            apdu.extend_from_slice(&self.data);
        }

        if let Some(le) = self.le {
            apdu.push(le);
        }

        apdu
    }
}

/// APDU commands understood by eID cards
pub mod commands {
    use super::ApduCommand;
    use crate::error::CardError;

    /// GET DATA 0101, returns the card header block
    pub fn get_data_0101() -> ApduCommand {
        ApduCommand::new(0x00, 0xCA, 0x01, 0x01).le(0x20)
    }

    /// SELECT FILE by path from the master file
    pub fn select_path(path: &[u8], le: u8) -> Result<ApduCommand, CardError> {
        Ok(ApduCommand::new(0x00, 0xA4, 0x08, 0x00).data(path)?.le(le))
    }

    /// READ BINARY from the currently selected file
    pub fn read_binary(offset: u16, length: u8) -> ApduCommand {
        let [hi, lo] = offset.to_be_bytes();
        ApduCommand::new(0x00, 0xB0, hi, lo).le(length)
    }
}

/// Raw byte exchange with a card. Implementations return the full response
/// including the trailing status word.
pub trait CardChannel {
    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, pcsc::Error>;
}

impl<C: CardChannel + ?Sized> CardChannel for &mut C {
    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, pcsc::Error> {
        (**self).exchange(command)
    }
}

/// Status-checking transport on top of a [`CardChannel`]
pub struct Transport<C> {
    channel: C,
    verbose: bool,
}

impl<C: CardChannel> Transport<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            verbose: false,
        }
    }

    /// Log every command and response as hex
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Send raw command bytes and return the payload of a `90 00` response
    pub fn transmit(&mut self, command: &[u8]) -> Result<Vec<u8>, CardError> {
        if self.verbose {
            debug!("> {}", spaced_hex(command));
        }

        let raw = self.channel.exchange(command)?;

        if self.verbose {
            debug!("< {}", spaced_hex(&raw));
        }

        ApduResponse::from_raw(&raw)?.into_data()
    }

    /// Send a built command
    pub fn send(&mut self, command: &ApduCommand) -> Result<Vec<u8>, CardError> {
        self.transmit(&command.build())
    }

    pub fn into_inner(self) -> C {
        self.channel
    }
}

/// Hex with a space between bytes, the way APDU traces are usually read
pub fn spaced_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
