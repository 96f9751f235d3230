//! Fixed-size shares and their header layout.
//!
//! Every share starts with `namespace | info byte`. The first share of a
//! sequence adds a 4-byte big-endian sequence length; compact shares add a
//! further 4-byte offset of the first unit that begins inside the share.

pub mod compact;
pub mod sparse;

use serde::{Deserialize, Serialize};

use crate::config::{SquareConfig, MAX_SHARE_VERSION, SEQUENCE_LEN_BYTES, SHARE_INFO_BYTES};
use crate::error::{Result, SquareError};
use crate::namespace::Namespace;

/// Share version plus the sequence-start flag in the lowest bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InfoByte(u8);

impl InfoByte {
    pub fn new(version: u8, sequence_start: bool) -> Result<Self> {
        if version > MAX_SHARE_VERSION {
            return Err(SquareError::InvalidShare("share version out of range"));
        }
        Ok(Self((version << 1) | sequence_start as u8))
    }

    pub fn from_u8(byte: u8) -> Self {
        Self(byte)
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }

    pub fn version(self) -> u8 {
        self.0 >> 1
    }

    pub fn is_sequence_start(self) -> bool {
        self.0 & 1 == 1
    }
}

/// One cell of the data square.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share(#[serde(with = "crate::serde_hex::bytes")] Vec<u8>);

impl Share {
    /// Wrap raw bytes, checking they are exactly one share long.
    pub fn from_bytes(config: &SquareConfig, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != config.share_size {
            return Err(SquareError::InvalidShare("share has wrong length"));
        }
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn namespace(&self, config: &SquareConfig) -> Result<Namespace> {
        let raw = self
            .0
            .get(..config.namespace_size)
            .ok_or(SquareError::InvalidShare("share shorter than a namespace"))?;
        Namespace::from_raw(raw, config.namespace_size)
    }

    pub fn info(&self, config: &SquareConfig) -> InfoByte {
        InfoByte::from_u8(self.0[config.namespace_size])
    }
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = self.0.len().min(48);
        write!(f, "Share({}..)", hex::encode(&self.0[..shown]))
    }
}

/// The share that fills unused cells after the last blob.
pub fn tail_padding_share(config: &SquareConfig) -> Result<Share> {
    let info = InfoByte::new(config.share_version, true)?;
    let mut writer = ShareWriter::new(config, &config.reserved().tail_padding, info);
    writer.put_u32(0);
    Ok(writer.finish())
}

/// Number of shares a sequence of `len` bytes occupies.
pub(crate) fn shares_needed(len: usize, first: usize, continuation: usize) -> usize {
    if len == 0 {
        0
    } else if len <= first {
        1
    } else {
        1 + (len - first).div_ceil(continuation)
    }
}

/// Appends header and content bytes, zero-padding on `finish`.
pub(crate) struct ShareWriter {
    buf: Vec<u8>,
    share_size: usize,
}

impl ShareWriter {
    pub(crate) fn new(config: &SquareConfig, namespace: &Namespace, info: InfoByte) -> Self {
        let mut buf = Vec::with_capacity(config.share_size);
        buf.extend_from_slice(namespace.as_bytes());
        buf.push(info.as_u8());
        Self {
            buf,
            share_size: config.share_size,
        }
    }

    pub(crate) fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn put(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= self.remaining());
        self.buf.extend_from_slice(bytes);
    }

    pub(crate) fn remaining(&self) -> usize {
        self.share_size - self.buf.len()
    }

    pub(crate) fn finish(mut self) -> Share {
        self.buf.resize(self.share_size, 0);
        Share(self.buf)
    }
}

/// Cursor over one share's header fields.
pub(crate) struct ShareReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    pub(crate) namespace: Namespace,
    pub(crate) info: InfoByte,
}

impl<'a> ShareReader<'a> {
    pub(crate) fn new(config: &SquareConfig, share: &'a Share) -> Result<Self> {
        let bytes = share.as_bytes();
        if bytes.len() != config.share_size {
            return Err(SquareError::InvalidShare("share has wrong length"));
        }
        let namespace = Namespace::from_raw(&bytes[..config.namespace_size], config.namespace_size)?;
        let info = InfoByte::from_u8(bytes[config.namespace_size]);
        if info.version() != config.share_version {
            return Err(SquareError::InvalidShare("unsupported share version"));
        }
        Ok(Self {
            bytes,
            pos: config.namespace_size + SHARE_INFO_BYTES,
            namespace,
            info,
        })
    }

    pub(crate) fn read_u32(&mut self) -> u32 {
        let mut raw = [0u8; SEQUENCE_LEN_BYTES];
        raw.copy_from_slice(&self.bytes[self.pos..self.pos + SEQUENCE_LEN_BYTES]);
        self.pos += SEQUENCE_LEN_BYTES;
        u32::from_be_bytes(raw)
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_byte_packs_version_and_flag() {
        let info = InfoByte::new(0, true).unwrap();
        assert_eq!(info.as_u8(), 1);
        assert!(info.is_sequence_start());

        let info = InfoByte::new(5, false).unwrap();
        assert_eq!(info.as_u8(), 10);
        assert_eq!(info.version(), 5);
        assert!(!info.is_sequence_start());

        assert!(InfoByte::new(128, false).is_err());
    }

    #[test]
    fn padding_share_layout() {
        let config = SquareConfig::default();
        let share = tail_padding_share(&config).unwrap();
        assert_eq!(share.as_bytes().len(), config.share_size);
        assert_eq!(share.namespace(&config).unwrap(), config.reserved().tail_padding);
        assert!(share.info(&config).is_sequence_start());
        assert!(share.as_bytes()[config.namespace_size + 1..]
            .iter()
            .all(|b| *b == 0));
    }

    #[test]
    fn namespace_of_short_share_is_an_error() {
        let config = SquareConfig::default();
        let share: Share = serde_json::from_str("\"0102\"").unwrap();
        assert_eq!(
            share.namespace(&config).unwrap_err(),
            SquareError::InvalidShare("share shorter than a namespace")
        );
    }

    #[test]
    fn counts_shares_for_sequences() {
        assert_eq!(shares_needed(0, 10, 12), 0);
        assert_eq!(shares_needed(10, 10, 12), 1);
        assert_eq!(shares_needed(11, 10, 12), 2);
        assert_eq!(shares_needed(22, 10, 12), 2);
        assert_eq!(shares_needed(23, 10, 12), 3);
    }
}
