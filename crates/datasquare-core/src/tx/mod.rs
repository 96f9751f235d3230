//! Raw transaction envelope.
//!
//! A raw transaction is a bincode encoded [`Envelope`]: little endian, fixed
//! width integers, bounded by the size of a full square, no trailing bytes.

pub mod builder;
pub mod extract;

use bincode::config::{
    Bounded, FixintEncoding, LittleEndian, RejectTrailing, WithOtherEndian, WithOtherIntEncoding,
    WithOtherLimit, WithOtherTrailing,
};
use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::commitment::Commitment;
use crate::config::SquareConfig;
use crate::error::{Result, SquareError};

pub use builder::{commitment_sign_bytes, CommitmentSigner, SIGN_DOMAIN};
pub use extract::{extract, BlobTx, ParsedTx};

pub(crate) type BincodeOptions = WithOtherTrailing<
    WithOtherIntEncoding<
        WithOtherLimit<WithOtherEndian<bincode::DefaultOptions, LittleEndian>, Bounded>,
        FixintEncoding,
    >,
    RejectTrailing,
>;

fn options(config: &SquareConfig) -> BincodeOptions {
    bincode::DefaultOptions::new()
        .with_little_endian()
        .with_limit(config.max_tx_bytes())
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// A commitment the sender precomputed and signed for one square size.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCommitment {
    pub square_size: u64,
    #[serde(with = "crate::serde_hex::array")]
    pub commitment: Commitment,
    #[serde(with = "crate::serde_hex::bytes")]
    pub signature: Vec<u8>,
}

/// A blob-carrying transaction as submitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePayForBlob {
    pub namespace: Vec<u8>,
    pub declared_length: u32,
    pub blob: Vec<u8>,
    pub commitments: Vec<CandidateCommitment>,
}

/// The form a blob transaction takes in the block: the payload lives in
/// sparse shares, only its sha256 stays here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayForBlob {
    pub namespace: Vec<u8>,
    pub declared_length: u32,
    pub blob_hash: [u8; 32],
    pub commitments: Vec<CandidateCommitment>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Envelope {
    /// Opaque application transaction.
    Plain(Vec<u8>),
    WirePayForBlob(WirePayForBlob),
    PayForBlob(PayForBlob),
}

impl Envelope {
    pub fn encode(&self, config: &SquareConfig) -> Result<Vec<u8>> {
        Ok(options(config).serialize(self)?)
    }

    /// Decode a raw transaction no longer than a full square.
    pub fn decode(config: &SquareConfig, raw: &[u8]) -> Result<Self> {
        // bincode does not enforce its limit on slice readers.
        if raw.len() as u64 > config.max_tx_bytes() {
            return Err(SquareError::MalformedTransaction(format!(
                "{} bytes exceed the {} byte transaction bound",
                raw.len(),
                config.max_tx_bytes()
            )));
        }
        Ok(options(config).deserialize(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_envelope_layout() {
        let config = SquareConfig::default();
        let raw = Envelope::Plain(vec![0xaa, 0xbb]).encode(&config).unwrap();
        // variant index u32, length u64, bytes
        assert_eq!(raw, vec![0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0xaa, 0xbb]);
        assert_eq!(
            Envelope::decode(&config, &raw).unwrap(),
            Envelope::Plain(vec![0xaa, 0xbb])
        );
    }

    #[test]
    fn rejects_trailing_and_truncated_bytes() {
        let config = SquareConfig::default();
        let mut raw = Envelope::Plain(vec![1, 2, 3]).encode(&config).unwrap();
        raw.push(0);
        assert!(matches!(
            Envelope::decode(&config, &raw),
            Err(SquareError::MalformedTransaction(_))
        ));
        assert!(Envelope::decode(&config, &raw[..raw.len() - 2]).is_err());
        assert!(Envelope::decode(&config, &[]).is_err());
    }

    #[test]
    fn rejects_lengths_beyond_square_capacity() {
        let config = SquareConfig {
            max_square_size: 1,
            ..SquareConfig::default()
        };
        let raw = Envelope::Plain(vec![0; 1024])
            .encode(&SquareConfig::default())
            .unwrap();
        assert_eq!(raw.len(), 1036);
        assert!(matches!(
            Envelope::decode(&config, &raw),
            Err(SquareError::MalformedTransaction(_))
        ));
        assert!(Envelope::Plain(vec![0; 1024]).encode(&config).is_err());

        let fits = Envelope::Plain(vec![0; 500]).encode(&config).unwrap();
        assert_eq!(fits.len(), 512);
        assert!(Envelope::decode(&config, &fits).is_ok());
    }
}
