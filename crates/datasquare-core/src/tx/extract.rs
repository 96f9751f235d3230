use sha2::{Digest, Sha256};

use crate::blob::Blob;
use crate::config::SquareConfig;
use crate::error::{Result, SquareError};
use crate::namespace::Namespace;
use crate::tx::{CandidateCommitment, Envelope, PayForBlob, WirePayForBlob};

/// A blob transaction split into the blob and the compact-share form of the
/// transaction that pays for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobTx {
    pub blob: Blob,
    pub candidates: Vec<CandidateCommitment>,
    /// Encoded [`PayForBlob`] envelope.
    pub rewritten: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedTx {
    Plain(Vec<u8>),
    Blob(BlobTx),
}

impl ParsedTx {
    /// Bytes this transaction contributes to the compact shares.
    pub fn included_bytes(&self) -> &[u8] {
        match self {
            ParsedTx::Plain(raw) => raw,
            ParsedTx::Blob(tx) => &tx.rewritten,
        }
    }

    pub fn blob(&self) -> Option<&BlobTx> {
        match self {
            ParsedTx::Plain(_) => None,
            ParsedTx::Blob(tx) => Some(tx),
        }
    }
}

/// Parse one raw transaction.
///
/// Plain transactions come back byte for byte. Blob transactions are checked
/// and rewritten. Every failure is a [`SquareError::MalformedTransaction`].
pub fn extract(config: &SquareConfig, raw: &[u8]) -> Result<ParsedTx> {
    match Envelope::decode(config, raw)? {
        Envelope::Plain(_) => Ok(ParsedTx::Plain(raw.to_vec())),
        Envelope::WirePayForBlob(wire) => extract_blob(config, wire).map(ParsedTx::Blob),
        Envelope::PayForBlob(_) => Err(SquareError::MalformedTransaction(
            "pay-for-blob submitted without its blob".into(),
        )),
    }
}

fn extract_blob(config: &SquareConfig, wire: WirePayForBlob) -> Result<BlobTx> {
    let WirePayForBlob {
        namespace,
        declared_length,
        blob,
        commitments,
    } = wire;

    let ns = Namespace::from_raw(&namespace, config.namespace_size)
        .map_err(|e| SquareError::MalformedTransaction(e.to_string()))?;
    if config.reserved().is_reserved(&ns) {
        return Err(SquareError::MalformedTransaction(format!(
            "namespace {ns} is reserved"
        )));
    }
    if commitments.is_empty() {
        return Err(SquareError::MalformedTransaction(
            "blob transaction carries no candidate commitments".into(),
        ));
    }

    let blob_hash: [u8; 32] = Sha256::digest(&blob).into();
    let blob = Blob::with_declared_length(ns, blob, declared_length)?;
    let rewritten = Envelope::PayForBlob(PayForBlob {
        namespace,
        declared_length,
        blob_hash,
        commitments: commitments.clone(),
    })
    .encode(config)?;

    Ok(BlobTx {
        blob,
        candidates: commitments,
        rewritten,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SquareConfig {
        SquareConfig {
            share_size: 269,
            namespace_size: 8,
            max_square_size: 16,
            ..SquareConfig::default()
        }
    }

    fn candidate() -> CandidateCommitment {
        CandidateCommitment {
            square_size: 1,
            commitment: [9; 32],
            signature: vec![1; 64],
        }
    }

    fn wire(namespace: Vec<u8>, blob: Vec<u8>, declared_length: u32) -> Vec<u8> {
        Envelope::WirePayForBlob(WirePayForBlob {
            namespace,
            declared_length,
            blob,
            commitments: vec![candidate()],
        })
        .encode(&config())
        .unwrap()
    }

    #[test]
    fn plain_transaction_passes_through_unchanged() {
        let config = config();
        let raw = Envelope::Plain(b"transfer".to_vec()).encode(&config).unwrap();
        let parsed = extract(&config, &raw).unwrap();
        assert_eq!(parsed, ParsedTx::Plain(raw.clone()));
        assert_eq!(parsed.included_bytes(), raw.as_slice());
        assert!(parsed.blob().is_none());
    }

    #[test]
    fn blob_transaction_is_rewritten_without_payload() {
        let config = config();
        let payload = vec![0x42; 1000];
        let raw = wire(vec![5; 8], payload.clone(), 1000);
        let ParsedTx::Blob(tx) = extract(&config, &raw).unwrap() else {
            panic!("expected blob transaction");
        };
        assert_eq!(tx.blob.data, payload);
        assert_eq!(tx.blob.namespace.as_bytes(), &[5; 8]);
        assert_eq!(tx.candidates, vec![candidate()]);
        assert!(tx.rewritten.len() < 300);

        let Envelope::PayForBlob(pfb) = Envelope::decode(&config, &tx.rewritten).unwrap() else {
            panic!("expected rewritten form");
        };
        assert_eq!(pfb.blob_hash, <[u8; 32]>::from(Sha256::digest(&payload)));
        assert_eq!(pfb.declared_length, 1000);
    }

    #[test]
    fn rejects_bad_blob_transactions() {
        let config = config();
        let reserved = config.reserved();
        let cases = [
            wire(reserved.transaction.as_bytes().to_vec(), vec![1], 1),
            wire(reserved.tail_padding.as_bytes().to_vec(), vec![1], 1),
            wire(vec![5; 7], vec![1], 1),
            wire(vec![5; 8], vec![1, 2], 3),
            Envelope::WirePayForBlob(WirePayForBlob {
                namespace: vec![5; 8],
                declared_length: 1,
                blob: vec![1],
                commitments: Vec::new(),
            })
            .encode(&config)
            .unwrap(),
            Envelope::PayForBlob(PayForBlob {
                namespace: vec![5; 8],
                declared_length: 1,
                blob_hash: [0; 32],
                commitments: vec![candidate()],
            })
            .encode(&config)
            .unwrap(),
            vec![0xff, 0x00],
        ];
        for raw in cases {
            assert!(matches!(
                extract(&config, &raw),
                Err(SquareError::MalformedTransaction(_))
            ));
        }
    }
}
