//! Client side construction of blob transactions.
//!
//! The sender does not know which square size the producer will pick, so it
//! commits and signs once per supported size.

use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};

use crate::blob::Blob;
use crate::commitment::{create_commitment, Commitment};
use crate::config::SquareConfig;
use crate::error::Result;
use crate::namespace::Namespace;
use crate::tx::{CandidateCommitment, Envelope, WirePayForBlob};

pub const SIGN_DOMAIN: &[u8] = b"datasquare/pay-for-blob/v0";

/// Signs candidate commitments. Signatures are carried but never checked
/// by the square primitives.
pub trait CommitmentSigner {
    fn sign_commitment(&self, message: &[u8; 32]) -> Vec<u8>;
}

impl CommitmentSigner for SigningKey {
    fn sign_commitment(&self, message: &[u8; 32]) -> Vec<u8> {
        self.sign(message).to_bytes().to_vec()
    }
}

/// Digest signed for one candidate commitment.
pub fn commitment_sign_bytes(
    namespace: &Namespace,
    declared_length: u32,
    square_size: u64,
    commitment: &Commitment,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(SIGN_DOMAIN);
    hasher.update(namespace.as_bytes());
    hasher.update(declared_length.to_be_bytes());
    hasher.update(square_size.to_be_bytes());
    hasher.update(commitment);
    hasher.finalize().into()
}

impl WirePayForBlob {
    /// Commit to `blob` at every supported square size and sign each
    /// commitment.
    pub fn build(
        config: &SquareConfig,
        blob: &Blob,
        signer: &impl CommitmentSigner,
    ) -> Result<Self> {
        let commitments = config
            .supported_square_sizes()
            .map(|square_size| {
                let commitment = create_commitment(config, blob, square_size)?;
                let message = commitment_sign_bytes(
                    &blob.namespace,
                    blob.declared_length,
                    square_size as u64,
                    &commitment,
                );
                Ok(CandidateCommitment {
                    square_size: square_size as u64,
                    commitment,
                    signature: signer.sign_commitment(&message),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            namespace: blob.namespace.as_bytes().to_vec(),
            declared_length: blob.declared_length,
            blob: blob.data.clone(),
            commitments,
        })
    }

    /// Encode as a raw transaction.
    pub fn into_raw(self, config: &SquareConfig) -> Result<Vec<u8>> {
        Envelope::WirePayForBlob(self).encode(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment;
    use crate::tx::{extract, ParsedTx};
    use ed25519_dalek::{Signature, Verifier};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> SquareConfig {
        SquareConfig {
            share_size: 269,
            namespace_size: 8,
            max_square_size: 16,
            ..SquareConfig::default()
        }
    }

    #[test]
    fn builds_one_signed_candidate_per_size() {
        let config = config();
        let sk = SigningKey::generate(&mut StdRng::seed_from_u64(1));
        let blob = Blob::new(Namespace::from_raw(&[4; 8], 8).unwrap(), vec![3; 900]).unwrap();

        let wire = WirePayForBlob::build(&config, &blob, &sk).unwrap();
        let sizes: Vec<u64> = wire.commitments.iter().map(|c| c.square_size).collect();
        assert_eq!(sizes, vec![1, 2, 4, 8, 16]);

        for candidate in &wire.commitments {
            let message = commitment_sign_bytes(
                &blob.namespace,
                900,
                candidate.square_size,
                &candidate.commitment,
            );
            let signature = Signature::from_slice(&candidate.signature).unwrap();
            assert!(sk.verifying_key().verify(&message, &signature).is_ok());
        }

        let raw = wire.into_raw(&config).unwrap();
        let ParsedTx::Blob(tx) = extract(&config, &raw).unwrap() else {
            panic!("expected blob transaction");
        };
        for size in config.supported_square_sizes() {
            commitment::verify(&config, &tx.blob, &tx.candidates, size).unwrap();
        }
    }
}
