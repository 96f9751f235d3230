//! Blob commitments and the admissibility check run at the chosen square
//! size.

use crate::blob::Blob;
use crate::config::SquareConfig;
use crate::error::{Result, SquareError};
use crate::merkle::Blake3MerkleTree;
use crate::nmt::NamespaceMerkleTree;
use crate::share::sparse;
use crate::tx::CandidateCommitment;

pub type Commitment = [u8; 32];

/// Commitment over `blob` as laid out in a square of `square_size`.
///
/// The blob's shares are grouped into subtrees no wider than a row, each
/// subtree gets a namespaced root, and the Blake3 Merkle root over those
/// roots is the commitment.
pub fn create_commitment(
    config: &SquareConfig,
    blob: &Blob,
    square_size: usize,
) -> Result<Commitment> {
    let split = sparse::split(config, blob, square_size)?;
    let mut subtree_roots = Vec::with_capacity(split.subtree_widths.len());
    for subtree in split.subtrees() {
        let mut tree = NamespaceMerkleTree::new(config);
        for share in subtree {
            tree.push(&blob.namespace, share.as_bytes())?;
        }
        subtree_roots.push(tree.root()?.to_bytes());
    }
    Ok(Blake3MerkleTree::from_chunks(&subtree_roots).root_or_empty())
}

/// Accept `blob` at `square_size` only if one of the candidates signed for
/// that size matches the recomputed commitment.
pub fn verify(
    config: &SquareConfig,
    blob: &Blob,
    candidates: &[CandidateCommitment],
    square_size: usize,
) -> Result<()> {
    let mut at_size = candidates
        .iter()
        .filter(|c| c.square_size == square_size as u64)
        .peekable();
    if at_size.peek().is_some() {
        let expected = create_commitment(config, blob, square_size)?;
        if at_size.any(|c| c.commitment == expected) {
            return Ok(());
        }
    }
    Err(SquareError::CommitmentMismatch {
        square_size: square_size as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;

    fn config() -> SquareConfig {
        SquareConfig {
            share_size: 269,
            namespace_size: 8,
            max_square_size: 16,
            ..SquareConfig::default()
        }
    }

    fn blob(len: usize) -> Blob {
        let ns = Namespace::from_raw(&[2; 8], 8).unwrap();
        Blob::new(ns, (0..len).map(|i| i as u8).collect()).unwrap()
    }

    fn candidate(square_size: u64, commitment: Commitment) -> CandidateCommitment {
        CandidateCommitment {
            square_size,
            commitment,
            signature: Vec::new(),
        }
    }

    #[test]
    fn empty_blob_commits_to_empty_hash() {
        let config = config();
        let commitment = create_commitment(&config, &blob(0), 4).unwrap();
        assert_eq!(commitment, *blake3::hash(b"").as_bytes());
    }

    #[test]
    fn commitment_depends_on_square_size() {
        let config = config();
        // Nine shares: a single 8-wide subtree plus one at size 8, but
        // 4 + 4 + 1 at size 4.
        let blob = blob(256 + 8 * 260);
        let at_four = create_commitment(&config, &blob, 4).unwrap();
        let at_eight = create_commitment(&config, &blob, 8).unwrap();
        assert_ne!(at_four, at_eight);

        // Small blobs fit one subtree at every size.
        let small = self::blob(10);
        assert_eq!(
            create_commitment(&config, &small, 1).unwrap(),
            create_commitment(&config, &small, 16).unwrap()
        );
    }

    #[test]
    fn verify_requires_candidate_for_chosen_size() {
        let config = config();
        let blob = blob(700);
        let at_four = create_commitment(&config, &blob, 4).unwrap();

        assert!(verify(&config, &blob, &[candidate(4, at_four)], 4).is_ok());
        assert_eq!(
            verify(&config, &blob, &[candidate(4, at_four)], 8).unwrap_err(),
            SquareError::CommitmentMismatch { square_size: 8 }
        );
        let mut wrong = at_four;
        wrong[31] ^= 1;
        assert!(matches!(
            verify(&config, &blob, &[candidate(4, wrong)], 4),
            Err(SquareError::CommitmentMismatch { .. })
        ));
    }

    #[test]
    fn any_candidate_at_the_size_may_match() {
        let config = config();
        let blob = blob(700);
        let at_four = create_commitment(&config, &blob, 4).unwrap();
        let mut wrong = at_four;
        wrong[0] ^= 0xff;

        let candidates = [candidate(4, wrong), candidate(8, at_four), candidate(4, at_four)];
        assert!(verify(&config, &blob, &candidates, 4).is_ok());
        assert_eq!(
            verify(&config, &blob, &candidates[..2], 4).unwrap_err(),
            SquareError::CommitmentMismatch { square_size: 4 }
        );
    }
}
