//! Data availability header: namespaced roots of every row and column of the
//! extended square, and proofs that shares sit under a data root.

use serde::{Deserialize, Serialize};

use crate::config::SquareConfig;
use crate::erasure::ExtendedSquare;
use crate::error::{Result, SquareError};
use crate::merkle::{Blake3MerkleTree, Blake3Proof};
use crate::namespace::Namespace;
use crate::nmt::{NamespaceMerkleTree, NamespacedHash, NmtHasher, RangeProof};
use crate::share::Share;
use crate::square::BlobPlacement;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAvailabilityHeader {
    pub row_roots: Vec<NamespacedHash>,
    pub column_roots: Vec<NamespacedHash>,
}

impl DataAvailabilityHeader {
    #[tracing::instrument(skip_all, fields(width = eds.width()))]
    pub fn from_extended(config: &SquareConfig, eds: &ExtendedSquare) -> Result<Self> {
        let width = eds.width();
        let row_roots = (0..width)
            .map(|row| line_tree(config, eds, (0..width).map(|col| (row, col)))?.root())
            .collect::<Result<Vec<_>>>()?;
        let column_roots = (0..width)
            .map(|col| line_tree(config, eds, (0..width).map(|row| (row, col)))?.root())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            row_roots,
            column_roots,
        })
    }

    /// Blake3 Merkle root over row roots followed by column roots.
    pub fn hash(&self) -> [u8; 32] {
        self.tree().root_or_empty()
    }

    fn tree(&self) -> Blake3MerkleTree {
        let chunks: Vec<Vec<u8>> = self
            .row_roots
            .iter()
            .chain(&self.column_roots)
            .map(NamespacedHash::to_bytes)
            .collect();
        Blake3MerkleTree::from_chunks(&chunks)
    }

    /// Proof that `row`'s root is committed to by [`Self::hash`].
    pub fn row_root_proof(&self, row: usize) -> Result<Blake3Proof> {
        self.tree().proof(&[row])
    }

    /// Range proofs for every row a blob touches.
    pub fn prove_blob(
        &self,
        config: &SquareConfig,
        eds: &ExtendedSquare,
        placement: &BlobPlacement,
    ) -> Result<Vec<RowProof>> {
        let width = eds.width();
        placement
            .row_spans(eds.original_size())
            .into_iter()
            .map(|(row, start, end)| {
                let tree = line_tree(config, eds, (0..width).map(|col| (row, col)))?;
                Ok(RowProof {
                    row,
                    row_root: self.row_roots[row].clone(),
                    shares: tree.prove_range(start, end)?,
                    row_root_proof: self.row_root_proof(row)?,
                })
            })
            .collect()
    }
}

/// Shares `shares.start..shares.end` of one row, plus the path from the row
/// root to the data root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowProof {
    pub row: usize,
    pub row_root: NamespacedHash,
    pub shares: RangeProof,
    pub row_root_proof: Blake3Proof,
}

impl RowProof {
    pub fn share_count(&self) -> usize {
        self.shares.end - self.shares.start
    }
}

/// Check that `shares`, split across `proofs` in order, are in the square
/// committed to by `data_root`.
pub fn verify_shares(
    config: &SquareConfig,
    data_root: [u8; 32],
    shares: &[Share],
    proofs: &[RowProof],
) -> bool {
    let hasher = NmtHasher::new(config);
    let expected: usize = proofs.iter().map(RowProof::share_count).sum();
    if expected != shares.len() {
        return false;
    }
    let mut rest = shares;
    for proof in proofs {
        let (chunk, tail) = rest.split_at(proof.share_count());
        rest = tail;

        let Ok(leaves) = chunk
            .iter()
            .map(|share| Ok(hasher.hash_leaf(&share.namespace(config)?, share.as_bytes())))
            .collect::<Result<Vec<NamespacedHash>>>()
        else {
            return false;
        };
        if !proof.shares.verify_range(&hasher, &proof.row_root, &leaves) {
            return false;
        }

        let leaf: [u8; 32] = blake3::hash(&proof.row_root.to_bytes()).into();
        if proof.row_root_proof.leaf_indices() != [proof.row]
            || proof.row_root_proof.leaf_hashes() != [leaf]
            || !proof.row_root_proof.verify(data_root)
        {
            return false;
        }
    }
    true
}

/// Namespaced tree over one row or column. Original-quadrant shares keep
/// their namespace, all others are parity.
fn line_tree(
    config: &SquareConfig,
    eds: &ExtendedSquare,
    cells: impl Iterator<Item = (usize, usize)>,
) -> Result<NamespaceMerkleTree> {
    let parity = config.reserved().parity;
    let mut tree = NamespaceMerkleTree::new(config);
    for (row, col) in cells {
        let share = eds.share(row, col);
        let namespace = if eds.is_original(row, col) {
            let raw = share
                .get(..config.namespace_size)
                .ok_or(SquareError::InvalidShare("share shorter than a namespace"))?;
            Namespace::from_raw(raw, config.namespace_size)?
        } else {
            parity.clone()
        };
        tree.push(&namespace, share)?;
    }
    Ok(tree)
}
