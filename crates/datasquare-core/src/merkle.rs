//! Binary Merkle commitments over Blake3: subtree roots into a blob
//! commitment, row and column roots into the data root.

use rs_merkle::{Hasher, MerkleProof, MerkleTree};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SquareError};

/// `rs_merkle` node hasher.
#[derive(Debug, Clone, Copy)]
pub struct Blake3;

impl Hasher for Blake3 {
    type Hash = [u8; 32];

    fn hash(data: &[u8]) -> Self::Hash {
        *blake3::hash(data).as_bytes()
    }
}

#[derive(Clone, Debug)]
pub struct Blake3MerkleTree {
    leaves: Vec<[u8; 32]>,
    root: Option<[u8; 32]>,
}

impl Blake3MerkleTree {
    /// Leaves are already digests and go in as is.
    pub fn from_leaves(leaves: Vec<[u8; 32]>) -> Self {
        let root = MerkleTree::<Blake3>::from_leaves(&leaves).root();
        Self { leaves, root }
    }

    /// Leaf `i` is `blake3(items[i])`.
    pub fn from_chunks<T: AsRef<[u8]>>(items: &[T]) -> Self {
        Self::from_leaves(
            items
                .iter()
                .map(|item| *blake3::hash(item.as_ref()).as_bytes())
                .collect(),
        )
    }

    pub fn root(&self) -> Option<[u8; 32]> {
        self.root
    }

    /// The root, or `blake3("")` for a tree without leaves.
    pub fn root_or_empty(&self) -> [u8; 32] {
        self.root.unwrap_or_else(|| blake3::hash(b"").into())
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Multi-leaf proof. Indices are sorted and deduplicated.
    pub fn proof(&self, indices: &[usize]) -> Result<Blake3Proof> {
        if indices.is_empty() || indices.iter().any(|&idx| idx >= self.leaves.len()) {
            return Err(SquareError::Merkle("leaf index out of range".into()));
        }
        let mut leaf_indices = indices.to_vec();
        leaf_indices.sort_unstable();
        leaf_indices.dedup();
        let tree = MerkleTree::<Blake3>::from_leaves(&self.leaves);
        Ok(Blake3Proof {
            proof: tree.proof(&leaf_indices).to_bytes(),
            leaf_hashes: leaf_indices.iter().map(|i| self.leaves[*i]).collect(),
            leaf_indices,
            total_leaves: self.leaves.len(),
        })
    }
}

/// Self-contained inclusion proof: the covered leaf hashes travel with it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blake3Proof {
    #[serde(with = "crate::serde_hex::bytes")]
    proof: Vec<u8>,
    leaf_indices: Vec<usize>,
    leaf_hashes: Vec<[u8; 32]>,
    total_leaves: usize,
}

impl Blake3Proof {
    pub fn leaf_indices(&self) -> &[usize] {
        &self.leaf_indices
    }

    pub fn leaf_hashes(&self) -> &[[u8; 32]] {
        &self.leaf_hashes
    }

    /// Check the proof against `root`.
    pub fn verify(&self, root: [u8; 32]) -> bool {
        match MerkleProof::<Blake3>::from_bytes(&self.proof) {
            Ok(proof) => proof.verify(
                root,
                &self.leaf_indices,
                &self.leaf_hashes,
                self.total_leaves,
            ),
            Err(_) => false,
        }
    }
}
