//! Namespaced Merkle tree over sha256.
//!
//! Every node carries the minimum and maximum namespace of the leaves below
//! it, so a root commits to which namespaces a row contains and a range proof
//! shows a reader has every share of a namespace.
//!
//! The namespace size is a runtime value, so the tree stores namespaces as
//! [`Namespace`] rather than fixed arrays.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::SquareConfig;
use crate::error::{Result, SquareError};
use crate::namespace::Namespace;

pub const HASH_LEN: usize = 32;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// A tree node: namespace range plus digest.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacedHash {
    pub min: Namespace,
    pub max: Namespace,
    #[serde(with = "crate::serde_hex::array")]
    pub digest: [u8; HASH_LEN],
}

impl NamespacedHash {
    /// Root of a tree without leaves.
    pub fn empty(namespace_size: usize) -> Self {
        Self {
            min: Namespace::zero(namespace_size),
            max: Namespace::zero(namespace_size),
            digest: Sha256::digest(b"").into(),
        }
    }

    /// `min | max | digest`, the form hashed into parent nodes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.min.len() * 2 + HASH_LEN);
        out.extend_from_slice(self.min.as_bytes());
        out.extend_from_slice(self.max.as_bytes());
        out.extend_from_slice(&self.digest);
        out
    }

    pub fn contains(&self, namespace: &Namespace) -> bool {
        self.min <= *namespace && *namespace <= self.max
    }
}

impl std::fmt::Debug for NamespacedHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NamespacedHash({}..{}, {})",
            self.min,
            self.max,
            hex::encode(self.digest)
        )
    }
}

/// Leaf and node hashing rules, parameterised by the parity namespace.
#[derive(Clone, Debug)]
pub struct NmtHasher {
    namespace_size: usize,
    parity: Namespace,
}

impl NmtHasher {
    pub fn new(config: &SquareConfig) -> Self {
        Self {
            namespace_size: config.namespace_size,
            parity: config.reserved().parity,
        }
    }

    pub fn hash_leaf(&self, namespace: &Namespace, data: &[u8]) -> NamespacedHash {
        let mut hasher = Sha256::new();
        hasher.update([LEAF_PREFIX]);
        hasher.update(namespace.as_bytes());
        hasher.update(data);
        NamespacedHash {
            min: namespace.clone(),
            max: namespace.clone(),
            digest: hasher.finalize().into(),
        }
    }

    pub fn hash_nodes(
        &self,
        left: &NamespacedHash,
        right: &NamespacedHash,
    ) -> Result<NamespacedHash> {
        if left.max > right.min {
            return Err(SquareError::Merkle("children out of namespace order".into()));
        }
        // Parity shares on the right must not widen the range of real data.
        let max = if right.min == self.parity {
            left.max.clone()
        } else {
            right.max.clone().max(left.max.clone())
        };
        let mut hasher = Sha256::new();
        hasher.update([NODE_PREFIX]);
        hasher.update(left.to_bytes());
        hasher.update(right.to_bytes());
        Ok(NamespacedHash {
            min: left.min.clone(),
            max,
            digest: hasher.finalize().into(),
        })
    }

    pub fn empty_root(&self) -> NamespacedHash {
        NamespacedHash::empty(self.namespace_size)
    }

    /// Root over already-hashed leaves.
    fn subtree_root(&self, leaves: &[NamespacedHash]) -> Result<NamespacedHash> {
        match leaves.len() {
            0 => Ok(self.empty_root()),
            1 => Ok(leaves[0].clone()),
            n => {
                let k = split_point(n);
                let left = self.subtree_root(&leaves[..k])?;
                let right = self.subtree_root(&leaves[k..])?;
                self.hash_nodes(&left, &right)
            }
        }
    }
}

/// Largest power of two strictly below `n` (n >= 2).
fn split_point(n: usize) -> usize {
    1 << (usize::BITS - 1 - (n - 1).leading_zeros())
}

/// Append-only namespaced Merkle tree.
#[derive(Clone, Debug)]
pub struct NamespaceMerkleTree {
    hasher: NmtHasher,
    leaves: Vec<NamespacedHash>,
}

impl NamespaceMerkleTree {
    pub fn new(config: &SquareConfig) -> Self {
        Self {
            hasher: NmtHasher::new(config),
            leaves: Vec::new(),
        }
    }

    /// Add a leaf. Namespaces must be pushed in non-decreasing order.
    pub fn push(&mut self, namespace: &Namespace, data: &[u8]) -> Result<()> {
        if namespace.len() != self.hasher.namespace_size {
            return Err(SquareError::Namespace("invalid namespace size"));
        }
        if let Some(last) = self.leaves.last() {
            if *namespace < last.max {
                return Err(SquareError::Namespace("leaves pushed out of namespace order"));
            }
        }
        self.leaves.push(self.hasher.hash_leaf(namespace, data));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn hasher(&self) -> &NmtHasher {
        &self.hasher
    }

    pub fn root(&self) -> Result<NamespacedHash> {
        self.hasher.subtree_root(&self.leaves)
    }

    /// Proof that leaves `start..end` are in the tree.
    pub fn prove_range(&self, start: usize, end: usize) -> Result<RangeProof> {
        if start >= end || end > self.leaves.len() {
            return Err(SquareError::Merkle(format!(
                "invalid range {start}..{end} for {} leaves",
                self.leaves.len()
            )));
        }
        let mut nodes = Vec::new();
        self.collect_siblings(0, self.leaves.len(), start, end, &mut nodes)?;
        Ok(RangeProof {
            start,
            end,
            total: self.leaves.len(),
            nodes,
        })
    }

    fn collect_siblings(
        &self,
        lo: usize,
        hi: usize,
        start: usize,
        end: usize,
        out: &mut Vec<NamespacedHash>,
    ) -> Result<()> {
        if hi <= start || end <= lo {
            out.push(self.hasher.subtree_root(&self.leaves[lo..hi])?);
            return Ok(());
        }
        if start <= lo && hi <= end {
            return Ok(());
        }
        let k = lo + split_point(hi - lo);
        self.collect_siblings(lo, k, start, end, out)?;
        self.collect_siblings(k, hi, start, end, out)
    }
}

/// Sibling subtree roots, left to right, needed to rebuild the root from
/// leaves `start..end`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeProof {
    pub start: usize,
    pub end: usize,
    pub total: usize,
    pub nodes: Vec<NamespacedHash>,
}

impl RangeProof {
    /// Check `leaves` (hashed with `hasher`) sit at `start..end` under `root`.
    pub fn verify_range(
        &self,
        hasher: &NmtHasher,
        root: &NamespacedHash,
        leaves: &[NamespacedHash],
    ) -> bool {
        if self.start >= self.end
            || self.end > self.total
            || leaves.len() != self.end - self.start
        {
            return false;
        }
        let mut nodes = self.nodes.iter();
        let rebuilt = self.rebuild(hasher, 0, self.total, leaves, &mut nodes);
        match rebuilt {
            Ok(computed) => nodes.next().is_none() && computed == *root,
            Err(_) => false,
        }
    }

    fn rebuild(
        &self,
        hasher: &NmtHasher,
        lo: usize,
        hi: usize,
        leaves: &[NamespacedHash],
        nodes: &mut std::slice::Iter<'_, NamespacedHash>,
    ) -> Result<NamespacedHash> {
        if hi <= self.start || self.end <= lo {
            return nodes
                .next()
                .cloned()
                .ok_or_else(|| SquareError::Merkle("range proof too short".into()));
        }
        if self.start <= lo && hi <= self.end {
            return hasher.subtree_root(&leaves[lo - self.start..hi - self.start]);
        }
        let k = lo + split_point(hi - lo);
        let left = self.rebuild(hasher, lo, k, leaves, nodes)?;
        let right = self.rebuild(hasher, k, hi, leaves, nodes)?;
        hasher.hash_nodes(&left, &right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SquareConfig {
        SquareConfig {
            share_size: 269,
            namespace_size: 8,
            ..SquareConfig::default()
        }
    }

    fn ns(byte: u8) -> Namespace {
        Namespace::from_raw(&[byte; 8], 8).unwrap()
    }

    fn tree_with(namespaces: &[u8]) -> NamespaceMerkleTree {
        let mut tree = NamespaceMerkleTree::new(&config());
        for (i, byte) in namespaces.iter().enumerate() {
            tree.push(&ns(*byte), &[i as u8; 16]).unwrap();
        }
        tree
    }

    #[test]
    fn empty_root_is_hash_of_nothing() {
        let tree = NamespaceMerkleTree::new(&config());
        let root = tree.root().unwrap();
        assert_eq!(root.min, Namespace::zero(8));
        assert_eq!(
            hex::encode(root.digest),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn root_tracks_namespace_range() {
        let tree = tree_with(&[1, 1, 2, 5, 7]);
        let root = tree.root().unwrap();
        assert_eq!(root.min, ns(1));
        assert_eq!(root.max, ns(7));
        assert!(root.contains(&ns(3)));
        assert!(!root.contains(&ns(8)));
    }

    #[test]
    fn parity_leaves_do_not_raise_max() {
        let tree = tree_with(&[1, 2, 0xff, 0xff]);
        let root = tree.root().unwrap();
        assert_eq!(root.min, ns(1));
        assert_eq!(root.max, ns(2));
    }

    #[test]
    fn rejects_unordered_push() {
        let mut tree = tree_with(&[4]);
        let err = tree.push(&ns(3), b"x").unwrap_err();
        assert!(matches!(err, SquareError::Namespace(_)));
        assert!(tree.push(&ns(4), b"y").is_ok());
    }

    #[test]
    fn range_proofs_verify_for_every_range() {
        let tree = tree_with(&[1, 1, 2, 3, 3, 3, 4]);
        let root = tree.root().unwrap();
        for start in 0..tree.len() {
            for end in start + 1..=tree.len() {
                let proof = tree.prove_range(start, end).unwrap();
                let leaves = tree.leaves[start..end].to_vec();
                assert!(proof.verify_range(tree.hasher(), &root, &leaves), "{start}..{end}");
            }
        }
    }

    #[test]
    fn tampered_leaf_fails_verification() {
        let tree = tree_with(&[1, 2, 3, 4]);
        let root = tree.root().unwrap();
        let proof = tree.prove_range(1, 3).unwrap();
        let mut leaves = tree.leaves[1..3].to_vec();
        leaves[0] = tree.hasher().hash_leaf(&ns(2), b"forged");
        assert!(!proof.verify_range(tree.hasher(), &root, &leaves));
        assert!(tree.prove_range(2, 2).is_err());
        assert!(tree.prove_range(0, 5).is_err());
    }
}
