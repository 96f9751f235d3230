//! Square geometry, namespace reservations and block limits.
//!
//! A [`SquareConfig`] is an immutable value threaded explicitly through every
//! entry point. It can be built in code or loaded from a TOML file, in which
//! case omitted fields take the defaults below.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SquareError};
use crate::namespace::{ReservedNamespaces, NAMESPACE_VERSION_SIZE};

pub const DEFAULT_SHARE_SIZE: usize = 512;
pub const DEFAULT_NAMESPACE_ID_SIZE: usize = 32;
pub const DEFAULT_NAMESPACE_SIZE: usize = NAMESPACE_VERSION_SIZE + DEFAULT_NAMESPACE_ID_SIZE;

/// Version and sequence-start flag.
pub const SHARE_INFO_BYTES: usize = 1;
/// Big-endian length carried by the first share of a sequence.
pub const SEQUENCE_LEN_BYTES: usize = 4;
/// Offset of the first unit starting inside a compact share.
pub const COMPACT_SHARE_RESERVED_BYTES: usize = 4;

pub const SHARE_VERSION_ZERO: u8 = 0;
pub const MAX_SHARE_VERSION: u8 = 127;
pub const SUPPORTED_SHARE_VERSIONS: &[u8] = &[SHARE_VERSION_ZERO];

pub const DEFAULT_MIN_SQUARE_SIZE: usize = 1;
// 128 * 128 shares * 512 bytes = 8 MiB
pub const DEFAULT_MAX_SQUARE_SIZE: usize = 128;
pub const DEFAULT_TRANSACTIONS_PER_BLOCK_LIMIT: usize = 5090;

/// GF(2^8) Reed–Solomon addresses at most 256 shards, i.e. one extended row.
pub const MAX_EXTENDED_SQUARE_WIDTH: usize = 256;

/// Which blob gives way first when the block would overflow.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicyKind {
    /// Evict the blob occupying the most shares.
    #[default]
    LargestFirst,
    /// Evict the blob submitted last.
    NewestFirst,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SquareConfig {
    pub share_size: usize,
    pub namespace_size: usize,
    pub min_square_size: usize,
    pub max_square_size: usize,
    pub transactions_per_block_limit: usize,
    pub share_version: u8,
    pub drop_policy: DropPolicyKind,
    /// Explicit reservations; derived from `namespace_size` when absent.
    pub reserved_namespaces: Option<ReservedNamespaces>,
}

impl Default for SquareConfig {
    fn default() -> Self {
        Self {
            share_size: DEFAULT_SHARE_SIZE,
            namespace_size: DEFAULT_NAMESPACE_SIZE,
            min_square_size: DEFAULT_MIN_SQUARE_SIZE,
            max_square_size: DEFAULT_MAX_SQUARE_SIZE,
            transactions_per_block_limit: DEFAULT_TRANSACTIONS_PER_BLOCK_LIMIT,
            share_version: SHARE_VERSION_ZERO,
            drop_policy: DropPolicyKind::default(),
            reserved_namespaces: None,
        }
    }
}

impl SquareConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: SquareConfig =
            toml::from_str(input).map_err(|e| SquareError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = fs::read_to_string(path)
            .map_err(|e| SquareError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace_size <= NAMESPACE_VERSION_SIZE {
            return Err(SquareError::InvalidConfig(
                "namespace_size must leave room for an id".into(),
            ));
        }
        let compact_overhead = self.namespace_size
            + SHARE_INFO_BYTES
            + SEQUENCE_LEN_BYTES
            + COMPACT_SHARE_RESERVED_BYTES;
        if self.share_size <= compact_overhead {
            return Err(SquareError::InvalidConfig(format!(
                "share_size {} leaves no room for data after {} header bytes",
                self.share_size, compact_overhead
            )));
        }
        for (name, size) in [
            ("min_square_size", self.min_square_size),
            ("max_square_size", self.max_square_size),
        ] {
            if !size.is_power_of_two() {
                return Err(SquareError::InvalidConfig(format!(
                    "{name} must be a power of two, got {size}"
                )));
            }
        }
        if self.min_square_size > self.max_square_size {
            return Err(SquareError::InvalidConfig(
                "min_square_size exceeds max_square_size".into(),
            ));
        }
        if self.max_square_size * 2 > MAX_EXTENDED_SQUARE_WIDTH {
            return Err(SquareError::InvalidConfig(format!(
                "max_square_size {} cannot be erasure coded over GF(2^8)",
                self.max_square_size
            )));
        }
        if self.transactions_per_block_limit == 0 {
            return Err(SquareError::InvalidConfig(
                "transactions_per_block_limit must be positive".into(),
            ));
        }
        if self.share_version > MAX_SHARE_VERSION
            || !SUPPORTED_SHARE_VERSIONS.contains(&self.share_version)
        {
            return Err(SquareError::InvalidConfig(format!(
                "unsupported share version {}",
                self.share_version
            )));
        }
        self.reserved().validate(self.namespace_size)
    }

    pub fn reserved(&self) -> ReservedNamespaces {
        self.reserved_namespaces
            .clone()
            .unwrap_or_else(|| ReservedNamespaces::derive(self.namespace_size))
    }

    pub fn first_sparse_content(&self) -> usize {
        self.share_size - self.namespace_size - SHARE_INFO_BYTES - SEQUENCE_LEN_BYTES
    }

    pub fn continuation_sparse_content(&self) -> usize {
        self.share_size - self.namespace_size - SHARE_INFO_BYTES
    }

    pub fn first_compact_content(&self) -> usize {
        self.first_sparse_content() - COMPACT_SHARE_RESERVED_BYTES
    }

    pub fn continuation_compact_content(&self) -> usize {
        self.continuation_sparse_content() - COMPACT_SHARE_RESERVED_BYTES
    }

    /// Unit that message-list data is zero-padded to.
    pub fn blob_pad_unit(&self) -> usize {
        self.first_sparse_content()
    }

    /// Upper bound on an encoded transaction: a full square of shares.
    pub fn max_tx_bytes(&self) -> u64 {
        (self.max_square_size * self.max_square_size * self.share_size) as u64
    }

    /// Powers of two from `min_square_size` to `max_square_size`, ascending.
    pub fn supported_square_sizes(&self) -> impl Iterator<Item = usize> {
        let max = self.max_square_size;
        std::iter::successors(Some(self.min_square_size), |size| size.checked_mul(2))
            .take_while(move |size| *size <= max)
    }

    pub fn is_supported_square_size(&self, size: u64) -> bool {
        self.supported_square_sizes().any(|s| s as u64 == size)
    }

    /// Smallest supported square holding `share_count` shares.
    pub fn square_size_for(&self, share_count: usize) -> Option<usize> {
        self.supported_square_sizes()
            .find(|size| size * size >= share_count)
    }

    pub fn max_share_count(&self) -> usize {
        self.max_square_size * self.max_square_size
    }
}
