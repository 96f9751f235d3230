//! The original data square and the message list that describes it.

use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::config::SquareConfig;
use crate::error::{Result, SquareError};
use crate::namespace::Namespace;
use crate::share::{compact, sparse, tail_padding_share, Share};

/// `size × size` shares in row-major order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Square {
    size: usize,
    shares: Vec<Share>,
}

impl Square {
    pub fn new(size: usize, shares: Vec<Share>) -> Result<Self> {
        if size == 0 || shares.len() != size * size {
            return Err(SquareError::InvalidShare("share count is not a square"));
        }
        Ok(Self { size, shares })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn into_shares(self) -> Vec<Share> {
        self.shares
    }

    pub fn row(&self, index: usize) -> &[Share] {
        &self.shares[index * self.size..(index + 1) * self.size]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Share]> + '_ {
        self.shares.chunks(self.size)
    }

    pub fn column(&self, index: usize) -> Vec<Share> {
        self.rows().map(|row| row[index].clone()).collect()
    }

    /// Decode the transaction list from the leading compact shares.
    pub fn transactions(&self, config: &SquareConfig) -> Result<Vec<Vec<u8>>> {
        let namespace = config.reserved().transaction;
        let end = self.compact_share_count(config, &namespace);
        compact::parse_compact_shares(config, &self.shares[..end])
    }

    /// Decode every blob after the compact shares.
    pub fn blobs(&self, config: &SquareConfig) -> Result<Vec<Blob>> {
        let namespace = config.reserved().transaction;
        let start = self.compact_share_count(config, &namespace);
        sparse::parse_sparse_shares(config, &self.shares[start..])
    }

    fn compact_share_count(&self, config: &SquareConfig, namespace: &Namespace) -> usize {
        self.shares
            .iter()
            .take_while(|share| share.as_bytes().starts_with(namespace.as_bytes()))
            .count()
    }
}

/// One entry of the message list handed back with the square.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub namespace: Namespace,
    #[serde(with = "crate::serde_hex::bytes")]
    pub data: Vec<u8>,
}

impl Message {
    /// Payload zero-padded to whole first-share content units. Empty stays
    /// empty.
    pub fn from_blob(config: &SquareConfig, blob: &Blob) -> Self {
        let unit = config.blob_pad_unit();
        let mut data = blob.data.clone();
        data.resize(data.len().div_ceil(unit) * unit, 0);
        Self {
            namespace: blob.namespace.clone(),
            data,
        }
    }
}

/// Where a blob's shares landed, as row-major indices into the square.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobPlacement {
    pub namespace: Namespace,
    /// Input position of the transaction that paid for the blob.
    pub tx_index: usize,
    pub start: usize,
    pub share_count: usize,
}

impl BlobPlacement {
    /// `(row, first column, last column exclusive)` for every row touched.
    pub fn row_spans(&self, square_size: usize) -> Vec<(usize, usize, usize)> {
        let mut spans = Vec::new();
        let mut index = self.start;
        let end = self.start + self.share_count;
        while index < end {
            let row = index / square_size;
            let col = index % square_size;
            let stop = end.min((row + 1) * square_size);
            spans.push((row, col, col + (stop - index)));
            index = stop;
        }
        spans
    }
}

/// Lay out compact shares, then each blob in the given order, then tail
/// padding. The caller has already sorted the blobs and checked they fit.
pub(crate) fn layout(
    config: &SquareConfig,
    size: usize,
    txs: &[Vec<u8>],
    blobs: &[(usize, &Blob)],
) -> Result<(Square, Vec<BlobPlacement>)> {
    let mut shares = compact::split_txs(config, txs)?;
    let mut placements = Vec::with_capacity(blobs.len());
    for (tx_index, blob) in blobs {
        let blob_shares = sparse::split_shares(config, blob)?;
        placements.push(BlobPlacement {
            namespace: blob.namespace.clone(),
            tx_index: *tx_index,
            start: shares.len(),
            share_count: blob_shares.len(),
        });
        shares.extend(blob_shares);
    }

    let capacity = size * size;
    if shares.len() > capacity {
        return Err(SquareError::NoFittingSquareSize {
            required: shares.len(),
            limit: capacity,
        });
    }
    let padding = tail_padding_share(config)?;
    shares.resize(capacity, padding);
    Ok((Square::new(size, shares)?, placements))
}
