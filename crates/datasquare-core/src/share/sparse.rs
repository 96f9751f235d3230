//! Sparse shares: one blob per share sequence.

use crate::blob::Blob;
use crate::config::SquareConfig;
use crate::error::{Result, SquareError};
use crate::namespace::Namespace;
use crate::share::{shares_needed, InfoByte, Share, ShareReader, ShareWriter};

/// A blob's shares together with the subtree grouping used for its
/// commitment at one square size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitBlob {
    pub shares: Vec<Share>,
    pub subtree_widths: Vec<usize>,
}

impl SplitBlob {
    /// Consecutive share groups, one per commitment subtree.
    pub fn subtrees(&self) -> impl Iterator<Item = &[Share]> + '_ {
        let mut cursor = 0;
        self.subtree_widths.iter().map(move |width| {
            let group = &self.shares[cursor..cursor + width];
            cursor += width;
            group
        })
    }
}

/// Split `blob` into shares and group them for a square of `square_size`.
///
/// The shares themselves do not depend on the square size. The grouping
/// does, because a row holds at most `square_size` of them.
pub fn split(config: &SquareConfig, blob: &Blob, square_size: usize) -> Result<SplitBlob> {
    if !config.is_supported_square_size(square_size as u64) {
        return Err(SquareError::InvalidConfig(format!(
            "unsupported square size {square_size}"
        )));
    }
    let shares = split_shares(config, blob)?;
    let subtree_widths = subtree_widths(shares.len(), square_size);
    Ok(SplitBlob {
        shares,
        subtree_widths,
    })
}

/// Encode `blob` as a sparse share sequence. Empty blobs produce no shares.
pub fn split_shares(config: &SquareConfig, blob: &Blob) -> Result<Vec<Share>> {
    let data = blob.data.as_slice();
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let mut shares = Vec::with_capacity(share_count(config, data.len()));

    let (head, tail) = data.split_at(data.len().min(config.first_sparse_content()));
    let mut first = ShareWriter::new(
        config,
        &blob.namespace,
        InfoByte::new(config.share_version, true)?,
    );
    first.put_u32(blob.declared_length);
    first.put(head);
    shares.push(first.finish());

    let continuation_info = InfoByte::new(config.share_version, false)?;
    for chunk in tail.chunks(config.continuation_sparse_content()) {
        let mut writer = ShareWriter::new(config, &blob.namespace, continuation_info);
        writer.put(chunk);
        shares.push(writer.finish());
    }
    Ok(shares)
}

/// Number of sparse shares a blob of `len` bytes occupies.
pub fn share_count(config: &SquareConfig, len: usize) -> usize {
    shares_needed(
        len,
        config.first_sparse_content(),
        config.continuation_sparse_content(),
    )
}

/// Subtree widths for `share_count` shares in a square of `square_size`:
/// full rows first, then descending powers of two.
pub fn subtree_widths(mut share_count: usize, square_size: usize) -> Vec<usize> {
    let mut widths = Vec::new();
    while share_count != 0 {
        let width = if share_count >= square_size {
            square_size
        } else {
            prev_power_of_two(share_count)
        };
        widths.push(width);
        share_count -= width;
    }
    widths
}

fn prev_power_of_two(n: usize) -> usize {
    1 << (usize::BITS - 1 - n.leading_zeros())
}

/// Decode the single blob stored in `shares` under `namespace`.
///
/// An empty share list decodes to the empty blob, matching what
/// [`split_shares`] produces for one.
pub fn join(config: &SquareConfig, namespace: &Namespace, shares: &[Share]) -> Result<Blob> {
    let Some((first, rest)) = shares.split_first() else {
        return Blob::new(namespace.clone(), Vec::new());
    };

    let mut reader = ShareReader::new(config, first)?;
    if reader.namespace != *namespace {
        return Err(SquareError::InvalidShare("share namespace differs from blob"));
    }
    if !reader.info.is_sequence_start() {
        return Err(SquareError::InvalidShare("sequence does not start at first share"));
    }
    let declared = reader.read_u32();
    let mut data = Vec::with_capacity(declared as usize);
    data.extend_from_slice(reader.rest());

    for share in rest {
        let reader = ShareReader::new(config, share)?;
        if reader.namespace != *namespace {
            return Err(SquareError::InvalidShare("share namespace differs from blob"));
        }
        if reader.info.is_sequence_start() {
            return Err(SquareError::InvalidShare("unexpected sequence start"));
        }
        data.extend_from_slice(reader.rest());
    }

    if declared as usize > data.len() {
        return Err(SquareError::DecodeOverflow {
            declared: declared as usize,
            available: data.len(),
        });
    }
    data.truncate(declared as usize);
    Blob::with_declared_length(namespace.clone(), data, declared)
}

/// Decode consecutive blob sequences, skipping padding shares.
pub fn parse_sparse_shares(config: &SquareConfig, shares: &[Share]) -> Result<Vec<Blob>> {
    let reserved = config.reserved();
    let mut blobs = Vec::new();
    let mut cursor = 0;
    while cursor < shares.len() {
        let mut reader = ShareReader::new(config, &shares[cursor])?;
        if reader.namespace == reserved.tail_padding {
            cursor += 1;
            continue;
        }
        if !reader.info.is_sequence_start() {
            return Err(SquareError::InvalidShare("continuation share without sequence start"));
        }
        let declared = reader.read_u32() as usize;
        let needed = share_count(config, declared).max(1);
        let available = shares.len() - cursor;
        if needed > available {
            return Err(SquareError::DecodeOverflow {
                declared,
                available: content_capacity(config, available),
            });
        }
        let namespace = reader.namespace.clone();
        blobs.push(join(config, &namespace, &shares[cursor..cursor + needed])?);
        cursor += needed;
    }
    Ok(blobs)
}

fn content_capacity(config: &SquareConfig, share_count: usize) -> usize {
    match share_count {
        0 => 0,
        n => config.first_sparse_content() + (n - 1) * config.continuation_sparse_content(),
    }
}
