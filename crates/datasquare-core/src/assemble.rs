//! Square sizing, blob eviction and the commitment gate.

#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::commitment;
use crate::config::{DropPolicyKind, SquareConfig};
use crate::error::{Result, SquareError};
use crate::share::{compact, sparse};
use crate::square::{layout, BlobPlacement, Message, Square};
use crate::tx::{BlobTx, ParsedTx};

/// A blob transaction still in the running for the block.
#[derive(Clone, Debug)]
pub struct PendingBlob {
    /// Position in the submitted transaction list.
    pub index: usize,
    pub tx: BlobTx,
    pub share_count: usize,
}

/// Picks which blob leaves the block when the content overflows the largest
/// square.
pub trait DropPolicy: Send + Sync {
    /// Index into `blobs` (never empty, in submission order) of the victim.
    fn select_victim(&self, blobs: &[PendingBlob]) -> usize;
}

/// Evict the blob taking the most shares; the later transaction on ties.
#[derive(Clone, Copy, Debug, Default)]
pub struct LargestFirst;

impl DropPolicy for LargestFirst {
    fn select_victim(&self, blobs: &[PendingBlob]) -> usize {
        blobs
            .iter()
            .enumerate()
            .max_by_key(|(_, blob)| (blob.share_count, blob.index))
            .map(|(position, _)| position)
            .unwrap_or(0)
    }
}

/// Evict the most recently submitted blob.
#[derive(Clone, Copy, Debug, Default)]
pub struct NewestFirst;

impl DropPolicy for NewestFirst {
    fn select_victim(&self, blobs: &[PendingBlob]) -> usize {
        blobs.len().saturating_sub(1)
    }
}

impl From<DropPolicyKind> for Box<dyn DropPolicy> {
    fn from(kind: DropPolicyKind) -> Self {
        match kind {
            DropPolicyKind::LargestFirst => Box::new(LargestFirst),
            DropPolicyKind::NewestFirst => Box::new(NewestFirst),
        }
    }
}

/// A transaction left out of the block, and why.
#[derive(Clone, Debug, PartialEq)]
pub struct Rejection {
    pub index: usize,
    pub error: SquareError,
}

/// Everything block preparation hands back.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedSquare {
    pub square: Square,
    pub square_size: usize,
    /// Surviving transactions in submission order, blob transactions in
    /// their rewritten form.
    pub included_txs: Vec<Vec<u8>>,
    /// Blob messages in the order they sit in the square.
    pub messages: Vec<Message>,
    pub placements: Vec<BlobPlacement>,
    /// Sorted by transaction index.
    pub rejected: Vec<Rejection>,
}

pub struct SquareAssembler<'a> {
    config: &'a SquareConfig,
    policy: Box<dyn DropPolicy>,
}

impl<'a> SquareAssembler<'a> {
    /// Assembler using the drop policy named in `config`.
    pub fn new(config: &'a SquareConfig) -> Self {
        Self::with_policy(config, config.drop_policy.into())
    }

    pub fn with_policy(config: &'a SquareConfig, policy: Box<dyn DropPolicy>) -> Self {
        Self { config, policy }
    }

    /// Size the square, evict and verify blobs until stable, then lay it out.
    ///
    /// `txs` are parsed transactions tagged with their submission index, in
    /// submission order. `rejected` carries rejections made before assembly.
    #[tracing::instrument(skip_all, fields(txs = txs.len()))]
    pub fn assemble(
        &self,
        txs: Vec<(usize, ParsedTx)>,
        mut rejected: Vec<Rejection>,
    ) -> Result<PreparedSquare> {
        let config = self.config;
        let mut plain = Vec::new();
        let mut pending = Vec::new();
        for (index, tx) in txs {
            match tx {
                ParsedTx::Plain(raw) => plain.push((index, raw)),
                ParsedTx::Blob(tx) => pending.push(PendingBlob {
                    index,
                    share_count: sparse::share_count(config, tx.blob.len()),
                    tx,
                }),
            }
        }

        let limit = config.max_share_count();
        let rounds = pending.len() + 1;
        let mut required = 0;
        for round in 0..rounds {
            let included = merge_included(&plain, &pending);
            let compact_shares = compact::share_count(config, &included);
            let sparse_shares: usize = pending.iter().map(|blob| blob.share_count).sum();
            required = compact_shares + sparse_shares;

            let Some(size) = config.square_size_for(required) else {
                if pending.is_empty() {
                    tracing::warn!(required, limit, "transactions alone overflow the square");
                    return Err(SquareError::NoFittingSquareSize { required, limit });
                }
                let position = self.policy.select_victim(&pending).min(pending.len() - 1);
                let victim = pending.remove(position);
                reject(
                    &mut rejected,
                    victim.index,
                    SquareError::NoFittingSquareSize { required, limit },
                );
                continue;
            };
            tracing::debug!(round, required, size, blobs = pending.len(), "trying square size");

            let verdicts = verify_all(config, &pending, size);
            let before = pending.len();
            let mut kept = Vec::with_capacity(before);
            for (blob, verdict) in pending.into_iter().zip(verdicts) {
                match verdict {
                    Ok(()) => kept.push(blob),
                    Err(error) => reject(&mut rejected, blob.index, error),
                }
            }
            pending = kept;
            if pending.len() != before {
                continue;
            }

            rejected.sort_by_key(|rejection| rejection.index);
            return finish(config, size, included, pending, rejected);
        }

        Err(SquareError::NoFittingSquareSize { required, limit })
    }
}

fn reject(rejected: &mut Vec<Rejection>, index: usize, error: SquareError) {
    tracing::warn!(index, %error, "transaction rejected");
    rejected.push(Rejection { index, error });
}

/// Surviving transactions in submission order.
fn merge_included(plain: &[(usize, Vec<u8>)], pending: &[PendingBlob]) -> Vec<Vec<u8>> {
    let mut tagged: Vec<(usize, &[u8])> = plain
        .iter()
        .map(|(index, raw)| (*index, raw.as_slice()))
        .chain(
            pending
                .iter()
                .map(|blob| (blob.index, blob.tx.rewritten.as_slice())),
        )
        .collect();
    tagged.sort_by_key(|(index, _)| *index);
    tagged.into_iter().map(|(_, raw)| raw.to_vec()).collect()
}

fn verify_all(config: &SquareConfig, pending: &[PendingBlob], size: usize) -> Vec<Result<()>> {
    let check = |blob: &PendingBlob| {
        commitment::verify(config, &blob.tx.blob, &blob.tx.candidates, size)
    };
    #[cfg(feature = "parallel")]
    {
        pending.par_iter().map(check).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        pending.iter().map(check).collect()
    }
}

fn finish(
    config: &SquareConfig,
    size: usize,
    included_txs: Vec<Vec<u8>>,
    mut pending: Vec<PendingBlob>,
    rejected: Vec<Rejection>,
) -> Result<PreparedSquare> {
    // Stable: equal namespaces keep submission order.
    pending.sort_by(|a, b| a.tx.blob.namespace.cmp(&b.tx.blob.namespace));
    let blobs: Vec<_> = pending.iter().map(|p| (p.index, &p.tx.blob)).collect();
    let (square, placements) = layout(config, size, &included_txs, &blobs)?;
    let messages = pending
        .iter()
        .map(|p| Message::from_blob(config, &p.tx.blob))
        .collect();

    tracing::info!(
        square_size = size,
        txs = included_txs.len(),
        blobs = pending.len(),
        rejected = rejected.len(),
        "square assembled"
    );
    Ok(PreparedSquare {
        square,
        square_size: size,
        included_txs,
        messages,
        placements,
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Blob;
    use crate::namespace::Namespace;

    fn pending(index: usize, share_count: usize) -> PendingBlob {
        PendingBlob {
            index,
            tx: BlobTx {
                blob: Blob::new(Namespace::zero(8), Vec::new()).unwrap(),
                candidates: Vec::new(),
                rewritten: Vec::new(),
            },
            share_count,
        }
    }

    #[test]
    fn largest_first_prefers_later_on_ties() {
        let blobs = vec![pending(0, 3), pending(1, 7), pending(2, 7), pending(3, 1)];
        assert_eq!(LargestFirst.select_victim(&blobs), 2);
    }

    #[test]
    fn newest_first_takes_last() {
        let blobs = vec![pending(0, 30), pending(4, 1)];
        assert_eq!(NewestFirst.select_victim(&blobs), 1);
    }

    #[test]
    fn merges_in_submission_order() {
        let mut blob = pending(1, 1);
        blob.tx.rewritten = vec![1];
        let plain = vec![(0, vec![0]), (2, vec![2])];
        assert_eq!(
            merge_included(&plain, &[blob]),
            vec![vec![0], vec![1], vec![2]]
        );
    }
}
