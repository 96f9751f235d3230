//! Block preparation entry point.

#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::assemble::{DropPolicy, PreparedSquare, Rejection, SquareAssembler};
use crate::config::SquareConfig;
use crate::error::{Result, SquareError};
use crate::tx::{extract, ParsedTx};

/// Turn a candidate transaction list into a square.
///
/// Per-transaction problems only remove that transaction and are reported in
/// [`PreparedSquare::rejected`]. The call fails only when even the
/// transactions without blobs overflow the largest square.
pub fn prepare_square(config: &SquareConfig, raw_txs: &[Vec<u8>]) -> Result<PreparedSquare> {
    prepare_with(config, raw_txs, SquareAssembler::new(config))
}

/// [`prepare_square`] with a custom eviction policy.
pub fn prepare_square_with_policy(
    config: &SquareConfig,
    raw_txs: &[Vec<u8>],
    policy: Box<dyn DropPolicy>,
) -> Result<PreparedSquare> {
    prepare_with(config, raw_txs, SquareAssembler::with_policy(config, policy))
}

#[tracing::instrument(skip_all, fields(raw_txs = raw_txs.len()))]
fn prepare_with(
    config: &SquareConfig,
    raw_txs: &[Vec<u8>],
    assembler: SquareAssembler<'_>,
) -> Result<PreparedSquare> {
    config.validate()?;

    let mut parsed = Vec::with_capacity(raw_txs.len());
    let mut rejected = Vec::new();
    for (index, result) in extract_all(config, raw_txs).into_iter().enumerate() {
        match result {
            Ok(tx) => parsed.push((index, tx)),
            Err(error) => {
                tracing::warn!(index, %error, "transaction rejected");
                rejected.push(Rejection { index, error });
            }
        }
    }

    let limit = config.transactions_per_block_limit;
    if parsed.len() > limit {
        let required = parsed.len();
        for (index, _) in parsed.split_off(limit) {
            let error = SquareError::NoFittingSquareSize { required, limit };
            tracing::warn!(index, %error, "transaction over block limit");
            rejected.push(Rejection { index, error });
        }
    }
    tracing::debug!(
        accepted = parsed.len(),
        rejected = rejected.len(),
        "transactions parsed"
    );

    assembler.assemble(parsed, rejected)
}

fn extract_all(config: &SquareConfig, raw_txs: &[Vec<u8>]) -> Vec<Result<ParsedTx>> {
    #[cfg(feature = "parallel")]
    {
        raw_txs.par_iter().map(|raw| extract(config, raw)).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        raw_txs.iter().map(|raw| extract(config, raw)).collect()
    }
}
