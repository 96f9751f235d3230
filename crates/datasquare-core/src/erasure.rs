//! Two dimensional Reed–Solomon extension of the data square.
//!
//! A `k × k` square becomes `2k × 2k`: every row is extended with `k` parity
//! shares, then every one of the `2k` columns is. Any `k` shares of a row or
//! column recover the rest of it.

use reed_solomon_erasure::galois_8::ReedSolomon;

use crate::config::SquareConfig;
use crate::error::{Result, SquareError};
use crate::share::Share;
use crate::square::Square;

/// Extended square, shares in row-major order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedSquare {
    original_size: usize,
    shares: Vec<Vec<u8>>,
}

impl ExtendedSquare {
    #[tracing::instrument(skip_all, fields(size = square.size()))]
    pub fn extend(square: &Square) -> Result<Self> {
        let k = square.size();
        let q0 = square
            .shares()
            .iter()
            .map(|share| share.as_bytes().to_vec())
            .collect();
        Self::from_quadrant(k, q0)
    }

    /// Extend raw `k × k` shares.
    fn from_quadrant(k: usize, q0: Vec<Vec<u8>>) -> Result<Self> {
        let share_len = q0.first().map(Vec::len).unwrap_or(0);
        let rs = ReedSolomon::new(k, k)?;
        let width = 2 * k;
        let mut shares = vec![Vec::new(); width * width];

        for (row, chunk) in q0.chunks(k).enumerate() {
            let mut shards: Vec<Vec<u8>> = chunk.to_vec();
            shards.resize(width, vec![0u8; share_len]);
            rs.encode(&mut shards)?;
            for (col, shard) in shards.into_iter().enumerate() {
                shares[row * width + col] = shard;
            }
        }
        for col in 0..width {
            let mut shards: Vec<Vec<u8>> =
                (0..k).map(|row| shares[row * width + col].clone()).collect();
            shards.resize(width, vec![0u8; share_len]);
            rs.encode(&mut shards)?;
            for (row, shard) in shards.into_iter().enumerate().skip(k) {
                shares[row * width + col] = shard;
            }
        }

        Ok(Self {
            original_size: k,
            shares,
        })
    }

    /// Recover missing shares by alternately decoding rows and columns.
    ///
    /// `shares` is the `2k × 2k` grid in row-major order with `None` for
    /// missing cells. The result is checked by re-extending the recovered
    /// original quadrant.
    #[tracing::instrument(skip_all, fields(original_size = original_size))]
    pub fn repair(original_size: usize, mut shares: Vec<Option<Vec<u8>>>) -> Result<Self> {
        let k = original_size;
        let width = 2 * k;
        if k == 0 || shares.len() != width * width {
            return Err(SquareError::InvalidShare("extended square has wrong dimensions"));
        }
        let rs = ReedSolomon::new(k, k)?;

        let mut missing = shares.iter().filter(|cell| cell.is_none()).count();
        let mut pass = 0;
        while missing > 0 {
            let before = missing;
            for line in 0..width {
                for by_row in [true, false] {
                    let index = |i: usize| {
                        if by_row {
                            line * width + i
                        } else {
                            i * width + line
                        }
                    };
                    let mut cells: Vec<Option<Vec<u8>>> =
                        (0..width).map(|i| shares[index(i)].clone()).collect();
                    let present = cells.iter().filter(|cell| cell.is_some()).count();
                    if present == width || present < k {
                        continue;
                    }
                    rs.reconstruct(&mut cells)?;
                    for (i, cell) in cells.into_iter().enumerate() {
                        shares[index(i)] = cell;
                    }
                    missing -= width - present;
                }
            }
            pass += 1;
            tracing::debug!(pass, missing, "repair pass");
            if missing == before {
                return Err(SquareError::ReedSolomon(
                    reed_solomon_erasure::Error::TooFewShardsPresent,
                ));
            }
        }

        let shares: Vec<Vec<u8>> = shares.into_iter().flatten().collect();
        let q0 = (0..k)
            .flat_map(|row| (0..k).map(move |col| row * width + col))
            .map(|i| shares[i].clone())
            .collect();
        let rebuilt = Self::from_quadrant(k, q0)?;
        if rebuilt.shares != shares {
            return Err(SquareError::InvalidShare("repaired square fails re-extension"));
        }
        Ok(rebuilt)
    }

    pub fn original_size(&self) -> usize {
        self.original_size
    }

    pub fn width(&self) -> usize {
        2 * self.original_size
    }

    pub fn share(&self, row: usize, col: usize) -> &[u8] {
        &self.shares[row * self.width() + col]
    }

    pub fn row(&self, index: usize) -> &[Vec<u8>] {
        let width = self.width();
        &self.shares[index * width..(index + 1) * width]
    }

    pub fn column(&self, index: usize) -> Vec<&[u8]> {
        (0..self.width()).map(|row| self.share(row, index)).collect()
    }

    /// True for shares of the original quadrant.
    pub fn is_original(&self, row: usize, col: usize) -> bool {
        row < self.original_size && col < self.original_size
    }

    /// The grid with every cell present, for feeding to [`Self::repair`].
    pub fn cells(&self) -> Vec<Option<Vec<u8>>> {
        self.shares.iter().cloned().map(Some).collect()
    }

    /// The original quadrant as a square.
    pub fn original_square(&self, config: &SquareConfig) -> Result<Square> {
        let k = self.original_size;
        let mut shares = Vec::with_capacity(k * k);
        for row in 0..k {
            for col in 0..k {
                shares.push(Share::from_bytes(config, self.share(row, col))?);
            }
        }
        Square::new(k, shares)
    }
}
