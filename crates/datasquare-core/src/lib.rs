//! Core primitives for the datasquare block data layout.
//!
//! Blob transactions carry namespaced payloads next to, not inside, the
//! executed transaction list. This crate turns a candidate transaction list
//! into the data square a block commits to:
//!
//! * [`tx`]: the raw transaction envelope, blob extraction, and client side
//!   construction of signed candidate commitments.
//! * [`share`]: the fixed-size share format, with compact shares for
//!   transactions and sparse shares for blobs.
//! * [`commitment`]: blob commitments and the admissibility check at the
//!   chosen square size.
//! * [`assemble`] and [`prepare`]: square sizing, blob eviction and layout.
//! * [`erasure`], [`nmt`] and [`dah`]: Reed–Solomon extension, namespaced
//!   Merkle roots and the data availability header over them.
//!
//! Every entry point takes an explicit [`SquareConfig`].

pub mod assemble;
pub mod blob;
pub mod commitment;
pub mod config;
pub mod dah;
pub mod erasure;
pub mod merkle;
pub mod namespace;
pub mod nmt;
pub mod prepare;
pub mod share;
pub mod square;
pub mod tx;

mod error;
mod serde_hex;

pub use assemble::{DropPolicy, LargestFirst, NewestFirst, PreparedSquare, Rejection};
pub use blob::Blob;
pub use config::{DropPolicyKind, SquareConfig};
pub use dah::DataAvailabilityHeader;
pub use erasure::ExtendedSquare;
pub use error::{Result, SquareError};
pub use namespace::Namespace;
pub use prepare::{prepare_square, prepare_square_with_policy};
pub use share::Share;
pub use square::{Message, Square};
