//! Compact shares: many length-prefixed transactions packed back to back
//! under the transaction namespace.

use integer_encoding::VarInt;

use crate::config::{
    SquareConfig, COMPACT_SHARE_RESERVED_BYTES, SEQUENCE_LEN_BYTES, SHARE_INFO_BYTES,
};
use crate::error::{Result, SquareError};
use crate::share::{shares_needed, InfoByte, Share, ShareReader, ShareWriter};

/// Byte length of `txs` once each is varint length-prefixed.
pub fn sequence_len(txs: &[Vec<u8>]) -> usize {
    txs.iter()
        .map(|tx| (tx.len() as u64).required_space() + tx.len())
        .sum()
}

/// Number of compact shares needed for `txs`.
pub fn share_count(config: &SquareConfig, txs: &[Vec<u8>]) -> usize {
    shares_needed(
        sequence_len(txs),
        config.first_compact_content(),
        config.continuation_compact_content(),
    )
}

/// Pack `txs` into compact shares. No transactions, no shares.
pub fn split_txs(config: &SquareConfig, txs: &[Vec<u8>]) -> Result<Vec<Share>> {
    let mut stream = Vec::with_capacity(sequence_len(txs));
    let mut unit_starts = Vec::with_capacity(txs.len());
    for tx in txs {
        unit_starts.push(stream.len());
        stream.extend_from_slice(&(tx.len() as u64).encode_var_vec());
        stream.extend_from_slice(tx);
    }
    if stream.is_empty() {
        return Ok(Vec::new());
    }
    let total = u32::try_from(stream.len()).map_err(|_| {
        SquareError::MalformedTransaction("transaction list exceeds u32::MAX bytes".into())
    })?;

    let namespace = config.reserved().transaction;
    let mut shares = Vec::with_capacity(share_count(config, txs));
    let mut pos = 0;
    let mut starts = unit_starts.iter().peekable();
    while pos < stream.len() {
        let first = pos == 0;
        let capacity = if first {
            config.first_compact_content()
        } else {
            config.continuation_compact_content()
        };
        let end = stream.len().min(pos + capacity);

        while starts.next_if(|start| **start < pos).is_some() {}
        let header = header_len(config, first);
        let offset = match starts.peek() {
            Some(start) if **start < end => header + (**start - pos),
            _ => 0,
        };

        let info = InfoByte::new(config.share_version, first)?;
        let mut writer = ShareWriter::new(config, &namespace, info);
        if first {
            writer.put_u32(total);
        }
        writer.put_u32(offset as u32);
        writer.put(&stream[pos..end]);
        shares.push(writer.finish());
        pos = end;
    }
    Ok(shares)
}

fn header_len(config: &SquareConfig, first: bool) -> usize {
    let sequence = if first { SEQUENCE_LEN_BYTES } else { 0 };
    config.namespace_size + SHARE_INFO_BYTES + sequence + COMPACT_SHARE_RESERVED_BYTES
}

/// Offset from the start of `share` of the first unit beginning inside it,
/// or `None` when a unit spans the whole share.
pub fn first_unit_offset(config: &SquareConfig, share: &Share) -> Result<Option<usize>> {
    let mut reader = ShareReader::new(config, share)?;
    if reader.info.is_sequence_start() {
        reader.read_u32();
    }
    let offset = reader.read_u32() as usize;
    if offset == 0 {
        return Ok(None);
    }
    if offset < reader.position() || offset >= config.share_size {
        return Err(SquareError::InvalidShare("reserved offset outside share data"));
    }
    Ok(Some(offset))
}

/// Recover the transactions packed by [`split_txs`].
pub fn parse_compact_shares(config: &SquareConfig, shares: &[Share]) -> Result<Vec<Vec<u8>>> {
    if shares.is_empty() {
        return Ok(Vec::new());
    }
    let namespace = config.reserved().transaction;

    let mut stream = Vec::new();
    let mut declared = 0;
    for (i, share) in shares.iter().enumerate() {
        let mut reader = ShareReader::new(config, share)?;
        if reader.namespace != namespace {
            return Err(SquareError::InvalidShare("compact share outside transaction namespace"));
        }
        if reader.info.is_sequence_start() != (i == 0) {
            return Err(SquareError::InvalidShare("misplaced sequence start in compact shares"));
        }
        if i == 0 {
            declared = reader.read_u32() as usize;
        }
        // Offsets are only needed when resuming mid-sequence.
        first_unit_offset(config, share)?;
        reader.read_u32();
        stream.extend_from_slice(reader.rest());
    }

    if declared > stream.len() {
        return Err(SquareError::DecodeOverflow {
            declared,
            available: stream.len(),
        });
    }
    let expected = shares_needed(
        declared,
        config.first_compact_content(),
        config.continuation_compact_content(),
    );
    if expected != shares.len() {
        tracing::debug!(expected, got = shares.len(), "compact share count mismatch");
        return Err(SquareError::InvalidShare("trailing shares after compact sequence"));
    }
    stream.truncate(declared);

    let mut txs = Vec::new();
    let mut cursor = 0;
    while cursor < stream.len() {
        let (len, used) = u64::decode_var(&stream[cursor..])
            .ok_or(SquareError::InvalidShare("bad unit length prefix"))?;
        cursor += used;
        let end = usize::try_from(len)
            .ok()
            .and_then(|len| cursor.checked_add(len))
            .filter(|end| *end <= stream.len())
            .ok_or(SquareError::InvalidShare("unit runs past sequence end"))?;
        txs.push(stream[cursor..end].to_vec());
        cursor = end;
    }
    Ok(txs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SquareConfig {
        SquareConfig {
            share_size: 269,
            namespace_size: 8,
            max_square_size: 16,
            ..SquareConfig::default()
        }
    }

    #[test]
    fn no_transactions_no_shares() {
        let config = small_config();
        assert!(split_txs(&config, &[]).unwrap().is_empty());
        assert_eq!(share_count(&config, &[]), 0);
        assert!(parse_compact_shares(&config, &[]).unwrap().is_empty());
    }

    #[test]
    fn packs_small_transactions_into_one_share() {
        let config = small_config();
        let txs = vec![vec![1u8; 10], vec![2u8; 20]];
        let shares = split_txs(&config, &txs).unwrap();
        assert_eq!(shares.len(), 1);

        let bytes = shares[0].as_bytes();
        assert_eq!(&bytes[..8], config.reserved().transaction.as_bytes());
        assert_eq!(bytes[8], 1);
        assert_eq!(&bytes[9..13], &32u32.to_be_bytes());
        // 8 + 1 + 4 + 4
        assert_eq!(&bytes[13..17], &17u32.to_be_bytes());
        assert_eq!(bytes[17], 10);
        assert_eq!(first_unit_offset(&config, &shares[0]).unwrap(), Some(17));

        assert_eq!(parse_compact_shares(&config, &shares).unwrap(), txs);
    }

    #[test]
    fn reserved_offset_skips_spanning_unit() {
        let config = small_config();
        // 606 stream bytes span three shares: 252 + 256 + 98.
        let txs = vec![vec![7u8; 600], vec![8u8; 3]];
        let shares = split_txs(&config, &txs).unwrap();
        assert_eq!(shares.len(), 3);
        assert_eq!(share_count(&config, &txs), 3);
        // 600 takes a two byte varint prefix.
        assert_eq!(sequence_len(&txs), 2 + 600 + 1 + 3);
        assert_eq!(&shares[0].as_bytes()[17..19], &[0xd8, 0x04]);

        assert_eq!(first_unit_offset(&config, &shares[1]).unwrap(), None);
        // Second unit starts at stream byte 602, i.e. 94 bytes into share 2.
        let offset = first_unit_offset(&config, &shares[2]).unwrap().unwrap();
        assert_eq!(offset, 8 + 1 + 4 + 94);
        assert_eq!(shares[2].as_bytes()[offset], 3);

        assert_eq!(parse_compact_shares(&config, &shares).unwrap(), txs);
    }

    #[test]
    fn empty_transaction_survives() {
        let config = small_config();
        let txs = vec![Vec::new(), vec![5u8; 4]];
        let shares = split_txs(&config, &txs).unwrap();
        assert_eq!(parse_compact_shares(&config, &shares).unwrap(), txs);
    }

    #[test]
    fn detects_overflowing_sequence_length() {
        let config = small_config();
        let shares = split_txs(&config, &[vec![1u8; 4]]).unwrap();
        let mut bytes = shares[0].as_bytes().to_vec();
        bytes[9..13].copy_from_slice(&5_000u32.to_be_bytes());
        let share = Share::from_bytes(&config, &bytes).unwrap();

        let err = parse_compact_shares(&config, &[share]).unwrap_err();
        assert_eq!(
            err,
            SquareError::DecodeOverflow {
                declared: 5_000,
                available: 252
            }
        );
    }

    #[test]
    fn rejects_unit_running_past_sequence() {
        let config = small_config();
        let shares = split_txs(&config, &[vec![1u8; 4]]).unwrap();
        let mut bytes = shares[0].as_bytes().to_vec();
        // Continuation bit turns the prefix into 5 + (1 << 7).
        bytes[17] = 0x85;
        let share = Share::from_bytes(&config, &bytes).unwrap();
        assert!(matches!(
            parse_compact_shares(&config, &[share]),
            Err(SquareError::InvalidShare(_))
        ));
    }

    #[test]
    fn rejects_foreign_namespace() {
        let config = small_config();
        let blob = crate::blob::Blob::new(
            crate::namespace::Namespace::from_raw(&[3; 8], 8).unwrap(),
            vec![1],
        )
        .unwrap();
        let shares = crate::share::sparse::split_shares(&config, &blob).unwrap();
        assert!(matches!(
            parse_compact_shares(&config, &shares),
            Err(SquareError::InvalidShare(_))
        ));
    }
}
