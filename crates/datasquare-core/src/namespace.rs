use std::fmt;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SquareError};

/// Leading version byte of every namespace.
pub const NAMESPACE_VERSION_SIZE: usize = 1;

/// Fixed-length identifier grouping shares into a logical stream.
///
/// The derived ordering is the unsigned byte-wise lexicographic order, which
/// is the order shares are laid out in a square.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Namespace(Vec<u8>);

impl Namespace {
    /// Validate `bytes` against the configured namespace size.
    pub fn from_raw(bytes: &[u8], size: usize) -> Result<Self> {
        if bytes.len() != size {
            return Err(SquareError::Namespace("invalid namespace size"));
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Version 0 namespace whose id is all zeros apart from the last byte.
    pub fn primary_reserved(size: usize, last: u8) -> Self {
        let mut bytes = vec![0u8; size];
        bytes[size - 1] = last;
        Self(bytes)
    }

    /// Namespace whose bytes are all `0xff` apart from the last byte.
    pub fn secondary_reserved(size: usize, last: u8) -> Self {
        let mut bytes = vec![0xffu8; size];
        bytes[size - 1] = last;
        Self(bytes)
    }

    /// The all-zero namespace used by empty tree roots.
    pub fn zero(size: usize) -> Self {
        Self(vec![0u8; size])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn version(&self) -> u8 {
        self.0[0]
    }

    pub fn id(&self) -> &[u8] {
        &self.0[NAMESPACE_VERSION_SIZE..]
    }
}

impl AsRef<[u8]> for Namespace {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({})", hex::encode(&self.0))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl Serialize for Namespace {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Namespace {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(encoded.trim()).map_err(D::Error::custom)?;
        if bytes.len() <= NAMESPACE_VERSION_SIZE {
            return Err(D::Error::custom("namespace too short"));
        }
        Ok(Namespace(bytes))
    }
}

/// Namespaces the protocol keeps for itself.
///
/// Blob namespaces must fall strictly between `max_primary_reserved` and
/// `min_secondary_reserved`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservedNamespaces {
    pub transaction: Namespace,
    pub max_primary_reserved: Namespace,
    pub min_secondary_reserved: Namespace,
    pub tail_padding: Namespace,
    pub parity: Namespace,
}

impl ReservedNamespaces {
    /// The default reservations for namespaces of `size` bytes.
    pub fn derive(size: usize) -> Self {
        Self {
            transaction: Namespace::primary_reserved(size, 0x01),
            max_primary_reserved: Namespace::primary_reserved(size, 0xff),
            min_secondary_reserved: Namespace::secondary_reserved(size, 0x00),
            tail_padding: Namespace::secondary_reserved(size, 0xfe),
            parity: Namespace::secondary_reserved(size, 0xff),
        }
    }

    pub fn is_reserved(&self, namespace: &Namespace) -> bool {
        *namespace <= self.max_primary_reserved || *namespace >= self.min_secondary_reserved
    }

    pub(crate) fn validate(&self, size: usize) -> Result<()> {
        let all = [
            &self.transaction,
            &self.max_primary_reserved,
            &self.min_secondary_reserved,
            &self.tail_padding,
            &self.parity,
        ];
        if all.iter().any(|ns| ns.len() != size) {
            return Err(SquareError::InvalidConfig(
                "reserved namespaces must match namespace_size".into(),
            ));
        }
        if self.transaction > self.max_primary_reserved {
            return Err(SquareError::InvalidConfig(
                "transaction namespace must be primary reserved".into(),
            ));
        }
        if self.tail_padding < self.min_secondary_reserved || self.parity < self.tail_padding {
            return Err(SquareError::InvalidConfig(
                "tail padding and parity namespaces must sort last".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_bytewise() {
        let a = Namespace::from_raw(&[0, 1, 2], 3).unwrap();
        let b = Namespace::from_raw(&[0, 2, 0], 3).unwrap();
        let c = Namespace::from_raw(&[0xff, 0, 0], 3).unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn rejects_wrong_size() {
        let err = Namespace::from_raw(&[1; 7], 8).unwrap_err();
        assert!(matches!(err, SquareError::Namespace(_)));
    }

    #[test]
    fn derived_reservations_bracket_user_namespaces() {
        let reserved = ReservedNamespaces::derive(8);
        assert_eq!(reserved.transaction.as_bytes(), &[0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(reserved.parity.as_bytes(), &[0xff; 8]);
        assert!(reserved.validate(8).is_ok());

        assert!(reserved.is_reserved(&reserved.transaction));
        assert!(reserved.is_reserved(&reserved.tail_padding));
        assert!(reserved.is_reserved(&Namespace::from_raw(&[0, 0, 0, 0, 0, 0, 0, 0xff], 8).unwrap()));
        assert!(!reserved.is_reserved(&Namespace::from_raw(&[0, 0, 0, 0, 0, 0, 1, 0], 8).unwrap()));
        assert!(!reserved.is_reserved(&Namespace::from_raw(&[1; 8], 8).unwrap()));
    }

    #[test]
    fn serializes_as_hex() {
        let ns = Namespace::from_raw(&[0xab, 0x01], 2).unwrap();
        let json = serde_json::to_string(&ns).unwrap();
        assert_eq!(json, "\"ab01\"");
        let back: Namespace = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ns);
    }
}
