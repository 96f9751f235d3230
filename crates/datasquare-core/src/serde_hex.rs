//! Byte fields as hex strings in human readable formats (JSON, TOML) and as
//! plain bytes in binary ones (bincode).

pub(crate) mod bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(value.as_ref()))
        } else {
            serializer.serialize_bytes(value.as_ref())
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let encoded = String::deserialize(deserializer)?;
            hex::decode(encoded.trim()).map_err(D::Error::custom)
        } else {
            Vec::<u8>::deserialize(deserializer)
        }
    }
}

pub(crate) mod array {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(value: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        super::bytes::serialize(value, serializer)
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut out = [0u8; N];
        if deserializer.is_human_readable() {
            let encoded = String::deserialize(deserializer)?;
            hex::decode_to_slice(encoded.trim(), &mut out).map_err(D::Error::custom)?;
        } else {
            let raw = Vec::<u8>::deserialize(deserializer)?;
            if raw.len() != N {
                return Err(D::Error::invalid_length(raw.len(), &"a fixed size byte array"));
            }
            out.copy_from_slice(&raw);
        }
        Ok(out)
    }
}
