use serde::{Deserialize, Serialize};

use crate::error::{Result, SquareError};
use crate::namespace::Namespace;

/// A namespaced payload carried next to, not inside, transaction execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub namespace: Namespace,
    #[serde(with = "crate::serde_hex::bytes")]
    pub data: Vec<u8>,
    /// Written into the first share so readers can strip zero padding.
    pub declared_length: u32,
}

impl Blob {
    pub fn new(namespace: Namespace, data: Vec<u8>) -> Result<Self> {
        let declared_length = u32::try_from(data.len()).map_err(|_| {
            SquareError::MalformedTransaction("blob larger than u32::MAX bytes".into())
        })?;
        Ok(Self {
            namespace,
            data,
            declared_length,
        })
    }

    /// Build a blob from a sender-declared length, which must agree with the
    /// payload.
    pub fn with_declared_length(
        namespace: Namespace,
        data: Vec<u8>,
        declared_length: u32,
    ) -> Result<Self> {
        if data.len() != declared_length as usize {
            return Err(SquareError::MalformedTransaction(format!(
                "declared length {declared_length} but payload has {} bytes",
                data.len()
            )));
        }
        Ok(Self {
            namespace,
            data,
            declared_length,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
