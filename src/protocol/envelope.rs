use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

use crate::{
    buf::{PutBuf, TryBuf},
    error::Error,
};

/// One named string value inside an [`Envelope`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// Transport level container. Every typed message is flattened into an ordered
/// list of string parameters; binary content is base64 text and structured
/// payloads are base64 encoded JSON.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    pub id: String,
    pub type_tag: String,
    pub parameters: Vec<Parameter>,
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("id", &self.id)
            .field("type_tag", &self.type_tag)
            .field(
                "parameters",
                &self
                    .parameters
                    .iter()
                    .map(|p| (p.name.as_str(), p.value.len()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Envelope {
    pub fn new<I: Into<String>, T: Into<String>>(id: I, type_tag: T) -> Self {
        Self {
            id: id.into(),
            type_tag: type_tag.into(),
            parameters: Vec::new(),
        }
    }

    pub fn put<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.parameters.push(Parameter {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn put_bool(&mut self, name: &str, value: bool) {
        self.put(name, value.to_string());
    }

    pub fn put_bytes(&mut self, name: &str, value: &[u8]) {
        let encoded = if value.is_empty() {
            String::new()
        } else {
            BASE64_STANDARD.encode(value)
        };
        self.put(name, encoded);
    }

    /// Stores `value` as a serialized-object blob; `None` becomes an empty value.
    pub fn put_blob<T: Serialize>(&mut self, name: &str, value: Option<&T>) -> Result<(), Error> {
        let encoded = match value {
            Some(value) => BASE64_STANDARD.encode(serde_json::to_vec(value)?),
            None => String::new(),
        };
        self.put(name, encoded);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn required(&self, name: &str) -> Result<&str, Error> {
        self.get(name).ok_or_else(|| {
            Error::BadMessage(format!(
                "{} is missing parameter {name}",
                self.type_tag
            ))
        })
    }

    pub fn required_bool(&self, name: &str) -> Result<bool, Error> {
        let value = self.required(name)?;
        if value.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if value.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(Error::BadMessage(format!("{name} is not a boolean: {value}")))
        }
    }

    pub fn required_u64(&self, name: &str) -> Result<u64, Error> {
        let value = self.required(name)?;
        value
            .parse()
            .map_err(|_| Error::BadMessage(format!("{name} is not a number: {value}")))
    }

    /// Absent and empty both decode to no content.
    pub fn bytes(&self, name: &str) -> Result<Vec<u8>, Error> {
        match self.get(name) {
            None | Some("") => Ok(Vec::new()),
            Some(value) => Ok(BASE64_STANDARD.decode(value)?),
        }
    }

    /// Absent and empty both decode to `None`.
    pub fn blob<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, Error> {
        match self.get(name) {
            None | Some("") => Ok(None),
            Some(value) => {
                let json = BASE64_STANDARD.decode(value)?;
                Ok(Some(serde_json::from_slice(&json)?))
            }
        }
    }

    pub fn required_blob<T: DeserializeOwned>(&self, name: &str) -> Result<T, Error> {
        self.blob(name)?.ok_or_else(|| {
            Error::BadMessage(format!("{} is missing parameter {name}", self.type_tag))
        })
    }
}

impl From<&Envelope> for Bytes {
    fn from(envelope: &Envelope) -> Self {
        let mut bytes = BytesMut::new();

        bytes.put_str(&envelope.id);
        bytes.put_str(&envelope.type_tag);
        bytes.put_u32(envelope.parameters.len() as u32);

        for parameter in &envelope.parameters {
            bytes.put_str(&parameter.name);
            bytes.put_str(&parameter.value);
        }

        bytes.freeze()
    }
}

impl TryFrom<&mut Bytes> for Envelope {
    type Error = Error;

    fn try_from(bytes: &mut Bytes) -> Result<Self, Self::Error> {
        let id = bytes.try_read_string()?;
        let type_tag = bytes.try_read_string()?;
        let count = bytes.try_read_u32()?;

        let mut parameters = Vec::new();
        for _ in 0..count {
            parameters.push(Parameter {
                name: bytes.try_read_string()?,
                value: bytes.try_read_string()?,
            });
        }

        Ok(Self {
            id,
            type_tag,
            parameters,
        })
    }
}

#[cfg(test)]
mod test_envelope {
    use super::*;

    #[test]
    fn test_bytes_from_envelope() {
        let mut envelope = Envelope::new("1", "T");
        envelope.put("A", "b");

        let bytes = Bytes::from(&envelope);
        assert_eq!(
            &bytes.to_vec(),
            &[
                0, 0, 0, 1, b'1', 0, 0, 0, 1, b'T', 0, 0, 0, 1, 0, 0, 0, 1, b'A', 0, 0, 0, 1,
                b'b'
            ]
        );
    }

    #[test]
    fn test_envelope_from_bytes() {
        let mut envelope = Envelope::new("id-1", "GetFileRequest");
        envelope.put("SecurityKey", "secret");
        envelope.put("Path", "/data/a.txt");

        let mut bytes = Bytes::from(&envelope);
        assert_eq!(Envelope::try_from(&mut bytes).unwrap(), envelope);
    }

    #[test]
    fn test_truncated_envelope() {
        let envelope = Envelope::new("id-1", "GetFileRequest");
        let bytes = Bytes::from(&envelope);
        let mut truncated = bytes.slice(..bytes.len() - 2);

        assert!(Envelope::try_from(&mut truncated).is_err());
    }

    #[test]
    fn test_empty_blob_is_not_set() {
        let mut envelope = Envelope::new("1", "T");
        envelope.put("Folder", "");

        let folder: Option<Vec<String>> = envelope.blob("Folder").unwrap();
        assert!(folder.is_none());
        assert!(envelope.blob::<Vec<String>>("Missing").unwrap().is_none());
        assert!(envelope.bytes("Missing").unwrap().is_empty());
    }

    #[test]
    fn test_missing_required_parameter() {
        let envelope = Envelope::new("1", "GetFolderRequest");
        assert!(matches!(
            envelope.required("Path"),
            Err(Error::BadMessage(_))
        ));
    }

    #[test]
    fn test_bool_parsing() {
        let mut envelope = Envelope::new("1", "T");
        envelope.put("IsMore", "True");
        envelope.put("Bad", "yes");

        assert!(envelope.required_bool("IsMore").unwrap());
        assert!(envelope.required_bool("Bad").is_err());
    }
}
