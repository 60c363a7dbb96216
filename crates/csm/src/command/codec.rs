//! Wire envelope shared by every command.
//!
//! A command is flattened into a list of tagged [`Field`]s and wrapped in an
//! [`Envelope`] that carries the command type id and, for transactional
//! commands, the sender's sequence number. The envelope itself is archived
//! with rkyv. Readers look fields up by tag and skip tags they do not know,
//! so a peer can add fields without breaking older peers.

use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};

pub const PROTOCOL_MAGIC: u32 = 0x4353_4D31;
pub const PROTOCOL_VERSION: u32 = 1;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

/// The closed set of value shapes a field can take. New variants change the
/// archived layout, so this list only grows together with `PROTOCOL_VERSION`.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum FieldValue {
    Bool(bool),
    U32(u32),
    U64(u64),
    I64(i64),
    F32(f32),
    Str(String),
    Bytes(Vec<u8>),
    Vec3([f32; 3]),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "bool",
            FieldValue::U32(_) => "u32",
            FieldValue::U64(_) => "u64",
            FieldValue::I64(_) => "i64",
            FieldValue::F32(_) => "f32",
            FieldValue::Str(_) => "string",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Vec3(_) => "vec3",
        }
    }
}

macro_rules! field_conversions {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value)
                }
            }

            impl FromField for $ty {
                const TYPE_NAME: &'static str = $name;

                fn from_field(value: &FieldValue) -> Option<Self> {
                    match value {
                        FieldValue::$variant(inner) => Some(inner.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

/// Typed extraction from a [`FieldValue`].
pub trait FromField: Sized {
    const TYPE_NAME: &'static str;

    fn from_field(value: &FieldValue) -> Option<Self>;
}

field_conversions! {
    bool => Bool, "bool";
    u32 => U32, "u32";
    u64 => U64, "u64";
    i64 => I64, "i64";
    f32 => F32, "f32";
    String => Str, "string";
    Vec<u8> => Bytes, "bytes";
    [f32; 3] => Vec3, "vec3";
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Field {
    pub tag: u16,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Envelope {
    pub magic: u32,
    pub version: u32,
    pub type_id: u16,
    pub sequence: Option<u32>,
    pub fields: Vec<Field>,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("invalid envelope header (magic {magic:#010x}, version {version})")]
    InvalidHeader { magic: u32, version: u32 },
}

/// Payload-level decode failure for a single command type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("missing required field {tag}")]
    MissingField { tag: u16 },
    #[error("field {tag} is {found}, expected {expected}")]
    WrongType {
        tag: u16,
        expected: &'static str,
        found: &'static str,
    },
    #[error("envelope carries type id {found}, expected {expected}")]
    WrongCommand { expected: u16, found: u16 },
    #[error("{0}")]
    Invalid(String),
}

impl Envelope {
    pub fn new(type_id: u16, sequence: Option<u32>, fields: Vec<Field>) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            type_id,
            sequence,
            fields,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }

    pub fn with_sequence(&self, sequence: Option<u32>) -> Self {
        Self {
            sequence,
            ..self.clone()
        }
    }

    pub fn reader(&self) -> FieldReader<'_> {
        FieldReader::new(&self.fields)
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(CodecError::Serialize)
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        // Frames come off the socket at arbitrary alignment.
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);

        let envelope =
            rkyv::from_bytes::<Self, rancor::Error>(&aligned).map_err(CodecError::Deserialize)?;
        if !envelope.is_valid() {
            return Err(CodecError::InvalidHeader {
                magic: envelope.magic,
                version: envelope.version,
            });
        }
        Ok(envelope)
    }
}

#[derive(Debug, Default)]
pub struct FieldWriter {
    fields: Vec<Field>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, tag: u16, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.push(Field {
            tag,
            value: value.into(),
        });
        self
    }

    /// Absent values are not written at all, which keeps them distinct from
    /// a present zero on the reading side.
    pub fn put_opt<V: Into<FieldValue>>(&mut self, tag: u16, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.put(tag, value);
        }
        self
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldReader<'a> {
    fields: &'a [Field],
}

impl<'a> FieldReader<'a> {
    pub fn new(fields: &'a [Field]) -> Self {
        Self { fields }
    }

    fn find(&self, tag: u16) -> Option<&'a FieldValue> {
        self.fields
            .iter()
            .find(|field| field.tag == tag)
            .map(|field| &field.value)
    }

    pub fn optional<T: FromField>(&self, tag: u16) -> Result<Option<T>, DecodeError> {
        match self.find(tag) {
            None => Ok(None),
            Some(value) => T::from_field(value)
                .map(Some)
                .ok_or(DecodeError::WrongType {
                    tag,
                    expected: T::TYPE_NAME,
                    found: value.type_name(),
                }),
        }
    }

    pub fn required<T: FromField>(&self, tag: u16) -> Result<T, DecodeError> {
        self.optional(tag)?.ok_or(DecodeError::MissingField { tag })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
