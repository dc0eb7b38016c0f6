// Discriminator registry
//
// Maps the `"type"` member of a polymorphic payload to the concrete Rust type
// that decodes it. One registry exists per supertype family; a discriminator
// that is valid for constraints is unknown when decoding a data component.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::trace;

use crate::codec::SweCodec;
use crate::error::CodecError;

/// JSON member carrying the discriminator on every polymorphic node.
pub const DISCRIMINATOR_KEY: &str = "type";

// ── SweType ──────────────────────────────────────────────────────────

/// A concrete subtype that can be registered with a [`SweCodec`].
///
/// Plain fields go through serde. Members holding further polymorphic
/// values are `#[serde(skip)]` on the struct and filled in by
/// [`decode_nested`](Self::decode_nested) / written by
/// [`encode_nested`](Self::encode_nested), which is where the codec gets to
/// consult its registries.
pub trait SweType:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Explicit discriminator. When `None`, the short Rust type name is used.
    const SWE_NAME: Option<&'static str> = None;

    /// Resolve polymorphic members from the raw JSON object.
    fn decode_nested(
        &mut self,
        _codec: &SweCodec,
        _raw: &Map<String, Value>,
    ) -> Result<(), CodecError> {
        Ok(())
    }

    /// Write polymorphic members into the already-encoded JSON object.
    fn encode_nested(&self, _out: &mut Map<String, Value>) -> Result<(), CodecError> {
        Ok(())
    }
}

/// The discriminator a type is registered and encoded under.
pub fn discriminator_of<T: SweType>() -> &'static str {
    T::SWE_NAME.unwrap_or_else(|| short_type_name(std::any::type_name::<T>()))
}

/// `stalink_swe::component::Count` -> `Count`.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

pub(crate) fn decode_concrete<T: SweType>(codec: &SweCodec, raw: &Value) -> Result<T, CodecError> {
    let mut value = T::deserialize(raw).map_err(|source| CodecError::Malformed {
        discriminator: discriminator_of::<T>(),
        source,
    })?;
    if let Value::Object(members) = raw {
        value.decode_nested(codec, members)?;
    }
    Ok(value)
}

pub(crate) fn encode_concrete<T: SweType>(value: &T) -> Result<Value, CodecError> {
    let discriminator = discriminator_of::<T>();
    let encoded = serde_json::to_value(value).map_err(|source| CodecError::Encode {
        discriminator,
        source,
    })?;
    let Value::Object(fields) = encoded else {
        return Err(CodecError::NotAnObject {
            family: discriminator,
        });
    };

    // Discriminator goes in first, then the type's own members.
    let mut out = Map::with_capacity(fields.len() + 1);
    out.insert(DISCRIMINATOR_KEY.to_owned(), Value::String(discriminator.to_owned()));
    out.extend(fields);
    value.encode_nested(&mut out)?;
    Ok(Value::Object(out))
}

// ── Registration ─────────────────────────────────────────────────────

/// Decoder stored per discriminator, producing the family's trait object.
pub type DecodeFn<S> = fn(&SweCodec, &Value) -> Result<Box<S>, CodecError>;

/// One `(discriminator, type, decoder)` entry of a [`TypeRegistry`].
pub struct Registration<S: ?Sized> {
    discriminator: &'static str,
    rust_type: &'static str,
    decode: DecodeFn<S>,
}

impl<S: ?Sized> Registration<S> {
    pub fn new(discriminator: &'static str, rust_type: &'static str, decode: DecodeFn<S>) -> Self {
        Self {
            discriminator,
            rust_type,
            decode,
        }
    }

    pub fn discriminator(&self) -> &'static str {
        self.discriminator
    }

    pub fn rust_type(&self) -> &'static str {
        self.rust_type
    }
}

impl<S: ?Sized> Clone for Registration<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized> Copy for Registration<S> {}

impl<S: ?Sized> fmt::Debug for Registration<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("discriminator", &self.discriminator)
            .field("rust_type", &self.rust_type)
            .finish()
    }
}

// ── TypeRegistry ─────────────────────────────────────────────────────

/// Immutable discriminator → subtype map for one supertype family.
pub struct TypeRegistry<S: ?Sized> {
    family: &'static str,
    entries: HashMap<&'static str, Registration<S>>,
}

impl<S: ?Sized> TypeRegistry<S> {
    /// Build a registry, failing on the first discriminator collision.
    pub fn from_registrations(
        family: &'static str,
        registrations: impl IntoIterator<Item = Registration<S>>,
    ) -> Result<Self, CodecError> {
        let mut entries = HashMap::new();
        for registration in registrations {
            match entries.entry(registration.discriminator) {
                Entry::Occupied(existing) => {
                    let existing: &Registration<S> = existing.get();
                    return Err(CodecError::DuplicateDiscriminator {
                        discriminator: registration.discriminator,
                        first: existing.rust_type,
                        second: registration.rust_type,
                    });
                }
                Entry::Vacant(slot) => {
                    trace!(
                        family,
                        discriminator = registration.discriminator,
                        rust_type = registration.rust_type,
                        "registered polymorphic type"
                    );
                    slot.insert(registration);
                }
            }
        }
        Ok(Self { family, entries })
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, discriminator: &str) -> bool {
        self.entries.contains_key(discriminator)
    }

    /// All registered discriminators, sorted.
    pub fn discriminators(&self) -> Vec<&'static str> {
        let mut known: Vec<_> = self.entries.keys().copied().collect();
        known.sort_unstable();
        known
    }

    /// Look up the registration for a discriminator.
    pub fn resolve(&self, discriminator: &str) -> Result<&Registration<S>, CodecError> {
        self.entries
            .get(discriminator)
            .ok_or_else(|| CodecError::UnknownType {
                family: self.family,
                discriminator: discriminator.to_owned(),
                known: self.discriminators(),
            })
    }

    pub(crate) fn decode(&self, codec: &SweCodec, raw: &Value) -> Result<Box<S>, CodecError> {
        let members = raw.as_object().ok_or(CodecError::NotAnObject {
            family: self.family,
        })?;
        let discriminator = members
            .get(DISCRIMINATOR_KEY)
            .and_then(Value::as_str)
            .ok_or(CodecError::MissingDiscriminator {
                family: self.family,
                key: DISCRIMINATOR_KEY,
            })?;
        let registration = self.resolve(discriminator)?;
        (registration.decode)(codec, raw)
    }
}

impl<S: ?Sized> fmt::Debug for TypeRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("family", &self.family)
            .field("discriminators", &self.discriminators())
            .finish()
    }
}
