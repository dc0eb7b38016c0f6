use thiserror::Error;

/// Errors raised while building a type registry or resolving polymorphic
/// payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    // ── Registry construction ───────────────────────────────────────
    /// Two registered types resolved to the same discriminator.
    #[error("discriminator '{discriminator}' is claimed by both {first} and {second}")]
    DuplicateDiscriminator {
        discriminator: &'static str,
        first: &'static str,
        second: &'static str,
    },

    // ── Decoding ────────────────────────────────────────────────────
    /// The discriminator names no type registered for this family.
    #[error("unknown {family} type '{discriminator}' (known: {})", .known.join(", "))]
    UnknownType {
        family: &'static str,
        discriminator: String,
        known: Vec<&'static str>,
    },

    /// The payload carries no string discriminator member.
    #[error("{family} payload has no '{key}' member")]
    MissingDiscriminator {
        family: &'static str,
        key: &'static str,
    },

    /// Polymorphic payloads must be JSON objects.
    #[error("{family} payload is not a JSON object")]
    NotAnObject { family: &'static str },

    /// A nested member has the wrong JSON shape.
    #[error("member '{member}' must be {expected}")]
    InvalidMember {
        member: String,
        expected: &'static str,
    },

    /// The discriminator resolved, but the fields did not fit the type.
    #[error("failed to decode {discriminator}: {source}")]
    Malformed {
        discriminator: &'static str,
        #[source]
        source: serde_json::Error,
    },

    // ── Encoding ────────────────────────────────────────────────────
    #[error("failed to encode {discriminator}: {source}")]
    Encode {
        discriminator: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl CodecError {
    /// Returns `true` if the payload named a type nobody registered.
    pub fn is_unknown_type(&self) -> bool {
        matches!(self, Self::UnknownType { .. })
    }
}
