//! SWE Common data components for SensorThings tasking parameters.
//!
//! Tasking capabilities describe their accepted parameters as a tree of SWE
//! Common components (`DataRecord`, `Category`, `Text`, ...), each optionally
//! carrying a constraint (`AllowedTokens`, `AllowedValues`, ...). On the wire
//! every node names its concrete type in a `"type"` member, and the set of
//! subtypes is open-ended.
//!
//! - **[`SweCodec`]**: built once, owns one [`TypeRegistry`] per supertype
//!   family and resolves `"type"` discriminators to concrete Rust types.
//!   Unknown discriminators are hard errors, never a silent fallback.
//! - **[`SweType`]**: implemented by every concrete subtype. The
//!   discriminator is the explicit [`SweType::SWE_NAME`] marker if present,
//!   otherwise the short Rust type name.
//! - **[`DataComponent`] / [`Constraint`]**: object-safe supertypes that
//!   nested trees are decoded into.
//!
//! Register additional subtypes through [`SweCodec::builder`].

pub mod codec;
pub mod component;
pub mod constraint;
pub mod error;
pub mod record;
pub mod registry;

pub use codec::{SweCodec, SweCodecBuilder};
pub use component::{
    Boolean, Category, CategoryRange, ComponentHeader, ComponentType, Count, CountRange,
    DataComponent, Quantity, QuantityRange, Text, TimeInstant, TimeRange, UnitReference,
};
pub use constraint::{AllowedTimes, AllowedTokens, AllowedValues, Constraint, ConstraintType};
pub use error::CodecError;
pub use record::{DataChoice, DataRecord};
pub use registry::{DISCRIMINATOR_KEY, Registration, SweType, TypeRegistry, discriminator_of};
