//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects carry no identity and are compared by their attributes
/// (a mutation quantity, a stock direction). They are immutable: "changing"
/// one means constructing a new value, which is where validation happens.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
