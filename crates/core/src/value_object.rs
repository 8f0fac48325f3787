//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are compared by their attribute values.
/// A `Price` of 12.50 is the same price wherever it appears, while two
/// products named "Box" remain distinct entities.
///
/// Value objects are immutable: to "modify" one, build a new value. Validation
/// happens at construction so a value object that exists is always valid.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
