//! Link validation framework.
//!
//! Validators decide whether a link from an output slot to an input slot may
//! exist. Drag candidates consult them while hovering and again before
//! committing.

use crate::ids::{SlotKind, SlotRef};
use crate::network::LinkNetwork;
use thiserror::Error;

/// Result of validating a prospective link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Link is valid
    Valid,
    /// Link is invalid with a reason
    Invalid(ValidationError),
}

impl ValidationResult {
    /// Check if the result is valid
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// Combine two results (AND logic): returns first error if any
    pub fn and(self, other: ValidationResult) -> ValidationResult {
        match self {
            ValidationResult::Valid => other,
            invalid => invalid,
        }
    }
}

/// Reasons why a link validation failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cannot link slots on the same node")]
    SameNode,
    #[error("must connect an output to an input")]
    IncompatibleDirection,
    #[error("link already exists")]
    DuplicateLink,
    #[error("type mismatch: input accepts {expected}, output provides {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("link would route through its own reroute")]
    RerouteLoop,
    #[error("{0}")]
    Custom(String),
}

/// Trait for custom link validation logic.
///
/// `origin` is always the output end and `target` the input end.
///
/// Closures with the same signature implement the trait:
///
/// ```ignore
/// let only_images = |origin: SlotRef, _target: SlotRef, net: &LinkNetwork| {
///     if net.slot_type(origin) == "IMAGE" {
///         ValidationResult::Valid
///     } else {
///         ValidationResult::Invalid(ValidationError::Custom("images only".into()))
///     }
/// };
/// let validator = default_validator().add(only_images);
/// ```
pub trait ConnectionValidator {
    fn validate(&self, origin: SlotRef, target: SlotRef, network: &LinkNetwork) -> ValidationResult;
}

impl<F> ConnectionValidator for F
where
    F: Fn(SlotRef, SlotRef, &LinkNetwork) -> ValidationResult,
{
    fn validate(&self, origin: SlotRef, target: SlotRef, network: &LinkNetwork) -> ValidationResult {
        self(origin, target, network)
    }
}

/// Checks slot directions and refuses self-links on a node.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectionValidator;

impl ConnectionValidator for DirectionValidator {
    fn validate(&self, origin: SlotRef, target: SlotRef, _network: &LinkNetwork) -> ValidationResult {
        if origin.kind != SlotKind::Output || target.kind != SlotKind::Input {
            return ValidationResult::Invalid(ValidationError::IncompatibleDirection);
        }
        if origin.node == target.node {
            return ValidationResult::Invalid(ValidationError::SameNode);
        }
        ValidationResult::Valid
    }
}

/// Validator that prevents duplicate links
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDuplicatesValidator;

impl ConnectionValidator for NoDuplicatesValidator {
    fn validate(&self, origin: SlotRef, target: SlotRef, network: &LinkNetwork) -> ValidationResult {
        if network.has_link(origin, target) {
            ValidationResult::Invalid(ValidationError::DuplicateLink)
        } else {
            ValidationResult::Valid
        }
    }
}

/// Compares the slot type signatures registered in the [`LinkNetwork`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TypeCompatibilityValidator;

impl ConnectionValidator for TypeCompatibilityValidator {
    fn validate(&self, origin: SlotRef, target: SlotRef, network: &LinkNetwork) -> ValidationResult {
        let found = network.slot_type(origin);
        let expected = network.slot_type(target);
        if types_compatible(found, expected) {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(ValidationError::TypeMismatch {
                expected: expected.to_owned(),
                found: found.to_owned(),
            })
        }
    }
}

/// Whether an output of type `a` may feed an input of type `b`.
///
/// `*` and the empty string accept anything. Comparison ignores case.
/// Comma-separated lists are compatible when any pair of members is.
pub fn types_compatible(a: &str, b: &str) -> bool {
    let wildcard = |t: &str| t.is_empty() || t == "*";
    if wildcard(a) || wildcard(b) || a == b {
        return true;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if !a.contains(',') && !b.contains(',') {
        return a == b;
    }
    a.split(',')
        .map(str::trim)
        .any(|x| b.split(',').map(str::trim).any(|y| types_compatible(x, y)))
}

/// Composite validator that combines multiple validators
///
/// All validators must return Valid for the link to be valid (AND logic).
/// Returns the first error encountered (short-circuits on failure).
#[derive(Default)]
pub struct CompositeValidator {
    validators: Vec<Box<dyn ConnectionValidator>>,
}

impl CompositeValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator to the composite
    ///
    /// Validators are checked in the order they were added.
    pub fn add<V: ConnectionValidator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl ConnectionValidator for CompositeValidator {
    fn validate(&self, origin: SlotRef, target: SlotRef, network: &LinkNetwork) -> ValidationResult {
        for validator in &self.validators {
            let result = validator.validate(origin, target, network);
            if !result.is_valid() {
                return result;
            }
        }
        ValidationResult::Valid
    }
}

/// Direction, duplicate and type checks, in that order.
pub fn default_validator() -> CompositeValidator {
    CompositeValidator::new()
        .add(DirectionValidator)
        .add(NoDuplicatesValidator)
        .add(TypeCompatibilityValidator)
}

/// Validate a link between two slots given in either order.
pub fn validate_link<V>(validator: &V, a: SlotRef, b: SlotRef, network: &LinkNetwork) -> ValidationResult
where
    V: ConnectionValidator + ?Sized,
{
    if a.kind == b.kind {
        return ValidationResult::Invalid(ValidationError::IncompatibleDirection);
    }
    let (origin, target) = if a.kind == SlotKind::Output { (a, b) } else { (b, a) };
    validator.validate(origin, target, network)
}
