//! Runtime dispatch errors.

/// An operation could not be dispatched.
///
/// Returned by the fallible operations of erased values, and carried as the
/// panic message by operator impls whose signatures cannot return errors.
/// Dispatch errors are always detected before any value is modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BadDispatch {
    /// The operands were erased with different concrete types.
    #[error("operands hold different concrete types: `{left}` and `{right}`")]
    Mismatch {
        /// Concrete type of the first differing slot of the first operand.
        left: &'static str,
        /// Concrete type of the same slot of the other operand.
        right: &'static str,
    },
    /// The operation table has no entry for the requirement.
    #[error("the operation table has no entry for `{requirement}`")]
    MissingRequirement {
        /// Name of the requirement.
        requirement: &'static str,
    },
    /// A value does not have the concrete type its binding assigns to its
    /// slot.
    #[error("expected a value of type `{expected}`, found `{actual}`")]
    WrongType {
        /// The type assigned by the binding.
        expected: &'static str,
        /// The type of the value.
        actual: &'static str,
    },
    /// No operands were given.
    #[error("an operation needs at least one operand")]
    NoOperands,
}
