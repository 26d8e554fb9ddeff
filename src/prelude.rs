//! Commonly used items for convenient importing.
//!
//! # Usage
//!
//! ```rust
//! use erasure::prelude::*;
//!
//! type Number = (CopyConstructible, Addable, Displayable, Typeid);
//!
//! let left: Any<Number> = Any::new(1.5_f64);
//! let right: Any<Number> = Any::new(2.0_f64);
//! assert_eq!((&left + &right).to_string(), "3.5");
//! ```
//!
//! # What's Included
//!
//! - **[`Any`], [`AnyRef`], [`AnyMut`]**: The erased value flavors
//! - **[`Binding`]**: Shared operation tables
//! - **[`BadDispatch`]**: The dispatch error
//! - **[`Concept`]**: The trait implemented by all concepts
//! - The requirement catalog and the [`This`] placeholder

pub use crate::{
    Any, AnyMut, AnyRef, BadDispatch, Binding, Concept,
    requirements::{
        AddAssignable, Addable, Assignable, Callable, Constructible, CopyConstructible,
        Debuggable, Dereferenceable, Destructible, Displayable, EqualityComparable,
        LessThanComparable, Multipliable, Relaxed, SameType, SubAssignable, Subtractable, Typeid,
    },
    slots::This,
};
