#![forbid(unsafe_code)]

//! Error type for binding operations.

use thiserror::Error;

/// Failure returned by [`Bindable::bind`](crate::Bindable::bind) and
/// [`Binder::bind`](crate::Binder::bind).
///
/// A failed bind leaves the entity exactly as it was: no key is recorded and
/// nothing is pushed to the surface. Treat it as a wiring mistake at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BindError {
    /// The entity already has a different parent binder.
    #[error("entity is already bound to a different binder")]
    AlreadyBound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_conflict() {
        assert_eq!(
            BindError::AlreadyBound.to_string(),
            "entity is already bound to a different binder"
        );
    }
}
