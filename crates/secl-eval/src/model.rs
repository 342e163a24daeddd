//! The host model contract.
//!
//! The model is the schema of everything a rule can reference: field
//! accessors, iterators over nested sequences, named constants, and legacy
//! field renames. The compiler consumes it through this narrow interface and
//! never inspects the event shape itself.

use std::sync::Arc;

use crate::context::Context;
use crate::error::ModelError;
use crate::evaluator::Evaluator;

/// A host-provided traversal over a nested sequence field.
///
/// During evaluation the iteration wrapper asks the factory how many
/// elements the bound field has for the current event, then binds the
/// register slot to each index in turn.
pub trait IteratorFactory: Send + Sync {
    /// Number of elements for this event; bounded by the host event.
    fn count(&self, ctx: &Context<'_>) -> usize;
}

/// The host-defined schema of available fields.
pub trait Model {
    /// An accessor for the named field, optionally scoped to a register.
    ///
    /// When `register_id` is non-empty the field lies under an iterator and
    /// the returned accessor must read the register slot to find the current
    /// element.
    fn evaluator(&self, field: &str, register_id: &str) -> Result<Evaluator, ModelError>;

    /// An iterator factory for the named field, if it is iterable.
    fn iterator(&self, field: &str) -> Option<Arc<dyn IteratorFactory>>;

    /// Rename table for backwards-compatible rule authoring.
    fn legacy_field(&self, _field: &str) -> Option<&str> {
        None
    }

    /// A built-in named constant.
    fn constant(&self, _name: &str) -> Option<Evaluator> {
        None
    }
}
