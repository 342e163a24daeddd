//! Compilation error types.
//!
//! Every compilation step returns either a value or a [`CompileError`];
//! errors bubble to the caller unchanged, carrying the source position of
//! the offending node. The evaluator runtime itself is total and has no
//! error channel.

use secl_ast::Pos;
use std::fmt;
use thiserror::Error;

/// The operand kind a type error expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    Duration,
    String,
    Cidr,
    BoolArray,
    IntArray,
    StringArray,
    CidrArray,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Duration => "duration",
            Kind::String => "string",
            Kind::Cidr => "cidr",
            Kind::BoolArray => "bool array",
            Kind::IntArray => "int array",
            Kind::StringArray => "string array",
            Kind::CidrArray => "cidr array",
        };
        f.write_str(name)
    }
}

/// An error reported by the host model while resolving a field or iterator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("field `{0}` not found")]
    UnknownField(String),

    #[error("no iterator for `{0}`")]
    UnknownIterator(String),
}

/// A rule compilation failure.
///
/// Fatal to the rule being compiled; the caller may continue with other
/// rules. The position points at the offending AST node.
#[derive(Debug, Error)]
pub enum CompileError {
    /// An operand had the wrong kind for the operator being compiled.
    #[error("{pos}: type mismatch, expected {expected}")]
    Type { pos: Pos, expected: Kind },

    /// The operator exists but is not defined for these operand kinds.
    #[error("{pos}: operator `{op}` not supported here")]
    UnknownOperator { pos: Pos, op: &'static str },

    /// An IP or CIDR literal failed to parse.
    #[error("{pos}: invalid IP or CIDR `{literal}`")]
    InvalidCidr { pos: Pos, literal: String },

    /// A pattern or regex literal failed to compile.
    #[error("{pos}: invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pos: Pos,
        pattern: String,
        source: regex::Error,
    },

    /// A `${name}` reference named an unknown variable.
    #[error("{pos}: variable `{name}` doesn't exist")]
    VariableNotFound { pos: Pos, name: String },

    /// A variable expanded to an evaluator kind the context cannot use.
    #[error("{pos}: variable `{name}` type not supported")]
    VariableTypeUnsupported { pos: Pos, name: String },

    /// The right-hand side of `=~`/`!~` was a field accessor, not a literal.
    #[error("{pos}: non-static pattern on the right of `=~`/`!~` ({field})")]
    NonStaticPattern { pos: Pos, field: String },

    /// A register subscript used a name other than `_`.
    #[error("{pos}: register `{id}` not allowed, only `_` is supported")]
    RegisterNameNotAllowed { pos: Pos, id: String },

    /// One register id was bound to two different iterator fields.
    #[error("{pos}: register `{id}` used by multiple fields")]
    RegisterMultipleFields { pos: Pos, id: String },

    /// An identifier contained more than one `[...]` subscript.
    #[error("{pos}: wrong register format in `{field}`")]
    SubscriptFormat { pos: Pos, field: String },

    /// A subscripted identifier did not resolve to any model iterator.
    #[error("{pos}: no iterator for `{field}`")]
    IteratorNotFound { pos: Pos, field: String },

    /// The model rejected a field or iterator lookup.
    #[error("{pos}: {source}")]
    Field { pos: Pos, source: ModelError },
}

impl CompileError {
    /// The source position the error points at.
    pub fn pos(&self) -> Pos {
        match self {
            CompileError::Type { pos, .. }
            | CompileError::UnknownOperator { pos, .. }
            | CompileError::InvalidCidr { pos, .. }
            | CompileError::InvalidPattern { pos, .. }
            | CompileError::VariableNotFound { pos, .. }
            | CompileError::VariableTypeUnsupported { pos, .. }
            | CompileError::NonStaticPattern { pos, .. }
            | CompileError::RegisterNameNotAllowed { pos, .. }
            | CompileError::RegisterMultipleFields { pos, .. }
            | CompileError::SubscriptFormat { pos, .. }
            | CompileError::IteratorNotFound { pos, .. }
            | CompileError::Field { pos, .. } => *pos,
        }
    }

    /// Attach a position to an error synthesized away from the AST
    /// (operator combinators have no position of their own).
    pub(crate) fn at(mut self, at: Pos) -> Self {
        let slot = match &mut self {
            CompileError::Type { pos, .. }
            | CompileError::UnknownOperator { pos, .. }
            | CompileError::InvalidCidr { pos, .. }
            | CompileError::InvalidPattern { pos, .. }
            | CompileError::VariableNotFound { pos, .. }
            | CompileError::VariableTypeUnsupported { pos, .. }
            | CompileError::NonStaticPattern { pos, .. }
            | CompileError::RegisterNameNotAllowed { pos, .. }
            | CompileError::RegisterMultipleFields { pos, .. }
            | CompileError::SubscriptFormat { pos, .. }
            | CompileError::IteratorNotFound { pos, .. }
            | CompileError::Field { pos, .. } => pos,
        };
        if *slot == Pos::default() {
            *slot = at;
        }
        self
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, CompileError>;
