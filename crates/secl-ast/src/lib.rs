//! # secl-ast
//!
//! Syntax tree for SECL security expressions.
//!
//! This crate holds the data model a SECL grammar front-end produces and the
//! evaluator compiler consumes: expression nodes, literal kinds, array forms,
//! and source positions. It contains no parsing logic; any parser that emits
//! these nodes can drive the compiler in `secl-eval`.
//!
//! Operator precedence is the parser's responsibility. By the time an
//! [`Expr`] tree reaches a consumer, grouping is already explicit in the
//! nesting.

pub mod expr;

pub use expr::{
    Array, BitwiseOp, CidrMember, ComparisonOp, Expr, LogicalOp, MembershipOp, Pos, Primary,
    StringMember, UnaryOp,
};
