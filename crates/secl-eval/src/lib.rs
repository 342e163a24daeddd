//! # secl-eval
//!
//! Compiler and evaluator runtime for SECL security expressions.
//!
//! This crate consumes the AST produced by [`secl_ast`] and compiles it into
//! a tree of typed evaluators that can be applied to incoming events with
//! minimal overhead, using a compile-then-evaluate model.
//!
//! ## Architecture
//!
//! - **Resolver**: rewrites identifier paths with `[...]` subscripts into
//!   register-bound iterator traversals and tracks every field a rule
//!   touches.
//! - **Compiler**: a type-directed walk over the AST, dispatching on operand
//!   types and operator kinds through an exhaustive match.
//! - **Evaluator runtime**: constant-or-closure leaf evaluators composed by
//!   operator combinators; compiled trees are immutable and can be evaluated
//!   concurrently from distinct [`Context`]s.
//!
//! The host plugs in through three narrow contracts: a [`Model`] (field
//! schema, iterators, constants, legacy renames), a [`VariableStore`], and
//! optional per-accessor [`OpOverrides`].
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use secl_ast::{ComparisonOp, Expr, Pos, Primary};
//! use secl_eval::{
//!     Context, Evaluator, IteratorFactory, Model, ModelError, State, StringEvaluator,
//!     VariableStore, compile,
//! };
//! use serde_json::json;
//!
//! struct ProcessModel;
//!
//! impl Model for ProcessModel {
//!     fn evaluator(&self, field: &str, _register_id: &str) -> Result<Evaluator, ModelError> {
//!         match field {
//!             "process.name" => Ok(Evaluator::String(StringEvaluator::handler(field, |ctx| {
//!                 ctx.event().str("process.name")
//!             }))),
//!             _ => Err(ModelError::UnknownField(field.to_string())),
//!         }
//!     }
//!
//!     fn iterator(&self, _field: &str) -> Option<Arc<dyn IteratorFactory>> {
//!         None
//!     }
//! }
//!
//! // process.name == "sshd"  (normally produced by the grammar front-end)
//! let rule = Expr::Comparison {
//!     op: ComparisonOp::Eq,
//!     lhs: Box::new(Expr::Primary(Primary::Ident {
//!         name: "process.name".into(),
//!         pos: Pos::default(),
//!     })),
//!     rhs: Box::new(Expr::Primary(Primary::Str {
//!         value: "sshd".into(),
//!         pos: Pos::default(),
//!     })),
//!     pos: Pos::default(),
//! };
//!
//! let vars = VariableStore::new();
//! let mut state = State::new(&ProcessModel, &vars);
//! let (compiled, _complexity) = compile(&rule, &mut state).unwrap();
//!
//! let event = json!({"process": {"name": "sshd"}});
//! assert!(compiled.eval(&Context::new(&event)));
//! assert_eq!(state.fields().collect::<Vec<_>>(), vec!["process.name"]);
//! ```

pub mod cidr;
pub mod compiler;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod model;
pub mod operators;
pub mod resolver;
pub mod state;
pub mod strings;
pub mod variables;

// Re-export the most commonly used types and functions at crate root
pub use cidr::{CidrValues, host_net, nets_match, parse_cidr};
pub use compiler::compile;
pub use context::Context;
pub use error::{CompileError, Kind, ModelError, Result};
pub use evaluator::{
    BoolArrayEvaluator, BoolEvaluator, CidrArrayEvaluator, CidrEvaluator, CidrValuesEvaluator,
    EvalFnc, EvalKind, Evaluator, IntArrayEvaluator, IntEvaluator, OpOverrides,
    StringArrayEvaluator, StringEvaluator, StringValuesEvaluator, ValueType,
};
pub use event::Event;
pub use model::{IteratorFactory, Model};
pub use state::{RegisterInfo, State};
pub use strings::{StringMatcher, StringValues, glob_to_regex};
pub use variables::{
    IntArrayVariable, IntVariable, StringArrayVariable, StringVariable, VariableStore,
    VariableValue, variable_store,
};
