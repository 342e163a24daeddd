//! Rule variables.
//!
//! The host supplies a store of named variables a rule can reference either
//! bare (`${name}` in identifier position) or interpolated inside string
//! literals. A variable yields one of four evaluator kinds: string, int,
//! string array, or int array.

use std::collections::HashMap;
use std::sync::Arc;

use crate::evaluator::{
    Evaluator, IntArrayEvaluator, IntEvaluator, StringArrayEvaluator, StringEvaluator,
};

/// A host-supplied variable.
pub trait VariableValue: Send + Sync {
    /// The evaluator this variable expands to.
    fn evaluator(&self) -> Evaluator;
}

/// Named variables available to a compilation.
pub type VariableStore = HashMap<String, Arc<dyn VariableValue>>;

/// A constant string variable.
pub struct StringVariable(pub String);

impl VariableValue for StringVariable {
    fn evaluator(&self) -> Evaluator {
        Evaluator::String(StringEvaluator::scalar(self.0.clone()))
    }
}

/// A constant integer variable.
pub struct IntVariable(pub i64);

impl VariableValue for IntVariable {
    fn evaluator(&self) -> Evaluator {
        Evaluator::Int(IntEvaluator::value(self.0))
    }
}

/// A constant string-array variable.
pub struct StringArrayVariable(pub Vec<String>);

impl VariableValue for StringArrayVariable {
    fn evaluator(&self) -> Evaluator {
        Evaluator::StringArray(StringArrayEvaluator::value(self.0.clone()))
    }
}

/// A constant int-array variable.
pub struct IntArrayVariable(pub Vec<i64>);

impl VariableValue for IntArrayVariable {
    fn evaluator(&self) -> Evaluator {
        Evaluator::IntArray(IntArrayEvaluator::value(self.0.clone()))
    }
}

/// Build a store from `(name, variable)` pairs.
pub fn variable_store<I>(vars: I) -> VariableStore
where
    I: IntoIterator<Item = (&'static str, Arc<dyn VariableValue>)>,
{
    vars.into_iter()
        .map(|(name, var)| (name.to_string(), var))
        .collect()
}
