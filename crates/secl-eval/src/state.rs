//! Compile-time state.
//!
//! One [`State`] serves one rule compilation. It carries the model and
//! variable store handed in by the caller, the macro table, the register
//! bookkeeping for iterator-bound fields, the set of fields the rule
//! references, and the per-compilation regex cache used to parse `[...]`
//! subscripts. It is never shared across threads and is discarded once the
//! rule is compiled.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rand::Rng;
use regex::Regex;

use crate::evaluator::Evaluator;
use crate::model::{IteratorFactory, Model};
use crate::variables::VariableStore;

/// Characters a generated register id draws from.
const REGISTER_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated register ids.
const REGISTER_ID_LEN: usize = 8;

/// Everything recorded about one register.
pub struct RegisterInfo {
    /// The iterator field the register is bound to.
    pub field: String,
    /// The iterator factory driving the register.
    pub iterator: Arc<dyn IteratorFactory>,
    /// All sub-fields evaluated under this register.
    pub sub_fields: BTreeSet<String>,
}

pub(crate) struct RegexCache {
    /// Finds the first `[...]` subscript and captures its content.
    pub subscript_find: Regex,
    /// Strips one subscript: `$1` is the prefix, `$2` the remainder.
    pub subscript_strip: Regex,
}

/// Mutable compilation state for a single rule.
pub struct State<'a> {
    pub(crate) model: &'a dyn Model,
    pub(crate) variables: &'a VariableStore,
    macros: HashMap<String, Evaluator>,
    /// Registers in binding order; rules bind few registers, so linear
    /// lookup beats a map here.
    pub(crate) registers: Vec<(String, RegisterInfo)>,
    fields: BTreeSet<String>,
    pub(crate) regex_cache: RegexCache,
}

impl<'a> State<'a> {
    pub fn new(model: &'a dyn Model, variables: &'a VariableStore) -> Self {
        State {
            model,
            variables,
            macros: HashMap::new(),
            registers: Vec::new(),
            fields: BTreeSet::new(),
            regex_cache: RegexCache {
                subscript_find: Regex::new(r"\[([^\]]*)\]").expect("static regex"),
                subscript_strip: Regex::new(r"(.+)\[[^\]]*\](.*)").expect("static regex"),
            },
        }
    }

    /// Register a macro under its name. Later identifier lookups return the
    /// stored evaluator verbatim.
    pub fn add_macro(&mut self, name: impl Into<String>, evaluator: Evaluator) {
        self.macros.insert(name.into(), evaluator);
    }

    pub(crate) fn get_macro(&self, name: &str) -> Option<&Evaluator> {
        self.macros.get(name)
    }

    /// All fields referenced by the rule so far, sorted. Exposed for
    /// event-prefilter construction.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub(crate) fn note_field(&mut self, field: &str) {
        self.fields.insert(field.to_string());
    }

    pub(crate) fn register_info(&self, id: &str) -> Option<&RegisterInfo> {
        self.registers
            .iter()
            .find(|(reg_id, _)| reg_id == id)
            .map(|(_, info)| info)
    }

    pub(crate) fn register_info_mut(&mut self, id: &str) -> Option<&mut RegisterInfo> {
        self.registers
            .iter_mut()
            .find(|(reg_id, _)| reg_id == id)
            .map(|(_, info)| info)
    }

    /// Allocate a fresh register id for `iterator_field`, resampling on the
    /// astronomically unlikely collision with a different field's register.
    pub(crate) fn fresh_register_id(&self, iterator_field: &str) -> String {
        loop {
            let id = random_register_id();
            match self.register_info(&id) {
                Some(info) if info.field != iterator_field => continue,
                _ => return id,
            }
        }
    }
}

/// An 8-character lowercase alphanumeric register id.
fn random_register_id() -> String {
    let mut rng = rand::rng();
    (0..REGISTER_ID_LEN)
        .map(|_| REGISTER_ID_CHARSET[rng.random_range(0..REGISTER_ID_CHARSET.len())] as char)
        .collect()
}
