//! Field resolution.
//!
//! Rewrites identifier paths containing `[...]` subscripts into
//! `(resolved_field, iterator_field, register_id)` triples, applies legacy
//! renames, walks dotted prefixes to discover implicit iterators, and keeps
//! the per-register bookkeeping consistent.

use std::collections::BTreeSet;
use std::sync::Arc;

use secl_ast::Pos;

use crate::error::{CompileError, Result};
use crate::evaluator::Evaluator;
use crate::model::IteratorFactory;
use crate::state::{RegisterInfo, State};

/// The parts of a subscripted identifier.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ExtractedField {
    /// The field with the subscript stripped, e.g. `process.ancestors.name`.
    pub field: String,
    /// The prefix up to the subscript, e.g. `process.ancestors`; empty when
    /// the identifier has no subscript.
    pub iterator_field: String,
    /// The literal register id inside the subscript; empty when absent.
    pub register_id: String,
}

/// Split one `[...]` subscript out of an identifier.
pub(crate) fn extract_field(field: &str, state: &State<'_>, pos: Pos) -> Result<ExtractedField> {
    let cache = &state.regex_cache;

    if cache.subscript_find.find_iter(field).count() > 1 {
        return Err(CompileError::SubscriptFormat {
            pos,
            field: field.to_string(),
        });
    }

    let Some(caps) = cache.subscript_find.captures(field) else {
        return Ok(ExtractedField {
            field: field.to_string(),
            iterator_field: String::new(),
            register_id: String::new(),
        });
    };
    let register_id = caps[1].to_string();

    let resolved = cache.subscript_strip.replace(field, "$1$2").into_owned();
    let iterator_field = cache.subscript_strip.replace(field, "$1").into_owned();

    Ok(ExtractedField {
        field: resolved,
        iterator_field,
        register_id,
    })
}

/// Record `resolved_field` under `register_id` in the state.
///
/// A register is bound to exactly one iterator field; a second binding with
/// a different iterator field is a compile error. Binding the same iterator
/// field again extends the register's sub-field set, so every sub-field
/// evaluated under the register sees the same iteration element.
pub(crate) fn bind_register(
    state: &mut State<'_>,
    register_id: &str,
    iterator_field: &str,
    iterator: Arc<dyn IteratorFactory>,
    resolved_field: &str,
    pos: Pos,
) -> Result<()> {
    if let Some(info) = state.register_info_mut(register_id) {
        if info.field != iterator_field {
            return Err(CompileError::RegisterMultipleFields {
                pos,
                id: register_id.to_string(),
            });
        }
        info.sub_fields.insert(resolved_field.to_string());
        return Ok(());
    }

    state.registers.push((
        register_id.to_string(),
        RegisterInfo {
            field: iterator_field.to_string(),
            iterator,
            sub_fields: BTreeSet::from([resolved_field.to_string()]),
        },
    ));
    Ok(())
}

/// Resolve an identifier to an evaluator.
///
/// Lookup order: model constants, macros, then the model field schema with
/// iterator and register handling.
pub(crate) fn ident_to_evaluator(name: &str, pos: Pos, state: &mut State<'_>) -> Result<Evaluator> {
    let model = state.model;

    if let Some(constant) = model.constant(name) {
        return Ok(constant);
    }

    if let Some(evaluator) = state.get_macro(name) {
        return Ok(evaluator.clone());
    }

    let extracted = extract_field(name, state, pos)?;
    let mut field = extracted.field;
    let mut iterator_field = extracted.iterator_field;
    let register_id = extracted.register_id;

    // legacy rule-authoring renames
    if let Some(renamed) = model.legacy_field(&field) {
        field = renamed.to_string();
    }
    if !iterator_field.is_empty()
        && let Some(renamed) = model.legacy_field(&iterator_field)
    {
        iterator_field = renamed.to_string();
    }

    let mut iterator = None;
    if !iterator_field.is_empty() {
        iterator = Some(model.iterator(&iterator_field).ok_or_else(|| {
            CompileError::IteratorNotFound {
                pos,
                field: iterator_field.clone(),
            }
        })?);
    } else {
        // detect an iterator along the dotted path
        let mut candidate = String::new();
        for segment in field.split('.') {
            if candidate.is_empty() {
                candidate = segment.to_string();
            } else {
                candidate = format!("{candidate}.{segment}");
            }
            if let Some(found) = model.iterator(&candidate) {
                iterator = Some(found);
                iterator_field = candidate;
                break;
            }
        }
    }

    let register_id = match iterator {
        Some(iterator) => {
            if !register_id.is_empty() && register_id != "_" {
                return Err(CompileError::RegisterNameNotAllowed {
                    pos,
                    id: register_id,
                });
            }

            let id = state.fresh_register_id(&iterator_field);
            bind_register(state, &id, &iterator_field, iterator, &field, pos)?;
            id
        }
        None => String::new(),
    };

    let accessor = model
        .evaluator(&field, &register_id)
        .map_err(|source| CompileError::Field { pos, source })?;

    state.note_field(&field);

    Ok(accessor)
}
