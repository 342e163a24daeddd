//! Type-directed compilation of expression trees into evaluators.
//!
//! The compiler walks the AST and dispatches on operand types and operator
//! kinds, emitting evaluator nodes through the operator combinators. The
//! dispatch matrix is exhaustive: any pairing outside it is a type error at
//! the offending position.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use secl_ast::{
    Array, BitwiseOp, CidrMember, ComparisonOp, Expr, LogicalOp, MembershipOp, Pos, Primary,
    StringMember, UnaryOp,
};

use crate::cidr::{CidrValues, parse_cidr};
use crate::context::Context;
use crate::error::{CompileError, Kind, Result};
use crate::evaluator::{
    BoolEvaluator, CidrEvaluator, CidrValuesEvaluator, EvalKind, Evaluator, IntArrayEvaluator,
    IntEvaluator, StringEvaluator, StringValuesEvaluator, ValueType,
};
use crate::model::IteratorFactory;
use crate::operators as ops;
use crate::resolver::ident_to_evaluator;
use crate::state::State;
use crate::strings::StringValues;

/// Matches one `${name}` interpolation inside a string literal.
static VARIABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{[^}]+\}").expect("static regex"));

/// Compile a rule's root expression.
///
/// The root must be boolean-typed. On success, returns the compiled
/// evaluator and the rule's complexity weight; the fields the rule
/// references are left on the state for prefilter construction.
pub fn compile(expr: &Expr, state: &mut State<'_>) -> Result<(BoolEvaluator, usize)> {
    let (evaluator, pos) = compile_node(expr, state)?;
    let Evaluator::Bool(root) = evaluator else {
        return Err(CompileError::Type {
            pos,
            expected: Kind::Bool,
        });
    };

    let root = wrap_registers(root, state);
    let complexity = root.weight;
    Ok((root, complexity))
}

/// The declared kind of an evaluator, for type-error messages.
fn operand_kind(evaluator: &Evaluator) -> Kind {
    match evaluator {
        Evaluator::Bool(_) => Kind::Bool,
        Evaluator::Int(_) => Kind::Int,
        Evaluator::String(_) => Kind::String,
        Evaluator::Cidr(_) => Kind::Cidr,
        Evaluator::BoolArray(_) => Kind::BoolArray,
        Evaluator::IntArray(_) => Kind::IntArray,
        Evaluator::StringArray(_) | Evaluator::StringValues(_) => Kind::StringArray,
        Evaluator::CidrArray(_) | Evaluator::CidrValues(_) => Kind::CidrArray,
    }
}

/// The array kind a membership right-hand side should have had for this
/// left-hand operand.
fn expected_member_kind(lhs: &Evaluator) -> Kind {
    match lhs {
        Evaluator::Bool(_) | Evaluator::BoolArray(_) => Kind::BoolArray,
        Evaluator::Int(_) | Evaluator::IntArray(_) => Kind::IntArray,
        Evaluator::String(_) | Evaluator::StringArray(_) | Evaluator::StringValues(_) => {
            Kind::StringArray
        }
        Evaluator::Cidr(_) | Evaluator::CidrArray(_) | Evaluator::CidrValues(_) => Kind::CidrArray,
    }
}

fn compile_node(expr: &Expr, state: &mut State<'_>) -> Result<(Evaluator, Pos)> {
    match expr {
        Expr::Logical { op, lhs, rhs, pos } => {
            let (lhs, lpos) = compile_node(lhs, state)?;
            let Evaluator::Bool(lhs) = lhs else {
                return Err(CompileError::Type {
                    pos: lpos,
                    expected: Kind::Bool,
                });
            };
            let (rhs, rpos) = compile_node(rhs, state)?;
            let Evaluator::Bool(rhs) = rhs else {
                return Err(CompileError::Type {
                    pos: rpos,
                    expected: Kind::Bool,
                });
            };
            let combined = match op {
                LogicalOp::And => ops::and(&lhs, &rhs),
                LogicalOp::Or => ops::or(&lhs, &rhs),
            };
            Ok((Evaluator::Bool(combined), *pos))
        }

        Expr::Bitwise { op, lhs, rhs, pos } => {
            let (lhs, lpos) = compile_node(lhs, state)?;
            let Evaluator::Int(lhs) = lhs else {
                return Err(CompileError::Type {
                    pos: lpos,
                    expected: Kind::Int,
                });
            };
            let (rhs, rpos) = compile_node(rhs, state)?;
            let Evaluator::Int(rhs) = rhs else {
                return Err(CompileError::Type {
                    pos: rpos,
                    expected: Kind::Int,
                });
            };
            let combined = match op {
                BitwiseOp::And => ops::int_and(&lhs, &rhs),
                BitwiseOp::Or => ops::int_or(&lhs, &rhs),
                BitwiseOp::Xor => ops::int_xor(&lhs, &rhs),
            };
            Ok((Evaluator::Int(combined), *pos))
        }

        Expr::Comparison { op, lhs, rhs, pos } => {
            let (lhs, _lpos) = compile_node(lhs, state)?;
            let (rhs, rpos) = compile_node(rhs, state)?;
            let combined = compile_comparison(*op, lhs, rhs, *pos, rpos, state)?;
            Ok((Evaluator::Bool(combined), *pos))
        }

        Expr::Membership { op, lhs, rhs, pos } => {
            let (lhs, _lpos) = compile_node(lhs, state)?;
            let (rhs, rpos) = array_to_evaluator(rhs, state)?;
            let combined = compile_membership(*op, lhs, rhs, *pos, rpos, state)?;
            Ok((Evaluator::Bool(combined), *pos))
        }

        Expr::Unary { op, operand, pos } => {
            let (operand, opos) = compile_node(operand, state)?;
            match op {
                UnaryOp::Not => {
                    let Evaluator::Bool(operand) = operand else {
                        return Err(CompileError::Type {
                            pos: opos,
                            expected: Kind::Bool,
                        });
                    };
                    Ok((Evaluator::Bool(ops::not(&operand)), *pos))
                }
                UnaryOp::Minus => {
                    let Evaluator::Int(operand) = operand else {
                        return Err(CompileError::Type {
                            pos: opos,
                            expected: Kind::Int,
                        });
                    };
                    Ok((Evaluator::Int(ops::minus(&operand)), *pos))
                }
                UnaryOp::BitNot => {
                    let Evaluator::Int(operand) = operand else {
                        return Err(CompileError::Type {
                            pos: opos,
                            expected: Kind::Int,
                        });
                    };
                    Ok((Evaluator::Int(ops::int_not(&operand)), *pos))
                }
            }
        }

        Expr::Primary(primary) => compile_primary(primary, state),
    }
}

// =============================================================================
// Scalar comparisons
// =============================================================================

fn compile_comparison(
    op: ComparisonOp,
    lhs: Evaluator,
    rhs: Evaluator,
    pos: Pos,
    rpos: Pos,
    state: &mut State<'_>,
) -> Result<BoolEvaluator> {
    use ComparisonOp::*;

    match (lhs, rhs) {
        (Evaluator::Bool(a), Evaluator::Bool(b)) => match op {
            Eq => Ok(ops::bool_equals(&a, &b)),
            Ne => Ok(ops::not(&ops::bool_equals(&a, &b))),
            _ => Err(CompileError::UnknownOperator {
                pos,
                op: op.symbol(),
            }),
        },

        // scalar-vs-array equality: existential over the array side
        (Evaluator::BoolArray(arr), Evaluator::Bool(b)) => match op {
            Eq => Ok(ops::bool_array_contains(&b, &arr)),
            Ne => Ok(ops::not(&ops::bool_array_contains(&b, &arr))),
            _ => Err(CompileError::UnknownOperator {
                pos,
                op: op.symbol(),
            }),
        },

        (Evaluator::String(a), Evaluator::String(mut b)) => match op {
            Eq => ops::string_equals_wrapper(&a, &b, state).map_err(|e| e.at(pos)),
            Ne => Ok(ops::not(
                &ops::string_equals_wrapper(&a, &b, state).map_err(|e| e.at(pos))?,
            )),
            Matches | NotMatches => {
                promote_pattern(&mut b, rpos)?;
                let eq = ops::string_equals_wrapper(&a, &b, state).map_err(|e| e.at(pos))?;
                Ok(if op == NotMatches { ops::not(&eq) } else { eq })
            }
            _ => Err(CompileError::UnknownOperator {
                pos,
                op: op.symbol(),
            }),
        },

        (Evaluator::StringArray(arr), Evaluator::String(mut s)) => match op {
            Eq => ops::string_array_contains_wrapper(&s, &arr, state).map_err(|e| e.at(pos)),
            Ne => Ok(ops::not(
                &ops::string_array_contains_wrapper(&s, &arr, state).map_err(|e| e.at(pos))?,
            )),
            Matches | NotMatches => {
                promote_pattern(&mut s, rpos)?;
                let contains =
                    ops::string_array_contains_wrapper(&s, &arr, state).map_err(|e| e.at(pos))?;
                Ok(if op == NotMatches {
                    ops::not(&contains)
                } else {
                    contains
                })
            }
            _ => Err(CompileError::UnknownOperator {
                pos,
                op: op.symbol(),
            }),
        },

        (Evaluator::Cidr(a), Evaluator::Cidr(b)) => match op {
            Eq => Ok(ops::cidr_equals(&a, &b)),
            Ne => Ok(ops::not(&ops::cidr_equals(&a, &b))),
            _ => Err(CompileError::UnknownOperator {
                pos,
                op: op.symbol(),
            }),
        },

        (Evaluator::Int(a), Evaluator::Int(b)) => {
            if b.is_duration {
                if !a.is_duration {
                    return Err(CompileError::Type {
                        pos,
                        expected: Kind::Duration,
                    });
                }
                match op {
                    Lt => Ok(ops::duration_compare(&a, &b, |e, w| e < w)),
                    Le => Ok(ops::duration_compare(&a, &b, |e, w| e <= w)),
                    Gt => Ok(ops::duration_compare(&a, &b, |e, w| e > w)),
                    Ge => Ok(ops::duration_compare(&a, &b, |e, w| e >= w)),
                    _ => Err(CompileError::Type {
                        pos: rpos,
                        expected: Kind::Int,
                    }),
                }
            } else {
                match op {
                    Eq => Ok(ops::int_compare(&a, &b, |x, y| x == y)),
                    Ne => Ok(ops::not(&ops::int_compare(&a, &b, |x, y| x == y))),
                    Lt => Ok(ops::int_compare(&a, &b, |x, y| x < y)),
                    Le => Ok(ops::int_compare(&a, &b, |x, y| x <= y)),
                    Gt => Ok(ops::int_compare(&a, &b, |x, y| x > y)),
                    Ge => Ok(ops::int_compare(&a, &b, |x, y| x >= y)),
                    Matches | NotMatches => Err(CompileError::UnknownOperator {
                        pos,
                        op: op.symbol(),
                    }),
                }
            }
        }

        (Evaluator::Int(a), Evaluator::IntArray(arr)) => match op {
            Eq => Ok(ops::int_array_compare(&a, &arr, |x, y| x == y)),
            Ne => Ok(ops::not(&ops::int_array_compare(&a, &arr, |x, y| x == y))),
            Lt => Ok(ops::int_array_compare(&a, &arr, |x, y| x < y)),
            Le => Ok(ops::int_array_compare(&a, &arr, |x, y| x <= y)),
            Gt => Ok(ops::int_array_compare(&a, &arr, |x, y| x > y)),
            Ge => Ok(ops::int_array_compare(&a, &arr, |x, y| x >= y)),
            Matches | NotMatches => Err(CompileError::UnknownOperator {
                pos,
                op: op.symbol(),
            }),
        },

        // symmetric swap: the predicate flips around the array elements
        (Evaluator::IntArray(arr), Evaluator::Int(b)) => match op {
            Eq => Ok(ops::int_array_compare(&b, &arr, |x, y| x == y)),
            Ne => Ok(ops::not(&ops::int_array_compare(&b, &arr, |x, y| x == y))),
            Lt => Ok(ops::int_array_compare(&b, &arr, |s, el| el < s)),
            Le => Ok(ops::int_array_compare(&b, &arr, |s, el| el <= s)),
            Gt => Ok(ops::int_array_compare(&b, &arr, |s, el| el > s)),
            Ge => Ok(ops::int_array_compare(&b, &arr, |s, el| el >= s)),
            Matches | NotMatches => Err(CompileError::UnknownOperator {
                pos,
                op: op.symbol(),
            }),
        },

        (lhs, _) => Err(CompileError::Type {
            pos: rpos,
            expected: operand_kind(&lhs),
        }),
    }
}

fn promote_pattern(evaluator: &mut StringEvaluator, rpos: Pos) -> Result<()> {
    if !evaluator.is_static() {
        return Err(CompileError::NonStaticPattern {
            pos: rpos,
            field: evaluator.field_name().to_string(),
        });
    }
    if evaluator.value_type == ValueType::Scalar {
        evaluator.value_type = ValueType::Pattern;
    }
    Ok(())
}

// =============================================================================
// Membership
// =============================================================================

fn compile_membership(
    op: MembershipOp,
    lhs: Evaluator,
    rhs: Evaluator,
    pos: Pos,
    rpos: Pos,
    state: &mut State<'_>,
) -> Result<BoolEvaluator> {
    use MembershipOp::*;

    // `notin` is `not in` for every operand pair; a scalar left-hand side
    // makes `allin` degenerate to `in` (singleton)
    let negate = op == NotIn;
    let universal = op == AllIn;

    let positive = match (&lhs, &rhs) {
        (Evaluator::Bool(b), Evaluator::BoolArray(arr)) => ops::bool_array_contains(b, arr),

        (Evaluator::String(s), Evaluator::StringArray(arr)) => {
            ops::string_array_contains_wrapper(s, arr, state).map_err(|e| e.at(pos))?
        }
        (Evaluator::String(s), Evaluator::StringValues(values)) => {
            ops::string_values_contains_wrapper(s, values, state).map_err(|e| e.at(pos))?
        }
        // symmetric swap: the constant set moved to the left of the operator
        (Evaluator::StringValues(values), Evaluator::StringArray(arr)) => {
            if universal {
                ops::string_array_matches_all(arr, values, state).map_err(|e| e.at(pos))?
            } else {
                ops::string_array_matches_wrapper(arr, values, state).map_err(|e| e.at(pos))?
            }
        }
        (Evaluator::StringArray(arr), Evaluator::StringValues(values)) => {
            if universal {
                ops::string_array_matches_all(arr, values, state).map_err(|e| e.at(pos))?
            } else {
                ops::string_array_matches_wrapper(arr, values, state).map_err(|e| e.at(pos))?
            }
        }

        (Evaluator::Int(i), Evaluator::IntArray(arr)) => {
            ops::int_array_compare(i, arr, |x, y| x == y)
        }
        (Evaluator::IntArray(a), Evaluator::IntArray(b)) => {
            if universal {
                ops::int_array_matches_all(a, b)
            } else {
                ops::int_array_matches(a, b)
            }
        }

        (Evaluator::Cidr(a), Evaluator::Cidr(b)) => ops::cidr_equals(a, b),
        (Evaluator::Cidr(a), Evaluator::CidrValues(values)) => ops::cidr_values_contains(a, values),
        (Evaluator::Cidr(a), Evaluator::CidrArray(arr)) => ops::cidr_array_contains(a, arr),
        (Evaluator::CidrArray(arr), Evaluator::CidrValues(values)) => {
            if universal {
                ops::cidr_array_matches_all(arr, values)
            } else {
                ops::cidr_array_matches(arr, values)
            }
        }
        (Evaluator::CidrValues(values), Evaluator::Cidr(a)) => ops::cidr_values_contains(a, values),
        (Evaluator::CidrValues(values), Evaluator::CidrArray(arr)) => {
            if universal {
                ops::cidr_array_matches_all(arr, values)
            } else {
                ops::cidr_array_matches(arr, values)
            }
        }

        (lhs, _) => {
            return Err(CompileError::Type {
                pos: rpos,
                expected: expected_member_kind(lhs),
            });
        }
    };

    Ok(if negate { ops::not(&positive) } else { positive })
}

// =============================================================================
// Primaries and arrays
// =============================================================================

fn compile_primary(primary: &Primary, state: &mut State<'_>) -> Result<(Evaluator, Pos)> {
    match primary {
        Primary::Ident { name, pos } => Ok((ident_to_evaluator(name, *pos, state)?, *pos)),

        Primary::Variable { name, pos } => Ok((variable_evaluator(name, *pos, state)?, *pos)),

        Primary::Number { value, pos } => Ok((Evaluator::Int(IntEvaluator::value(*value)), *pos)),

        Primary::Duration { value, pos } => {
            Ok((Evaluator::Int(IntEvaluator::duration_value(*value)), *pos))
        }

        Primary::Str { value, pos } => {
            if VARIABLE_RE.is_match(value) {
                let evaluator = interpolated_string(value, *pos, state)?;
                return Ok((Evaluator::String(evaluator), *pos));
            }
            Ok((Evaluator::String(StringEvaluator::scalar(value.clone())), *pos))
        }

        Primary::Pattern { value, pos } => {
            Ok((Evaluator::String(StringEvaluator::pattern(value.clone())), *pos))
        }

        Primary::Regexp { value, pos } => {
            Ok((Evaluator::String(StringEvaluator::regexp(value.clone())), *pos))
        }

        Primary::Ip { value, pos } | Primary::Cidr { value, pos } => {
            let net = parse_cidr(value).map_err(|e| e.at(*pos))?;
            Ok((Evaluator::Cidr(CidrEvaluator::value(net)), *pos))
        }
    }
}

fn array_to_evaluator(array: &Array, state: &mut State<'_>) -> Result<(Evaluator, Pos)> {
    match array {
        Array::Numbers { values, pos } => Ok((
            Evaluator::IntArray(IntArrayEvaluator::value(values.clone())),
            *pos,
        )),

        Array::Strings { members, pos } => {
            let mut values = StringValues::default();
            for member in members {
                match member {
                    StringMember::Literal(s) => values.append_scalar(s),
                    StringMember::Pattern(p) => {
                        values.append_pattern(p).map_err(|e| e.at(*pos))?
                    }
                    StringMember::Regexp(r) => values.append_regexp(r).map_err(|e| e.at(*pos))?,
                }
            }
            Ok((
                Evaluator::StringValues(StringValuesEvaluator::new(values)),
                *pos,
            ))
        }

        Array::Ident { name, pos } => Ok((ident_to_evaluator(name, *pos, state)?, *pos)),

        Array::Variable { name, pos } => Ok((variable_evaluator(name, *pos, state)?, *pos)),

        Array::Cidrs { members, pos } => {
            let mut values = CidrValues::default();
            for member in members {
                match member {
                    CidrMember::Cidr(c) => values.append_cidr(c).map_err(|e| e.at(*pos))?,
                    CidrMember::Ip(ip) => values.append_ip(ip).map_err(|e| e.at(*pos))?,
                }
            }
            Ok((
                Evaluator::CidrValues(CidrValuesEvaluator::new(values)),
                *pos,
            ))
        }
    }
}

// =============================================================================
// Variables
// =============================================================================

fn variable_evaluator(name: &str, pos: Pos, state: &State<'_>) -> Result<Evaluator> {
    state
        .variables
        .get(name)
        .map(|variable| variable.evaluator())
        .ok_or_else(|| CompileError::VariableNotFound {
            pos,
            name: name.to_string(),
        })
}

/// Compile a string literal containing `${...}` interpolation into a
/// concatenating accessor. Literal substrings pass through by identity,
/// arrays join with `,`, integers render in base 10.
fn interpolated_string(value: &str, pos: Pos, state: &State<'_>) -> Result<StringEvaluator> {
    let mut parts: Vec<EvalKind<String>> = Vec::new();

    let mut last = 0;
    for found in VARIABLE_RE.find_iter(value) {
        if found.start() > last {
            parts.push(EvalKind::Value(value[last..found.start()].to_string()));
        }

        let name = &value[found.start() + 2..found.end() - 1];
        let variable = state
            .variables
            .get(name)
            .ok_or_else(|| CompileError::VariableNotFound {
                pos,
                name: name.to_string(),
            })?;

        let part = match variable.evaluator() {
            Evaluator::String(e) => e.kind,
            Evaluator::Int(e) => {
                let kind = e.kind;
                EvalKind::Fnc(Arc::new(move |ctx: &Context<'_>| kind.eval(ctx).to_string()))
            }
            Evaluator::StringArray(e) => {
                let kind = e.kind;
                EvalKind::Fnc(Arc::new(move |ctx: &Context<'_>| kind.eval(ctx).join(",")))
            }
            Evaluator::IntArray(e) => {
                let kind = e.kind;
                EvalKind::Fnc(Arc::new(move |ctx: &Context<'_>| {
                    kind.eval(ctx)
                        .iter()
                        .map(i64::to_string)
                        .collect::<Vec<_>>()
                        .join(",")
                }))
            }
            _ => {
                return Err(CompileError::VariableTypeUnsupported {
                    pos,
                    name: name.to_string(),
                });
            }
        };
        parts.push(part);

        last = found.end();
    }
    if last < value.len() {
        parts.push(EvalKind::Value(value[last..].to_string()));
    }

    Ok(StringEvaluator {
        kind: EvalKind::Fnc(Arc::new(move |ctx| {
            let mut out = String::new();
            for part in &parts {
                out.push_str(&part.eval(ctx));
            }
            out
        })),
        field: None,
        weight: ops::FUNCTION_WEIGHT,
        value_type: ValueType::Variable,
        op_overrides: None,
    })
}

// =============================================================================
// Register iteration
// =============================================================================

/// Wrap the root evaluator in the register iteration loops.
///
/// Each register recorded during resolution iterates its field once per
/// evaluation; nesting forms the cartesian product across registers, and the
/// whole wrap is existential: the rule holds if any combination of elements
/// satisfies it. Iteration over an empty field yields `false`.
fn wrap_registers(root: BoolEvaluator, state: &State<'_>) -> BoolEvaluator {
    if state.registers.is_empty() {
        return root;
    }

    let registers: Vec<(String, Arc<dyn IteratorFactory>)> = state
        .registers
        .iter()
        .map(|(id, info)| (id.clone(), info.iterator.clone()))
        .collect();

    fn iterate(
        registers: &[(String, Arc<dyn IteratorFactory>)],
        depth: usize,
        inner: &EvalKind<bool>,
        ctx: &Context<'_>,
    ) -> bool {
        if depth == registers.len() {
            return inner.eval(ctx);
        }
        let (id, factory) = &registers[depth];
        for idx in 0..factory.count(ctx) {
            ctx.set_register(id, idx);
            if iterate(registers, depth + 1, inner, ctx) {
                return true;
            }
        }
        false
    }

    let weight = root.weight + ops::ITERATOR_WEIGHT * registers.len();
    let inner = root.kind;
    BoolEvaluator {
        kind: EvalKind::Fnc(Arc::new(move |ctx| iterate(&registers, 0, &inner, ctx))),
        field: None,
        weight,
    }
}

// =============================================================================
// Tests
// =============================================================================
