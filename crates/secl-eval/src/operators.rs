//! Operator combinators.
//!
//! Each combinator takes child evaluators and produces a new evaluator whose
//! closure captures them by value. When every operand is a compile-time
//! constant the result is folded into a constant. Combinator weights
//! accumulate into the rule's complexity score.

use std::sync::Arc;

use ipnet::IpNet;

use crate::cidr::nets_match;
use crate::error::Result;
use crate::evaluator::{
    BoolArrayEvaluator, BoolEvaluator, CidrArrayEvaluator, CidrEvaluator, CidrValuesEvaluator,
    EvalKind, IntArrayEvaluator, IntEvaluator, StringArrayEvaluator, StringEvaluator,
    StringValuesEvaluator, ValueType,
};
use crate::state::State;
use crate::strings::StringMatcher;

// factors applied by specific operators
pub const FUNCTION_WEIGHT: usize = 5;
pub const IN_ARRAY_WEIGHT: usize = 10;
pub const HANDLER_WEIGHT: usize = 50;
pub const REGEXP_WEIGHT: usize = 100;
pub const IN_PATTERN_ARRAY_WEIGHT: usize = 1000;
pub const ITERATOR_WEIGHT: usize = 2000;

// =============================================================================
// Composition helpers
// =============================================================================

fn compose1<A, R>(a: &EvalKind<A>, f: impl Fn(A) -> R + Send + Sync + 'static) -> EvalKind<R>
where
    A: Clone + Send + Sync + 'static,
    R: 'static,
{
    match a {
        EvalKind::Value(v) => EvalKind::Value(f(v.clone())),
        EvalKind::Fnc(_) => {
            let a = a.clone();
            EvalKind::Fnc(Arc::new(move |ctx| f(a.eval(ctx))))
        }
    }
}

fn compose2<A, B, R>(
    a: &EvalKind<A>,
    b: &EvalKind<B>,
    f: impl Fn(A, B) -> R + Send + Sync + 'static,
) -> EvalKind<R>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    R: 'static,
{
    match (a, b) {
        (EvalKind::Value(x), EvalKind::Value(y)) => EvalKind::Value(f(x.clone(), y.clone())),
        _ => {
            let (a, b) = (a.clone(), b.clone());
            EvalKind::Fnc(Arc::new(move |ctx| f(a.eval(ctx), b.eval(ctx))))
        }
    }
}

fn pair_weight(a: usize, b: usize, any_fnc: bool) -> usize {
    a + b + if any_fnc { FUNCTION_WEIGHT } else { 0 }
}

fn bool_result(kind: EvalKind<bool>, weight: usize) -> BoolEvaluator {
    BoolEvaluator {
        kind,
        field: None,
        weight,
    }
}

fn int_result(kind: EvalKind<i64>, weight: usize) -> IntEvaluator {
    IntEvaluator {
        kind,
        field: None,
        weight,
        is_duration: false,
    }
}

// =============================================================================
// Boolean operators
// =============================================================================

/// Boolean negation; also used to derive `!=`, `!~`, and `notin` from their
/// positive counterparts.
pub fn not(a: &BoolEvaluator) -> BoolEvaluator {
    bool_result(compose1(&a.kind, |v| !v), a.weight)
}

/// Short-circuiting `&&`: the right operand is not evaluated when the left
/// is false.
pub fn and(a: &BoolEvaluator, b: &BoolEvaluator) -> BoolEvaluator {
    let weight = pair_weight(a.weight, b.weight, !a.is_static() || !b.is_static());
    let kind = match (&a.kind, &b.kind) {
        (EvalKind::Value(x), EvalKind::Value(y)) => EvalKind::Value(*x && *y),
        _ => {
            let (a, b) = (a.kind.clone(), b.kind.clone());
            EvalKind::Fnc(Arc::new(move |ctx| a.eval(ctx) && b.eval(ctx)))
        }
    };
    bool_result(kind, weight)
}

/// Short-circuiting `||`.
pub fn or(a: &BoolEvaluator, b: &BoolEvaluator) -> BoolEvaluator {
    let weight = pair_weight(a.weight, b.weight, !a.is_static() || !b.is_static());
    let kind = match (&a.kind, &b.kind) {
        (EvalKind::Value(x), EvalKind::Value(y)) => EvalKind::Value(*x || *y),
        _ => {
            let (a, b) = (a.kind.clone(), b.kind.clone());
            EvalKind::Fnc(Arc::new(move |ctx| a.eval(ctx) || b.eval(ctx)))
        }
    };
    bool_result(kind, weight)
}

pub fn bool_equals(a: &BoolEvaluator, b: &BoolEvaluator) -> BoolEvaluator {
    let weight = pair_weight(a.weight, b.weight, !a.is_static() || !b.is_static());
    bool_result(compose2(&a.kind, &b.kind, |x, y| x == y), weight)
}

/// Membership of a boolean in a boolean array; doubles as scalar-vs-array
/// equality.
pub fn bool_array_contains(a: &BoolEvaluator, b: &BoolArrayEvaluator) -> BoolEvaluator {
    let weight = a.weight
        + b.weight
        + if b.is_static() {
            IN_ARRAY_WEIGHT
        } else {
            FUNCTION_WEIGHT
        };
    bool_result(
        compose2(&a.kind, &b.kind, |v, arr| arr.contains(&v)),
        weight,
    )
}

// =============================================================================
// Integer operators
// =============================================================================

pub fn int_and(a: &IntEvaluator, b: &IntEvaluator) -> IntEvaluator {
    let weight = pair_weight(a.weight, b.weight, !a.is_static() || !b.is_static());
    int_result(compose2(&a.kind, &b.kind, |x, y| x & y), weight)
}

pub fn int_or(a: &IntEvaluator, b: &IntEvaluator) -> IntEvaluator {
    let weight = pair_weight(a.weight, b.weight, !a.is_static() || !b.is_static());
    int_result(compose2(&a.kind, &b.kind, |x, y| x | y), weight)
}

pub fn int_xor(a: &IntEvaluator, b: &IntEvaluator) -> IntEvaluator {
    let weight = pair_weight(a.weight, b.weight, !a.is_static() || !b.is_static());
    int_result(compose2(&a.kind, &b.kind, |x, y| x ^ y), weight)
}

/// One's complement (unary `^`).
pub fn int_not(a: &IntEvaluator) -> IntEvaluator {
    int_result(compose1(&a.kind, |v| !v), a.weight)
}

/// Arithmetic negation (unary `-`).
pub fn minus(a: &IntEvaluator) -> IntEvaluator {
    int_result(compose1(&a.kind, i64::wrapping_neg), a.weight)
}

/// Scalar integer comparison with an arbitrary predicate; `==`, `<`, etc.
/// pass the matching closure.
pub fn int_compare(a: &IntEvaluator, b: &IntEvaluator, cmp: fn(i64, i64) -> bool) -> BoolEvaluator {
    let weight = pair_weight(a.weight, b.weight, !a.is_static() || !b.is_static());
    bool_result(compose2(&a.kind, &b.kind, move |x, y| cmp(x, y)), weight)
}

/// Duration comparison: the left operand yields a start timestamp, the right
/// a window width, and the predicate applies to `now - start` vs the width.
/// Never folds; the result depends on the evaluation clock.
pub fn duration_compare(
    a: &IntEvaluator,
    b: &IntEvaluator,
    cmp: fn(i64, i64) -> bool,
) -> BoolEvaluator {
    let weight = a.weight + b.weight + FUNCTION_WEIGHT;
    let (a, b) = (a.kind.clone(), b.kind.clone());
    bool_result(
        EvalKind::Fnc(Arc::new(move |ctx| {
            cmp(ctx.now() - a.eval(ctx), b.eval(ctx))
        })),
        weight,
    )
}

/// Existential scalar-vs-array comparison: true when some element satisfies
/// `cmp(scalar, element)`.
pub fn int_array_compare(
    a: &IntEvaluator,
    b: &IntArrayEvaluator,
    cmp: fn(i64, i64) -> bool,
) -> BoolEvaluator {
    let weight = a.weight
        + b.weight
        + if b.is_static() {
            IN_ARRAY_WEIGHT
        } else {
            FUNCTION_WEIGHT
        };
    bool_result(
        compose2(&a.kind, &b.kind, move |v, arr| {
            arr.iter().any(|el| cmp(v, *el))
        }),
        weight,
    )
}

/// True when some element of `a` is a member of `b`.
pub fn int_array_matches(a: &IntArrayEvaluator, b: &IntArrayEvaluator) -> BoolEvaluator {
    let weight = a.weight
        + b.weight
        + if b.is_static() {
            IN_ARRAY_WEIGHT
        } else {
            FUNCTION_WEIGHT
        };
    bool_result(
        compose2(&a.kind, &b.kind, |lhs, rhs| {
            lhs.iter().any(|el| rhs.contains(el))
        }),
        weight,
    )
}

/// True when every element of `a` is a member of `b`; vacuously true for an
/// empty `a`.
pub fn int_array_matches_all(a: &IntArrayEvaluator, b: &IntArrayEvaluator) -> BoolEvaluator {
    let weight = a.weight
        + b.weight
        + if b.is_static() {
            IN_ARRAY_WEIGHT
        } else {
            FUNCTION_WEIGHT
        };
    bool_result(
        compose2(&a.kind, &b.kind, |lhs, rhs| {
            lhs.iter().all(|el| rhs.contains(el))
        }),
        weight,
    )
}

// =============================================================================
// String operators
// =============================================================================

fn matcher_weight(matcher: &StringMatcher, any_fnc: bool) -> usize {
    if matcher.is_pattern() {
        REGEXP_WEIGHT
    } else if any_fnc {
        FUNCTION_WEIGHT
    } else {
        0
    }
}

fn set_weight(b: &StringValuesEvaluator) -> usize {
    if b.values.has_patterns() {
        IN_PATTERN_ARRAY_WEIGHT
    } else {
        IN_ARRAY_WEIGHT
    }
}

/// Scalar string comparison. A constant pattern or regex operand becomes the
/// matcher; two accessors compare by literal equality.
pub fn string_equals(
    a: &StringEvaluator,
    b: &StringEvaluator,
    _state: &mut State<'_>,
) -> Result<BoolEvaluator> {
    let any_fnc = !a.is_static() || !b.is_static();

    let static_side = |e: &StringEvaluator| {
        e.kind
            .as_value()
            .filter(|_| e.value_type != ValueType::Variable)
            .cloned()
    };
    let is_pattern_const = |e: &StringEvaluator| {
        e.is_static() && matches!(e.value_type, ValueType::Pattern | ValueType::Regexp)
    };

    // the matcher side is a constant, preferring whichever operand carries a
    // pattern-ish value type; `=~` promotion guarantees the right side
    // qualifies there
    let (matcher_src, candidate) = if is_pattern_const(b) {
        ((b.value_type, static_side(b).unwrap_or_default()), a)
    } else if is_pattern_const(a) {
        ((a.value_type, static_side(a).unwrap_or_default()), b)
    } else if let Some(v) = static_side(b) {
        ((b.value_type, v), a)
    } else if let Some(v) = static_side(a) {
        ((a.value_type, v), b)
    } else {
        // two accessors: literal equality
        let weight = pair_weight(a.weight, b.weight, any_fnc);
        return Ok(bool_result(
            compose2(&a.kind, &b.kind, |x, y| x == y),
            weight,
        ));
    };

    let matcher = StringMatcher::compile(matcher_src.0, &matcher_src.1)?;
    let weight = a.weight + b.weight + matcher_weight(&matcher, any_fnc);
    Ok(bool_result(
        compose1(&candidate.kind, move |v| matcher.matches(&v)),
        weight,
    ))
}

/// True when some element of the array matches the scalar operand.
pub fn string_array_contains(
    a: &StringEvaluator,
    b: &StringArrayEvaluator,
    _state: &mut State<'_>,
) -> Result<BoolEvaluator> {
    if let Some(value) = a.kind.as_value()
        && a.value_type != ValueType::Variable
    {
        let matcher = StringMatcher::compile(a.value_type, value)?;
        let weight = a.weight
            + b.weight
            + if matcher.is_pattern() {
                REGEXP_WEIGHT
            } else if b.is_static() {
                IN_ARRAY_WEIGHT
            } else {
                FUNCTION_WEIGHT
            };
        return Ok(bool_result(
            compose1(&b.kind, move |arr| arr.iter().any(|el| matcher.matches(el))),
            weight,
        ));
    }

    let weight = a.weight
        + b.weight
        + if b.is_static() {
            IN_ARRAY_WEIGHT
        } else {
            FUNCTION_WEIGHT
        };
    Ok(bool_result(
        compose2(&a.kind, &b.kind, |v, arr| arr.contains(&v)),
        weight,
    ))
}

/// Membership of a scalar string in a constant value set.
pub fn string_values_contains(
    a: &StringEvaluator,
    b: &StringValuesEvaluator,
    _state: &mut State<'_>,
) -> Result<BoolEvaluator> {
    let weight = a.weight + set_weight(b);
    let values = b.values.clone();
    Ok(bool_result(
        compose1(&a.kind, move |v| values.matches(&v)),
        weight,
    ))
}

/// True when some element of the array is a member of the constant set.
pub fn string_array_matches(
    a: &StringArrayEvaluator,
    b: &StringValuesEvaluator,
    _state: &mut State<'_>,
) -> Result<BoolEvaluator> {
    let weight = a.weight + set_weight(b);
    let values = b.values.clone();
    Ok(bool_result(
        compose1(&a.kind, move |arr| arr.iter().any(|el| values.matches(el))),
        weight,
    ))
}

/// True when every element of the array is a member of the constant set;
/// vacuously true for an empty array.
pub fn string_array_matches_all(
    a: &StringArrayEvaluator,
    b: &StringValuesEvaluator,
    _state: &mut State<'_>,
) -> Result<BoolEvaluator> {
    let weight = a.weight + set_weight(b);
    let values = b.values.clone();
    Ok(bool_result(
        compose1(&a.kind, move |arr| arr.iter().all(|el| values.matches(el))),
        weight,
    ))
}

// =============================================================================
// Override wrappers
// =============================================================================

/// `string_equals` through the override table; the left operand's override
/// wins when both operands carry one.
pub fn string_equals_wrapper(
    a: &StringEvaluator,
    b: &StringEvaluator,
    state: &mut State<'_>,
) -> Result<BoolEvaluator> {
    if let Some(f) = a.op_overrides.as_ref().and_then(|o| o.string_equals) {
        return f(a, b, state);
    }
    if let Some(f) = b.op_overrides.as_ref().and_then(|o| o.string_equals) {
        return f(a, b, state);
    }
    string_equals(a, b, state)
}

/// `string_array_contains` through the override table.
pub fn string_array_contains_wrapper(
    a: &StringEvaluator,
    b: &StringArrayEvaluator,
    state: &mut State<'_>,
) -> Result<BoolEvaluator> {
    if let Some(f) = a.op_overrides.as_ref().and_then(|o| o.string_array_contains) {
        return f(a, b, state);
    }
    if let Some(f) = b.op_overrides.as_ref().and_then(|o| o.string_array_contains) {
        return f(a, b, state);
    }
    string_array_contains(a, b, state)
}

/// `string_values_contains` through the override table; value sets are
/// constants and carry no overrides of their own.
pub fn string_values_contains_wrapper(
    a: &StringEvaluator,
    b: &StringValuesEvaluator,
    state: &mut State<'_>,
) -> Result<BoolEvaluator> {
    if let Some(f) = a.op_overrides.as_ref().and_then(|o| o.string_values_contains) {
        return f(a, b, state);
    }
    string_values_contains(a, b, state)
}

/// `string_array_matches` through the override table.
pub fn string_array_matches_wrapper(
    a: &StringArrayEvaluator,
    b: &StringValuesEvaluator,
    state: &mut State<'_>,
) -> Result<BoolEvaluator> {
    if let Some(f) = a.op_overrides.as_ref().and_then(|o| o.string_array_matches) {
        return f(a, b, state);
    }
    string_array_matches(a, b, state)
}

// =============================================================================
// CIDR operators
// =============================================================================

pub fn cidr_equals(a: &CidrEvaluator, b: &CidrEvaluator) -> BoolEvaluator {
    let weight = pair_weight(a.weight, b.weight, !a.is_static() || !b.is_static());
    bool_result(compose2(&a.kind, &b.kind, |x, y| x == y), weight)
}

/// Membership of a network in a constant network set.
pub fn cidr_values_contains(a: &CidrEvaluator, b: &CidrValuesEvaluator) -> BoolEvaluator {
    let weight = a.weight + IN_ARRAY_WEIGHT;
    let values = b.values.clone();
    bool_result(compose1(&a.kind, move |net| values.matches(&net)), weight)
}

/// Membership of a network in a network array.
pub fn cidr_array_contains(a: &CidrEvaluator, b: &CidrArrayEvaluator) -> BoolEvaluator {
    let weight = a.weight
        + b.weight
        + if b.is_static() {
            IN_ARRAY_WEIGHT
        } else {
            FUNCTION_WEIGHT
        };
    bool_result(
        compose2(&a.kind, &b.kind, |net: IpNet, arr: Vec<IpNet>| {
            arr.iter().any(|el| nets_match(&net, el))
        }),
        weight,
    )
}

/// True when some element of the array matches a member of the constant set.
pub fn cidr_array_matches(a: &CidrArrayEvaluator, b: &CidrValuesEvaluator) -> BoolEvaluator {
    let weight = a.weight + IN_ARRAY_WEIGHT;
    let values = b.values.clone();
    bool_result(
        compose1(&a.kind, move |arr| arr.iter().any(|el| values.matches(el))),
        weight,
    )
}

/// True when every element of the array matches a member of the constant
/// set; vacuously true for an empty array.
pub fn cidr_array_matches_all(a: &CidrArrayEvaluator, b: &CidrValuesEvaluator) -> BoolEvaluator {
    let weight = a.weight + IN_ARRAY_WEIGHT;
    let values = b.values.clone();
    bool_result(
        compose1(&a.kind, move |arr| arr.iter().all(|el| values.matches(el))),
        weight,
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cidr::{CidrValues, parse_cidr};
    use crate::context::Context;
    use crate::error::ModelError;
    use crate::evaluator::{Evaluator, OpOverrides};
    use crate::model::{IteratorFactory, Model};
    use crate::strings::StringValues;
    use crate::variables::VariableStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoModel;

    impl Model for NoModel {
        fn evaluator(
            &self,
            field: &str,
            _register_id: &str,
        ) -> std::result::Result<Evaluator, ModelError> {
            Err(ModelError::UnknownField(field.to_string()))
        }

        fn iterator(&self, _field: &str) -> Option<Arc<dyn IteratorFactory>> {
            None
        }
    }

    fn with_state<R>(f: impl FnOnce(&mut State<'_>) -> R) -> R {
        let vars = VariableStore::new();
        let mut state = State::new(&NoModel, &vars);
        f(&mut state)
    }

    fn ctx_value() -> serde_json::Value {
        json!({"process": {"name": "sshd"}})
    }

    #[test]
    fn constants_fold() {
        let e = and(&BoolEvaluator::value(true), &BoolEvaluator::value(false));
        assert!(e.is_static());
        assert_eq!(e.kind.as_value(), Some(&false));
        assert_eq!(e.weight, 0);

        let e = int_xor(&IntEvaluator::value(6), &IntEvaluator::value(3));
        assert_eq!(e.kind.as_value(), Some(&5));

        let e = minus(&IntEvaluator::value(7));
        assert_eq!(e.kind.as_value(), Some(&-7));

        let e = int_not(&IntEvaluator::value(0));
        assert_eq!(e.kind.as_value(), Some(&-1));
    }

    #[test]
    fn and_short_circuits() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let right = BoolEvaluator::handler("probe", move |_| {
            seen.fetch_add(1, Ordering::Relaxed);
            true
        });

        let v = ctx_value();
        let ctx = Context::with_now(&v, 0);

        let e = and(&BoolEvaluator::value(false), &right);
        assert!(!e.eval(&ctx));
        assert_eq!(hits.load(Ordering::Relaxed), 0);

        let e = or(&BoolEvaluator::value(true), &right);
        assert!(e.eval(&ctx));
        assert_eq!(hits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn int_comparisons() {
        let v = ctx_value();
        let ctx = Context::with_now(&v, 0);
        let a = IntEvaluator::handler("open.flags", |_| 6);
        let two = IntEvaluator::value(2);
        assert!(int_compare(&a, &two, |x, y| x > y).eval(&ctx));
        assert!(!int_compare(&a, &two, |x, y| x == y).eval(&ctx));
    }

    #[test]
    fn duration_compare_uses_the_clock() {
        let start = IntEvaluator::handler("event.start", |ctx| ctx.event().int("event.start"));
        let window = IntEvaluator::duration_value(5_000_000_000);
        let e = duration_compare(&start, &window, |elapsed, w| elapsed < w);

        let v = json!({"event": {"start": 10_000_000_000_i64}});
        let ctx = Context::with_now(&v, 12_000_000_000);
        assert!(e.eval(&ctx));
        let ctx = Context::with_now(&v, 16_000_000_000);
        assert!(!e.eval(&ctx));
    }

    #[test]
    fn int_array_existential_and_universal() {
        let arr = IntArrayEvaluator::value(vec![1, 2, 3]);
        let sub = IntArrayEvaluator::value(vec![2, 3]);
        let v = ctx_value();
        let ctx = Context::with_now(&v, 0);

        assert!(int_array_compare(&IntEvaluator::value(2), &arr, |x, y| x == y).eval(&ctx));
        assert!(!int_array_compare(&IntEvaluator::value(9), &arr, |x, y| x == y).eval(&ctx));

        assert!(int_array_matches(&sub, &arr).eval(&ctx));
        assert!(int_array_matches_all(&sub, &arr).eval(&ctx));
        assert!(!int_array_matches_all(&arr, &sub).eval(&ctx));

        // empty lhs is vacuously all-in, even for an empty set
        let empty = IntArrayEvaluator::value(vec![]);
        assert!(int_array_matches_all(&empty, &IntArrayEvaluator::value(vec![])).eval(&ctx));
    }

    #[test]
    fn string_equals_folds_and_matches_patterns() {
        with_state(|state| {
            let folded =
                string_equals(&StringEvaluator::scalar("a"), &StringEvaluator::scalar("a"), state)
                    .unwrap();
            assert_eq!(folded.kind.as_value(), Some(&true));

            let v = ctx_value();
            let ctx = Context::with_now(&v, 0);
            let name =
                StringEvaluator::handler("process.name", |ctx| ctx.event().str("process.name"));

            let glob = string_equals(&name, &StringEvaluator::pattern("ss*"), state).unwrap();
            assert!(glob.eval(&ctx));
            assert_eq!(glob.weight, HANDLER_WEIGHT + REGEXP_WEIGHT);

            let literal = string_equals(&name, &StringEvaluator::scalar("ss*"), state).unwrap();
            assert!(!literal.eval(&ctx));
        });
    }

    #[test]
    fn string_array_contains_with_pattern() {
        with_state(|state| {
            let v = json!({"process": {"argv": ["--daemon", "-p"]}});
            let ctx = Context::with_now(&v, 0);
            let argv =
                StringArrayEvaluator::handler("process.argv", |ctx| {
                    ctx.event().str_array("process.argv")
                });

            let e = string_array_contains(&StringEvaluator::pattern("--*"), &argv, state).unwrap();
            assert!(e.eval(&ctx));
            let e = string_array_contains(&StringEvaluator::scalar("-x"), &argv, state).unwrap();
            assert!(!e.eval(&ctx));
        });
    }

    #[test]
    fn string_values_weights_depend_on_members() {
        with_state(|state| {
            let plain = StringValuesEvaluator::new(StringValues::from_iter(
                ["sshd".to_string(), "bash".to_string()],
            ));
            let mut with_pattern = StringValues::default();
            with_pattern.append_pattern("ss*").unwrap();
            let patterned = StringValuesEvaluator::new(with_pattern);

            let name =
                StringEvaluator::handler("process.name", |ctx| ctx.event().str("process.name"));

            let e = string_values_contains(&name, &plain, state).unwrap();
            assert_eq!(e.weight, HANDLER_WEIGHT + IN_ARRAY_WEIGHT);
            let e = string_values_contains(&name, &patterned, state).unwrap();
            assert_eq!(e.weight, HANDLER_WEIGHT + IN_PATTERN_ARRAY_WEIGHT);
        });
    }

    #[test]
    fn string_array_matches_universality() {
        with_state(|state| {
            let v = ctx_value();
            let ctx = Context::with_now(&v, 0);
            let set = StringValuesEvaluator::new(StringValues::from_iter(
                ["a".to_string(), "b".to_string()],
            ));

            let all_in = StringArrayEvaluator::value(vec!["a".into(), "b".into()]);
            let some_in = StringArrayEvaluator::value(vec!["a".into(), "c".into()]);
            let empty = StringArrayEvaluator::value(vec![]);

            assert!(string_array_matches(&some_in, &set, state).unwrap().eval(&ctx));
            assert!(string_array_matches_all(&all_in, &set, state).unwrap().eval(&ctx));
            assert!(!string_array_matches_all(&some_in, &set, state).unwrap().eval(&ctx));
            assert!(string_array_matches_all(&empty, &set, state).unwrap().eval(&ctx));
        });
    }

    fn always_true(
        _a: &StringEvaluator,
        _b: &StringEvaluator,
        _state: &mut State<'_>,
    ) -> Result<BoolEvaluator> {
        Ok(BoolEvaluator::value(true))
    }

    fn always_false(
        _a: &StringEvaluator,
        _b: &StringEvaluator,
        _state: &mut State<'_>,
    ) -> Result<BoolEvaluator> {
        Ok(BoolEvaluator::value(false))
    }

    #[test]
    fn override_dispatch_prefers_the_left_operand() {
        with_state(|state| {
            let with_true = StringEvaluator::scalar("x").with_overrides(OpOverrides {
                string_equals: Some(always_true),
                ..Default::default()
            });
            let with_false = StringEvaluator::scalar("y").with_overrides(OpOverrides {
                string_equals: Some(always_false),
                ..Default::default()
            });
            let plain = StringEvaluator::scalar("y");

            // both sides override: left wins
            let e = string_equals_wrapper(&with_true, &with_false, state).unwrap();
            assert_eq!(e.kind.as_value(), Some(&true));

            // only the right side overrides
            let e = string_equals_wrapper(&plain, &with_false, state).unwrap();
            assert_eq!(e.kind.as_value(), Some(&false));

            // no overrides: default literal equality
            let e = string_equals_wrapper(&plain, &StringEvaluator::scalar("y"), state).unwrap();
            assert_eq!(e.kind.as_value(), Some(&true));
        });
    }

    #[test]
    fn cidr_operators() {
        let v = ctx_value();
        let ctx = Context::with_now(&v, 0);

        let net = CidrEvaluator::value(parse_cidr("10.0.0.0/8").unwrap());
        let host = CidrEvaluator::value(parse_cidr("10.5.1.1").unwrap());
        assert!(!cidr_equals(&net, &host).eval(&ctx));
        assert!(cidr_equals(&net, &net.clone()).eval(&ctx));

        let mut values = CidrValues::default();
        values.append_cidr("10.0.0.0/8").unwrap();
        values.append_cidr("192.168.1.0/24").unwrap();
        let values = CidrValuesEvaluator::new(values);

        assert!(cidr_values_contains(&host, &values).eval(&ctx));
        let outside = CidrEvaluator::value(parse_cidr("172.16.0.1").unwrap());
        assert!(!cidr_values_contains(&outside, &values).eval(&ctx));

        let arr = CidrArrayEvaluator::value(vec![
            parse_cidr("10.1.0.0/16").unwrap(),
            parse_cidr("172.16.0.1").unwrap(),
        ]);
        let inner = CidrEvaluator::value(parse_cidr("10.1.2.3").unwrap());
        assert!(cidr_array_contains(&inner, &arr).eval(&ctx));
        assert!(!cidr_array_contains(&host, &arr).eval(&ctx));
        assert!(cidr_array_matches(&arr, &values).eval(&ctx));
        assert!(!cidr_array_matches_all(&arr, &values).eval(&ctx));

        let empty = CidrArrayEvaluator::value(vec![]);
        assert!(cidr_array_matches_all(&empty, &values).eval(&ctx));
    }

    #[test]
    fn weights_accumulate() {
        let a = BoolEvaluator::handler("a", |_| true);
        let b = BoolEvaluator::handler("b", |_| true);
        let combined = and(&a, &b);
        assert_eq!(combined.weight, 2 * HANDLER_WEIGHT + FUNCTION_WEIGHT);

        // negation never increases the weight
        assert_eq!(not(&combined).weight, combined.weight);
    }
}
