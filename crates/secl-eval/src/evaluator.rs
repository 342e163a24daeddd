//! Evaluator leaf types.
//!
//! Every expression node compiles to one of the evaluators below. An
//! evaluator is either a constant known at compile time or a pure closure
//! over a [`Context`]; operator combinators compose them by value capture.
//! Once compiled, a tree is immutable and can be evaluated concurrently from
//! distinct contexts.

use std::fmt;
use std::sync::Arc;

use ipnet::IpNet;

use crate::cidr::CidrValues;
use crate::context::Context;
use crate::error::Result;
use crate::operators::HANDLER_WEIGHT;
use crate::strings::StringValues;

/// A pure evaluation closure yielding `T`.
pub type EvalFnc<T> = Arc<dyn Fn(&Context<'_>) -> T + Send + Sync>;

/// The two mutually exclusive shapes of an evaluator: a compile-time
/// constant, or an accessor function over the context.
#[derive(Clone)]
pub enum EvalKind<T> {
    Value(T),
    Fnc(EvalFnc<T>),
}

impl<T: Clone> EvalKind<T> {
    pub fn eval(&self, ctx: &Context<'_>) -> T {
        match self {
            EvalKind::Value(v) => v.clone(),
            EvalKind::Fnc(f) => f(ctx),
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, EvalKind::Value(_))
    }

    /// The constant value, when static.
    pub fn as_value(&self) -> Option<&T> {
        match self {
            EvalKind::Value(v) => Some(v),
            EvalKind::Fnc(_) => None,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for EvalKind<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalKind::Value(v) => f.debug_tuple("Value").field(v).finish(),
            EvalKind::Fnc(_) => f.write_str("Fnc(..)"),
        }
    }
}

/// The provenance tag of a string or CIDR constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// A plain literal compared by equality.
    Scalar,
    /// A glob pattern (`~"..."`), or a scalar promoted by `=~`/`!~`.
    Pattern,
    /// A regular expression literal (`r"..."`).
    Regexp,
    /// A string assembled from `${...}` interpolation.
    Variable,
    /// An IP network literal.
    IpNet,
}

// =============================================================================
// Operator overrides
// =============================================================================

/// Host-supplied replacements for string combinators, attached to individual
/// field accessors. When both operands carry an override for the matched
/// combinator, the left operand wins.
#[derive(Clone, Copy, Default)]
pub struct OpOverrides {
    pub string_equals:
        Option<fn(&StringEvaluator, &StringEvaluator, &mut crate::State<'_>) -> Result<BoolEvaluator>>,
    pub string_array_contains: Option<
        fn(&StringEvaluator, &StringArrayEvaluator, &mut crate::State<'_>) -> Result<BoolEvaluator>,
    >,
    pub string_values_contains: Option<
        fn(&StringEvaluator, &StringValuesEvaluator, &mut crate::State<'_>) -> Result<BoolEvaluator>,
    >,
    pub string_array_matches: Option<
        fn(&StringArrayEvaluator, &StringValuesEvaluator, &mut crate::State<'_>) -> Result<BoolEvaluator>,
    >,
}

impl fmt::Debug for OpOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpOverrides")
            .field("string_equals", &self.string_equals.is_some())
            .field("string_array_contains", &self.string_array_contains.is_some())
            .field(
                "string_values_contains",
                &self.string_values_contains.is_some(),
            )
            .field("string_array_matches", &self.string_array_matches.is_some())
            .finish()
    }
}

// =============================================================================
// Scalar evaluators
// =============================================================================

/// Yields a boolean.
#[derive(Debug, Clone)]
pub struct BoolEvaluator {
    pub kind: EvalKind<bool>,
    /// Origin field name, when this evaluator reads the event.
    pub field: Option<String>,
    pub weight: usize,
}

impl BoolEvaluator {
    pub fn value(v: bool) -> Self {
        BoolEvaluator {
            kind: EvalKind::Value(v),
            field: None,
            weight: 0,
        }
    }

    /// A model accessor over the context.
    pub fn handler(
        field: impl Into<String>,
        f: impl Fn(&Context<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        BoolEvaluator {
            kind: EvalKind::Fnc(Arc::new(f)),
            field: Some(field.into()),
            weight: HANDLER_WEIGHT,
        }
    }

    pub fn eval(&self, ctx: &Context<'_>) -> bool {
        self.kind.eval(ctx)
    }

    pub fn is_static(&self) -> bool {
        self.kind.is_static()
    }
}

/// Yields a 64-bit signed integer.
///
/// `is_duration` marks both window-width literals (`5s`) and timestamp
/// fields the model declares duration-typed; ordering comparisons between
/// them go through the clock-relative combinators.
#[derive(Debug, Clone)]
pub struct IntEvaluator {
    pub kind: EvalKind<i64>,
    pub field: Option<String>,
    pub weight: usize,
    pub is_duration: bool,
}

impl IntEvaluator {
    pub fn value(v: i64) -> Self {
        IntEvaluator {
            kind: EvalKind::Value(v),
            field: None,
            weight: 0,
            is_duration: false,
        }
    }

    /// A duration literal, in nanoseconds.
    pub fn duration_value(v: i64) -> Self {
        IntEvaluator {
            is_duration: true,
            ..IntEvaluator::value(v)
        }
    }

    pub fn handler(
        field: impl Into<String>,
        f: impl Fn(&Context<'_>) -> i64 + Send + Sync + 'static,
    ) -> Self {
        IntEvaluator {
            kind: EvalKind::Fnc(Arc::new(f)),
            field: Some(field.into()),
            weight: HANDLER_WEIGHT,
            is_duration: false,
        }
    }

    /// Mark a field accessor duration-typed.
    pub fn duration(mut self) -> Self {
        self.is_duration = true;
        self
    }

    pub fn eval(&self, ctx: &Context<'_>) -> i64 {
        self.kind.eval(ctx)
    }

    pub fn is_static(&self) -> bool {
        self.kind.is_static()
    }
}

/// Yields a string.
#[derive(Debug, Clone)]
pub struct StringEvaluator {
    pub kind: EvalKind<String>,
    pub field: Option<String>,
    pub weight: usize,
    pub value_type: ValueType,
    pub op_overrides: Option<OpOverrides>,
}

impl StringEvaluator {
    /// A plain string literal.
    pub fn scalar(v: impl Into<String>) -> Self {
        StringEvaluator {
            kind: EvalKind::Value(v.into()),
            field: None,
            weight: 0,
            value_type: ValueType::Scalar,
            op_overrides: None,
        }
    }

    /// A glob pattern literal.
    pub fn pattern(v: impl Into<String>) -> Self {
        StringEvaluator {
            value_type: ValueType::Pattern,
            ..StringEvaluator::scalar(v)
        }
    }

    /// A regular expression literal.
    pub fn regexp(v: impl Into<String>) -> Self {
        StringEvaluator {
            value_type: ValueType::Regexp,
            ..StringEvaluator::scalar(v)
        }
    }

    pub fn handler(
        field: impl Into<String>,
        f: impl Fn(&Context<'_>) -> String + Send + Sync + 'static,
    ) -> Self {
        StringEvaluator {
            kind: EvalKind::Fnc(Arc::new(f)),
            field: Some(field.into()),
            weight: HANDLER_WEIGHT,
            value_type: ValueType::Scalar,
            op_overrides: None,
        }
    }

    /// Attach host operator overrides to this accessor.
    pub fn with_overrides(mut self, overrides: OpOverrides) -> Self {
        self.op_overrides = Some(overrides);
        self
    }

    pub fn eval(&self, ctx: &Context<'_>) -> String {
        self.kind.eval(ctx)
    }

    pub fn is_static(&self) -> bool {
        self.kind.is_static()
    }

    /// The origin field name, or `""` for literals.
    pub fn field_name(&self) -> &str {
        self.field.as_deref().unwrap_or_default()
    }
}

/// Yields an IP network.
#[derive(Debug, Clone)]
pub struct CidrEvaluator {
    pub kind: EvalKind<IpNet>,
    pub field: Option<String>,
    pub weight: usize,
    pub value_type: ValueType,
}

impl CidrEvaluator {
    pub fn value(net: IpNet) -> Self {
        CidrEvaluator {
            kind: EvalKind::Value(net),
            field: None,
            weight: 0,
            value_type: ValueType::IpNet,
        }
    }

    pub fn handler(
        field: impl Into<String>,
        f: impl Fn(&Context<'_>) -> IpNet + Send + Sync + 'static,
    ) -> Self {
        CidrEvaluator {
            kind: EvalKind::Fnc(Arc::new(f)),
            field: Some(field.into()),
            weight: HANDLER_WEIGHT,
            value_type: ValueType::IpNet,
        }
    }

    pub fn eval(&self, ctx: &Context<'_>) -> IpNet {
        self.kind.eval(ctx)
    }

    pub fn is_static(&self) -> bool {
        self.kind.is_static()
    }
}

// =============================================================================
// Array evaluators
// =============================================================================

macro_rules! array_evaluator {
    ($(#[$doc:meta])* $name:ident, $elem:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            pub kind: EvalKind<Vec<$elem>>,
            pub field: Option<String>,
            pub weight: usize,
        }

        impl $name {
            pub fn value(values: Vec<$elem>) -> Self {
                $name {
                    kind: EvalKind::Value(values),
                    field: None,
                    weight: 0,
                }
            }

            pub fn handler(
                field: impl Into<String>,
                f: impl Fn(&Context<'_>) -> Vec<$elem> + Send + Sync + 'static,
            ) -> Self {
                $name {
                    kind: EvalKind::Fnc(Arc::new(f)),
                    field: Some(field.into()),
                    weight: HANDLER_WEIGHT,
                }
            }

            pub fn eval(&self, ctx: &Context<'_>) -> Vec<$elem> {
                self.kind.eval(ctx)
            }

            pub fn is_static(&self) -> bool {
                self.kind.is_static()
            }
        }
    };
}

array_evaluator!(
    /// Yields an array of booleans.
    BoolArrayEvaluator,
    bool
);
array_evaluator!(
    /// Yields an array of integers.
    IntArrayEvaluator,
    i64
);
array_evaluator!(
    /// Yields an array of IP networks.
    CidrArrayEvaluator,
    IpNet
);

/// Yields an array of strings.
///
/// Unlike the other array evaluators this one can carry operator overrides,
/// since hosts customise string comparison semantics per field.
#[derive(Debug, Clone)]
pub struct StringArrayEvaluator {
    pub kind: EvalKind<Vec<String>>,
    pub field: Option<String>,
    pub weight: usize,
    pub op_overrides: Option<OpOverrides>,
}

impl StringArrayEvaluator {
    pub fn value(values: Vec<String>) -> Self {
        StringArrayEvaluator {
            kind: EvalKind::Value(values),
            field: None,
            weight: 0,
            op_overrides: None,
        }
    }

    pub fn handler(
        field: impl Into<String>,
        f: impl Fn(&Context<'_>) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        StringArrayEvaluator {
            kind: EvalKind::Fnc(Arc::new(f)),
            field: Some(field.into()),
            weight: HANDLER_WEIGHT,
            op_overrides: None,
        }
    }

    pub fn with_overrides(mut self, overrides: OpOverrides) -> Self {
        self.op_overrides = Some(overrides);
        self
    }

    pub fn eval(&self, ctx: &Context<'_>) -> Vec<String> {
        self.kind.eval(ctx)
    }

    pub fn is_static(&self) -> bool {
        self.kind.is_static()
    }
}

// =============================================================================
// Constant value sets
// =============================================================================

/// A constant set of string members, used as the right-hand side of
/// membership operators.
#[derive(Debug, Clone, Default)]
pub struct StringValuesEvaluator {
    pub values: StringValues,
    pub weight: usize,
}

impl StringValuesEvaluator {
    pub fn new(values: StringValues) -> Self {
        StringValuesEvaluator { values, weight: 0 }
    }
}

/// A constant set of networks, used as the right-hand side of membership
/// operators.
#[derive(Debug, Clone, Default)]
pub struct CidrValuesEvaluator {
    pub values: CidrValues,
    pub weight: usize,
}

impl CidrValuesEvaluator {
    pub fn new(values: CidrValues) -> Self {
        CidrValuesEvaluator { values, weight: 0 }
    }
}

// =============================================================================
// The sum type
// =============================================================================

/// Any compiled evaluator. The compiler dispatches on this closed set; the
/// exhaustive matches are what make the operator × operand matrix checkable.
#[derive(Debug, Clone)]
pub enum Evaluator {
    Bool(BoolEvaluator),
    Int(IntEvaluator),
    String(StringEvaluator),
    Cidr(CidrEvaluator),
    BoolArray(BoolArrayEvaluator),
    IntArray(IntArrayEvaluator),
    StringArray(StringArrayEvaluator),
    CidrArray(CidrArrayEvaluator),
    StringValues(StringValuesEvaluator),
    CidrValues(CidrValuesEvaluator),
}

impl Evaluator {
    /// The complexity weight carried by the node.
    pub fn weight(&self) -> usize {
        match self {
            Evaluator::Bool(e) => e.weight,
            Evaluator::Int(e) => e.weight,
            Evaluator::String(e) => e.weight,
            Evaluator::Cidr(e) => e.weight,
            Evaluator::BoolArray(e) => e.weight,
            Evaluator::IntArray(e) => e.weight,
            Evaluator::StringArray(e) => e.weight,
            Evaluator::CidrArray(e) => e.weight,
            Evaluator::StringValues(e) => e.weight,
            Evaluator::CidrValues(e) => e.weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn constants_are_static() {
        let e = IntEvaluator::value(42);
        assert!(e.is_static());
        assert_eq!(e.weight, 0);
        assert!(!e.is_duration);

        let d = IntEvaluator::duration_value(5_000_000_000);
        assert!(d.is_duration);
    }

    #[test]
    fn handlers_read_the_context() {
        let v = json!({"process": {"name": "sshd"}});
        let ctx = Context::with_now(&v, 0);
        let e = StringEvaluator::handler("process.name", |ctx| ctx.event().str("process.name"));
        assert!(!e.is_static());
        assert_eq!(e.weight, HANDLER_WEIGHT);
        assert_eq!(e.eval(&ctx), "sshd");
        assert_eq!(e.field_name(), "process.name");
    }

    #[test]
    fn value_type_tags() {
        assert_eq!(StringEvaluator::scalar("a").value_type, ValueType::Scalar);
        assert_eq!(StringEvaluator::pattern("a*").value_type, ValueType::Pattern);
        assert_eq!(StringEvaluator::regexp("a+").value_type, ValueType::Regexp);
    }

    #[test]
    fn overrides_debug_does_not_leak_pointers() {
        let o = OpOverrides {
            string_equals: Some(crate::operators::string_equals),
            ..Default::default()
        };
        let dbg = format!("{o:?}");
        assert!(dbg.contains("string_equals: true"));
        assert!(dbg.contains("string_array_matches: false"));
    }

    #[test]
    fn evaluator_weight_is_uniform_across_variants() {
        assert_eq!(Evaluator::Bool(BoolEvaluator::value(true)).weight(), 0);
        let e = Evaluator::Int(IntEvaluator::handler("open.flags", |_| 0));
        assert_eq!(e.weight(), HANDLER_WEIGHT);
    }
}
