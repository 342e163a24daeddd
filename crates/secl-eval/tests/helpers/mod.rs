//! Shared test support: a process-event model over JSON events and
//! expression builders standing in for the grammar front-end.

#![allow(dead_code)]

use std::sync::Arc;

use secl_ast::{
    Array, BitwiseOp, CidrMember, ComparisonOp, Expr, LogicalOp, MembershipOp, Pos, Primary,
    StringMember, UnaryOp,
};
use secl_eval::{
    BoolEvaluator, CidrArrayEvaluator, CidrEvaluator, Context, EvalKind, Evaluator, IntEvaluator,
    IteratorFactory, Model, ModelError, OpOverrides, State, StringArrayEvaluator, StringEvaluator,
    VariableStore, compile, host_net, operators, parse_cidr,
};
use serde_json::{Value, json};

// =============================================================================
// Event model
// =============================================================================

pub struct Ancestors;

impl IteratorFactory for Ancestors {
    fn count(&self, ctx: &Context<'_>) -> usize {
        ctx.event().array_len("process.ancestors")
    }
}

/// Case-insensitive equality, attached to `process.cmd` as an operator
/// override.
pub fn ci_string_equals(
    a: &StringEvaluator,
    b: &StringEvaluator,
    state: &mut State<'_>,
) -> secl_eval::Result<BoolEvaluator> {
    operators::string_equals(&lowercased(a), &lowercased(b), state)
}

fn lowercased(e: &StringEvaluator) -> StringEvaluator {
    let kind = match &e.kind {
        EvalKind::Value(v) => EvalKind::Value(v.to_lowercase()),
        EvalKind::Fnc(f) => {
            let f = f.clone();
            EvalKind::Fnc(Arc::new(move |ctx: &Context<'_>| f(ctx).to_lowercase()))
        }
    };
    StringEvaluator { kind, ..e.clone() }
}

/// The host schema used by the end-to-end tests: a process event with an
/// ancestor chain, open/exec attributes, and a network destination.
pub struct TestModel;

impl Model for TestModel {
    fn evaluator(&self, field: &str, register_id: &str) -> Result<Evaluator, ModelError> {
        match field {
            "process.name" => Ok(Evaluator::String(StringEvaluator::handler(field, |ctx| {
                ctx.event().str("process.name")
            }))),
            "process.cmd" => Ok(Evaluator::String(
                StringEvaluator::handler(field, |ctx| ctx.event().str("process.cmd"))
                    .with_overrides(OpOverrides {
                        string_equals: Some(ci_string_equals),
                        ..Default::default()
                    }),
            )),
            "process.argv" => Ok(Evaluator::StringArray(StringArrayEvaluator::handler(
                field,
                |ctx| ctx.event().str_array("process.argv"),
            ))),
            "process.is_root" => Ok(Evaluator::Bool(BoolEvaluator::handler(field, |ctx| {
                ctx.event().bool("process.is_root")
            }))),
            "process.uid" | "open.flags" | "open.mode" | "file.size" => {
                let path = field.to_string();
                Ok(Evaluator::Int(IntEvaluator::handler(field, move |ctx| {
                    ctx.event().int(&path)
                })))
            }
            "exec.path" => Ok(Evaluator::String(StringEvaluator::handler(field, |ctx| {
                ctx.event().str("exec.path")
            }))),
            "event.duration" => Ok(Evaluator::Int(
                IntEvaluator::handler(field, |ctx| ctx.event().int("event.start")).duration(),
            )),
            "connect.dest" => Ok(Evaluator::Cidr(CidrEvaluator::handler(field, |ctx| {
                ctx.event()
                    .ip("connect.dest")
                    .map(host_net)
                    .unwrap_or_else(|| parse_cidr("0.0.0.0/32").expect("static cidr"))
            }))),
            "connect.allowed" => Ok(Evaluator::CidrArray(CidrArrayEvaluator::handler(
                field,
                |ctx| {
                    ctx.event()
                        .str_array("connect.allowed")
                        .iter()
                        .filter_map(|s| parse_cidr(s).ok())
                        .collect()
                },
            ))),
            "process.ancestors.name" => {
                let reg = register_id.to_string();
                Ok(Evaluator::String(StringEvaluator::handler(
                    field,
                    move |ctx| {
                        ctx.register(&reg)
                            .and_then(|idx| ctx.event().index("process.ancestors", idx))
                            .map(|e| e.str("name"))
                            .unwrap_or_default()
                    },
                )))
            }
            "process.ancestors.uid" => {
                let reg = register_id.to_string();
                Ok(Evaluator::Int(IntEvaluator::handler(field, move |ctx| {
                    ctx.register(&reg)
                        .and_then(|idx| ctx.event().index("process.ancestors", idx))
                        .map(|e| e.int("uid"))
                        .unwrap_or_default()
                })))
            }
            _ => Err(ModelError::UnknownField(field.to_string())),
        }
    }

    fn iterator(&self, field: &str) -> Option<Arc<dyn IteratorFactory>> {
        (field == "process.ancestors").then(|| Arc::new(Ancestors) as Arc<dyn IteratorFactory>)
    }

    fn legacy_field(&self, field: &str) -> Option<&str> {
        (field == "process.comm").then_some("process.name")
    }

    fn constant(&self, name: &str) -> Option<Evaluator> {
        match name {
            "true" => Some(Evaluator::Bool(BoolEvaluator::value(true))),
            "false" => Some(Evaluator::Bool(BoolEvaluator::value(false))),
            "O_RDWR" => Some(Evaluator::Int(IntEvaluator::value(2))),
            _ => None,
        }
    }
}

// =============================================================================
// Expression builders
// =============================================================================

pub fn ident(name: &str) -> Expr {
    Expr::Primary(Primary::Ident {
        name: name.to_string(),
        pos: Pos::default(),
    })
}

pub fn var(name: &str) -> Expr {
    Expr::Primary(Primary::Variable {
        name: name.to_string(),
        pos: Pos::default(),
    })
}

pub fn num(value: i64) -> Expr {
    Expr::Primary(Primary::Number {
        value,
        pos: Pos::default(),
    })
}

pub fn dur(value: i64) -> Expr {
    Expr::Primary(Primary::Duration {
        value,
        pos: Pos::default(),
    })
}

pub fn string(value: &str) -> Expr {
    Expr::Primary(Primary::Str {
        value: value.to_string(),
        pos: Pos::default(),
    })
}

pub fn pat(value: &str) -> Expr {
    Expr::Primary(Primary::Pattern {
        value: value.to_string(),
        pos: Pos::default(),
    })
}

pub fn re_lit(value: &str) -> Expr {
    Expr::Primary(Primary::Regexp {
        value: value.to_string(),
        pos: Pos::default(),
    })
}

pub fn ip(value: &str) -> Expr {
    Expr::Primary(Primary::Ip {
        value: value.to_string(),
        pos: Pos::default(),
    })
}

pub fn cidr(value: &str) -> Expr {
    Expr::Primary(Primary::Cidr {
        value: value.to_string(),
        pos: Pos::default(),
    })
}

pub fn cmp(op: ComparisonOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Comparison {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        pos: Pos::default(),
    }
}

pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
    cmp(ComparisonOp::Eq, lhs, rhs)
}

pub fn ne(lhs: Expr, rhs: Expr) -> Expr {
    cmp(ComparisonOp::Ne, lhs, rhs)
}

pub fn matches(lhs: Expr, rhs: Expr) -> Expr {
    cmp(ComparisonOp::Matches, lhs, rhs)
}

pub fn not_matches(lhs: Expr, rhs: Expr) -> Expr {
    cmp(ComparisonOp::NotMatches, lhs, rhs)
}

pub fn and(lhs: Expr, rhs: Expr) -> Expr {
    Expr::Logical {
        op: LogicalOp::And,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        pos: Pos::default(),
    }
}

pub fn or(lhs: Expr, rhs: Expr) -> Expr {
    Expr::Logical {
        op: LogicalOp::Or,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        pos: Pos::default(),
    }
}

pub fn not(operand: Expr) -> Expr {
    Expr::Unary {
        op: UnaryOp::Not,
        operand: Box::new(operand),
        pos: Pos::default(),
    }
}

pub fn neg(operand: Expr) -> Expr {
    Expr::Unary {
        op: UnaryOp::Minus,
        operand: Box::new(operand),
        pos: Pos::default(),
    }
}

pub fn bitnot(operand: Expr) -> Expr {
    Expr::Unary {
        op: UnaryOp::BitNot,
        operand: Box::new(operand),
        pos: Pos::default(),
    }
}

pub fn band(lhs: Expr, rhs: Expr) -> Expr {
    Expr::Bitwise {
        op: BitwiseOp::And,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        pos: Pos::default(),
    }
}

pub fn bor(lhs: Expr, rhs: Expr) -> Expr {
    Expr::Bitwise {
        op: BitwiseOp::Or,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        pos: Pos::default(),
    }
}

pub fn bxor(lhs: Expr, rhs: Expr) -> Expr {
    Expr::Bitwise {
        op: BitwiseOp::Xor,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        pos: Pos::default(),
    }
}

pub fn in_(lhs: Expr, rhs: Array) -> Expr {
    Expr::Membership {
        op: MembershipOp::In,
        lhs: Box::new(lhs),
        rhs,
        pos: Pos::default(),
    }
}

pub fn notin(lhs: Expr, rhs: Array) -> Expr {
    Expr::Membership {
        op: MembershipOp::NotIn,
        lhs: Box::new(lhs),
        rhs,
        pos: Pos::default(),
    }
}

pub fn allin(lhs: Expr, rhs: Array) -> Expr {
    Expr::Membership {
        op: MembershipOp::AllIn,
        lhs: Box::new(lhs),
        rhs,
        pos: Pos::default(),
    }
}

pub fn arr_nums(values: &[i64]) -> Array {
    Array::Numbers {
        values: values.to_vec(),
        pos: Pos::default(),
    }
}

pub fn arr_strs(members: &[&str]) -> Array {
    Array::Strings {
        members: members
            .iter()
            .map(|s| StringMember::Literal(s.to_string()))
            .collect(),
        pos: Pos::default(),
    }
}

pub fn arr_pats(members: &[&str]) -> Array {
    Array::Strings {
        members: members
            .iter()
            .map(|s| StringMember::Pattern(s.to_string()))
            .collect(),
        pos: Pos::default(),
    }
}

pub fn arr_cidrs(members: &[&str]) -> Array {
    Array::Cidrs {
        members: members
            .iter()
            .map(|s| {
                if s.contains('/') {
                    CidrMember::Cidr(s.to_string())
                } else {
                    CidrMember::Ip(s.to_string())
                }
            })
            .collect(),
        pos: Pos::default(),
    }
}

pub fn arr_ident(name: &str) -> Array {
    Array::Ident {
        name: name.to_string(),
        pos: Pos::default(),
    }
}

pub fn arr_var(name: &str) -> Array {
    Array::Variable {
        name: name.to_string(),
        pos: Pos::default(),
    }
}

// =============================================================================
// Compile / eval shorthands
// =============================================================================

pub fn compile_rule(expr: &Expr) -> secl_eval::Result<(BoolEvaluator, usize)> {
    let vars = VariableStore::new();
    let mut state = State::new(&TestModel, &vars);
    compile(expr, &mut state)
}

pub fn compile_err(expr: &Expr) -> secl_eval::CompileError {
    compile_rule(expr).expect_err("compilation should fail")
}

pub fn eval_on(expr: &Expr, event: &Value) -> bool {
    let (compiled, _) = compile_rule(expr).expect("compilation should succeed");
    compiled.eval(&Context::with_now(event, 0))
}

pub fn eval_at(expr: &Expr, event: &Value, now: i64) -> bool {
    let (compiled, _) = compile_rule(expr).expect("compilation should succeed");
    compiled.eval(&Context::with_now(event, now))
}

/// A representative process event.
pub fn sshd_event() -> Value {
    json!({
        "process": {
            "name": "sshd",
            "cmd": "/usr/sbin/sshd -D",
            "argv": ["-D", "-p", "22"],
            "is_root": true,
            "uid": 0,
            "ancestors": [
                {"name": "bash", "uid": 1000},
                {"name": "login", "uid": 0},
                {"name": "init", "uid": 0},
            ],
        },
        "open": {"flags": 6, "mode": 420},
        "file": {"size": 1024},
        "exec": {"path": "/usr/local/sbin/foo"},
        "connect": {
            "dest": "10.5.1.1",
            "allowed": ["10.1.0.0/16", "172.16.0.1"],
        },
        "event": {"start": 1_000_000_000_i64},
    })
}
