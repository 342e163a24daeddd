//! Expression nodes for SECL rules.
//!
//! A rule like `process.name == "sshd" && open.flags & 2 != 0` parses into a
//! tree of [`Expr`] nodes whose leaves are [`Primary`] literals and field
//! identifiers. Every node carries the source position of the token that
//! introduced it so downstream errors can point back into the rule text.

use std::fmt;

use serde::Serialize;

// =============================================================================
// Source positions
// =============================================================================

/// A position in the rule source text, 1-based.
///
/// The zero position (`0:0`) is used for synthesized nodes that have no
/// source location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn new(line: u32, column: u32) -> Self {
        Pos { line, column }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// =============================================================================
// Operators
// =============================================================================

/// Short-circuiting boolean connectives (`&&`/`and`, `||`/`or`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

/// Integer bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
}

impl BitwiseOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BitwiseOp::And => "&",
            BitwiseOp::Or => "|",
            BitwiseOp::Xor => "^",
        }
    }
}

/// Scalar comparison operators, including the pattern-match pair `=~`/`!~`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Matches,
    NotMatches,
}

impl ComparisonOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Matches => "=~",
            ComparisonOp::NotMatches => "!~",
        }
    }
}

/// Set-containment operators.
///
/// `in` and `notin` test membership of the left operand; `allin` tests that
/// every element of a left-hand array is a member of the right-hand set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MembershipOp {
    In,
    NotIn,
    AllIn,
}

impl MembershipOp {
    pub fn symbol(self) -> &'static str {
        match self {
            MembershipOp::In => "in",
            MembershipOp::NotIn => "notin",
            MembershipOp::AllIn => "allin",
        }
    }
}

/// Prefix operators: boolean negation, arithmetic negation, one's complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Not,
    Minus,
    BitNot,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Minus => "-",
            UnaryOp::BitNot => "^",
        }
    }
}

// =============================================================================
// Expressions
// =============================================================================

/// A SECL expression node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    /// `lhs && rhs`, `lhs || rhs`
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Pos,
    },
    /// `lhs & rhs`, `lhs | rhs`, `lhs ^ rhs`
    Bitwise {
        op: BitwiseOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Pos,
    },
    /// `lhs == rhs`, `lhs < rhs`, `lhs =~ rhs`, ...
    Comparison {
        op: ComparisonOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Pos,
    },
    /// `lhs in [...]`, `lhs notin [...]`, `lhs allin [...]`
    Membership {
        op: MembershipOp,
        lhs: Box<Expr>,
        rhs: Array,
        pos: Pos,
    },
    /// `!x`, `-x`, `^x`
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: Pos,
    },
    /// A literal, identifier, or variable reference.
    Primary(Primary),
}

impl Expr {
    /// The source position of the node.
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Logical { pos, .. }
            | Expr::Bitwise { pos, .. }
            | Expr::Comparison { pos, .. }
            | Expr::Membership { pos, .. }
            | Expr::Unary { pos, .. } => *pos,
            Expr::Primary(p) => p.pos(),
        }
    }
}

/// An expression leaf.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Primary {
    /// A field path, macro name, or model constant, e.g.
    /// `process.ancestors[_].name`.
    Ident { name: String, pos: Pos },
    /// A `${name}` variable reference; the parser strips the braces.
    Variable { name: String, pos: Pos },
    /// An integer literal.
    Number { value: i64, pos: Pos },
    /// A duration literal like `5s` or `1h`, scaled to nanoseconds.
    Duration { value: i64, pos: Pos },
    /// A double-quoted string; may still contain `${...}` interpolation,
    /// which the compiler expands.
    Str { value: String, pos: Pos },
    /// A `~"..."` glob pattern literal.
    Pattern { value: String, pos: Pos },
    /// An `r"..."` regular expression literal.
    Regexp { value: String, pos: Pos },
    /// A bare IP literal like `192.168.1.1`.
    Ip { value: String, pos: Pos },
    /// A CIDR literal like `10.0.0.0/8`.
    Cidr { value: String, pos: Pos },
}

impl Primary {
    pub fn pos(&self) -> Pos {
        match self {
            Primary::Ident { pos, .. }
            | Primary::Variable { pos, .. }
            | Primary::Number { pos, .. }
            | Primary::Duration { pos, .. }
            | Primary::Str { pos, .. }
            | Primary::Pattern { pos, .. }
            | Primary::Regexp { pos, .. }
            | Primary::Ip { pos, .. }
            | Primary::Cidr { pos, .. } => *pos,
        }
    }
}

// =============================================================================
// Arrays
// =============================================================================

/// The right-hand side of a membership operator.
///
/// Literal collections are kept homogeneous by the grammar; a bare identifier
/// or variable in array position is resolved by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Array {
    /// `[1, 2, 3]`
    Numbers { values: Vec<i64>, pos: Pos },
    /// `["sshd", ~"/usr/*", r"^a+"]`
    Strings { members: Vec<StringMember>, pos: Pos },
    /// A field or macro reference in array position.
    Ident { name: String, pos: Pos },
    /// A `${name}` variable in array position.
    Variable { name: String, pos: Pos },
    /// `[10.0.0.0/8, 192.168.1.1]` — CIDRs and bare IPs mix freely.
    Cidrs { members: Vec<CidrMember>, pos: Pos },
}

impl Array {
    pub fn pos(&self) -> Pos {
        match self {
            Array::Numbers { pos, .. }
            | Array::Strings { pos, .. }
            | Array::Ident { pos, .. }
            | Array::Variable { pos, .. }
            | Array::Cidrs { pos, .. } => *pos,
        }
    }
}

/// One member of a string collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StringMember {
    Literal(String),
    Pattern(String),
    Regexp(String),
}

/// One member of a CIDR collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CidrMember {
    Ip(String),
    Cidr(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pos_display() {
        assert_eq!(Pos::new(3, 14).to_string(), "3:14");
        assert_eq!(Pos::default().to_string(), "0:0");
    }

    #[test]
    fn expr_pos_recurses_into_primaries() {
        let e = Expr::Primary(Primary::Number {
            value: 42,
            pos: Pos::new(1, 7),
        });
        assert_eq!(e.pos(), Pos::new(1, 7));

        let tree = Expr::Logical {
            op: LogicalOp::And,
            lhs: Box::new(e.clone()),
            rhs: Box::new(e),
            pos: Pos::new(1, 1),
        };
        assert_eq!(tree.pos(), Pos::new(1, 1));
    }

    #[test]
    fn operator_symbols() {
        assert_eq!(LogicalOp::Or.symbol(), "||");
        assert_eq!(BitwiseOp::Xor.symbol(), "^");
        assert_eq!(ComparisonOp::Matches.symbol(), "=~");
        assert_eq!(MembershipOp::AllIn.symbol(), "allin");
        assert_eq!(UnaryOp::BitNot.symbol(), "^");
    }

    #[test]
    fn serializes_for_diagnostics() {
        let e = Expr::Primary(Primary::Str {
            value: "sshd".into(),
            pos: Pos::new(1, 17),
        });
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("sshd"));
    }
}
