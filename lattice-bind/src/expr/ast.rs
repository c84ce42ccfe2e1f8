//! Expression AST
//!
//! Defines the tree produced by the parser. Nodes are immutable once built
//! and shared behind `Arc` by the cache, so one parse serves every binding
//! with the same source text.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A parsed binding expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: Literal,
    },
    Identifier {
        name: String,
    },
    This,
    /// `object.name`, `object[expr]`, and the `?.` forms.
    Member {
        object: Box<Expr>,
        property: Key,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
        optional: bool,
    },
    Unary {
        operator: UnaryOp,
        argument: Box<Expr>,
    },
    /// Arithmetic, comparison, bitwise, and logical operators.
    Binary {
        operator: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    /// `None` entries are holes (`[a, , b]`).
    Array {
        elements: Vec<Option<Expr>>,
    },
    Object {
        properties: Vec<Property>,
    },
    /// `quasis` always has one more entry than `expressions`.
    Template {
        quasis: Vec<String>,
        expressions: Vec<Expr>,
    },
    Arrow {
        params: Vec<String>,
        body: Arc<Expr>,
    },
    /// `operator` is `None` for plain `=`, otherwise the operator of the
    /// compound form (`+=`, `&&=`, ...).
    Assignment {
        operator: Option<BinaryOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Update {
        operator: UpdateOp,
        prefix: bool,
        argument: Box<Expr>,
    },
    /// `...argument` inside array literals, object literals, and calls.
    Spread {
        argument: Box<Expr>,
    },
    New {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    /// Parenthesized comma list; evaluates to its last entry.
    Sequence {
        expressions: Vec<Expr>,
    },
    /// Top-level list of entries separated by `,` or `;`; evaluates to an
    /// array of every entry's value.
    Compound {
        body: Vec<Expr>,
    },
    TaggedTemplate {
        tag: Box<Expr>,
        quasis: Vec<String>,
        expressions: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Regex { pattern: String, flags: String },
}

/// A member or object-literal key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Static(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Property {
    KeyValue { key: Key, value: Expr, shorthand: bool },
    Spread { argument: Expr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    TypeOf,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    In,
    InstanceOf,
    And,
    Or,
    Nullish,
}

impl BinaryOp {
    /// Binding power for precedence climbing; higher binds tighter.
    pub fn precedence(self) -> u8 {
        use BinaryOp::*;
        match self {
            Or | Nullish => 1,
            And => 2,
            BitOr => 3,
            BitXor => 4,
            BitAnd => 5,
            Eq | NotEq | StrictEq | StrictNotEq => 6,
            Lt | LtEq | Gt | GtEq | In | InstanceOf => 7,
            Shl | Shr | UShr => 8,
            Add | Sub => 9,
            Mul | Div | Rem => 10,
            Exp => 11,
        }
    }

    pub fn is_right_associative(self) -> bool {
        self == BinaryOp::Exp
    }

    /// `&&`, `||`, and `??` evaluate their right operand lazily.
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish)
    }

    pub fn as_str(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Rem => "%",
            Exp => "**",
            Eq => "==",
            NotEq => "!=",
            StrictEq => "===",
            StrictNotEq => "!==",
            Lt => "<",
            LtEq => "<=",
            Gt => ">",
            GtEq => ">=",
            Shl => "<<",
            Shr => ">>",
            UShr => ">>>",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            In => "in",
            InstanceOf => "instanceof",
            And => "&&",
            Or => "||",
            Nullish => "??",
        }
    }

    pub(crate) fn from_punct(punct: &str) -> Option<Self> {
        use BinaryOp::*;
        Some(match punct {
            "+" => Add,
            "-" => Sub,
            "*" => Mul,
            "/" => Div,
            "%" => Rem,
            "**" => Exp,
            "==" => Eq,
            "!=" => NotEq,
            "===" => StrictEq,
            "!==" => StrictNotEq,
            "<" => Lt,
            "<=" => LtEq,
            ">" => Gt,
            ">=" => GtEq,
            "<<" => Shl,
            ">>" => Shr,
            ">>>" => UShr,
            "&" => BitAnd,
            "|" => BitOr,
            "^" => BitXor,
            "in" => In,
            "instanceof" => InstanceOf,
            "&&" => And,
            "||" => Or,
            "??" => Nullish,
            _ => return None,
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Expr {
    pub fn identifier(name: impl Into<String>) -> Self {
        Expr::Identifier { name: name.into() }
    }

    pub fn number(n: f64) -> Self {
        Expr::Literal {
            value: Literal::Number(n),
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expr::Literal {
            value: Literal::String(s.into()),
        }
    }

    /// Whether this node can be assigned to or updated.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expr::Identifier { .. } | Expr::Member { optional: false, .. }
        )
    }

    /// Serialize to JSON for inspection.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
