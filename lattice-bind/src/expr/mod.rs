//! Binding Expressions
//!
//! Parser and AST for the JavaScript expression subset used in template
//! bindings: literals (including regex and template literals), member
//! access with optional chaining, calls, `new`, the full operator table,
//! arrow functions, spread, and object/array literals. Statements,
//! declarations, and loops are not part of the language.

mod ast;
mod cache;
mod cursor;
mod parser;

pub use ast::{BinaryOp, Expr, Key, Literal, Property, UnaryOp, UpdateOp};
pub use cache::{parse_expression, ExpressionCache};
pub use parser::parse;
