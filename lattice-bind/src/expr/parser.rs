//! Expression Parser
//!
//! Recursive descent for primaries, member chains, and unary operators;
//! precedence climbing for binary operators. Assignment and the conditional
//! operator sit above the climbing loop, which is what makes
//! `a = b ? c : d` parse as `a = (b ? c : d)` and keeps both right
//! associative.
//!
//! Binding text may hold several expressions separated by `,` or `;`. The
//! top level is parsed as a list: a single entry is returned as-is, several
//! become one [`Expr::Compound`].

use std::sync::Arc;

use crate::error::SyntaxError;

use super::ast::{BinaryOp, Expr, Key, Literal, Property, UnaryOp, UpdateOp};
use super::cursor::Cursor;

type ParseResult<T> = Result<T, SyntaxError>;

/// Words that cannot be used as plain identifiers.
const RESERVED: &[&str] = &["in", "instanceof", "new", "typeof", "void", "delete"];

const ASSIGNMENT_OPS: &[(&str, Option<BinaryOp>)] = &[
    ("=", None),
    ("+=", Some(BinaryOp::Add)),
    ("-=", Some(BinaryOp::Sub)),
    ("*=", Some(BinaryOp::Mul)),
    ("/=", Some(BinaryOp::Div)),
    ("%=", Some(BinaryOp::Rem)),
    ("**=", Some(BinaryOp::Exp)),
    ("<<=", Some(BinaryOp::Shl)),
    (">>=", Some(BinaryOp::Shr)),
    (">>>=", Some(BinaryOp::UShr)),
    ("&=", Some(BinaryOp::BitAnd)),
    ("|=", Some(BinaryOp::BitOr)),
    ("^=", Some(BinaryOp::BitXor)),
    ("&&=", Some(BinaryOp::And)),
    ("||=", Some(BinaryOp::Or)),
    ("??=", Some(BinaryOp::Nullish)),
];

/// Parse binding text into an AST.
pub fn parse(source: &str) -> ParseResult<Expr> {
    let mut parser = Parser {
        cursor: Cursor::new(source),
    };
    parser.program()
}

struct Parser {
    cursor: Cursor,
}

impl Parser {
    fn program(&mut self) -> ParseResult<Expr> {
        let mut body = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.at_end() {
                break;
            }
            if self.cursor.eat_punct(";") {
                continue;
            }
            body.push(self.expression()?);
            self.cursor.skip_whitespace();
            if self.cursor.at_end() || self.cursor.eat_punct(";") {
                continue;
            }
            if !self.cursor.eat_punct(",") {
                return Err(self.cursor.unexpected());
            }
            // A comma must be followed by another entry.
            self.cursor.skip_whitespace();
            if self.cursor.at_end() || matches!(self.cursor.peek_punct(), Some("," | ";")) {
                return Err(self.cursor.unexpected());
            }
        }
        Ok(if body.len() == 1 {
            body.remove(0)
        } else {
            Expr::Compound { body }
        })
    }

    /// AssignmentExpression: conditional, arrow, or assignment.
    fn expression(&mut self) -> ParseResult<Expr> {
        self.cursor.skip_whitespace();
        let start = self.cursor.pos();
        let left = self.conditional()?;

        self.cursor.skip_whitespace();
        let Some(punct) = self.cursor.peek_punct() else {
            return Ok(left);
        };
        let Some(&(_, operator)) = ASSIGNMENT_OPS.iter().find(|(p, _)| *p == punct) else {
            return Ok(left);
        };
        if !left.is_assignable() {
            return Err(SyntaxError::new("Invalid left-hand side in assignment", start));
        }
        self.cursor.eat_punct(punct);
        let value = self.expression()?;
        Ok(Expr::Assignment {
            operator,
            target: Box::new(left),
            value: Box::new(value),
        })
    }

    fn conditional(&mut self) -> ParseResult<Expr> {
        let test = self.binary(0)?;
        self.cursor.skip_whitespace();
        if !self.cursor.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.expression()?;
        self.cursor.expect_punct(":")?;
        let alternate = self.expression()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    /// The binary operator at the cursor, if any.
    fn peek_binary(&self) -> Option<(BinaryOp, usize)> {
        if let Some(word) = self.cursor.peek_word() {
            let op = BinaryOp::from_punct(&word)?;
            return Some((op, word.len()));
        }
        let punct = self.cursor.peek_punct()?;
        BinaryOp::from_punct(punct).map(|op| (op, punct.len()))
    }

    fn binary(&mut self, min_precedence: u8) -> ParseResult<Expr> {
        let mut left = self.unary()?;
        loop {
            self.cursor.skip_whitespace();
            let Some((operator, len)) = self.peek_binary() else {
                break;
            };
            let precedence = operator.precedence();
            if precedence < min_precedence {
                break;
            }
            self.cursor.reset(self.cursor.pos() + len);
            let next = if operator.is_right_associative() {
                precedence
            } else {
                precedence + 1
            };
            let right = self.binary(next)?;
            left = Expr::Binary {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        self.cursor.skip_whitespace();
        let start = self.cursor.pos();

        for (keyword, operator) in [("typeof", UnaryOp::TypeOf), ("void", UnaryOp::Void)] {
            if self.cursor.eat_keyword(keyword) {
                let argument = self.unary()?;
                return Ok(Expr::Unary {
                    operator,
                    argument: Box::new(argument),
                });
            }
        }

        let operator = match self.cursor.peek_punct() {
            Some("!") => UnaryOp::Not,
            Some("~") => UnaryOp::BitNot,
            Some("-") => UnaryOp::Neg,
            Some("+") => UnaryOp::Plus,
            Some(p @ ("++" | "--")) => {
                self.cursor.eat_punct(p);
                let argument = self.unary()?;
                if !argument.is_assignable() {
                    return Err(SyntaxError::new(
                        "Invalid left-hand side expression in prefix operation",
                        start,
                    ));
                }
                return Ok(Expr::Update {
                    operator: update_op(p),
                    prefix: true,
                    argument: Box::new(argument),
                });
            }
            _ => return self.postfix(),
        };
        self.cursor.bump();
        let argument = self.unary()?;
        Ok(Expr::Unary {
            operator,
            argument: Box::new(argument),
        })
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let start = self.cursor.pos();
        let expr = self.call_member()?;
        self.cursor.skip_whitespace();
        match self.cursor.peek_punct() {
            Some(p @ ("++" | "--")) => {
                if !expr.is_assignable() {
                    return Err(SyntaxError::new(
                        "Invalid left-hand side expression in postfix operation",
                        start,
                    ));
                }
                self.cursor.eat_punct(p);
                Ok(Expr::Update {
                    operator: update_op(p),
                    prefix: false,
                    argument: Box::new(expr),
                })
            }
            _ => Ok(expr),
        }
    }

    /// Member accesses, calls, and tagged templates chained onto a primary.
    fn call_member(&mut self) -> ParseResult<Expr> {
        self.cursor.skip_whitespace();
        let mut expr = if self.cursor.peek_word().as_deref() == Some("new") {
            self.new_expression()?
        } else {
            self.primary()?
        };

        loop {
            self.cursor.skip_whitespace();
            match self.cursor.peek_punct() {
                Some(".") => {
                    self.cursor.eat_punct(".");
                    let name = self.cursor.identifier()?;
                    expr = member(expr, Key::Static(name), false);
                }
                Some("?.") => {
                    self.cursor.eat_punct("?.");
                    self.cursor.skip_whitespace();
                    expr = match self.cursor.peek_punct() {
                        Some("(") => {
                            self.cursor.eat_punct("(");
                            let arguments = self.arguments()?;
                            call(expr, arguments, true)
                        }
                        Some("[") => {
                            self.cursor.eat_punct("[");
                            let property = self.computed_key()?;
                            member(expr, property, true)
                        }
                        _ => {
                            let name = self.cursor.identifier()?;
                            member(expr, Key::Static(name), true)
                        }
                    };
                }
                Some("[") => {
                    self.cursor.eat_punct("[");
                    let property = self.computed_key()?;
                    expr = member(expr, property, false);
                }
                Some("(") => {
                    self.cursor.eat_punct("(");
                    let arguments = self.arguments()?;
                    expr = call(expr, arguments, false);
                }
                _ if self.cursor.peek() == Some('`') => {
                    let (quasis, expressions) = self.template()?;
                    expr = Expr::TaggedTemplate {
                        tag: Box::new(expr),
                        quasis,
                        expressions,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// `new Callee(args)`; the callee is a primary with member accesses
    /// only, so `new a.B().c()` calls `c` on the constructed object.
    fn new_expression(&mut self) -> ParseResult<Expr> {
        self.cursor.eat_keyword("new");
        self.cursor.skip_whitespace();
        let mut callee = if self.cursor.peek_word().as_deref() == Some("new") {
            self.new_expression()?
        } else {
            self.primary()?
        };
        loop {
            self.cursor.skip_whitespace();
            match self.cursor.peek_punct() {
                Some(".") => {
                    self.cursor.eat_punct(".");
                    let name = self.cursor.identifier()?;
                    callee = member(callee, Key::Static(name), false);
                }
                Some("[") => {
                    self.cursor.eat_punct("[");
                    let property = self.computed_key()?;
                    callee = member(callee, property, false);
                }
                _ => break,
            }
        }
        let arguments = if self.cursor.eat_punct("(") {
            self.arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            arguments,
        })
    }

    /// Call arguments after the opening parenthesis. A trailing comma is
    /// allowed; holes are not.
    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut arguments = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.eat_punct(")") {
                return Ok(arguments);
            }
            arguments.push(self.spread_or_expression()?);
            self.cursor.skip_whitespace();
            if self.cursor.eat_punct(",") {
                continue;
            }
            self.cursor.expect_punct(")")?;
            return Ok(arguments);
        }
    }

    fn spread_or_expression(&mut self) -> ParseResult<Expr> {
        self.cursor.skip_whitespace();
        if self.cursor.eat_punct("...") {
            let argument = self.expression()?;
            return Ok(Expr::Spread {
                argument: Box::new(argument),
            });
        }
        self.expression()
    }

    /// `[expr]` after the opening bracket.
    fn computed_key(&mut self) -> ParseResult<Key> {
        let key = self.expression()?;
        self.cursor.expect_punct("]")?;
        Ok(Key::Computed(Box::new(key)))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        self.cursor.skip_whitespace();
        let start = self.cursor.pos();

        if self.cursor.at_number() {
            let n = self.cursor.number()?;
            return Ok(Expr::number(n));
        }

        match self.cursor.peek() {
            None => return Err(self.cursor.unexpected()),
            Some('"' | '\'') => {
                let s = self.cursor.string()?;
                return Ok(Expr::string(s));
            }
            Some('`') => {
                let (quasis, expressions) = self.template()?;
                return Ok(Expr::Template {
                    quasis,
                    expressions,
                });
            }
            Some('/') => {
                let (pattern, flags) = self.cursor.regex()?;
                return Ok(Expr::Literal {
                    value: Literal::Regex { pattern, flags },
                });
            }
            Some('(') => return self.parenthesized(),
            Some('[') => return self.array_literal(),
            Some('{') => return self.object_literal(),
            _ => {}
        }

        let Some(word) = self.cursor.peek_word() else {
            return Err(self.cursor.unexpected());
        };
        if RESERVED.contains(&word.as_str()) {
            return Err(SyntaxError::new(format!("Unexpected token {word}"), start));
        }
        self.cursor.reset(start + word.chars().count());

        let literal = match word.as_str() {
            "true" => Some(Literal::Bool(true)),
            "false" => Some(Literal::Bool(false)),
            "null" => Some(Literal::Null),
            "undefined" => Some(Literal::Undefined),
            "this" => return Ok(Expr::This),
            _ => None,
        };
        if let Some(value) = literal {
            return Ok(Expr::Literal { value });
        }

        // Single-parameter arrow: `x => body`.
        self.cursor.skip_whitespace();
        if self.cursor.eat_punct("=>") {
            return self.arrow_body(vec![word]);
        }
        Ok(Expr::Identifier { name: word })
    }

    fn arrow_body(&mut self, params: Vec<String>) -> ParseResult<Expr> {
        let body = self.expression()?;
        Ok(Expr::Arrow {
            params,
            body: Arc::new(body),
        })
    }

    /// Try to read `(a, b) =>`. Restores the cursor and returns `None` if
    /// the parenthesis does not open an arrow parameter list.
    fn arrow_params(&mut self) -> Option<Vec<String>> {
        let start = self.cursor.pos();
        let params = self.arrow_params_inner();
        if params.is_none() {
            self.cursor.reset(start);
        }
        params
    }

    fn arrow_params_inner(&mut self) -> Option<Vec<String>> {
        if !self.cursor.eat_punct("(") {
            return None;
        }
        let mut params = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.eat_punct(")") {
                break;
            }
            let word = self.cursor.peek_word()?;
            self.cursor.reset(self.cursor.pos() + word.chars().count());
            params.push(word);
            self.cursor.skip_whitespace();
            if self.cursor.eat_punct(",") {
                continue;
            }
            if !self.cursor.eat_punct(")") {
                return None;
            }
            break;
        }
        self.cursor.skip_whitespace();
        self.cursor.eat_punct("=>").then_some(params)
    }

    fn parenthesized(&mut self) -> ParseResult<Expr> {
        if let Some(params) = self.arrow_params() {
            return self.arrow_body(params);
        }
        self.cursor.eat_punct("(");
        let mut expressions = vec![self.expression()?];
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.eat_punct(",") {
                expressions.push(self.expression()?);
                continue;
            }
            self.cursor.expect_punct(")")?;
            break;
        }
        Ok(if expressions.len() == 1 {
            expressions.remove(0)
        } else {
            Expr::Sequence { expressions }
        })
    }

    fn array_literal(&mut self) -> ParseResult<Expr> {
        self.cursor.eat_punct("[");
        let mut elements = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.eat_punct("]") {
                break;
            }
            if self.cursor.eat_punct(",") {
                elements.push(None);
                continue;
            }
            elements.push(Some(self.spread_or_expression()?));
            self.cursor.skip_whitespace();
            if self.cursor.eat_punct(",") {
                continue;
            }
            self.cursor.expect_punct("]")?;
            break;
        }
        Ok(Expr::Array { elements })
    }

    fn object_literal(&mut self) -> ParseResult<Expr> {
        self.cursor.eat_punct("{");
        let mut properties = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.eat_punct("}") {
                break;
            }
            properties.push(self.property()?);
            self.cursor.skip_whitespace();
            if self.cursor.eat_punct(",") {
                continue;
            }
            self.cursor.expect_punct("}")?;
            break;
        }
        Ok(Expr::Object { properties })
    }

    fn property(&mut self) -> ParseResult<Property> {
        if self.cursor.eat_punct("...") {
            let argument = self.expression()?;
            return Ok(Property::Spread { argument });
        }

        let (key, shorthand_name) = if self.cursor.eat_punct("[") {
            (self.computed_key()?, None)
        } else if matches!(self.cursor.peek(), Some('"' | '\'')) {
            (Key::Static(self.cursor.string()?), None)
        } else if self.cursor.at_number() {
            let n = self.cursor.number()?;
            (Key::Static(crate::value::format_number(n)), None)
        } else {
            let name = self.cursor.identifier()?;
            (Key::Static(name.clone()), Some(name))
        };

        self.cursor.skip_whitespace();
        if self.cursor.eat_punct(":") {
            let value = self.expression()?;
            return Ok(Property::KeyValue {
                key,
                value,
                shorthand: false,
            });
        }
        match shorthand_name {
            Some(name) if matches!(self.cursor.peek_punct(), Some("," | "}")) => {
                Ok(Property::KeyValue {
                    key,
                    value: Expr::Identifier { name },
                    shorthand: true,
                })
            }
            _ => Err(self.cursor.unexpected()),
        }
    }

    /// A template literal; the cursor sits on the opening backtick.
    fn template(&mut self) -> ParseResult<(Vec<String>, Vec<Expr>)> {
        let start = self.cursor.pos();
        self.cursor.bump();
        let mut quasis = Vec::new();
        let mut expressions = Vec::new();
        let mut current = String::new();
        loop {
            match self.cursor.bump() {
                None => return Err(SyntaxError::new("Unterminated template literal", start)),
                Some('`') => break,
                Some('\\') => {
                    if let Some(c) = self.cursor.escape()? {
                        current.push(c);
                    }
                }
                Some('$') if self.cursor.peek() == Some('{') => {
                    self.cursor.bump();
                    quasis.push(std::mem::take(&mut current));
                    expressions.push(self.expression()?);
                    self.cursor.expect_punct("}")?;
                }
                Some(c) => current.push(c),
            }
        }
        quasis.push(current);
        Ok((quasis, expressions))
    }
}

fn update_op(punct: &str) -> UpdateOp {
    if punct == "++" {
        UpdateOp::Increment
    } else {
        UpdateOp::Decrement
    }
}

fn member(object: Expr, property: Key, optional: bool) -> Expr {
    Expr::Member {
        object: Box::new(object),
        property,
        optional,
    }
}

fn call(callee: Expr, arguments: Vec<Expr>, optional: bool) -> Expr {
    Expr::Call {
        callee: Box::new(callee),
        arguments,
        optional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::identifier(name))
    }

    fn binary(operator: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn multiplication_binds_tighter() {
        let ast = parse("a + b * c").unwrap();
        assert_eq!(
            ast,
            binary(
                BinaryOp::Add,
                Expr::identifier("a"),
                binary(BinaryOp::Mul, Expr::identifier("b"), Expr::identifier("c")),
            )
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        let ast = parse("a - b - c").unwrap();
        assert_eq!(
            ast,
            binary(
                BinaryOp::Sub,
                binary(BinaryOp::Sub, Expr::identifier("a"), Expr::identifier("b")),
                Expr::identifier("c"),
            )
        );
    }

    #[test]
    fn exponent_is_right_associative() {
        let ast = parse("a ** b ** c").unwrap();
        assert_eq!(
            ast,
            binary(
                BinaryOp::Exp,
                Expr::identifier("a"),
                binary(BinaryOp::Exp, Expr::identifier("b"), Expr::identifier("c")),
            )
        );
    }

    #[test]
    fn assignment_takes_the_whole_conditional() {
        let ast = parse("a = b ? c : d").unwrap();
        let Expr::Assignment {
            operator: None,
            target,
            value,
        } = ast
        else {
            panic!("expected assignment, got {ast:?}");
        };
        assert_eq!(target, ident("a"));
        assert!(matches!(*value, Expr::Conditional { .. }));
    }

    #[test]
    fn assignment_is_right_associative() {
        let ast = parse("a = b += 1").unwrap();
        let Expr::Assignment { value, .. } = ast else {
            panic!("expected assignment");
        };
        assert!(matches!(
            *value,
            Expr::Assignment {
                operator: Some(BinaryOp::Add),
                ..
            }
        ));
    }

    #[test]
    fn nested_conditionals() {
        let ast = parse("a ? b : c ? d : e").unwrap();
        let Expr::Conditional { alternate, .. } = ast else {
            panic!("expected conditional");
        };
        assert!(matches!(*alternate, Expr::Conditional { .. }));
    }

    #[test]
    fn top_level_lists_become_compound() {
        let Expr::Compound { body } = parse("a, b; c;").unwrap() else {
            panic!("expected compound");
        };
        assert_eq!(body.len(), 3);
        assert_eq!(parse("a;").unwrap(), Expr::identifier("a"));
        assert_eq!(parse("").unwrap(), Expr::Compound { body: vec![] });
    }

    #[test]
    fn parenthesized_commas_are_sequences() {
        let Expr::Sequence { expressions } = parse("(a, b)").unwrap() else {
            panic!("expected sequence");
        };
        assert_eq!(expressions.len(), 2);
    }

    #[test]
    fn arrows() {
        let Expr::Arrow { params, body } = parse("(a, b) => a + b").unwrap() else {
            panic!("expected arrow");
        };
        assert_eq!(params, vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(*body, Expr::Binary { .. }));

        let Expr::Arrow { params, .. } = parse("() => 1").unwrap() else {
            panic!("expected arrow");
        };
        assert!(params.is_empty());

        let Expr::Arrow { params, body } = parse("x => y => x").unwrap() else {
            panic!("expected arrow");
        };
        assert_eq!(params, vec!["x".to_string()]);
        assert!(matches!(*body, Expr::Arrow { .. }));
    }

    #[test]
    fn member_chains_and_optional_calls() {
        let ast = parse("a?.b[c](1)?.(2)").unwrap();
        let Expr::Call {
            optional: true,
            callee,
            arguments,
        } = ast
        else {
            panic!("expected optional call");
        };
        assert_eq!(arguments, vec![Expr::number(2.0)]);
        assert!(matches!(*callee, Expr::Call { optional: false, .. }));
    }

    #[test]
    fn conditional_with_decimal_is_not_optional_chaining() {
        let ast = parse("a?.5:1").unwrap();
        assert!(matches!(ast, Expr::Conditional { .. }));
    }

    #[test]
    fn new_with_member_callee() {
        let ast = parse("new a.B(1).c").unwrap();
        let Expr::Member { object, .. } = ast else {
            panic!("expected member");
        };
        let Expr::New { callee, arguments } = *object else {
            panic!("expected new");
        };
        assert!(matches!(*callee, Expr::Member { .. }));
        assert_eq!(arguments.len(), 1);

        assert!(matches!(parse("new Date").unwrap(), Expr::New { .. }));
    }

    #[test]
    fn object_literal_forms() {
        let Expr::Object { properties } = parse("{a, 'b': 1, 2: x, [k]: v, ...rest}").unwrap()
        else {
            panic!("expected object");
        };
        assert_eq!(properties.len(), 5);
        assert!(matches!(
            &properties[0],
            Property::KeyValue {
                shorthand: true,
                ..
            }
        ));
        assert!(matches!(
            &properties[2],
            Property::KeyValue { key: Key::Static(k), .. } if k == "2"
        ));
        assert!(matches!(
            &properties[3],
            Property::KeyValue {
                key: Key::Computed(_),
                ..
            }
        ));
        assert!(matches!(&properties[4], Property::Spread { .. }));
    }

    #[test]
    fn array_holes_and_spread() {
        let Expr::Array { elements } = parse("[a, , ...b,]").unwrap() else {
            panic!("expected array");
        };
        assert_eq!(elements.len(), 3);
        assert!(elements[1].is_none());
        assert!(matches!(elements[2], Some(Expr::Spread { .. })));
    }

    #[test]
    fn templates_nest() {
        let Expr::Template {
            quasis,
            expressions,
        } = parse("`a${ `b${c}` }d`").unwrap()
        else {
            panic!("expected template");
        };
        assert_eq!(quasis, vec!["a".to_string(), "d".to_string()]);
        assert!(matches!(expressions[0], Expr::Template { .. }));

        assert!(matches!(
            parse("tag`x${y}`").unwrap(),
            Expr::TaggedTemplate { .. }
        ));
    }

    #[test]
    fn keyword_operators() {
        assert!(matches!(
            parse("'a' in obj").unwrap(),
            Expr::Binary {
                operator: BinaryOp::In,
                ..
            }
        ));
        assert!(matches!(
            parse("x instanceof Array").unwrap(),
            Expr::Binary {
                operator: BinaryOp::InstanceOf,
                ..
            }
        ));
        assert!(matches!(
            parse("typeof x").unwrap(),
            Expr::Unary {
                operator: UnaryOp::TypeOf,
                ..
            }
        ));
        // Identifiers that merely start with a keyword.
        assert_eq!(parse("index").unwrap(), Expr::identifier("index"));
        assert_eq!(parse("typeofx").unwrap(), Expr::identifier("typeofx"));
    }

    #[test]
    fn regex_vs_division() {
        assert!(matches!(
            parse("a / b / c").unwrap(),
            Expr::Binary {
                operator: BinaryOp::Div,
                ..
            }
        ));
        assert!(matches!(
            parse("/ab+/i").unwrap(),
            Expr::Literal {
                value: Literal::Regex { .. }
            }
        ));
    }

    #[test]
    fn update_targets_are_checked() {
        assert!(parse("++a").is_ok());
        assert!(parse("a.b--").is_ok());
        assert!(parse("++1").is_err());
        assert!(parse("(a + b)++").is_err());
        assert!(parse("1 = 2").is_err());
    }

    #[test]
    fn syntax_errors_carry_offsets() {
        let err = parse("a +").unwrap_err();
        assert_eq!(err.offset, 3);

        let err = parse("f(a,,b)").unwrap_err();
        assert_eq!(err.offset, 4);

        assert!(parse("{a:}").is_err());
        assert!(parse("a,,b").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("(a").is_err());
        assert!(parse("'open").is_err());
    }
}
