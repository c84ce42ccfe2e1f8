//! Character cursor and lexical scanning.
//!
//! The parser is scannerless: grammar rules pull numbers, strings,
//! identifiers, and punctuators straight off a [`Cursor`]. Positions are
//! character offsets, which is what syntax errors report.

use crate::error::SyntaxError;
use crate::value::string_to_number;

/// Punctuators, longest first so matching is greedy.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "**", "<<", ">>", "+=", "-=", "*=", "/=", "%=",
    "&=", "|=", "^=", "++", "--", "+", "-", "*", "/", "%", "<", ">", "=", "!", "~", "&", "|",
    "^", "?", ":", ".", ",", ";", "(", ")", "[", "]", "{", "}",
];

pub(crate) struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

pub(crate) fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit() || c == '\u{200c}' || c == '\u{200d}'
}

impl Cursor {
    pub(crate) fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn reset(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    pub(crate) fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.pos)
    }

    /// Error for whatever sits at the cursor.
    pub(crate) fn unexpected(&self) -> SyntaxError {
        match self.peek() {
            Some(c) => self.error(format!("Unexpected token {c}")),
            None => self.error("Unexpected end of input"),
        }
    }

    fn starts_with(&self, text: &str) -> bool {
        let mut i = self.pos;
        for c in text.chars() {
            if self.chars.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        true
    }

    /// The punctuator at the cursor, without consuming it.
    pub(crate) fn peek_punct(&self) -> Option<&'static str> {
        let found = PUNCTUATORS.iter().copied().find(|p| self.starts_with(p))?;
        // `a?.5:b` is a conditional, not optional chaining.
        if found == "?." && self.peek_at(2).is_some_and(|c| c.is_ascii_digit()) {
            return Some("?");
        }
        // `.5` is a number.
        if found == "." && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(found)
    }

    /// Consume `punct` if it is the punctuator at the cursor.
    pub(crate) fn eat_punct(&mut self, punct: &str) -> bool {
        if self.peek_punct() == Some(punct) {
            self.pos += punct.chars().count();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_punct(&mut self, punct: &str) -> Result<(), SyntaxError> {
        self.skip_whitespace();
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(match self.peek() {
                Some(c) => self.error(format!("Expected {punct} but found {c}")),
                None => self.error(format!("Expected {punct} but reached end of input")),
            })
        }
    }

    /// The identifier at the cursor, without consuming it.
    pub(crate) fn peek_word(&self) -> Option<String> {
        let first = self.peek()?;
        if !is_ident_start(first) {
            return None;
        }
        let word = self.chars[self.pos..]
            .iter()
            .take_while(|c| is_ident_part(**c))
            .collect();
        Some(word)
    }

    /// Consume `keyword` if it appears at the cursor as a whole word.
    pub(crate) fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_word().as_deref() == Some(keyword) {
            self.pos += keyword.chars().count();
            true
        } else {
            false
        }
    }

    pub(crate) fn identifier(&mut self) -> Result<String, SyntaxError> {
        self.skip_whitespace();
        let word = self.peek_word().ok_or_else(|| self.unexpected())?;
        self.pos += word.chars().count();
        Ok(word)
    }

    // ------------------------------------------------------------------
    // Numbers
    // ------------------------------------------------------------------

    pub(crate) fn at_number(&self) -> bool {
        match self.peek() {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => self.peek_at(1).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    pub(crate) fn number(&mut self) -> Result<f64, SyntaxError> {
        let start = self.pos;
        let radix = match (self.peek(), self.peek_at(1)) {
            (Some('0'), Some('x' | 'X')) => Some(16),
            (Some('0'), Some('o' | 'O')) => Some(8),
            (Some('0'), Some('b' | 'B')) => Some(2),
            _ => None,
        };

        let value = if let Some(radix) = radix {
            self.pos += 2;
            let digits = self.take_while(|c| c.is_digit(radix) || c == '_');
            if digits.is_empty() {
                return Err(SyntaxError::new("Invalid or unexpected token", start));
            }
            let digits: String = digits.chars().filter(|c| *c != '_').collect();
            crate::value::parse_radix_digits(&digits, radix)
                .ok_or_else(|| SyntaxError::new("Invalid or unexpected token", start))?
        } else {
            let mut text = self.take_while(|c| c.is_ascii_digit() || c == '_');
            if self.peek() == Some('.') {
                self.pos += 1;
                text.push('.');
                text.push_str(&self.take_while(|c| c.is_ascii_digit() || c == '_'));
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                let mark = self.pos;
                let mut exponent = String::from("e");
                self.pos += 1;
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    exponent.push(sign);
                    self.pos += 1;
                }
                let digits = self.take_while(|c| c.is_ascii_digit());
                if digits.is_empty() {
                    self.pos = mark;
                    return Err(self.error("Invalid or unexpected token"));
                }
                exponent.push_str(&digits);
                text.push_str(&exponent);
            }
            let text: String = text.chars().filter(|c| *c != '_').collect();
            string_to_number(&text)
        };

        if self.peek().is_some_and(is_ident_start) {
            return Err(self.error("Invalid or unexpected token"));
        }
        Ok(value)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek().filter(|c| pred(*c)) {
            out.push(c);
            self.pos += 1;
        }
        out
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    /// A quoted string literal; the cursor sits on the opening quote.
    pub(crate) fn string(&mut self) -> Result<String, SyntaxError> {
        let start = self.pos;
        let quote = self.bump().ok_or_else(|| self.unexpected())?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(SyntaxError::new("Invalid or unexpected token", start))
                }
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    if let Some(c) = self.escape()? {
                        out.push(c);
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    /// Decode one escape sequence after a backslash. Line continuations
    /// produce nothing.
    pub(crate) fn escape(&mut self) -> Result<Option<char>, SyntaxError> {
        let start = self.pos;
        let c = self
            .bump()
            .ok_or_else(|| SyntaxError::new("Invalid or unexpected token", start))?;
        Ok(Some(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' if !self.peek().is_some_and(|c| c.is_ascii_digit()) => '\0',
            'x' => self.hex_escape(2, start)?,
            'u' if self.peek() == Some('{') => {
                self.pos += 1;
                let digits = self.take_while(|c| c.is_ascii_hexdigit());
                if !self.eat_punct("}") {
                    return Err(SyntaxError::new("Invalid Unicode escape sequence", start));
                }
                code_point(&digits, start)?
            }
            'u' => self.hex_escape(4, start)?,
            '\n' => return Ok(None),
            '\r' => {
                if self.peek() == Some('\n') {
                    self.pos += 1;
                }
                return Ok(None);
            }
            other => other,
        }))
    }

    fn hex_escape(&mut self, len: usize, start: usize) -> Result<char, SyntaxError> {
        let mut digits = String::with_capacity(len);
        for _ in 0..len {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                _ => return Err(SyntaxError::new("Invalid hexadecimal escape sequence", start)),
            }
        }
        code_point(&digits, start)
    }

    // ------------------------------------------------------------------
    // Regular expressions
    // ------------------------------------------------------------------

    /// A regex literal; the cursor sits on the opening slash.
    pub(crate) fn regex(&mut self) -> Result<(String, String), SyntaxError> {
        let start = self.pos;
        self.pos += 1;
        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(SyntaxError::new(
                        "Invalid regular expression: missing /",
                        start,
                    ))
                }
                Some('\\') => {
                    pattern.push('\\');
                    match self.bump() {
                        Some(c) => pattern.push(c),
                        None => {
                            return Err(SyntaxError::new(
                                "Invalid regular expression: missing /",
                                start,
                            ))
                        }
                    }
                }
                Some('[') => {
                    in_class = true;
                    pattern.push('[');
                }
                Some(']') => {
                    in_class = false;
                    pattern.push(']');
                }
                Some('/') if !in_class => break,
                Some(c) => pattern.push(c),
            }
        }
        let flags = self.take_while(is_ident_part);
        let mut seen = String::new();
        for flag in flags.chars() {
            if !"dgimsuy".contains(flag) || seen.contains(flag) {
                return Err(SyntaxError::new(
                    format!("Invalid regular expression flags '{flags}'"),
                    start,
                ));
            }
            seen.push(flag);
        }
        Ok((pattern, flags))
    }
}

fn code_point(digits: &str, start: usize) -> Result<char, SyntaxError> {
    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| SyntaxError::new("Invalid Unicode escape sequence", start))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuators_match_greedily() {
        let c = Cursor::new(">>>= x");
        assert_eq!(c.peek_punct(), Some(">>>="));
        let c = Cursor::new("?.5");
        assert_eq!(c.peek_punct(), Some("?"));
        let c = Cursor::new("?.b");
        assert_eq!(c.peek_punct(), Some("?."));
        let c = Cursor::new(".5");
        assert_eq!(c.peek_punct(), None);
    }

    #[test]
    fn numbers() {
        for (text, expected) in [
            ("42", 42.0),
            ("3.25", 3.25),
            (".5", 0.5),
            ("1e3", 1000.0),
            ("2.5E-1", 0.25),
            ("0xff", 255.0),
            ("0o17", 15.0),
            ("0b101", 5.0),
            ("1_000", 1000.0),
        ] {
            let mut c = Cursor::new(text);
            assert_eq!(c.number().unwrap(), expected, "{text}");
            assert!(c.at_end(), "{text}");
        }
        assert!(Cursor::new("3in").number().is_err());
        assert!(Cursor::new("0x").number().is_err());
    }

    #[test]
    fn strings_decode_escapes() {
        let mut c = Cursor::new(r#""a\n\t\"b\x41B\u{1F600}""#);
        assert_eq!(c.string().unwrap(), "a\n\t\"bAB\u{1F600}");
        let mut c = Cursor::new("'it\\'s'");
        assert_eq!(c.string().unwrap(), "it's");
        assert!(Cursor::new("'open").string().is_err());
    }

    #[test]
    fn regex_literals() {
        let mut c = Cursor::new(r"/a[/]b\/c/gi rest");
        let (pattern, flags) = c.regex().unwrap();
        assert_eq!(pattern, r"a[/]b\/c");
        assert_eq!(flags, "gi");
        assert!(Cursor::new("/a/gg").regex().is_err());
        assert!(Cursor::new("/a/q").regex().is_err());
    }
}
