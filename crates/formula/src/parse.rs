//! A1 formula text back to an expression tree.
//!
//! Accepts the subset the renderer produces plus insignificant whitespace,
//! lowercase function names and optional `$` markers.

use crate::address::{column_index, CellAddr, CellRef, RangeRef};
use crate::error::FormulaError;
use crate::expr::{BinaryOp, Expr, Function};

/// Parse formula text; the leading `=` is optional.
pub fn parse(text: &str) -> Result<Expr, FormulaError> {
    let mut p = Parser {
        chars: text.chars().collect(),
        pos: 0,
    };
    p.skip_ws();
    if p.peek() == Some('=') {
        p.pos += 1;
    }
    let expr = p.comparison()?;
    p.skip_ws();
    if p.pos < p.chars.len() {
        return Err(p.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn error(&self, message: &str) -> FormulaError {
        FormulaError::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), FormulaError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    // ── Precedence levels ──────────────────────────────────────────

    fn comparison(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.concat()?;
        loop {
            self.skip_ws();
            let op = match (self.peek(), self.peek_at(1)) {
                (Some('<'), Some('=')) => Some((BinaryOp::Le, 2)),
                (Some('>'), Some('=')) => Some((BinaryOp::Ge, 2)),
                (Some('<'), Some('>')) => Some((BinaryOp::Ne, 2)),
                (Some('<'), _) => Some((BinaryOp::Lt, 1)),
                (Some('>'), _) => Some((BinaryOp::Gt, 1)),
                (Some('='), _) => Some((BinaryOp::Eq, 1)),
                _ => None,
            };
            let Some((op, width)) = op else { break };
            self.pos += width;
            let rhs = self.concat()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn concat(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.additive()?;
        while self.eat('&') {
            let rhs = self.additive()?;
            lhs = Expr::binary(BinaryOp::Concat, lhs, rhs);
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat('+') {
                BinaryOp::Add
            } else if self.eat('-') {
                BinaryOp::Sub
            } else {
                break;
            };
            let rhs = self.term()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat('*') {
                BinaryOp::Mul
            } else if self.eat('/') {
                BinaryOp::Div
            } else {
                break;
            };
            let rhs = self.unary()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if self.eat('-') {
            let inner = self.unary()?;
            return Ok(match inner {
                Expr::Number(v) => Expr::Number(-v),
                other => Expr::Neg(Box::new(other)),
            });
        }
        if self.eat('+') {
            return self.unary();
        }
        self.primary()
    }

    // ── Atoms ──────────────────────────────────────────────────────

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("unexpected end of formula")),
            Some('(') => {
                self.pos += 1;
                let inner = self.comparison()?;
                self.expect(')')?;
                Ok(inner)
            }
            Some('"') => self.string(),
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some('\'') => {
                let sheet = self.quoted_sheet()?;
                self.expect('!')?;
                self.reference(Some(sheet))
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => self.word(),
            Some(_) => Err(self.error("unexpected character")),
        }
    }

    fn number(&mut self) -> Result<Expr, FormulaError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Expr::Number)
            .map_err(|_| FormulaError::Parse {
                position: start,
                message: format!("bad number '{text}'"),
            })
    }

    fn string(&mut self) -> Result<Expr, FormulaError> {
        self.pos += 1;
        let mut s = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some('"') if self.peek_at(1) == Some('"') => {
                    s.push('"');
                    self.pos += 2;
                }
                Some('"') => {
                    self.pos += 1;
                    return Ok(Expr::Text(s));
                }
                Some(c) => {
                    s.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn quoted_sheet(&mut self) -> Result<String, FormulaError> {
        self.pos += 1;
        let mut s = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated sheet name")),
                Some('\'') if self.peek_at(1) == Some('\'') => {
                    s.push('\'');
                    self.pos += 2;
                }
                Some('\'') => {
                    self.pos += 1;
                    return Ok(s);
                }
                Some(c) => {
                    s.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn raw_word(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// A function call, boolean, sheet-qualified or local reference.
    fn word(&mut self) -> Result<Expr, FormulaError> {
        let start = self.pos;
        let word = self.raw_word();
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                let f = Function::from_name(&word)
                    .ok_or_else(|| FormulaError::UnknownFunction(word.clone()))?;
                self.pos += 1;
                let args = self.arguments()?;
                Ok(Expr::Call(f, args))
            }
            Some('!') => {
                self.pos += 1;
                self.reference(Some(word))
            }
            _ if word.eq_ignore_ascii_case("TRUE") => Ok(Expr::Bool(true)),
            _ if word.eq_ignore_ascii_case("FALSE") => Ok(Expr::Bool(false)),
            _ => {
                self.pos = start;
                self.reference(None)
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, FormulaError> {
        let mut args = Vec::new();
        if self.eat(')') {
            return Ok(args);
        }
        loop {
            args.push(self.comparison()?);
            if self.eat(',') {
                continue;
            }
            self.expect(')')?;
            return Ok(args);
        }
    }

    fn reference(&mut self, sheet: Option<String>) -> Result<Expr, FormulaError> {
        self.skip_ws();
        let first = self.raw_word();
        if first.is_empty() {
            return Err(self.error("expected a cell reference"));
        }
        if self.peek() == Some(':') {
            self.pos += 1;
            let second = self.raw_word();
            return range_from_parts(sheet, &first, &second);
        }
        let addr = CellAddr::parse(&first)?;
        Ok(Expr::Ref(CellRef {
            sheet,
            addr,
            absolute: first.contains('$'),
        }))
    }
}

fn range_from_parts(
    sheet: Option<String>,
    first: &str,
    second: &str,
) -> Result<Expr, FormulaError> {
    let bad = || FormulaError::InvalidReference(format!("{first}:{second}"));
    let a = first.replace('$', "");
    let b = second.replace('$', "");

    if a.chars().all(|c| c.is_ascii_alphabetic()) && b.chars().all(|c| c.is_ascii_alphabetic()) {
        let ca = column_index(&a).ok_or_else(bad)?;
        let cb = column_index(&b).ok_or_else(bad)?;
        if ca != cb {
            return Err(bad());
        }
        return Ok(Expr::Range(RangeRef {
            sheet,
            column: ca,
            rows: None,
        }));
    }

    let start = CellAddr::parse(&a)?;
    let end = CellAddr::parse(&b)?;
    if start.column != end.column || start.row > end.row {
        return Err(bad());
    }
    Ok(Expr::Range(RangeRef {
        sheet,
        column: start.column,
        rows: Some((start.row, end.row)),
    }))
}
