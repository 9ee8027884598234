//! Direct evaluation of expression trees against a grid of cells.
//!
//! Semantics follow common spreadsheet behaviour for the supported
//! functions: errors propagate left to right, text comparison ignores case,
//! `MATCH` with type 0 is an exact first-hit search and whole-column ranges
//! count rows from 1.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::{CellAddr, RangeRef};
use crate::expr::{BinaryOp, Expr, Function};
use crate::render::format_number;

/// Nested formula references deeper than this are treated as a cycle.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "#N/A")]
    NotAvailable,
    #[serde(rename = "#VALUE!")]
    Value,
    #[serde(rename = "#DIV/0!")]
    DivZero,
    #[serde(rename = "#REF!")]
    Ref,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::NotAvailable => "#N/A",
            ErrorKind::Value => "#VALUE!",
            ErrorKind::DivZero => "#DIV/0!",
            ErrorKind::Ref => "#REF!",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Blank,
    Error(ErrorKind),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Value::Blank => Ok(()),
            Value::Error(e) => write!(f, "{e}"),
        }
    }
}

/// Cell storage the evaluator reads from.
pub trait EvalContext {
    /// Value of a cell, evaluating any formula it holds. `depth` is the
    /// current nesting and must be forwarded to [`eval_at`].
    fn cell(&self, sheet: &str, addr: CellAddr, depth: usize) -> Value;

    /// Last used row of a sheet; bounds whole-column scans.
    fn last_row(&self, sheet: &str) -> u32;
}

/// Evaluate `expr` with unqualified references resolving to `sheet`.
pub fn evaluate(expr: &Expr, ctx: &dyn EvalContext, sheet: &str) -> Value {
    eval_at(expr, ctx, sheet, 0)
}

pub fn eval_at(expr: &Expr, ctx: &dyn EvalContext, sheet: &str, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::Error(ErrorKind::Ref);
    }
    let ev = Evaluator { ctx, sheet, depth };
    ev.eval(expr)
}

struct Evaluator<'a> {
    ctx: &'a dyn EvalContext,
    sheet: &'a str,
    depth: usize,
}

macro_rules! tri {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(kind) => return Value::Error(kind),
        }
    };
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr) -> Value {
        match expr {
            Expr::Number(n) => Value::Number(*n),
            Expr::Text(s) => Value::Text(s.clone()),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Ref(r) => {
                let sheet = r.sheet.as_deref().unwrap_or(self.sheet);
                self.ctx.cell(sheet, r.addr, self.depth + 1)
            }
            // A bare range only has meaning as a function argument.
            Expr::Range(_) => Value::Error(ErrorKind::Value),
            Expr::Neg(inner) => {
                let v = tri!(to_number(&self.eval(inner)));
                Value::Number(-v)
            }
            Expr::Binary(op, lhs, rhs) => self.binary(*op, lhs, rhs),
            Expr::Call(f, args) => self.call(*f, args),
        }
    }

    fn binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Value {
        let l = self.eval(lhs);
        if let Value::Error(e) = l {
            return Value::Error(e);
        }
        let r = self.eval(rhs);
        if let Value::Error(e) = r {
            return Value::Error(e);
        }

        match op {
            BinaryOp::Concat => Value::Text(format!("{}{}", to_text(&l), to_text(&r))),
            op if op.is_comparison() => {
                let ord = compare(&l, &r);
                Value::Bool(match op {
                    BinaryOp::Eq => ord == Ordering::Equal,
                    BinaryOp::Ne => ord != Ordering::Equal,
                    BinaryOp::Lt => ord == Ordering::Less,
                    BinaryOp::Le => ord != Ordering::Greater,
                    BinaryOp::Gt => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                })
            }
            _ => {
                let a = tri!(to_number(&l));
                let b = tri!(to_number(&r));
                match op {
                    BinaryOp::Add => Value::Number(a + b),
                    BinaryOp::Sub => Value::Number(a - b),
                    BinaryOp::Mul => Value::Number(a * b),
                    _ if b == 0.0 => Value::Error(ErrorKind::DivZero),
                    _ => Value::Number(a / b),
                }
            }
        }
    }

    fn call(&self, f: Function, args: &[Expr]) -> Value {
        match f {
            Function::If => {
                let Some(cond) = args.first() else {
                    return Value::Error(ErrorKind::Value);
                };
                let truthy = tri!(to_bool(&self.eval(cond)));
                let branch = if truthy { args.get(1) } else { args.get(2) };
                match branch {
                    Some(e) => self.eval(e),
                    None => Value::Bool(false),
                }
            }
            Function::And => {
                if args.is_empty() {
                    return Value::Error(ErrorKind::Value);
                }
                let mut all = true;
                for a in args {
                    all &= tri!(to_bool(&self.eval(a)));
                }
                Value::Bool(all)
            }
            Function::Min => {
                let mut best: Option<f64> = None;
                for a in args {
                    let nums: Vec<f64> = match a {
                        Expr::Range(r) => self
                            .range_values(r)
                            .into_iter()
                            .filter_map(|v| v.as_number())
                            .collect(),
                        other => vec![tri!(to_number(&self.eval(other)))],
                    };
                    for n in nums {
                        best = Some(best.map_or(n, |b| b.min(n)));
                    }
                }
                Value::Number(best.unwrap_or(0.0))
            }
            Function::Round => {
                let (Some(x), digits) = (args.first(), args.get(1)) else {
                    return Value::Error(ErrorKind::Value);
                };
                let x = tri!(to_number(&self.eval(x)));
                let d = match digits {
                    Some(d) => tri!(to_number(&self.eval(d))).trunc() as i32,
                    None => 0,
                };
                let factor = 10f64.powi(d);
                Value::Number((x * factor).round() / factor)
            }
            Function::IsNumber => match args.first() {
                Some(a) => Value::Bool(matches!(self.eval(a), Value::Number(_))),
                None => Value::Error(ErrorKind::Value),
            },
            Function::Search => {
                let (Some(find), Some(within)) = (args.first(), args.get(1)) else {
                    return Value::Error(ErrorKind::Value);
                };
                let find = self.eval(find);
                if let Value::Error(e) = find {
                    return Value::Error(e);
                }
                let within = self.eval(within);
                if let Value::Error(e) = within {
                    return Value::Error(e);
                }
                search(&to_text(&find), &to_text(&within))
            }
            Function::Match => self.match_exact(args),
            Function::Index => self.index(args),
        }
    }

    fn match_exact(&self, args: &[Expr]) -> Value {
        let (Some(key), Some(Expr::Range(range))) = (args.first(), args.get(1)) else {
            return Value::Error(ErrorKind::Value);
        };
        if let Some(kind) = args.get(2) {
            let k = tri!(to_number(&self.eval(kind)));
            if k != 0.0 {
                // Only exact matching is supported.
                return Value::Error(ErrorKind::NotAvailable);
            }
        }
        let key = self.eval(key);
        match key {
            Value::Error(e) => return Value::Error(e),
            Value::Blank => return Value::Error(ErrorKind::NotAvailable),
            _ => {}
        }
        self.range_values(range)
            .iter()
            .position(|v| exact_eq(&key, v))
            .map(|i| Value::Number((i + 1) as f64))
            .unwrap_or(Value::Error(ErrorKind::NotAvailable))
    }

    fn index(&self, args: &[Expr]) -> Value {
        let (Some(Expr::Range(range)), Some(pos)) = (args.first(), args.get(1)) else {
            return Value::Error(ErrorKind::Value);
        };
        let n = tri!(to_number(&self.eval(pos))).trunc();
        if n.is_nan() || n < 1.0 {
            return Value::Error(ErrorKind::Value);
        }
        let Some(row) = u32::try_from(n as u64)
            .ok()
            .and_then(|n| range.first_row().checked_add(n - 1))
        else {
            return Value::Error(ErrorKind::Ref);
        };
        if let Some((_, last)) = range.rows {
            if row > last {
                return Value::Error(ErrorKind::Ref);
            }
        }
        let sheet = range.sheet.as_deref().unwrap_or(self.sheet);
        self.ctx.cell(sheet, CellAddr::new(range.column, row), self.depth + 1)
    }

    fn range_values(&self, range: &RangeRef) -> Vec<Value> {
        let sheet = range.sheet.as_deref().unwrap_or(self.sheet);
        let (first, last) = range.rows.unwrap_or((1, self.ctx.last_row(sheet)));
        (first..=last)
            .map(|row| self.ctx.cell(sheet, CellAddr::new(range.column, row), self.depth + 1))
            .collect()
    }
}

// ── Coercions ───────────────────────────────────────────────────────

fn to_number(v: &Value) -> Result<f64, ErrorKind> {
    match v {
        Value::Number(n) => Ok(*n),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Blank => Ok(0.0),
        Value::Text(s) => s.trim().parse().map_err(|_| ErrorKind::Value),
        Value::Error(e) => Err(*e),
    }
}

fn to_bool(v: &Value) -> Result<bool, ErrorKind> {
    match v {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0),
        Value::Blank => Ok(false),
        Value::Text(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
        Value::Text(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
        Value::Text(_) => Err(ErrorKind::Value),
        Value::Error(e) => Err(*e),
    }
}

fn to_text(v: &Value) -> String {
    v.to_string()
}

/// Numbers sort before text, text before booleans. Blank takes the type of
/// the other side.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Blank, Value::Blank) => Ordering::Equal,
        (Value::Blank, Value::Number(_)) => compare(&Value::Number(0.0), b),
        (Value::Number(_), Value::Blank) => compare(a, &Value::Number(0.0)),
        (Value::Blank, Value::Text(_)) => compare(&Value::Text(String::new()), b),
        (Value::Text(_), Value::Blank) => compare(a, &Value::Text(String::new())),
        (Value::Blank, Value::Bool(_)) => compare(&Value::Bool(false), b),
        (Value::Bool(_), Value::Blank) => compare(a, &Value::Bool(false)),
        (Value::Number(x), Value::Number(y)) => x.total_cmp(y),
        (Value::Text(x), Value::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Number(_) | Value::Blank => 0,
        Value::Text(_) => 1,
        Value::Bool(_) => 2,
        Value::Error(_) => 3,
    }
}

fn exact_eq(key: &Value, candidate: &Value) -> bool {
    match (key, candidate) {
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Text(a), Value::Text(b)) => a.to_lowercase() == b.to_lowercase(),
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => false,
    }
}

fn search(find: &str, within: &str) -> Value {
    let find = find.to_lowercase();
    let within = within.to_lowercase();
    match within.find(&find) {
        Some(byte_idx) => Value::Number((within[..byte_idx].chars().count() + 1) as f64),
        None => Value::Error(ErrorKind::Value),
    }
}
