//! Formula expression tree.

use crate::address::{CellRef, RangeRef};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Ref(CellRef),
    Range(RangeRef),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Concat => "&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 1,
            BinaryOp::Concat => 2,
            BinaryOp::Add | BinaryOp::Sub => 3,
            BinaryOp::Mul | BinaryOp::Div => 4,
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 1
    }
}

/// The closed set of functions the compiler emits and the evaluator knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Index,
    Match,
    Min,
    If,
    And,
    Round,
    IsNumber,
    Search,
}

impl Function {
    pub fn name(self) -> &'static str {
        match self {
            Function::Index => "INDEX",
            Function::Match => "MATCH",
            Function::Min => "MIN",
            Function::If => "IF",
            Function::And => "AND",
            Function::Round => "ROUND",
            Function::IsNumber => "ISNUMBER",
            Function::Search => "SEARCH",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        [
            Function::Index,
            Function::Match,
            Function::Min,
            Function::If,
            Function::And,
            Function::Round,
            Function::IsNumber,
            Function::Search,
        ]
        .into_iter()
        .find(|f| f.name() == upper)
    }
}

// ── Constructors ────────────────────────────────────────────────────

impl Expr {
    pub fn num(v: f64) -> Self {
        Expr::Number(v)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Expr::Text(s.into())
    }

    pub fn cell(r: CellRef) -> Self {
        Expr::Ref(r)
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn call(f: Function, args: Vec<Expr>) -> Self {
        Expr::Call(f, args)
    }

    /// `INDEX(values, MATCH(key, keys, 0))`
    pub fn lookup(values: RangeRef, key: Expr, keys: RangeRef) -> Self {
        Expr::call(
            Function::Index,
            vec![
                Expr::Range(values),
                Expr::call(Function::Match, vec![key, Expr::Range(keys), Expr::num(0.0)]),
            ],
        )
    }

    pub fn if_then(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::call(Function::If, vec![cond, then, otherwise])
    }

    pub fn min(a: Expr, b: Expr) -> Self {
        Expr::call(Function::Min, vec![a, b])
    }

    pub fn and(terms: Vec<Expr>) -> Self {
        Expr::call(Function::And, terms)
    }

    pub fn round(value: Expr, digits: u32) -> Self {
        Expr::call(Function::Round, vec![value, Expr::num(digits as f64)])
    }

    pub fn cmp(self, op: BinaryOp, rhs: Expr) -> Self {
        Expr::binary(op, self, rhs)
    }

    pub fn concat(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Concat, self, rhs)
    }

    /// Left-folded sum; `0` for an empty list.
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Self {
        terms
            .into_iter()
            .reduce(|acc, t| acc + t)
            .unwrap_or(Expr::Number(0.0))
    }

    /// Every cell reference in the tree, depth-first.
    pub fn references(&self) -> Vec<&CellRef> {
        let mut out = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Ref(r) = e {
                out.push(r);
            }
        });
        out
    }

    pub fn functions(&self) -> Vec<Function> {
        let mut out = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Call(f, _) = e {
                out.push(*f);
            }
        });
        out
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Neg(inner) => inner.walk(visit),
            Expr::Binary(_, l, r) => {
                l.walk(visit);
                r.walk(visit);
            }
            Expr::Call(_, args) => args.iter().for_each(|a| a.walk(visit)),
            _ => {}
        }
    }
}

macro_rules! arith {
    ($trait:ident, $method:ident, $op:expr) => {
        impl std::ops::$trait for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, self, rhs)
            }
        }
    };
}

arith!(Add, add, BinaryOp::Add);
arith!(Sub, sub, BinaryOp::Sub);
arith!(Mul, mul, BinaryOp::Mul);
arith!(Div, div, BinaryOp::Div);
