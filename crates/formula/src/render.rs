//! Expression tree to A1 formula text.

use crate::address::{column_letters, CellRef, RangeRef};
use crate::expr::{Expr, Function};

/// Render with the leading `=`.
pub fn render(expr: &Expr) -> String {
    let mut out = String::from("=");
    write_expr(&mut out, expr);
    out
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Number(v) => out.push_str(&format_number(*v)),
        Expr::Text(s) => {
            out.push('"');
            out.push_str(&s.replace('"', "\"\""));
            out.push('"');
        }
        Expr::Bool(b) => out.push_str(if *b { "TRUE" } else { "FALSE" }),
        Expr::Ref(r) => write_cell_ref(out, r),
        Expr::Range(r) => write_range_ref(out, r),
        Expr::Neg(inner) => {
            out.push('-');
            write_operand(out, inner, matches!(**inner, Expr::Binary(..)));
        }
        Expr::Binary(op, lhs, rhs) => {
            let prec = op.precedence();
            write_operand(out, lhs, binary_precedence(lhs).is_some_and(|p| p < prec));
            out.push_str(op.symbol());
            write_operand(out, rhs, binary_precedence(rhs).is_some_and(|p| p <= prec));
        }
        Expr::Call(f, args) => {
            out.push_str(f.name());
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_expr(out, arg);
            }
            out.push(')');
        }
    }
}

fn binary_precedence(expr: &Expr) -> Option<u8> {
    match expr {
        Expr::Binary(op, _, _) => Some(op.precedence()),
        _ => None,
    }
}

fn write_operand(out: &mut String, expr: &Expr, parens: bool) {
    if parens {
        out.push('(');
        write_expr(out, expr);
        out.push(')');
    } else {
        write_expr(out, expr);
    }
}

/// Shortest text that parses back to the same `f64`.
pub fn format_number(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

pub fn sheet_prefix(sheet: &str) -> String {
    let plain = !sheet.is_empty()
        && !sheet.starts_with(|c: char| c.is_ascii_digit())
        && sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        format!("{sheet}!")
    } else {
        format!("'{}'!", sheet.replace('\'', "''"))
    }
}

fn write_cell_ref(out: &mut String, r: &CellRef) {
    if let Some(sheet) = &r.sheet {
        out.push_str(&sheet_prefix(sheet));
    }
    let dollar = if r.absolute { "$" } else { "" };
    out.push_str(dollar);
    out.push_str(&column_letters(r.addr.column));
    out.push_str(dollar);
    out.push_str(&r.addr.row.to_string());
}

fn write_range_ref(out: &mut String, r: &RangeRef) {
    if let Some(sheet) = &r.sheet {
        out.push_str(&sheet_prefix(sheet));
    }
    let col = column_letters(r.column);
    match r.rows {
        Some((first, last)) => out.push_str(&format!("${col}${first}:${col}${last}")),
        None => out.push_str(&format!("${col}:${col}")),
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&render(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::CellAddr;
    use crate::expr::BinaryOp;

    fn b3() -> Expr {
        Expr::cell(CellRef::local(CellAddr::new(1, 3)))
    }

    #[test]
    fn renders_lookup() {
        let e = Expr::lookup(
            RangeRef::whole_column("_Data", 3),
            b3(),
            RangeRef::whole_column("_Data", 1),
        );
        assert_eq!(render(&e), "=INDEX(_Data!$D:$D,MATCH(B3,_Data!$B:$B,0))");
    }

    #[test]
    fn renders_search_assist() {
        let sel = Expr::cell(CellRef::on("Dashboard", CellAddr::new(1, 3)));
        let key = Expr::cell(CellRef::local(CellAddr::new(1, 2)));
        let e = Expr::if_then(
            Expr::call(
                Function::IsNumber,
                vec![Expr::call(Function::Search, vec![sel, key.clone()])],
            ),
            key,
            Expr::text(""),
        );
        assert_eq!(render(&e), r#"=IF(ISNUMBER(SEARCH(Dashboard!$B$3,B2)),B2,"")"#);
    }

    #[test]
    fn inserts_parentheses_only_where_needed() {
        let e = (Expr::num(1.0) + Expr::num(2.0)) * Expr::num(3.0);
        assert_eq!(render(&e), "=(1+2)*3");
        let e = Expr::num(1.0) + Expr::num(2.0) * Expr::num(3.0);
        assert_eq!(render(&e), "=1+2*3");
        let e = Expr::num(8.0) - (Expr::num(2.0) - Expr::num(1.0));
        assert_eq!(render(&e), "=8-(2-1)");
        let e = Expr::num(1.0) / Expr::num(4.0) * Expr::num(25.0);
        assert_eq!(render(&e), "=1/4*25");
    }

    #[test]
    fn quotes_text_and_sheet_names() {
        let e = Expr::text("say \"hi\"").concat(Expr::cell(CellRef::on(
            "All Branches Summary",
            CellAddr::new(0, 1),
        )));
        assert_eq!(render(&e), r#"="say ""hi"""&'All Branches Summary'!$A$1"#);
    }

    #[test]
    fn formats_numbers_compactly() {
        assert_eq!(format_number(25.0), "25");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(render(&Expr::num(3.0).cmp(BinaryOp::Le, Expr::num(6.25))), "=3<=6.25");
    }
}
