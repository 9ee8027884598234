//! In-memory workbook: sheets of literal and formula cells, list
//! validations, JSON (de)serialization and live recalculation.
//!
//! Formulas are stored as trees and serialized as their rendered A1 text;
//! loading parses the text back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::{CellAddr, RangeRef};
use crate::error::FormulaError;
use crate::eval::{eval_at, evaluate, EvalContext, Value};
use crate::expr::Expr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl From<&Literal> for Value {
    fn from(l: &Literal) -> Self {
        match l {
            Literal::Number(n) => Value::Number(*n),
            Literal::Text(s) => Value::Text(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
        }
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Number(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::Text(v.to_string())
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Literal::Text(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellContent {
    Value(Literal),
    Formula(#[serde(with = "formula_text")] Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(flatten)]
    pub content: CellContent,
    /// Hidden from the viewer (e.g. the raw score cell).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

/// A list-type data validation: the cell offers the values of `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListValidation {
    pub cell: CellAddr,
    #[serde(with = "range_text")]
    pub source: RangeRef,
    pub allow_blank: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
    pub cells: BTreeMap<CellAddr, Cell>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validations: Vec<ListValidation>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hidden: false,
            cells: BTreeMap::new(),
            validations: Vec::new(),
        }
    }

    pub fn set_value(&mut self, addr: CellAddr, value: impl Into<Literal>) {
        self.cells.insert(
            addr,
            Cell {
                content: CellContent::Value(value.into()),
                hidden: false,
            },
        );
    }

    pub fn set_formula(&mut self, addr: CellAddr, expr: Expr) {
        self.cells.insert(
            addr,
            Cell {
                content: CellContent::Formula(expr),
                hidden: false,
            },
        );
    }

    pub fn hide_cell(&mut self, addr: CellAddr) {
        if let Some(cell) = self.cells.get_mut(&addr) {
            cell.hidden = true;
        }
    }

    pub fn get(&self, addr: CellAddr) -> Option<&Cell> {
        self.cells.get(&addr)
    }

    pub fn formula(&self, addr: CellAddr) -> Option<&Expr> {
        match self.cells.get(&addr).map(|c| &c.content) {
            Some(CellContent::Formula(e)) => Some(e),
            _ => None,
        }
    }

    pub fn last_row(&self) -> u32 {
        self.cells.keys().map(|a| a.row).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Current value of a cell, recalculating formulas on demand.
    pub fn value(&self, sheet: &str, addr: CellAddr) -> Value {
        EvalContext::cell(self, sheet, addr, 0)
    }

    /// Evaluate an arbitrary expression as if it sat on `sheet`.
    pub fn evaluate(&self, sheet: &str, expr: &Expr) -> Value {
        evaluate(expr, self, sheet)
    }

    /// Write a literal into an existing sheet, e.g. a new selector choice.
    pub fn set_value(
        &mut self,
        sheet: &str,
        addr: CellAddr,
        value: impl Into<Literal>,
    ) -> Result<(), FormulaError> {
        self.sheet_mut(sheet)
            .ok_or_else(|| FormulaError::SheetNotFound(sheet.to_string()))?
            .set_value(addr, value);
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl EvalContext for Workbook {
    fn cell(&self, sheet: &str, addr: CellAddr, depth: usize) -> Value {
        let Some(s) = self.sheet(sheet) else {
            return Value::Error(crate::eval::ErrorKind::Ref);
        };
        match s.cells.get(&addr).map(|c| &c.content) {
            None => Value::Blank,
            Some(CellContent::Value(l)) => l.into(),
            Some(CellContent::Formula(expr)) => eval_at(expr, self, sheet, depth),
        }
    }

    fn last_row(&self, sheet: &str) -> u32 {
        self.sheet(sheet).map(Sheet::last_row).unwrap_or(0)
    }
}

// ── Text forms ──────────────────────────────────────────────────────

mod formula_text {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::expr::Expr;

    pub fn serialize<S: Serializer>(expr: &Expr, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::render::render(expr))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Expr, D::Error> {
        let text = String::deserialize(deserializer)?;
        crate::parse::parse(&text).map_err(serde::de::Error::custom)
    }
}

mod range_text {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::address::RangeRef;
    use crate::expr::Expr;

    pub fn serialize<S: Serializer>(range: &RangeRef, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::render::render(&Expr::Range(range.clone())))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RangeRef, D::Error> {
        let text = String::deserialize(deserializer)?;
        match crate::parse::parse(&text).map_err(serde::de::Error::custom)? {
            Expr::Range(r) => Ok(r),
            _ => Err(serde::de::Error::custom(format!("not a range: {text}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn book() -> Workbook {
        let mut data = Sheet::new("_Data");
        data.hidden = true;
        data.set_value(CellAddr::new(0, 1), "Name");
        data.set_value(CellAddr::new(1, 1), "Score");
        data.set_value(CellAddr::new(0, 2), "Alpha");
        data.set_value(CellAddr::new(1, 2), 10.0);
        data.set_value(CellAddr::new(0, 3), "Beta");
        data.set_value(CellAddr::new(1, 3), 20.0);

        let mut dash = Sheet::new("Dashboard");
        dash.set_value(CellAddr::new(1, 3), "Beta");
        dash.set_formula(
            CellAddr::new(1, 5),
            parse("=INDEX(_Data!$B:$B,MATCH(B3,_Data!$A:$A,0))").unwrap(),
        );
        dash.set_formula(CellAddr::new(2, 5), parse("=B5*2").unwrap());
        dash.hide_cell(CellAddr::new(2, 5));

        Workbook {
            sheets: vec![dash, data],
        }
    }

    #[test]
    fn recalculates_when_selector_changes() {
        let mut wb = book();
        assert_eq!(wb.value("Dashboard", CellAddr::new(2, 5)), Value::Number(40.0));
        wb.set_value("Dashboard", CellAddr::new(1, 3), "alpha").unwrap();
        assert_eq!(wb.value("Dashboard", CellAddr::new(2, 5)), Value::Number(20.0));
        assert!(wb.set_value("Nope", CellAddr::new(0, 1), 1.0).is_err());
    }

    #[test]
    fn self_reference_is_an_error_not_a_hang() {
        let mut wb = book();
        let dash = wb.sheet_mut("Dashboard").unwrap();
        dash.set_formula(CellAddr::new(3, 1), parse("=D1+1").unwrap());
        assert!(wb.value("Dashboard", CellAddr::new(3, 1)).is_error());
    }

    #[test]
    fn json_keeps_formulas_as_text() {
        let wb = book();
        let json = wb.to_json().unwrap();
        assert!(json.contains(r#""formula": "=B5*2""#));
        assert!(json.contains(r#""hidden": true"#));
        let back = Workbook::from_json(&json).unwrap();
        assert_eq!(back, wb);
    }

    #[test]
    fn validation_source_round_trips() {
        let v = ListValidation {
            cell: CellAddr::new(1, 3),
            source: RangeRef::bounded("_Data", 13, 2, 9),
            allow_blank: false,
        };
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"cell":"B3","source":"=_Data!$N$2:$N$9","allow_blank":false}"#);
        let back: ListValidation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
