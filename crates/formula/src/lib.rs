//! Spreadsheet-formula rendition of the scoring engine.
//!
//! The compiler turns a [`vista_core::ScoringConfig`] into expression trees
//! that look every input up from a data sheet keyed by a selector cell. The
//! trees render to A1 formula text, parse back, and evaluate against the
//! in-memory [`Workbook`] model, so a viewer picking a different branch
//! recomputes the same score the native engine reports.

pub mod address;
pub mod compiler;
pub mod error;
pub mod eval;
pub mod export;
pub mod expr;
pub mod layout;
pub mod parse;
pub mod render;
pub mod workbook;

pub use address::{column_letters, CellAddr, CellRef, RangeRef};
pub use compiler::{compile, CompiledFormulas, MetricRow};
pub use error::FormulaError;
pub use eval::{evaluate, ErrorKind, EvalContext, Value};
pub use export::build_workbook;
pub use expr::{BinaryOp, Expr, Function};
pub use layout::LayoutBindings;
pub use parse::parse;
pub use render::render;
pub use workbook::{Cell, CellContent, Literal, ListValidation, Sheet, Workbook};
