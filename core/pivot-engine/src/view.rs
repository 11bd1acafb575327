//! FILENAME: core/pivot-engine/src/view.rs
//! Pivot Matrix - Renderable cross-tab grid.
//!
//! Turns a `QueryResult` into header rows, body rows and a grand-total
//! footer, ready to be written out as a table by any frontend:
//! - one header row per column field, starting with the field caption and
//!   followed by the column headers of that level
//! - a values row naming the aggregates, when there is more than one
//!   aggregate or no column axis
//! - body rows in pre-order over the totals tree
//! - a footer row for the totals root

use pivot_values::ScalarValue;
use serde::{Deserialize, Serialize};

use crate::crosstab::CrossTabAssembler;
use crate::definition::Aggregate;
use crate::error::IntegrityError;
use crate::logging::log_debug;
use crate::query::QueryResult;
use crate::tree::{NodeRef, NodeValues};

// ============================================================================
// OPTIONS
// ============================================================================

/// Captions used by the matrix. Missing entries take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixOptions {
    pub column_total_caption: String,
    pub values_caption: String,
    pub row_total_caption: String,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        MatrixOptions {
            column_total_caption: "Total".to_string(),
            values_caption: "Values".to_string(),
            row_total_caption: "Total".to_string(),
        }
    }
}

// ============================================================================
// CELLS AND ROWS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixCellType {
    /// Caption of a column field, first cell of its header row.
    FieldCaption,
    /// A column group.
    ColumnHeader,
    /// The column-total header spanning every header row.
    ColumnTotal,
    /// First cell of the values row.
    ValuesCaption,
    /// Caption of an aggregate in the values row.
    AggregateCaption,
    /// Caption of a body or footer row.
    RowHeader,
    /// An aggregate value.
    Data,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub text: String,
    pub cell_type: MatrixCellType,
    /// Nesting level of a row header.
    pub indent_level: u8,
    pub row_span: u16,
    pub col_span: u16,
}

impl MatrixCell {
    fn new(text: impl Into<String>, cell_type: MatrixCellType) -> Self {
        MatrixCell {
            text: text.into(),
            cell_type,
            indent_level: 0,
            row_span: 1,
            col_span: 1,
        }
    }

    pub fn header(text: impl Into<String>, cell_type: MatrixCellType) -> Self {
        Self::new(text, cell_type)
    }

    pub fn row_header(text: impl Into<String>, indent: u8) -> Self {
        MatrixCell {
            indent_level: indent,
            ..Self::new(text, MatrixCellType::RowHeader)
        }
    }

    /// A data cell. Missing and null values render empty.
    pub fn data(value: Option<&ScalarValue>) -> Self {
        let text = value.map(|v| v.display_value()).unwrap_or_default();
        Self::new(text, MatrixCellType::Data)
    }

    pub fn with_spans(mut self, col_span: usize, row_span: usize) -> Self {
        self.col_span = span(col_span);
        self.row_span = span(row_span);
        self
    }
}

fn span(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixRowType {
    Header,
    Data,
    Subtotal,
    GrandTotal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub row_type: MatrixRowType,
    /// Captions of the totals node this row shows. Empty for headers and the footer.
    pub path: Vec<String>,
    pub cells: Vec<MatrixCell>,
}

impl MatrixRow {
    fn header() -> Self {
        MatrixRow {
            row_type: MatrixRowType::Header,
            path: Vec::new(),
            cells: Vec::new(),
        }
    }

    pub fn texts(&self) -> Vec<&str> {
        self.cells.iter().map(|c| c.text.as_str()).collect()
    }
}

/// The complete grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotMatrix {
    pub header_rows: Vec<MatrixRow>,
    pub body: Vec<MatrixRow>,
    pub footer: MatrixRow,
}

impl PivotMatrix {
    /// Every row, headers first and footer last.
    pub fn rows(&self) -> impl Iterator<Item = &MatrixRow> + '_ {
        self.header_rows
            .iter()
            .chain(self.body.iter())
            .chain(std::iter::once(&self.footer))
    }
}

// ============================================================================
// ASSEMBLY
// ============================================================================

pub fn build_matrix(result: &QueryResult, options: &MatrixOptions) -> Result<PivotMatrix, IntegrityError> {
    Ok(MatrixBuilder::new(result, options)?.build())
}

struct MatrixBuilder<'a> {
    result: &'a QueryResult,
    options: &'a MatrixOptions,
    assembler: CrossTabAssembler<'a>,
    column_leaves: Vec<Vec<String>>,
}

impl<'a> MatrixBuilder<'a> {
    fn new(result: &'a QueryResult, options: &'a MatrixOptions) -> Result<Self, IntegrityError> {
        let assembler = CrossTabAssembler::new(result)?;
        let column_leaves = assembler
            .column_leaves()
            .into_iter()
            .map(|path| path.into_vec())
            .collect();
        Ok(MatrixBuilder {
            result,
            options,
            assembler,
            column_leaves,
        })
    }

    fn aggregates(&self) -> &'a [Aggregate] {
        self.result.aggregates()
    }

    fn build(&self) -> PivotMatrix {
        let header_rows = self.header_rows();

        let totals = self.result.totals().root();
        let footer = self.row(totals, &self.options.row_total_caption, MatrixRowType::GrandTotal);

        let mut body = Vec::new();
        for child in totals.children() {
            self.add_rows(&mut body, child);
        }

        log_debug!(
            "VIEW",
            "matrix: {} header rows, {} body rows, {} column leaves",
            header_rows.len(),
            body.len(),
            self.column_leaves.len()
        );

        PivotMatrix {
            header_rows,
            body,
            footer,
        }
    }

    fn header_rows(&self) -> Vec<MatrixRow> {
        let values_count = self.aggregates().len();
        let mut rows = Vec::new();

        if self.assembler.has_columns() {
            for column in self.result.columns() {
                let mut row = MatrixRow::header();
                row.cells.push(MatrixCell::header(column.caption.clone(), MatrixCellType::FieldCaption));
                rows.push(row);
            }
            for item in self.assembler.column_root().children() {
                add_column_header(&mut rows, item, 0, values_count);
            }
            let depth = rows.len();
            if let Some(first) = rows.first_mut() {
                first.cells.push(
                    MatrixCell::header(self.options.column_total_caption.clone(), MatrixCellType::ColumnTotal)
                        .with_spans(values_count.max(1), depth),
                );
            }
        }

        if values_count > 1 || self.result.columns().is_empty() {
            let mut row = MatrixRow::header();
            row.cells.push(MatrixCell::header(self.options.values_caption.clone(), MatrixCellType::ValuesCaption));
            for _ in 0..=self.column_leaves.len() {
                row.cells.extend(
                    self.aggregates()
                        .iter()
                        .map(|a| MatrixCell::header(a.caption(), MatrixCellType::AggregateCaption)),
                );
            }
            rows.push(row);
        }

        rows
    }

    /// Pre-order: the node's row, then the rows of its children.
    fn add_rows(&self, body: &mut Vec<MatrixRow>, node: NodeRef<'_>) {
        let row_type = if node.has_children() {
            MatrixRowType::Subtotal
        } else {
            MatrixRowType::Data
        };
        body.push(self.row(node, node.caption(), row_type));
        for child in node.children() {
            self.add_rows(body, child);
        }
    }

    fn row(&self, node: NodeRef<'_>, caption: &str, row_type: MatrixRowType) -> MatrixRow {
        let indent = node.current_depth().saturating_sub(1);
        let row_path = node.path();
        let mut cells = vec![MatrixCell::row_header(caption, indent.min(u8::MAX as usize) as u8)];

        for column_path in &self.column_leaves {
            let values = self.assembler.lookup(column_path.as_slice(), row_path.as_slice());
            self.push_values(&mut cells, values);
        }
        self.push_values(&mut cells, node.values());

        MatrixRow {
            row_type,
            path: row_path.into_vec(),
            cells,
        }
    }

    fn push_values(&self, cells: &mut Vec<MatrixCell>, values: Option<&NodeValues>) {
        cells.extend(
            self.aggregates()
                .iter()
                .map(|a| MatrixCell::data(values.and_then(|v| v.get(a.output_key())))),
        );
    }
}

/// Column headers of `item` go into header row `level`, children one row down.
fn add_column_header(rows: &mut [MatrixRow], item: NodeRef<'_>, level: usize, values_count: usize) {
    let Some(row) = rows.get_mut(level) else {
        return;
    };
    let col_span = (item.horizontal_depth(None) * values_count).max(1);
    row.cells
        .push(MatrixCell::header(item.caption(), MatrixCellType::ColumnHeader).with_spans(col_span, 1));
    for child in item.children() {
        add_column_header(rows, child, level + 1, values_count);
    }
}
