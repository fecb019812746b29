//! Two-dimensional labeled table, the "dataframe" output of a source.
//!
//! A table is one Arrow [`RecordBatch`] whose leading columns form the index.
//! Columns are `Float64` or `Utf8`, every cell nullable. Index keys drive
//! joins, sorting and the conversion to multidimensional arrays.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, StringArray, UInt32Array};
use arrow::compute::{
    concat_batches, lexsort_to_indices, nullif, take, take_record_batch, SortColumn,
    SortOptions,
};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use regex::Regex;
use serde_json::Value;

use axds_common::{AxdsError, AxdsResult};

/// Cells read as null from CSV.
const CSV_NULLS: &str = "^(|NaN|nan)$";

fn data_err(context: &str) -> impl Fn(ArrowError) -> AxdsError + '_ {
    move |e| AxdsError::DataRead(format!("{}: {}", context, e))
}

/// Values of one column: a `Float64` or `Utf8` Arrow array.
#[derive(Debug, Clone)]
pub struct ColumnData(ArrayRef);

impl PartialEq for ColumnData {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_ref() == other.0.as_ref()
    }
}

/// A borrowed view of one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Null,
    Float(f64),
    Text(&'a str),
}

impl ColumnData {
    pub fn floats(values: Vec<Option<f64>>) -> Self {
        Self(Arc::new(Float64Array::from(values)))
    }

    pub fn texts(values: Vec<Option<String>>) -> Self {
        Self(Arc::new(StringArray::from(values)))
    }

    /// Infer a column from JSON values: numbers stay numbers when every
    /// non-null value is one.
    pub fn from_json(values: &[Value]) -> Self {
        let all_numeric = values.iter().all(|v| v.is_null() || v.is_number());
        if all_numeric {
            Self::floats(values.iter().map(Value::as_f64).collect())
        } else {
            Self::texts(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Null => None,
                        Value::String(s) => Some(s.clone()),
                        other => Some(other.to_string()),
                    })
                    .collect(),
            )
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// pandas-style dtype name.
    pub fn dtype(&self) -> &'static str {
        match self.0.data_type() {
            DataType::Float64 => "float64",
            _ => "object",
        }
    }

    fn float_array(&self) -> Option<&Float64Array> {
        self.0.as_any().downcast_ref::<Float64Array>()
    }

    fn text_array(&self) -> Option<&StringArray> {
        self.0.as_any().downcast_ref::<StringArray>()
    }

    pub fn cell(&self, row: usize) -> Cell<'_> {
        if row >= self.0.len() || self.0.is_null(row) {
            return Cell::Null;
        }
        match (self.float_array(), self.text_array()) {
            (Some(a), _) => Cell::Float(a.value(row)),
            (None, Some(a)) => Cell::Text(a.value(row)),
            (None, None) => Cell::Null,
        }
    }

    pub fn null_count(&self) -> usize {
        self.0.null_count()
    }

    /// Float values, if this is a float column.
    pub fn as_floats(&self) -> Option<Vec<Option<f64>>> {
        self.float_array().map(|a| a.iter().collect())
    }

    /// Text values, if this is a text column.
    pub fn as_texts(&self) -> Option<Vec<Option<String>>> {
        self.text_array()
            .map(|a| a.iter().map(|v| v.map(str::to_string)).collect())
    }

    /// Gather rows by position; null positions become null cells.
    fn take(&self, rows: &UInt32Array) -> AxdsResult<Self> {
        Ok(Self(take(self.0.as_ref(), rows, None).map_err(data_err("take rows"))?))
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn floats(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(name, ColumnData::floats(values))
    }

    pub fn texts(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self::new(name, ColumnData::texts(values))
    }
}

/// One component of an index key, totally ordered: nulls first, then
/// numbers, then text.
#[derive(Debug, Clone)]
pub enum KeyPart {
    Null,
    Num(f64),
    Text(String),
}

impl KeyPart {
    fn from_cell(cell: Cell<'_>) -> Self {
        match cell {
            Cell::Null => KeyPart::Null,
            Cell::Float(v) => KeyPart::Num(v),
            Cell::Text(s) => KeyPart::Text(s.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            KeyPart::Null => 0,
            KeyPart::Num(_) => 1,
            KeyPart::Text(_) => 2,
        }
    }

    /// Turn a list of key parts back into a column.
    pub fn to_column_data(parts: &[&KeyPart]) -> ColumnData {
        if parts.iter().all(|p| !matches!(p, KeyPart::Text(_))) {
            ColumnData::floats(
                parts
                    .iter()
                    .map(|p| match p {
                        KeyPart::Num(v) => Some(*v),
                        _ => None,
                    })
                    .collect(),
            )
        } else {
            ColumnData::texts(
                parts
                    .iter()
                    .map(|p| match p {
                        KeyPart::Null => None,
                        KeyPart::Num(v) => Some(v.to_string()),
                        KeyPart::Text(s) => Some(s.clone()),
                    })
                    .collect(),
            )
        }
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyPart::Num(a), KeyPart::Num(b)) => a.total_cmp(b),
            (KeyPart::Text(a), KeyPart::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Composite index key of one row.
pub type IndexKey = Vec<KeyPart>;

/// A two-dimensional labeled table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    batch: RecordBatch,
    /// The first `index_len` columns of `batch` are the index.
    index_len: usize,
}

impl Table {
    /// Build a table, checking that lengths agree and names are unique.
    pub fn new(index: Vec<Column>, columns: Vec<Column>) -> AxdsResult<Self> {
        let rows = index
            .first()
            .or_else(|| columns.first())
            .map(|c| c.data.len())
            .unwrap_or(0);

        let mut seen = HashSet::new();
        for column in index.iter().chain(columns.iter()) {
            if column.data.len() != rows {
                return Err(AxdsError::DataRead(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.data.len(),
                    rows
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(AxdsError::DataRead(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }

        let index_len = index.len();
        let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = index
            .into_iter()
            .chain(columns)
            .map(|c| {
                let field = Field::new(c.name, c.data.0.data_type().clone(), true);
                (field, c.data.0)
            })
            .unzip();

        let batch = RecordBatch::try_new_with_options(
            Arc::new(Schema::new(fields)),
            arrays,
            &RecordBatchOptions::new().with_row_count(Some(rows)),
        )
        .map_err(data_err("build table"))?;

        Ok(Self { batch, index_len })
    }

    /// Read a CSV document with a header row.
    ///
    /// Numeric columns become floats, everything else text. Empty cells and
    /// `NaN` are nulls.
    pub fn from_csv(data: &[u8]) -> AxdsResult<Self> {
        let nulls = Regex::new(CSV_NULLS).map_err(|e| AxdsError::Internal(e.to_string()))?;
        let format = Format::default().with_header(true).with_null_regex(nulls);

        let (inferred, _) = format
            .infer_schema(data, None)
            .map_err(data_err("CSV schema"))?;
        let schema: SchemaRef = Arc::new(Schema::new(
            inferred
                .fields()
                .iter()
                .map(|f| {
                    let data_type = match f.data_type() {
                        DataType::Int64 | DataType::Float64 | DataType::Null => DataType::Float64,
                        _ => DataType::Utf8,
                    };
                    Field::new(f.name(), data_type, true)
                })
                .collect::<Vec<_>>(),
        ));

        let reader = ReaderBuilder::new(Arc::clone(&schema))
            .with_format(format)
            .build(data)
            .map_err(data_err("CSV reader"))?;
        let batches = reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(data_err("CSV rows"))?;
        let batch = concat_batches(&schema, &batches).map_err(data_err("CSV rows"))?;

        Ok(Self {
            batch,
            index_len: 0,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Number of non-index columns.
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns() - self.index_len
    }

    /// (rows, non-index columns), like `DataFrame.shape`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows(), self.num_columns())
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
    }

    pub fn index_names(&self) -> Vec<&str> {
        self.names().take(self.index_len).collect()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.names().skip(self.index_len).collect()
    }

    fn column_at(&self, i: usize) -> Column {
        Column::new(
            self.batch.schema_ref().field(i).name().clone(),
            ColumnData(Arc::clone(self.batch.column(i))),
        )
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names().position(|n| n == name)
    }

    pub fn index_columns(&self) -> Vec<Column> {
        (0..self.index_len).map(|i| self.column_at(i)).collect()
    }

    pub fn columns(&self) -> Vec<Column> {
        (self.index_len..self.batch.num_columns())
            .map(|i| self.column_at(i))
            .collect()
    }

    /// Look up a column by name, index columns included.
    pub fn column(&self, name: &str) -> Option<Column> {
        self.position(name).map(|i| self.column_at(i))
    }

    /// Remove a non-index column, returning it.
    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let pos = self.position(name).filter(|&i| i >= self.index_len)?;
        let column = self.column_at(pos);
        self.batch.remove_column(pos);
        Some(column)
    }

    /// Null the cells of `column` in every row where `keep` is false.
    pub fn mask_where(&mut self, column: &str, keep: impl Fn(usize) -> bool) -> AxdsResult<()> {
        let pos = self
            .position(column)
            .filter(|&i| i >= self.index_len)
            .ok_or_else(|| AxdsError::DataRead(format!("no column named '{}'", column)))?;

        let dropped: BooleanArray = (0..self.num_rows()).map(|row| Some(!keep(row))).collect();
        let masked = nullif(self.batch.column(pos).as_ref(), &dropped)
            .map_err(data_err("mask column"))?;

        let mut arrays = self.batch.columns().to_vec();
        arrays[pos] = masked;
        self.batch = RecordBatch::try_new_with_options(
            self.batch.schema(),
            arrays,
            &RecordBatchOptions::new().with_row_count(Some(self.num_rows())),
        )
        .map_err(data_err("mask column"))?;
        Ok(())
    }

    /// Move the named columns into the index, replacing any current index.
    pub fn set_index(self, names: &[&str]) -> AxdsResult<Self> {
        let mut order = Vec::with_capacity(self.batch.num_columns());
        for name in names {
            let pos = self
                .position(name)
                .ok_or_else(|| AxdsError::DataRead(format!("no column named '{}'", name)))?;
            order.push(pos);
        }
        let rest: Vec<usize> = (0..self.batch.num_columns())
            .filter(|i| !order.contains(i))
            .collect();
        order.extend(rest);

        let batch = self.batch.project(&order).map_err(data_err("set index"))?;
        Ok(Self {
            batch,
            index_len: names.len(),
        })
    }

    /// Turn the index back into the leading regular columns.
    pub fn reset_index(self) -> Self {
        Self {
            index_len: 0,
            ..self
        }
    }

    pub fn index_keys(&self) -> Vec<IndexKey> {
        let index = self.index_columns();
        (0..self.num_rows())
            .map(|row| {
                index
                    .iter()
                    .map(|c| KeyPart::from_cell(c.data.cell(row)))
                    .collect()
            })
            .collect()
    }

    /// True when the table has an index and no key repeats.
    pub fn has_unique_index(&self) -> bool {
        if self.index_len == 0 {
            return false;
        }
        let keys = self.index_keys();
        let unique: std::collections::BTreeSet<&IndexKey> = keys.iter().collect();
        unique.len() == keys.len()
    }

    /// Stable sort of rows by index key, nulls first.
    pub fn sort_index(&self) -> AxdsResult<Table> {
        if self.index_len == 0 || self.num_rows() < 2 {
            return Ok(self.clone());
        }

        let options = Some(SortOptions {
            descending: false,
            nulls_first: true,
        });
        // row numbers break ties
        let positions: ArrayRef = Arc::new(UInt32Array::from_iter_values(
            0..self.num_rows() as u32,
        ));
        let sort_columns: Vec<SortColumn> = self.batch.columns()[..self.index_len]
            .iter()
            .chain(std::iter::once(&positions))
            .map(|values| SortColumn {
                values: Arc::clone(values),
                options,
            })
            .collect();

        let order = lexsort_to_indices(&sort_columns, None).map_err(data_err("sort index"))?;
        let batch = take_record_batch(&self.batch, &order).map_err(data_err("sort index"))?;
        Ok(Self {
            batch,
            index_len: self.index_len,
        })
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Self {
            batch: self.batch.slice(0, n.min(self.num_rows())),
            index_len: self.index_len,
        }
    }

    /// Outer join on the index, sorted by key.
    ///
    /// Index columns missing from one side are treated as null in that side's
    /// keys. Repeated keys produce every pairing. Overlapping data column
    /// names are an error.
    pub fn outer_join(&self, other: &Table) -> AxdsResult<Table> {
        if self.index_len == 0 || other.index_len == 0 {
            return Err(AxdsError::DataRead(
                "both tables need an index to be joined".to_string(),
            ));
        }
        let own_columns = self.column_names();
        for name in other.column_names() {
            if own_columns.contains(&name) {
                return Err(AxdsError::DataRead(format!("columns overlap: '{}'", name)));
            }
        }

        let mut names: Vec<String> = self.index_names().iter().map(|s| s.to_string()).collect();
        for name in other.index_names() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }

        let aligned_keys = |table: &Table| -> Vec<IndexKey> {
            let index = table.index_columns();
            (0..table.num_rows())
                .map(|row| {
                    names
                        .iter()
                        .map(|name| {
                            index
                                .iter()
                                .find(|c| &c.name == name)
                                .map(|c| KeyPart::from_cell(c.data.cell(row)))
                                .unwrap_or(KeyPart::Null)
                        })
                        .collect()
                })
                .collect()
        };

        let mut groups: BTreeMap<IndexKey, (Vec<u32>, Vec<u32>)> = BTreeMap::new();
        for (row, key) in aligned_keys(self).into_iter().enumerate() {
            groups.entry(key).or_default().0.push(row as u32);
        }
        for (row, key) in aligned_keys(other).into_iter().enumerate() {
            groups.entry(key).or_default().1.push(row as u32);
        }

        let mut keys: Vec<&IndexKey> = Vec::new();
        let mut left_rows: Vec<Option<u32>> = Vec::new();
        let mut right_rows: Vec<Option<u32>> = Vec::new();
        for (key, (left, right)) in &groups {
            let left: Vec<Option<u32>> = if left.is_empty() {
                vec![None]
            } else {
                left.iter().copied().map(Some).collect()
            };
            let right: Vec<Option<u32>> = if right.is_empty() {
                vec![None]
            } else {
                right.iter().copied().map(Some).collect()
            };
            for l in &left {
                for r in &right {
                    keys.push(key);
                    left_rows.push(*l);
                    right_rows.push(*r);
                }
            }
        }

        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let parts: Vec<&KeyPart> = keys.iter().map(|k| &k[i]).collect();
                Column::new(name.clone(), KeyPart::to_column_data(&parts))
            })
            .collect();

        let left_rows = UInt32Array::from(left_rows);
        let right_rows = UInt32Array::from(right_rows);
        let mut columns = Vec::new();
        for column in self.columns() {
            columns.push(Column::new(column.name, column.data.take(&left_rows)?));
        }
        for column in other.columns() {
            columns.push(Column::new(column.name, column.data.take(&right_rows)?));
        }

        Table::new(index, columns)
    }

    /// Write the table as CSV, index columns first.
    pub fn write_csv<W: Write>(&self, writer: W) -> AxdsResult<()> {
        let mut csv_writer = WriterBuilder::new().with_header(true).build(writer);
        csv_writer
            .write(&self.batch)
            .map_err(data_err("CSV write"))?;
        Ok(())
    }
}
