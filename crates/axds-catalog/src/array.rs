//! Labeled multidimensional arrays, the "xarray" output of a source.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, ArrayD, IxDyn};
use serde_json::{Map, Value};

use axds_common::{AxdsError, AxdsResult};

use crate::table::{ColumnData, KeyPart, Table};

/// A dimension and its coordinate values.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub coords: ColumnData,
}

impl Dimension {
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

fn text_values(data: &ColumnData) -> Vec<Option<String>> {
    data.as_texts().unwrap_or_else(|| vec![None; data.len()])
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariableData {
    /// Missing values are NaN.
    Float(ArrayD<f64>),
    Text(ArrayD<Option<String>>),
}

impl VariableData {
    pub fn shape(&self) -> &[usize] {
        match self {
            VariableData::Float(a) => a.shape(),
            VariableData::Text(a) => a.shape(),
        }
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            VariableData::Float(_) => "float64",
            VariableData::Text(_) => "object",
        }
    }

    pub fn as_float(&self) -> Option<&ArrayD<f64>> {
        match self {
            VariableData::Float(a) => Some(a),
            VariableData::Text(_) => None,
        }
    }
}

/// A data variable over named dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<String>,
    pub data: VariableData,
}

/// Collection of variables sharing dimensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    dims: Vec<Dimension>,
    variables: Vec<Variable>,
    attrs: Map<String, Value>,
}

impl Dataset {
    /// Convert a table.
    ///
    /// A table with a unique index gets one dimension per index column,
    /// coordinates sorted. Anything else gets a single `index` dimension over
    /// row numbers and every column, index columns included, becomes a
    /// variable along it.
    pub fn from_table(table: &Table) -> AxdsResult<Self> {
        if table.has_unique_index() {
            Self::gridded(table)
        } else {
            Ok(Self::flat(table))
        }
    }

    fn gridded(table: &Table) -> AxdsResult<Self> {
        let keys = table.index_keys();
        let mut dims = Vec::new();
        let mut positions: Vec<BTreeMap<&KeyPart, usize>> = Vec::new();

        for (i, column) in table.index_columns().iter().enumerate() {
            let mut unique: Vec<&KeyPart> = keys.iter().map(|k| &k[i]).collect();
            unique.sort();
            unique.dedup();
            positions.push(unique.iter().enumerate().map(|(p, k)| (*k, p)).collect());
            dims.push(Dimension {
                name: column.name.clone(),
                coords: KeyPart::to_column_data(&unique),
            });
        }

        let shape: Vec<usize> = dims.iter().map(Dimension::len).collect();
        let cells: Vec<Vec<usize>> = keys
            .iter()
            .map(|key| {
                key.iter()
                    .zip(&positions)
                    .map(|(part, lookup)| lookup.get(part).copied())
                    .collect::<Option<Vec<usize>>>()
                    .ok_or_else(|| AxdsError::Internal("index key without coordinate".to_string()))
            })
            .collect::<AxdsResult<_>>()?;

        let dim_names: Vec<String> = dims.iter().map(|d| d.name.clone()).collect();
        let variables = table
            .columns()
            .into_iter()
            .map(|column| {
                let data = match column.data.as_floats() {
                    Some(values) => {
                        let mut array = ArrayD::from_elem(IxDyn(&shape), f64::NAN);
                        for (cell, value) in cells.iter().zip(values) {
                            if let Some(v) = value {
                                array[IxDyn(cell)] = v;
                            }
                        }
                        VariableData::Float(array)
                    }
                    None => {
                        let mut array = ArrayD::from_elem(IxDyn(&shape), None);
                        for (cell, value) in cells.iter().zip(text_values(&column.data)) {
                            array[IxDyn(cell)] = value;
                        }
                        VariableData::Text(array)
                    }
                };
                Variable {
                    name: column.name.clone(),
                    dims: dim_names.clone(),
                    data,
                }
            })
            .collect();

        Ok(Self {
            dims,
            variables,
            attrs: Map::new(),
        })
    }

    fn flat(table: &Table) -> Self {
        let rows = table.num_rows();
        let dim = Dimension {
            name: "index".to_string(),
            coords: ColumnData::floats((0..rows).map(|r| Some(r as f64)).collect()),
        };

        let variables = table
            .index_columns()
            .into_iter()
            .chain(table.columns())
            .map(|column| {
                let data = match column.data.as_floats() {
                    Some(values) => VariableData::Float(
                        Array1::from_iter(values.into_iter().map(|v| v.unwrap_or(f64::NAN)))
                            .into_dyn(),
                    ),
                    None => {
                        VariableData::Text(Array1::from_vec(text_values(&column.data)).into_dyn())
                    }
                };
                Variable {
                    name: column.name.clone(),
                    dims: vec![dim.name.clone()],
                    data,
                }
            })
            .collect();

        Self {
            dims: vec![dim],
            variables,
            attrs: Map::new(),
        }
    }

    pub fn with_attrs(mut self, attrs: Map<String, Value>) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn dim(&self, name: &str) -> Option<&Dimension> {
        self.dims.iter().find(|d| d.name == name)
    }

    /// Dimension sizes in order, like `Dataset.sizes`.
    pub fn sizes(&self) -> Vec<(&str, usize)> {
        self.dims.iter().map(|d| (d.name.as_str(), d.len())).collect()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn data_var_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .dims
            .iter()
            .map(|d| d.name.len())
            .chain(self.variables.iter().map(|v| v.name.len()))
            .max()
            .unwrap_or(0);

        writeln!(f, "<Dataset>")?;
        let sizes: Vec<String> = self
            .sizes()
            .iter()
            .map(|(name, len)| format!("{}: {}", name, len))
            .collect();
        writeln!(f, "Dimensions:  ({})", sizes.join(", "))?;

        writeln!(f, "Coordinates:")?;
        for dim in &self.dims {
            writeln!(
                f,
                "  * {:width$}  ({}) {}",
                dim.name,
                dim.name,
                dim.coords.dtype(),
                width = width
            )?;
        }

        writeln!(f, "Data variables:")?;
        for var in &self.variables {
            writeln!(
                f,
                "    {:width$}  ({}) {}",
                var.name,
                var.dims.join(", "),
                var.data.dtype(),
                width = width
            )?;
        }

        if !self.attrs.is_empty() {
            writeln!(f, "Attributes:")?;
            for (key, value) in &self.attrs {
                match value {
                    Value::String(s) => writeln!(f, "    {}: {}", key, s)?,
                    other => writeln!(f, "    {}: {}", key, other)?,
                }
            }
        }
        Ok(())
    }
}
