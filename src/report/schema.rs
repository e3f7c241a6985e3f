//! Table schema profiling for the exploratory report

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::dataset::DataError;

/// Inferred kind of a raw table column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    /// Integer-valued with every non-missing value distinct
    Identifier,
    Integer,
    Numeric,
    Categorical,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Identifier => "identifier",
            ColumnKind::Integer => "integer",
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
        }
    }
}

/// Profile of one column of a raw CSV table
#[derive(Debug, Clone, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,

    /// Rows in the table
    pub rows: usize,

    /// Empty or NA cells
    pub missing: usize,

    /// Distinct non-missing values
    pub distinct: usize,

    /// Smallest value for numeric columns
    pub min: Option<f64>,

    /// Largest value for numeric columns
    pub max: Option<f64>,
}

/// Profile every column of a CSV file
pub fn profile_file<P: AsRef<Path>>(path: P) -> Result<Vec<ColumnProfile>, DataError> {
    let file = File::open(path)?;
    profile(file)
}

/// Profile every column of a CSV table.
///
/// A cell is missing when empty or literal `NA`. A column is integer when
/// every present value parses as an integer (float-formatted integrals
/// like `2.0` count), numeric when every present value parses as a float,
/// and categorical otherwise. An integer column whose values are all
/// distinct is reported as an identifier.
pub fn profile<R: Read>(reader: R) -> Result<Vec<ColumnProfile>, DataError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let columns = headers.len();
    let mut rows = 0usize;
    let mut missing = vec![0usize; columns];
    let mut distinct: Vec<HashSet<String>> = vec![HashSet::new(); columns];
    let mut all_integer = vec![true; columns];
    let mut all_numeric = vec![true; columns];
    let mut min = vec![f64::INFINITY; columns];
    let mut max = vec![f64::NEG_INFINITY; columns];

    for record in csv_reader.records() {
        let record = record?;
        rows += 1;
        for position in 0..columns {
            let cell = record.get(position).unwrap_or("").trim();
            if cell.is_empty() || cell == "NA" {
                missing[position] += 1;
                continue;
            }
            distinct[position].insert(cell.to_string());
            match cell.parse::<f64>() {
                Ok(value) => {
                    if value.fract() != 0.0 {
                        all_integer[position] = false;
                    }
                    min[position] = min[position].min(value);
                    max[position] = max[position].max(value);
                }
                Err(_) => {
                    all_integer[position] = false;
                    all_numeric[position] = false;
                }
            }
        }
    }

    let profiles = headers
        .into_iter()
        .enumerate()
        .map(|(position, name)| {
            let present = rows - missing[position];
            let kind = if present == 0 {
                ColumnKind::Categorical
            } else if all_integer[position] && distinct[position].len() == present {
                ColumnKind::Identifier
            } else if all_integer[position] {
                ColumnKind::Integer
            } else if all_numeric[position] {
                ColumnKind::Numeric
            } else {
                ColumnKind::Categorical
            };

            let numeric = matches!(
                kind,
                ColumnKind::Identifier | ColumnKind::Integer | ColumnKind::Numeric
            ) && present > 0;

            ColumnProfile {
                name,
                kind,
                rows,
                missing: missing[position],
                distinct: distinct[position].len(),
                min: numeric.then_some(min[position]),
                max: numeric.then_some(max[position]),
            }
        })
        .collect();
    Ok(profiles)
}
