//! Labelled tables produced by the pipeline.

use std::io::Write;
use std::path::Path;

use crate::analysis::AnalysisError;
use crate::project::ProjectError;

/// One table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Flag(bool),
    Missing,
}

impl Value {
    /// NaN maps to [`Value::Missing`].
    pub fn number(v: f64) -> Self {
        if v.is_nan() {
            Self::Missing
        } else {
            Self::Number(v)
        }
    }

    pub fn count(n: usize) -> Self {
        Self::Number(n as f64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    fn to_field(&self) -> String {
        match self {
            Self::Number(v) => v.to_string(),
            Self::Text(s) => s.clone(),
            Self::Flag(b) => b.to_string(),
            Self::Missing => String::new(),
        }
    }
}

/// A named column of cells, one per table row.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Rows labelled by `index`, columns appended left to right.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub index_name: String,
    pub index: Vec<String>,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(index_name: impl Into<String>, index: Vec<String>) -> Self {
        Self {
            index_name: index_name.into(),
            index,
            columns: Vec::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    /// Append a column; it must have exactly one value per row.
    pub fn push_column(&mut self, column: Column) -> Result<(), AnalysisError> {
        if column.values.len() != self.n_rows() {
            return Err(AnalysisError::shape(
                format!("column {}", column.name),
                self.n_rows(),
                column.values.len(),
            ));
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Cell at (`row label`, `column name`).
    pub fn get(&self, row: &str, column: &str) -> Option<&Value> {
        let r = self.index.iter().position(|id| id == row)?;
        self.column(column)?.values.get(r)
    }

    /// CSV with a header row; missing cells are empty fields.
    pub fn write_csv_to<W: Write>(&self, writer: W) -> Result<(), ProjectError> {
        let mut w = csv::Writer::from_writer(writer);
        let header = std::iter::once(self.index_name.as_str())
            .chain(self.columns.iter().map(|c| c.name.as_str()));
        w.write_record(header)?;
        for (r, label) in self.index.iter().enumerate() {
            let mut record = Vec::with_capacity(self.columns.len() + 1);
            record.push(label.clone());
            record.extend(self.columns.iter().map(|c| c.values[r].to_field()));
            w.write_record(&record)?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), ProjectError> {
        self.write_csv_to(std::fs::File::create(path)?)?;
        tracing::debug!(
            path = %path.display(),
            rows = self.n_rows(),
            columns = self.columns.len(),
            "table written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_column_checks_length() {
        let mut t = Table::new("stack", vec!["1".into(), "2".into()]);
        t.push_column(Column::new("n", vec![Value::count(3), Value::number(f64::NAN)]))
            .unwrap();
        let err = t
            .push_column(Column::new("bad", vec![Value::Missing]))
            .expect_err("short column");
        assert_eq!(err, AnalysisError::shape("column bad", 2, 1));
        assert!(t.get("2", "n").unwrap().is_missing());
        assert_eq!(t.get("1", "n").and_then(Value::as_f64), Some(3.0));
    }

    #[test]
    fn csv_layout() {
        let mut t = Table::new("branch", vec!["a".into(), "b".into()]);
        t.push_column(Column::new("len_1", vec![Value::number(1.5), Value::Missing]))
            .unwrap();
        t.push_column(Column::new(
            "state_1",
            vec![Value::Text("terminal".into()), Value::Flag(true)],
        ))
        .unwrap();
        let mut buf = Vec::new();
        t.write_csv_to(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "branch,len_1,state_1\na,1.5,terminal\nb,,true\n"
        );
    }
}
