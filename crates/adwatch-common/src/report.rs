use crate::error::ReportError;
use std::collections::HashMap;

/// A parsed report: machine-name header, field -> column table, and rows.
///
/// The field table always has exactly one entry per header column. Rows are
/// owned copies so later stages can append columns to them.
#[derive(Debug, Clone)]
pub struct ReportData {
    alert_name: String,
    report_type: String,
    header: Vec<String>,
    mapping: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl ReportData {
    pub fn new(
        alert_name: impl Into<String>,
        report_type: impl Into<String>,
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Result<Self, ReportError> {
        let mut mapping = HashMap::with_capacity(header.len());
        for (index, field) in header.iter().enumerate() {
            if mapping.insert(field.clone(), index).is_some() {
                return Err(ReportError::DuplicateField(field.clone()));
            }
        }

        let report = Self {
            alert_name: alert_name.into(),
            report_type: report_type.into(),
            header,
            mapping,
            rows,
        };
        report.check_consistency()?;
        Ok(report)
    }

    pub fn alert_name(&self) -> &str {
        &self.alert_name
    }

    pub fn report_type(&self) -> &str {
        &self.report_type
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn mapping(&self) -> &HashMap<String, usize> {
        &self.mapping
    }

    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.mapping.get(field).copied()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.mapping.contains_key(field)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<ReportRow<'_>> {
        self.rows
            .get(index)
            .map(|values| ReportRow::new(values, &self.mapping))
    }

    pub fn rows(&self) -> impl Iterator<Item = ReportRow<'_>> {
        let mapping = &self.mapping;
        self.rows.iter().map(move |values| ReportRow::new(values, mapping))
    }

    /// Appends a header column and returns its index. A field that already
    /// exists is not duplicated; its current index is returned instead.
    ///
    /// Rows are not touched; callers extend them afterwards.
    pub fn append_field(&mut self, field: &str) -> usize {
        debug_assert_eq!(self.mapping.len(), self.header.len());
        if let Some(index) = self.mapping.get(field) {
            return *index;
        }
        let index = self.header.len();
        self.header.push(field.to_string());
        self.mapping.insert(field.to_string(), index);
        index
    }

    /// Visits every row with a mutable view, stopping at the first error.
    pub fn try_for_each_row_mut<E, F>(&mut self, mut f: F) -> Result<(), E>
    where
        F: FnMut(usize, ReportRowMut<'_>) -> Result<(), E>,
    {
        let mapping = &self.mapping;
        for (index, values) in self.rows.iter_mut().enumerate() {
            f(index, ReportRowMut::new(values, mapping))?;
        }
        Ok(())
    }

    /// Keeps only rows for which `keep` returns true, in one stable pass.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&ReportRow<'_>) -> bool,
    {
        let mapping = &self.mapping;
        self.rows
            .retain(|values| keep(&ReportRow::new(values, mapping)));
    }

    /// Verifies the header/table/row-width invariants.
    pub fn check_consistency(&self) -> Result<(), ReportError> {
        if self.mapping.len() != self.header.len() {
            return Err(ReportError::MappingOutOfSync {
                mapping: self.mapping.len(),
                header: self.header.len(),
            });
        }
        let expected = self.header.len();
        match self.rows.iter().position(|r| r.len() != expected) {
            Some(row) => Err(ReportError::RowWidth {
                row,
                expected,
                actual: self.rows[row].len(),
            }),
            None => Ok(()),
        }
    }
}

impl std::fmt::Display for ReportData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} for alert \"{}\":", self.report_type, self.alert_name)?;
        writeln!(f, "Header:")?;
        writeln!(f, "{}", self.header.join(","))?;
        writeln!(f, "Data:")?;
        for row in &self.rows {
            writeln!(f, "{}", row.join(","))?;
        }
        Ok(())
    }
}

/// Read-only view of one report row, resolving cells by field name.
#[derive(Debug, Clone, Copy)]
pub struct ReportRow<'a> {
    values: &'a [String],
    mapping: &'a HashMap<String, usize>,
}

impl<'a> ReportRow<'a> {
    pub fn new(values: &'a [String], mapping: &'a HashMap<String, usize>) -> Self {
        Self { values, mapping }
    }

    /// Returns the cell for `field`, or `None` when the report lacks that column.
    pub fn get(&self, field: &str) -> Option<&'a str> {
        let index = *self.mapping.get(field)?;
        self.values.get(index).map(String::as_str)
    }

    pub fn values(&self) -> &'a [String] {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Mutable view of one report row. Values written here must line up with
/// columns the caller already added to the header.
#[derive(Debug)]
pub struct ReportRowMut<'a> {
    values: &'a mut Vec<String>,
    mapping: &'a HashMap<String, usize>,
}

impl<'a> ReportRowMut<'a> {
    pub fn new(values: &'a mut Vec<String>, mapping: &'a HashMap<String, usize>) -> Self {
        Self { values, mapping }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        let index = *self.mapping.get(field)?;
        self.values.get(index).map(String::as_str)
    }

    pub fn as_row(&self) -> ReportRow<'_> {
        ReportRow::new(&self.values[..], self.mapping)
    }

    /// Writes `value` at column `index`, appending when `index` is one past
    /// the current end. Returns false for any other out-of-range index.
    pub fn put(&mut self, index: usize, value: String) -> bool {
        match index.cmp(&self.values.len()) {
            std::cmp::Ordering::Less => {
                self.values[index] = value;
                true
            }
            std::cmp::Ordering::Equal => {
                self.values.push(value);
                true
            }
            std::cmp::Ordering::Greater => false,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
