use crate::error::ParseError;
use adwatch_common::{FieldMapping, ReportData};

/// Turns downloaded report content into a [`ReportData`] table.
pub struct ReportParser;

impl ReportParser {
    /// Builds a report from a display-name header and its rows.
    ///
    /// Each header cell is translated to its machine field name through
    /// `mapping`; the rows are taken over as independent, growable rows.
    pub fn parse(
        alert_name: &str,
        raw_header: &[String],
        raw_rows: Vec<Vec<String>>,
        mapping: &FieldMapping,
    ) -> Result<ReportData, ParseError> {
        let header = raw_header
            .iter()
            .map(|display_name| {
                mapping
                    .field_name(display_name)
                    .map(str::to_string)
                    .ok_or_else(|| ParseError::MissingMapping {
                        display_name: display_name.clone(),
                        report_type: mapping.report_type().to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let expected = header.len();
        if let Some((row, cells)) = raw_rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != expected)
        {
            return Err(ParseError::RowWidth {
                row,
                expected,
                actual: cells.len(),
            });
        }

        Ok(ReportData::new(
            alert_name,
            mapping.report_type(),
            header,
            raw_rows,
        )?)
    }

    /// Parses a CSV payload whose first record is the display-name header.
    pub fn parse_csv(
        alert_name: &str,
        payload: &[u8],
        mapping: &FieldMapping,
    ) -> Result<ReportData, ParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(payload);

        let mut records = reader.records();
        let header: Vec<String> = match records.next() {
            Some(record) => record?.iter().map(str::to_string).collect(),
            None => return Err(ParseError::EmptyReport),
        };

        let rows = records
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, csv::Error>>()?;

        Self::parse(alert_name, &header, rows, mapping)
    }
}
