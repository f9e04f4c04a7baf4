//! Alert message templates.
//!
//! A template is free text with `{FieldName}` placeholders, for example
//! `"Account {AccountDescriptiveName} spent {Cost} today"`. Rendering a
//! template over a report appends an `AlertMessage` column holding the
//! substituted text of each row.

use crate::error::TemplateError;
use adwatch_common::{ReportData, ReportRow, ALERT_MESSAGE_FIELD};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed message template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl MessageTemplate {
    /// Parses `template`, rejecting unmatched braces and placeholders whose
    /// name is empty or contains anything but ASCII letters, digits and `_`.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(malformed(position, "unmatched '{'"));
                    }
                    if name.is_empty() {
                        return Err(malformed(position, "empty placeholder"));
                    }
                    if !name.chars().all(is_word_char) {
                        return Err(malformed(
                            position,
                            format!("invalid placeholder name '{name}'"),
                        ));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name));
                }
                '}' => return Err(malformed(position, "unmatched '}'")),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Field names referenced by the template, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitutes one row. Returns the first placeholder the row cannot
    /// resolve as the error.
    pub fn render_row(&self, row: &ReportRow<'_>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => match row.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(TemplateError::UnresolvedPlaceholder { name: name.clone() })
                    }
                },
            }
        }
        Ok(out)
    }

    /// Appends the `AlertMessage` column to `report`, filled per row.
    ///
    /// Every placeholder is checked against the report header first; on
    /// error the report is left untouched.
    pub fn render(&self, report: &mut ReportData) -> Result<(), TemplateError> {
        if let Some(name) = self.placeholders().find(|name| !report.has_field(name)) {
            return Err(TemplateError::UnresolvedPlaceholder {
                name: name.to_string(),
            });
        }

        let index = report.append_field(ALERT_MESSAGE_FIELD);
        report.try_for_each_row_mut(|_, mut row| {
            let message = self.render_row(&row.as_row())?;
            row.put(index, message);
            Ok(())
        })
    }
}

impl std::fmt::Display for MessageTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parses `template` and renders it over `report` in one step.
pub fn render(template: &str, report: &mut ReportData) -> Result<(), TemplateError> {
    MessageTemplate::parse(template)?.render(report)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn malformed(position: usize, reason: impl Into<String>) -> TemplateError {
    TemplateError::Malformed {
        position,
        reason: reason.into(),
    }
}
