use crate::format_table::FormatTable;
use crate::record::Record;

use log::debug;

use std::fmt;

/// Output produced for a record whose event id has a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Line(String),
    /// The template could not be bound to the record, the raw template and every field value are
    /// emitted instead.
    Fallback { template: String, fields: String },
}

impl Rendered {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Rendered::Fallback { .. })
    }
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rendered::Line(line) => f.write_str(line),
            Rendered::Fallback { template, fields } => write!(f, "{template}\n{fields}"),
        }
    }
}

impl FormatTable {
    /// Renders `record` through the rule for its event id.
    ///
    /// Returns `None` when no rule exists for the event.
    pub fn render(&self, record: &Record) -> Option<Rendered> {
        let template = self.get(record.event)?;

        let rendered = match template.render(record) {
            Ok(line) => Rendered::Line(line),
            Err(e) => {
                debug!("event {}: {e}, dumping raw template", record.event);
                Rendered::Fallback {
                    template: template.source().to_owned(),
                    fields: record.field_set().to_string(),
                }
            }
        };

        Some(rendered)
    }
}
