use crate::err::{FormatFileError, FormatFileResult, WrongFormatReason};
use crate::int_literal::parse_int_literal;
use crate::record::EVENT_ID_MASK;
use crate::template::Template;

use hashbrown::HashMap;
use log::{debug, warn};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSettings {
    strict_placeholders: bool,
}

impl Default for TableSettings {
    fn default() -> Self {
        TableSettings {
            strict_placeholders: true,
        }
    }
}

impl TableSettings {
    pub fn new() -> Self {
        TableSettings::default()
    }

    /// When set (the default), a template naming an unknown placeholder or using an unsupported
    /// conversion makes the whole format file invalid.
    ///
    /// When unset, such templates are kept and every record using them is rendered through the
    /// diagnostic fallback.
    pub fn strict_placeholders(mut self, strict: bool) -> Self {
        self.strict_placeholders = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict_placeholders
    }
}

/// Maps event ids to the template used to render them.
///
/// Built once from a rule file where each line reads `<event id> <template>`, lines starting with
/// `#` are comments.
#[derive(Debug, Default, Clone)]
pub struct FormatTable {
    rules: HashMap<u64, Template>,
}

impl FormatTable {
    pub fn new() -> Self {
        FormatTable::default()
    }

    pub fn from_path(path: impl AsRef<Path>) -> FormatFileResult<Self> {
        Self::from_path_with_settings(path, &TableSettings::default())
    }

    pub fn from_path_with_settings(
        path: impl AsRef<Path>,
        settings: &TableSettings,
    ) -> FormatFileResult<Self> {
        let f = File::open(path.as_ref())?;
        Self::from_reader_with_settings(BufReader::new(f), settings)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> FormatFileResult<Self> {
        Self::from_reader_with_settings(reader, &TableSettings::default())
    }

    /// Parses a whole rule file. The first malformed line aborts parsing.
    pub fn from_reader_with_settings<R: BufRead>(
        reader: R,
        settings: &TableSettings,
    ) -> FormatFileResult<Self> {
        let mut table = FormatTable::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = i + 1;

            let Some((event, template)) = parse_rule(&line, settings)
                .map_err(|reason| FormatFileError::WrongFormat {
                    line: line_number,
                    reason,
                })?
            else {
                continue;
            };

            if event > EVENT_ID_MASK {
                warn!("line {line_number}: event id {event:#x} is wider than 48 bits and will never match");
            }
            if let Some(defect) = template.defect() {
                warn!("line {line_number}: keeping template for event {event} despite: {defect}");
            }
            if template.has_unbound_conversion() {
                warn!("line {line_number}: template for event {event} has a conversion without a `%(name)` key");
            }

            if table.insert(event, template).is_some() {
                warn!("line {line_number}: duplicate rule for event {event}, the last one wins");
            }
        }

        debug!("Loaded {} format rules", table.len());
        Ok(table)
    }

    /// Adds a rule, returning the template previously registered for `event`.
    pub fn insert(&mut self, event: u64, template: Template) -> Option<Template> {
        self.rules.insert(event, template)
    }

    pub fn get(&self, event: u64) -> Option<&Template> {
        self.rules.get(&event)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Returns `None` for comments and blank lines.
fn parse_rule(
    line: &str,
    settings: &TableSettings,
) -> Result<Option<(u64, Template)>, WrongFormatReason> {
    if line.starts_with('#') || line.trim().is_empty() {
        return Ok(None);
    }

    let id_end = match line.find(char::is_whitespace) {
        Some(0) | None => return Err(WrongFormatReason::MissingTemplate),
        Some(end) => end,
    };

    let (id, rest) = line.split_at(id_end);
    let source = rest.trim_start();
    if source.is_empty() {
        return Err(WrongFormatReason::MissingTemplate);
    }

    let event = parse_int_literal(id)?;
    let template = if settings.is_strict() {
        Template::parse(source)?
    } else {
        Template::parse_lenient(source)
    };

    Ok(Some((event, template)))
}
