//! Compiled printf-style templates with named placeholders.
//!
//! A template such as `CPU%(cpu)d vmexit 0x%(1)08x` is compiled once when the format table is
//! built, so that rendering a record is a walk over pre-parsed segments.
use crate::err::{RenderMismatch, TemplateError};
use crate::record::{MAX_FIELDS, Record};

use std::iter;

/// Upper bound for widths and precisions, larger ones are rejected when compiling.
pub const MAX_WIDTH: usize = 65_535;

/// A value a template can refer to by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Cpu,
    Tsc,
    Event,
    /// Data field, 1-based.
    Field(u8),
}

impl Placeholder {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cpu" => Some(Placeholder::Cpu),
            "tsc" => Some(Placeholder::Tsc),
            "event" => Some(Placeholder::Event),
            // Only canonical spellings, `%(01)d` and `%(+1)d` are not fields.
            n if !n.starts_with('0') && n.bytes().all(|b| b.is_ascii_digit()) => {
                match n.parse::<u8>() {
                    Ok(i) if (1..=MAX_FIELDS as u8).contains(&i) => Some(Placeholder::Field(i)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn value(self, record: &Record) -> i128 {
        match self {
            Placeholder::Cpu => i128::from(record.cpu),
            Placeholder::Tsc => i128::from(record.tsc),
            Placeholder::Event => i128::from(record.event),
            Placeholder::Field(i) => record.field(usize::from(i)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Decimal,
    Hex,
    UpperHex,
    Octal,
    /// The value as a character, `TRACE_6C` entries carry short strings this way.
    Char,
    /// `s` and `r`: the signed decimal text, padded and truncated like a string.
    Str,
}

impl Conversion {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'd' | 'i' | 'u' => Some(Conversion::Decimal),
            'x' => Some(Conversion::Hex),
            'X' => Some(Conversion::UpperHex),
            'o' => Some(Conversion::Octal),
            'c' => Some(Conversion::Char),
            's' | 'r' => Some(Conversion::Str),
            _ => None,
        }
    }

    fn alternate_prefix(self) -> &'static str {
        match self {
            Conversion::Decimal | Conversion::Char | Conversion::Str => "",
            Conversion::Hex => "0x",
            Conversion::UpperHex => "0X",
            Conversion::Octal => "0o",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    alternate: bool,
    zero_pad: bool,
    left_align: bool,
    plus_sign: bool,
    space_sign: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Spec {
    /// `None` for a bare `%d`, which cannot be bound to a record.
    key: Option<Placeholder>,
    flags: Flags,
    width: usize,
    precision: Option<usize>,
    conversion: Conversion,
    column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Spec(Spec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
    /// Set for templates kept despite a compile error, every render of them falls back.
    defect: Option<TemplateError>,
}

impl Template {
    /// Compiles `source`, rejecting unknown placeholders and malformed specifiers.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let segments = Parser::new(source).segments()?;
        Ok(Template {
            source: source.to_owned(),
            segments,
            defect: None,
        })
    }

    /// Like [`Template::parse`], but keeps a template that fails to compile.
    ///
    /// Rendering such a template always reports a mismatch.
    pub fn parse_lenient(source: &str) -> Self {
        match Template::parse(source) {
            Ok(template) => template,
            Err(e) => Template {
                source: source.to_owned(),
                segments: Vec::new(),
                defect: Some(e),
            },
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn defect(&self) -> Option<&TemplateError> {
        self.defect.as_ref()
    }

    /// True when some conversion has no mapping key and can never be rendered.
    pub fn has_unbound_conversion(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Spec(Spec { key: None, .. })))
    }

    pub fn render(&self, record: &Record) -> Result<String, RenderMismatch> {
        if let Some(defect) = &self.defect {
            return Err(RenderMismatch::Template(defect.clone()));
        }

        let mut out = String::with_capacity(self.source.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Spec(spec) => {
                    let key = spec
                        .key
                        .ok_or(RenderMismatch::MissingKey { column: spec.column })?;
                    format_value(&mut out, key.value(record), spec)?;
                }
            }
        }

        Ok(out)
    }
}

fn pad(out: &mut String, fill: char, count: usize) {
    out.extend(iter::repeat_n(fill, count));
}

/// Appends `body` padded to the spec width with spaces.
fn push_aligned(out: &mut String, body: &str, width: usize, left_align: bool) {
    let padding = width.saturating_sub(body.chars().count());
    if left_align {
        out.push_str(body);
        pad(out, ' ', padding);
    } else {
        pad(out, ' ', padding);
        out.push_str(body);
    }
}

fn format_value(out: &mut String, value: i128, spec: &Spec) -> Result<(), RenderMismatch> {
    match spec.conversion {
        Conversion::Char => {
            let c = u32::try_from(value)
                .ok()
                .and_then(char::from_u32)
                .ok_or(RenderMismatch::NotAChar {
                    value,
                    column: spec.column,
                })?;
            push_aligned(out, c.encode_utf8(&mut [0; 4]), spec.width, spec.flags.left_align);
            return Ok(());
        }
        Conversion::Str => {
            let mut text = value.to_string();
            if let Some(precision) = spec.precision {
                text.truncate(precision);
            }
            push_aligned(out, &text, spec.width, spec.flags.left_align);
            return Ok(());
        }
        _ => {}
    }

    let magnitude = value.unsigned_abs();
    let digits = match spec.conversion {
        Conversion::Hex => format!("{magnitude:x}"),
        Conversion::UpperHex => format!("{magnitude:X}"),
        Conversion::Octal => format!("{magnitude:o}"),
        _ => magnitude.to_string(),
    };
    let leading_zeros = spec
        .precision
        .map_or(0, |precision| precision.saturating_sub(digits.len()));

    let mut prefix = String::new();
    if value < 0 {
        prefix.push('-');
    } else if spec.flags.plus_sign {
        prefix.push('+');
    } else if spec.flags.space_sign {
        prefix.push(' ');
    }
    if spec.flags.alternate {
        prefix.push_str(spec.conversion.alternate_prefix());
    }

    let len = prefix.len() + leading_zeros + digits.len();
    let padding = spec.width.saturating_sub(len);

    if !spec.flags.left_align && !spec.flags.zero_pad {
        pad(out, ' ', padding);
    }
    out.push_str(&prefix);
    if spec.flags.zero_pad && !spec.flags.left_align {
        pad(out, '0', padding);
    }
    pad(out, '0', leading_zeros);
    out.push_str(&digits);
    if spec.flags.left_align {
        pad(out, ' ', padding);
    }
    Ok(())
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Parser {
            chars: source.char_indices().peekable(),
            source,
        }
    }

    fn column(&self, byte_offset: usize) -> usize {
        self.source[..byte_offset].chars().count() + 1
    }

    fn segments(mut self) -> Result<Vec<Segment>, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();

        while let Some((offset, c)) = self.chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }

            let column = self.column(offset);
            if let Some((_, '%')) = self.chars.peek() {
                self.chars.next();
                literal.push('%');
                continue;
            }

            let spec = self.spec(column)?;
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Spec(spec));
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(segments)
    }

    fn next_or_truncated(&mut self, column: usize) -> Result<char, TemplateError> {
        self.chars
            .next()
            .map(|(_, c)| c)
            .ok_or(TemplateError::Truncated { column })
    }

    /// Reads a run of decimal digits starting at `c`, leaving `c` on the first non-digit.
    fn number(
        &mut self,
        c: &mut char,
        what: &'static str,
        column: usize,
    ) -> Result<usize, TemplateError> {
        let mut value = 0_usize;
        while let Some(d) = c.to_digit(10) {
            value = value.saturating_mul(10).saturating_add(d as usize);
            *c = self.next_or_truncated(column)?;
        }

        if value > MAX_WIDTH {
            return Err(TemplateError::TooWide {
                what,
                value,
                max: MAX_WIDTH,
                column,
            });
        }
        Ok(value)
    }

    /// Parses what follows a `%`: `[(name)][flags][width][.precision][length]conversion`.
    fn spec(&mut self, column: usize) -> Result<Spec, TemplateError> {
        let mut c = self.next_or_truncated(column)?;

        let key = if c == '(' {
            let mut name = String::new();
            loop {
                match self.next_or_truncated(column)? {
                    ')' => break,
                    ch => name.push(ch),
                }
            }
            let placeholder = Placeholder::from_name(&name)
                .ok_or(TemplateError::UnknownPlaceholder { name, column })?;
            c = self.next_or_truncated(column)?;
            Some(placeholder)
        } else {
            None
        };

        let mut flags = Flags::default();
        loop {
            match c {
                '#' => flags.alternate = true,
                '0' => flags.zero_pad = true,
                '-' => flags.left_align = true,
                '+' => flags.plus_sign = true,
                ' ' => flags.space_sign = true,
                _ => break,
            }
            c = self.next_or_truncated(column)?;
        }

        let width = self.number(&mut c, "width", column)?;

        let mut precision = None;
        if c == '.' {
            c = self.next_or_truncated(column)?;
            precision = Some(self.number(&mut c, "precision", column)?);
        }

        // Length modifiers carry no meaning for these values.
        while matches!(c, 'h' | 'l' | 'L') {
            c = self.next_or_truncated(column)?;
        }

        let conversion = Conversion::from_char(c).ok_or(TemplateError::UnsupportedConversion {
            conversion: c,
            column,
        })?;

        Ok(Spec {
            key,
            flags,
            width,
            precision,
            conversion,
            column,
        })
    }
}
