#![forbid(unsafe_code)]
//! Decoder and formatter for `acrntrace` binary trace streams.
//!
//! A trace is a sequence of little-endian records:
//!
//! ```text
//! tsc:     u64
//! header:  u64   event:48 | field_count:8 | cpu:8
//! payload: 2 x u64 | 4 x u32 | 16 x u8 | 16 x i8, selected by field_count
//! ```
//!
//! Records are rendered through a [`FormatTable`] loaded from a rule file mapping event ids to
//! printf-style templates such as `CPU%(cpu)d vmexit reason 0x%(1)x`.
pub use format_table::{FormatTable, TableSettings};
pub use record::{FieldSet, Payload, RawHeader, Record};
pub use render::Rendered;
pub use template::{Placeholder, Template};
pub use trace_reader::TraceReader;

pub use dump::{DumpSummary, Dumper};
pub use tokio_util::sync::CancellationToken;

pub mod err;
pub mod int_literal;
pub mod record;
pub mod template;
pub mod trace_reader;

mod dump;
mod format_table;
mod render;
