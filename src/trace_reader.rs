use crate::err::{DecodeError, DecodeResult};
use crate::record::{PAYLOAD_SIZE, Payload, RawHeader, Record};

use log::{debug, trace};
use tokio_util::sync::CancellationToken;

use std::io::{self, Read};

/// Size of the `tsc` + header prefix every entry starts with.
pub const RECORD_HEADER_SIZE: usize = 16;

enum Chunk {
    Complete,
    /// The stream ended after `usize` bytes of the chunk.
    Short(usize),
}

/// Iterates over the records of an `acrntrace` binary stream.
///
/// The iterator is single pass. It ends when the stream runs out of bytes, even in the middle of
/// a record, or when its cancellation token fires. A read failure other than end-of-stream is
/// yielded once, after which the iterator is exhausted.
pub struct TraceReader<R: Read> {
    inner: R,
    cancel: CancellationToken,
    offset: u64,
    records_read: u64,
    done: bool,
}

impl<R: Read> TraceReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_cancellation(inner, CancellationToken::new())
    }

    pub fn with_cancellation(inner: R, cancel: CancellationToken) -> Self {
        TraceReader {
            inner,
            cancel,
            offset: 0,
            records_read: 0,
            done: false,
        }
    }

    /// Byte offset of the next record.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Fills `buf` unless the stream ends first. Retries interrupted reads.
    fn read_chunk(&mut self, buf: &mut [u8], at: u64, what: &'static str) -> DecodeResult<Chunk> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Ok(Chunk::Short(filled)),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(DecodeError::Io {
                        offset: at + filled as u64,
                        what,
                        source,
                    });
                }
            }
        }
        Ok(Chunk::Complete)
    }

    fn read_record(&mut self) -> DecodeResult<Option<Record>> {
        let start = self.offset;

        let mut prefix = [0_u8; RECORD_HEADER_SIZE];
        if let Chunk::Short(n) = self.read_chunk(&mut prefix[..8], start, "tsc")? {
            self.end_of_stream(start, n);
            return Ok(None);
        }
        if let Chunk::Short(n) = self.read_chunk(&mut prefix[8..], start + 8, "header")? {
            self.end_of_stream(start, 8 + n);
            return Ok(None);
        }

        let tsc = u64::from_le_bytes(array(&prefix[..8]));
        let header = RawHeader::from_u64(u64::from_le_bytes(array(&prefix[8..])));

        let payload_size = Payload::wire_size(header.field_count);
        let mut data = [0_u8; PAYLOAD_SIZE];
        if let Chunk::Short(n) = self.read_chunk(
            &mut data[..payload_size],
            start + RECORD_HEADER_SIZE as u64,
            "payload",
        )? {
            self.end_of_stream(start, RECORD_HEADER_SIZE + n);
            return Ok(None);
        }

        if payload_size == 0 && header.field_count != 0 {
            debug!(
                "offset {start}: unknown field count {} for event {}, decoding header only",
                header.field_count, header.event
            );
        }

        let record = Record {
            tsc,
            cpu: header.cpu,
            event: header.event,
            payload: Payload::decode(header.field_count, &data),
        };

        self.offset = start + (RECORD_HEADER_SIZE + payload_size) as u64;
        self.records_read += 1;
        trace!("offset {start}: {record:?}");

        Ok(Some(record))
    }

    fn end_of_stream(&mut self, start: u64, partial: usize) {
        if partial > 0 {
            debug!("offset {start}: dropping {partial} trailing bytes of a truncated record");
        }
        debug!("Reached end of trace after {} records", self.records_read);
        self.offset = start + partial as u64;
        self.done = true;
    }
}

fn array(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0_u8; 8];
    out.copy_from_slice(bytes);
    out
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = DecodeResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.cancel.is_cancelled() {
            debug!("Cancelled after {} records", self.records_read);
            self.done = true;
            return None;
        }

        match self.read_record() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
