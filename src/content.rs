//! Splitting file content into numbered sections and putting it back together.

use std::io::Read;

use crate::{error::Error, protocol::ErrorKind, utils::MAX_FRAME_LEN};

/// Requests asking for sections of this size or smaller are refused
pub const MIN_SECTION_BYTES: u64 = 500;

/// Largest section whose base64 text still fits in one frame, leaving room
/// for the rest of the envelope
pub const MAX_SECTION_BYTES: u64 = MAX_FRAME_LEN as u64 / 4 * 3 - 64 * 1024;

pub fn check_section_bytes(section_bytes: u64) -> Result<(), Error> {
    if section_bytes <= MIN_SECTION_BYTES {
        return Err(Error::status(
            ErrorKind::FileSystemError,
            format!("Section size must be greater than {MIN_SECTION_BYTES} bytes"),
        ));
    }

    if section_bytes > MAX_SECTION_BYTES {
        return Err(Error::status(
            ErrorKind::FileSystemError,
            format!("Section size must not exceed {MAX_SECTION_BYTES} bytes"),
        ));
    }

    Ok(())
}

/// One slice of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub sequence: u64,
    pub data: Vec<u8>,
    pub is_more: bool,
}

/// Iterates over a reader of known length in sections of at most
/// `section_bytes`. A zero length source still yields one empty section so
/// the receiver always sees a final `is_more == false`.
pub struct Sections<R> {
    reader: R,
    remaining: u64,
    section_bytes: u64,
    sequence: u64,
    done: bool,
}

impl<R: Read> Sections<R> {
    pub fn new(reader: R, length: u64, section_bytes: u64) -> Self {
        Self {
            reader,
            remaining: length,
            section_bytes: section_bytes.max(1),
            sequence: 0,
            done: false,
        }
    }
}

impl<R: Read> Iterator for Sections<R> {
    type Item = Result<Section, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let size = self.remaining.min(self.section_bytes);
        let mut data = vec![0; size as usize];

        if let Err(err) = self.reader.read_exact(&mut data) {
            self.done = true;
            return Some(Err(Error::IO(err.to_string())));
        }

        self.remaining -= size;

        let section = Section {
            sequence: self.sequence,
            data,
            is_more: self.remaining > 0,
        };

        self.sequence += 1;
        self.done = !section.is_more;

        Some(Ok(section))
    }
}

/// Collects inbound sections in order
#[derive(Debug, Default)]
pub struct Assembler {
    data: Vec<u8>,
    next_sequence: u64,
    complete: bool,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one section. Sections without a sequence number are taken to
    /// be the next expected one.
    pub fn push(&mut self, sequence: Option<u64>, data: &[u8], is_more: bool) -> Result<(), Error> {
        if self.complete {
            return Err(Error::BadMessage("section after the final one".to_owned()));
        }

        let sequence = sequence.unwrap_or(self.next_sequence);
        if sequence != self.next_sequence {
            return Err(Error::BadMessage(format!(
                "section {sequence} received, expected {}",
                self.next_sequence
            )));
        }

        self.data.extend_from_slice(data);
        self.next_sequence += 1;
        self.complete = !is_more;

        Ok(())
    }

    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}
