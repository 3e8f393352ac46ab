//! The event catalog: an immutable indexed list of events with a
//! mutable remaining-ticket counter per event.

use std::fs;
use std::path::Path;

use thiserror::Error;

/// Longest description representable on the wire (one-byte length).
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// Errors while loading the catalog file. All of them are fatal at
/// startup.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("cannot read catalog file: {0}")]
    Io(#[from] std::io::Error),

    /// A description line is empty.
    #[error("line {line}: event description is empty")]
    EmptyDescription {
        /// 1-based line number.
        line: usize,
    },

    /// A description line exceeds 255 bytes and cannot be encoded.
    #[error("line {line}: event description is {len} bytes, at most {MAX_DESCRIPTION_LEN} allowed")]
    DescriptionTooLong {
        /// 1-based line number.
        line: usize,
        /// Byte length of the offending description.
        len: usize,
    },

    /// A ticket-count line is not a decimal number in `[0, 65535]`.
    #[error("line {line}: invalid ticket count {value:?}")]
    InvalidTicketCount {
        /// 1-based line number.
        line: usize,
        /// The offending line, lossily decoded for display.
        value: String,
    },
}

/// A single show with a fixed initial inventory.
#[derive(Debug, Clone)]
pub struct Event {
    description: Vec<u8>,
    remaining: u16,
    initial: u16,
}

impl Event {
    /// Raw description bytes as they appeared in the catalog file.
    #[must_use]
    pub fn description(&self) -> &[u8] {
        &self.description
    }

    /// Tickets still available for reservation.
    #[must_use]
    pub fn remaining(&self) -> u16 {
        self.remaining
    }

    /// Inventory the event started with.
    #[must_use]
    pub fn initial(&self) -> u16 {
        self.initial
    }
}

/// The ordered event list. Read-only after loading except for the
/// per-event remaining counters, which only the reservation store
/// adjusts.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    events: Vec<Event>,
}

impl Catalog {
    /// Loads the catalog from the alternating description/count file.
    ///
    /// Odd lines (1-based) are raw 8-bit descriptions, even lines are
    /// decimal initial ticket counts. A trailing unpaired description
    /// line is ignored. Event ids are assigned 0, 1, 2, … in file
    /// order.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the file cannot be read or any
    /// pair violates the format.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        Self::parse(&fs::read(path)?)
    }

    fn parse(bytes: &[u8]) -> Result<Self, CatalogError> {
        // A final newline terminates the last line rather than opening
        // an empty one.
        let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
        let mut lines = bytes.split(|&b| b == b'\n').enumerate();
        let mut entries = Vec::new();
        while let (Some((desc_idx, description)), Some((count_idx, count))) =
            (lines.next(), lines.next())
        {
            if description.is_empty() {
                return Err(CatalogError::EmptyDescription { line: desc_idx + 1 });
            }
            let count = std::str::from_utf8(count)
                .ok()
                .and_then(|s| s.parse::<u16>().ok())
                .ok_or_else(|| CatalogError::InvalidTicketCount {
                    line: count_idx + 1,
                    value: String::from_utf8_lossy(count).into_owned(),
                })?;
            entries.push((description.to_vec(), count));
        }
        Self::from_entries(entries)
    }

    /// Builds a catalog from in-memory `(description, initial count)`
    /// pairs, in event-id order.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if a description is empty or longer
    /// than [`MAX_DESCRIPTION_LEN`] bytes.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (Vec<u8>, u16)>,
    ) -> Result<Self, CatalogError> {
        let mut events = Vec::new();
        for (index, (description, count)) in entries.into_iter().enumerate() {
            if description.is_empty() {
                return Err(CatalogError::EmptyDescription {
                    line: 2 * index + 1,
                });
            }
            if description.len() > MAX_DESCRIPTION_LEN {
                return Err(CatalogError::DescriptionTooLong {
                    line: 2 * index + 1,
                    len: description.len(),
                });
            }
            events.push(Event {
                description,
                remaining: count,
                initial: count,
            });
        }
        Ok(Self { events })
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the catalog holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Looks up an event by its ordinal.
    #[must_use]
    pub fn get(&self, event_id: u32) -> Option<&Event> {
        self.events.get(event_id as usize)
    }

    /// Events with their ids, in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Event)> {
        self.events
            .iter()
            .enumerate()
            .map(|(id, event)| (id as u32, event))
    }

    /// Removes `count` tickets from an event's remaining inventory.
    ///
    /// Callers validate availability first; the counter never goes
    /// below zero.
    pub fn take(&mut self, event_id: u32, count: u16) {
        if let Some(event) = self.events.get_mut(event_id as usize) {
            debug_assert!(count <= event.remaining);
            event.remaining = event.remaining.saturating_sub(count);
        }
    }

    /// Returns `count` tickets to an event's remaining inventory.
    ///
    /// Refunds only ever undo a prior `take`; the counter never rises
    /// above the initial inventory.
    pub fn refund(&mut self, event_id: u32, count: u16) {
        if let Some(event) = self.events.get_mut(event_id as usize) {
            debug_assert!(count <= event.initial - event.remaining);
            event.remaining = event.remaining.saturating_add(count).min(event.initial);
        }
    }
}
