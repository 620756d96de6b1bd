//! Per-kind table pair
//!
//! One [`Table`] couples a metric kind's record log with its locator
//! heap. Appends enforce non-decreasing timestamps; searches scan the
//! log front to back, filter by time window and value predicate, and
//! hand each match to a caller-supplied callback with its locator
//! materialized.

use crate::file::TableFile;
use crate::locator::LocatorHeap;
use crate::record::{Record, RECORD_SIZE};
use metricio_common::{Error, MetricKind, Predicate, Result};
use metricio_proto::PktBuf;
use std::path::Path;
use tracing::{debug, trace};

/// Locator file name suffix
const LOC_SUFFIX: &str = "-loc";

/// One search match with its locator resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub time: u64,
    pub value: u64,
    /// Ranking placeholder, always 0
    pub score: u8,
    pub locator: Vec<u8>,
}

/// Record log plus locator heap for one metric kind
#[derive(Debug)]
pub struct Table {
    kind: MetricKind,
    log: TableFile,
    locators: LocatorHeap,
}

impl Table {
    /// Open the file pair for `kind` under `dir`, creating missing files
    pub fn open(dir: impl AsRef<Path>, kind: MetricKind) -> Result<Self> {
        let dir = dir.as_ref();
        let log = TableFile::open(dir.join(kind.name()))?;
        let locators = LocatorHeap::open(dir.join(format!("{}{LOC_SUFFIX}", kind.name())))?;
        Ok(Self {
            kind,
            log,
            locators,
        })
    }

    /// Metric kind this table stores
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Number of complete records in the log
    #[must_use]
    pub const fn record_count(&self) -> u64 {
        self.log.size() / RECORD_SIZE as u64
    }

    /// Read the newest complete record, if any
    pub fn last_record(&self) -> Result<Option<Record>> {
        let count = self.record_count();
        if count == 0 {
            return Ok(None);
        }
        let mut raw = [0u8; RECORD_SIZE];
        self.log
            .read_exact_at((count - 1) * RECORD_SIZE as u64, &mut raw)?;
        let mut buf = PktBuf::new(RECORD_SIZE);
        buf.put_slice(&raw);
        buf.rewind();
        Ok(Some(Record::decode(&mut buf)))
    }

    /// Append one observation.
    ///
    /// A timestamp strictly before the newest record is rejected with
    /// [`Error::OutOfRange`]; equal timestamps are allowed. The locator
    /// is interned before the record lands, so an append that fails the
    /// record write may still have grown the heap.
    pub fn append(&mut self, time: u64, value: u64, locator: &[u8]) -> Result<Record> {
        if let Some(last) = self.last_record()? {
            if time < last.time {
                debug!(
                    kind = self.kind.name(),
                    time,
                    last = last.time,
                    "rejected out-of-order record"
                );
                return Err(Error::OutOfRange);
            }
        }
        let loc_index = self.locators.intern(locator)?;
        let record = Record {
            time,
            value,
            loc_index,
        };
        let mut buf = PktBuf::new(RECORD_SIZE);
        record.encode(&mut buf);
        self.log.append(buf.as_slice())?;
        trace!(kind = self.kind.name(), time, value, loc_index, "appended record");
        Ok(record)
    }

    /// Scan the log for records matching `predicate`, delivering at most
    /// `max` hits to `deliver` in insertion order.
    ///
    /// A short trailing record stops the scan cleanly. Zero delivered
    /// hits report [`Error::NoResults`].
    pub fn search<F>(&self, predicate: &Predicate, max: usize, mut deliver: F) -> Result<usize>
    where
        F: FnMut(&SearchHit) -> Result<()>,
    {
        let mut reader = self.log.reader(0);
        let mut matched = 0usize;
        loop {
            if !reader.ensure(RECORD_SIZE)? {
                break;
            }
            let record = Record::decode(reader.buf());
            if !predicate.matches_time(record.time) {
                continue;
            }
            if !predicate.op.matches(record.value, predicate.value) {
                continue;
            }
            if matched == max {
                break;
            }
            let hit = SearchHit {
                time: record.time,
                value: record.value,
                score: 0,
                locator: self.locators.read(record.loc_index)?,
            };
            deliver(&hit)?;
            matched += 1;
        }
        if matched == 0 {
            return Err(Error::NoResults);
        }
        debug!(kind = self.kind.name(), matched, "search finished");
        Ok(matched)
    }
}
