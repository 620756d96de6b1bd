//! Process-wide database
//!
//! Opens the file pair for every metric kind at startup and keeps each
//! behind its own reader/writer lock. Writers exclude everything on
//! their kind; readers on one kind run concurrently. Operations touch
//! exactly one kind, so no lock ordering exists to get wrong.

use crate::record::Record;
use crate::table::{SearchHit, Table};
use metricio_common::{MetricKind, Predicate, Result};
use parking_lot::RwLock;
use std::fs;
use std::path::Path;
use tracing::info;

/// All per-kind tables under one database directory
#[derive(Debug)]
pub struct Database {
    tables: Vec<RwLock<Table>>,
}

impl Database {
    /// Open every table under `dir`, creating the directory and any
    /// missing files.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(metricio_common::Error::from)?;
        let mut tables = Vec::with_capacity(MetricKind::ALL.len());
        for kind in MetricKind::ALL {
            tables.push(RwLock::new(Table::open(dir, kind)?));
        }
        info!(dir = %dir.display(), "database opened");
        Ok(Self { tables })
    }

    fn table(&self, kind: MetricKind) -> &RwLock<Table> {
        &self.tables[kind as usize - 1]
    }

    /// Append one observation under the kind's write lock
    pub fn add(&self, kind: MetricKind, time: u64, value: u64, locator: &[u8]) -> Result<Record> {
        self.table(kind).write().append(time, value, locator)
    }

    /// Scan a kind's log under its read lock, delivering matches to
    /// `deliver` in insertion order.
    pub fn search<F>(&self, predicate: &Predicate, max: usize, deliver: F) -> Result<usize>
    where
        F: FnMut(&SearchHit) -> Result<()>,
    {
        self.table(predicate.kind).read().search(predicate, max, deliver)
    }

    /// Newest record of a kind, if any
    pub fn last_record(&self, kind: MetricKind) -> Result<Option<Record>> {
        self.table(kind).read().last_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricio_common::{CompareOp, Error};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn any_value(kind: MetricKind) -> Predicate {
        Predicate {
            kind,
            op: CompareOp::Ge,
            value: 0,
            start: 0,
            end: 0,
        }
    }

    #[test]
    fn test_kinds_are_isolated() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();

        db.add(MetricKind::CpuLoad, 1, 90, b"host-1").unwrap();
        db.add(MetricKind::Rtt, 1, 30, b"host-1").unwrap();

        let mut hits = 0;
        db.search(&any_value(MetricKind::CpuLoad), 10, |hit| {
            assert_eq!(hit.value, 90);
            hits += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(hits, 1);

        assert!(matches!(
            db.search(&any_value(MetricKind::Traffic), 10, |_| Ok(())),
            Err(Error::NoResults)
        ));
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let dir = tempdir().unwrap();
        let db = Arc::new(Database::open(dir.path()).unwrap());
        for i in 0..50 {
            db.add(MetricKind::CpuLoad, i, i, b"seed").unwrap();
        }

        std::thread::scope(|scope| {
            // equal timestamps are allowed, so concurrent writers share one
            for t in 0..4u64 {
                let db = Arc::clone(&db);
                scope.spawn(move || {
                    for _ in 0..50 {
                        db.add(MetricKind::Traffic, 100, t, b"writer").unwrap();
                    }
                });
            }
            for _ in 0..4 {
                let db = Arc::clone(&db);
                scope.spawn(move || {
                    for _ in 0..20 {
                        let mut seen = 0;
                        db.search(&any_value(MetricKind::CpuLoad), 100, |_| {
                            seen += 1;
                            Ok(())
                        })
                        .unwrap();
                        assert_eq!(seen, 50);
                    }
                });
            }
        });

        assert_eq!(
            db.last_record(MetricKind::Traffic).unwrap().unwrap().time,
            100
        );
        let mut writes = 0;
        db.search(&any_value(MetricKind::Traffic), 255, |_| {
            writes += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(writes, 200);
    }
}
