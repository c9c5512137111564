use crate::state_machine::ClosureRecord;
use anyhow::anyhow;
use std::collections::HashMap;

/// Somewhere to keep the records of closed trades once their sessions are evicted.
pub trait ArchiveStore {
    fn archive(&mut self, record: &ClosureRecord) -> Result<(), anyhow::Error>;
    fn load_record(&self, trade_id: &str) -> Result<ClosureRecord, anyhow::Error>;
}

/// Keeps records in memory. Handy for tests and for coordinators that don't need an archive on disk.
#[derive(Default)]
pub struct MemoryStore {
    records: HashMap<String, ClosureRecord>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ArchiveStore for MemoryStore {
    fn archive(&mut self, record: &ClosureRecord) -> Result<(), anyhow::Error> {
        self.records.insert(record.trade_id.clone(), record.clone());
        Ok(())
    }

    fn load_record(&self, trade_id: &str) -> Result<ClosureRecord, anyhow::Error> {
        self.records.get(trade_id).cloned().ok_or_else(|| anyhow!("No archived trade {trade_id}"))
    }
}
