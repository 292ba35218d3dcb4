//! The durable work registry this crate owns directly: the concrete
//! `WorkStore` every downstream crate only reads from, populated by
//! `register_work`/`set_deadlines` and marked `closed` once
//! [`crate::ChaosChainEngine::close_epoch`] finalizes a work. Mirrors
//! the way the teacher keeps actor state in a `Blockstore`-backed HAMT
//! behind the read-only `Runtime` trait its callers see.

use std::collections::BTreeMap;

use chaoschain_runtime::interfaces::{WorkRecord, WorkStore};
use chaoschain_runtime::{AccountId, EngineError, WorkId};

#[derive(Debug, Clone, Default)]
pub struct WorkRegistry {
    works: BTreeMap<WorkId, WorkRecord>,
}

impl WorkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, work_id: WorkId) -> bool {
        self.works.contains_key(&work_id)
    }

    pub fn insert(&mut self, work_id: WorkId, record: WorkRecord) {
        self.works.insert(work_id, record);
    }

    pub fn get_mut(&mut self, work_id: WorkId) -> Option<&mut WorkRecord> {
        self.works.get_mut(&work_id)
    }
}

impl WorkStore for WorkRegistry {
    fn get_work(&self, work_id: WorkId) -> Result<WorkRecord, EngineError> {
        self.works
            .get(&work_id)
            .cloned()
            .ok_or_else(|| EngineError::missing(format!("work {work_id} is not registered")))
    }

    fn list_works(&self, studio_id: AccountId, epoch: u64) -> Result<Vec<WorkId>, EngineError> {
        Ok(self
            .works
            .iter()
            .filter(|(_, record)| record.studio_id == studio_id && record.epoch == epoch)
            .map(|(work_id, _)| *work_id)
            .collect())
    }
}
