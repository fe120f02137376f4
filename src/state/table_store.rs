use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::pipeline::PipelineOutput;

/// One pipeline result as published to readers.
#[derive(Debug)]
pub struct PublishedTable {
    pub output: PipelineOutput,
    pub computed_at: DateTime<Utc>,
}

impl PublishedTable {
    pub fn is_empty(&self) -> bool {
        self.output.rows.is_empty()
    }

    /// Distinct countries present in the table, sorted.
    pub fn countries(&self) -> Vec<String> {
        self.output
            .rows
            .iter()
            .map(|r| r.country.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Latest merged table. Each refresh swaps in a new `PublishedTable`;
/// readers holding the previous `Arc` keep a consistent view.
#[derive(Default)]
pub struct TableStore {
    latest: RwLock<Option<Arc<PublishedTable>>>,
}

impl TableStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn publish(&self, output: PipelineOutput, computed_at: DateTime<Utc>) -> Arc<PublishedTable> {
        let table = Arc::new(PublishedTable { output, computed_at });
        // A poisoned lock only means a writer panicked mid-swap; the Option is still valid.
        let mut slot = self.latest.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::clone(&table));
        table
    }

    pub fn latest(&self) -> Option<Arc<PublishedTable>> {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(Arc::clone)
    }
}
