//! Static in-memory oracle for driving the explorer in tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use common::error::AdminError;
use common::model::{ReferenceDetail, ReferenceRecord};

use crate::ReferenceOracle;

/// Oracle with fixed answers, optionally failing every call.
#[derive(Clone, Debug, Default)]
pub struct StaticOracle {
    referenced: HashSet<String>,
    records: HashMap<String, Vec<ReferenceRecord>>,
    fail: bool,
}

impl StaticOracle {
    pub fn with_referenced_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            referenced: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_record(mut self, key: impl Into<String>, record: ReferenceRecord) -> Self {
        let key = key.into();
        self.referenced.insert(key.clone());
        self.records.entry(key).or_default().push(record);
        self
    }

    /// Make every call fail with a transport error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ReferenceOracle for StaticOracle {
    async fn referenced_key_set(&self) -> Result<HashSet<String>, AdminError> {
        if self.fail {
            return Err(AdminError::Transport("oracle unavailable".to_string()));
        }
        Ok(self.referenced.clone())
    }

    async fn check_references(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, ReferenceDetail>, AdminError> {
        if self.fail {
            return Err(AdminError::Transport("oracle unavailable".to_string()));
        }
        Ok(keys
            .iter()
            .map(|key| {
                let references = self.records.get(key).cloned().unwrap_or_default();
                (
                    key.clone(),
                    ReferenceDetail {
                        is_referenced: self.referenced.contains(key),
                        references,
                    },
                )
            })
            .collect())
    }
}
