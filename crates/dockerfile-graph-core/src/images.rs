use std::collections::BTreeSet;

use tracing::debug;

use crate::model::{ExternalImage, Stage};

// Stage aliases may be defined after their first use, so filtering waits
// for `finish`.
#[derive(Debug, Default)]
pub struct ImageRegistry {
    seen: BTreeSet<String>,
    candidates: Vec<String>,
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &str) {
        if self.seen.insert(name.to_string()) {
            self.candidates.push(name.to_string());
        }
    }

    pub fn finish(self, stages: &[Stage]) -> Vec<ExternalImage> {
        let stage_names: BTreeSet<&str> = stages
            .iter()
            .filter_map(|stage| stage.name.as_deref())
            .collect();

        self.candidates
            .into_iter()
            .filter(|name| {
                let internal = stage_names.contains(name.as_str());
                if internal {
                    debug!(reference = name.as_str(), "reference resolves to a stage");
                }
                !internal
            })
            .map(ExternalImage::new)
            .collect()
    }
}
