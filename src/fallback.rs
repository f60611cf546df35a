use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    dataset::Dataset,
    record::{Record, RecordFields},
};

/// Hand-maintained records served when the live source has never answered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticFallback {
    records: Vec<RecordFields>,
}

impl StaticFallback {
    pub fn new(records: Vec<RecordFields>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Runs every entry through the same normalization as live rows.
    pub fn to_dataset(&self) -> Dataset {
        let records = self.records.iter().enumerate().filter_map(|(idx, fields)| {
            let record = Record::from_fields(fields.clone());
            if record.is_none() {
                warn!("Fallback entry {} has no identifier or locality; ignoring it", idx + 1);
            }
            record
        });
        Dataset::from_records(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_entries_are_normalized_like_live_rows() {
        let fallback: StaticFallback = serde_yaml::from_str(
            r#"
- identifier: "8369/067"
  locality_name: "Аксарка"
  contact_name: "Гранкина Елена Михайловна"
  phone: "8-909-198-88-42"
- identifier: "   "
- locality_name: "Харп"
"#,
        )
        .expect("parse fallback");
        assert_eq!(fallback.len(), 3);
        let dataset = fallback.to_dataset();
        assert_eq!(dataset.len(), 2);
        let record = dataset.by_identifier("8369067").expect("identifier");
        assert_eq!(record.locality_name(), Some("Аксарка"));
        assert_eq!(dataset.by_locality("ХАРП").len(), 1);
    }
}
