use std::collections::BTreeMap;

/// A requirement from an external TestLink requirement specification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementRecord {
    /// The requirement document identifier.
    pub doc_id: String,
    /// Title of the requirement specification the requirement belongs to.
    pub req_spec_title: String,
    /// The requirement title.
    pub title: String,
    /// The requirement version.
    pub version: String,
}

/// Requirement records keyed by `doc_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    records: BTreeMap<String, RequirementRecord>,
}

impl Requirements {
    /// Inserts a record, replacing any previous record with the same `doc_id`.
    pub fn insert(&mut self, record: RequirementRecord) {
        self.records.insert(record.doc_id.clone(), record);
    }

    /// Looks up a record by `doc_id`.
    #[must_use]
    pub fn get(&self, doc_id: &str) -> Option<&RequirementRecord> {
        self.records.get(doc_id)
    }

    /// The number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<RequirementRecord> for Requirements {
    fn from_iter<T: IntoIterator<Item = RequirementRecord>>(iter: T) -> Self {
        let mut requirements = Self::default();
        for record in iter {
            requirements.insert(record);
        }
        requirements
    }
}
