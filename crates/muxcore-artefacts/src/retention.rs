//! Retention policy: independent of runs, per spec §4.7 and §9 (Open
//! Question: "retention ... defers the policy choice to configuration").

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long artefacts are kept before they become eligible for deletion.
///
/// Enforcement is a separate, explicit sweep ([`crate::store::ArtefactStore::enforce_retention`]);
/// artefacts are never deleted as a side effect of a run reaching a
/// terminal status, since citations and steps keep identifiers, not
/// copies, and may outlive the run that produced them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Artefacts older than this are eligible for deletion. `None` means
    /// keep forever.
    #[serde(default, with = "duration_ms_opt")]
    pub max_age: Option<Duration>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { max_age: None }
    }
}

mod duration_ms_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
