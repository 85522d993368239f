use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Job identifier in the form `name:version:hash`.
///
/// The hash part is derived from the job content (see [`crate::Job::id`]).
/// Operator queries may use the short `name:version` form, in which case the hash is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId {
    name: String,
    version: String,
    hash: String,
}

impl JobId {
    pub(crate) fn new(name: &str, version: &str, hash: String) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            hash,
        }
    }

    pub fn parse(s: &str) -> Result<Self, ModelError> {
        let invalid = || ModelError::InvalidJobId(s.to_string());

        let mut parts = s.split(':');
        let name = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
        let version = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
        let hash = match parts.next() {
            Some(h) if !h.is_empty() && h.chars().all(|c| c.is_ascii_hexdigit()) => h,
            Some(_) => return Err(invalid()),
            None => "",
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(name, version, hash.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// `true` for the short `name:version` form.
    pub fn is_partial(&self) -> bool {
        self.hash.is_empty()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hash.is_empty() {
            write!(f, "{}:{}", self.name, self.version)
        } else {
            write!(f, "{}:{}:{}", self.name, self.version, self.hash)
        }
    }
}

impl FromStr for JobId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for JobId {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_and_partial_forms() {
        let full = JobId::parse("foo:17:deadbeef").unwrap();
        assert_eq!(full.name(), "foo");
        assert_eq!(full.version(), "17");
        assert_eq!(full.hash(), "deadbeef");
        assert!(!full.is_partial());
        assert_eq!(full.to_string(), "foo:17:deadbeef");

        let partial: JobId = "foo:17".parse().unwrap();
        assert!(partial.is_partial());
        assert_eq!(partial.to_string(), "foo:17");
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        for bad in ["", "foo", "foo:", ":17", "foo:17:", "foo:17:xyz", "a:b:c0:d"] {
            assert!(
                matches!(JobId::parse(bad), Err(ModelError::InvalidJobId(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn serializes_as_plain_string_and_map_key() {
        let id = JobId::parse("foo:17:ab12").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""foo:17:ab12""#);

        let mut map = std::collections::HashMap::new();
        map.insert(id.clone(), 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"foo:17:ab12":1}"#);

        let back: std::collections::HashMap<JobId, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(&id), Some(&1));
    }

    #[test]
    fn deserialize_rejects_malformed_string() {
        assert!(serde_json::from_str::<JobId>(r#""nope""#).is_err());
    }
}
