use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Env, JobId, ModelError};

/// Transport protocol of a published port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// A container port and, optionally, the host port it is published on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub internal_port: u16,
    /// `None` lets the runtime pick a free host port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_port: Option<u16>,
    #[serde(default)]
    pub protocol: Protocol,
}

impl PortMapping {
    pub fn new(internal_port: u16) -> Self {
        Self {
            internal_port,
            external_port: None,
            protocol: Protocol::Tcp,
        }
    }

    pub fn with_external(mut self, port: u16) -> Self {
        self.external_port = Some(port);
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }
}

/// Job specification: what container to run and how.
///
/// Jobs are immutable once published; any change to the content produces a new [`JobId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub name: String,
    pub version: String,
    /// Container image (e.g. `"nginx:1.25"`, `"registry.local/app:17"`).
    pub image: String,
    /// Entrypoint override followed by its arguments. Empty keeps the image default.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: Env,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ports: BTreeMap<String, PortMapping>,
}

impl Job {
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> JobBuilder {
        JobBuilder {
            job: Job {
                name: name.into(),
                version: version.into(),
                image: String::new(),
                command: Vec::new(),
                env: Env::new(),
                ports: BTreeMap::new(),
            },
        }
    }

    /// Content-derived identifier: `name:version:sha256(canonical json)`.
    pub fn id(&self) -> JobId {
        JobId::new(&self.name, &self.version, self.content_hash())
    }

    fn content_hash(&self) -> String {
        // Field order is fixed by the struct and every map is a BTreeMap,
        // so the encoding is canonical. Serializing plain data cannot fail.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    /// Checks the fields the runtime cannot do without.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::InvalidJob("name is empty".into()));
        }
        if self.version.trim().is_empty() {
            return Err(ModelError::InvalidJob("version is empty".into()));
        }
        if self.name.contains(':') || self.version.contains(':') {
            return Err(ModelError::InvalidJob(
                "name and version must not contain ':'".into(),
            ));
        }
        if self.image.trim().is_empty() {
            return Err(ModelError::InvalidJob("image is empty".into()));
        }
        Ok(())
    }
}

pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.job.image = image.into();
        self
    }

    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.job.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.job.env.insert(key.into(), value.into());
        self
    }

    pub fn port(mut self, name: impl Into<String>, mapping: PortMapping) -> Self {
        self.job.ports.insert(name.into(), mapping);
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foo() -> Job {
        Job::builder("foo", "17")
            .image("foo:4711")
            .command(["foo", "foo"])
            .build()
    }

    #[test]
    fn id_is_deterministic_for_equal_content() {
        assert_eq!(foo().id(), foo().id());
        assert_eq!(foo().id().name(), "foo");
        assert_eq!(foo().id().version(), "17");
        assert_eq!(foo().id().hash().len(), 64);
    }

    #[test]
    fn id_changes_with_content() {
        let other = Job::builder("foo", "17")
            .image("foo:4712")
            .command(["foo", "foo"])
            .build();
        assert_ne!(foo().id(), other.id());

        let with_env = Job::builder("foo", "17")
            .image("foo:4711")
            .command(["foo", "foo"])
            .env("A", "1")
            .build();
        assert_ne!(foo().id(), with_env.id());
    }

    #[test]
    fn env_insertion_order_does_not_change_id() {
        let a = Job::builder("svc", "1")
            .image("svc:1")
            .env("A", "1")
            .env("B", "2")
            .build();
        let b = Job::builder("svc", "1")
            .image("svc:1")
            .env("B", "2")
            .env("A", "1")
            .build();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn validate_rejects_missing_fields() {
        assert!(foo().validate().is_ok());

        let no_image = Job::builder("foo", "1").build();
        assert!(matches!(no_image.validate(), Err(ModelError::InvalidJob(_))));

        let colon = Job::builder("fo:o", "1").image("x").build();
        assert!(colon.validate().is_err());
    }

    #[test]
    fn serde_skips_empty_collections() {
        let json = serde_json::to_string(&foo()).unwrap();
        assert!(!json.contains("env"));
        assert!(!json.contains("ports"));

        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back, foo());
    }
}
