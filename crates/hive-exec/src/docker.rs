use std::time::Duration;

use async_trait::async_trait;
use hive_core::{ContainerInfo, ContainerRuntime, RuntimeError};
use hive_model::{Job, JobId};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    config::DockerConfig,
    error::{ExecError, ExecResult},
    util::{cmd_program, run_captured},
};

/// [`ContainerRuntime`] shelling out to the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    cfg: DockerConfig,
}

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Deserialize)]
struct PsEntry {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "State", default)]
    state: String,
}

impl DockerRuntime {
    pub fn new(cfg: DockerConfig) -> ExecResult<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &DockerConfig {
        &self.cfg
    }

    /// Deterministic container name: `<prefix>-<name>-<version>[-<hash prefix>]`.
    pub fn container_name(&self, job_id: &JobId) -> String {
        let mut name = format!("{}-{}-{}", self.cfg.name_prefix, job_id.name(), job_id.version());
        if !job_id.is_partial() {
            let hash = job_id.hash();
            name.push('-');
            name.push_str(&hash[..hash.len().min(12)]);
        }
        sanitize_name(&name)
    }

    fn label_filter(&self, job_id: &JobId) -> String {
        format!("label={}={}", self.cfg.label, job_id)
    }

    fn global_args(&self) -> Vec<String> {
        match &self.cfg.host {
            Some(host) => vec!["-H".to_string(), host.clone()],
            None => Vec::new(),
        }
    }

    pub(crate) fn find_args(&self, job_id: &JobId) -> Vec<String> {
        let filter = self.label_filter(job_id);
        let mut args = self.global_args();
        args.extend(
            [
                "ps",
                "-a",
                "--no-trunc",
                "--filter",
                filter.as_str(),
                "--format",
                "{{json .}}",
            ]
            .map(String::from),
        );
        args
    }

    pub(crate) fn create_args(&self, job_id: &JobId, job: &Job) -> Vec<String> {
        let mut args = self.global_args();
        args.push("create".into());
        args.push("--name".into());
        args.push(self.container_name(job_id));
        args.push("--label".into());
        args.push(format!("{}={}", self.cfg.label, job_id));
        for (key, value) in &job.env {
            args.push("--env".into());
            args.push(format!("{key}={value}"));
        }
        for mapping in job.ports.values() {
            let container = format!("{}/{}", mapping.internal_port, mapping.protocol.as_str());
            args.push("--publish".into());
            args.push(match mapping.external_port {
                Some(external) => format!("{external}:{container}"),
                None => container,
            });
        }
        args.push(job.image.clone());
        args.extend(job.command.iter().cloned());
        args
    }

    async fn docker<I, S>(&self, args: I) -> ExecResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = cmd_program(&self.cfg.binary, self.global_args());
        cmd.args(args);
        run_captured(cmd).await
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    fn name(&self) -> &'static str {
        "docker"
    }

    #[instrument(level = "debug", skip(self), fields(job = %job_id))]
    async fn find(&self, job_id: &JobId) -> Result<Option<ContainerInfo>, RuntimeError> {
        let cmd = cmd_program(&self.cfg.binary, self.find_args(job_id));
        let out = run_captured(cmd).await.map_err(runtime_error)?;
        parse_ps(&out).map_err(runtime_error)
    }

    #[instrument(level = "debug", skip(self))]
    async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        self.docker(["pull", "--quiet", image])
            .await
            .map(|_| ())
            .map_err(|e| pull_error(image, e))
    }

    #[instrument(level = "debug", skip(self, job), fields(job = %job_id))]
    async fn create(&self, job_id: &JobId, job: &Job) -> Result<String, RuntimeError> {
        let cmd = cmd_program(&self.cfg.binary, self.create_args(job_id, job));
        let id = run_captured(cmd).await.map_err(runtime_error)?;
        if id.is_empty() {
            return Err(RuntimeError::Command("docker create printed no id".into()));
        }
        debug!(container = %id, "container created");
        Ok(id)
    }

    async fn start(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.docker(["start", container_id])
            .await
            .map(|_| ())
            .map_err(runtime_error)
    }

    async fn wait(&self, container_id: &str) -> Result<i64, RuntimeError> {
        let out = self
            .docker(["wait", container_id])
            .await
            .map_err(runtime_error)?;
        out.lines()
            .last()
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| RuntimeError::Command(format!("docker wait printed {out:?}")))
    }

    async fn stop(&self, container_id: &str, grace: Duration) -> Result<(), RuntimeError> {
        let secs = grace.as_secs().to_string();
        self.docker(["stop", "-t", secs.as_str(), container_id])
            .await
            .map(|_| ())
            .map_err(runtime_error)
    }

    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.docker(["rm", container_id])
            .await
            .map(|_| ())
            .map_err(runtime_error)
    }
}

/// Docker allows `[a-zA-Z0-9][a-zA-Z0-9_.-]*`.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Newest container first, as `docker ps` lists them.
fn parse_ps(out: &str) -> ExecResult<Option<ContainerInfo>> {
    let Some(line) = out.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return Ok(None);
    };
    let entry: PsEntry =
        serde_json::from_str(line).map_err(|e| ExecError::Parse(format!("{e}: {line}")))?;
    Ok(Some(ContainerInfo::new(entry.id, entry.state == "running")))
}

fn runtime_error(e: ExecError) -> RuntimeError {
    let stderr = e.stderr();
    match &e {
        ExecError::Spawn(_) => RuntimeError::Unavailable(e.to_string()),
        _ if stderr.contains("Cannot connect to the Docker daemon") => {
            RuntimeError::Unavailable(stderr.to_string())
        }
        _ if stderr.contains("No such container") => {
            RuntimeError::ContainerNotFound(stderr.to_string())
        }
        _ => RuntimeError::Command(e.to_string()),
    }
}

fn pull_error(image: &str, e: ExecError) -> RuntimeError {
    let stderr = e.stderr().to_ascii_lowercase();
    let missing = ["not found", "no such image", "manifest unknown", "pull access denied"];
    if missing.iter().any(|m| stderr.contains(m)) {
        return RuntimeError::ImageNotFound(image.to_string());
    }
    match runtime_error(e) {
        RuntimeError::Command(msg) => RuntimeError::ImagePull(msg),
        other => other,
    }
}
