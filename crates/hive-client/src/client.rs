use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use hive_model::{
    CreateJobResponse, Deployment, HostDeregisterResponse, HostStatus, Job, JobDeleteResponse,
    JobDeployResponse, JobId, JobStatus, JobUndeployResponse, SetGoalResponse, TaskStatusEvents,
    VersionResponse,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

use crate::{config::ClientConfig, error::ClientError};

pub const CLIENT_VERSION_HEADER: &str = "Hive-Client-Version";
pub const SERVER_VERSION_HEADER: &str = "Hive-Server-Version";
pub const VERSION_STATUS_HEADER: &str = "Hive-Version-Status";
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

const OK: u16 = 200;
const BAD_REQUEST: u16 = 400;
const FORBIDDEN: u16 = 403;
const NOT_FOUND: u16 = 404;
const BAD_METHOD: u16 = 405;

/// Client for the master's HTTP API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MasterClient {
    http: reqwest::Client,
    base: Url,
    user: String,
    version_warned: Arc<AtomicBool>,
}

/// Status and body of a finished request.
struct Reply {
    method: Method,
    url: Url,
    status: u16,
    body: Vec<u8>,
}

impl MasterClient {
    pub fn new(cfg: ClientConfig) -> Result<Self, ClientError> {
        cfg.validate()?;
        let http = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            http,
            base: cfg.base_url()?,
            user: cfg.user,
            version_warned: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.base
    }

    #[instrument(level = "debug", skip(self, job), fields(job = %job.name))]
    pub async fn create_job(&self, job: &Job) -> Result<Option<CreateJobResponse>, ClientError> {
        let url = self.url(&["jobs", ""], &[])?;
        let reply = self.send(Method::POST, url, Some(job)).await?;
        decode(reply, &[OK, BAD_REQUEST])
    }

    pub async fn job(&self, id: &JobId) -> Result<Option<Job>, ClientError> {
        let url = self.url(&["jobs", &id.to_string()], &[])?;
        decode(self.get(url).await?, &[OK])
    }

    /// All jobs, or the ones matching `query` (name or `name:version` prefix).
    pub async fn jobs(&self, query: Option<&str>) -> Result<HashMap<JobId, Job>, ClientError> {
        let params: Vec<_> = query.map(|q| ("q", q)).into_iter().collect();
        let url = self.url(&["jobs"], &params)?;
        Ok(decode(self.get(url).await?, &[OK])?.unwrap_or_default())
    }

    pub async fn job_status(&self, id: &JobId) -> Result<Option<JobStatus>, ClientError> {
        let url = self.url(&["jobs", &id.to_string(), "status"], &[])?;
        decode(self.get(url).await?, &[OK])
    }

    /// Status history of a job. An unknown job answers with
    /// [`TaskStatusEventsStatus::JobIdNotFound`](hive_model::TaskStatusEventsStatus).
    pub async fn job_history(&self, id: &JobId) -> Result<TaskStatusEvents, ClientError> {
        let url = self.url(&["history", "jobs", &id.to_string()], &[])?;
        decode_required(self.get(url).await?, &[OK, NOT_FOUND])
    }

    /// Aggregated status of several jobs in one request. Jobs the master does not know are
    /// missing from the result.
    pub async fn job_statuses(
        &self,
        ids: &HashSet<JobId>,
    ) -> Result<HashMap<JobId, JobStatus>, ClientError> {
        let url = self.url(&["jobs", "statuses"], &[])?;
        let reply = self.send(Method::POST, url, Some(ids)).await?;
        decode_required(reply, &[OK])
    }

    #[instrument(level = "debug", skip(self, token), fields(job = %id))]
    pub async fn delete_job(
        &self,
        id: &JobId,
        token: &str,
    ) -> Result<JobDeleteResponse, ClientError> {
        let url = self.url(&["jobs", &id.to_string()], &[("token", token)])?;
        let reply = self.send(Method::DELETE, url, None::<&()>).await?;
        decode_required(reply, &[OK, NOT_FOUND, BAD_REQUEST, FORBIDDEN])
    }

    #[instrument(level = "debug", skip(self, token), fields(job = %deployment.job_id))]
    pub async fn deploy(
        &self,
        deployment: &Deployment,
        host: &str,
        token: &str,
    ) -> Result<JobDeployResponse, ClientError> {
        let url = self.host_job_url(host, &deployment.job_id, token)?;
        let reply = self.send(Method::PUT, url, Some(deployment)).await?;
        decode_required(reply, &[OK, NOT_FOUND, BAD_METHOD, BAD_REQUEST, FORBIDDEN])
    }

    #[instrument(level = "debug", skip(self, token), fields(job = %deployment.job_id))]
    pub async fn set_goal(
        &self,
        deployment: &Deployment,
        host: &str,
        token: &str,
    ) -> Result<SetGoalResponse, ClientError> {
        let url = self.host_job_url(host, &deployment.job_id, token)?;
        let reply = self.send(Method::PATCH, url, Some(deployment)).await?;
        decode_required(reply, &[OK, NOT_FOUND, FORBIDDEN])
    }

    #[instrument(level = "debug", skip(self, token), fields(job = %id))]
    pub async fn undeploy(
        &self,
        id: &JobId,
        host: &str,
        token: &str,
    ) -> Result<JobUndeployResponse, ClientError> {
        let url = self.host_job_url(host, id, token)?;
        let reply = self.send(Method::DELETE, url, None::<&()>).await?;
        decode_required(reply, &[OK, NOT_FOUND, BAD_REQUEST, FORBIDDEN])
    }

    pub async fn deployment(
        &self,
        host: &str,
        id: &JobId,
    ) -> Result<Option<Deployment>, ClientError> {
        let url = self.url(&["hosts", host, "jobs", &id.to_string()], &[])?;
        decode(self.get(url).await?, &[OK])
    }

    pub async fn host_status(&self, host: &str) -> Result<Option<HostStatus>, ClientError> {
        self.host_status_with(host, &[]).await
    }

    /// [`host_status`](Self::host_status) with extra query parameters passed to the master.
    pub async fn host_status_with(
        &self,
        host: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<HostStatus>, ClientError> {
        let url = self.url(&["hosts", host, "status"], query)?;
        decode(self.get(url).await?, &[OK])
    }

    /// Status of several hosts in one request, keyed by host name. Unknown hosts are missing
    /// from the result.
    pub async fn host_statuses(
        &self,
        hosts: &[String],
    ) -> Result<HashMap<String, HostStatus>, ClientError> {
        self.host_statuses_with(hosts, &[]).await
    }

    pub async fn host_statuses_with(
        &self,
        hosts: &[String],
        query: &[(&str, &str)],
    ) -> Result<HashMap<String, HostStatus>, ClientError> {
        let url = self.url(&["hosts", "statuses"], query)?;
        let reply = self.send(Method::POST, url, Some(hosts)).await?;
        decode_required(reply, &[OK])
    }

    pub async fn list_hosts(&self) -> Result<Vec<String>, ClientError> {
        let url = self.url(&["hosts", ""], &[])?;
        Ok(decode(self.get(url).await?, &[OK])?.unwrap_or_default())
    }

    pub async fn list_masters(&self) -> Result<Vec<String>, ClientError> {
        let url = self.url(&["masters", ""], &[])?;
        Ok(decode(self.get(url).await?, &[OK])?.unwrap_or_default())
    }

    /// Register `host` under `id`. Returns the raw HTTP status; the master answers `409` when
    /// the name is taken by a different id.
    #[instrument(level = "debug", skip(self))]
    pub async fn register_host(&self, host: &str, id: &str) -> Result<u16, ClientError> {
        let url = self.url(&["hosts", host], &[("id", id)])?;
        let reply = self.send(Method::PUT, url, None::<&()>).await?;
        Ok(reply.status)
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn deregister_host(&self, host: &str) -> Result<HostDeregisterResponse, ClientError> {
        let url = self.url(&["hosts", host], &[])?;
        let reply = self.send(Method::DELETE, url, None::<&()>).await?;
        decode_required(reply, &[OK, NOT_FOUND])
    }

    /// Client and master versions. Never fails: an unreachable or failing master is described
    /// in [`VersionResponse::master`].
    pub async fn version(&self) -> VersionResponse {
        let master = match self.url(&["version", ""], &[]) {
            Ok(url) => match self.get(url).await {
                Ok(reply) if reply.status == OK => serde_json::from_slice::<String>(&reply.body)
                    .unwrap_or_else(|_| "Master replied with a malformed version".to_string()),
                Ok(reply) => format!("Master replied with error code {}", reply.status),
                Err(e) => {
                    debug!(error = %e, "version request failed");
                    "Unable to connect to master".to_string()
                }
            },
            Err(e) => e.to_string(),
        };
        VersionResponse {
            client: CLIENT_VERSION.to_string(),
            master,
        }
    }

    fn host_job_url(&self, host: &str, id: &JobId, token: &str) -> Result<Url, ClientError> {
        self.url(&["hosts", host, "jobs", &id.to_string()], &[("token", token)])
    }

    /// Base URL plus percent-encoded path segments, the `user` parameter and `query`.
    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidEndpoint {
                endpoint: self.base.to_string(),
                reason: "cannot be a base".into(),
            })?
            .pop_if_empty()
            .extend(segments);
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("user", &self.user);
        }
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Reply, ClientError> {
        self.send(Method::GET, url, None::<&()>).await
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Reply, ClientError> {
        let mut request: RequestBuilder = self
            .http
            .request(method.clone(), url.clone())
            .header(CLIENT_VERSION_HEADER, CLIENT_VERSION);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        self.check_version_status(&response);
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        debug!(%method, %url, status, "master replied");
        Ok(Reply {
            method,
            url,
            status,
            body,
        })
    }

    fn check_version_status(&self, response: &Response) {
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let Some(status) = header(VERSION_STATUS_HEADER) else {
            debug!("master sent no version status");
            return;
        };
        if status == "MAYBE" && !self.version_warned.swap(true, Ordering::Relaxed) {
            warn!(
                client = CLIENT_VERSION,
                server = header(SERVER_VERSION_HEADER).as_deref().unwrap_or("unknown"),
                "client version is ahead of the master; this will probably work, but upgrade the master if in doubt"
            );
        }
    }
}

/// Decode a reply whose status is in `decodable`; a 404 outside the set means "not there".
fn decode<T: DeserializeOwned>(reply: Reply, decodable: &[u16]) -> Result<Option<T>, ClientError> {
    if reply.status == NOT_FOUND && !decodable.contains(&NOT_FOUND) {
        return Ok(None);
    }
    if !decodable.contains(&reply.status) {
        return Err(unexpected(&reply));
    }
    let malformed = |reason: String| ClientError::Malformed {
        url: reply.url.to_string(),
        reason,
    };
    if reply.body.is_empty() {
        let status = StatusCode::from_u16(reply.status)
            .map(|s| s.to_string())
            .unwrap_or_else(|_| reply.status.to_string());
        return Err(malformed(format!("empty body with status {status}")));
    }
    serde_json::from_slice(&reply.body)
        .map(Some)
        .map_err(|e| malformed(e.to_string()))
}

/// [`decode`] for operations that always expect a body: a 404 outside `decodable` is an error.
fn decode_required<T: DeserializeOwned>(reply: Reply, decodable: &[u16]) -> Result<T, ClientError> {
    if !decodable.contains(&reply.status) {
        return Err(unexpected(&reply));
    }
    let url = reply.url.to_string();
    decode(reply, decodable)?.ok_or_else(|| ClientError::Malformed {
        url,
        reason: "missing body".into(),
    })
}

fn unexpected(reply: &Reply) -> ClientError {
    ClientError::UnexpectedStatus {
        method: reply.method.to_string(),
        url: reply.url.to_string(),
        status: reply.status,
    }
}
