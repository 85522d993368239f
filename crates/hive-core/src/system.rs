use std::{
    fs,
    path::Path,
    sync::OnceLock,
    time::Instant,
};

use tracing::{debug, warn};

static AGENT_ID: OnceLock<String> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

const AGENT_ID_FILE: &str = "agent-id";

/// Initialize agent start time.
pub fn init_uptime() {
    START_TIME.get_or_init(Instant::now);
}

/// Get agent uptime in seconds.
pub fn uptime_seconds() -> u64 {
    let start = START_TIME.get_or_init(Instant::now);
    start.elapsed().as_secs()
}

#[inline]
pub fn platform() -> &'static str {
    std::env::consts::OS
}

#[inline]
pub fn arch() -> &'static str {
    std::env::consts::ARCH
}

/// Name this host registers under when none is configured.
pub fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Persistent agent id, kept in `<state_dir>/agent-id`.
///
/// The first call decides the id for the whole process. A fresh id is generated and written
/// back when the file is missing; failing to write it only costs stability across restarts.
pub fn agent_id(state_dir: &Path) -> &'static str {
    AGENT_ID.get_or_init(|| load_or_generate_id(state_dir))
}

/// OS distribution from `/etc/os-release` on Linux, else the platform name.
pub fn os_info() -> String {
    #[cfg(target_os = "linux")]
    {
        if let Ok(content) = fs::read_to_string("/etc/os-release")
            && let Some(name) = pretty_name(&content)
        {
            return name;
        }
    }

    platform().to_string()
}

fn pretty_name(os_release: &str) -> Option<String> {
    os_release
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

fn load_or_generate_id(state_dir: &Path) -> String {
    let path = state_dir.join(AGENT_ID_FILE);
    if let Ok(id) = fs::read_to_string(&path) {
        let id = id.trim();
        if !id.is_empty() {
            return id.to_string();
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    let written = fs::create_dir_all(state_dir).and_then(|()| fs::write(&path, &id));
    match written {
        Ok(()) => debug!(path = %path.display(), "generated agent id"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to persist agent id"),
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let id = load_or_generate_id(dir.path());
        assert!(!id.is_empty());
        assert_eq!(load_or_generate_id(dir.path()), id);
    }

    #[test]
    fn existing_id_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(AGENT_ID_FILE), "host-42\n").unwrap();
        assert_eq!(load_or_generate_id(dir.path()), "host-42");
    }

    #[test]
    fn pretty_name_is_unquoted() {
        let content = "NAME=Debian\nPRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\nID=debian\n";
        assert_eq!(
            pretty_name(content).as_deref(),
            Some("Debian GNU/Linux 12 (bookworm)")
        );
        assert_eq!(pretty_name("ID=alpine"), None);
    }

    #[test]
    fn host_name_is_never_empty() {
        assert!(!host_name().is_empty());
        assert!(!platform().is_empty());
    }
}
