pub mod error;
pub use error::{CoreError, RuntimeError, SupervisorError};

pub mod model;
pub use model::{AgentModel, ModelListener, StatusSink};

pub mod state;
pub use state::TaskModel;

pub mod reactor;
pub use reactor::{Reactor, ReactorFactory, TokioReactor, TokioReactorFactory};

pub mod runtime;
pub use runtime::{ContainerInfo, ContainerRuntime};

pub mod supervisor;
pub use supervisor::{
    BackoffStrategy, ContainerSupervisor, ContainerSupervisorFactory, Supervisor,
    SupervisorConfig, SupervisorFactory,
};

pub mod agent;
pub use agent::{Agent, AgentConfig, SupervisorView};

pub mod metrics;
pub use metrics::{AgentMetrics, NoopMetrics, SupervisorAction};

mod system;
pub use system::{agent_id, arch, host_name, init_uptime, os_info, platform, uptime_seconds};
