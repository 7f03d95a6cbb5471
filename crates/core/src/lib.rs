pub mod config;
pub mod input;
pub mod orchestrator;
pub mod queue;
pub mod resolver;
pub mod testing;
pub mod worker;

pub use config::{
    load_config, load_config_from_str, load_default_config, validate_config, Config,
    ConfigError, LogFormat, UnreadablePolicy, WaitStrategy,
};
pub use input::{open_sources, InputError, InputSource, OpenedSources};
pub use orchestrator::{Orchestrator, OrchestratorError, RunReport, ShutdownHandle};
pub use queue::{PushError, QueueError, QueueStats, Status, WorkQueue};
pub use resolver::{AddressFamily, ResolveError, Resolver, SystemResolver};
pub use worker::{format_record, OutputSink};
