pub mod assembler;
pub mod compare;
pub mod config;
pub mod device;
pub mod driver;
pub mod export;
pub mod harvester;
pub mod manager;
pub mod orchestrator;
pub mod queue;
pub mod reconciler;
pub mod retire;
pub mod runner;
pub mod scheme;
pub mod tailer;

pub use assembler::{AssembledConfig, AssemblyInput, ConfigAssembler, EngineConfig};
pub use compare::{ComparisonService, ComparisonView};
pub use config::{EngineCommand, LogTailConfig, OrchestratorConfig, LOG_FILE_NAME};
pub use device::{DeviceProbe, DeviceProfile, FixedDeviceProbe, SystemDeviceProbe};
pub use driver::ExecutionDriver;
pub use export::SummaryExporter;
pub use harvester::{Harvest, HarvestedRow, ResultHarvester, RowAttributor};
pub use manager::{TaskDetail, TaskManager, TaskRequest};
pub use orchestrator::Orchestrator;
pub use queue::TaskQueue;
pub use reconciler::Reconciler;
pub use retire::{DatasetRetirer, RetireReport};
pub use runner::TaskRunner;
pub use scheme::SchemeResolver;
pub use tailer::LogTailer;
