pub mod executor;
pub mod registry;
pub mod simulated;

pub use executor::ToolExecutor;
pub use registry::{Tool, ToolRegistry};
pub use simulated::{CompetitorLookupTool, SimulatedTool, TransientFaults};
