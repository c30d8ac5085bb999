pub mod memory;
pub mod simulated;
pub mod tables;

pub use memory::MemoryAdapter;
pub use simulated::SimulatedStageExecutor;
pub use tables::TablesAdapter;
