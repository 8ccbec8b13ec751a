//! CLI command implementations

mod demo;
mod regs;
mod run;

pub use demo::run_demo;
pub use regs::print_register_map;
pub use run::run_scenario;
