//! Run command implementation

use flashraid_sim::Scenario;
use std::path::Path;

/// Load a scenario, run it on a fresh board and print a summary
pub fn run_scenario(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = Scenario::from_file(path)?;
    log::info!(
        "Loaded {} steps from {}",
        scenario.config().steps.len(),
        path.display()
    );

    let report = scenario.run()?;

    println!(
        "{}: {} steps, {} cycles",
        path.display(),
        report.steps_run,
        report.cycles
    );
    for failure in &report.failures {
        println!("  FAILED {}", failure);
    }

    if !report.passed() {
        println!("{} of {} steps failed", report.failures.len(), report.steps_run);
    }
    report.into_result()?;

    println!("All steps passed");
    Ok(())
}
