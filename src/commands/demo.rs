//! Demo command implementation

use flashraid_core::controller::ControllerConfig;
use flashraid_sim::bench::{self, Check};

/// Run both bring-up check sequences and print each result
pub fn run_demo(sync_stages: usize, switch_guard_cycles: u16) -> Result<(), Box<dyn std::error::Error>> {
    let config = ControllerConfig {
        sync_stages,
        switch_guard_cycles,
    };

    let sequences: [(&str, fn(ControllerConfig) -> flashraid_sim::Result<Vec<Check>>); 2] = [
        ("basic", bench::basic_checks),
        ("host switching", bench::host_switching_checks),
    ];

    let mut failed = 0;
    for (name, run) in sequences {
        log::info!("Running {} checks", name);
        println!("{}:", name);
        for check in run(config)? {
            let status = if check.passed { "PASS" } else { "FAIL" };
            println!("  [{}] {} ({})", status, check.name, check.detail);
            if !check.passed {
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(format!("{} check(s) failed", failed).into());
    }
    println!("All checks passed");
    Ok(())
}
