use anyhow::Context;
use clap::Parser;

use harness::report::{self, REPORT_FILE_NAME};
use runner::args::ReportArgs;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = ReportArgs::parse();
    let output = args
        .output
        .unwrap_or_else(|| args.log_dir.join(REPORT_FILE_NAME));

    let rows = report::generate(&args.log_dir, &output)
        .with_context(|| format!("Report generation from {} failed", args.log_dir.display()))?;

    log::info!("Rendered {rows} log entries");
    println!("Report written to {}", output.display());
    Ok(())
}
