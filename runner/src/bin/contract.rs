use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tabled::Table;

use harness::auth::Credentials;
use harness::context::RunSummary;
use harness::metrics::MetricsReport;
use harness::request::RequestClient;
use runner::args::Args;
use runner::cases;
use runner::run::{CaseOutcome, Run};
use runner::table::EndpointTableEntry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let transport = harness::https_client();
    let client = RequestClient::with_transport(
        transport.clone(),
        args.base_url.to_string(),
        Duration::from_millis(args.timeout_ms),
    );
    let mut run = Run::new(client, &args.log_dir);

    println!("Running contract cases against {} ...", &args.base_url);

    let credentials = Credentials::new(args.client_id.clone(), args.client_secret.clone());
    run.setup(&transport, &args.auth_url.to_string(), &credentials)
        .await?;

    let (cases, excluded) = cases::select(
        cases::catalogue(run.context.test_data()),
        args.filter.as_deref(),
    );
    for case in &excluded {
        run.skip(case);
    }

    let pbar = progress_bar(cases.len() as u64)?;
    let mut outcomes = Vec::with_capacity(cases.len());
    for case in &cases {
        pbar.set_message(case.id);
        outcomes.push(run.execute(case).await);
        pbar.inc(1);
    }
    pbar.finish_and_clear();

    let (summary, report) = run.teardown();

    print_failures(&outcomes);
    print_summary(&summary);
    let data = calc_tabular_data(&report);
    print_details(&data);

    if let Some(output_file) = &args.output_file {
        write_csv(output_file, &data)?;
    }
    if let Some(path) = &args.metrics_json {
        let json = serde_json::to_string_pretty(&report).context("Failed to encode metrics")?;
        fs::write(path, json).with_context(|| format!("Could not write {}", path.display()))?;
    }
    if run.logger.write_failures() > 0 {
        log::warn!(
            "{} log lines could not be written to {}",
            run.logger.write_failures(),
            run.logger.path().display()
        );
    }

    if summary.execution.failed_tests > 0 {
        bail!("{} contract case(s) failed", summary.execution.failed_tests);
    }
    Ok(())
}

fn progress_bar(len: u64) -> anyhow::Result<ProgressBar> {
    let pbar = ProgressBar::new(len);
    pbar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .context("Invalid progress template")?
        .progress_chars("#>-"),
    );
    pbar.enable_steady_tick(Duration::from_millis(100));
    Ok(pbar)
}

fn print_failures(outcomes: &[CaseOutcome]) {
    for outcome in outcomes.iter().filter(|o| !o.passed) {
        println!(
            "FAILED {} ({}ms): {}",
            outcome.id,
            outcome.duration_ms,
            outcome.message.as_deref().unwrap_or("")
        );
    }
}

fn print_summary(summary: &RunSummary) {
    let RunSummary {
        execution,
        total_time_ms,
        total_tests,
        success_rate,
    } = summary;

    println!(
        "Ran {} cases in {}ms",
        total_tests,
        total_time_ms.unwrap_or_default()
    );
    println!(
        "Passed {} ({} failed, {} skipped), success rate {}.",
        execution.passed_tests, execution.failed_tests, execution.skipped_tests, success_rate
    );
}

fn calc_tabular_data(report: &MetricsReport) -> Vec<EndpointTableEntry> {
    report
        .endpoint_metrics
        .iter()
        .map(EndpointTableEntry::new)
        .collect()
}

fn print_details(data: &Vec<EndpointTableEntry>) {
    let t = Table::new(data).to_string();
    println!("{}", t);
}

fn write_csv(path: &PathBuf, data: &Vec<EndpointTableEntry>) -> anyhow::Result<()> {
    println!("Saving endpoint metrics to {}", path.to_str().context("Wrong path")?);

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .context("File already exists")?;
    let mut wtr = csv::Writer::from_writer(file);
    for entry in data {
        wtr.serialize(entry).context("Failed to write csv file")?;
    }
    wtr.flush().context("Failed to flush csv file")?;
    Ok(())
}
