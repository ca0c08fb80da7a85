use clap::{Parser, Subcommand};
use healthcheck::{HealthReport, Status};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "health-cli")]
#[command(about = "Query a running health check service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the overall status; exit code 0, 1 or 2 for OK, WARNING, CRITICAL
    Status,
    /// List every check with its last result
    Checks,
    /// Print the raw health report
    Report,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    // 429 and 500 still carry a report body.
    let res = client
        .get(format!("{}/health", cli.url.trim_end_matches('/')))
        .send()
        .await?;
    let code = res.status();
    let report: HealthReport = match res.json().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: /health returned status {} without a valid report: {}", code, e);
            return Ok(ExitCode::from(3));
        }
    };

    match cli.command {
        Commands::Status => {
            println!(
                "{} (version {}, up {}s)",
                report.status,
                report.version.version,
                report.uptime / 1000
            );
        }
        Commands::Checks => print_checks(&report),
        Commands::Report => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(ExitCode::from(report.status.severity()))
}

fn print_checks(report: &HealthReport) {
    println!("{:<24} {:<9} {:>5}  {:<25} MESSAGE", "NAME", "STATUS", "CODE", "LAST CHECKED");
    for check in &report.checks {
        let status = check.status.as_ref().map(Status::as_str).unwrap_or("-");
        let last_checked = check
            .last_checked
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<24} {:<9} {:>5}  {:<25} {}",
            check.name, status, check.status_code, last_checked, check.message
        );
    }
}
