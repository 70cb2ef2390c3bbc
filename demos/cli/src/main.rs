use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crfdate_core::{CompletionConfig, ImputationRule, PartialDate, ResolvedDate};
use crfdate_records::complete_records_str;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "crfdate-cli",
    about = "Hoàn thiện ngày khuyết (UNK/UN) trên phiếu CRF."
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Giải một ngày khuyết.
    Resolve {
        #[arg(long)]
        day: String,
        #[arg(long)]
        month: String,
        #[arg(long)]
        year: String,
        /// `start` (sớm nhất) hoặc `end` (muộn nhất).
        #[arg(long, default_value = "start")]
        rule: String,
    },
    /// Hoàn thiện ngày cho một file JSON bản ghi.
    Records {
        /// Đường dẫn tới file JSON bản ghi.
        #[arg(short, long)]
        input: PathBuf,
        /// File cấu hình JSON (tùy chọn).
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Args::parse().command {
        Command::Resolve {
            day,
            month,
            year,
            rule,
        } => {
            let rule: ImputationRule = rule.parse()?;
            let resolved = PartialDate::new(day, month, year).resolve(rule);
            println!("{}", describe(&resolved));
        }
        Command::Records {
            input,
            config,
            pretty,
        } => {
            let data = std::fs::read_to_string(&input)
                .with_context(|| format!("Không đọc được file {:?}", input))?;
            let config = load_config(config.as_ref())?;
            let report = complete_records_str(&data, &config)?;

            tracing::info!(
                resolved = report.resolved_count,
                invalid = report.invalid_count,
                "đã xử lý {} bản ghi",
                report.records.len()
            );

            let output = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{output}");
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<CompletionConfig> {
    let Some(path) = path else {
        return Ok(CompletionConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Không đọc được file cấu hình {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Cấu hình không hợp lệ trong {:?}", path))
}

fn describe(resolved: &ResolvedDate) -> String {
    match resolved {
        ResolvedDate::Resolved { date } => date.format("%Y-%m-%d").to_string(),
        ResolvedDate::Invalid { reason } => format!("invalid ({reason})"),
    }
}
