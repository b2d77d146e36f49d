use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::process;
use tokio_util::sync::CancellationToken;

use rangescan::{
    api::{self, ApiReply},
    config::{ProgressMode, ScanConfig},
    output::{self, OutputConfig, OutputFormat, OutputManager},
    scanner::{ScanAggregator, ScanEngine, ScanStatus},
    utils::port_parser::PortPolicy,
};

fn build_cli() -> Command {
    let config_arg = Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("TOML config file (default: ~/.rangescan.toml)")
        .global(true);

    Command::new("rangescan")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Incremental TCP reachability scanner for IPv4 address ranges")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(config_arg)
        .subcommand(
            Command::new("scan")
                .about("Scan a range chunk by chunk and print the results")
                .arg(Arg::new("start").value_name("START_IP").required(true).index(1))
                .arg(Arg::new("end").value_name("END_IP").required(true).index(2))
                .arg(
                    Arg::new("ports")
                        .short('p')
                        .long("ports")
                        .value_name("PORTS")
                        .help("Comma separated ports, e.g. 22,80,443")
                        .required(true),
                )
                .arg(
                    Arg::new("chunk-size")
                        .long("chunk-size")
                        .value_name("ADDRESSES")
                        .help("Addresses per chunk")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("timeout")
                        .short('t')
                        .long("timeout")
                        .value_name("MS")
                        .help("Connect timeout in milliseconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .value_name("N")
                        .help("Connects and lookups in flight per chunk")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("strict-ports")
                        .long("strict-ports")
                        .help("Fail on port tokens that are not integers instead of skipping them")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("no-resolve")
                        .long("no-resolve")
                        .help("Skip reverse DNS lookups")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("no-range-limit")
                        .long("no-range-limit")
                        .help("Accept ranges of any size")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("progress-mode")
                        .long("progress-mode")
                        .value_name("MODE")
                        .help("Progress metric: probes or addresses")
                        .value_parser(clap::value_parser!(ProgressMode)),
                )
                .arg(
                    Arg::new("output-format")
                        .short('o')
                        .long("output-format")
                        .value_name("FORMAT")
                        .help("text, json or csv")
                        .default_value("text")
                        .value_parser(clap::value_parser!(OutputFormat)),
                )
                .arg(
                    Arg::new("output-file")
                        .long("output-file")
                        .value_name("FILE")
                        .help("Write results to FILE instead of stdout"),
                )
                .arg(
                    Arg::new("csv")
                        .long("csv")
                        .value_name("DIR")
                        .help("Also save a timestamped CSV export in DIR (default: current directory)")
                        .num_args(0..=1)
                        .default_missing_value("."),
                )
                .arg(
                    Arg::new("show-closed")
                        .long("show-closed")
                        .help("List closed ports in text output")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("no-color")
                        .long("no-color")
                        .help("Disable colored output")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("chunk").about("Read a chunk request (JSON) from stdin, answer on stdout"))
        .subcommand(Command::new("progress").about("Read a progress query (JSON) from stdin, answer on stdout"))
        .subcommand(Command::new("export").about("Read an export request (JSON) from stdin, write CSV to stdout"))
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<ScanConfig> {
    match matches.get_one::<String>("config") {
        Some(path) => ScanConfig::from_toml_file(path).with_context(|| format!("loading {}", path)),
        None => Ok(ScanConfig::load_default_config()),
    }
}

fn apply_scan_flags(mut config: ScanConfig, matches: &ArgMatches) -> ScanConfig {
    if let Some(&chunk_size) = matches.get_one::<usize>("chunk-size") {
        config = config.with_chunk_size(chunk_size);
    }
    if let Some(&timeout) = matches.get_one::<u64>("timeout") {
        config = config.with_timeout(timeout);
    }
    if let Some(&concurrency) = matches.get_one::<usize>("concurrency") {
        config = config.with_concurrency(concurrency);
    }
    if let Some(&mode) = matches.get_one::<ProgressMode>("progress-mode") {
        config = config.with_progress_mode(mode);
    }
    if matches.get_flag("strict-ports") {
        config = config.with_port_policy(PortPolicy::Strict);
    }
    if matches.get_flag("no-resolve") {
        config = config.with_resolve_names(false);
    }
    if matches.get_flag("no-range-limit") {
        config = config.with_max_range(None);
    }
    config
}

async fn run_scan(config: ScanConfig, matches: &ArgMatches) -> anyhow::Result<()> {
    let engine = ScanEngine::new(config.clone())?;

    let start = matches.get_one::<String>("start").map(String::as_str).unwrap_or_default();
    let end = matches.get_one::<String>("end").map(String::as_str).unwrap_or_default();
    let ports = matches.get_one::<String>("ports").map(String::as_str).unwrap_or_default();
    let session = engine.open_session(start, end, ports)?;

    if !session.ports().discarded().is_empty() {
        eprintln!(
            "{} ignoring port tokens: {}",
            "[!]".bright_yellow(),
            session.ports().discarded().join(", ")
        );
    }

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        eprintln!("\n{}", "Scan stopped by user".bright_yellow());
        cancel_on_signal.cancel();
    });

    let mut aggregator = ScanAggregator::new(session, &config);
    let (_, total) = aggregator.progress().completed_and_total();
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let status = aggregator
        .run(&engine, &cancel, |_, progress| {
            let (completed, _) = progress.completed_and_total();
            pb.set_position(completed);
            pb.set_message(format!(
                "{:.0}% | {} open | {:.0} probes/s",
                progress.percentage(),
                progress.open_found,
                progress.current_rate()
            ));
        })
        .await?;
    pb.finish_and_clear();

    if status == ScanStatus::Cancelled {
        eprintln!(
            "{} partial results: {} of {} addresses",
            "[~]".bright_blue(),
            aggregator.session().addresses_processed(),
            aggregator.session().total_address_count()
        );
    }

    let results = aggregator.into_results();
    if results.is_empty() {
        println!("{}", "No results found".bright_yellow());
        return Ok(());
    }

    let manager = OutputManager::new(OutputConfig {
        format: matches.get_one::<OutputFormat>("output-format").copied().unwrap_or(OutputFormat::Text),
        file: matches.get_one::<String>("output-file").cloned(),
        colored: !matches.get_flag("no-color"),
        show_closed: matches.get_flag("show-closed"),
    });
    manager.write_results(&results)?;

    if let Some(dir) = matches.get_one::<String>("csv") {
        let export = output::export_csv(results.as_slice())?;
        let path = export.save_in(dir).with_context(|| format!("writing export into {}", dir))?;
        eprintln!("{} saved {}", "[✓]".bright_green(), path.display());
    }

    Ok(())
}

fn read_stdin() -> anyhow::Result<String> {
    let mut body = String::new();
    io::stdin().read_to_string(&mut body).context("reading request from stdin")?;
    Ok(body)
}

async fn run_request(config: ScanConfig) -> anyhow::Result<bool> {
    let engine = ScanEngine::new(config)?;
    let body = read_stdin()?;

    let mut stdout = io::stdout().lock();
    let ok = match api::handle_json(&engine, &body).await {
        ApiReply::Json(response) => {
            let failed = matches!(response, api::ApiResponse::Error(_));
            serde_json::to_writer(&mut stdout, &response)?;
            writeln!(stdout)?;
            !failed
        }
        ApiReply::Csv(export) => {
            eprintln!("Content-Type: {}", export.mime_type);
            eprintln!("Content-Disposition: attachment; filename=\"{}\"", export.filename);
            stdout.write_all(&export.bytes)?;
            true
        }
    };
    stdout.flush()?;
    Ok(ok)
}

async fn run(matches: &ArgMatches) -> anyhow::Result<bool> {
    let config = load_config(matches)?;
    match matches.subcommand() {
        Some(("scan", sub)) => run_scan(apply_scan_flags(config, sub), sub).await.map(|_| true),
        Some(("chunk", _)) | Some(("progress", _)) | Some(("export", _)) => run_request(config).await,
        _ => Ok(true),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let matches = build_cli().get_matches();

    match run(&matches).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "[!] ERROR:".bright_red(), e);
            process::exit(1);
        }
    }
}
