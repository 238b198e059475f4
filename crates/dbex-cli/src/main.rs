use clap::Parser;
use color_eyre::Result;
use dbex_core::{
    to_json_response, CancelToken, CommandStatus, ExecutionOutcome, ExportRequest, Settings,
};
use serde_json::Value;

mod cli;

use cli::DbexCli;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = DbexCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let cancel = CancelToken::new();
    let handler = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || handler.cancel()) {
        tracing::warn!("can't install interrupt handler: {err}");
    }

    let settings = Settings::from_env();
    let request = build_request(&cli);
    let outcome = match dbex_core::export(&settings, &request, &cancel) {
        Ok(outcome) => outcome,
        Err(err) if err.is_user_error() => {
            ExecutionOutcome::user_error(err.to_string(), Value::Null)
        }
        Err(err) => ExecutionOutcome::failure(err.to_string(), Value::Null),
    };
    let code = emit_output(&cli, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("dbex_core={level},dbex_cli={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn build_request(cli: &DbexCli) -> ExportRequest {
    ExportRequest {
        directory: cli.directory.clone(),
        services: cli.services.clone(),
        listing: cli.listing.clone(),
        match_substring: cli.match_substring.clone(),
        match_regex: cli.match_regex.clone(),
        exclude_regex: cli.exclude_regex.clone(),
        incremental: cli.incremental,
        updated_since: cli.updated_since.clone(),
        native_import: cli.native_import,
        no_format: cli.no_format,
    }
}

fn emit_output(cli: &DbexCli, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = match outcome.status {
        CommandStatus::Ok => 0,
        CommandStatus::UserError => 1,
        CommandStatus::Failure => 2,
    };

    if cli.json {
        let payload = to_json_response(outcome, code);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if code == 0 {
        if !cli.quiet {
            println!("{}", outcome.message);
        }
    } else {
        eprintln!("error: {}", outcome.message);
    }

    Ok(code)
}
