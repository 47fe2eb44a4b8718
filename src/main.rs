//! script2ext CLI binary entry point.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use script2ext::agent::{AgentConverter, ConvertRequest};
use script2ext::cli::{default_output_name, Cli, Commands, ConvertArgs, InspectArgs, Mode};
use script2ext::config::ConverterConfig;
use script2ext::fetch::{fetch_from_greasyfork, is_greasyfork_url};
use script2ext::package::{build_zip, fetch_icon, fetch_requires, PackageInput};
use script2ext::shim::convert_with_shims;
use script2ext::types::{ProgressEvent, ProgressSink, StreamEvent, StreamSink};
use script2ext::userscript::parse_userscript;
use script2ext::util::{download_text, retry::RetryPolicy};
use tokio_util::sync::CancellationToken;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    script2ext::logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Convert(args) => handle_convert(args, cli.config).await,
        Commands::Inspect(args) => handle_inspect(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn read_input(input: &str) -> CliResult<String> {
    if is_greasyfork_url(input) {
        return Ok(fetch_from_greasyfork(input).await?);
    }
    if input.starts_with("http://") || input.starts_with("https://") {
        return Ok(download_text(input, &RetryPolicy::default()).await?);
    }
    Ok(tokio::fs::read_to_string(input).await?)
}

async fn handle_inspect(args: InspectArgs) -> CliResult<()> {
    let script = read_input(&args.input).await?;
    let meta = parse_userscript(&script);
    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}

fn progress_printer() -> ProgressSink {
    Arc::new(|event: ProgressEvent| {
        let round = event.round.map(|r| format!(" #{r}")).unwrap_or_default();
        let first_line = event.content.lines().next().unwrap_or_default();
        eprintln!("[{}{round}] {first_line}", event.step);
    })
}

fn stream_printer() -> StreamSink {
    Arc::new(|event: StreamEvent| {
        let target = event.file_path.as_deref().unwrap_or(&event.tool_name);
        eprint!("\r  … {target}: {} chars", event.content.chars().count());
        let _ = std::io::stderr().flush();
    })
}

async fn handle_convert(args: ConvertArgs, config_path: Option<PathBuf>) -> CliResult<()> {
    let script = read_input(&args.input).await?;
    let meta = parse_userscript(&script);
    for warning in &meta.warnings {
        eprintln!("warning: {warning}");
    }

    let files = match args.mode {
        Mode::Shim => {
            let conversion = convert_with_shims(&script);
            for entry in &conversion.shim_log {
                eprintln!("[shim] {} ({})", entry.api, entry.reason);
            }
            conversion.files
        }
        Mode::Agent => {
            let mut config = ConverterConfig::load(config_path.as_deref())?;
            if let Some(model) = args.model {
                config = config.with_model(model);
            }
            if let Some(max_turns) = args.max_turns {
                config.agent.max_turns = max_turns;
            }
            let converter = AgentConverter::from_config(&config)?;

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let mut request = ConvertRequest::new(script.clone())
                .with_progress(progress_printer())
                .with_cancel(cancel);
            if args.stream {
                request = request.with_stream(stream_printer());
            }

            let result = converter.convert(request).await?;
            for warning in result.check_warnings() {
                eprintln!("warning: {warning}");
            }
            for note in &result.notes {
                eprintln!("note: {note}");
            }
            result.files
        }
    };

    let requires = fetch_requires(&meta.requires, &RetryPolicy::default()).await;
    let icon = match &meta.icon {
        Some(url) => Some(fetch_icon(url, &RetryPolicy::default()).await),
        None => None,
    };
    let package = build_zip(&PackageInput { files, requires, icon })?;

    let out = args.out.unwrap_or_else(|| PathBuf::from(default_output_name(&meta.name)));
    tokio::fs::write(&out, &package.bytes).await?;
    println!("{}", out.display());
    if !package.notes.is_empty() {
        eprintln!("{} manual step(s) listed in NOTES.md", package.notes.len());
    }
    Ok(())
}
