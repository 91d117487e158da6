//! courier-agent: scripted DIDComm sender.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config, init logger at the resolved level
//!   3. Build the identity, dispatch and session components
//!   4. Run one session and print a summary

use courier_agent::{
    config,
    did::PeerDid2,
    dispatch::{HttpTransport, MessageDispatcher, PlaintextPacker, SendOutcome},
    error::{self, AppError},
    identity::IdentityService,
    logger,
    prompt::{FixedTarget, StdinPrompt},
    secrets::SecretsStore,
    session::{SessionReport, SessionRunner, SessionState},
};
use tracing::info;

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
    target: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {}", error::chain(&e));
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Optional file.
    let _ = dotenvy::dotenv();

    let cli = parse_cli_args();
    let config = config::load(cli.config_path.as_deref())?;

    match cli.log_level {
        Some(level) => logger::init(level, true)?,
        None => logger::init(&config.log_level, false)?,
    }

    info!(
        agent_name = %config.agent_name,
        work_dir = %config.work_dir.display(),
        secrets_file = %config.secrets_file.display(),
        "config loaded"
    );

    let identity = IdentityService::new(SecretsStore::new(config.secrets_file.clone()), PeerDid2);
    let transport = HttpTransport::new().map_err(|e| AppError::Config(e.to_string()))?;
    let dispatcher = MessageDispatcher::new(PlaintextPacker::new(PeerDid2), transport);
    let runner = SessionRunner::new(identity, dispatcher, config.script())
        .with_agent_name(&config.agent_name);

    let report = match cli.target.or(config.session.target.clone()) {
        Some(target) => runner.run(&mut FixedTarget(target)).await,
        None => runner.run(&mut StdinPrompt).await,
    };

    match &report.state {
        SessionState::Done => {
            print_summary(&report);
            Ok(())
        }
        SessionState::Aborted(reason) => Err(AppError::Aborted(reason.clone())),
        other => Err(AppError::Aborted(format!("session stopped in state {other:?}"))),
    }
}

fn print_summary(report: &SessionReport) {
    let target = report.target.as_deref().unwrap_or("-");
    println!("✓ Sent {} message(s) to {target}", report.sends.len());
    for send in &report.sends {
        match &send.outcome {
            SendOutcome::Delivered { status } => {
                println!("  [{}] {} {} -> {status}", send.index, send.message_id, send.message_type)
            }
            SendOutcome::Failed(e) => println!(
                "  [{}] {} {} -> failed: {}",
                send.index,
                send.message_id,
                send.message_type,
                error::chain(e)
            ),
        }
    }
    if report.failures() > 0 {
        println!("{} of {} sends failed", report.failures(), report.sends.len());
    }
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;
    let mut target = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: courier-agent [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -t, --target <DID>         Target DID (skips the prompt)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => match iter.next() {
                Some(path) => config_path = Some(path),
                None => {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            },
            "-t" | "--target" => match iter.next() {
                Some(did) => target = Some(did),
                None => {
                    eprintln!("error: -t/--target requires a DID argument");
                    std::process::exit(1);
                }
            },
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    CliArgs { log_level: logger::level_for_verbosity(verbosity), config_path, target }
}
