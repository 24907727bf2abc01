//! auth-recovery-sim binary entry point.
//!
//! Usage: auth-recovery-sim --script 401,ok --callers 4 [--auth fail,ok]
//!
//! Every caller replays the same script against one shared coordinator, so
//! concurrent failures converge on a single recovery attempt.

mod script;
mod sim;

use anyhow::{bail, Result};
use auth_recovery::{Collaborators, RecoveryConfig, RecoveryCoordinator, RetryDriver};
use clap::Parser;
use futures_util::future::join_all;
use script::{parse_auth, parse_script};
use sim::{
    answer_prompts, ConsolePresenter, DelayedConnectivity, ScriptedAuthorizer, ScriptedOperation,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Drive the auth-recovery coordinator against scripted API failures.
#[derive(Parser, Debug)]
#[command(name = "auth-recovery-sim")]
#[command(about = "Drive the auth-recovery coordinator against scripted API failures")]
struct Args {
    /// Comma-separated call outcomes: ok, null, timeout, network,
    /// refresh-required, <status> or <status>:<reason>.
    #[arg(long, default_value = "401,ok")]
    script: String,

    /// Comma-separated automatic reauthorization outcomes: ok, fail, hang.
    #[arg(long, default_value = "")]
    auth: String,

    /// Number of concurrent callers sharing the script.
    #[arg(long, default_value = "1")]
    callers: usize,

    /// Accept the manual permission prompt instead of declining it.
    #[arg(long)]
    auto_accept_prompt: bool,

    /// Delay before connectivity is restored after a network failure.
    #[arg(long, default_value = "1000")]
    connectivity_delay_ms: u64,

    /// Reauthorization timeout in milliseconds.
    #[arg(long, env = "AUTH_RECOVERY_TIMEOUT_MS")]
    auth_timeout_ms: Option<u64>,

    /// Automatic attempts before escalating to the prompt.
    #[arg(long, env = "AUTH_RECOVERY_MAX_AUTO_ATTEMPTS")]
    max_auto_attempts: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    observability::init_with_config(observability::LogConfig {
        service_name: "auth-recovery-sim".into(),
        default_level: args.log_level.clone(),
        format: if args.json_logs {
            observability::LogFormat::Json
        } else {
            observability::LogFormat::Compact
        },
        ..Default::default()
    });

    let script = Arc::new(parse_script(&args.script)?);
    let auth = parse_auth(&args.auth)?;

    let mut config = RecoveryConfig::from_env()?;
    if let Some(timeout_ms) = args.auth_timeout_ms {
        config.auth_timeout_ms = timeout_ms;
    }
    if args.max_auto_attempts.is_some() {
        config.max_auto_attempts = args.max_auto_attempts;
    }
    config.validate()?;

    info!(
        callers = args.callers,
        script_len = script.len(),
        auth_timeout_ms = config.auth_timeout_ms,
        max_auto_attempts = ?config.max_auto_attempts,
        "Configuration loaded"
    );

    let (prompt_tx, prompt_rx) = mpsc::unbounded_channel();
    let authorizer = Arc::new(ScriptedAuthorizer::new(auth));
    let coordinator = RecoveryCoordinator::new(
        config,
        Collaborators::new(
            authorizer.clone(),
            Arc::new(ConsolePresenter::new(prompt_tx)),
            Arc::new(DelayedConnectivity::new(Duration::from_millis(
                args.connectivity_delay_ms,
            ))),
        ),
    );
    let prompt_task = tokio::spawn(answer_prompts(
        coordinator.clone(),
        prompt_rx,
        args.auto_accept_prompt,
    ));

    let callers = (0..args.callers).map(|caller| {
        let driver = RetryDriver::for_coordinator(coordinator.clone());
        let operation = ScriptedOperation::new(script.clone());
        async move {
            let result = driver.run(|| operation.call()).await;
            (caller, result, operation.calls())
        }
    });
    let results = join_all(callers).await;

    coordinator.shutdown();
    prompt_task.abort();

    let mut failed = 0;
    for (caller, result, calls) in &results {
        match result {
            Ok(response) => println!("caller {caller}: ok after {calls} call(s): {response}"),
            Err(e) => {
                failed += 1;
                error!(caller = *caller, error = %e, "Caller failed");
                println!("caller {caller}: failed after {calls} call(s): {e}");
            }
        }
    }
    println!(
        "reauthorization calls: {} automatic, {} interactive",
        authorizer.automatic_calls(),
        authorizer.interactive_calls()
    );

    if failed > 0 {
        bail!("{} of {} callers failed", failed, results.len());
    }
    Ok(())
}
