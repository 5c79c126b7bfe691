use std::io::{BufRead, Write};

use clap::Parser;

use screenpilot::agent::transcript::SessionTranscript;
use screenpilot::agent::Agent;
use screenpilot::computer::local::LocalComputer;
use screenpilot::computer::scaler::Scaler;
use screenpilot::config::{ServiceEndpoint, Settings, VirtualResolution};
use screenpilot::errors::{ScreenPilotError, ScreenPilotResult};
use screenpilot::service::client::HttpPlannerClient;
use screenpilot::service::types::Usage;

/// Drive the desktop from a vision-capable action-planning model.
#[derive(Debug, Parser)]
#[command(name = "screenpilot", version, about)]
struct Cli {
    /// Initial task instructions.
    #[arg(long, default_value = "Open web browser and go to microsoft.com.")]
    instructions: String,

    /// Planning model identifier.
    #[arg(long, default_value = "computer-use-preview")]
    model: String,

    /// Service endpoint kind: "azure" or "openai".
    #[arg(long, default_value = "azure")]
    endpoint: String,

    /// Environment tag advertised to the planner.
    #[arg(long, default_value = "linux")]
    environment: String,

    /// Virtual resolution the planner reasons in, as WxH.
    #[arg(long, default_value = "1024x768")]
    resolution: String,

    /// Execute actions without pausing for confirmation.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    autoplay: bool,

    /// Acknowledge safety checks without asking. Logged loudly.
    #[arg(long = "no-safety")]
    no_safety: bool,

    /// Print token usage per exchange.
    #[arg(long)]
    log_tokens: bool,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "screenpilot=debug" } else { "screenpilot=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();
}

/// Read one trimmed line from stdin, printing `label` first. Runs on the
/// blocking pool so the runtime keeps draining timers while we wait.
async fn prompt(label: &str) -> ScreenPilotResult<String> {
    let label = label.to_string();
    tokio::task::spawn_blocking(move || -> ScreenPilotResult<String> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{label}")?;
        stdout.flush()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    })
    .await
    .map_err(|e| ScreenPilotError::Io(std::io::Error::other(e)))?
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    init_tracing(cli.debug);

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "fatal");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> ScreenPilotResult<()> {
    let settings = Settings {
        model: cli.model,
        endpoint: ServiceEndpoint::from_env(&cli.endpoint)?,
        environment: cli.environment,
        resolution: cli.resolution.parse::<VirtualResolution>()?,
        autoplay: cli.autoplay,
        bypass_safety_checks: cli.no_safety,
        log_tokens: cli.log_tokens,
    };

    // The scaler fixes its transform against the native display once, before
    // any task starts; a degenerate display fails here.
    let computer = Scaler::new(LocalComputer::new(), settings.resolution).await?;
    let planner = HttpPlannerClient::new(&settings);
    let transcript = SessionTranscript::new();
    tracing::debug!(session = %transcript.session_id, "session transcript ready");
    let mut agent = Agent::new(planner, computer, settings.bypass_safety_checks)
        .with_transcript(transcript);

    let mut user_input = cli.instructions;
    println!("User: {user_input}");
    agent.start_task();

    let mut session_tokens: u64 = 0;

    loop {
        if user_input.is_empty() && agent.requires_user_input() {
            println!();
            user_input = prompt("User: ").await?;
        }

        match agent.continue_task(&user_input).await {
            Ok(()) => user_input.clear(),
            Err(ScreenPilotError::Service(msg)) => {
                // Retriable: task state is unchanged, so the same input can
                // be submitted again.
                tracing::warn!(error = %msg, "planning service failed");
                prompt("Press Enter to retry...").await?;
                continue;
            }
            Err(other) => return Err(other),
        }

        if settings.log_tokens {
            if let Some(tokens) = agent
                .response()
                .and_then(|r| r.usage.as_ref())
                .and_then(Usage::total)
            {
                session_tokens += tokens;
                println!("[tokens] exchange: {tokens} | session: {session_tokens}");
            }
        }

        if agent.requires_consent() && !settings.autoplay {
            println!();
            for check in agent.pending_safety_checks() {
                println!("Safety check [{}]: {}", check.code, check.message);
            }
            prompt("Press Enter to acknowledge and continue...").await?;
        }

        if !agent.reasoning_summary().is_empty() {
            println!();
            println!("Action: {}", agent.reasoning_summary());
        }
        for (name, args) in agent.actions() {
            println!("  {name} {args}");
        }
        if !agent.messages().is_empty() {
            println!();
            println!("Agent: {}", agent.messages().join(""));
        }
    }
}
