use clap::Parser;
use colored::*;
use palaver::controller::{RunRequest, StreamController, StreamPhase};
use palaver::identity::{EnvIdentity, IdentityOracle};
use palaver::session::SessionStore;
use palaver::types::{ContentPart, Role, SessionId, Transcript, TurnStatus};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Agent backend base URL. Falls back to PALAVER_BACKEND_URL.
    #[arg(long)]
    backend_url: Option<String>,
    /// Message to send as the user turn.
    #[arg(long)]
    message: String,
    /// Existing session id to continue; a new one is created otherwise.
    #[arg(long)]
    session: Option<String>,
    /// Named agent on the backend, if it routes by agent.
    #[arg(long)]
    agent: Option<String>,
    /// Flat-file session store path.
    #[arg(long, default_value = "palaver_sessions.json")]
    session_file: String,
    /// Directory for rolling log files; stderr only when omitted.
    #[arg(long)]
    log_dir: Option<std::path::PathBuf>,
    #[arg(long, default_value_t = 120)]
    request_timeout_secs: u64,
    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let _log_guard = palaver::logging::init_tracing(args.log_dir.as_deref());
    palaver::logging::setup_panic_hook();

    match run(args).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e.inner);
            eprintln!("{} {}", "error:".red().bold(), e.inner);
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> palaver::types::Result<()> {
    let backend_url = match args
        .backend_url
        .or_else(|| std::env::var(palaver::constants::ENV_BACKEND_URL).ok())
    {
        Some(u) => u,
        None => {
            return Err(palaver::types::PalaverError::Lifecycle(
                "no backend URL; pass --backend-url or set PALAVER_BACKEND_URL".into(),
            )
            .into())
        }
    };

    let identity = EnvIdentity;
    if identity.current_user().is_none() {
        return Err(palaver::types::PalaverError::Forbidden(format!(
            "set {} to identify yourself",
            palaver::constants::ENV_USER_ID
        ))
        .into());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.request_timeout_secs))
        .connect_timeout(Duration::from_secs(args.connect_timeout_secs))
        .build()?;

    let store = SessionStore::new(&args.session_file);
    let session_id = match args.session {
        Some(s) => SessionId(s),
        None => SessionId::generate(),
    };
    let transcript = match store.load(&session_id).await? {
        Some(t) => t,
        None => Transcript::new(),
    };

    let (mut controller, _snapshots) = StreamController::new(transcript);
    let cancel = controller.cancel_token();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received; cancelling stream");
            cancel.cancel();
        }
    });

    let request = RunRequest {
        session_id: session_id.clone(),
        message: args.message,
        agent: args.agent,
    };

    let result = controller
        .start(&client, &backend_url, &request, &identity)
        .await;
    let phase = controller.phase();
    let transcript = controller.into_transcript();

    // Whatever streamed stays visible and persisted, even on failure.
    if phase.is_terminal() {
        store.save(&session_id, &transcript).await?;
    }

    render_transcript(&transcript);
    println!();
    match phase {
        StreamPhase::Completed => {}
        StreamPhase::Cancelled => println!("{}", "[stopped]".yellow()),
        other => println!("{} ({:?})", "[stream did not complete]".red(), other),
    }
    println!("session: {}", session_id.to_string().dimmed());

    result
}

fn render_transcript(transcript: &Transcript) {
    for turn in transcript.turns() {
        let label = match turn.role {
            Role::User => "you".cyan().bold(),
            Role::Assistant => "assistant".green().bold(),
        };
        println!("{}:", label);
        for part in &turn.parts {
            match part {
                ContentPart::Text { content } => println!("{}", content),
                ContentPart::ToolCall {
                    name,
                    arguments,
                    result,
                    ..
                } => {
                    println!("{} {}({})", "tool".magenta(), name, arguments.dimmed());
                    if let Some(r) = result {
                        println!("  {} {}", "->".magenta(), r);
                    }
                }
                ContentPart::Media { kind, url, .. } => {
                    let loc = url.as_deref().unwrap_or("<inline>");
                    println!("{} {:?}: {}", "media".blue(), kind, loc);
                }
            }
        }
        if turn.status == TurnStatus::Errored {
            if let Some(failure) = &turn.failure {
                println!("{} {}", "!".red().bold(), failure.message.red());
            }
        }
    }
}
