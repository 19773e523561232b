//! portier command line: run the gateway, or chat against a running one.

use std::io::Write;

use {
    anyhow::Result,
    clap::{Parser, Subcommand},
};

use portier_client::{ChatRequest, ContinuityStore, GatewayClient, TurnUpdate, run_turn};

#[derive(Parser, Debug)]
#[command(version, about = "Guest-assistant streaming gateway")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the gateway server.
    Serve {
        /// Address to bind, overriding config.
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on, overriding config.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Send one turn and render the streamed answer.
    Chat {
        /// Gateway base URL.
        #[arg(long, default_value = "http://127.0.0.1:8484", env = "PORTIER_URL")]
        url: String,

        /// Room identifier attached to the turn.
        #[arg(long)]
        room: Option<String>,

        /// Forget the stored conversation context before sending.
        #[arg(long)]
        reset: bool,

        /// The message to send.
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { bind, port } => {
            let mut config = portier_config::discover_and_load();
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            portier_gateway::start(config).await
        },
        Command::Chat {
            url,
            room,
            reset,
            message,
        } => chat(url, room, reset, message).await,
    }
}

async fn chat(url: String, room: Option<String>, reset: bool, message: String) -> Result<()> {
    let store = ContinuityStore::open_default();
    if reset {
        store.clear();
    }

    let client = GatewayClient::new(url);
    let request = ChatRequest {
        message,
        room_id: room,
        ..Default::default()
    };

    let mut out = std::io::stdout();
    let summary = run_turn(&client, &store, request, |update| match update {
        TurnUpdate::Progress(text) => {
            // Redraw the in-progress answer on one line.
            let _ = write!(out, "\r\x1b[2K{text}");
            let _ = out.flush();
        },
        TurnUpdate::Finalized(answer) => {
            let _ = write!(out, "\r\x1b[2K");
            let _ = writeln!(out, "{}", answer.answer_text);
            for source in &answer.sources {
                let _ = writeln!(out, "  source: {source}");
            }
            for image in &answer.images {
                let _ = writeln!(out, "  image: {image}");
            }
        },
        TurnUpdate::Completed(_) => {},
        TurnUpdate::Failed(message) => {
            let _ = writeln!(out);
            eprintln!("error: {message}");
        },
        TurnUpdate::Warning(message) => {
            eprintln!("warning: {message}");
        },
    })
    .await?;

    if let Some(failure) = summary.failure {
        anyhow::bail!("turn failed: {failure}");
    }
    Ok(())
}
