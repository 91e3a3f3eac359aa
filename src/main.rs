//! term-embed: headless host for terminal sessions.
//!
//! Lists saved connections, or opens a remote/local session on a surface and
//! forwards each stdin line to it while printing its output.
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use term_embed::catalog::ConnectionCatalog;
use term_embed::config::{ConfigLoader, init_logging};
use term_embed::part::PartLoader;
use term_embed::service::{RemoteTarget, SessionManager, SessionRegistry};
use term_embed::surface::Surface;

/// Embed terminal sessions and drive them from the command line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List saved connections by folder
    List,
    /// Open a saved connection
    Connect {
        /// Connection label
        label: String,
    },
    /// Open an ad-hoc ssh session
    Ssh {
        /// Destination as USER@HOST
        destination: String,
        #[arg(short, long, default_value_t = 22)]
        port: u16,
        /// Private key file
        #[arg(short = 'i', long)]
        identity: Option<String>,
        /// Command to type once connected
        #[arg(short = 'c', long)]
        command: Option<String>,
    },
    /// Open a local shell
    Local {
        /// Shell to start instead of the default
        shell: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load_config(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let _log_guard = init_logging(&config.logging, cli.debug);

    let catalog = ConnectionCatalog::new(config.connections.clone());
    let part = config.terminal.part.clone();
    let manager = SessionManager::new(
        SessionRegistry::new(),
        PartLoader::with_defaults(),
        config.terminal,
    );

    let window = Surface::new();
    let surface = match cli.command {
        Command::List => {
            print_catalog(&catalog);
            return Ok(());
        }
        Command::Connect { label } => {
            let connection = catalog
                .find(&label)
                .ok_or_else(|| anyhow!("No connection labelled {:?}", label))?;
            manager.open_connection(connection, Some(&window))
        }
        Command::Ssh {
            destination,
            port,
            identity,
            command,
        } => {
            let Some((user, host)) = destination.split_once('@') else {
                bail!("Destination must look like USER@HOST, got {:?}", destination);
            };
            let mut target = RemoteTarget::new(user, host, port);
            target.key_path = identity;
            target.initial_command = command;
            manager.create_remote_session(&target, Some(&window))
        }
        Command::Local { shell } => manager.create_local_session(shell.as_deref(), Some(&window)),
    }
    .ok_or_else(|| anyhow!("Terminal part {:?} is not available", part))?;

    run_session(&manager, &surface).await?;

    window.destroy();
    info!("Session closed");
    Ok(())
}

fn print_catalog(catalog: &ConnectionCatalog) {
    if catalog.is_empty() {
        println!("No saved connections");
        return;
    }
    for (folder, connections) in catalog.folders() {
        println!("{}", folder);
        for connection in connections {
            println!(
                "  {:<20} {}:{}",
                connection.label,
                connection.destination(),
                connection.port
            );
        }
    }
}

/// Pump stdin lines into the session and its output to stdout until the
/// program exits, stdin closes or Ctrl+C is pressed
async fn run_session(manager: &SessionManager, surface: &Rc<Surface>) -> anyhow::Result<()> {
    let id = surface.id();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut poll = tokio::time::interval(Duration::from_millis(20));
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => manager.send_input(id, Some(&line)),
                    None => stdin_open = false,
                }
            }
            _ = poll.tick() => {
                if let Some(output) = manager.read_output(id) {
                    if !output.is_empty() {
                        stdout.write_all(&output).await?;
                        stdout.flush().await?;
                    }
                }
                if !manager.is_running(id) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, closing session");
                break;
            }
        }
    }

    Ok(())
}
