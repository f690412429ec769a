//! chordfind: editor-driven code search daemon.
//!
//! Usage:
//!   chordfind serve [projects.json]       # Start the search server
//!   chordfind chord <proj:lang:elem> <x>  # Send a chord, print the answer
//!   chordfind regex <proj:scope> <re>     # Regex search
//!   chordfind func [--project p] <name>   # Go definition, default project
//!   chordfind text [--where n] <words>..  # Literal search in one location
//!   chordfind projects                    # List the server's projects

use chordfind::chord;
use chordfind::client::Client;
use anyhow::Context;
use chordfind::config::{default_config_path, ConfigStore, Project, ProjectSet};
use chordfind::fmt::fmt_response;
use chordfind::protocol::Request;
use chordfind::server::{Server, ServerConfig, DEFAULT_PORT};
use chordfind::services::{CommandOpener, GrepConfig, NoopOpener, Opener};
use chordfind::Action;
use clap::{Args, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chordfind")]
#[command(about = "Editor-driven code search: chords in, file:line out")]
#[command(version)]
struct Cli {
    /// Server host
    #[arg(long, global = true, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(long, global = true, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[command(subcommand)]
    command: Commands,
}

/// Project a client command targets.
#[derive(Args)]
struct ProjectArg {
    /// Project name (default: the server's first project)
    #[arg(long)]
    project: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the search server
    Serve {
        /// Projects file (default: <config dir>/chordfind/projects.json)
        config: Option<PathBuf>,

        /// Searches allowed to run at the same time
        #[arg(long, default_value = "1")]
        max_searches: usize,

        /// Maximum matching lines per regex search (0 = unlimited)
        #[arg(long, default_value = "10000")]
        max_matches: usize,

        /// Command run with the resolved path:line appended
        #[arg(long, default_value = "plumb -s chordfind -d edit")]
        opener: String,

        /// Seconds the opener may run before it is killed
        #[arg(long, default_value = "10")]
        open_timeout: u64,

        /// Do not forward resolved paths to the opener
        #[arg(long)]
        no_open: bool,
    },

    /// Translate a chord and send it
    Chord {
        /// Chord, e.g. camli:go:func, camli:all or camli:loc:/src/x
        chord: String,
        /// Target under the cursor
        target: String,
    },

    /// Regex search over a scope
    Regex {
        /// Scope: proj:all, proj:<language> or proj:loc:<path>
        scope: String,
        pattern: String,
    },

    /// Find a go function definition
    Func {
        #[command(flatten)]
        project: ProjectArg,
        name: String,
    },

    /// Find a go method definition
    Method {
        #[command(flatten)]
        project: ProjectArg,
        name: String,
    },

    /// Find a go type definition
    Type {
        #[command(flatten)]
        project: ProjectArg,
        name: String,
    },

    /// Open a go package directory from an import path
    Pkg {
        #[command(flatten)]
        project: ProjectArg,
        import: String,
    },

    /// Search for literal text in one location of a project
    Text {
        #[command(flatten)]
        project: ProjectArg,
        /// Location number within the project, 0 being the first
        #[arg(long = "where", default_value_t = 0)]
        location: usize,
        /// Words of the text, joined with spaces
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Open a file by (partial) name
    File {
        /// Scope: proj:all, proj:<language> or proj:loc:<path>
        scope: String,
        name: String,
    },

    /// List the server's projects
    Projects,

    /// Make the server re-read its projects file
    Reload,

    /// Cancel the server's in-flight searches
    Kill,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Log to stderr only (stdout carries results)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("chordfind=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let addr = format!("{}:{}", cli.host, cli.port);
    let client = Client::new(&addr);

    let request = match cli.command {
        Commands::Serve {
            config,
            max_searches,
            max_matches,
            opener,
            open_timeout,
            no_open,
        } => {
            let config = config.unwrap_or_else(default_config_path);
            let config = dunce::canonicalize(&config).unwrap_or(config);
            let opener: Arc<dyn Opener> = if no_open {
                Arc::new(NoopOpener)
            } else {
                let argv: Vec<&str> = opener.split_whitespace().collect();
                match CommandOpener::new(&argv) {
                    Some(o) => Arc::new(o.with_timeout(Duration::from_secs(open_timeout))),
                    None => Arc::new(NoopOpener),
                }
            };
            let server_config = ServerConfig {
                max_concurrent_searches: max_searches,
                grep: GrepConfig {
                    max_matches,
                    ..GrepConfig::default()
                },
                ..ServerConfig::default()
            };
            return run_server(&addr, config, server_config, opener).await;
        }
        Commands::Chord { chord, target } => chord::translate(&chord, &target)?,
        Commands::Regex { scope, pattern } => Request::new(Action::Regex, scope, pattern),
        Commands::Func { project, name } => {
            go_request(&client, &project, Action::GoFunction, name).await?
        }
        Commands::Method { project, name } => {
            go_request(&client, &project, Action::GoMethod, name).await?
        }
        Commands::Type { project, name } => {
            go_request(&client, &project, Action::GoType, name).await?
        }
        Commands::Pkg { project, import } => {
            go_request(&client, &project, Action::GoPackage, import).await?
        }
        Commands::Text {
            project,
            location,
            words,
        } => {
            let project = pick_project(&client, project.project.as_deref()).await?;
            chord::text_search(&project, location, &words.join(" "))?
        }
        Commands::File { scope, name } => Request::new(Action::File, scope, name),
        Commands::Projects => Request::control(Action::ListProjects),
        Commands::Reload => Request::control(Action::Reload),
        Commands::Kill => Request::control(Action::Kill),
    };

    run_client(&client, &request).await
}

/// The named project, or the server's first one.
async fn pick_project(client: &Client, name: Option<&str>) -> anyhow::Result<Project> {
    let projects = ProjectSet::from_projects(client.projects().await?)?;
    let project = match name {
        Some(name) => projects
            .get(name)
            .with_context(|| format!("the server has no project named {name}"))?,
        None => projects.first().context("the server has no projects")?,
    };
    Ok(project.clone())
}

async fn go_request(
    client: &Client,
    project: &ProjectArg,
    action: Action,
    target: String,
) -> anyhow::Result<Request> {
    let project = pick_project(client, project.project.as_deref()).await?;
    Ok(Request::new(action, format!("{}:go", project.name), target))
}

async fn run_server(
    addr: &str,
    config: PathBuf,
    server_config: ServerConfig,
    opener: Arc<dyn Opener>,
) -> anyhow::Result<()> {
    tracing::info!("Starting server with projects from {}", config.display());

    let store = ConfigStore::open(config)?;
    let server = Server::new(store, server_config, opener);
    let listener = Server::bind(addr).await?;

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    server.serve(listener, shutdown).await;
    Ok(())
}

async fn run_client(client: &Client, request: &Request) -> anyhow::Result<()> {
    let response = client.send(request).await?;

    let color = std::io::stdout().is_terminal();
    fmt_response(
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
        &response,
        color,
    )?;

    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}
