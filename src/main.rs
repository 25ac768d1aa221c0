use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use taskdeck::{
    cli::{self, RootCommand},
    device,
    logging::{init_logging, print_log_location},
    repl::{self, App},
    settings::{self, Settings},
    statesync::{StateClient, publisher},
    store::StateStore,
    todoist::TodoistClient,
};

#[derive(Parser, Debug)]
#[command(
    name = "taskdeck",
    about = "Interactive console for a Todoist-compatible task service",
    version = env!("TASKDECK_BUILD_VERSION"),
    author
)]
struct Cli {
    /// Override the state directory.
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Do not run the background status publisher for this session.
    #[arg(long)]
    no_publisher: bool,

    #[command(subcommand)]
    command: Option<RootCommand>,
}

fn main() -> Result<()> {
    let log_path = match init_logging() {
        Ok(path) => Some(path),
        Err(err) => {
            eprintln!("warning: failed to initialize logging: {err}");
            None
        }
    };

    let cli = Cli::parse();
    let settings = Settings::load();
    let store = match cli.state_dir {
        Some(dir) => StateStore::open(dir),
        None => StateStore::open_default(),
    };

    if let Some(command) = cli.command {
        let code = cli::run(command, store, settings);
        std::process::exit(code);
    }

    let token = settings::todoist_token()?;
    let client = TodoistClient::new(settings.todoist_base_url.clone(), token);

    let publisher = if cli.no_publisher {
        None
    } else {
        match settings::state_token() {
            Ok(state_token) => {
                let state_client = StateClient::new(
                    settings.state_service_url(),
                    state_token,
                    settings.publish_max_attempts,
                );
                Some(publisher::spawn_publisher(
                    client.clone(),
                    state_client,
                    store.clone(),
                    settings.clone(),
                    device::device_id(),
                    format!("taskdeck@{}", device::device_label()),
                ))
            }
            Err(_) => {
                info!("no state service token; the status publisher stays off");
                None
            }
        }
    };

    let mut app = App::new(client, store, settings);
    let result = repl::run(&mut app);

    if let Some(handle) = publisher {
        handle.stop();
    }
    if let Some(path) = log_path.as_ref() {
        print_log_location(path);
    }

    result
}
