//! Non-interactive entry points for scripting.

use clap::Subcommand;
use tracing::error;

use crate::device;
use crate::repl::{App, parser};
use crate::settings::{self, Settings};
use crate::statesync::StateClient;
use crate::statesync::publisher::{self, PublishOutcome};
use crate::store::StateStore;
use crate::todoist::TodoistClient;

#[derive(Debug, Clone, Subcommand)]
pub enum RootCommand {
    /// Run one console command and exit.
    Exec {
        /// The console line, e.g. "done long 3".
        line: String,
    },
    /// Compute and publish the status once, honoring the ownership gate.
    Publish,
    /// Claim the background publisher gate for this device.
    Claim,
}

fn updated_by() -> String {
    format!("taskdeck@{}", device::device_label())
}

pub fn run(command: RootCommand, store: StateStore, settings: Settings) -> i32 {
    match execute(command, store, settings) {
        Ok(code) => code,
        Err(err) => {
            error!("command failed: {err:#}");
            eprintln!("error: {err:#}");
            1
        }
    }
}

fn execute(command: RootCommand, store: StateStore, settings: Settings) -> anyhow::Result<i32> {
    match command {
        RootCommand::Exec { line } => {
            let parsed = match parser::parse(&line) {
                Ok(parsed) => parsed,
                Err(message) => {
                    eprintln!("{message}");
                    return Ok(2);
                }
            };
            let client =
                TodoistClient::new(settings.todoist_base_url.clone(), settings::todoist_token()?);
            let mut app = App::new(client, store, settings);
            app.dispatch(parsed)?;
            Ok(0)
        }
        RootCommand::Publish => {
            let tasks_client =
                TodoistClient::new(settings.todoist_base_url.clone(), settings::todoist_token()?);
            let state_client = StateClient::new(
                settings.state_service_url(),
                settings::state_token()?,
                settings.publish_max_attempts,
            );
            let outcome = publisher::publish_once(
                &tasks_client,
                &state_client,
                &store,
                &settings,
                &device::device_id(),
                &updated_by(),
            )?;
            match outcome {
                PublishOutcome::Published(report) => {
                    println!(
                        "published: up_to_date={} reason={}",
                        report.up_to_date,
                        report.reason.as_str()
                    );
                    Ok(0)
                }
                PublishOutcome::SkippedNotOwner { owner } => {
                    println!(
                        "skipped (owner_mismatch); current owner: {}",
                        owner.as_deref().unwrap_or("nobody")
                    );
                    Ok(3)
                }
                PublishOutcome::DroppedStaleEtag => {
                    println!("dropped: the state kept changing under us");
                    Ok(4)
                }
            }
        }
        RootCommand::Claim => {
            let state_client = StateClient::new(
                settings.state_service_url(),
                settings::state_token()?,
                settings.publish_max_attempts,
            );
            publisher::claim_ownership(
                &state_client,
                &device::device_id(),
                &device::device_label(),
                &updated_by(),
            )?;
            println!("claimed the publisher gate for {}", device::device_label());
            Ok(0)
        }
    }
}
