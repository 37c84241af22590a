//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the configured database and bind the controllers to one owner.
//! - Print a one-line summary per collection.
//!
//! Usage: `clientbook_cli <owner-id>`; see `CLIENTBOOK_*` variables below.

use clientbook_core::{
    core_version, init_logging_with, ControllerStatus, CrmSession, IdentityProvider, LogSettings,
    OpportunityStage, OwnerId, SqliteStore,
};
use log::info;
use std::process::ExitCode;
use std::sync::Arc;

const DB_PATH_ENV: &str = "CLIENTBOOK_DB";
const DEFAULT_DB_PATH: &str = "clientbook.sqlite3";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), String> {
    if let Some(settings) = LogSettings::from_env().map_err(|err| err.to_string())? {
        init_logging_with(settings).map_err(|err| err.to_string())?;
    }

    let owner = std::env::args()
        .nth(1)
        .and_then(OwnerId::new)
        .ok_or_else(|| "usage: clientbook_cli <owner-id>".to_string())?;
    let db_path = std::env::var(DB_PATH_ENV).unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

    let store = SqliteStore::open(&db_path).map_err(|err| err.to_string())?;
    let session = CrmSession::new(Arc::new(store));
    let identity = IdentityProvider::new();
    identity.sign_in(owner);
    session.sync_identity(&identity.current()).await;
    info!("event=cli_run module=cli status=ok");

    println!("clientbook_core version={}", core_version());
    print_status("clients", session.clients().status(), session.clients().last_error());
    println!(
        "clients rows={} companies={}",
        session.clients().len(),
        session.clients().unique_company_count()
    );

    print_status(
        "opportunities",
        session.opportunities().status(),
        session.opportunities().last_error(),
    );
    println!(
        "opportunities rows={} total_value={:.2} won={}",
        session.opportunities().len(),
        session.opportunities().total_value(),
        session.opportunities().count_in_stage(OpportunityStage::Won)
    );

    print_status("tasks", session.tasks().status(), session.tasks().last_error());
    println!(
        "tasks rows={} overdue={}",
        session.tasks().len(),
        session.tasks().overdue().len()
    );

    print_status(
        "interactions",
        session.interactions().status(),
        session.interactions().last_error(),
    );
    println!(
        "interactions rows={} total_minutes={}",
        session.interactions().len(),
        session.interactions().total_duration()
    );
    Ok(())
}

fn print_status(
    name: &str,
    status: ControllerStatus,
    last_error: Option<clientbook_core::ControllerError>,
) {
    if status != ControllerStatus::Ready {
        eprintln!("{name} status={status:?}");
    }
    if let Some(err) = last_error {
        eprintln!("{name} error={err}");
    }
}
