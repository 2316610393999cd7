//! Deployment logger
//!
//! ```bash
//! log-deploy "Release 1.4"
//! log-deploy --file /srv/gymwatch/deployment-log.json
//! ```

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use gymwatch::audit_log::{DeploymentEntry, JsonArrayLog};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "log-deploy")]
#[command(about = "Record a deployment in the deployment history")]
struct Args {
    /// Deployment note
    message: Option<String>,

    /// Deployment history file
    #[arg(long, env = "DEPLOYMENT_LOG_PATH", default_value = "deployment-log.json")]
    file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let entry = DeploymentEntry::new(args.message, Utc::now());
    let log = JsonArrayLog::new(&args.file);
    log.prepend(serde_json::to_value(&entry)?).await?;

    println!("Deployment logged: {} {}", entry.date.to_rfc3339(), entry.message);
    Ok(())
}
