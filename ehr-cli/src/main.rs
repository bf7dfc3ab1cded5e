//! EHR consent bridge CLI
//!
//! Usage:
//!   ehr request  --doctor dr1 --patient pt1    - Doctor asks for access
//!   ehr accept   --patient pt1 --doctor dr1    - Patient grants access
//!   ehr revoke   --patient pt1 --doctor dr1    - Patient withdraws access
//!   ehr view     --doctor dr1 --patient pt1    - Ledger-gated read
//!   ehr verify   --patient pt1                 - Integrity check
//!   ehr demo                                   - Full lifecycle on an in-memory ledger

use clap::{Parser, Subcommand};
use ehr_core::logging::LogLevel;
use std::path::PathBuf;

mod commands;
mod logging;

use logging::{LogConfig, LogFormat};

#[derive(Parser)]
#[command(name = "ehr")]
#[command(about = "Consent-gated EHR access over a permissioned ledger")]
#[command(version)]
pub struct Cli {
    /// Store directory (defaults to EHR_STORE_PATH, in-memory when unset)
    #[arg(long, env = "EHR_STORE_PATH")]
    store: Option<PathBuf>,

    /// Membership organization of the acting identity
    #[arg(long, env = "EHR_ORG_ID", default_value = "Org1MSP")]
    org: String,

    /// Log verbosity
    #[arg(long, env = "EHR_LOG_LEVEL", default_value = "warn")]
    log_level: LogLevel,

    /// Log output format
    #[arg(long, value_enum, env = "EHR_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Doctor requests access to a patient's record
    Request {
        #[arg(short, long)]
        doctor: String,
        #[arg(short, long)]
        patient: String,
    },

    /// Patient accepts a pending request
    Accept {
        #[arg(short, long)]
        patient: String,
        #[arg(short, long)]
        doctor: String,
    },

    /// Patient rejects a pending request
    Reject {
        #[arg(short, long)]
        patient: String,
        #[arg(short, long)]
        doctor: String,
    },

    /// Patient revokes granted access
    Revoke {
        #[arg(short, long)]
        patient: String,
        #[arg(short, long)]
        doctor: String,
    },

    /// Patient re-grants previously revoked access
    Activate {
        #[arg(short, long)]
        patient: String,
        #[arg(short, long)]
        doctor: String,
    },

    /// Doctor reads a patient's document
    View {
        #[arg(short, long)]
        doctor: String,
        #[arg(short, long)]
        patient: String,
    },

    /// Doctor replaces a patient's document with the JSON in FILE
    Update {
        #[arg(short, long)]
        doctor: String,
        #[arg(short, long)]
        patient: String,
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Store a patient's own document from the JSON in FILE
    AddDocument {
        #[arg(short, long)]
        patient: String,
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Check the stored document against the ledger's latest hash
    Verify {
        #[arg(short, long)]
        patient: String,
    },

    /// Rewrite the local status of a pair from the ledger
    Reconcile {
        #[arg(short, long)]
        patient: String,
        #[arg(short, long)]
        doctor: String,
    },

    /// Requests awaiting the patient's answer
    Pending {
        #[arg(short, long)]
        patient: String,
    },

    /// Doctors with active access to the patient's record
    Active {
        #[arg(short, long)]
        patient: String,
    },

    /// Doctors whose access the patient revoked
    Revoked {
        #[arg(short, long)]
        patient: String,
    },

    /// Patients the doctor may currently read
    Patients {
        #[arg(short, long)]
        doctor: String,
    },

    /// Ledger events for a patient, or for one pair when a doctor is given
    History {
        #[arg(short, long)]
        patient: String,
        #[arg(short, long)]
        doctor: Option<String>,
    },

    /// Run the full consent lifecycle against an in-memory ledger
    Demo,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig {
        level: cli.log_level,
        format: cli.log_format,
        filter: std::env::var("RUST_LOG").ok(),
        ..LogConfig::default()
    };
    if let Err(e) = logging::init_logging(&log_config) {
        eprintln!("Error: failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = commands::run_command(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_accept() {
        let cli = Cli::try_parse_from([
            "ehr", "--org", "Org2MSP", "accept", "--patient", "pt1", "--doctor", "dr1",
        ])
        .unwrap();
        assert_eq!(cli.org, "Org2MSP");
        assert!(matches!(
            cli.command,
            Commands::Accept { ref patient, ref doctor } if patient == "pt1" && doctor == "dr1"
        ));
    }

    #[test]
    fn test_history_doctor_is_optional() {
        let cli = Cli::try_parse_from(["ehr", "history", "-p", "pt1"]).unwrap();
        assert!(matches!(cli.command, Commands::History { doctor: None, .. }));
    }
}
