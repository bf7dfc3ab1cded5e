//! Command handlers for the CLI

use bridge::{BridgeConfig, Caller, EhrBridge, KeyConfig};
use ehr_core::types::{AccessRequest, EhrDocument, PairKey};
use ehr_store::{open_stores, StoreConfig};
use ledger_gateway::{GatewayConfig, HttpLedgerGateway, LedgerGateway, MockLedgerGateway};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::{Cli, Commands};

type CmdResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Print `value` as JSON, or run `human` for terminal output
fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> CmdResult {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn print_request(request: &AccessRequest) {
    println!("Request {}", request.request_id);
    println!("  Patient: {}", request.patient_id);
    println!("  Doctor: {}", request.doctor_id);
    println!("  Status: {}", request.status);
    println!("  Updated: {}", request.updated_at);
}

fn print_ids(label: &str, ids: &Vec<String>) {
    if ids.is_empty() {
        println!("No {}.", label);
    } else {
        println!("{} ({}):", label, ids.len());
        for id in ids {
            println!("  {}", id);
        }
    }
}

fn read_document(path: &Path) -> Result<EhrDocument, Box<dyn std::error::Error + Send + Sync>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let doc = serde_json::from_str(&raw)
        .map_err(|e| format!("{} is not a valid EHR document: {}", path.display(), e))?;
    Ok(doc)
}

pub async fn run_command(cli: Cli) -> CmdResult {
    if matches!(cli.command, Commands::Demo) {
        return run_demo().await;
    }

    let keys = KeyConfig::from_env();
    if keys.is_development() {
        tracing::warn!("EHR_ENCRYPTION_KEY not set, using the development key provider");
    }
    let store_config = match &cli.store {
        Some(path) => StoreConfig::at(path),
        None => StoreConfig::from_env(),
    };

    let bridge = EhrBridge::new(
        HttpLedgerGateway::from_config(GatewayConfig::from_env()),
        open_stores(&store_config)?,
        keys.codec().await?,
        BridgeConfig::from_env(),
    );

    execute(&bridge, cli.command, &cli.org, cli.json).await
}

/// Run one command against a wired bridge
pub async fn execute<G: LedgerGateway>(
    bridge: &EhrBridge<G>,
    command: Commands,
    org: &str,
    json: bool,
) -> CmdResult {
    match command {
        Commands::Request { doctor, patient } => {
            let request = bridge
                .access()
                .request(&Caller::new(doctor, org), &patient)
                .await?;
            emit(json, &request, print_request)
        }

        Commands::Accept { patient, doctor } => {
            let request = bridge
                .access()
                .accept(&Caller::new(patient, org), &doctor)
                .await?;
            emit(json, &request, print_request)
        }

        Commands::Reject { patient, doctor } => {
            let request = bridge
                .access()
                .reject(&Caller::new(patient, org), &doctor)
                .await?;
            emit(json, &request, print_request)
        }

        Commands::Revoke { patient, doctor } => {
            let request = bridge
                .access()
                .revoke(&Caller::new(patient, org), &doctor)
                .await?;
            emit(json, &request, print_request)
        }

        Commands::Activate { patient, doctor } => {
            let request = bridge
                .access()
                .activate(&Caller::new(patient, org), &doctor)
                .await?;
            emit(json, &request, print_request)
        }

        Commands::View { doctor, patient } => {
            let doc = bridge
                .reconciler()
                .view_document(&Caller::new(doctor, org), &patient)
                .await?;
            // Always JSON: the document has no terser human form.
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }

        Commands::Update {
            doctor,
            patient,
            file,
        } => {
            let doc = read_document(&file)?;
            let hash = bridge
                .reconciler()
                .update_document(&Caller::new(doctor, org), &patient, &doc)
                .await?;
            emit(json, &hash.as_str(), |h| println!("Document updated, hash {}", h))
        }

        Commands::AddDocument { patient, file } => {
            let doc = read_document(&file)?;
            let hash = bridge
                .reconciler()
                .add_document(&Caller::new(patient, org), &doc)
                .await?;
            emit(json, &hash.as_str(), |h| println!("Document stored, hash {}", h))
        }

        Commands::Verify { patient } => {
            let hash = bridge
                .reconciler()
                .verify_integrity(&Caller::new(patient.as_str(), org), &patient)
                .await?;
            emit(json, &hash.as_str(), |h| {
                println!("Integrity verified, ledger and store agree on {}", h)
            })
        }

        Commands::Reconcile { patient, doctor } => {
            let changed = bridge
                .reconciler()
                .reconcile_mirror(
                    &Caller::new(patient.as_str(), org),
                    &PairKey::new(patient.as_str(), doctor.as_str()),
                )
                .await?;
            emit(json, &changed, |c| match c {
                Some(status) => println!("Local status set to {}", status),
                None => println!("Local status already matches the ledger"),
            })
        }

        Commands::Pending { patient } => {
            let pending = bridge.reconciler().pending_requests(&patient).await?;
            emit(json, &pending, |requests| {
                if requests.is_empty() {
                    println!("No pending requests.");
                }
                for request in requests {
                    print_request(request);
                }
            })
        }

        Commands::Active { patient } => {
            let doctors = bridge
                .reconciler()
                .active_doctors(&Caller::new(patient.as_str(), org), &patient)
                .await?;
            emit(json, &doctors, |ids| print_ids("Active doctors", ids))
        }

        Commands::Revoked { patient } => {
            let doctors = bridge
                .reconciler()
                .revoked_doctors(&Caller::new(patient.as_str(), org), &patient)
                .await?;
            emit(json, &doctors, |ids| print_ids("Revoked doctors", ids))
        }

        Commands::Patients { doctor } => {
            let patients = bridge
                .reconciler()
                .doctor_patients(&Caller::new(doctor, org))
                .await?;
            emit(json, &patients, |ids| print_ids("Patients", ids))
        }

        Commands::History { patient, doctor } => {
            let caller = Caller::new(patient.as_str(), org);
            match doctor {
                Some(doctor) => {
                    let pair = PairKey::new(patient.as_str(), doctor.as_str());
                    let events = bridge.reconciler().history(&caller, &pair).await?;
                    emit(json, &events, |events| {
                        for event in events {
                            println!("{}  {:?}  {}", event.timestamp, event.kind, event.hash);
                        }
                    })
                }
                None => {
                    let entries = bridge.reconciler().full_history(&caller, &patient).await?;
                    emit(json, &entries, |entries| {
                        for entry in entries {
                            println!(
                                "{}  {:<8}  {:?}  {}",
                                entry.event.timestamp,
                                entry.doctor_id,
                                entry.event.kind,
                                entry.event.hash
                            );
                        }
                    })
                }
            }
        }

        Commands::Demo => run_demo().await,
    }
}

/// Walk one doctor and one patient through the full lifecycle
async fn run_demo() -> CmdResult {
    const ORG: &str = "Org1MSP";
    let bridge = EhrBridge::new(
        Arc::new(MockLedgerGateway::new()),
        open_stores(&StoreConfig::in_memory())?,
        KeyConfig::default().codec().await?,
        BridgeConfig::default(),
    );
    let doctor = Caller::new("dr1", ORG);
    let patient = Caller::new("pt1", ORG);

    let doc = EhrDocument {
        diagnosis: "Seasonal allergic rhinitis".into(),
        medications: "cetirizine 10mg".into(),
        allergies: "pollen".into(),
        ..EhrDocument::empty()
    };
    let hash = bridge.reconciler().add_document(&patient, &doc).await?;
    println!("[1] Patient stored document, hash {}", hash);

    let request = bridge.access().request(&doctor, "pt1").await?;
    println!("[2] Doctor requested access: {}", request.status);

    let request = bridge.access().accept(&patient, "dr1").await?;
    println!("[3] Patient accepted: {}", request.status);

    let viewed = bridge.reconciler().view_document(&doctor, "pt1").await?;
    println!("[4] Doctor viewed record, diagnosis: {}", viewed.diagnosis);

    let updated = EhrDocument {
        doctor_notes: "Symptoms controlled".into(),
        ..viewed
    };
    let new_hash = bridge
        .reconciler()
        .update_document(&doctor, "pt1", &updated)
        .await?;
    println!("[5] Doctor updated record, hash {}", new_hash);

    let request = bridge.access().revoke(&patient, "dr1").await?;
    println!("[6] Patient revoked: {}", request.status);

    match bridge.reconciler().view_document(&doctor, "pt1").await {
        Ok(_) => return Err("revoked doctor was able to read the record".into()),
        Err(e) => println!("[7] Doctor denied after revoke: {}", e),
    }

    let request = bridge.access().activate(&patient, "dr1").await?;
    println!("[8] Patient re-granted access: {}", request.status);

    let history = bridge.reconciler().full_history(&patient, "pt1").await?;
    println!("[9] Ledger holds {} events for pt1", history.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehr_core::types::AccessStatus;
    use ehr_store::StatusMirror;

    async fn mock_bridge() -> EhrBridge<Arc<MockLedgerGateway>> {
        EhrBridge::new(
            Arc::new(MockLedgerGateway::new()),
            open_stores(&StoreConfig::in_memory()).unwrap(),
            KeyConfig::default().codec().await.unwrap(),
            BridgeConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_demo_runs() {
        run_demo().await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_request_then_accept() {
        let bridge = mock_bridge().await;
        execute(
            &bridge,
            Commands::Request {
                doctor: "dr1".into(),
                patient: "pt1".into(),
            },
            "Org1MSP",
            true,
        )
        .await
        .unwrap();
        execute(
            &bridge,
            Commands::Accept {
                patient: "pt1".into(),
                doctor: "dr1".into(),
            },
            "Org1MSP",
            false,
        )
        .await
        .unwrap();

        let request = bridge
            .mirror()
            .get_request(&PairKey::new("pt1", "dr1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.status, AccessStatus::Accepted);
    }

    #[tokio::test]
    async fn test_execute_add_document_from_file() {
        let bridge = mock_bridge().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, r#"{"diagnosis":"asthma","allergies":"none"}"#).unwrap();

        execute(
            &bridge,
            Commands::AddDocument {
                patient: "pt1".into(),
                file: path,
            },
            "Org1MSP",
            false,
        )
        .await
        .unwrap();

        let doc = bridge.reconciler().patient_document("pt1").await.unwrap();
        assert_eq!(doc.diagnosis, "asthma");
    }

    #[tokio::test]
    async fn test_invalid_document_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "not json").unwrap();
        let err = read_document(&path).unwrap_err();
        assert!(err.to_string().contains("not a valid EHR document"));
    }
}
