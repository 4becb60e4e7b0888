//! Final declaration emitted when a report is signed off.

use crate::consensus::{DiligenceInfo, DiligenceMap, ReportSummary};
use crate::models::{Report, Review, Signature, Transaction, VerdictStatus};
use crate::services::storage::Storage;
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Everything the declaration is rendered from, loaded after the gate opened.
#[derive(Debug, Clone)]
pub struct FinalizationPacket {
    pub report: Report,
    pub summary: ReportSummary,
    pub transactions: Vec<Transaction>,
    pub reviews: Vec<Review>,
    pub diligences: DiligenceMap,
    pub fiscal_signatures: Vec<Signature>,
    pub treasurer_signature: Signature,
}

/// A stored declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedArtifact {
    pub key: String,
    pub url: String,
    /// Hex SHA-256 of the declaration body.
    pub digest: String,
}

#[async_trait]
pub trait FinalizationEmitter: Send + Sync {
    /// Render and store the declaration. Re-emitting for the same report
    /// overwrites the previous artifact.
    async fn emit(&self, packet: &FinalizationPacket) -> anyhow::Result<EmittedArtifact>;

    /// Remove an artifact whose report could not be marked finished.
    async fn discard(&self, artifact: &EmittedArtifact) -> anyhow::Result<()>;
}

pub fn declaration_key(report_id: Uuid) -> String {
    format!("reports/{}/declaration.json", report_id)
}

#[derive(Serialize)]
struct Declaration<'a> {
    report_id: Uuid,
    title: &'a str,
    competence_period: &'a str,
    account_type: &'a str,
    generated_utc: DateTime<Utc>,
    summary: &'a ReportSummary,
    transactions: Vec<DeclaredTransaction<'a>>,
    fiscal_signatures: Vec<DeclaredSignature<'a>>,
    treasurer_signature: DeclaredSignature<'a>,
}

#[derive(Serialize)]
struct DeclaredTransaction<'a> {
    #[serde(flatten)]
    transaction: &'a Transaction,
    verdicts: Vec<DeclaredVerdict<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diligence: Option<&'a DiligenceInfo>,
}

#[derive(Serialize)]
struct DeclaredVerdict<'a> {
    user_id: &'a str,
    status: VerdictStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    observation: Option<&'a str>,
    diligence_ack: bool,
}

#[derive(Serialize)]
struct DeclaredSignature<'a> {
    user_id: &'a str,
    display_name: &'a str,
    signed_utc: DateTime<Utc>,
    /// Base64 of the signer's image.
    image: String,
}

#[derive(Serialize)]
struct SealedDeclaration<'a> {
    declaration: &'a Declaration<'a>,
    sha256: &'a str,
}

impl<'a> From<&'a Signature> for DeclaredSignature<'a> {
    fn from(s: &'a Signature) -> Self {
        Self {
            user_id: &s.user_id,
            display_name: &s.display_name,
            signed_utc: s.created_utc,
            image: base64::engine::general_purpose::STANDARD.encode(&s.signature_image),
        }
    }
}

fn build_declaration(packet: &FinalizationPacket, now: DateTime<Utc>) -> Declaration<'_> {
    let transactions = packet
        .transactions
        .iter()
        .map(|t| DeclaredTransaction {
            transaction: t,
            verdicts: packet
                .reviews
                .iter()
                .filter(|r| r.transaction_id == t.transaction_id)
                .map(|r| DeclaredVerdict {
                    user_id: &r.user_id,
                    status: r.status,
                    observation: r.observation.as_deref(),
                    diligence_ack: r.diligence_ack,
                })
                .collect(),
            diligence: packet
                .diligences
                .get(&t.transaction_id)
                .filter(|d| d.is_diligence),
        })
        .collect();

    Declaration {
        report_id: packet.report.report_id,
        title: &packet.report.title,
        competence_period: &packet.report.competence_period,
        account_type: &packet.report.account_type,
        generated_utc: now,
        summary: &packet.summary,
        transactions,
        fiscal_signatures: packet.fiscal_signatures.iter().map(Into::into).collect(),
        treasurer_signature: (&packet.treasurer_signature).into(),
    }
}

/// Render the sealed declaration document and its digest.
pub fn render_declaration(
    packet: &FinalizationPacket,
    now: DateTime<Utc>,
) -> anyhow::Result<(Vec<u8>, String)> {
    let declaration = build_declaration(packet, now);
    let body = serde_json::to_vec(&declaration)?;
    let digest = hex::encode(Sha256::digest(&body));

    let sealed = serde_json::to_vec_pretty(&SealedDeclaration {
        declaration: &declaration,
        sha256: &digest,
    })?;
    Ok((sealed, digest))
}

/// Writes the JSON declaration through a [`Storage`] backend.
pub struct DeclarationEmitter {
    storage: Arc<dyn Storage>,
}

impl DeclarationEmitter {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl FinalizationEmitter for DeclarationEmitter {
    #[instrument(skip(self, packet), fields(report_id = %packet.report.report_id))]
    async fn emit(&self, packet: &FinalizationPacket) -> anyhow::Result<EmittedArtifact> {
        let (document, digest) = render_declaration(packet, Utc::now())?;
        let key = declaration_key(packet.report.report_id);

        self.storage
            .upload(&key, document)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to upload declaration: {}", e))?;

        info!(key = %key, digest = %digest, "Declaration stored");

        Ok(EmittedArtifact {
            url: self.storage.url(&key),
            key,
            digest,
        })
    }

    async fn discard(&self, artifact: &EmittedArtifact) -> anyhow::Result<()> {
        self.storage
            .delete(&artifact.key)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete declaration: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{aggregate, resolve_diligences};
    use crate::models::{Direction, ReportStatus, SignerRole};
    use crate::services::storage::LocalStorage;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn packet() -> FinalizationPacket {
        let now = Utc::now();
        let report = Report {
            report_id: Uuid::new_v4(),
            title: "June statement".to_string(),
            competence_period: "2025-06".to_string(),
            account_type: "checking".to_string(),
            status: ReportStatus::Open,
            total_entries: 1,
            pdf_url: None,
            created_utc: now,
            updated_utc: now,
        };
        let transaction = Transaction {
            transaction_id: Uuid::new_v4(),
            report_id: report.report_id,
            entry_index: 0,
            transaction_date: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            description: "Rent".to_string(),
            amount: Decimal::new(-120000, 2),
            direction: Direction::Debit,
        };
        let reviews: Vec<Review> = ["a", "b", "c"]
            .iter()
            .map(|user| Review {
                report_id: report.report_id,
                transaction_id: transaction.transaction_id,
                user_id: user.to_string(),
                status: VerdictStatus::Approved,
                observation: None,
                diligence_ack: false,
                diligence_opened_by: None,
                diligence_opened_utc: None,
                diligence_opener_name: None,
                created_utc: now,
                updated_utc: now,
            })
            .collect();
        let signature = |user: &str, role| Signature {
            signature_id: Uuid::new_v4(),
            report_id: report.report_id,
            user_id: user.to_string(),
            role,
            display_name: user.to_uppercase(),
            signature_image: vec![0x89, 0x50, 0x4e, 0x47],
            created_utc: now,
        };
        let fiscal_signatures = vec![
            signature("a", SignerRole::Fiscal),
            signature("b", SignerRole::Fiscal),
            signature("c", SignerRole::Fiscal),
        ];

        FinalizationPacket {
            summary: aggregate(&report, &reviews, &fiscal_signatures),
            diligences: resolve_diligences(&reviews),
            transactions: vec![transaction],
            treasurer_signature: signature("t", SignerRole::Treasurer),
            report,
            reviews,
            fiscal_signatures,
        }
    }

    #[test]
    fn declaration_is_sealed_with_its_digest() {
        let packet = packet();
        let now = Utc::now();
        let (document, digest) = render_declaration(&packet, now).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&document).unwrap();
        assert_eq!(value["sha256"], digest.as_str());
        assert_eq!(digest.len(), 64);

        let body = serde_json::to_vec(&build_declaration(&packet, now)).unwrap();
        assert_eq!(hex::encode(Sha256::digest(&body)), digest);

        let declaration = &value["declaration"];
        assert_eq!(declaration["fiscal_signatures"].as_array().unwrap().len(), 3);
        assert_eq!(declaration["treasurer_signature"]["image"], "iVBORw==");
        assert_eq!(
            declaration["transactions"][0]["verdicts"].as_array().unwrap().len(),
            3
        );
        assert!(declaration["transactions"][0].get("diligence").is_none());
    }

    #[tokio::test]
    async fn emit_then_discard() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path(), None).await.unwrap());
        let emitter = DeclarationEmitter::new(storage);
        let packet = packet();

        let artifact = emitter.emit(&packet).await.unwrap();
        assert_eq!(artifact.key, declaration_key(packet.report.report_id));
        assert!(artifact.url.ends_with("declaration.json"));
        let stored = dir.path().join(&artifact.key);
        assert!(stored.exists());

        emitter.discard(&artifact).await.unwrap();
        assert!(!stored.exists());
    }
}
