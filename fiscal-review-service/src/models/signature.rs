//! Signature model: attestation by a panel member or the treasurer.

use super::datetime_to_timestamp;
use crate::grpc::proto;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Which signature set a signature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerRole {
    Fiscal,
    Treasurer,
}

impl SignerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fiscal => "fiscal",
            Self::Treasurer => "treasurer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fiscal" => Some(Self::Fiscal),
            "treasurer" => Some(Self::Treasurer),
            _ => None,
        }
    }
}

impl From<SignerRole> for proto::SignerRole {
    fn from(r: SignerRole) -> Self {
        match r {
            SignerRole::Fiscal => Self::Fiscal,
            SignerRole::Treasurer => Self::Treasurer,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub signature_id: Uuid,
    pub report_id: Uuid,
    pub user_id: String,
    pub role: SignerRole,
    pub display_name: String,
    /// Opaque image blob supplied by the signer.
    pub signature_image: Vec<u8>,
    pub created_utc: DateTime<Utc>,
}

impl From<Signature> for proto::Signature {
    fn from(s: Signature) -> Self {
        Self {
            signature_id: s.signature_id.to_string(),
            report_id: s.report_id.to_string(),
            user_id: s.user_id,
            role: proto::SignerRole::from(s.role).into(),
            display_name: s.display_name,
            signature_image: s.signature_image,
            created_utc: Some(datetime_to_timestamp(s.created_utc)),
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct SignatureInput {
    pub report_id: Uuid,
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    pub role: SignerRole,
    #[validate(length(min = 1, max = 200))]
    pub display_name: String,
    #[validate(length(min = 1, max = 2097152))]
    pub signature_image: Vec<u8>,
}
