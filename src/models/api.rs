use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::evidence::EvidenceSlot;
use crate::models::mission::{AuditStatus, CaptureTarget, InspectionJob, Severity};
use crate::models::profile::{UserProfile, UserStats};

/// New account form.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[garde(length(min = 1, max = 200))]
    pub name: String,

    #[garde(email)]
    pub email: String,

    #[serde(default)]
    #[garde(length(max = 20))]
    pub phone: String,

    #[garde(length(min = 1, max = 200))]
    pub password: String,

    /// Credential id returned by the browser after a passkey was created.
    #[serde(default)]
    #[garde(length(min = 1, max = 1024))]
    pub passkey_credential_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[garde(email)]
    pub email: String,

    #[garde(length(min = 1, max = 200))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasskeyLoginRequest {
    #[garde(length(min = 1, max = 1024))]
    pub credential_id: String,
}

/// Cash-out request to a mobile wallet number.
#[derive(Debug, Deserialize, Validate)]
pub struct WithdrawalRequest {
    #[garde(length(min = 11, max = 14))]
    pub bkash_number: String,

    #[garde(range(min = 1))]
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    pub target: CaptureTarget,
}

#[derive(Debug, Deserialize, Default)]
pub struct DenyRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Returned by every sign-in path.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub session_id: Uuid,
    pub profile: ProfileSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub name: String,
    pub email: String,
    pub balance: u64,
    pub stats: UserStats,
    pub has_passkey: bool,
}

impl From<&UserProfile> for ProfileSummary {
    fn from(profile: &UserProfile) -> Self {
        Self {
            name: profile.name.clone(),
            email: profile.email.clone(),
            balance: profile.balance,
            stats: profile.stats.clone(),
            has_passkey: profile.passkey_credential_id.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub profile: ProfileSummary,
    pub mission_selected: bool,
    pub analyzing: bool,
    pub wellness_due: bool,
}

/// One row of the gigs list.
#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub car_model: String,
    pub license_plate: String,
    pub location: String,
    pub distance: String,
    pub estimated_time: String,
    pub reward: u64,
    pub status: AuditStatus,
}

impl From<&InspectionJob> for JobSummary {
    fn from(job: &InspectionJob) -> Self {
        Self {
            id: job.id.clone(),
            car_model: job.vehicle.model.clone(),
            license_plate: job.vehicle.plate.clone(),
            location: job.site.name.clone(),
            distance: job.site.distance.clone(),
            estimated_time: job.site.estimated_time.clone(),
            reward: job.reward,
            status: job.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EvidenceView {
    pub slot: EvidenceSlot,
    pub required: bool,
    pub captured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<&'static str>,
    pub size_bytes: usize,
}

#[derive(Debug, Serialize)]
pub struct DefectView {
    pub id: Uuid,
    pub part: String,
    pub severity: Severity,
    pub description: String,
    pub ai_analysis: String,
}

/// The in-progress mission screen.
#[derive(Debug, Serialize)]
pub struct MissionView {
    pub job: JobSummary,
    pub evidence: Vec<EvidenceView>,
    pub defects: Vec<DefectView>,
    pub registration_verified: Option<bool>,
    pub completeness: u8,
    pub can_submit: bool,
    pub analyzing: bool,
}

impl MissionView {
    pub fn new(job: &InspectionJob, analyzing: bool) -> Self {
        let completeness = job.completeness();
        Self {
            job: JobSummary::from(job),
            evidence: job
                .evidence
                .iter_all()
                .map(|(slot, image)| EvidenceView {
                    slot,
                    required: slot.is_required(),
                    captured: image.is_some(),
                    mime_type: image.map(|i| i.mime_type()),
                    size_bytes: image.map_or(0, |i| i.len()),
                })
                .collect(),
            defects: job
                .defects
                .iter()
                .map(|d| DefectView {
                    id: d.id,
                    part: d.part.clone(),
                    severity: d.severity,
                    description: d.description.clone(),
                    ai_analysis: d.ai_analysis.clone(),
                })
                .collect(),
            registration_verified: job.registration_verified,
            completeness,
            can_submit: completeness == 100 && !analyzing,
            analyzing,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CaptureTicketResponse {
    pub ticket_id: Uuid,
    pub target: CaptureTarget,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitReceipt {
    pub job_id: String,
    pub reward: u64,
    pub balance: u64,
    pub impact_points: u32,
    pub level: u32,
    pub message: String,
}
