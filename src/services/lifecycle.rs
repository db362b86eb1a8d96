//! Mission lifecycle: accepting a job, filling its evidence, and settling
//! it once the completeness gate reaches 100 %.
//!
//! Gateway calls are split from state changes. `assess_capture` talks to
//! the vision model using a snapshot of the job, and `apply_assessment`
//! folds the result back in. A caller that may lose the job while the
//! model is thinking (the operator navigated away, or the job was settled)
//! goes through `Worklist::apply`, which drops results for jobs that are no
//! longer selected.

use std::time::Duration;

use tracing::{debug, info};

use crate::models::evidence::{EvidenceSlot, StillImage};
use crate::models::mission::{AuditStatus, CaptureTarget, Defect, InspectionJob};
use crate::models::profile::UserProfile;
use crate::services::gateway::{DocumentCheck, VisionGateway};
use crate::services::store::{ProfileStore, StoreError};

/// Move an available job into progress.
///
/// Callers only hand over jobs from the available list; anything else is a
/// programming error.
pub fn accept_job(mut job: InspectionJob) -> InspectionJob {
    debug_assert!(
        job.status.can_advance_to(AuditStatus::InProgress),
        "job {} accepted from {:?}",
        job.id,
        job.status
    );
    job.status = AuditStatus::InProgress;
    job
}

pub fn completeness(job: &InspectionJob) -> u8 {
    job.completeness()
}

/// A capture after the gateway has had its say.
#[derive(Debug, Clone)]
pub enum Assessment {
    Photo {
        slot: EvidenceSlot,
        image: StillImage,
    },
    Document {
        image: StillImage,
        check: DocumentCheck,
    },
    Defect(Defect),
}

/// Run whatever gateway call the capture target needs.
pub async fn assess_capture<G: VisionGateway>(
    gateway: &G,
    job: &InspectionJob,
    target: CaptureTarget,
    image: StillImage,
) -> Assessment {
    match target {
        CaptureTarget::Photo(EvidenceSlot::RegistrationCard) | CaptureTarget::Document => {
            let check = gateway
                .verify_document(&image, &job.vehicle.plate, &job.vehicle.model)
                .await;
            info!(job_id = %job.id, verified = check.verified, "Registration card checked");
            Assessment::Document { image, check }
        }
        CaptureTarget::Photo(slot) => Assessment::Photo { slot, image },
        CaptureTarget::DefectScan => {
            let analysis = gateway.analyze_defect(&image).await;
            let defect = Defect::from_analysis(image, analysis);
            info!(
                job_id = %job.id,
                defect_id = %defect.id,
                severity = %defect.severity,
                "Defect recorded"
            );
            Assessment::Defect(defect)
        }
    }
}

/// Fold an assessment into the job. A failed document check still keeps
/// the captured card in its slot.
pub fn apply_assessment(job: &mut InspectionJob, assessment: Assessment) {
    match assessment {
        Assessment::Photo { slot, image } => {
            if job.evidence.set(slot, image).is_some() {
                debug!(job_id = %job.id, slot = %slot, "Slot recaptured");
            }
        }
        Assessment::Document { image, check } => {
            job.evidence.set(EvidenceSlot::RegistrationCard, image);
            job.registration_verified = Some(check.verified);
        }
        Assessment::Defect(defect) => job.defects.push(defect),
    }
}

/// Assess and apply in one go, for callers that own the job outright.
pub async fn record_capture<G: VisionGateway>(
    gateway: &G,
    job: &mut InspectionJob,
    target: CaptureTarget,
    image: StillImage,
) {
    let assessment = assess_capture(gateway, job, target, image).await;
    apply_assessment(job, assessment);
}

/// The simulated remote sync, then the payout itself.
pub async fn settle<S: ProfileStore>(
    store: &S,
    email: &str,
    job: &InspectionJob,
    delay: Duration,
) -> Result<UserProfile, StoreError> {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let profile = store.settle_payout(email, job.reward).await?;
    info!(
        job_id = %job.id,
        reward = job.reward,
        balance = profile.balance,
        level = profile.stats.level,
        "Mission settled"
    );
    Ok(profile)
}

/// Jobs still open to this worker plus the one being worked on.
#[derive(Debug, Default)]
pub struct Worklist {
    available: Vec<InspectionJob>,
    selected: Option<InspectionJob>,
    settling: bool,
}

impl Worklist {
    pub fn new(jobs: Vec<InspectionJob>) -> Self {
        Self {
            available: jobs,
            selected: None,
            settling: false,
        }
    }

    pub fn available(&self) -> &[InspectionJob] {
        &self.available
    }

    pub fn selected(&self) -> Option<&InspectionJob> {
        self.selected.as_ref()
    }

    pub fn is_settling(&self) -> bool {
        self.settling
    }

    /// True while the job is either listed or selected.
    pub fn contains(&self, job_id: &str) -> bool {
        self.selected.as_ref().is_some_and(|j| j.id == job_id)
            || self.available.iter().any(|j| j.id == job_id)
    }

    /// Take a listed job and make it the selected mission.
    pub fn accept(&mut self, job_id: &str) -> Result<&InspectionJob, LifecycleError> {
        if let Some(current) = &self.selected {
            return Err(LifecycleError::MissionInProgress(current.id.clone()));
        }
        let index = self
            .available
            .iter()
            .position(|j| j.id == job_id)
            .ok_or_else(|| LifecycleError::JobNotFound(job_id.to_string()))?;

        let job = accept_job(self.available.remove(index));
        info!(job_id = %job.id, reward = job.reward, "Mission accepted");
        Ok(self.selected.insert(job))
    }

    /// Apply a gateway result if its job is still the selected one and not
    /// being settled. Returns false when the result was discarded.
    pub fn apply(&mut self, job_id: &str, assessment: Assessment) -> bool {
        if self.settling {
            return false;
        }
        match self.selected.as_mut() {
            Some(job) if job.id == job_id => {
                apply_assessment(job, assessment);
                true
            }
            _ => false,
        }
    }

    /// Check the submit gate and lock the selected mission for settlement.
    /// Rejections leave everything untouched.
    pub fn begin_settlement(&mut self) -> Result<InspectionJob, SubmitRejection> {
        if self.settling {
            return Err(SubmitRejection::AlreadySettling);
        }
        let job = self.selected.as_ref().ok_or(SubmitRejection::NoMission)?;
        let completeness = job.completeness();
        if completeness < 100 {
            return Err(SubmitRejection::Incomplete { completeness });
        }
        self.settling = true;
        Ok(job.clone())
    }

    /// Retire the settled mission and clear the selection.
    pub fn complete_settlement(&mut self, job_id: &str) -> Option<InspectionJob> {
        self.settling = false;
        match self.selected.take() {
            Some(mut job) if job.id == job_id => {
                debug_assert!(job.status.can_advance_to(AuditStatus::Submitted));
                job.status = AuditStatus::Submitted;
                Some(job)
            }
            other => {
                self.selected = other;
                None
            }
        }
    }

    /// The payout did not go through; the mission stays selected for a retry.
    pub fn abort_settlement(&mut self) {
        self.settling = false;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Mission {0} is already in progress")]
    MissionInProgress(String),

    #[error("No available mission with id {0}")]
    JobNotFound(String),
}

/// Reasons the submit action is disabled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejection {
    #[error("No mission selected")]
    NoMission,

    #[error("Mission is {completeness}% complete; all steps are required")]
    Incomplete { completeness: u8 },

    #[error("Mission is already being settled")]
    AlreadySettling,

    #[error("An analysis is still running for this mission")]
    Analyzing,
}
