use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::evidence::{EvidenceMap, EvidenceSlot, StillImage};

/// Four required photos plus the registration check.
pub const COMPLETENESS_DENOMINATOR: u32 = 5;

/// Lifecycle of an inspection job. Transitions only move forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditStatus {
    Available,
    InProgress,
    Submitted,
    Approved,
}

impl AuditStatus {
    pub fn can_advance_to(self, next: AuditStatus) -> bool {
        use AuditStatus::*;
        match (self, next) {
            (Available, InProgress) | (InProgress, Submitted) | (Submitted, Approved) => true,
            (Available | InProgress | Submitted | Approved, _) => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AuditStatus::Submitted | AuditStatus::Approved)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vehicle {
    pub model: String,
    pub plate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Site {
    pub name: String,
    pub distance: String,
    pub estimated_time: String,
}

/// A listing as published by the mission catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Listing {
    pub id: String,
    pub car_model: String,
    pub license_plate: String,
    pub location: String,
    #[serde(default)]
    pub distance: String,
    #[serde(default)]
    pub estimated_time: String,
    pub reward: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Low,
    High,
}

impl Severity {
    /// `High` iff the analysis mentions "high" anywhere, case-insensitively.
    pub fn from_analysis(analysis: &str) -> Self {
        if analysis.to_lowercase().contains("high") {
            Severity::High
        } else {
            Severity::Low
        }
    }
}

/// A physical issue flagged during the inspection. Never edited once recorded.
#[derive(Debug, Clone)]
pub struct Defect {
    pub id: Uuid,
    pub image: StillImage,
    pub part: String,
    pub severity: Severity,
    pub description: String,
    pub ai_analysis: String,
}

impl Defect {
    pub fn from_analysis(image: StillImage, ai_analysis: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            image,
            part: "Component".to_string(),
            severity: Severity::from_analysis(&ai_analysis),
            description: "Visual Check".to_string(),
            ai_analysis,
        }
    }
}

/// What a capture is for: a named photo slot, the registration document,
/// or a defect scan that produces a `Defect` instead of filling a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CaptureTarget {
    Photo(EvidenceSlot),
    Document,
    DefectScan,
}

impl CaptureTarget {
    pub fn needs_gateway(self) -> bool {
        !matches!(self, CaptureTarget::Photo(slot) if slot != EvidenceSlot::RegistrationCard)
    }
}

impl fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureTarget::Photo(slot) => write!(f, "{slot}"),
            CaptureTarget::Document => f.write_str("registrationCard"),
            CaptureTarget::DefectScan => f.write_str("defect"),
        }
    }
}

impl FromStr for CaptureTarget {
    type Err = UnknownCaptureTarget;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label.to_ascii_lowercase().as_str() {
            "defect" => Ok(CaptureTarget::DefectScan),
            "registration" | "document" | "doc" => Ok(CaptureTarget::Document),
            _ => match label.parse::<EvidenceSlot>() {
                Ok(EvidenceSlot::RegistrationCard) => Ok(CaptureTarget::Document),
                Ok(slot) => Ok(CaptureTarget::Photo(slot)),
                Err(_) => Err(UnknownCaptureTarget(label.to_string())),
            },
        }
    }
}

impl TryFrom<String> for CaptureTarget {
    type Error = UnknownCaptureTarget;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        label.parse()
    }
}

impl From<CaptureTarget> for String {
    fn from(target: CaptureTarget) -> Self {
        target.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown capture target: {0}")]
pub struct UnknownCaptureTarget(pub String);

/// One vehicle inspection opportunity and the evidence gathered for it.
#[derive(Debug, Clone)]
pub struct InspectionJob {
    pub id: String,
    pub vehicle: Vehicle,
    pub site: Site,
    pub reward: u64,
    pub status: AuditStatus,
    pub evidence: EvidenceMap,
    pub defects: Vec<Defect>,
    pub registration_verified: Option<bool>,
}

impl InspectionJob {
    pub fn available(listing: Listing) -> Self {
        Self {
            id: listing.id,
            vehicle: Vehicle {
                model: listing.car_model,
                plate: listing.license_plate,
            },
            site: Site {
                name: listing.location,
                distance: listing.distance,
                estimated_time: listing.estimated_time,
            },
            reward: listing.reward,
            status: AuditStatus::Available,
            evidence: EvidenceMap::default(),
            defects: Vec::new(),
            registration_verified: None,
        }
    }

    /// Percentage in steps of 20: each required photo and a verified
    /// registration card are worth one fifth.
    pub fn completeness(&self) -> u8 {
        let filled = self.evidence.required_filled() as u32;
        let doc_bonus = u32::from(self.registration_verified == Some(true));
        let percentage = (filled + doc_bonus) * 100 / COMPLETENESS_DENOMINATOR;
        percentage.min(100) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.completeness() == 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::evidence::REQUIRED_PHOTO_SLOTS;

    fn png() -> StillImage {
        StillImage::from_bytes(b"\x89PNG\r\n\x1a\n0000".to_vec()).unwrap()
    }

    fn sample_job() -> InspectionJob {
        InspectionJob::available(Listing {
            id: "1".to_string(),
            car_model: "Toyota Corolla 2021".to_string(),
            license_plate: "DHK-1234".to_string(),
            location: "Gulshan 2".to_string(),
            distance: "1.2 km".to_string(),
            estimated_time: "25 min".to_string(),
            reward: 450,
        })
    }

    #[test]
    fn test_status_only_moves_forward() {
        use AuditStatus::*;
        assert!(Available.can_advance_to(InProgress));
        assert!(InProgress.can_advance_to(Submitted));
        assert!(Submitted.can_advance_to(Approved));

        assert!(!InProgress.can_advance_to(Available));
        assert!(!Available.can_advance_to(Submitted));
        assert!(!Submitted.can_advance_to(InProgress));
        assert!(!Approved.can_advance_to(Approved));
        assert!(Submitted.is_terminal());
        assert!(!InProgress.is_terminal());
    }

    #[test]
    fn test_front_and_rear_only_is_forty_percent() {
        let mut job = sample_job();
        job.evidence.set(EvidenceSlot::Front, png());
        job.evidence.set(EvidenceSlot::Rear, png());
        assert_eq!(job.completeness(), 40);
        assert!(!job.is_complete());
    }

    #[test]
    fn test_completeness_never_decreases_while_filling() {
        let mut job = sample_job();
        let mut last = job.completeness();
        assert_eq!(last, 0);
        for slot in REQUIRED_PHOTO_SLOTS.iter().chain(REQUIRED_PHOTO_SLOTS.iter()) {
            job.evidence.set(*slot, png());
            let now = job.completeness();
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, 80);
    }

    #[test]
    fn test_full_marks_need_photos_and_verified_card() {
        let mut job = sample_job();
        for slot in REQUIRED_PHOTO_SLOTS {
            job.evidence.set(slot, png());
        }
        job.evidence.set(EvidenceSlot::RegistrationCard, png());
        job.registration_verified = Some(false);
        assert_eq!(job.completeness(), 80);

        job.registration_verified = Some(true);
        assert_eq!(job.completeness(), 100);
    }

    #[test]
    fn test_interior_and_defects_do_not_count() {
        let mut job = sample_job();
        job.evidence.set(EvidenceSlot::Interior, png());
        job.defects.push(Defect::from_analysis(png(), "HIGH severity dent".to_string()));
        assert_eq!(job.completeness(), 0);

        job.registration_verified = Some(true);
        assert_eq!(job.completeness(), 20);
    }

    #[test]
    fn test_severity_substring_heuristic() {
        assert_eq!(Severity::from_analysis("Severity: High"), Severity::High);
        assert_eq!(Severity::from_analysis("a HIGHLY visible scratch"), Severity::High);
        assert_eq!(Severity::from_analysis("Minor scuff, severity low"), Severity::Low);
        assert_eq!(Severity::from_analysis(""), Severity::Low);
    }

    #[test]
    fn test_capture_target_labels() {
        assert_eq!(
            "front".parse::<CaptureTarget>().unwrap(),
            CaptureTarget::Photo(EvidenceSlot::Front)
        );
        assert_eq!(
            "registrationCard".parse::<CaptureTarget>().unwrap(),
            CaptureTarget::Document
        );
        assert_eq!("Defect".parse::<CaptureTarget>().unwrap(), CaptureTarget::DefectScan);
        assert!("bonnet".parse::<CaptureTarget>().is_err());

        assert!(!CaptureTarget::Photo(EvidenceSlot::Left).needs_gateway());
        assert!(CaptureTarget::Photo(EvidenceSlot::RegistrationCard).needs_gateway());
        assert!(CaptureTarget::Document.needs_gateway());
        assert!(CaptureTarget::DefectScan.needs_gateway());
    }
}
