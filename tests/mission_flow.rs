//! In-process mission flow tests: a real workbench over the in-memory
//! profile store and a scripted vision gateway.

mod fixtures;
mod helpers;

use std::time::Duration;

use auditgig::models::api::{LoginRequest, PasskeyLoginRequest, WithdrawalRequest};
use auditgig::models::evidence::EvidenceSlot;
use auditgig::models::mission::{AuditStatus, CaptureTarget, Severity};
use auditgig::models::profile::{TransactionKind, TransactionStatus};
use auditgig::services::camera::CaptureError;
use auditgig::services::lifecycle::{LifecycleError, SubmitRejection};
use auditgig::services::store::ProfileStore;
use auditgig::services::workbench::{WorkbenchError, WorkbenchSettings};
use uuid::Uuid;

use helpers::*;

#[tokio::test]
async fn test_full_mission_pays_out_once() {
    let gateway = FakeGateway::default();
    let workbench = build_workbench(gateway.clone(), test_settings());
    let session = workbench.sign_up(signup("rahim@example.com")).await.unwrap();
    let sid = session.id;

    assert_eq!(workbench.available_jobs(sid).await.unwrap().len(), 2);

    let view = workbench.start_job(sid, "gig-1").await.unwrap();
    assert_eq!(view.job.status, AuditStatus::InProgress);
    assert_eq!(view.completeness, 0);
    assert!(!view.can_submit);

    let remaining = workbench.available_jobs(sid).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "gig-2");

    let view = complete_mission(&workbench, sid).await;
    assert_eq!(view.completeness, 100);
    assert_eq!(view.registration_verified, Some(true));
    assert!(view.can_submit);
    // Only the registration card went through the gateway
    assert_eq!(gateway.call_count(), 1);

    let receipt = workbench.submit(sid).await.unwrap();
    assert_eq!(receipt.job_id, "gig-1");
    assert_eq!(receipt.reward, 500);
    assert_eq!(receipt.balance, 500);
    assert_eq!(receipt.impact_points, 1);
    assert_eq!(receipt.level, 1);

    assert!(workbench.mission(sid).await.unwrap().is_none());
    assert!(matches!(
        workbench.submit(sid).await,
        Err(WorkbenchError::Rejected(SubmitRejection::NoMission))
    ));

    let stored = workbench
        .store()
        .load("rahim@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.balance, 500);
    assert_eq!(stored.stats.impact_points, 1);

    let wallet = workbench.wallet(sid).await.unwrap();
    assert_eq!(wallet.balance, 500);
    assert_eq!(wallet.transactions.len(), 1);
    assert_eq!(wallet.transactions[0].kind, TransactionKind::Earning);
    assert_eq!(wallet.transactions[0].status, TransactionStatus::Completed);
}

#[tokio::test]
async fn test_submit_rejected_until_complete() {
    let workbench = build_workbench(FakeGateway::default(), test_settings());
    let sid = workbench.sign_up(signup("a@example.com")).await.unwrap().id;
    workbench.start_job(sid, "gig-1").await.unwrap();

    for slot in [EvidenceSlot::Front, EvidenceSlot::Rear] {
        capture(&workbench, sid, CaptureTarget::Photo(slot), |view| {
            view.evidence.iter().any(|e| e.slot == slot && e.captured)
        })
        .await;
    }

    match workbench.submit(sid).await {
        Err(WorkbenchError::Rejected(SubmitRejection::Incomplete { completeness })) => {
            assert_eq!(completeness, 40)
        }
        other => panic!("expected incomplete rejection, got {other:?}"),
    }

    // Nothing was paid and the mission is still selected
    let profile = workbench.profile(sid).await.unwrap();
    assert_eq!(profile.balance, 0);
    assert!(workbench.mission(sid).await.unwrap().is_some());
}

#[tokio::test]
async fn test_unverified_registration_blocks_submit() {
    let gateway = FakeGateway {
        document_text: "VERIFIED: NO\nPlate does not match".to_string(),
        ..FakeGateway::default()
    };
    let workbench = build_workbench(gateway, test_settings());
    let sid = workbench.sign_up(signup("b@example.com")).await.unwrap().id;
    workbench.start_job(sid, "gig-1").await.unwrap();

    let view = complete_mission(&workbench, sid).await;
    assert_eq!(view.registration_verified, Some(false));
    assert_eq!(view.completeness, 80);
    assert!(!view.can_submit);
}

#[tokio::test]
async fn test_only_one_mission_at_a_time() {
    let workbench = build_workbench(FakeGateway::default(), test_settings());
    let sid = workbench.sign_up(signup("c@example.com")).await.unwrap().id;

    workbench.start_job(sid, "gig-1").await.unwrap();
    assert!(matches!(
        workbench.start_job(sid, "gig-2").await,
        Err(WorkbenchError::Lifecycle(LifecycleError::MissionInProgress(id))) if id == "gig-1"
    ));
    assert!(matches!(
        workbench.start_job(sid, "gig-9").await,
        Err(WorkbenchError::Lifecycle(LifecycleError::MissionInProgress(_)))
    ));
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let workbench = build_workbench(FakeGateway::default(), test_settings());
    let sid = workbench.sign_up(signup("d@example.com")).await.unwrap().id;
    assert!(matches!(
        workbench.start_job(sid, "gig-9").await,
        Err(WorkbenchError::Lifecycle(LifecycleError::JobNotFound(_)))
    ));
}

#[tokio::test]
async fn test_defect_scan_appends_a_defect() {
    let gateway = FakeGateway {
        analysis: "Deep dent on the rear door. Severity: HIGH".to_string(),
        ..FakeGateway::default()
    };
    let workbench = build_workbench(gateway, test_settings());
    let sid = workbench.sign_up(signup("e@example.com")).await.unwrap().id;
    workbench.start_job(sid, "gig-1").await.unwrap();

    let view = capture(&workbench, sid, CaptureTarget::DefectScan, |view| {
        !view.defects.is_empty()
    })
    .await;

    assert_eq!(view.defects.len(), 1);
    assert_eq!(view.defects[0].severity, Severity::High);
    assert!(view.evidence.iter().all(|e| !e.captured));
    assert_eq!(view.completeness, 0);
}

#[tokio::test]
async fn test_running_analysis_blocks_capture_and_submit() {
    let (gateway, gate) = FakeGateway::held();
    let workbench = build_workbench(gateway.clone(), test_settings());
    let sid = workbench.sign_up(signup("f@example.com")).await.unwrap().id;
    workbench.start_job(sid, "gig-1").await.unwrap();

    // Let the registration check through, then complete the mission
    gate.add_permits(1);
    complete_mission(&workbench, sid).await;

    let ticket = workbench
        .begin_capture(sid, CaptureTarget::DefectScan)
        .await
        .unwrap();
    workbench
        .deliver_frame(sid, ticket.ticket_id, png())
        .await
        .unwrap();
    let analyzing = wait_for_session(&workbench, sid, |view| view.analyzing).await;
    assert!(analyzing.is_some(), "defect analysis never started");

    // A second gateway capture and the payout both wait for the analysis
    assert!(matches!(
        workbench.begin_capture(sid, CaptureTarget::DefectScan).await,
        Err(WorkbenchError::Analyzing)
    ));
    assert!(matches!(
        workbench.begin_capture(sid, CaptureTarget::Document).await,
        Err(WorkbenchError::Analyzing)
    ));
    assert!(matches!(
        workbench.submit(sid).await,
        Err(WorkbenchError::Rejected(SubmitRejection::Analyzing))
    ));
    assert_eq!(gateway.call_count(), 2);

    gate.add_permits(1);
    let idle = wait_for_session(&workbench, sid, |view| !view.analyzing).await;
    assert!(idle.is_some(), "defect analysis never finished");

    let view = workbench.mission(sid).await.unwrap().unwrap();
    assert_eq!(view.job.id, "gig-1");
    assert_eq!(view.defects.len(), 1);
    assert!(view.can_submit);

    let receipt = workbench.submit(sid).await.unwrap();
    assert_eq!(receipt.reward, 500);
}

#[tokio::test]
async fn test_cancelled_defect_scan_frees_the_gateway_slot() {
    let workbench = build_workbench(FakeGateway::default(), test_settings());
    let sid = workbench.sign_up(signup("f2@example.com")).await.unwrap().id;
    workbench.start_job(sid, "gig-1").await.unwrap();

    let ticket = workbench
        .begin_capture(sid, CaptureTarget::DefectScan)
        .await
        .unwrap();
    workbench.cancel_capture(sid, ticket.ticket_id).await.unwrap();

    let idle = wait_for_session(&workbench, sid, |view| !view.analyzing).await;
    assert!(idle.is_some(), "cancelled scan still counted as analyzing");
    let view = capture(&workbench, sid, CaptureTarget::DefectScan, |view| {
        !view.defects.is_empty()
    })
    .await;
    assert_eq!(view.defects.len(), 1);
}

#[tokio::test]
async fn test_two_defect_scans_yield_two_defects() {
    let gateway = FakeGateway::default();
    let workbench = build_workbench(gateway.clone(), test_settings());
    let sid = workbench.sign_up(signup("f3@example.com")).await.unwrap().id;
    workbench.start_job(sid, "gig-1").await.unwrap();

    capture(&workbench, sid, CaptureTarget::DefectScan, |view| {
        view.defects.len() == 1
    })
    .await;
    let view = capture(&workbench, sid, CaptureTarget::DefectScan, |view| {
        view.defects.len() == 2
    })
    .await;

    assert_eq!(view.defects.len(), 2);
    assert_ne!(view.defects[0].id, view.defects[1].id);
    assert!(view.defects.iter().all(|d| d.severity == Severity::Low));
    assert_eq!(gateway.call_count(), 2);
    assert_eq!(view.completeness, 0);
}

#[tokio::test]
async fn test_camera_is_exclusive() {
    let workbench = build_workbench(FakeGateway::default(), test_settings());
    let sid = workbench.sign_up(signup("g@example.com")).await.unwrap().id;
    workbench.start_job(sid, "gig-1").await.unwrap();

    let first = workbench
        .begin_capture(sid, CaptureTarget::Photo(EvidenceSlot::Front))
        .await
        .unwrap();
    assert!(matches!(
        workbench
            .begin_capture(sid, CaptureTarget::Photo(EvidenceSlot::Rear))
            .await,
        Err(WorkbenchError::Capture(CaptureError::Busy))
    ));

    workbench.cancel_capture(sid, first.ticket_id).await.unwrap();

    // Cancelling produced no image and freed the camera
    let second = open_when_free(&workbench, sid, CaptureTarget::Photo(EvidenceSlot::Rear)).await;
    workbench
        .deny_capture(sid, second.ticket_id, "Permission denied".to_string())
        .await
        .unwrap();

    let view = workbench.mission(sid).await.unwrap().unwrap();
    assert!(view.evidence.iter().all(|e| !e.captured));

    assert!(matches!(
        workbench.deliver_frame(sid, first.ticket_id, png()).await,
        Err(WorkbenchError::Capture(CaptureError::UnknownTicket(_)))
    ));
}

#[tokio::test]
async fn test_capture_needs_a_mission() {
    let workbench = build_workbench(FakeGateway::default(), test_settings());
    let sid = workbench.sign_up(signup("h@example.com")).await.unwrap().id;
    assert!(matches!(
        workbench.begin_capture(sid, CaptureTarget::DefectScan).await,
        Err(WorkbenchError::NoMission)
    ));
}

#[tokio::test]
async fn test_wellness_reminder_fires_when_idle() {
    let settings = WorkbenchSettings {
        wellness_idle: Duration::from_millis(50),
        ..test_settings()
    };
    let workbench = build_workbench(FakeGateway::default(), settings);
    let sid = workbench.sign_up(signup("i@example.com")).await.unwrap().id;

    let due = wait_for_session(&workbench, sid, |view| view.wellness_due).await;
    assert!(due.is_some(), "wellness reminder never fired");

    workbench.dismiss_wellness(sid).await.unwrap();
    assert!(!workbench.session_view(sid).await.unwrap().wellness_due);
}

#[tokio::test]
async fn test_wellness_timer_paused_during_mission() {
    let settings = WorkbenchSettings {
        wellness_idle: Duration::from_millis(50),
        ..test_settings()
    };
    let workbench = build_workbench(FakeGateway::default(), settings);
    let sid = workbench.sign_up(signup("j@example.com")).await.unwrap().id;
    workbench.start_job(sid, "gig-1").await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!workbench.session_view(sid).await.unwrap().wellness_due);
}

#[tokio::test]
async fn test_withdrawal_stays_pending() {
    let workbench = build_workbench(FakeGateway::default(), test_settings());
    let sid = workbench.sign_up(signup("k@example.com")).await.unwrap().id;

    let request = |amount| WithdrawalRequest {
        bkash_number: "01712345678".to_string(),
        amount,
    };

    assert!(matches!(
        workbench.request_withdrawal(sid, request(100)).await,
        Err(WorkbenchError::InsufficientBalance {
            requested: 100,
            balance: 0
        })
    ));

    workbench.start_job(sid, "gig-1").await.unwrap();
    complete_mission(&workbench, sid).await;
    workbench.submit(sid).await.unwrap();

    let transaction = workbench
        .request_withdrawal(sid, request(200))
        .await
        .unwrap();
    assert_eq!(transaction.kind, TransactionKind::Withdrawal);
    assert_eq!(transaction.status, TransactionStatus::Pending);

    let wallet = workbench.wallet(sid).await.unwrap();
    assert_eq!(wallet.balance, 500);
    assert_eq!(wallet.transactions.len(), 2);

    let bad_number = WithdrawalRequest {
        bkash_number: "123".to_string(),
        amount: 10,
    };
    assert!(matches!(
        workbench.request_withdrawal(sid, bad_number).await,
        Err(WorkbenchError::Validation(_))
    ));
}

#[tokio::test]
async fn test_accounts_and_sessions() {
    let workbench = build_workbench(FakeGateway::default(), test_settings());
    let first = workbench.sign_up(signup("l@example.com")).await.unwrap();

    assert!(matches!(
        workbench.sign_up(signup("l@example.com")).await,
        Err(WorkbenchError::AccountExists(_))
    ));

    workbench.log_out(first.id).await.unwrap();
    assert!(matches!(
        workbench.available_jobs(first.id).await,
        Err(WorkbenchError::NotSignedIn)
    ));

    assert!(matches!(
        workbench
            .log_in(LoginRequest {
                email: "nobody@example.com".to_string(),
                password: "secret".to_string(),
            })
            .await,
        Err(WorkbenchError::UnknownAccount(_))
    ));

    let again = workbench
        .log_in(LoginRequest {
            email: "l@example.com".to_string(),
            password: "secret".to_string(),
        })
        .await
        .unwrap();
    assert_ne!(again.id, first.id);
    assert_eq!(again.profile.stats.trust_score, 98);
}

#[tokio::test]
async fn test_passkey_sign_in() {
    let workbench = build_workbench(FakeGateway::default(), test_settings());
    let mut form = signup("m@example.com");
    form.passkey_credential_id = Some("cred-abc".to_string());
    let session = workbench.sign_up(form).await.unwrap();
    workbench.log_out(session.id).await.unwrap();

    let resumed = workbench
        .log_in_with_passkey(PasskeyLoginRequest {
            credential_id: "cred-abc".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(resumed.profile.email, "m@example.com");

    assert!(matches!(
        workbench
            .log_in_with_passkey(PasskeyLoginRequest {
                credential_id: "cred-zzz".to_string(),
            })
            .await,
        Err(WorkbenchError::UnknownPasskey)
    ));
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let workbench = build_workbench(FakeGateway::default(), test_settings());
    workbench.sign_up(signup("n@example.com")).await.unwrap();
    assert!(matches!(
        workbench.mission(Uuid::new_v4()).await,
        Err(WorkbenchError::NotSignedIn)
    ));
}

#[tokio::test]
async fn test_concurrent_submits_pay_once() {
    let settings = WorkbenchSettings {
        settlement_delay: Duration::from_millis(50),
        ..test_settings()
    };
    let workbench = build_workbench(FakeGateway::default(), settings);
    let sid = workbench.sign_up(signup("o@example.com")).await.unwrap().id;
    workbench.start_job(sid, "gig-2").await.unwrap();
    complete_mission(&workbench, sid).await;

    let (first, second) = futures::join!(workbench.submit(sid), workbench.submit(sid));
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(WorkbenchError::Rejected(SubmitRejection::AlreadySettling))
    )));

    assert_eq!(workbench.profile(sid).await.unwrap().balance, 700);
}
