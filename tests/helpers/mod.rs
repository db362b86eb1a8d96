//! Test helpers: a scripted vision gateway, a workbench builder and polling
//! utilities for the asynchronous capture path.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::sleep;
use uuid::Uuid;

use auditgig::models::api::{CaptureTicketResponse, MissionView, SessionView, SignupRequest};
use auditgig::models::evidence::StillImage;
use auditgig::models::mission::CaptureTarget;
use auditgig::services::catalog;
use auditgig::services::gateway::{DocumentCheck, VisionGateway};
use auditgig::services::store::MemoryProfileStore;
use auditgig::services::workbench::{Workbench, WorkbenchSettings};

use crate::fixtures::{test_listings, PNG_BYTES};

pub type TestWorkbench = Workbench<FakeGateway, MemoryProfileStore>;

/// Gateway with scripted answers. When `hold` is set, every call waits for
/// a permit so a test can keep an analysis in flight.
#[derive(Clone)]
pub struct FakeGateway {
    pub analysis: String,
    pub document_text: String,
    pub calls: Arc<AtomicUsize>,
    pub hold: Option<Arc<Semaphore>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            analysis: "Minor scratch, severity low".to_string(),
            document_text: "VERIFIED: YES\nPlate DHK-1111".to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
            hold: None,
        }
    }
}

impl FakeGateway {
    pub fn held() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let gateway = Self {
            hold: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (gateway, gate)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn pass_gate(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.hold {
            gate.acquire().await.unwrap().forget();
        }
    }
}

impl VisionGateway for FakeGateway {
    async fn analyze_defect(&self, _image: &StillImage) -> String {
        self.pass_gate().await;
        self.analysis.clone()
    }

    async fn verify_document(
        &self,
        _image: &StillImage,
        _expected_plate: &str,
        _expected_model: &str,
    ) -> DocumentCheck {
        self.pass_gate().await;
        DocumentCheck::from_text(self.document_text.clone())
    }
}

pub fn test_settings() -> WorkbenchSettings {
    WorkbenchSettings {
        settlement_delay: Duration::ZERO,
        wellness_idle: Duration::from_secs(3_600),
        currency: "BDT".to_string(),
    }
}

pub fn build_workbench(gateway: FakeGateway, settings: WorkbenchSettings) -> TestWorkbench {
    let jobs = catalog::into_jobs(test_listings()).unwrap();
    Workbench::new(gateway, MemoryProfileStore::new(), jobs, settings)
}

pub fn signup(email: &str) -> SignupRequest {
    SignupRequest {
        name: "Rahim Uddin".to_string(),
        email: email.to_string(),
        phone: "01700000000".to_string(),
        password: "hunter22".to_string(),
        passkey_credential_id: None,
    }
}

pub fn png() -> StillImage {
    StillImage::from_bytes(PNG_BYTES.to_vec()).unwrap()
}

/// Retry `check` every 10 ms until it yields a value or `timeout` passes.
pub async fn poll_until<T, F, Fut>(timeout: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let attempts = (timeout.as_millis() / 10).max(1);
    for _ in 0..attempts {
        if let Some(value) = check().await {
            return Some(value);
        }
        sleep(Duration::from_millis(10)).await;
    }
    None
}

/// Wait up to two seconds for the session view to satisfy `check`.
pub async fn wait_for_session(
    workbench: &TestWorkbench,
    sid: Uuid,
    check: impl Fn(&SessionView) -> bool,
) -> Option<SessionView> {
    let check = &check;
    poll_until(Duration::from_secs(2), || async move {
        workbench
            .session_view(sid)
            .await
            .ok()
            .filter(|view| check(view))
    })
    .await
}

/// Open the camera once the previous capture has released it.
pub async fn open_when_free(
    workbench: &TestWorkbench,
    sid: Uuid,
    target: CaptureTarget,
) -> CaptureTicketResponse {
    poll_until(Duration::from_secs(2), || async move {
        workbench.begin_capture(sid, target).await.ok()
    })
    .await
    .unwrap_or_else(|| panic!("camera never released for {target}"))
}

/// Open the camera, shoot, and wait until the mission reflects the shot.
pub async fn capture(
    workbench: &TestWorkbench,
    sid: Uuid,
    target: CaptureTarget,
    settled: impl Fn(&MissionView) -> bool,
) -> MissionView {
    let ticket = open_when_free(workbench, sid, target).await;
    workbench
        .deliver_frame(sid, ticket.ticket_id, png())
        .await
        .unwrap();

    let settled = &settled;
    poll_until(Duration::from_secs(2), || async move {
        workbench
            .mission(sid)
            .await
            .unwrap()
            .filter(|view| settled(view) && !view.analyzing)
    })
    .await
    .unwrap_or_else(|| panic!("capture of {target} never landed"))
}

/// Fill every required photo slot and verify the registration card.
pub async fn complete_mission(workbench: &TestWorkbench, sid: Uuid) -> MissionView {
    use auditgig::models::evidence::REQUIRED_PHOTO_SLOTS;

    for slot in REQUIRED_PHOTO_SLOTS {
        capture(workbench, sid, CaptureTarget::Photo(slot), |view| {
            view.evidence.iter().any(|e| e.slot == slot && e.captured)
        })
        .await;
    }
    capture(workbench, sid, CaptureTarget::Document, |view| {
        view.registration_verified.is_some()
    })
    .await
}

// ── Live-server helpers ──────────────────────────────────────────────

/// POST a JSON body with a bearer token and decode the JSON reply.
pub async fn post_json(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Result<(reqwest::StatusCode, serde_json::Value), Box<dyn std::error::Error>> {
    let mut request = client.post(format!("{}{}", base_url, path)).json(&body);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;
    let value = if text.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&text)?
    };
    Ok((status, value))
}

/// Upload a still for an open capture ticket as a multipart `image` part.
pub async fn upload_frame(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    ticket_id: &str,
    image_bytes: &[u8],
) -> Result<reqwest::StatusCode, Box<dyn std::error::Error>> {
    let form = reqwest::multipart::Form::new().part(
        "image",
        reqwest::multipart::Part::bytes(image_bytes.to_vec())
            .file_name("frame.png")
            .mime_str("image/png")?,
    );

    let response = client
        .post(format!(
            "{}/api/v1/mission/captures/{}/frame",
            base_url, ticket_id
        ))
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await?;
    Ok(response.status())
}

/// Poll `GET /api/v1/mission` until `check` accepts it.
pub async fn poll_mission(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    timeout_secs: u64,
    check: impl Fn(&serde_json::Value) -> bool,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs * 4;

    for _ in 0..max_attempts {
        let mission: serde_json::Value = client
            .get(format!("{}/api/v1/mission", base_url))
            .bearer_auth(token)
            .send()
            .await?
            .json()
            .await?;

        if check(&mission) && mission["analyzing"] == false {
            return Ok(mission);
        }
        sleep(Duration::from_millis(250)).await;
    }

    Err(format!("Mission did not settle within {} seconds", timeout_secs).into())
}
