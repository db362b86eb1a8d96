use std::sync::Arc;
use std::time::Duration;

use garde::Validate;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::api::{
    CaptureTicketResponse, JobSummary, LoginRequest, MissionView, PasskeyLoginRequest,
    ProfileSummary, SessionView, SignupRequest, SubmitReceipt, WithdrawalRequest,
};
use crate::models::evidence::StillImage;
use crate::models::mission::{CaptureTarget, InspectionJob};
use crate::models::profile::{
    Transaction, TransactionKind, TransactionStatus, UserProfile, Wallet,
};
use crate::services::camera::{Camera, CaptureError};
use crate::services::gateway::VisionGateway;
use crate::services::lifecycle::{self, LifecycleError, SubmitRejection, Worklist};
use crate::services::session::SessionContext;
use crate::services::store::{ProfileStore, StoreError};

const SUBMIT_MESSAGE: &str = "Excellent work, Guardian. Safety data uploaded and payment secured.";

#[derive(Debug, Clone)]
pub struct WorkbenchSettings {
    pub settlement_delay: Duration,
    pub wellness_idle: Duration,
    pub currency: String,
}

impl Default for WorkbenchSettings {
    fn default() -> Self {
        Self {
            settlement_delay: Duration::from_millis(2_000),
            wellness_idle: Duration::from_secs(20 * 60),
            currency: "BDT".to_string(),
        }
    }
}

/// Mutable client state, guarded by one lock.
#[derive(Default)]
struct Desk {
    session: Option<SessionContext>,
    worklist: Worklist,
    in_flight: usize,
    wellness_due: bool,
    wellness_timer: Option<JoinHandle<()>>,
}

impl Desk {
    fn session(&self, sid: Uuid) -> Result<&SessionContext, WorkbenchError> {
        self.session
            .as_ref()
            .filter(|s| s.id == sid)
            .ok_or(WorkbenchError::NotSignedIn)
    }

    fn session_mut(&mut self, sid: Uuid) -> Result<&mut SessionContext, WorkbenchError> {
        self.session
            .as_mut()
            .filter(|s| s.id == sid)
            .ok_or(WorkbenchError::NotSignedIn)
    }

    fn analyzing(&self) -> bool {
        self.in_flight > 0 || self.worklist.is_settling()
    }
}

/// The single-operator client: one signed-in worker, one camera, one
/// selected mission at a time.
pub struct Workbench<G, S> {
    gateway: Arc<G>,
    store: Arc<S>,
    camera: Arc<Camera>,
    desk: Arc<Mutex<Desk>>,
    settings: Arc<WorkbenchSettings>,
}

impl<G, S> Clone for Workbench<G, S> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            store: Arc::clone(&self.store),
            camera: Arc::clone(&self.camera),
            desk: Arc::clone(&self.desk),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<G, S> Workbench<G, S>
where
    G: VisionGateway + 'static,
    S: ProfileStore + 'static,
{
    pub fn new(gateway: G, store: S, jobs: Vec<InspectionJob>, settings: WorkbenchSettings) -> Self {
        Self {
            gateway: Arc::new(gateway),
            store: Arc::new(store),
            camera: Arc::new(Camera::new()),
            desk: Arc::new(Mutex::new(Desk {
                worklist: Worklist::new(jobs),
                ..Desk::default()
            })),
            settings: Arc::new(settings),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    // ── Authentication ───────────────────────────────────────────────

    pub async fn sign_up(&self, form: SignupRequest) -> Result<SessionContext, WorkbenchError> {
        form.validate()?;
        if self.store.load(&form.email).await?.is_some() {
            return Err(WorkbenchError::AccountExists(form.email));
        }

        let mut profile = UserProfile::new(form.name, form.email, form.phone);
        profile.passkey_credential_id = form.passkey_credential_id;
        self.store.save(&profile).await?;
        info!(
            email = %profile.email,
            passkey = profile.passkey_credential_id.is_some(),
            "Profile created"
        );
        Ok(self.open_session(profile).await)
    }

    /// Password sign-in. The account is looked up by email; passwords are
    /// never stored.
    pub async fn log_in(&self, form: LoginRequest) -> Result<SessionContext, WorkbenchError> {
        form.validate()?;
        let profile = self
            .store
            .load(&form.email)
            .await?
            .ok_or(WorkbenchError::UnknownAccount(form.email))?;
        Ok(self.open_session(profile).await)
    }

    pub async fn log_in_with_passkey(
        &self,
        form: PasskeyLoginRequest,
    ) -> Result<SessionContext, WorkbenchError> {
        form.validate()?;
        let profile = self
            .store
            .load_by_credential(&form.credential_id)
            .await?
            .ok_or(WorkbenchError::UnknownPasskey)?;
        Ok(self.open_session(profile).await)
    }

    async fn open_session(&self, profile: UserProfile) -> SessionContext {
        let session = SessionContext::open(profile, &self.settings.currency);
        let mut desk = self.desk.lock().await;
        if let Some(previous) = desk.session.replace(session.clone()) {
            info!(session_id = %previous.id, "Previous session replaced");
        }
        self.reschedule_wellness(&mut desk);
        info!(session_id = %session.id, email = %session.profile.email, "Session opened");
        session
    }

    pub async fn log_out(&self, sid: Uuid) -> Result<(), WorkbenchError> {
        let mut desk = self.desk.lock().await;
        desk.session(sid)?;
        desk.session = None;
        desk.wellness_due = false;
        self.reschedule_wellness(&mut desk);
        info!(session_id = %sid, "Session closed");
        Ok(())
    }

    /// Fails unless `sid` is the live session.
    pub async fn check_session(&self, sid: Uuid) -> Result<(), WorkbenchError> {
        self.desk.lock().await.session(sid).map(|_| ())
    }

    pub async fn session_view(&self, sid: Uuid) -> Result<SessionView, WorkbenchError> {
        let desk = self.desk.lock().await;
        let session = desk.session(sid)?;
        Ok(SessionView {
            session_id: session.id,
            profile: ProfileSummary::from(&session.profile),
            mission_selected: desk.worklist.selected().is_some(),
            analyzing: desk.analyzing(),
            wellness_due: desk.wellness_due,
        })
    }

    pub async fn dismiss_wellness(&self, sid: Uuid) -> Result<(), WorkbenchError> {
        let mut desk = self.desk.lock().await;
        desk.session(sid)?;
        desk.wellness_due = false;
        Ok(())
    }

    // ── Missions ─────────────────────────────────────────────────────

    pub async fn available_jobs(&self, sid: Uuid) -> Result<Vec<JobSummary>, WorkbenchError> {
        let desk = self.desk.lock().await;
        desk.session(sid)?;
        Ok(desk.worklist.available().iter().map(JobSummary::from).collect())
    }

    pub async fn start_job(&self, sid: Uuid, job_id: &str) -> Result<MissionView, WorkbenchError> {
        let mut desk = self.desk.lock().await;
        desk.session(sid)?;
        let analyzing = desk.analyzing();
        let view = MissionView::new(desk.worklist.accept(job_id)?, analyzing);
        self.reschedule_wellness(&mut desk);
        metrics::counter!("missions_started_total").increment(1);
        Ok(view)
    }

    pub async fn mission(&self, sid: Uuid) -> Result<Option<MissionView>, WorkbenchError> {
        let desk = self.desk.lock().await;
        desk.session(sid)?;
        let analyzing = desk.analyzing();
        Ok(desk.worklist.selected().map(|job| MissionView::new(job, analyzing)))
    }

    /// Open the camera for the selected mission. The capture runs in the
    /// background; its result lands on the mission once the frame arrives
    /// and any gateway call has finished.
    ///
    /// Refused while an analysis is running: a capture that needs the
    /// gateway counts as in flight from the moment its camera opens until
    /// its result is applied, so two gateway calls never overlap.
    pub async fn begin_capture(
        &self,
        sid: Uuid,
        target: CaptureTarget,
    ) -> Result<CaptureTicketResponse, WorkbenchError> {
        let job = {
            let desk = self.desk.lock().await;
            desk.session(sid)?;
            if desk.worklist.is_settling() {
                return Err(SubmitRejection::AlreadySettling.into());
            }
            if desk.in_flight > 0 {
                return Err(WorkbenchError::Analyzing);
            }
            desk.worklist
                .selected()
                .cloned()
                .ok_or(WorkbenchError::NoMission)?
        };

        let ticket = self.camera.open(target).await?;
        let ticket_id = ticket.id();
        let needs_gateway = target.needs_gateway();
        if needs_gateway {
            self.desk.lock().await.in_flight += 1;
        }
        metrics::counter!("captures_total", "target" => target.to_string()).increment(1);

        let workbench = self.clone();
        tokio::spawn(async move {
            match ticket.wait().await {
                Some(image) => workbench.absorb_capture(job, target, image).await,
                None if needs_gateway => workbench.desk.lock().await.in_flight -= 1,
                None => {}
            }
        });

        Ok(CaptureTicketResponse {
            ticket_id,
            target,
            label: format!("Capture {target}"),
        })
    }

    pub async fn deliver_frame(
        &self,
        sid: Uuid,
        ticket_id: Uuid,
        image: StillImage,
    ) -> Result<(), WorkbenchError> {
        self.check_session(sid).await?;
        Ok(self.camera.deliver(ticket_id, image).await?)
    }

    pub async fn cancel_capture(&self, sid: Uuid, ticket_id: Uuid) -> Result<(), WorkbenchError> {
        self.check_session(sid).await?;
        Ok(self.camera.cancel(ticket_id).await?)
    }

    pub async fn deny_capture(
        &self,
        sid: Uuid,
        ticket_id: Uuid,
        reason: String,
    ) -> Result<(), WorkbenchError> {
        self.check_session(sid).await?;
        Ok(self.camera.deny(ticket_id, reason).await?)
    }

    async fn absorb_capture(&self, job: InspectionJob, target: CaptureTarget, image: StillImage) {
        let assessment = lifecycle::assess_capture(&*self.gateway, &job, target, image).await;

        let mut desk = self.desk.lock().await;
        if target.needs_gateway() {
            desk.in_flight -= 1;
        }
        if !desk.worklist.apply(&job.id, assessment) {
            debug!(job_id = %job.id, target = %target, "Discarding result for a mission no longer selected");
        }
    }

    /// Settle the selected mission. Rejected outright unless it is 100 %
    /// complete with no analysis running; pays out exactly once.
    pub async fn submit(&self, sid: Uuid) -> Result<SubmitReceipt, WorkbenchError> {
        let (job, email) = {
            let mut desk = self.desk.lock().await;
            let email = desk.session(sid)?.profile.email.clone();
            if desk.in_flight > 0 {
                return Err(SubmitRejection::Analyzing.into());
            }
            let job = desk.worklist.begin_settlement()?;
            (job, email)
        };
        info!(job_id = %job.id, reward = job.reward, "Submitting mission");

        let settled =
            lifecycle::settle(&*self.store, &email, &job, self.settings.settlement_delay).await;

        let mut desk = self.desk.lock().await;
        let profile = match settled {
            Ok(profile) => profile,
            Err(e) => {
                desk.worklist.abort_settlement();
                warn!(job_id = %job.id, error = %e, "Payout failed, mission kept for retry");
                return Err(e.into());
            }
        };

        desk.worklist.complete_settlement(&job.id);
        if let Ok(session) = desk.session_mut(sid) {
            session.record_payout(profile.clone(), job.reward);
        }
        self.reschedule_wellness(&mut desk);

        metrics::counter!("missions_submitted_total").increment(1);
        metrics::counter!("payout_amount_total").increment(job.reward);

        Ok(SubmitReceipt {
            job_id: job.id,
            reward: job.reward,
            balance: profile.balance,
            impact_points: profile.stats.impact_points,
            level: profile.stats.level,
            message: SUBMIT_MESSAGE.to_string(),
        })
    }

    // ── Wallet & profile ─────────────────────────────────────────────

    pub async fn wallet(&self, sid: Uuid) -> Result<Wallet, WorkbenchError> {
        Ok(self.desk.lock().await.session(sid)?.wallet.clone())
    }

    /// Record a cash-out request. Nothing is paid out and the balance is
    /// left alone; the request stays pending.
    pub async fn request_withdrawal(
        &self,
        sid: Uuid,
        form: WithdrawalRequest,
    ) -> Result<Transaction, WorkbenchError> {
        form.validate()?;
        let mut desk = self.desk.lock().await;
        let session = desk.session_mut(sid)?;
        if form.amount > session.wallet.balance {
            return Err(WorkbenchError::InsufficientBalance {
                requested: form.amount,
                balance: session.wallet.balance,
            });
        }

        let transaction = Transaction::new(
            form.amount,
            TransactionKind::Withdrawal,
            TransactionStatus::Pending,
        );
        session.wallet.transactions.push(transaction.clone());
        info!(
            amount = form.amount,
            transaction_id = %transaction.id,
            "Withdrawal requested"
        );
        Ok(transaction)
    }

    pub async fn profile(&self, sid: Uuid) -> Result<UserProfile, WorkbenchError> {
        Ok(self.desk.lock().await.session(sid)?.profile.clone())
    }

    // ── Wellness reminder ────────────────────────────────────────────

    /// Restart the idle timer. It only runs while someone is signed in with
    /// no mission selected.
    fn reschedule_wellness(&self, desk: &mut Desk) {
        if let Some(timer) = desk.wellness_timer.take() {
            timer.abort();
        }
        if desk.session.is_none() || desk.worklist.selected().is_some() {
            return;
        }

        let shared = Arc::clone(&self.desk);
        let idle = self.settings.wellness_idle;
        desk.wellness_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            let mut desk = shared.lock().await;
            if desk.session.is_some() && desk.worklist.selected().is_none() {
                desk.wellness_due = true;
                info!("Wellness break due");
            }
        }));
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkbenchError {
    #[error("Not signed in")]
    NotSignedIn,

    #[error("An account for {0} already exists")]
    AccountExists(String),

    #[error("No account for {0}; please create an account first")]
    UnknownAccount(String),

    #[error("No account is linked to this passkey")]
    UnknownPasskey,

    #[error("No mission selected")]
    NoMission,

    #[error("An analysis is still running; wait for it before capturing again")]
    Analyzing,

    #[error("Withdrawal of {requested} exceeds balance of {balance}")]
    InsufficientBalance { requested: u64, balance: u64 },

    #[error(transparent)]
    Rejected(#[from] SubmitRejection),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Profile store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid request: {0}")]
    Validation(#[from] garde::Report),
}
