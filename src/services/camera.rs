use std::sync::Arc;

use tokio::sync::{oneshot, Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::evidence::{ImageError, StillImage};
use crate::models::mission::CaptureTarget;

/// How the operator left the capture screen.
#[derive(Debug)]
enum Shot {
    Frame(StillImage),
    Cancelled,
    Denied(String),
}

struct PendingShot {
    ticket_id: Uuid,
    tx: oneshot::Sender<Shot>,
}

/// The device camera, shared by the whole client. Only one capture screen
/// may hold the stream at a time.
pub struct Camera {
    stream: Arc<Semaphore>,
    pending: Mutex<Option<PendingShot>>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    pub fn new() -> Self {
        Self {
            stream: Arc::new(Semaphore::new(1)),
            pending: Mutex::new(None),
        }
    }

    /// Acquire the stream and open a capture screen for `target`.
    pub async fn open(&self, target: CaptureTarget) -> Result<CaptureTicket, CaptureError> {
        let permit = self
            .stream
            .clone()
            .try_acquire_owned()
            .map_err(|_| CaptureError::Busy)?;

        let ticket_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        *self.pending.lock().await = Some(PendingShot { ticket_id, tx });

        metrics::gauge!("camera_sessions_open").increment(1.0);
        info!(ticket = %ticket_id, target = %target, "Camera stream acquired");

        Ok(CaptureTicket {
            id: ticket_id,
            target,
            rx,
            stream: StreamGuard {
                ticket_id,
                _permit: permit,
            },
        })
    }

    /// Shutter pressed: hand the frame to whoever is waiting on the ticket.
    pub async fn deliver(&self, ticket_id: Uuid, image: StillImage) -> Result<(), CaptureError> {
        self.resolve(ticket_id, Shot::Frame(image)).await
    }

    pub async fn cancel(&self, ticket_id: Uuid) -> Result<(), CaptureError> {
        self.resolve(ticket_id, Shot::Cancelled).await
    }

    /// The device refused access to the camera.
    pub async fn deny(&self, ticket_id: Uuid, reason: String) -> Result<(), CaptureError> {
        self.resolve(ticket_id, Shot::Denied(reason)).await
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.available_permits() == 0
    }

    async fn resolve(&self, ticket_id: Uuid, shot: Shot) -> Result<(), CaptureError> {
        let mut pending = self.pending.lock().await;
        match pending.take() {
            Some(open) if open.ticket_id == ticket_id && !open.tx.is_closed() => {
                // The receiver can only vanish between the check and here if
                // the ticket was dropped; the stream is released either way.
                let _ = open.tx.send(shot);
                Ok(())
            }
            Some(open) if open.ticket_id != ticket_id => {
                *pending = Some(open);
                Err(CaptureError::UnknownTicket(ticket_id))
            }
            _ => Err(CaptureError::UnknownTicket(ticket_id)),
        }
    }
}

/// An open capture screen. Holds the camera stream until it is dropped.
pub struct CaptureTicket {
    id: Uuid,
    target: CaptureTarget,
    rx: oneshot::Receiver<Shot>,
    stream: StreamGuard,
}

impl CaptureTicket {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> CaptureTarget {
        self.target
    }

    /// Suspend until the operator shoots, cancels, or the device refuses.
    /// Only a shot yields an image. The stream is released on return.
    pub async fn wait(self) -> Option<StillImage> {
        let CaptureTicket {
            id,
            target,
            rx,
            stream,
        } = self;

        let image = match rx.await {
            Ok(Shot::Frame(image)) => {
                info!(ticket = %id, target = %target, bytes = image.len(), "Frame captured");
                Some(image)
            }
            Ok(Shot::Cancelled) => {
                info!(ticket = %id, target = %target, "Capture cancelled");
                None
            }
            Ok(Shot::Denied(reason)) => {
                warn!(ticket = %id, target = %target, reason = %reason, "Camera access denied");
                None
            }
            Err(_) => {
                debug!(ticket = %id, "Capture screen closed without a result");
                None
            }
        };
        drop(stream);
        image
    }
}

struct StreamGuard {
    ticket_id: Uuid,
    _permit: OwnedSemaphorePermit,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        metrics::gauge!("camera_sessions_open").decrement(1.0);
        debug!(ticket = %self.ticket_id, "Camera stream released");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Camera is already in use by another capture")]
    Busy,

    #[error("No open capture screen with ticket {0}")]
    UnknownTicket(Uuid),

    #[error("Captured frame rejected: {0}")]
    Image(#[from] ImageError),
}
