use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::config::Settings;
use crate::models::{AnalyticsEvent, StreamSession};
use crate::services::analytics::AnalyticsLog;

/// A publish that reconnects within this window resumes the prior session
/// instead of starting a new one.
pub const RECONNECT_GRACE_PERIOD_SECS: i64 = 120;

const GRACE_PERIOD_MS: i64 = RECONNECT_GRACE_PERIOD_SECS * 1000;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The stream-session state machine. Sole owner of the process-wide
/// `StreamSession`; every mutation happens under the internal mutex and is
/// persisted to `session.json` before the lock is released. A failed persist
/// is logged and never rolls back the in-memory transition.
pub struct SessionManager {
    path: PathBuf,
    analytics: AnalyticsLog,
    session: Mutex<StreamSession>,
}

impl SessionManager {
    /// Load the persisted session, applying crash/restart recovery so a brief
    /// restart of this process does not look like a new broadcast.
    pub fn load(settings: &Settings, analytics: AnalyticsLog) -> Self {
        Self::load_from(PathBuf::from(&settings.paths.session), analytics)
    }

    pub fn load_from(path: PathBuf, analytics: AnalyticsLog) -> Self {
        let session = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<StreamSession>(&raw) {
                Ok(record) => recover(record, now_ms()),
                Err(e) => {
                    tracing::error!("Malformed session file, starting fresh: {}", e);
                    StreamSession::default()
                }
            },
            Err(_) => StreamSession::default(),
        };

        Self {
            path,
            analytics,
            session: Mutex::new(session),
        }
    }

    /// Publish started. Within the grace period after a disconnect this is a
    /// resume: the original start time is kept and no counters move.
    /// Otherwise a new session begins and `total_views` increments.
    pub fn on_publish_start(&self, user: &str) {
        self.on_publish_start_at(user, now_ms());
    }

    pub fn on_publish_start_at(&self, user: &str, now: i64) {
        let mut session = self.lock();

        let resumable = matches!(
            (session.start_time, session.disconnect_time),
            (Some(_), Some(disconnect)) if now - disconnect < GRACE_PERIOD_MS
        );

        if resumable {
            tracing::info!(publisher = user, "Stream resumed, start time preserved");
            session.is_live = true;
            session.disconnect_time = None;
            session.publisher = Some(user.to_string());
        } else {
            tracing::info!(publisher = user, "New stream session started");
            let total_views = session.total_views + 1;
            *session = StreamSession {
                is_live: true,
                start_time: Some(now),
                publisher: Some(user.to_string()),
                disconnect_time: None,
                peak_viewers: 0,
                total_views,
            };
            self.analytics.append(AnalyticsEvent::stream_start(user));
        }

        self.persist(&session);
    }

    /// Publish stopped. Logs the stop event and enters the grace period.
    /// A stop while not live is a no-op.
    pub fn on_publish_stop(&self) {
        self.on_publish_stop_at(now_ms());
    }

    pub fn on_publish_stop_at(&self, now: i64) {
        let mut session = self.lock();
        if !session.is_live {
            return;
        }

        let duration = session
            .start_time
            .map(|start| ((now - start).max(0) / 1000) as u64)
            .unwrap_or(0);
        self.analytics.append(AnalyticsEvent::stream_stop(
            session.publisher.clone(),
            duration,
            session.peak_viewers,
        ));

        session.is_live = false;
        session.disconnect_time = Some(now);
        self.persist(&session);
    }

    /// Current session state, after the passive expiry check: a disconnect
    /// older than the grace period collapses the session back to idle.
    /// `publisher` and `total_views` are historical and survive expiry.
    pub fn snapshot(&self) -> StreamSession {
        self.snapshot_at(now_ms())
    }

    pub fn snapshot_at(&self, now: i64) -> StreamSession {
        let mut session = self.lock();

        let expired = matches!(
            (session.is_live, session.disconnect_time),
            (false, Some(disconnect)) if now - disconnect > GRACE_PERIOD_MS
        );
        if expired {
            session.start_time = None;
            session.disconnect_time = None;
            session.peak_viewers = 0;
            self.persist(&session);
        }

        session.clone()
    }

    /// Viewer-count side effect: a successful poll during a live session
    /// raises the recorded peak.
    pub fn record_viewers(&self, count: u64) {
        let mut session = self.lock();
        if session.is_live && count > session.peak_viewers {
            session.peak_viewers = count;
            self.persist(&session);
        }
    }

    pub fn is_live(&self) -> bool {
        self.lock().is_live
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StreamSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, session: &StreamSession) {
        let raw = match serde_json::to_string_pretty(session) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("Failed to serialize session: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, raw) {
            tracing::error!("Failed to persist session: {}", e);
        }
    }
}

/// Startup recovery for a persisted record.
///
/// Disconnected within the grace period: restore and wait for the reconnect.
/// Crashed while live: treat as a just-now disconnect, eligible for resume.
/// Anything else starts from defaults.
fn recover(record: StreamSession, now: i64) -> StreamSession {
    match (record.start_time, record.disconnect_time) {
        (Some(_), Some(disconnect)) if now - disconnect < GRACE_PERIOD_MS => {
            tracing::info!("Restored session from disk, waiting for reconnect");
            StreamSession {
                is_live: false,
                ..record
            }
        }
        (Some(_), None) if record.is_live => {
            tracing::info!("Recovered crashed live session");
            StreamSession {
                is_live: false,
                disconnect_time: Some(now),
                ..record
            }
        }
        _ => {
            if record.start_time.is_some() {
                tracing::info!("Previous session expired, starting fresh");
            }
            StreamSession::default()
        }
    }
}
