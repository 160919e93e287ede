//! Notification fan-out and read management.
//!
//! Every carpool mutation that other people care about (a chat message, a
//! passenger joining or leaving) is fanned out here: one persisted row per
//! interested party, a live push to their personal room unless they are
//! already looking at the chat, and for chat messages an escalation email
//! when the recipient seems to be away.

use crate::services::email_suppression::EmailSuppressionService;
use crate::services::mailer::{MailService, chat_escalation_email, passenger_change_email};
use crate::services::presence::PresenceService;
use crate::services::realtime::{RealtimeService, events, user_room};
use crate::services::roster::{PassengerEntry, RosterResolver};
use carpool_common::{AppResult, IdGenerator, NotificationConfig};
use carpool_db::{
    entities::{
        activity, carpool, carpool_message, notification, notification::NotificationKind,
        passenger::Occupant,
    },
    repositories::{ActivityRepository, CarpoolRepository, NotificationRepository, UserRepository},
};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use sea_orm::Set;
use serde::Serialize;
use serde_json::json;

/// What happened to the carpool.
#[derive(Debug, Clone)]
pub enum FanOutEvent {
    ChatMessage(carpool_message::Model),
    PassengerAdded,
    /// Carries the occupant whose row is already gone.
    PassengerRemoved(Occupant),
}

impl FanOutEvent {
    const fn kind(&self) -> NotificationKind {
        match self {
            Self::ChatMessage(_) => NotificationKind::Chat,
            Self::PassengerAdded | Self::PassengerRemoved(_) => NotificationKind::Passenger,
        }
    }

    const fn departed(&self) -> Option<&Occupant> {
        match self {
            Self::PassengerRemoved(occupant) => Some(occupant),
            Self::ChatMessage(_) | Self::PassengerAdded => None,
        }
    }
}

/// Outcome of one fan-out, mostly for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub notified: Vec<String>,
    pub pushed: usize,
    pub emailed: usize,
    pub failed: usize,
}

/// Inputs of the escalation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationFacts {
    /// Last login missing or older than the stale threshold.
    pub stale_login: bool,
    /// Unread chat notifications for the carpool since last login.
    pub unread_since_login: u64,
    /// Unread chat notifications for the carpool inside the burst window.
    pub unread_in_window: u64,
}

/// Whether a chat notification should be escalated to email.
///
/// Suppression is checked separately by the caller.
#[must_use]
pub const fn should_escalate(facts: &EscalationFacts, burst_threshold: u64) -> bool {
    (facts.stale_login && facts.unread_since_login >= 1)
        || facts.unread_in_window >= burst_threshold
}

/// Whether a login timestamp counts as away.
#[must_use]
pub fn is_stale_login(
    last_logged_in: Option<DateTime<FixedOffset>>,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> bool {
    last_logged_in.is_none_or(|t| now.signed_duration_since(t) > stale_after)
}

/// A notification as shown to its recipient.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub id: String,
    pub carpool_id: String,
    pub message_id: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<FixedOffset>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

impl From<notification::Model> for NotificationView {
    fn from(n: notification::Model) -> Self {
        let kind = n.kind();
        Self {
            id: n.id,
            carpool_id: n.carpool_id,
            message_id: n.message_id,
            message: n.message,
            is_read: n.is_read,
            created_at: n.created_at,
            kind,
        }
    }
}

/// Notifications of a user with the unread count.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<NotificationView>,
    pub unread_count: u64,
}

/// Snapshot of the carpool sent along with every live notification.
struct CarpoolSnapshot<'a> {
    carpool: &'a carpool::Model,
    activity: Option<&'a activity::Model>,
    passengers: &'a [PassengerEntry],
}

impl CarpoolSnapshot<'_> {
    fn to_json(&self) -> serde_json::Value {
        json!({
            "carpool_id": self.carpool.id,
            "carpool_type": self.carpool.carpool_type,
            "available_seats": self.carpool.available_seats,
            "departure_address": self.carpool.departure_address,
            "departure_city": self.carpool.departure_city,
            "activity": self.activity.map(|a| json!({
                "id": a.id,
                "name": a.name,
                "start_date": a.start_date,
            })),
            "passengers": self.passengers,
        })
    }
}

/// Notification service.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    user_repo: UserRepository,
    carpool_repo: CarpoolRepository,
    activity_repo: ActivityRepository,
    roster: RosterResolver,
    presence: PresenceService,
    suppression: EmailSuppressionService,
    realtime: Option<RealtimeService>,
    mailer: Option<MailService>,
    config: NotificationConfig,
    app_url: String,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        notification_repo: NotificationRepository,
        user_repo: UserRepository,
        carpool_repo: CarpoolRepository,
        activity_repo: ActivityRepository,
        roster: RosterResolver,
        presence: PresenceService,
        suppression: EmailSuppressionService,
        config: NotificationConfig,
        app_url: impl Into<String>,
    ) -> Self {
        Self {
            notification_repo,
            user_repo,
            carpool_repo,
            activity_repo,
            roster,
            presence,
            suppression,
            realtime: None,
            mailer: None,
            config,
            app_url: app_url.into(),
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the realtime transport.
    pub fn set_realtime(&mut self, realtime: RealtimeService) {
        self.realtime = Some(realtime);
    }

    /// Set the mail sender. Without one, no emails are sent.
    pub fn set_mailer(&mut self, mailer: MailService) {
        self.mailer = Some(mailer);
    }

    /// Fan a carpool event out to every interested party except the actor.
    ///
    /// Not idempotent: call it once per mutation. A failure for one
    /// recipient is logged and the loop moves on.
    pub async fn fan_out(
        &self,
        carpool_id: &str,
        actor_id: &str,
        event: &FanOutEvent,
    ) -> AppResult<FanOutReport> {
        let carpool = self.carpool_repo.get_by_id(carpool_id).await?;
        let activity = self.activity_repo.find_by_id(&carpool.activity_id).await?;
        let actor_name = self
            .user_repo
            .find_by_id(actor_id)
            .await?
            .map_or_else(|| "Någon".to_string(), |u| u.full_name());

        let roster = self
            .roster
            .resolve(&carpool, Some(actor_id), event.departed())
            .await?;
        let passengers = self.roster.passenger_list(&carpool.id).await?;
        let snapshot = CarpoolSnapshot {
            carpool: &carpool,
            activity: activity.as_ref(),
            passengers: &passengers,
        }
        .to_json();

        let activity_name = activity.as_ref().map_or("aktiviteten", |a| a.name.as_str());
        let text = match event {
            FanOutEvent::ChatMessage(_) => {
                format!("Nytt meddelande från {actor_name} i samåkningen till {activity_name}")
            }
            FanOutEvent::PassengerAdded => format!("{actor_name} har lagt till en passagerare."),
            FanOutEvent::PassengerRemoved(_) => {
                format!("{actor_name} har tagit bort en passagerare.")
            }
        };

        let mut report = FanOutReport::default();
        for recipient_id in &roster.recipients {
            match self
                .notify_one(
                    recipient_id,
                    &carpool,
                    event,
                    &text,
                    &actor_name,
                    &snapshot,
                    activity_name,
                )
                .await
            {
                Ok((pushed, emailed)) => {
                    report.notified.push(recipient_id.clone());
                    report.pushed += usize::from(pushed);
                    report.emailed += usize::from(emailed);
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        error = %e,
                        recipient_id = %recipient_id,
                        carpool_id = %carpool.id,
                        "Failed to notify recipient"
                    );
                }
            }
        }

        if matches!(
            event,
            FanOutEvent::PassengerAdded | FanOutEvent::PassengerRemoved(_)
        ) {
            match self
                .email_driver(&carpool, actor_id, &actor_name, event)
                .await
            {
                Ok(true) => report.emailed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, carpool_id = %carpool.id, "Failed to email driver");
                }
            }
        }

        tracing::debug!(
            carpool_id = %carpool.id,
            kind = event.kind().as_str(),
            notified = report.notified.len(),
            pushed = report.pushed,
            emailed = report.emailed,
            failed = report.failed,
            "Fan-out finished"
        );

        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn notify_one(
        &self,
        recipient_id: &str,
        carpool: &carpool::Model,
        event: &FanOutEvent,
        text: &str,
        actor_name: &str,
        snapshot: &serde_json::Value,
        activity_name: &str,
    ) -> AppResult<(bool, bool)> {
        let message_id = match event {
            FanOutEvent::ChatMessage(m) => Some(m.id.clone()),
            FanOutEvent::PassengerAdded | FanOutEvent::PassengerRemoved(_) => None,
        };

        let row = self
            .notification_repo
            .create(notification::ActiveModel {
                id: Set(self.id_gen.generate()),
                user_id: Set(recipient_id.to_string()),
                carpool_id: Set(carpool.id.clone()),
                message_id: Set(message_id),
                message: Set(text.to_string()),
                is_read: Set(false),
                created_at: Set(Utc::now().into()),
            })
            .await?;

        // Viewers of the chat already got the room event
        let mut pushed = false;
        if !self.presence.is_present(&carpool.id, recipient_id).await
            && let Some(ref realtime) = self.realtime
        {
            let payload = json!({
                "id": row.id,
                "type": row.kind(),
                "message": row.message,
                "user_name": actor_name,
                "carpool_details": snapshot,
            });
            match realtime
                .emit(&user_room(recipient_id), events::NOTIFICATION, payload)
                .await
            {
                Ok(()) => pushed = true,
                Err(e) => tracing::warn!(error = %e, "Failed to push notification"),
            }
        }

        let emailed = match event {
            FanOutEvent::ChatMessage(_) => {
                match self
                    .maybe_escalate(recipient_id, &carpool.id, activity_name)
                    .await
                {
                    Ok(sent) => sent,
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            recipient_id = %recipient_id,
                            "Failed to send chat escalation email"
                        );
                        false
                    }
                }
            }
            FanOutEvent::PassengerAdded | FanOutEvent::PassengerRemoved(_) => false,
        };

        Ok((pushed, emailed))
    }

    /// Send a chat escalation email if the recipient looks away and has not
    /// been emailed since their last read.
    async fn maybe_escalate(
        &self,
        recipient_id: &str,
        carpool_id: &str,
        activity_name: &str,
    ) -> AppResult<bool> {
        let Some(ref mailer) = self.mailer else {
            return Ok(false);
        };

        if self.suppression.has_sent(recipient_id, carpool_id).await? {
            return Ok(false);
        }

        let Some(recipient) = self.user_repo.find_by_id(recipient_id).await? else {
            return Ok(false);
        };

        let now = Utc::now();
        let stale_login = is_stale_login(
            recipient.last_logged_in,
            now,
            Duration::days(self.config.stale_login_days),
        );
        let unread_since_login = if stale_login {
            self.notification_repo
                .count_unread_chat(recipient_id, carpool_id, recipient.last_logged_in)
                .await?
        } else {
            0
        };
        let window_start = now - Duration::minutes(self.config.burst_window_minutes);
        let unread_in_window = self
            .notification_repo
            .count_unread_chat(recipient_id, carpool_id, Some(window_start.into()))
            .await?;

        let facts = EscalationFacts {
            stale_login,
            unread_since_login,
            unread_in_window,
        };
        if !should_escalate(&facts, self.config.burst_threshold) {
            return Ok(false);
        }

        // Another fan-out for the same carpool may have got here first
        if !self.suppression.try_mark(recipient_id, carpool_id).await? {
            return Ok(false);
        }

        let email = chat_escalation_email(
            &recipient.email,
            &recipient.first_name,
            activity_name,
            unread_since_login.max(unread_in_window),
            &self.app_url,
        );
        if let Err(e) = mailer.send_email(&email).await {
            // Only a delivered email closes the window
            if let Err(reset_err) = self.suppression.reset(recipient_id, carpool_id).await {
                tracing::warn!(error = %reset_err, "Failed to release email suppression");
            }
            return Err(e);
        }

        tracing::info!(
            recipient_id = %recipient_id,
            carpool_id = %carpool_id,
            stale_login,
            unread_in_window,
            "Sent chat escalation email"
        );

        Ok(true)
    }

    /// Email the driver about a passenger change if they opted in.
    async fn email_driver(
        &self,
        carpool: &carpool::Model,
        actor_id: &str,
        actor_name: &str,
        event: &FanOutEvent,
    ) -> AppResult<bool> {
        let Some(ref mailer) = self.mailer else {
            return Ok(false);
        };
        let Some(ref driver_id) = carpool.driver_id else {
            return Ok(false);
        };
        if driver_id == actor_id {
            return Ok(false);
        }
        let Some(driver) = self.user_repo.find_by_id(driver_id).await? else {
            return Ok(false);
        };
        if !driver.preferences().passenger_notifications {
            return Ok(false);
        }

        let email = passenger_change_email(
            &driver.email,
            &driver.first_name,
            actor_name,
            matches!(event, FanOutEvent::PassengerAdded),
            &carpool.id,
            &self.app_url,
        );
        mailer.send_email(&email).await?;

        Ok(true)
    }

    /// Notifications of a user, newest first, with the unread count.
    pub async fn list(&self, user_id: &str) -> AppResult<NotificationList> {
        let rows = self.notification_repo.find_by_user(user_id).await?;
        let unread_count = rows.iter().filter(|n| !n.is_read).count() as u64;

        Ok(NotificationList {
            notifications: rows.into_iter().map(NotificationView::from).collect(),
            unread_count,
        })
    }

    /// Unread notifications of a user.
    pub async fn unread_count(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(user_id).await
    }

    /// Mark one type of notification for a carpool read and clean up.
    ///
    /// Read rows are deleted right away. Returns the user's fresh unread
    /// count, which is also pushed to their personal room.
    pub async fn mark_read(
        &self,
        user_id: &str,
        carpool_id: &str,
        kind: NotificationKind,
    ) -> AppResult<u64> {
        let marked = self
            .notification_repo
            .mark_read(user_id, carpool_id, kind)
            .await?;

        if let Err(e) = self.suppression.reset(user_id, carpool_id).await {
            tracing::warn!(error = %e, user_id = %user_id, "Failed to reset email suppression");
        }

        let deleted = self
            .notification_repo
            .delete_read(user_id, carpool_id, kind)
            .await?;
        let unread_count = self.notification_repo.count_unread(user_id).await?;

        if let Some(ref realtime) = self.realtime {
            let payload = json!({
                "carpool_id": carpool_id,
                "type": kind,
                "unread_count": unread_count,
            });
            if let Err(e) = realtime
                .emit(&user_room(user_id), events::NOTIFICATIONS_UPDATED, payload)
                .await
            {
                tracing::warn!(error = %e, "Failed to publish notifications_updated");
            }
        }

        tracing::debug!(
            user_id = %user_id,
            carpool_id = %carpool_id,
            kind = kind.as_str(),
            marked,
            deleted,
            "Marked notifications read"
        );

        Ok(unread_count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::email_suppression::{EmailSuppression, InMemoryEmailSuppression};
    use crate::services::presence::{InMemoryPresenceTracker, PresenceTracker};
    use crate::services::testing::{self, RecordingMailer, RecordingRealtime};
    use carpool_db::{
        entities::{parent_child_link, passenger},
        repositories::ChildRepository,
    };
    use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, MockExecResult};
    use std::sync::Arc;

    struct Harness {
        service: NotificationService,
        realtime: RecordingRealtime,
        mailer: RecordingMailer,
        presence: InMemoryPresenceTracker,
        suppression: InMemoryEmailSuppression,
    }

    fn harness(db: DatabaseConnection, mailer: RecordingMailer) -> Harness {
        harness_sharing(db, mailer, InMemoryEmailSuppression::new())
    }

    fn harness_sharing(
        db: DatabaseConnection,
        mailer: RecordingMailer,
        suppression: InMemoryEmailSuppression,
    ) -> Harness {
        let db = Arc::new(db);
        let presence = InMemoryPresenceTracker::new();
        let realtime = RecordingRealtime::default();

        let roster = RosterResolver::new(
            CarpoolRepository::new(db.clone()),
            ChildRepository::new(db.clone()),
            UserRepository::new(db.clone()),
        );
        let mut service = NotificationService::new(
            NotificationRepository::new(db.clone()),
            UserRepository::new(db.clone()),
            CarpoolRepository::new(db.clone()),
            ActivityRepository::new(db),
            roster,
            Arc::new(presence.clone()),
            Arc::new(suppression.clone()),
            NotificationConfig::default(),
            "https://carpool.example",
        );
        service.set_realtime(Arc::new(realtime.clone()));
        service.set_mailer(Arc::new(mailer.clone()));

        Harness {
            service,
            realtime,
            mailer,
            presence,
            suppression,
        }
    }

    /// Queries up to and including the notification insert for a carpool
    /// driven by `d` with one direct passenger `u1`.
    fn chat_db(actor: &str, recipient: &str) -> MockDatabase {
        let row = testing::passenger("p1", "c1", &Occupant::DirectUser("u1".to_string()));
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[testing::carpool("c1", Some("d"), 4, 3)]])
            .append_query_results([[testing::activity("act1", None)]])
            .append_query_results([[testing::user(actor)]])
            .append_query_results([[row.clone()]])
            .append_query_results([[row]])
            .append_query_results([[testing::user("u1")]])
            .append_query_results([[testing::notification("n1", recipient, "c1", Some("m1"))]])
    }

    fn link(user_id: &str, child_id: &str) -> parent_child_link::Model {
        parent_child_link::Model {
            user_id: user_id.to_string(),
            child_id: child_id.to_string(),
        }
    }

    fn chat_event() -> FanOutEvent {
        FanOutEvent::ChatMessage(testing::message("m1", "c1", "d", "Vi åker 08:00"))
    }

    #[test]
    fn test_should_escalate_stale_login() {
        let facts = EscalationFacts {
            stale_login: true,
            unread_since_login: 1,
            unread_in_window: 1,
        };
        assert!(should_escalate(&facts, 5));

        let nothing_unread = EscalationFacts {
            unread_since_login: 0,
            unread_in_window: 0,
            ..facts
        };
        assert!(!should_escalate(&nothing_unread, 5));
    }

    #[test]
    fn test_should_escalate_burst() {
        let fresh = EscalationFacts {
            stale_login: false,
            unread_since_login: 0,
            unread_in_window: 4,
        };
        assert!(!should_escalate(&fresh, 5));
        assert!(should_escalate(
            &EscalationFacts {
                unread_in_window: 5,
                ..fresh
            },
            5
        ));
    }

    #[test]
    fn test_stale_login() {
        let now = Utc::now();
        let two_days = Duration::days(2);
        assert!(is_stale_login(None, now, two_days));
        assert!(is_stale_login(
            Some((now - Duration::days(3)).into()),
            now,
            two_days
        ));
        assert!(!is_stale_login(
            Some((now - Duration::hours(5)).into()),
            now,
            two_days
        ));
    }

    #[tokio::test]
    async fn test_chat_fan_out_emails_stale_recipient_once() {
        let db = chat_db("d", "u1")
            .append_query_results([[testing::stale_user("u1")]])
            .append_query_results([[testing::count(1)]])
            .append_query_results([[testing::count(1)]])
            .into_connection();
        let h = harness(db, RecordingMailer::default());

        let report = h.service.fan_out("c1", "d", &chat_event()).await.unwrap();

        assert_eq!(report.notified, vec!["u1".to_string()]);
        assert_eq!(report.pushed, 1);
        assert_eq!(report.emailed, 1);
        assert_eq!(h.mailer.sent.lock().await.len(), 1);
        assert!(h.suppression.has_sent("u1", "c1").await.unwrap());
        assert_eq!(
            h.realtime.rooms_for(events::NOTIFICATION).await,
            vec!["user_u1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_suppressed_recipient_gets_no_second_email() {
        let db = chat_db("d", "u1").into_connection();
        let h = harness(db, RecordingMailer::default());
        h.suppression.try_mark("u1", "c1").await.unwrap();

        let report = h.service.fan_out("c1", "d", &chat_event()).await.unwrap();

        assert_eq!(report.notified.len(), 1);
        assert_eq!(report.emailed, 0);
        assert!(h.mailer.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_present_recipient_skips_push_but_keeps_row() {
        let db = chat_db("d", "u1")
            .append_query_results([[testing::user("u1")]])
            .append_query_results([[testing::count(1)]])
            .into_connection();
        let h = harness(db, RecordingMailer::default());
        h.presence.join("c1", "u1").await;

        let report = h.service.fan_out("c1", "d", &chat_event()).await.unwrap();

        assert_eq!(report.notified, vec!["u1".to_string()]);
        assert_eq!(report.pushed, 0);
        assert_eq!(report.emailed, 0);
        assert!(h.realtime.rooms_for(events::NOTIFICATION).await.is_empty());
    }

    #[tokio::test]
    async fn test_burst_of_unread_messages_escalates() {
        let db = chat_db("d", "u1")
            .append_query_results([[testing::user("u1")]])
            .append_query_results([[testing::count(5)]])
            .into_connection();
        let h = harness(db, RecordingMailer::default());

        let report = h.service.fan_out("c1", "d", &chat_event()).await.unwrap();

        assert_eq!(report.emailed, 1);
        let sent = h.mailer.sent.lock().await;
        assert_eq!(sent[0].recipients, vec!["u1@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_email_leaves_suppression_open() {
        let db = chat_db("d", "u1")
            .append_query_results([[testing::stale_user("u1")]])
            .append_query_results([[testing::count(2)]])
            .append_query_results([[testing::count(2)]])
            .into_connection();
        let h = harness(
            db,
            RecordingMailer {
                fail: true,
                ..RecordingMailer::default()
            },
        );

        let report = h.service.fan_out("c1", "d", &chat_event()).await.unwrap();

        assert_eq!(report.notified.len(), 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.emailed, 0);
        assert!(!h.suppression.has_sent("u1", "c1").await.unwrap());
    }

    #[tokio::test]
    async fn test_passenger_added_emails_opted_in_driver() {
        let mut driver = testing::user("d");
        driver.notification_preferences =
            Some(serde_json::json!({ "passenger_notifications": true }));

        let db = chat_db("u1", "d")
            .append_query_results([[driver]])
            .into_connection();
        let h = harness(db, RecordingMailer::default());

        let report = h
            .service
            .fan_out("c1", "u1", &FanOutEvent::PassengerAdded)
            .await
            .unwrap();

        assert_eq!(report.notified, vec!["d".to_string()]);
        assert_eq!(report.emailed, 1);
        let sent = h.mailer.sent.lock().await;
        assert_eq!(sent[0].subject, "Ny passagerare i din samåkning c1");
    }

    #[tokio::test]
    async fn test_passenger_change_skips_driver_without_opt_in() {
        let db = chat_db("u1", "d")
            .append_query_results([[testing::user("d")]])
            .into_connection();
        let h = harness(db, RecordingMailer::default());

        let report = h
            .service
            .fan_out(
                "c1",
                "u1",
                &FanOutEvent::PassengerRemoved(Occupant::DirectUser("u1".to_string())),
            )
            .await
            .unwrap();

        assert_eq!(report.emailed, 0);
        assert!(h.mailer.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_resets_and_publishes_count() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 6,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 6,
                },
            ])
            .append_query_results([[testing::count(1)]])
            .into_connection();
        let h = harness(db, RecordingMailer::default());
        h.suppression.try_mark("u1", "c1").await.unwrap();

        let unread = h
            .service
            .mark_read("u1", "c1", NotificationKind::Chat)
            .await
            .unwrap();

        assert_eq!(unread, 1);
        assert!(!h.suppression.has_sent("u1", "c1").await.unwrap());
        assert_eq!(
            h.realtime.rooms_for(events::NOTIFICATIONS_UPDATED).await,
            vec!["user_u1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_back_to_back_chat_messages_send_one_email() {
        let stale_db = || {
            chat_db("d", "u1")
                .append_query_results([[testing::stale_user("u1")]])
                .append_query_results([[testing::count(1)]])
                .append_query_results([[testing::count(1)]])
                .into_connection()
        };
        let mailer = RecordingMailer {
            delay: Some(std::time::Duration::from_millis(100)),
            ..RecordingMailer::default()
        };
        let suppression = InMemoryEmailSuppression::new();
        let first = harness_sharing(stale_db(), mailer.clone(), suppression.clone());
        let second = harness_sharing(stale_db(), mailer.clone(), suppression.clone());

        let event = chat_event();
        let (r1, r2) = tokio::join!(
            first.service.fan_out("c1", "d", &event),
            second.service.fan_out("c1", "d", &event),
        );

        assert_eq!(r1.unwrap().emailed + r2.unwrap().emailed, 1);
        assert_eq!(mailer.sent.lock().await.len(), 1);
        assert!(suppression.has_sent("u1", "c1").await.unwrap());
    }

    #[tokio::test]
    async fn test_removed_child_guardians_are_notified() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[testing::carpool("c1", Some("d"), 4, 4)]])
            .append_query_results([[testing::activity("act1", None)]])
            .append_query_results([[testing::user("d")]])
            .append_query_results([Vec::<passenger::Model>::new()])
            .append_query_results([[link("g1", "kid"), link("g2", "kid")]])
            .append_query_results([[testing::user("g1"), testing::user("g2")]])
            .append_query_results([Vec::<passenger::Model>::new()])
            .append_query_results([[testing::notification("n1", "g1", "c1", None)]])
            .append_query_results([[testing::notification("n2", "g2", "c1", None)]])
            .into_connection();
        let h = harness(db, RecordingMailer::default());

        let report = h
            .service
            .fan_out(
                "c1",
                "d",
                &FanOutEvent::PassengerRemoved(Occupant::Child("kid".to_string())),
            )
            .await
            .unwrap();

        assert_eq!(report.notified, vec!["g1".to_string(), "g2".to_string()]);
        assert_eq!(report.failed, 0);
        assert_eq!(
            h.realtime.rooms_for(events::NOTIFICATION).await,
            vec!["user_g1".to_string(), "user_g2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_recipient_does_not_stop_fan_out() {
        let kid = testing::passenger("p1", "c1", &Occupant::Child("kid".to_string()));
        let rider = testing::passenger("p2", "c1", &Occupant::DirectUser("u1".to_string()));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[testing::carpool("c1", Some("d"), 4, 2)]])
            .append_query_results([[testing::activity("act1", None)]])
            .append_query_results([[testing::user("u1")]])
            // Roster
            .append_query_results([[kid.clone(), rider.clone()]])
            .append_query_results([[link("g1", "kid"), link("g2", "kid")]])
            .append_query_results([[testing::user("g1"), testing::user("g2")]])
            // Passenger list
            .append_query_results([[kid, rider]])
            .append_query_results([[testing::child("kid", None)]])
            .append_query_results([[testing::user("u1")]])
            .append_query_results([[link("g1", "kid"), link("g2", "kid")]])
            .append_query_results([[testing::user("g1"), testing::user("g2")]])
            // One insert per recipient, driver first
            .append_query_errors([DbErr::Custom("insert failed".to_string())])
            .append_query_results([[testing::notification("n2", "g1", "c1", Some("m1"))]])
            .append_query_results([[testing::notification("n3", "g2", "c1", Some("m1"))]])
            .into_connection();
        let mut h = harness(db, RecordingMailer::default());
        h.service.mailer = None;

        let event = FanOutEvent::ChatMessage(testing::message("m1", "c1", "u1", "Jag kör hem"));
        let report = h.service.fan_out("c1", "u1", &event).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.notified, vec!["g1".to_string(), "g2".to_string()]);
        assert_eq!(report.pushed, 2);
    }

    #[tokio::test]
    async fn test_mark_read_of_passenger_notifications_resets_suppression() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .append_query_results([[testing::count(0)]])
            .into_connection();
        let h = harness(db, RecordingMailer::default());
        h.suppression.try_mark("u1", "c1").await.unwrap();

        h.service
            .mark_read("u1", "c1", NotificationKind::Passenger)
            .await
            .unwrap();

        assert!(!h.suppression.has_sent("u1", "c1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_counts_unread() {
        let mut read = testing::notification("n1", "u1", "c1", None);
        read.is_read = true;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                testing::notification("n2", "u1", "c1", Some("m1")),
                read,
            ]])
            .into_connection();
        let h = harness(db, RecordingMailer::default());

        let list = h.service.list("u1").await.unwrap();

        assert_eq!(list.unread_count, 1);
        assert_eq!(list.notifications[0].kind, NotificationKind::Chat);
    }
}
