//! Fixtures and recording doubles shared by service tests.

#![allow(clippy::unwrap_used)]

use crate::services::mailer::{MailSender, OutgoingEmail};
use crate::services::realtime::RealtimeTransport;
use async_trait::async_trait;
use carpool_common::{AppError, AppResult};
use carpool_db::entities::{
    activity, carpool, carpool::CarpoolType, carpool_message, child, notification, passenger,
    passenger::Occupant, user,
};
use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

pub fn user(id: &str) -> user::Model {
    user::Model {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        first_name: format!("First-{id}"),
        last_name: "Testsson".to_string(),
        phone: Some("070-0000000".to_string()),
        address: None,
        postcode: None,
        city: None,
        token: Some(format!("token-{id}")),
        is_accepted: true,
        notification_preferences: None,
        last_logged_in: Some(Utc::now().into()),
        created_at: Utc::now().into(),
    }
}

pub fn stale_user(id: &str) -> user::Model {
    let mut u = user(id);
    u.last_logged_in = Some((Utc::now() - Duration::days(10)).into());
    u
}

pub fn carpool(id: &str, driver_id: Option<&str>, capacity: i32, available: i32) -> carpool::Model {
    carpool::Model {
        id: id.to_string(),
        activity_id: "act1".to_string(),
        driver_id: driver_id.map(str::to_string),
        car_id: None,
        capacity,
        available_seats: available,
        carpool_type: CarpoolType::DropOff,
        departure_address: "Storgatan 1".to_string(),
        departure_postcode: "11122".to_string(),
        departure_city: "Stockholm".to_string(),
        created_at: Utc::now().into(),
    }
}

pub fn passenger(id: &str, carpool_id: &str, occupant: &Occupant) -> passenger::Model {
    let (child_id, user_id) = occupant.columns();
    passenger::Model {
        id: id.to_string(),
        carpool_id: carpool_id.to_string(),
        child_id,
        user_id,
        created_at: Utc::now().into(),
    }
}

pub fn activity(id: &str, role_id: Option<&str>) -> activity::Model {
    activity::Model {
        id: id.to_string(),
        name: "Hajk".to_string(),
        start_date: (Utc::now() + Duration::days(3)).into(),
        end_date: None,
        role_id: role_id.map(str::to_string),
        address: "Scoutstugan".to_string(),
        description: None,
        is_visible: true,
    }
}

pub fn child(id: &str, role_id: Option<&str>) -> child::Model {
    child::Model {
        id: id.to_string(),
        first_name: format!("Kid-{id}"),
        last_name: "Testsson".to_string(),
        date_of_birth: None,
        phone: None,
        role_id: role_id.map(str::to_string),
        created_at: Utc::now().into(),
    }
}

pub fn message(id: &str, carpool_id: &str, sender_id: &str, content: &str) -> carpool_message::Model {
    carpool_message::Model {
        id: id.to_string(),
        carpool_id: carpool_id.to_string(),
        sender_id: Some(sender_id.to_string()),
        content: content.to_string(),
        created_at: Utc::now().into(),
        status: carpool_message::STATUS_SENT.to_string(),
    }
}

pub fn notification(id: &str, user_id: &str, carpool_id: &str, message_id: Option<&str>) -> notification::Model {
    notification::Model {
        id: id.to_string(),
        user_id: user_id.to_string(),
        carpool_id: carpool_id.to_string(),
        message_id: message_id.map(str::to_string),
        message: "test".to_string(),
        is_read: false,
        created_at: Utc::now().into(),
    }
}

pub fn count(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
    maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(n)) }
}

/// Transport that records every emitted event.
#[derive(Clone, Default)]
pub struct RecordingRealtime {
    pub events: Arc<Mutex<Vec<(String, String, Value)>>>,
}

impl RecordingRealtime {
    pub async fn rooms_for(&self, event: &str) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|(_, e, _)| e == event)
            .map(|(room, _, _)| room.clone())
            .collect()
    }
}

#[async_trait]
impl RealtimeTransport for RecordingRealtime {
    async fn emit(&self, room: &str, event: &str, payload: Value) -> AppResult<()> {
        self.events
            .lock()
            .await
            .push((room.to_string(), event.to_string(), payload));
        Ok(())
    }
}

/// Mail sender that records or fails.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    pub sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    pub fail: bool,
    /// Simulated SMTP round-trip.
    pub delay: Option<std::time::Duration>,
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send_email(&self, email: &OutgoingEmail) -> AppResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AppError::ExternalService("smtp down".to_string()));
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}
