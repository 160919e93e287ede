//! Business logic services.

#![allow(missing_docs)]

pub mod admin;
pub mod carpool;
pub mod chat;
pub mod email_suppression;
pub mod mailer;
pub mod notification;
pub mod presence;
pub mod realtime;
pub mod roles;
pub mod roster;
pub mod seat_ledger;

#[cfg(test)]
pub(crate) mod testing;

pub use admin::AdminService;
pub use carpool::{
    CarpoolDetails, CarpoolService, CarpoolSummary, CreateCarpoolInput, DriverContact,
};
pub use chat::ChatService;
pub use email_suppression::{
    EmailSuppression, EmailSuppressionService, InMemoryEmailSuppression, RedisEmailSuppression,
};
pub use mailer::{MailSender, MailService, OutgoingEmail, SmtpMailer};
pub use notification::{
    FanOutEvent, FanOutReport, NotificationList, NotificationService, NotificationView,
};
pub use presence::{
    InMemoryPresenceTracker, PresenceService, PresenceTracker, RoomState, RoomTransition,
};
pub use realtime::{NoOpRealtime, RealtimeService, RealtimeTransport, carpool_room, user_room};
pub use roles::{RoleRegistry, RoleService};
pub use roster::{GuardianEntry, PassengerEntry, Roster, RosterResolver};
pub use seat_ledger::{
    EligibleChild, EligibleChildren, JoinStatus, OccupantSelection, SeatChange, SeatLedger,
};
