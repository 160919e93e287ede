//! Database repositories.

pub mod activity;
pub mod car;
pub mod carpool;
pub mod carpool_message;
pub mod child;
pub mod notification;
pub mod role;
pub mod user;

pub use activity::ActivityRepository;
pub use car::CarRepository;
pub use carpool::CarpoolRepository;
pub use carpool_message::CarpoolMessageRepository;
pub use child::ChildRepository;
pub use notification::NotificationRepository;
pub use role::RoleRepository;
pub use user::UserRepository;
