//! Database entities.

pub mod activity;
pub mod car;
pub mod carpool;
pub mod carpool_message;
pub mod child;
pub mod notification;
pub mod parent_child_link;
pub mod passenger;
pub mod role;
pub mod user;
pub mod user_role;

pub use activity::Entity as Activity;
pub use car::Entity as Car;
pub use carpool::Entity as Carpool;
pub use carpool_message::Entity as CarpoolMessage;
pub use child::Entity as Child;
pub use notification::Entity as Notification;
pub use parent_child_link::Entity as ParentChildLink;
pub use passenger::Entity as Passenger;
pub use role::Entity as Role;
pub use user::Entity as User;
pub use user_role::Entity as UserRole;
