//! One repository per API resource. Each builds its endpoint paths, sends
//! through [`ApiClient`](crate::api::ApiClient) and decodes via
//! [`envelope`](crate::envelope).

pub mod auth;
pub mod conversations;
pub mod friends;
pub mod groups;
pub mod locations;
pub mod plans;
pub mod users;

pub use auth::{AuthRepository, HttpTokenRefresher, RegisterRequest};
pub use conversations::ConversationRepository;
pub use friends::FriendRepository;
pub use groups::GroupRepository;
pub use locations::LocationRepository;
pub use plans::PlanRepository;
pub use users::UserRepository;
