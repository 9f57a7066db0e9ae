pub mod coordinator;
pub mod credential;
pub mod factory;
pub mod redirect;
pub mod refresher;
pub mod request;
pub mod session;

pub use coordinator::AuthCoordinator;
pub use credential::Credential;
pub use factory::build_coordinator;
pub use redirect::{LogRedirect, LoginRedirect};
pub use refresher::{HttpTokenRefresher, RefreshError, TokenRefresher};
pub use request::ApiRequest;
pub use session::Session;
