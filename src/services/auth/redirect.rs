/*
 * Responsibility
 * - Navigation sink fired once when the session is unrecoverable
 * - The coordinator only knows the trait; the binary decides what "go to login" means
 */
use tracing::warn;

pub trait LoginRedirect: Send + Sync + 'static {
    fn redirect_to_login(&self);
}

/// Announces the redirect through tracing. Used by the CLI, where "the login
/// view" is the `login` subcommand.
#[derive(Clone, Debug)]
pub struct LogRedirect {
    route: String,
}

impl LogRedirect {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }
}

impl LoginRedirect for LogRedirect {
    fn redirect_to_login(&self) {
        warn!(route = %self.route, "session expired, redirecting to login");
    }
}
