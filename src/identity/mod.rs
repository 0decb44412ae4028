//! Identity and session handling.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod provider;
mod session;

pub use principal::{Credentials, Identity};
pub use provider::{AuthAdapter, SignUpOutcome};
pub use session::{Session, SessionStore, SessionToken, ViewState};
