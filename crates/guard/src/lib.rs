//! Portcullis route guard
//!
//! Decides, per navigation, whether a view renders, waits, or sends the
//! user to the login page. Protected paths are checked against the backend
//! before anything renders, and any failure of that check fails closed.

mod guard;
mod verifier;

pub use guard::{GuardDecision, GuardPhase, MountState, RouteGuard};
pub use verifier::SessionVerifier;
