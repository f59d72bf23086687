// security/src/gate.rs
use crate::{AuthContext, Role};

/// The two protected route classes. Everything else is public and never
/// consults the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// The back-office area; admin only.
    Privileged,
    /// The login page itself; authenticated admins are sent away from it.
    LoginEntry,
}

/// Navigation outcome. This is a redirect decision, not an API status:
/// a denied privileged request is steered to the login entry point rather
/// than answered with 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectToLogin,
    RedirectAway,
}

/// Pure decision over a resolved context. Never mutates the token.
pub fn decide(route: RouteClass, ctx: &AuthContext) -> GateDecision {
    let is_admin = ctx.role() == Some(Role::Admin);
    match route {
        RouteClass::Privileged => {
            if is_admin {
                GateDecision::Allow
            } else {
                GateDecision::RedirectToLogin
            }
        }
        RouteClass::LoginEntry => {
            if is_admin {
                GateDecision::RedirectAway
            } else {
                GateDecision::Allow
            }
        }
    }
}
