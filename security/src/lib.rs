// security/src/lib.rs
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use models::errors::OpsError;

pub mod cookie;
pub mod gate;

pub use gate::{GateDecision, RouteClass};

/// Closed role variant. Resolved once by the gate and passed down as an
/// explicit capability; components never re-derive it from raw tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Patient,
}

impl FromStr for Role {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "patient" => Ok(Role::Patient),
            other => Err(OpsError::validation(
                "role",
                format!("unknown role {:?}", other),
            )),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Patient => "patient",
        };
        write!(f, "{}", s)
    }
}

/// Claims embedded in the identity token. Regenerated on every login,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub role: Role,
    pub name: String,
    pub iat: u64,
    pub exp: u64,
}

/// Result of inspecting an inbound identity token. A missing or
/// unverifiable token is `Anonymous`; verification failure is silent and
/// indistinguishable from no token at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthContext {
    Anonymous,
    Authenticated {
        role: Role,
        subject_id: String,
        name: String,
    },
}

impl AuthContext {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthContext::Authenticated { .. })
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            AuthContext::Anonymous => None,
            AuthContext::Authenticated { role, .. } => Some(*role),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Signs a fresh identity token for `{id, role, name}`. The token carries
/// an explicit expiry so the session-lifetime cookie is bounded by the
/// signing scheme itself (see DESIGN.md on the cookie expiry decision).
pub fn issue_token(
    id: &str,
    role: Role,
    name: &str,
    secret: &[u8],
    ttl_hours: u64,
) -> Result<String, OpsError> {
    let now = unix_now();
    let claims = Claims {
        id: id.to_string(),
        role,
        name: name.to_string(),
        iat: now,
        exp: now + ttl_hours * 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| OpsError::Internal(format!("failed to sign identity token: {}", e)))
}

/// Inspects an inbound token. Never errors past this boundary: any
/// verification failure (bad signature, malformed, expired, wrong shape)
/// collapses to `Anonymous`.
pub fn authorize(token: Option<&str>, secret: &[u8]) -> AuthContext {
    let Some(token) = token else {
        return AuthContext::Anonymous;
    };
    let key = DecodingKey::from_secret(secret);
    match decode::<Claims>(token, &key, &Validation::default()) {
        Ok(data) => AuthContext::Authenticated {
            role: data.claims.role,
            subject_id: data.claims.id,
            name: data.claims.name,
        },
        Err(_) => AuthContext::Anonymous,
    }
}
