// engine/src/access.rs
//
// Login and registration. Admin and staff credentials come from the
// bootstrap block of the config: the single-pair admin check is a seed
// mechanism carried over from the system this replaces, not a real
// credential store, and it lives here so nothing else grows around it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use models::errors::{OpsError, OpsResult};
use models::Patient;
use security::{issue_token, AuthContext, Role};

use crate::store::PatientRepository;

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub name: String,
    pub password: String,
}

/// Access-gate configuration, loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: u64,
    /// Bootstrap/seed credential pairs; see DESIGN.md.
    pub bootstrap_admin: Credentials,
    pub staff: Vec<Credentials>,
}

/// What a successful login hands back: the signed token for the cookie and
/// the profile echoed to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct LoginProfile {
    pub token: String,
    pub id: String,
    pub role: Role,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WhoAmI {
    pub is_authenticated: bool,
    pub role: Option<Role>,
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone)]
pub struct AccessService {
    patients: Arc<dyn PatientRepository>,
    config: AccessConfig,
}

impl AccessService {
    pub fn new(patients: Arc<dyn PatientRepository>, config: AccessConfig) -> Self {
        AccessService { patients, config }
    }

    fn issue(&self, id: &str, role: Role, name: &str) -> OpsResult<LoginProfile> {
        let token = issue_token(
            id,
            role,
            name,
            self.config.jwt_secret.as_bytes(),
            self.config.token_ttl_hours,
        )?;
        Ok(LoginProfile {
            token,
            id: id.to_string(),
            role,
            name: name.to_string(),
        })
    }

    /// Bootstrap admin login: one configured name/password pair.
    pub async fn admin_login(&self, name: &str, password: &str) -> OpsResult<LoginProfile> {
        let seed = &self.config.bootstrap_admin;
        if name != seed.name || password != seed.password {
            warn!("rejected admin login for {:?}", name);
            return Err(OpsError::Unauthorized);
        }
        info!("admin logged in");
        self.issue("admin", Role::Admin, name)
    }

    pub async fn staff_login(&self, name: &str, password: &str) -> OpsResult<LoginProfile> {
        let matched = self
            .config
            .staff
            .iter()
            .any(|c| c.name == name && c.password == password);
        if !matched {
            warn!("rejected staff login for {:?}", name);
            return Err(OpsError::Unauthorized);
        }
        self.issue(name, Role::Staff, name)
    }

    /// Patient self-registration keyed on phone number. A known phone is a
    /// re-registration lookup and returns the existing record; a miss
    /// creates the patient.
    pub async fn patient_register(&self, name: &str, phone: &str) -> OpsResult<LoginProfile> {
        let name = name.trim();
        let phone = phone.trim();
        if name.is_empty() {
            return Err(OpsError::missing("name"));
        }
        if phone.len() != 10 || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(OpsError::validation("phone", "must be a 10-digit number"));
        }
        let patient = match self.patients.find_by_phone(phone).await? {
            Some(existing) => existing,
            None => {
                let created = self.patients.create(Patient::new(name, phone)).await?;
                info!(patient = %created.id, "patient registered");
                created
            }
        };
        self.issue(&patient.id.to_string(), Role::Patient, &patient.name)
    }

    pub fn whoami(&self, ctx: &AuthContext) -> WhoAmI {
        match ctx {
            AuthContext::Anonymous => WhoAmI {
                is_authenticated: false,
                role: None,
                id: None,
                name: None,
            },
            AuthContext::Authenticated {
                role,
                subject_id,
                name,
            } => WhoAmI {
                is_authenticated: true,
                role: Some(*role),
                id: Some(subject_id.clone()),
                name: Some(name.clone()),
            },
        }
    }
}
