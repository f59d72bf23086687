// rest_api/src/lib.rs
//
// HTTP surface over the operations engine. Handlers are presentation
// glue: decode the request, consult the access gate, call exactly one
// service operation, encode the result. The navigation routes answer gate
// denials with redirects; the JSON API answers with statuses.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;
use uuid::Uuid;

use engine::{
    AccessService, AggregationService, AppointmentFilter, AppointmentService, InventoryService,
    NotificationService, WindowQuery,
};
use models::errors::OpsError;
use models::{Audience, NewAppointment};
use security::cookie::{expired_cookie, session_cookie, token_from_cookie_header};
use security::{authorize, gate, AuthContext, GateDecision, Role, RouteClass};

pub mod config;

pub use config::{load_config, OpsConfig};

#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] OpsError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OpsError::Validation { .. } => StatusCode::BAD_REQUEST,
            OpsError::NotFound(_) => StatusCode::NOT_FOUND,
            OpsError::PreconditionFailed(_) => StatusCode::CONFLICT,
            OpsError::Unauthorized => StatusCode::UNAUTHORIZED,
            OpsError::Forbidden => StatusCode::FORBIDDEN,
            OpsError::Conflict(_) => StatusCode::CONFLICT,
            OpsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal detail is logged, not surfaced.
            error!("internal failure: {}", self.0);
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        let body = Json(json!({
            "status": "error",
            "message": message,
        }));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Clone)]
pub struct AppState {
    pub access: AccessService,
    pub appointments: AppointmentService,
    pub inventory: InventoryService,
    pub notifications: NotificationService,
    pub aggregation: AggregationService,
    pub jwt_secret: Arc<String>,
    pub secure_cookies: bool,
}

impl AppState {
    fn auth(&self, headers: &HeaderMap) -> AuthContext {
        let token = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(token_from_cookie_header);
        authorize(token, self.jwt_secret.as_bytes())
    }

    /// Back-office API operations are for staff and admin.
    fn require_staff(&self, headers: &HeaderMap) -> Result<AuthContext, OpsError> {
        let ctx = self.auth(headers);
        match ctx.role() {
            Some(Role::Admin) | Some(Role::Staff) => Ok(ctx),
            Some(Role::Patient) => Err(OpsError::Forbidden),
            None => Err(OpsError::Unauthorized),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        // Navigation gate
        .route("/admin/dashboard", get(admin_dashboard))
        .route("/login", get(login_page))
        // Access
        .route("/api/auth/admin/login", post(admin_login))
        .route("/api/auth/staff/login", post(staff_login))
        .route("/api/auth/patient/register", post(patient_register))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/whoami", get(whoami))
        // Appointments
        .route("/api/appointments", post(create_appointment).get(list_appointments))
        .route("/api/appointments/:id/status", patch(update_status))
        .route("/api/appointments/:id/report", put(set_report))
        .route("/api/appointments/:id/report-images", put(attach_report_images))
        .route("/api/appointments/:id/payment", patch(set_payment_status))
        .route("/api/appointments/:id/doctor", patch(set_doctor))
        .route("/api/appointments/:id/referral", patch(set_referral))
        // Inventory ledger
        .route("/api/inventory", get(list_inventory))
        .route("/api/inventory/:name/restock", post(restock))
        .route("/api/inventory/:name/consume", post(consume))
        .route("/api/inventory/:name/history/:index", patch(amend_entry))
        // Notifications
        .route("/api/notifications", post(notify).get(list_notifications).delete(delete_all_notifications))
        .route("/api/notifications/all", get(list_all_notifications))
        .route("/api/notifications/mark-read", post(mark_read))
        .route("/api/notifications/:patient_id", delete(delete_patient_notifications))
        // Aggregation
        .route("/api/stats/groups", get(group_counts))
        .route("/api/stats/revenue", get(revenue))
        .route("/api/stats/today", get(today))
        .layer(cors)
        .with_state(state)
}

// ---- Navigation gate ----------------------------------------------------

async fn admin_dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match gate::decide(RouteClass::Privileged, &state.auth(&headers)) {
        GateDecision::Allow => Json(json!({ "status": "ok", "area": "admin" })).into_response(),
        _ => Redirect::to("/login").into_response(),
    }
}

async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match gate::decide(RouteClass::LoginEntry, &state.auth(&headers)) {
        GateDecision::RedirectAway => Redirect::to("/admin/dashboard").into_response(),
        _ => Json(json!({ "status": "ok", "area": "login" })).into_response(),
    }
}

// ---- Access -------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LoginRequest {
    name: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    name: String,
    phone: String,
}

fn with_cookie(state: &AppState, token: &str, body: Value) -> Response {
    let cookie = session_cookie(token, state.secure_cookies);
    (AppendHeaders([(header::SET_COOKIE, cookie)]), Json(body)).into_response()
}

async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    let profile = state.access.admin_login(&req.name, &req.password).await?;
    Ok(with_cookie(
        &state,
        &profile.token,
        json!({ "id": profile.id, "role": profile.role, "name": profile.name }),
    ))
}

async fn staff_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    let profile = state.access.staff_login(&req.name, &req.password).await?;
    Ok(with_cookie(
        &state,
        &profile.token,
        json!({ "id": profile.id, "role": profile.role, "name": profile.name }),
    ))
}

async fn patient_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Response> {
    let profile = state.access.patient_register(&req.name, &req.phone).await?;
    Ok(with_cookie(
        &state,
        &profile.token,
        json!({ "id": profile.id, "role": profile.role, "name": profile.name }),
    ))
}

async fn logout(State(state): State<AppState>) -> Response {
    let cookie = expired_cookie(state.secure_cookies);
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!({ "status": "ok" })),
    )
        .into_response()
}

async fn whoami(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let ctx = state.auth(&headers);
    Json(state.access.whoami(&ctx)).into_response()
}

// ---- Appointments -------------------------------------------------------

async fn create_appointment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(new): Json<NewAppointment>,
) -> ApiResult<Json<Value>> {
    // Patients book for themselves; staff book on a patient's behalf.
    if !state.auth(&headers).is_authenticated() {
        return Err(OpsError::Unauthorized.into());
    }
    let appointment = state.appointments.create(new).await?;
    Ok(Json(serde_json::to_value(appointment).map_err(OpsError::from)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    search: Option<String>,
    service: Option<String>,
    status: Option<String>,
    month: Option<u32>,
    /// Half-open hour range, e.g. "8-10" for the 8 AM - 10 AM slot.
    time_slot: Option<String>,
}

fn parse_slot(raw: &str) -> Result<(u32, u32), OpsError> {
    let invalid = || OpsError::validation("timeSlot", "expected \"<from>-<to>\" hours");
    let (from, to) = raw.split_once('-').ok_or_else(invalid)?;
    let from: u32 = from.trim().parse().map_err(|_| invalid())?;
    let to: u32 = to.trim().parse().map_err(|_| invalid())?;
    if from >= to || to > 24 {
        return Err(OpsError::validation("timeSlot", "hours out of order or range"));
    }
    Ok((from, to))
}

async fn list_appointments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let filter = AppointmentFilter {
        search: query.search,
        service: query.service,
        status: query
            .status
            .as_deref()
            .map(|s| s.parse::<models::AppointmentStatus>())
            .transpose()?,
        month: query.month,
        time_slot: query.time_slot.as_deref().map(parse_slot).transpose()?,
    };
    let rows = state.appointments.list_by_filter(&filter).await?;
    Ok(Json(serde_json::to_value(rows).map_err(OpsError::from)?))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: String,
}

async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let updated = state.appointments.update_status(id, &req.status).await?;
    Ok(Json(serde_json::to_value(updated).map_err(OpsError::from)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRequest {
    phone: String,
    scan_type: String,
    #[serde(default)]
    history: String,
    #[serde(default)]
    findings: String,
    #[serde(default)]
    impressions: String,
    #[serde(default)]
    image_refs: Vec<String>,
    report_date: String,
}

async fn set_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<ReportRequest>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let updated = state
        .appointments
        .set_report(
            id,
            &req.phone,
            &req.scan_type,
            &req.history,
            &req.findings,
            &req.impressions,
            req.image_refs,
            &req.report_date,
        )
        .await?;
    Ok(Json(serde_json::to_value(updated).map_err(OpsError::from)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportImagesRequest {
    phone: String,
    image_refs: Vec<String>,
}

async fn attach_report_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<ReportImagesRequest>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let updated = state
        .appointments
        .attach_report_images(id, &req.phone, req.image_refs)
        .await?;
    Ok(Json(serde_json::to_value(updated).map_err(OpsError::from)?))
}

async fn set_payment_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let updated = state.appointments.set_payment_status(id, &req.status).await?;
    Ok(Json(serde_json::to_value(updated).map_err(OpsError::from)?))
}

#[derive(Debug, Deserialize)]
struct DoctorRequest {
    name: String,
}

async fn set_doctor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<DoctorRequest>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let updated = state.appointments.set_doctor(id, &req.name).await?;
    Ok(Json(serde_json::to_value(updated).map_err(OpsError::from)?))
}

#[derive(Debug, Deserialize)]
struct ReferralRequest {
    source: String,
}

async fn set_referral(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<ReferralRequest>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let updated = state.appointments.set_referral(id, &req.source).await?;
    Ok(Json(serde_json::to_value(updated).map_err(OpsError::from)?))
}

// ---- Inventory ledger ---------------------------------------------------

async fn list_inventory(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let items = state.inventory.list().await?;
    Ok(Json(serde_json::to_value(items).map_err(OpsError::from)?))
}

#[derive(Debug, Deserialize)]
struct RestockRequest {
    quantity: i64,
    date: String,
    time: String,
}

async fn restock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(req): Json<RestockRequest>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let item = state
        .inventory
        .restock(&name, req.quantity, &req.date, &req.time)
        .await?;
    Ok(Json(serde_json::to_value(item).map_err(OpsError::from)?))
}

#[derive(Debug, Deserialize)]
struct ConsumeRequest {
    spent: i64,
    date: String,
    time: String,
}

async fn consume(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(req): Json<ConsumeRequest>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let item = state
        .inventory
        .consume(&name, req.spent, &req.date, &req.time)
        .await?;
    Ok(Json(serde_json::to_value(item).map_err(OpsError::from)?))
}

#[derive(Debug, Deserialize)]
struct AmendRequest {
    spent: i64,
}

async fn amend_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, index)): Path<(String, usize)>,
    Json(req): Json<AmendRequest>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let item = state.inventory.amend_entry(&name, index, req.spent).await?;
    Ok(Json(serde_json::to_value(item).map_err(OpsError::from)?))
}

// ---- Notifications ------------------------------------------------------

fn audience_or(raw: Option<&str>, fallback: Audience) -> Result<Audience, OpsError> {
    match raw {
        None => Ok(fallback),
        Some("patient") => Ok(Audience::Patient),
        Some("staff") => Ok(Audience::Staff),
        Some(other) => Err(OpsError::validation(
            "audience",
            format!("must be patient or staff, got {:?}", other),
        )),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotifyRequest {
    audience: Option<String>,
    patient_id: Uuid,
    #[serde(rename = "type")]
    kind: String,
    title: String,
    message: String,
    url: Option<String>,
}

async fn notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NotifyRequest>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let audience = audience_or(req.audience.as_deref(), Audience::Patient)?;
    let group = state
        .notifications
        .notify(audience, req.patient_id, &req.kind, &req.title, &req.message, req.url)
        .await?;
    Ok(Json(serde_json::to_value(group).map_err(OpsError::from)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationQuery {
    patient_id: Option<Uuid>,
    audience: Option<String>,
}

async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Value>> {
    let ctx = state.auth(&headers);
    let audience = audience_or(query.audience.as_deref(), Audience::Patient)?;
    // A patient may only read their own stream; staff and admin may read
    // any patient's.
    let patient_id = match (&ctx, query.patient_id) {
        (AuthContext::Authenticated { role: Role::Patient, subject_id, .. }, requested) => {
            let own: Uuid = subject_id
                .parse()
                .map_err(|_| OpsError::internal("malformed subject id in token"))?;
            if requested.is_some_and(|r| r != own) {
                return Err(OpsError::Forbidden.into());
            }
            own
        }
        (AuthContext::Authenticated { .. }, Some(requested)) => requested,
        (AuthContext::Authenticated { .. }, None) => {
            return Err(OpsError::missing("patientId").into());
        }
        (AuthContext::Anonymous, _) => return Err(OpsError::Unauthorized.into()),
    };
    let groups = state
        .notifications
        .list_for_patient(audience, patient_id)
        .await?;
    Ok(Json(serde_json::to_value(groups).map_err(OpsError::from)?))
}

async fn list_all_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let audience = audience_or(query.audience.as_deref(), Audience::Staff)?;
    let groups = state.notifications.list_all(audience).await?;
    Ok(Json(serde_json::to_value(groups).map_err(OpsError::from)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadRequest {
    patient_id: Option<Uuid>,
}

async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MarkReadRequest>,
) -> ApiResult<Json<Value>> {
    let ctx = state.auth(&headers);
    match (&ctx, req.patient_id) {
        // A patient flips their own stream only.
        (AuthContext::Authenticated { role: Role::Patient, subject_id, .. }, requested) => {
            let own: Uuid = subject_id
                .parse()
                .map_err(|_| OpsError::internal("malformed subject id in token"))?;
            if requested.is_some_and(|r| r != own) {
                return Err(OpsError::Forbidden.into());
            }
            state.notifications.mark_all_read(Some(own)).await?;
        }
        (AuthContext::Authenticated { .. }, requested) => {
            state.notifications.mark_all_read(requested).await?;
        }
        (AuthContext::Anonymous, _) => return Err(OpsError::Unauthorized.into()),
    }
    Ok(Json(json!({ "status": "ok" })))
}

async fn delete_patient_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let audience = audience_or(query.audience.as_deref(), Audience::Patient)?;
    state
        .notifications
        .delete_for_patient(audience, patient_id)
        .await?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn delete_all_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let audience = audience_or(query.audience.as_deref(), Audience::Staff)?;
    state.notifications.delete_everything(audience).await?;
    Ok(Json(json!({ "status": "ok" })))
}

// ---- Aggregation --------------------------------------------------------

async fn group_counts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let counts = state.aggregation.group_counts().await?;
    Ok(Json(serde_json::to_value(counts).map_err(OpsError::from)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevenueQuery {
    date: Option<chrono::NaiveDate>,
    from: Option<chrono::NaiveDate>,
    to: Option<chrono::NaiveDate>,
    month: Option<u32>,
    year: Option<i32>,
    slot: Option<String>,
}

async fn revenue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RevenueQuery>,
) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let week = match (query.from, query.to) {
        (Some(from), Some(to)) => Some((from, to)),
        (None, None) => None,
        _ => return Err(OpsError::validation("week", "from and to are both required").into()),
    };
    let window = WindowQuery {
        date: query.date,
        week,
        month: query.month,
        year: query.year,
    };
    let slot = query.slot.as_deref().map(parse_slot).transpose()?;
    let breakdown = state.aggregation.revenue_by_window(&window, slot).await?;
    Ok(Json(serde_json::to_value(breakdown).map_err(OpsError::from)?))
}

async fn today(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Value>> {
    state.require_staff(&headers)?;
    let snapshot = state.aggregation.today_snapshot().await?;
    Ok(Json(serde_json::to_value(snapshot).map_err(OpsError::from)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use engine::store::MemStore;
    use engine::{AccessConfig, Credentials};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const SECRET: &str = "test-signing-secret-of-decent-length";

    fn state() -> AppState {
        let store = Arc::new(MemStore::new());
        let access_config = AccessConfig {
            jwt_secret: SECRET.to_string(),
            token_ttl_hours: 24,
            bootstrap_admin: Credentials {
                name: "owner".to_string(),
                password: "owner-pass".to_string(),
            },
            staff: vec![],
        };
        AppState {
            access: AccessService::new(store.clone(), access_config),
            appointments: AppointmentService::new(store.clone()),
            inventory: InventoryService::new(store.clone(), false),
            notifications: NotificationService::new(store.clone(), store.clone()),
            aggregation: AggregationService::new(store.clone(), store),
            jwt_secret: Arc::new(SECRET.to_string()),
            secure_cookies: false,
        }
    }

    fn admin_cookie() -> String {
        let token =
            security::issue_token("admin", Role::Admin, "owner", SECRET.as_bytes(), 24).unwrap();
        format!("token={}", token)
    }

    async fn send(router: Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    #[tokio::test]
    async fn privileged_area_redirects_anonymous_to_login() {
        let router = app(state());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/admin/dashboard")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn login_page_redirects_admin_away() {
        let router = app(state());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/login")
                    .header(header::COOKIE, admin_cookie())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(response.headers()[header::LOCATION], "/admin/dashboard");
    }

    #[tokio::test]
    async fn admin_login_sets_the_identity_cookie() {
        let router = app(state());
        let response = router
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/auth/admin/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"name":"owner","password":"owner-pass"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn bad_admin_credentials_are_unauthorized() {
        let router = app(state());
        let (status, body) = send(
            router,
            Request::builder()
                .method(Method::POST)
                .uri("/api/auth/admin/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"name":"owner","password":"wrong"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn logout_expires_the_cookie() {
        let router = app(state());
        let response = router
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/auth/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970"));
    }

    #[tokio::test]
    async fn appointment_listing_requires_staff() {
        let router = app(state());
        let (status, _) = send(
            router,
            Request::builder()
                .uri("/api/appointments")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn booking_and_status_flow_over_http() {
        let router = app(state());
        let patient = Uuid::new_v4();
        let body = json!({
            "patient_id": patient,
            "patient_name": "Asha",
            "phone": "9999900000",
            "age": "29",
            "gender": "Female",
            "service": "TVS Scan",
            "date": "2025-06-15",
            "time": "10:30",
        });
        let (status, created) = send(
            router.clone(),
            Request::builder()
                .method(Method::POST)
                .uri("/api/appointments")
                .header(header::COOKIE, admin_cookie())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["booking_count"], 1);
        let id = created["id"].as_str().unwrap();

        // Completing without a report is refused with 409.
        let (status, body) = send(
            router,
            Request::builder()
                .method(Method::PATCH)
                .uri(format!("/api/appointments/{}/status", id))
                .header(header::COOKIE, admin_cookie())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"status":"Completed"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["message"].as_str().unwrap().contains("report"));
    }

    #[tokio::test]
    async fn inventory_flow_over_http() {
        let router = app(state());
        let (status, item) = send(
            router.clone(),
            Request::builder()
                .method(Method::POST)
                .uri("/api/inventory/Gel/restock")
                .header(header::COOKIE, admin_cookie())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"quantity":100,"date":"2025-06-01","time":"09:00"}"#,
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(item["total_usage"], 100);

        // A client-supplied quantity carries no weight; the server derives
        // the running balance from the stored ledger.
        let (status, item) = send(
            router,
            Request::builder()
                .method(Method::POST)
                .uri("/api/inventory/Gel/consume")
                .header(header::COOKIE, admin_cookie())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"quantity":999,"spent":30,"date":"2025-06-02","time":"11:00"}"#,
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(item["history"][1]["quantity"], 70);
        assert_eq!(item["history"][1]["spent"], 30);
    }

    #[tokio::test]
    async fn patient_cannot_read_another_patients_notifications() {
        let router = app(state());
        let other = Uuid::new_v4();
        let token = security::issue_token(
            &Uuid::new_v4().to_string(),
            Role::Patient,
            "Asha",
            SECRET.as_bytes(),
            24,
        )
        .unwrap();
        let (status, _) = send(
            router,
            Request::builder()
                .uri(format!("/api/notifications?patientId={}", other))
                .header(header::COOKIE, format!("token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn revenue_rejects_half_a_week_range() {
        let router = app(state());
        let (status, _) = send(
            router,
            Request::builder()
                .uri("/api/stats/revenue?from=2025-06-01")
                .header(header::COOKIE, admin_cookie())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
