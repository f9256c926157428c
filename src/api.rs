// 🌐 HTTP API (feature "server")
//
// build_router is the single entry point. Middleware (CORS, tracing) is
// attached by bin/server.rs so tests can drive the bare router.

use crate::entities::{
    ContactUpdate, NewOwner, NewPlateNumber, NewUser, NewVehicle, Owner, OwnerId, PlateNumber,
    User, VehicleId, VehicleSnapshot,
};
use crate::error::{ErrorKind, RegistryError};
use crate::history::HistoryEntry;
use crate::integrity::IntegrityReport;
use crate::registry::Registry;
use crate::transfer::TransferRequest;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Header naming the acting user of a transfer
pub const ACTING_USER_HEADER: &str = "x-user-email";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    registry: Arc<Mutex<Registry>>,
}

impl AppState {
    pub fn new(registry: Registry) -> Self {
        AppState {
            registry: Arc::new(Mutex::new(registry)),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|p| p.into_inner())
    }
}

// ============================================================================
// Response envelopes
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    kind: ErrorKind,
}

/// RegistryError rendered as `{ success: false, error, kind }`
pub struct ApiError(RegistryError);

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError(err)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        // Internal details stay in the logs
        let error = match kind {
            ErrorKind::Internal => "internal registry error".to_string(),
            _ => self.0.to_string(),
        };

        (
            status_for(kind),
            Json(ErrorBody {
                success: false,
                error,
                kind,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn created<T>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::ok(data)))
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/owners", post(register_owner).get(list_owners))
        .route("/owners/search", get(search_owners))
        .route("/owners/:id", get(get_owner).patch(update_owner_contact))
        .route(
            "/owners/:id/plate-numbers",
            post(register_plate_number).get(owner_plate_numbers),
        )
        .route("/users", post(register_user))
        .route("/vehicles", post(register_vehicle))
        .route("/vehicles/search", get(search_vehicles))
        .route("/vehicles/:id", get(get_vehicle))
        .route("/vehicles/:id/transfer", post(transfer_vehicle))
        .route("/vehicles/:id/ownership-history", get(ownership_history))
        .route("/integrity", get(integrity))
        .with_state(state);

    Router::new().nest("/api", api_routes)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/owners
async fn register_owner(State(state): State<AppState>, Json(body): Json<NewOwner>) -> Created<Owner> {
    let owner = state.registry().register_owner(&body)?;
    Ok(created(owner))
}

/// GET /api/owners
async fn list_owners(State(state): State<AppState>) -> ApiResult<Vec<Owner>> {
    let owners = state.registry().list_owners()?;
    Ok(Json(ApiResponse::ok(owners)))
}

#[derive(Debug, Deserialize)]
struct OwnerSearchQuery {
    q: Option<String>,
}

/// GET /api/owners/search?q=
async fn search_owners(State(state): State<AppState>, Query(query): Query<OwnerSearchQuery>) -> ApiResult<Vec<Owner>> {
    let owners = state
        .registry()
        .search_owners(query.q.as_deref().unwrap_or_default())?;
    Ok(Json(ApiResponse::ok(owners)))
}

/// GET /api/owners/:id
async fn get_owner(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Owner> {
    let owner = state.registry().get_owner(OwnerId(id))?;
    Ok(Json(ApiResponse::ok(owner)))
}

/// PATCH /api/owners/:id
async fn update_owner_contact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ContactUpdate>,
) -> ApiResult<Owner> {
    let owner = state.registry().update_owner_contact(OwnerId(id), &body)?;
    Ok(Json(ApiResponse::ok(owner)))
}

/// POST /api/owners/:id/plate-numbers
async fn register_plate_number(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<NewPlateNumber>,
) -> Created<PlateNumber> {
    let plate = state.registry().register_plate_number(OwnerId(id), &body)?;
    Ok(created(plate))
}

/// GET /api/owners/:id/plate-numbers
async fn owner_plate_numbers(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vec<PlateNumber>> {
    let plates = state.registry().owner_plate_numbers(OwnerId(id))?;
    Ok(Json(ApiResponse::ok(plates)))
}

/// POST /api/users
async fn register_user(State(state): State<AppState>, Json(body): Json<NewUser>) -> Created<User> {
    let user = state.registry().register_user(&body)?;
    Ok(created(user))
}

/// POST /api/vehicles
async fn register_vehicle(State(state): State<AppState>, Json(body): Json<NewVehicle>) -> Created<VehicleSnapshot> {
    let snapshot = state.registry().register_vehicle(&body)?;
    Ok(created(snapshot))
}

/// GET /api/vehicles/:id
async fn get_vehicle(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<VehicleSnapshot> {
    let snapshot = state.registry().get_vehicle_by_id(VehicleId(id))?;
    Ok(Json(ApiResponse::ok(snapshot)))
}

/// POST /api/vehicles/:id/transfer
async fn transfer_vehicle(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<TransferRequest>,
) -> ApiResult<VehicleSnapshot> {
    let acting_user = headers
        .get(ACTING_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RegistryError::invalid(ACTING_USER_HEADER, "header is required"))?
        .to_string();

    let snapshot = state
        .registry()
        .transfer_vehicle(VehicleId(id), &body, &acting_user)?;
    Ok(Json(ApiResponse::ok(snapshot)))
}

/// GET /api/vehicles/:id/ownership-history
async fn ownership_history(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vec<HistoryEntry>> {
    let entries = state.registry().get_ownership_history(VehicleId(id))?;
    Ok(Json(ApiResponse::ok(entries)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuery {
    chassis_number: Option<String>,
    plate_number: Option<String>,
    national_id: Option<String>,
}

/// GET /api/vehicles/search?chassisNumber=|plateNumber=|nationalId=
async fn search_vehicles(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> ApiResult<Vec<VehicleSnapshot>> {
    let registry = state.registry();
    let vehicles = match (query.chassis_number, query.plate_number, query.national_id) {
        (Some(chassis), None, None) => registry.find_by_chassis_number(&chassis)?.into_iter().collect(),
        (None, Some(plate), None) => registry.find_by_plate_number(&plate)?.into_iter().collect(),
        (None, None, Some(national_id)) => registry.find_by_owner_national_id(&national_id)?,
        _ => {
            return Err(RegistryError::invalid(
                "search",
                "exactly one of chassisNumber, plateNumber, nationalId is required",
            )
            .into())
        }
    };
    Ok(Json(ApiResponse::ok(vehicles)))
}

/// GET /api/integrity
async fn integrity(State(state): State<AppState>) -> ApiResult<IntegrityReport> {
    let report = state.registry().audit_integrity()?;
    Ok(Json(ApiResponse::ok(report)))
}
