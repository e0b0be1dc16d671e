use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tower_http::trace::TraceLayer;
use tracing::info;

use mcad_core::constraint::{ApplyOutcome, ConstraintKind, ScopeStatus};
use mcad_core::entity::{Entity, EntityId, GeometryParams};
use mcad_core::lock::ResourceLock;
use mcad_core::workspace::{MergeOutcome, MergeStrategy, WorkspaceStatus};
use mcad_core::{Model, ModelError, StatusScope};

// Application State
struct AppState {
    model: RwLock<Model>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let shared_state = Arc::new(AppState {
        model: RwLock::new(Model::new()),
    });

    let app = Router::new()
        .route("/", get(root))
        .route("/workspace/create", post(create_workspace))
        .route("/workspace/:name/status", get(workspace_status))
        .route("/workspace/merge", post(merge_workspace))
        .route("/entity/create", post(create_entity))
        .route("/entity/update", post(update_entity))
        .route("/entity/delete", post(delete_entity))
        .route("/entity/:workspace/:id", get(get_entity))
        .route("/constraint/apply", post(apply_constraint))
        .route("/constraint/status/:workspace", get(constraint_status))
        .route("/lock/acquire", post(acquire_lock))
        .route("/lock/release", post(release_lock))
        .route("/operation/undo", post(undo_operation))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn root() -> &'static str {
    "mcad backend"
}

/// Transport wrapper: maps core errors onto HTTP statuses and a structured
/// JSON body so an agent can branch on `code` without parsing messages.
struct ApiError(ModelError);

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ModelError::EntityNotFound(_) | ModelError::BaseNotFound(_) => StatusCode::NOT_FOUND,
            ModelError::InvalidConstraint(_) | ModelError::InvalidGeometry(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ModelError::ConstraintConflict { .. }
            | ModelError::WorkspaceConflict { .. }
            | ModelError::DuplicateWorkspace(_)
            | ModelError::AlreadyLocked { .. } => StatusCode::CONFLICT,
            ModelError::InternalSolverError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = match &self.0 {
            ModelError::ConstraintConflict { dof_remaining, .. } => {
                json!({ "dof_remaining": dof_remaining })
            }
            ModelError::WorkspaceConflict { conflicts } => json!({ "conflicts": conflicts }),
            ModelError::AlreadyLocked {
                holder, expires_at, ..
            } => json!({ "holder": holder, "expires_at": expires_at }),
            _ => json!(null),
        };
        let body = json!({
            "code": self.0.code(),
            "message": self.0.to_string(),
            "detail": detail,
        });
        (status, Json(body)).into_response()
    }
}

fn resolve(model: &Model, name: &str) -> Result<mcad_core::workspace::WorkspaceId, ApiError> {
    model
        .workspace_by_name(name)
        .ok_or_else(|| ApiError(ModelError::BaseNotFound(name.to_string())))
}

// === workspaces ===

#[derive(Deserialize)]
struct CreateWorkspaceReq {
    name: String,
    /// Defaults to the root workspace.
    base: Option<String>,
}

async fn create_workspace(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWorkspaceReq>,
) -> Result<Json<mcad_core::model::WorkspaceCreated>, ApiError> {
    let mut model = state.model.write().unwrap();
    let base = match &req.base {
        Some(name) => resolve(&model, name)?,
        None => model.root(),
    };
    let created = model.create_workspace(&req.name, &base)?;
    info!("workspace {} created off {}", req.name, base);
    Ok(Json(created))
}

async fn workspace_status(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<WorkspaceStatus>, ApiError> {
    let model = state.model.read().unwrap();
    let id = resolve(&model, &name)?;
    Ok(Json(model.workspace_status(&id)?))
}

#[derive(Deserialize)]
struct MergeReq {
    source: String,
    target: String,
    agent: String,
    #[serde(default)]
    strategy: Option<MergeStrategy>,
}

async fn merge_workspace(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MergeReq>,
) -> Result<Json<MergeOutcome>, ApiError> {
    let mut model = state.model.write().unwrap();
    let source = resolve(&model, &req.source)?;
    let target = resolve(&model, &req.target)?;
    let strategy = req.strategy.unwrap_or(MergeStrategy::Auto);
    let outcome = model.merge(&source, &target, &strategy, &req.agent)?;
    info!(
        "merged {} into {}: +{} ~{} -{}",
        req.source, req.target, outcome.entities_added, outcome.entities_modified,
        outcome.entities_deleted
    );
    Ok(Json(outcome))
}

// === entities ===

#[derive(Deserialize)]
struct CreateEntityReq {
    workspace: String,
    params: GeometryParams,
    parent: Option<EntityId>,
    agent: String,
}

async fn create_entity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateEntityReq>,
) -> Result<Json<Entity>, ApiError> {
    let mut model = state.model.write().unwrap();
    let ws = resolve(&model, &req.workspace)?;
    let id = model.create_entity(&ws, req.params, req.parent, &req.agent)?;
    Ok(Json(model.get_entity(&ws, &id)?))
}

#[derive(Deserialize)]
struct UpdateEntityReq {
    workspace: String,
    id: EntityId,
    params: GeometryParams,
    agent: String,
}

async fn update_entity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateEntityReq>,
) -> Result<Json<Entity>, ApiError> {
    let mut model = state.model.write().unwrap();
    let ws = resolve(&model, &req.workspace)?;
    Ok(Json(model.update_entity(&ws, &req.id, req.params, &req.agent)?))
}

#[derive(Deserialize)]
struct DeleteEntityReq {
    workspace: String,
    id: EntityId,
    agent: String,
}

async fn delete_entity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteEntityReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut model = state.model.write().unwrap();
    let ws = resolve(&model, &req.workspace)?;
    let removed = model.delete_entity(&ws, &req.id, &req.agent)?;
    Ok(Json(json!({
        "deleted": req.id,
        "constraints_removed": removed,
    })))
}

async fn get_entity(
    State(state): State<Arc<AppState>>,
    Path((workspace, id)): Path<(String, EntityId)>,
) -> Result<Json<Entity>, ApiError> {
    let model = state.model.read().unwrap();
    let ws = resolve(&model, &workspace)?;
    Ok(Json(model.get_entity(&ws, &id)?))
}

// === constraints ===

#[derive(Deserialize)]
struct ApplyConstraintReq {
    workspace: String,
    kind: ConstraintKind,
    entities: Vec<EntityId>,
    tolerance: Option<f64>,
    agent: String,
}

async fn apply_constraint(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ApplyConstraintReq>,
) -> Result<Json<ApplyOutcome>, ApiError> {
    let mut model = state.model.write().unwrap();
    let ws = resolve(&model, &req.workspace)?;
    let outcome = model.apply_constraint(&ws, req.kind, req.entities, req.tolerance, &req.agent)?;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
struct StatusQuery {
    /// Restrict the report to one sketch's children.
    sketch: Option<EntityId>,
}

async fn constraint_status(
    State(state): State<Arc<AppState>>,
    Path(workspace): Path<String>,
    axum::extract::Query(query): axum::extract::Query<StatusQuery>,
) -> Result<Json<ScopeStatus>, ApiError> {
    let model = state.model.read().unwrap();
    let ws = resolve(&model, &workspace)?;
    let scope = match query.sketch {
        Some(sketch) => StatusScope::Sketch(sketch),
        None => StatusScope::Workspace,
    };
    Ok(Json(model.constraint_status(&ws, scope)?))
}

// === coordination ===

#[derive(Deserialize)]
struct AcquireLockReq {
    resource_type: String,
    resource_name: String,
    holder: String,
    session: String,
    ttl_secs: i64,
}

async fn acquire_lock(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AcquireLockReq>,
) -> Result<Json<ResourceLock>, ApiError> {
    let mut model = state.model.write().unwrap();
    let lock = model.acquire_lock(
        &req.resource_type,
        &req.resource_name,
        &req.holder,
        &req.session,
        req.ttl_secs,
    )?;
    Ok(Json(lock))
}

#[derive(Deserialize)]
struct ReleaseLockReq {
    resource_type: String,
    resource_name: String,
    holder: String,
}

async fn release_lock(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReleaseLockReq>,
) -> Json<serde_json::Value> {
    let mut model = state.model.write().unwrap();
    model.release_lock(&req.resource_type, &req.resource_name, &req.holder);
    Json(json!({ "released": true }))
}

#[derive(Deserialize)]
struct UndoReq {
    workspace: String,
}

async fn undo_operation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UndoReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut model = state.model.write().unwrap();
    let ws = resolve(&model, &req.workspace)?;
    let undone = model.undo(&ws)?;
    Ok(Json(json!({ "undone_seq": undone })))
}
