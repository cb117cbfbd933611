//! JSON API over the store, the sheet adapter and the text generator.
//!
//! Every route except health, login and signup runs behind
//! [`require_auth`]; each handler then checks the caller's role against the
//! view the route belongs to.

use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{Path, Query, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::{FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::AppConfig;
use crate::dashboard::dashboard_stats;
use crate::downloader;
use crate::error::{AppError, AppResult};
use crate::gate_pass::{
    self, PassDetail, PassFilter, PassForm, PassView, ReturnForm, overdue_and_pending,
};
use crate::loader;
use crate::login::{
    Authenticator, SessionStore, handle_login, handle_logout, handle_me, handle_signup,
    require_auth, require_view,
};
use crate::model::{GatePassStatus, NewItem, NewRequester, Role, User, View};
use crate::outbox::{OutboxEntry, SyncOutbox, SyncState};
use crate::phone;
use crate::reminder::{TextGenerator, summary_rows};
use crate::saving::{self, SNAPSHOT_FILE};
use crate::settings::{SETTINGS_FILE, Settings, SettingsView};
use crate::sheet::{SheetClient, SheetPayload, SheetRow, filter_sheet_rows};
use crate::store::Store;

/// Shared state behind every handler
pub struct AppState {
    pub config: AppConfig,
    pub offset: FixedOffset,
    store: Mutex<Store>,
    settings: Mutex<Settings>,
    pub sessions: SessionStore,
    pub auth: Authenticator,
    pub outbox: SyncOutbox,
    pub http: reqwest::Client,
    pub ai: TextGenerator,
    snapshot_path: Option<PathBuf>,
}

impl AppState {
    /// State backed by the data directory: the store snapshot is loaded when
    /// present, otherwise the store starts seeded (or empty) and is written
    /// after the first change.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let snapshot_path = config.data_dir.join(SNAPSHOT_FILE);
        let store = if snapshot_path.exists() {
            let store = saving::load_store(&snapshot_path).map_err(|e| {
                AppError::Storage(format!(
                    "Failed to load {}: {}",
                    snapshot_path.display(),
                    e
                ))
            })?;
            log::info!("Loaded store snapshot from {}", snapshot_path.display());
            store
        } else {
            initial_store(&config)
        };
        let settings = Settings::load(config.data_dir.join(SETTINGS_FILE))?;
        Self::assemble(config, store, settings, Some(snapshot_path))
    }

    /// State that never touches the disk.
    pub fn in_memory(config: AppConfig) -> AppResult<Self> {
        let store = initial_store(&config);
        Self::assemble(config, store, Settings::in_memory(), None)
    }

    fn assemble(
        config: AppConfig,
        store: Store,
        settings: Settings,
        snapshot_path: Option<PathBuf>,
    ) -> AppResult<Self> {
        let offset = config.utc_offset()?;
        let http = reqwest::Client::new();
        let ai = TextGenerator::new(
            http.clone(),
            config.gemini.api_key.clone(),
            config.gemini.model.clone(),
            config.gemini.base_url.clone(),
        );
        if !ai.is_configured() {
            log::warn!("No Gemini API key configured; reminders will not be generated");
        }
        Ok(AppState {
            offset,
            store: Mutex::new(store),
            settings: Mutex::new(settings),
            sessions: SessionStore::default(),
            auth: Authenticator::new(config.bootstrap.clone(), http.clone()),
            outbox: SyncOutbox::new(),
            http,
            ai,
            snapshot_path,
            config,
        })
    }

    /// Run `f` against the store.
    pub fn read<T>(&self, f: impl FnOnce(&Store) -> AppResult<T>) -> AppResult<T> {
        let store = self
            .store
            .lock()
            .map_err(|_| AppError::Internal("Store lock poisoned".to_string()))?;
        f(&store)
    }

    /// Run `f` against the store and write the snapshot when it succeeds.
    pub fn write<T>(&self, f: impl FnOnce(&mut Store) -> AppResult<T>) -> AppResult<T> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| AppError::Internal("Store lock poisoned".to_string()))?;
        let result = f(&mut store)?;
        if let Some(path) = &self.snapshot_path {
            if let Err(e) = saving::save_store(&store, path) {
                log::error!("Failed to write store snapshot {}: {}", path.display(), e);
            }
        }
        Ok(result)
    }

    fn with_settings<T>(&self, f: impl FnOnce(&mut Settings) -> AppResult<T>) -> AppResult<T> {
        let mut settings = self
            .settings
            .lock()
            .map_err(|_| AppError::Internal("Settings lock poisoned".to_string()))?;
        f(&mut settings)
    }

    /// Configured sheet endpoint, if any.
    pub fn sheet_url(&self) -> Option<String> {
        self.settings
            .lock()
            .ok()
            .and_then(|s| s.sheet_url().map(str::to_string))
    }

    pub fn sheet_client(&self) -> AppResult<SheetClient> {
        let url = self.sheet_url();
        Ok(SheetClient::connect(self.http.clone(), url.as_deref())?)
    }
}

fn initial_store(config: &AppConfig) -> Store {
    if config.seed_demo_data {
        Store::seeded(Utc::now())
    } else {
        Store::empty()
    }
}

fn to_json<T: Serialize>(value: T) -> AppResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::Internal(format!("Failed to serialize response: {}", e)))
}

fn require_admin(user: &User) -> AppResult<()> {
    if user.role == Role::Admin {
        Ok(())
    } else {
        Err(AppError::PermissionDenied("Access Denied".to_string()))
    }
}

fn attachment(content_type: &str, filename: &str, body: impl Into<Body>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body.into(),
    )
        .into_response()
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    log::info!(
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/signup", post(handle_signup));

    let protected = Router::new()
        .route("/api/auth/logout", post(handle_logout))
        .route("/api/auth/me", get(handle_me))
        .route("/api/dashboard", get(dashboard))
        .route("/api/gate-passes", get(list_passes).post(create_pass))
        .route("/api/gate-passes/form", get(blank_form))
        .route("/api/gate-passes/overdue", get(overdue_passes))
        .route("/api/gate-passes/summary", post(overdue_summary))
        .route("/api/gate-passes/:id", get(pass_detail).put(edit_pass))
        .route("/api/gate-passes/:id/form", get(pass_form))
        .route("/api/gate-passes/:id/return", post(return_pass))
        .route("/api/gate-passes/:id/status", post(change_status))
        .route("/api/gate-passes/:id/reminder", post(pass_reminder))
        .route("/api/sync", get(sync_entries))
        .route("/api/sync/:id/retry", post(retry_sync))
        .route("/api/units", get(list_units).post(add_unit))
        .route("/api/items", get(list_items).post(add_item))
        .route("/api/items/import", post(import_items))
        .route("/api/items/export", get(export_items))
        .route("/api/items/:id", put(update_item).delete(delete_item))
        .route("/api/requesters", get(list_requesters).post(add_requester))
        .route("/api/requesters/import", post(import_requesters))
        .route("/api/requesters/export", get(export_requesters))
        .route(
            "/api/requesters/by-category/:category",
            get(requesters_in_category),
        )
        .route(
            "/api/requesters/:id",
            put(update_requester).delete(delete_requester),
        )
        .route("/api/categories", get(list_categories).post(add_category))
        .route("/api/categories/:name", delete(delete_category))
        .route("/api/sheet/rows", get(sheet_rows).put(update_sheet_row))
        .route("/api/sheet/rows/:row_index", delete(delete_sheet_row))
        .route("/api/sheet/export", get(export_sheet_rows))
        .route("/api/settings", get(settings_view))
        .route("/api/settings/setup", post(settings_setup))
        .route("/api/settings/url", post(settings_change_url))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(middleware::from_fn(log_requests))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API until the process is stopped
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let address = config.bind_address();
    let state = Arc::new(AppState::new(config)?);
    let app = router(state);

    let listener = TcpListener::bind(&address).await?;
    log::info!("Listening on http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> AppResult<Json<Value>> {
    require_view(&user, View::Dashboard)?;
    let now = Utc::now();
    state
        .read(|store| to_json(dashboard_stats(store, now, &state.offset)))
        .map(Json)
}

// Gate passes

async fn list_passes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(filter): Query<PassFilter>,
) -> AppResult<Json<Value>> {
    require_view(&user, View::GatePasses)?;
    let now = Utc::now();
    state
        .read(|store| {
            let found = gate_pass::filter_gate_passes(store, &filter, &state.offset)?;
            to_json(
                found
                    .into_iter()
                    .map(|p| PassView::new(store, p, now))
                    .collect::<Vec<_>>(),
            )
        })
        .map(Json)
}

async fn blank_form(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> AppResult<Json<PassForm>> {
    require_view(&user, View::GatePasses)?;
    Ok(Json(PassForm::blank(Utc::now(), &state.offset)))
}

async fn pass_form(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> AppResult<Json<PassForm>> {
    require_view(&user, View::GatePasses)?;
    state
        .read(|store| {
            store
                .gate_pass(&id)
                .map(|p| PassForm::from_pass(p, &state.offset))
                .ok_or_else(|| AppError::NotFound(format!("Gate pass {} not found", id)))
        })
        .map(Json)
}

async fn create_pass(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(form): Json<PassForm>,
) -> AppResult<(StatusCode, Json<Value>)> {
    require_view(&user, View::GatePasses)?;
    let now = Utc::now();
    let (body, pass_id, payload) = state.write(|store| {
        let pass = gate_pass::create_gate_pass(store, &form, &user, &state.offset)?;
        let payload = SheetPayload::from_pass(&pass, store.pass_item_name(&pass), &state.offset);
        let body = to_json(PassView::new(store, &pass, now))?;
        Ok((body, pass.id, payload))
    })?;
    log::info!("{} created gate pass {}", user.name, payload.gate_pass_no);

    let entry_id = state.outbox.enqueue(&pass_id, payload);
    match state.sheet_client() {
        Ok(client) => {
            state.outbox.spawn_delivery(entry_id.clone(), client);
        }
        Err(e) => state.outbox.skip(&entry_id, &e.to_string()),
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "gatePass": body, "sync": state.outbox.get(&entry_id) })),
    ))
}

async fn pass_detail(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    require_view(&user, View::GatePasses)?;
    let now = Utc::now();
    state
        .read(|store| {
            let pass = store
                .gate_pass(&id)
                .ok_or_else(|| AppError::NotFound(format!("Gate pass {} not found", id)))?;
            to_json(PassDetail::new(store, pass, now))
        })
        .map(Json)
}

async fn edit_pass(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(form): Json<PassForm>,
) -> AppResult<Json<Value>> {
    require_view(&user, View::GatePasses)?;
    let now = Utc::now();
    state
        .write(|store| {
            let pass = gate_pass::update_gate_pass(store, &id, &form, &state.offset)?;
            to_json(PassView::new(store, &pass, now))
        })
        .map(Json)
}

async fn return_pass(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(form): Json<ReturnForm>,
) -> AppResult<Json<Value>> {
    require_view(&user, View::GatePasses)?;
    let now = Utc::now();
    state
        .write(|store| {
            let pass = gate_pass::confirm_return(store, &id, &form, &state.offset)?;
            log::info!("{} returned by {}", pass.gate_pass_no, form.returned_by.trim());
            to_json(PassDetail::new(store, &pass, now))
        })
        .map(Json)
}

#[derive(Debug, Deserialize)]
struct StatusChange {
    status: GatePassStatus,
}

async fn change_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(change): Json<StatusChange>,
) -> AppResult<Json<Value>> {
    require_view(&user, View::GatePasses)?;
    let now = Utc::now();
    state
        .write(|store| {
            let pass = gate_pass::transition(store, &id, change.status, &user)?;
            to_json(PassView::new(store, &pass, now))
        })
        .map(Json)
}

async fn overdue_passes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> AppResult<Json<Value>> {
    require_view(&user, View::GatePasses)?;
    let now = Utc::now();
    state
        .read(|store| {
            to_json(
                overdue_and_pending(store)
                    .into_iter()
                    .map(|p| PassView::new(store, p, now))
                    .collect::<Vec<_>>(),
            )
        })
        .map(Json)
}

/// Optional phone number to build a WhatsApp link for
#[derive(Debug, Default, Deserialize)]
struct ShareRequest {
    #[serde(default)]
    phone: Option<String>,
}

impl ShareRequest {
    fn whatsapp_url(&self, message: &str) -> AppResult<Option<String>> {
        self.phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| phone::whatsapp_url(p, message))
            .transpose()
    }
}

async fn overdue_summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    body: Option<Json<ShareRequest>>,
) -> AppResult<Json<Value>> {
    require_admin(&user)?;
    let share = body.map(|Json(b)| b).unwrap_or_default();
    let rows = state.read(|store| {
        let passes = overdue_and_pending(store);
        Ok(summary_rows(store, &passes, &state.offset))
    })?;
    if rows.is_empty() {
        return Err(AppError::Validation(
            "No overdue or pending returnable items".to_string(),
        ));
    }

    let summary = state.ai.overdue_summary(&rows).await;
    let share_message = phone::summary_share_message(&summary, &rows);
    let whatsapp_url = share.whatsapp_url(&share_message)?;
    Ok(Json(json!({
        "summary": summary,
        "rows": rows,
        "shareMessage": share_message,
        "whatsappUrl": whatsapp_url,
    })))
}

async fn pass_reminder(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    body: Option<Json<ShareRequest>>,
) -> AppResult<Json<Value>> {
    require_admin(&user)?;
    let share = body.map(|Json(b)| b).unwrap_or_default();
    let (pass, item_name) = state.read(|store| {
        let pass = store
            .gate_pass(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Gate pass {} not found", id)))?;
        let item_name = store.pass_item_name(&pass);
        Ok((pass, item_name))
    })?;
    if pass.status != GatePassStatus::Overdue {
        return Err(AppError::Conflict(format!(
            "Gate pass {} is not overdue.",
            pass.gate_pass_no
        )));
    }

    let message = state
        .ai
        .reminder_message(&pass, &item_name, &state.offset)
        .await;
    let whatsapp_url = share.whatsapp_url(&message)?;
    Ok(Json(json!({ "message": message, "whatsappUrl": whatsapp_url })))
}

// Sheet sync outbox

async fn sync_entries(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> AppResult<Json<Vec<OutboxEntry>>> {
    require_view(&user, View::GatePasses)?;
    Ok(Json(state.outbox.entries()))
}

async fn retry_sync(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> AppResult<Json<OutboxEntry>> {
    require_view(&user, View::GatePasses)?;
    let entry = state
        .outbox
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("Sync entry {} not found", id)))?;
    if entry.state == SyncState::Delivered {
        return Err(AppError::Conflict(format!(
            "Gate pass {} is already on the sheet.",
            entry.payload.gate_pass_no
        )));
    }
    let in_flight = || {
        AppError::Conflict(format!(
            "Gate pass {} is already being sent to the sheet.",
            entry.payload.gate_pass_no
        ))
    };
    if entry.in_flight {
        return Err(in_flight());
    }
    match state.sheet_client() {
        Ok(client) => {
            if !state.outbox.deliver(&id, &client).await {
                return Err(in_flight());
            }
        }
        Err(e) => state.outbox.skip(&id, &e.to_string()),
    }
    state
        .outbox
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Sync entry {} not found", id)))
}

// Units and categories

#[derive(Debug, Deserialize)]
struct NameRequest {
    #[serde(default)]
    name: String,
}

async fn list_units(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> AppResult<Json<Vec<String>>> {
    require_view(&user, View::GatePasses)?;
    state
        .read(|store| Ok(store.units().iter().cloned().collect()))
        .map(Json)
}

async fn add_unit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<NameRequest>,
) -> AppResult<(StatusCode, Json<Vec<String>>)> {
    require_view(&user, View::Items)?;
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Please enter a unit name.".to_string()));
    }
    let units = state.write(|store| {
        if !store.add_unit(&request.name) {
            return Err(AppError::Conflict(format!(
                "Unit \"{}\" already exists.",
                request.name.trim()
            )));
        }
        Ok(store.units().iter().cloned().collect())
    })?;
    Ok((StatusCode::CREATED, Json(units)))
}

async fn list_categories(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> AppResult<Json<Vec<String>>> {
    require_view(&user, View::GatePasses)?;
    state
        .read(|store| Ok(store.categories().iter().cloned().collect()))
        .map(Json)
}

async fn add_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<NameRequest>,
) -> AppResult<(StatusCode, Json<Vec<String>>)> {
    require_view(&user, View::RequesterManagement)?;
    if request.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Please enter a category name.".to_string(),
        ));
    }
    let categories = state.write(|store| {
        if !store.add_category(&request.name) {
            return Err(AppError::Conflict(format!(
                "Category \"{}\" already exists.",
                request.name.trim()
            )));
        }
        Ok(store.categories().iter().cloned().collect())
    })?;
    Ok((StatusCode::CREATED, Json(categories)))
}

async fn delete_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(name): Path<String>,
) -> AppResult<StatusCode> {
    require_view(&user, View::RequesterManagement)?;
    state.write(|store| store.delete_category(&name))?;
    Ok(StatusCode::NO_CONTENT)
}

// Items

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Option<String>,
}

impl SearchQuery {
    fn term(&self) -> &str {
        self.search.as_deref().unwrap_or("")
    }
}

async fn list_items(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Value>> {
    require_view(&user, View::Items)?;
    state
        .read(|store| to_json(store.search_items(query.term())))
        .map(Json)
}

async fn add_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(item): Json<NewItem>,
) -> AppResult<(StatusCode, Json<Value>)> {
    require_view(&user, View::Items)?;
    let item = state.write(|store| store.add_item(item))?;
    Ok((StatusCode::CREATED, Json(to_json(item)?)))
}

async fn update_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(item): Json<NewItem>,
) -> AppResult<Json<Value>> {
    require_view(&user, View::Items)?;
    let item = state.write(|store| store.update_item(&id, item))?;
    Ok(Json(to_json(item)?))
}

async fn delete_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    require_view(&user, View::Items)?;
    let item = state.write(|store| store.delete_item(&id))?;
    log::info!("{} deleted item {}", user.name, item.code);
    Ok(StatusCode::NO_CONTENT)
}

async fn import_items(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    text: String,
) -> AppResult<Json<Value>> {
    require_view(&user, View::Items)?;
    let rows = loader::items_from_csv(&text)?;
    let summary = state.write(|store| store.import_items(rows))?;
    log::info!(
        "{} imported {} items, skipped {}",
        user.name,
        summary.imported.len(),
        summary.skipped
    );
    Ok(Json(to_json(summary)?))
}

async fn export_items(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> AppResult<Response> {
    require_view(&user, View::Items)?;
    let csv = state.read(|store| downloader::items_to_csv(store.items()))?;
    let filename = downloader::items_export_filename(Utc::now().with_timezone(&state.offset).date_naive());
    Ok(attachment("text/csv; charset=utf-8", &filename, csv))
}

// Requesters

async fn list_requesters(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Value>> {
    require_view(&user, View::RequesterManagement)?;
    state
        .read(|store| to_json(store.search_requesters(query.term())))
        .map(Json)
}

async fn requesters_in_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(category): Path<String>,
) -> AppResult<Json<Value>> {
    require_view(&user, View::GatePasses)?;
    state
        .read(|store| to_json(store.requesters_in_category(&category)))
        .map(Json)
}

async fn add_requester(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(requester): Json<NewRequester>,
) -> AppResult<(StatusCode, Json<Value>)> {
    require_view(&user, View::RequesterManagement)?;
    let requester = state.write(|store| store.add_requester(requester))?;
    Ok((StatusCode::CREATED, Json(to_json(requester)?)))
}

async fn update_requester(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(requester): Json<NewRequester>,
) -> AppResult<Json<Value>> {
    require_view(&user, View::RequesterManagement)?;
    let requester = state.write(|store| store.update_requester(&id, requester))?;
    Ok(Json(to_json(requester)?))
}

async fn delete_requester(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    require_view(&user, View::RequesterManagement)?;
    state.write(|store| store.delete_requester(&id))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn import_requesters(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    text: String,
) -> AppResult<Json<Value>> {
    require_view(&user, View::RequesterManagement)?;
    let rows = loader::requesters_from_csv(&text)?;
    let summary = state.write(|store| store.import_requesters(rows))?;
    Ok(Json(to_json(summary)?))
}

async fn export_requesters(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> AppResult<Response> {
    require_view(&user, View::RequesterManagement)?;
    let csv = state.read(|store| downloader::requesters_to_csv(store.requesters()))?;
    let filename =
        downloader::requesters_export_filename(Utc::now().with_timezone(&state.offset).date_naive());
    Ok(attachment("text/csv; charset=utf-8", &filename, csv))
}

// Sheet details

async fn fetch_sheet_rows(state: &AppState, filter: &PassFilter) -> AppResult<Vec<SheetRow>> {
    let client = state.sheet_client()?;
    let rows = client.get_gate_passes().await?;
    Ok(filter_sheet_rows(&rows, filter))
}

async fn sheet_rows(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(filter): Query<PassFilter>,
) -> AppResult<Json<Vec<SheetRow>>> {
    require_view(&user, View::GatePassDetails)?;
    Ok(Json(fetch_sheet_rows(&state, &filter).await?))
}

async fn update_sheet_row(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(row): Json<SheetRow>,
) -> AppResult<Json<SheetRow>> {
    require_view(&user, View::GatePassDetails)?;
    state.sheet_client()?.update_gate_pass(&row).await?;
    log::info!("{} updated sheet row {}", user.name, row.row_index);
    Ok(Json(row))
}

async fn delete_sheet_row(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(row_index): Path<i64>,
) -> AppResult<StatusCode> {
    require_view(&user, View::GatePassDetails)?;
    state.sheet_client()?.delete_gate_pass(row_index).await?;
    log::info!("{} deleted sheet row {}", user.name, row_index);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

#[derive(Debug, Default, Deserialize)]
struct ExportQuery {
    #[serde(default)]
    format: ExportFormat,
}

async fn export_sheet_rows(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(export): Query<ExportQuery>,
    Query(filter): Query<PassFilter>,
) -> AppResult<Response> {
    require_view(&user, View::GatePassDetails)?;
    let rows = fetch_sheet_rows(&state, &filter).await?;
    match export.format {
        ExportFormat::Csv => Ok(attachment(
            "text/csv; charset=utf-8",
            downloader::SHEET_CSV_FILENAME,
            downloader::sheet_rows_to_csv(&rows)?,
        )),
        ExportFormat::Xlsx => Ok(attachment(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            downloader::SHEET_XLSX_FILENAME,
            downloader::sheet_rows_to_xlsx(&rows)?,
        )),
    }
}

// Settings

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetupRequest {
    #[serde(default)]
    url: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    confirm_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeUrlRequest {
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_url: String,
}

async fn settings_view(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> AppResult<Json<SettingsView>> {
    require_view(&user, View::Settings)?;
    state.with_settings(|s| Ok(Json(s.view())))
}

async fn settings_setup(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<SetupRequest>,
) -> AppResult<Json<SettingsView>> {
    require_view(&user, View::Settings)?;
    let view = state.with_settings(|s| {
        s.setup(&request.url, &request.password, &request.confirm_password)?;
        Ok(s.view())
    })?;
    log::info!("{} configured the Google Sheet URL", user.name);
    Ok(Json(view))
}

async fn settings_change_url(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<ChangeUrlRequest>,
) -> AppResult<Json<SettingsView>> {
    require_view(&user, View::Settings)?;
    let view = state.with_settings(|s| {
        s.change_url(&request.current_password, &request.new_url)?;
        Ok(s.view())
    })?;
    log::info!("{} changed the Google Sheet URL", user.name);
    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_config(data_dir: PathBuf) -> AppConfig {
        AppConfig {
            data_dir,
            ..Default::default()
        }
    }

    #[test]
    fn writes_snapshot_after_changes() {
        let dir = tempdir().unwrap();
        let state = AppState::new(test_config(dir.path().to_path_buf())).unwrap();
        state.write(|store| Ok(store.add_unit("Roll"))).unwrap();
        assert!(dir.path().join(SNAPSHOT_FILE).exists());

        let reopened = AppState::new(test_config(dir.path().to_path_buf())).unwrap();
        let has_roll = reopened
            .read(|store| Ok(store.units().contains("Roll")))
            .unwrap();
        assert!(has_roll);
    }

    #[test]
    fn failed_change_writes_nothing() {
        let dir = tempdir().unwrap();
        let state = AppState::new(test_config(dir.path().to_path_buf())).unwrap();
        let result = state.write(|store| store.delete_item("missing"));
        assert!(result.is_err());
        assert!(!dir.path().join(SNAPSHOT_FILE).exists());
    }

    #[test]
    fn in_memory_state_has_no_endpoint() {
        let state = AppState::in_memory(AppConfig::default()).unwrap();
        assert_eq!(state.sheet_url(), None);
        assert!(matches!(state.sheet_client(), Err(AppError::Config(_))));
    }
}
