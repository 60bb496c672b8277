//! Admin HTTP API for the master
//!
//! Region servers report status changes here; operators inspect the
//! pending set and the known meta regions.

use crate::common::{display_key, Error};
use crate::master::region::{MetaRegion, RegionInfo, ServerAddress, ServerInfo};
use crate::master::server::Master;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(master: Arc<Master>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/regions/pending", get(pending_regions))
        .route("/regions/unassigned", get(unassigned_regions))
        .route("/regions/open", post(report_open))
        .route("/regions/close", post(report_close))
        .route("/meta/online", get(online_meta_regions))
        .route("/meta/scan-queue", get(scan_queue))
        .route("/meta/root", put(set_root))
        .layer(TraceLayer::new_for_http())
        .with_state(master)
}

/// Region identity as sent by region servers
#[derive(Debug, Clone, Deserialize)]
pub struct RegionFields {
    pub table: String,
    #[serde(default)]
    pub start_key: String,
    #[serde(default)]
    pub end_key: String,
    pub region_id: u64,
}

impl From<RegionFields> for RegionInfo {
    fn from(fields: RegionFields) -> Self {
        RegionInfo::new(fields.table, fields.start_key, fields.end_key, fields.region_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenReport {
    #[serde(flatten)]
    pub region: RegionFields,
    pub server: ServerAddress,
    pub start_code: u64,
}

#[derive(Debug, Deserialize)]
pub struct CloseReport {
    #[serde(flatten)]
    pub region: RegionFields,
    #[serde(default)]
    pub offline: bool,
    #[serde(default)]
    pub reassign: bool,
}

#[derive(Debug, Deserialize)]
pub struct RootLocation {
    pub server: ServerAddress,
}

#[derive(Debug, Serialize)]
pub struct MetaRegionView {
    pub server: String,
    pub region_name: String,
    pub start_key: String,
    pub end_key: String,
}

impl From<&MetaRegion> for MetaRegionView {
    fn from(region: &MetaRegion) -> Self {
        Self {
            server: region.server().to_string(),
            region_name: display_key(region.region_name()),
            start_key: display_key(region.start_key()),
            end_key: display_key(region.end_key()),
        }
    }
}

fn error_response(e: Error) -> Response {
    (e.to_http_status(), Json(json!({ "error": e.to_string() }))).into_response()
}

async fn health(State(master): State<Arc<Master>>) -> impl IntoResponse {
    let registry = master.registry();
    Json(json!({
        "status": "ok",
        "initial_scan_complete": registry.is_initial_scan_complete(),
        "online_meta_regions": registry.online_count(),
        "pending_regions": registry.pending_regions().len(),
        "deferred_events": master.events().deferred_count(),
    }))
}

async fn pending_regions(State(master): State<Arc<Master>>) -> Json<Vec<String>> {
    Json(
        master
            .registry()
            .pending_regions()
            .iter()
            .map(|name| display_key(name))
            .collect(),
    )
}

async fn unassigned_regions(State(master): State<Arc<Master>>) -> Json<Vec<String>> {
    Json(
        master
            .registry()
            .unassigned_regions()
            .iter()
            .map(RegionInfo::region_name_as_string)
            .collect(),
    )
}

async fn online_meta_regions(State(master): State<Arc<Master>>) -> Json<Vec<MetaRegionView>> {
    Json(
        master
            .registry()
            .online_meta_regions()
            .iter()
            .map(MetaRegionView::from)
            .collect(),
    )
}

async fn scan_queue(State(master): State<Arc<Master>>) -> Json<Vec<MetaRegionView>> {
    Json(
        master
            .registry()
            .regions_to_scan()
            .iter()
            .map(MetaRegionView::from)
            .collect(),
    )
}

async fn report_open(
    State(master): State<Arc<Master>>,
    Json(report): Json<OpenReport>,
) -> Response {
    let region = RegionInfo::from(report.region);
    let server = ServerInfo::new(report.server, report.start_code);
    match master.report_region_open(region, server) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => error_response(e),
    }
}

async fn report_close(
    State(master): State<Arc<Master>>,
    Json(report): Json<CloseReport>,
) -> Response {
    let region = RegionInfo::from(report.region);
    match master.report_region_close(region, report.offline, report.reassign) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => error_response(e),
    }
}

async fn set_root(
    State(master): State<Arc<Master>>,
    Json(location): Json<RootLocation>,
) -> StatusCode {
    master.set_root_region(MetaRegion::root(location.server));
    StatusCode::NO_CONTENT
}
