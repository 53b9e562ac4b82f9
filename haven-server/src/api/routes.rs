use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use haven_core::service::{EvacuationRoute, NetworkStatus, NodeDistance, ShelterRoute};
use haven_core::{
    Edge, EdgeId, Error, Node, NodeCategory, NodeId, NodeUpdate, RoadCategory, Route, RouteService,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::AppState;
use crate::error::ApiError;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Runs solver-bound work off the async executor
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&RouteService) -> Result<T, Error> + Send + 'static,
{
    let service = state.service.clone();
    Ok(tokio::task::spawn_blocking(move || f(&service)).await??)
}

fn finite(name: &str, value: f64) -> Result<f64, ApiError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::InvalidData(format!("{name} must be a finite number")).into())
    }
}

pub(super) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum RouteFormat {
    #[default]
    Json,
    Geojson,
}

#[derive(Debug, Deserialize)]
pub(super) struct RouteQuery {
    start: NodeId,
    end: NodeId,
    #[serde(default)]
    format: RouteFormat,
}

/// GET /routes/calculate
pub(super) async fn calculate(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
) -> Result<Response, ApiError> {
    let RouteQuery { start, end, format } = query;
    match format {
        RouteFormat::Json => {
            let route =
                blocking(&state, move |service| service.find_safest_route(&start, &end)).await?;
            Ok(Json(route).into_response())
        }
        RouteFormat::Geojson => {
            let feature =
                blocking(&state, move |service| service.route_geojson(&start, &end)).await?;
            Ok(Json(feature).into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct EndpointsQuery {
    start: NodeId,
    end: NodeId,
}

/// POST /routes/recalculate, body: hazard node ids
pub(super) async fn recalculate(
    State(state): State<AppState>,
    Query(EndpointsQuery { start, end }): Query<EndpointsQuery>,
    Json(hazards): Json<Vec<NodeId>>,
) -> ApiResult<Route> {
    let route = blocking(&state, move |service| {
        service.recalculate_route(&start, &end, &hazards)
    })
    .await?;
    Ok(Json(route))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct NodeSafetyResponse {
    node_id: NodeId,
    is_safe: bool,
    changed: bool,
}

fn set_node_safety(state: &AppState, id: NodeId, is_safe: bool) -> ApiResult<NodeSafetyResponse> {
    let changed = state.service.safety().set_node_safety(&id, is_safe)?;
    Ok(Json(NodeSafetyResponse {
        node_id: id,
        is_safe,
        changed,
    }))
}

/// PUT /routes/node/{id}/unsafe
pub(super) async fn mark_node_unsafe(
    State(state): State<AppState>,
    Path(id): Path<NodeId>,
) -> ApiResult<NodeSafetyResponse> {
    set_node_safety(&state, id, false)
}

/// PUT /routes/node/{id}/safe
pub(super) async fn mark_node_safe(
    State(state): State<AppState>,
    Path(id): Path<NodeId>,
) -> ApiResult<NodeSafetyResponse> {
    set_node_safety(&state, id, true)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct EdgeBlockedResponse {
    edge_id: EdgeId,
    blocked: bool,
    changed: bool,
}

fn set_edge_blocked(state: &AppState, id: EdgeId, blocked: bool) -> ApiResult<EdgeBlockedResponse> {
    let changed = state.service.set_edge_blocked(&id, blocked)?;
    Ok(Json(EdgeBlockedResponse {
        edge_id: id,
        blocked,
        changed,
    }))
}

/// PUT /routes/edge/{id}/blocked
pub(super) async fn block_edge(
    State(state): State<AppState>,
    Path(id): Path<EdgeId>,
) -> ApiResult<EdgeBlockedResponse> {
    set_edge_blocked(&state, id, true)
}

/// PUT /routes/edge/{id}/unblocked
pub(super) async fn unblock_edge(
    State(state): State<AppState>,
    Path(id): Path<EdgeId>,
) -> ApiResult<EdgeBlockedResponse> {
    set_edge_blocked(&state, id, false)
}

pub(super) async fn all_nodes(State(state): State<AppState>) -> Json<Vec<Node>> {
    Json(state.service.all_nodes())
}

pub(super) async fn safe_nodes(State(state): State<AppState>) -> Json<Vec<Node>> {
    Json(state.service.safe_nodes())
}

fn default_radius_km() -> f64 {
    5.0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AreaQuery {
    latitude: f64,
    longitude: f64,
    #[serde(default = "default_radius_km")]
    radius_km: f64,
}

/// GET /routes/nodes/area
pub(super) async fn nodes_in_area(
    State(state): State<AppState>,
    Query(query): Query<AreaQuery>,
) -> ApiResult<Vec<NodeDistance>> {
    let radius_km = finite("radiusKm", query.radius_km)?;
    if radius_km < 0.0 {
        return Err(Error::InvalidData("radiusKm must not be negative".to_string()).into());
    }
    let latitude = finite("latitude", query.latitude)?;
    let longitude = finite("longitude", query.longitude)?;
    Ok(Json(state.service.nodes_in_area(latitude, longitude, radius_km)))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateNodeRequest {
    id: NodeId,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    category: NodeCategory,
    #[serde(default = "default_true")]
    is_safe: bool,
}

impl From<CreateNodeRequest> for Node {
    fn from(request: CreateNodeRequest) -> Self {
        let mut node = Node::new(request.id, request.latitude, request.longitude)
            .with_category(request.category);
        if let Some(name) = request.name {
            node = node.with_name(name);
        }
        node.is_safe = request.is_safe;
        node
    }
}

/// POST /routes/nodes
pub(super) async fn create_node(
    State(state): State<AppState>,
    Json(request): Json<CreateNodeRequest>,
) -> Result<(StatusCode, Json<Node>), ApiError> {
    let node = state.service.create_node(request.into())?;
    Ok((StatusCode::CREATED, Json(node)))
}

/// PATCH /routes/nodes/{id}
pub(super) async fn update_node(
    State(state): State<AppState>,
    Path(id): Path<NodeId>,
    Json(update): Json<NodeUpdate>,
) -> ApiResult<Node> {
    Ok(Json(state.service.update_node(&id, &update)?))
}

/// DELETE /routes/nodes/{id}
pub(super) async fn remove_node(
    State(state): State<AppState>,
    Path(id): Path<NodeId>,
) -> ApiResult<Node> {
    Ok(Json(state.service.remove_node(&id)?))
}

pub(super) async fn all_edges(State(state): State<AppState>) -> Json<Vec<Edge>> {
    Json(state.service.all_edges())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateEdgeRequest {
    #[serde(default)]
    id: Option<EdgeId>,
    source: NodeId,
    target: NodeId,
    weight: f64,
    #[serde(default)]
    road_category: RoadCategory,
    #[serde(default = "default_true")]
    bidirectional: bool,
    #[serde(default)]
    blocked: bool,
}

impl From<CreateEdgeRequest> for Edge {
    fn from(request: CreateEdgeRequest) -> Self {
        let mut edge = Edge::new(request.source, request.target, request.weight)
            .with_road_category(request.road_category);
        if let Some(id) = request.id {
            edge.id = id;
        }
        edge.bidirectional = request.bidirectional;
        edge.blocked = request.blocked;
        edge
    }
}

/// POST /routes/edges
pub(super) async fn create_edge(
    State(state): State<AppState>,
    Json(request): Json<CreateEdgeRequest>,
) -> Result<(StatusCode, Json<Edge>), ApiError> {
    let edge = state.service.create_edge(request.into())?;
    Ok((StatusCode::CREATED, Json(edge)))
}

/// DELETE /routes/edges/{id}
pub(super) async fn remove_edge(
    State(state): State<AppState>,
    Path(id): Path<EdgeId>,
) -> ApiResult<Edge> {
    Ok(Json(state.service.remove_edge(&id)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct EvacuationQuery {
    user_location: NodeId,
}

/// POST /routes/evacuation, optional body: candidate shelter ids
pub(super) async fn evacuation_routes(
    State(state): State<AppState>,
    Query(EvacuationQuery { user_location }): Query<EvacuationQuery>,
    candidates: Option<Json<Vec<NodeId>>>,
) -> ApiResult<Vec<EvacuationRoute>> {
    let candidates = candidates.map(|Json(ids)| ids).unwrap_or_default();
    let routes = blocking(&state, move |service| {
        service.get_evacuation_routes(&user_location, &candidates)
    })
    .await?;
    Ok(Json(routes))
}

#[derive(Debug, Deserialize)]
pub(super) struct PositionQuery {
    latitude: f64,
    longitude: f64,
}

/// GET /routes/nearest-shelter
pub(super) async fn nearest_shelter(
    State(state): State<AppState>,
    Query(query): Query<PositionQuery>,
) -> ApiResult<ShelterRoute> {
    let latitude = finite("latitude", query.latitude)?;
    let longitude = finite("longitude", query.longitude)?;
    let route = blocking(&state, move |service| {
        service.find_route_to_nearest_shelter(latitude, longitude)
    })
    .await?;
    Ok(Json(route))
}

/// DELETE /routes/cache/cleanup
pub(super) async fn cleanup_cache(State(state): State<AppState>) -> Json<Value> {
    let removed = state.service.cleanup_expired_routes();
    Json(json!({ "removed": removed }))
}

pub(super) async fn network_status(State(state): State<AppState>) -> Json<NetworkStatus> {
    Json(state.service.network_status())
}

/// POST /routes/network/status - also broadcasts the figures
pub(super) async fn publish_network_status(State(state): State<AppState>) -> Json<NetworkStatus> {
    Json(state.service.publish_network_status())
}
