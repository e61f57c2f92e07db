//! REST API for the packing service.
//!
//! Exposes the packing strategies over HTTP for the 3D planning frontend.
//! Uses Axum as the web framework and supports CORS.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, OptimizerConfig};
use crate::geometry::Orientation;
use crate::metrics::PackingMetrics;
use crate::model::{BoxFlags, BoxSpec, ConfigurationError, Container, UnplacedReason};
use crate::optimizer::{Algorithm, PackEvent, Packer, PackingOptions, PackingResult, Palette};
use crate::types::Vec3;

#[derive(Clone)]
struct ApiState {
    optimizer_config: OptimizerConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>boxfit API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Container of a packing request.
#[derive(Deserialize, Clone, ToSchema)]
pub struct ContainerRequest {
    /// Length (x), height (y), width (z)
    #[schema(value_type = [f64; 3], example = json!([120.0, 100.0, 80.0]))]
    pub dims: (f64, f64, f64),
    #[serde(default)]
    #[schema(nullable = true)]
    pub max_weight: Option<f64>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub max_weight_per_level: Option<f64>,
}

impl ContainerRequest {
    fn into_container(self) -> Result<Container, ConfigurationError> {
        let mut container = Container::new(self.dims, self.max_weight)?;
        if let Some(limit) = self.max_weight_per_level {
            container = container.with_max_weight_per_level(limit);
            container.validate()?;
        }
        Ok(container)
    }
}

/// Packing options of a request. Unset fields use the server defaults.
#[derive(Deserialize, Clone, Default, ToSchema)]
#[serde(default)]
pub struct PackOptionsRequest {
    #[schema(nullable = true)]
    pub algorithm: Option<Algorithm>,
    #[schema(nullable = true)]
    pub allow_rotation: Option<bool>,
    pub respect_stackability: bool,
    pub respect_fragility: bool,
    pub optimize_for_weight: bool,
    #[schema(nullable = true)]
    pub max_iterations: Option<u32>,
    pub stop_on_overflow: bool,
}

impl PackOptionsRequest {
    fn into_options(self, default_algorithm: Algorithm) -> PackingOptions {
        PackingOptions {
            algorithm: self.algorithm.unwrap_or(default_algorithm),
            allow_rotation: self.allow_rotation,
            respect_stackability: self.respect_stackability,
            respect_fragility: self.respect_fragility,
            optimize_for_weight: self.optimize_for_weight,
            max_iterations: self.max_iterations,
            stop_on_overflow: self.stop_on_overflow,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "container": { "dims": [120.0, 100.0, 80.0], "max_weight": 500.0 },
        "boxes": [
            { "id": "A", "dims": { "x": 30.0, "y": 40.0, "z": 20.0 }, "quantity": 4, "weight": 5.0 }
        ],
        "options": { "algorithm": "constrained", "respect_stackability": true }
    })
)]
pub struct PackRequest {
    pub container: ContainerRequest,
    pub boxes: Vec<BoxSpec>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub options: Option<PackOptionsRequest>,
}

#[derive(Debug)]
struct ValidatedPackRequest {
    container: Container,
    boxes: Vec<BoxSpec>,
    options: PackingOptions,
}

impl PackRequest {
    fn into_validated(self, default_algorithm: Algorithm) -> Result<ValidatedPackRequest, ConfigurationError> {
        let container = self.container.into_container()?;
        let options = self
            .options
            .unwrap_or_default()
            .into_options(default_algorithm);
        Ok(ValidatedPackRequest {
            container,
            boxes: self.boxes,
            options,
        })
    }
}

/// Response with all placed and unplaced boxes.
#[derive(Serialize, ToSchema)]
pub struct PackResponse {
    pub algorithm: Algorithm,
    pub placed: Vec<PackedBox>,
    pub unplaced: Vec<PackedUnplacedBox>,
    pub is_complete: bool,
    pub metrics: PackingMetrics,
}

/// Single placed box in the response.
///
/// # Fields
/// * `pos` - Minimum corner (x, y, z) in the container
/// * `dims` - Dimensions after rotation
#[derive(Serialize, ToSchema)]
pub struct PackedBox {
    pub spec_index: usize,
    pub instance: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub color: Option<String>,
    #[schema(value_type = [f64; 3], example = json!([0.0, 0.0, 0.0]))]
    pub pos: (f64, f64, f64),
    #[schema(value_type = [f64; 3], example = json!([30.0, 40.0, 20.0]))]
    pub dims: (f64, f64, f64),
    pub orientation: Orientation,
    pub weight: f64,
    pub flags: BoxFlags,
}

#[derive(Serialize, ToSchema)]
pub struct PackedUnplacedBox {
    pub spec_index: usize,
    pub id: Option<String>,
    pub quantity: u32,
    #[schema(value_type = [f64; 3], example = json!([35.0, 45.0, 25.0]))]
    pub dims: (f64, f64, f64),
    pub reason_code: String,
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(status: StatusCode, error: impl Into<String>, details: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(StatusCode::UNPROCESSABLE_ENTITY, "Invalid JSON data", err.to_string())
}

fn container_config_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid container configuration",
        details,
    )
}

fn parse_pack_request(
    payload: Result<Json<PackRequest>, JsonRejection>,
    default_algorithm: Algorithm,
) -> Result<ValidatedPackRequest, Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };

    payload
        .into_validated(default_algorithm)
        .map_err(|err| container_config_error(err.to_string()))
}

fn packer_for(config: &OptimizerConfig, options: PackingOptions) -> Packer {
    let packer = Packer::new(options).with_config(config.packing_config());
    if config.assign_colors() {
        packer.with_color_assigner(Palette::default())
    } else {
        packer
    }
}

impl PackResponse {
    pub fn from_packing_result(result: PackingResult) -> Self {
        let is_complete = result.is_complete();
        let PackingResult {
            algorithm,
            placed_boxes,
            unplaced_boxes,
            metrics,
        } = result;

        Self {
            algorithm,
            placed: placed_boxes
                .into_iter()
                .map(|p| PackedBox {
                    spec_index: p.unit.spec_index,
                    instance: p.unit.instance,
                    id: p.unit.id,
                    name: p.unit.name,
                    color: p.unit.color,
                    pos: p.position.as_tuple(),
                    dims: p.dims.as_tuple(),
                    orientation: p.orientation,
                    weight: p.unit.weight,
                    flags: BoxFlags {
                        fragile: p.unit.fragile,
                        stackable: p.unit.stackable,
                    },
                })
                .collect(),
            unplaced: unplaced_boxes
                .into_iter()
                .map(|entry| PackedUnplacedBox {
                    spec_index: entry.spec_index,
                    quantity: entry.quantity(),
                    dims: entry.spec.dims.as_tuple(),
                    id: entry.spec.id,
                    reason_code: entry.reason.code().to_string(),
                    reason: entry.reason.to_string(),
                })
                .collect(),
            is_complete,
            metrics,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_pack, handle_pack_stream),
    components(
        schemas(
            PackRequest,
            ContainerRequest,
            PackOptionsRequest,
            PackResponse,
            PackedBox,
            PackedUnplacedBox,
            ErrorResponse,
            BoxSpec,
            BoxFlags,
            Vec3,
            Algorithm,
            Orientation,
            UnplacedReason,
            PackingMetrics,
            PackEvent
        )
    ),
    tags((name = "packing", description = "Endpoints for 3D box packing"))
)]
struct ApiDoc;

fn router(optimizer_config: OptimizerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let state = ApiState { optimizer_config };

    Router::new()
        .route("/pack", post(handle_pack))
        .route("/pack_stream", post(handle_pack_stream))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server and serves until it terminates.
///
/// Configures CORS for cross-origin requests from the frontend.
pub async fn start_api_server(config: ApiConfig, optimizer_config: OptimizerConfig) -> std::io::Result<()> {
    let app = router(optimizer_config);
    let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;

    log::info!("Server running on http://{}:{}", config.display_host(), config.port());
    if config.binds_to_all_interfaces() {
        log::info!("Local access: http://localhost:{}", config.port());
    }
    log::info!("Endpoints: POST /pack, POST /pack_stream, GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for POST /pack endpoint.
///
/// Packs the requested boxes into the container with the selected strategy.
#[utoipa::path(
    post,
    path = "/pack",
    request_body = PackRequest,
    responses(
        (status = 200, description = "Packing result, including boxes that could not be placed", body = PackResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Malformed request or invalid container",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let config = &state.optimizer_config;
    let request = match parse_pack_request(payload, config.default_algorithm()) {
        Ok(request) => request,
        Err(response) => return response,
    };

    log::info!(
        "New pack request: {} box specs, algorithm {}",
        request.boxes.len(),
        request.options.algorithm
    );
    let packer = packer_for(config, request.options);
    let result = packer.pack(&request.container, &request.boxes);
    log::info!(
        "Result: {} placed, {} unplaced, {:.2}% volume",
        result.placed_count(),
        result.unplaced_count(),
        result.metrics.rounded_utilization()
    );

    (StatusCode::OK, Json(PackResponse::from_packing_result(result))).into_response()
}

/// Handler for POST /pack_stream endpoint (SSE).
///
/// Streams pack events in real-time as Server-Sent Events (text/event-stream).
/// The frontend can animate the placements without waiting for the complete result.
#[utoipa::path(
    post,
    path = "/pack_stream",
    request_body = PackRequest,
    responses(
        (
            status = 200,
            description = "Streams pack events in real-time",
            content_type = "text/event-stream",
            body = PackEvent
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Malformed request or invalid container",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let config = &state.optimizer_config;
    let request = match parse_pack_request(payload, config.default_algorithm()) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let ValidatedPackRequest {
        container,
        boxes,
        options,
    } = request;
    let packer = packer_for(config, options);
    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        packer.pack_with_progress(&container, &boxes, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver means the client went away; later events are dropped.
                let _ = tx.blocking_send(json);
            }
        });
    });

    let stream = ReceiverStream::new(rx).map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_REQUEST: &str = r#"{
        "container": { "dims": [100.0, 100.0, 100.0] },
        "boxes": [{ "dims": { "x": 20.0, "y": 20.0, "z": 20.0 }, "quantity": 3 }]
    }"#;

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/pack"), "OpenAPI documentation is missing the /pack path");
        assert!(
            paths.contains_key("/pack_stream"),
            "OpenAPI documentation is missing the /pack_stream path"
        );
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        for name in ["PackRequest", "PackResponse", "ErrorResponse", "BoxSpec", "PackEvent"] {
            assert!(
                components.schemas.contains_key(name),
                "Expected schema '{}' is missing from OpenAPI spec",
                name
            );
        }
    }

    #[test]
    fn pack_request_without_options_uses_server_default() {
        let request: PackRequest = serde_json::from_str(MINIMAL_REQUEST).expect("Should parse valid JSON");
        let validated = request
            .into_validated(Algorithm::Layer)
            .expect("Should validate successfully");

        assert_eq!(validated.options.algorithm, Algorithm::Layer);
        assert_eq!(validated.options.allow_rotation, None);
        assert_eq!(validated.boxes[0].quantity, 3);
    }

    #[test]
    fn pack_request_options_override_default() {
        let json = r#"{
            "container": { "dims": [10.0, 10.0, 10.0], "max_weight": 100.0 },
            "boxes": [],
            "options": { "algorithm": "constrained", "allow_rotation": false, "respect_fragility": true }
        }"#;
        let request: PackRequest = serde_json::from_str(json).expect("Should parse valid JSON");
        let validated = request
            .into_validated(Algorithm::BestFit)
            .expect("Should validate successfully");

        assert_eq!(validated.options.algorithm, Algorithm::Constrained);
        assert_eq!(validated.options.allow_rotation, Some(false));
        assert!(validated.options.respect_fragility);
        assert!(!validated.options.respect_stackability);
        assert_eq!(validated.container.max_weight, Some(100.0));
    }

    #[test]
    fn invalid_container_is_rejected() {
        let json = r#"{
            "container": { "dims": [10.0, 0.0, 10.0] },
            "boxes": []
        }"#;
        let request: PackRequest = serde_json::from_str(json).expect("Should parse valid JSON");
        assert!(matches!(
            request.into_validated(Algorithm::BestFit),
            Err(ConfigurationError::InvalidDimension(_))
        ));
    }

    #[test]
    fn response_carries_palette_colors_and_reasons() {
        let request: PackRequest = serde_json::from_str(
            r#"{
                "container": { "dims": [10.0, 10.0, 10.0] },
                "boxes": [
                    { "dims": { "x": 10.0, "y": 10.0, "z": 10.0 }, "quantity": 2 },
                    { "dims": { "x": 1.0, "y": 1.0, "z": 1.0 }, "color": "red" }
                ]
            }"#,
        )
        .expect("Should parse valid JSON");
        let validated = request.into_validated(Algorithm::BestFit).expect("valid");
        let packer = packer_for(&OptimizerConfig::default(), validated.options);
        let response = PackResponse::from_packing_result(packer.pack(&validated.container, &validated.boxes));

        assert!(!response.is_complete);
        assert_eq!(response.placed.len(), 1);
        assert_eq!(response.placed[0].color.as_deref(), Some("#f87171"));
        assert_eq!(response.unplaced.len(), 2);
        let codes: Vec<&str> = response.unplaced.iter().map(|u| u.reason_code.as_str()).collect();
        assert_eq!(codes, vec!["no_free_space", "no_free_space"]);
    }

    #[test]
    fn pack_event_serializes_with_type_tag() {
        let json = serde_json::to_value(PackEvent::Finished { placed: 2, unplaced: 1 }).unwrap();
        assert_eq!(json["type"], "Finished");
        assert_eq!(json["placed"], 2);
    }
}
