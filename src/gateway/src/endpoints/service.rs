use crate::RouterState;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use common::error::DiscoveryError;
use common::model::{ServiceInstances, ServiceNames};
use common::retry::with_retry;
use serde_json::json;

/// Create the service discovery routes
pub fn router<S: RouterState>() -> Router<S> {
    Router::new()
        .route("/service", get(list_service_names::<S>))
        .route("/service/:name", get(list_instances::<S>))
        .route(
            "/service/:name/:id",
            put(register_instance::<S>).delete(unregister_instance::<S>),
        )
}

fn status_for(err: &DiscoveryError) -> StatusCode {
    match err {
        DiscoveryError::InvalidInstance(_) | DiscoveryError::MalformedPayload(_) => {
            StatusCode::BAD_REQUEST
        }
        DiscoveryError::NotFound { .. } => StatusCode::NOT_FOUND,
        DiscoveryError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Map a registry/codec error to a response. Client errors carry a message;
/// backend errors expose only the stable kind, never internal detail.
fn error_response(err: &DiscoveryError) -> Response {
    let body = if matches!(err, DiscoveryError::BackendUnavailable(_)) {
        json!({ "error": err.kind() })
    } else {
        json!({ "error": err.kind(), "message": err.to_string() })
    };
    (status_for(err), Json(body)).into_response()
}

fn json_response(bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        bytes,
    )
        .into_response()
}

/// PUT /v1/service/:name/:id
///
/// Register (or fully replace) an instance record
#[tracing::instrument(skip(body))]
pub async fn register_instance<S: RouterState>(
    state: State<S>,
    Path((name, id)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let instance = match state.context().decode_instance(&body) {
        Ok(instance) => instance,
        Err(err) => return error_response(&err),
    };

    if instance.service_name != name || instance.instance_id != id {
        return error_response(&DiscoveryError::InvalidInstance(format!(
            "body identity '{}/{}' does not match request path '{name}/{id}'",
            instance.service_name, instance.instance_id
        )));
    }

    let registry = state.registry().clone();
    let result = with_retry(&state.config().discovery.retry, || {
        let registry = registry.clone();
        let instance = instance.clone();
        async move { registry.register(&instance).await }
    })
    .await;

    match result {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(err) => error_response(&err),
    }
}

/// DELETE /v1/service/:name/:id
///
/// Unregister an instance
#[tracing::instrument]
pub async fn unregister_instance<S: RouterState>(
    state: State<S>,
    Path((name, id)): Path<(String, String)>,
) -> Response {
    let registry = state.registry().clone();
    let result = with_retry(&state.config().discovery.retry, || {
        let registry = registry.clone();
        let name = name.clone();
        let id = id.clone();
        async move { registry.unregister(&name, &id).await }
    })
    .await;

    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(&err),
    }
}

/// GET /v1/service/:name
///
/// List the live instances of a service (possibly empty)
#[tracing::instrument]
pub async fn list_instances<S: RouterState>(
    state: State<S>,
    Path(name): Path<String>,
) -> Response {
    let registry = state.registry().clone();
    let result = with_retry(&state.config().discovery.retry, || {
        let registry = registry.clone();
        let name = name.clone();
        async move { registry.query_instances(&name).await }
    })
    .await;

    let services = match result {
        Ok(services) => services,
        Err(err) => return error_response(&err),
    };

    match state
        .context()
        .encode_instance_list(&ServiceInstances { services })
    {
        Ok(bytes) => json_response(bytes),
        Err(err) => {
            log::error!("failed to encode instance list for {name}: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /v1/service
///
/// List the names of all services with at least one live instance
#[tracing::instrument]
pub async fn list_service_names<S: RouterState>(state: State<S>) -> Response {
    let registry = state.registry().clone();
    let result = with_retry(&state.config().discovery.retry, || {
        let registry = registry.clone();
        async move { registry.query_service_names().await }
    })
    .await;

    let names = match result {
        Ok(names) => names,
        Err(err) => return error_response(&err),
    };

    match state.context().encode_name_list(&ServiceNames { names }) {
        Ok(bytes) => json_response(bytes),
        Err(err) => {
            log::error!("failed to encode service name list: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
