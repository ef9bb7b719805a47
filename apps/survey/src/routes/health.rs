use axum::Json;
use serde_json::{json, Value};

/// GET / and GET /health
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "service": "survey",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
