//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks both store adapters

use crate::{
    services::gallery_service::GalleryService,
    stores::{DocumentStore, ObjectStore},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Pings the document store.
/// 2. Round-trips a small temp object through the object store (skipped and
///    reported as failing when no object store is configured).
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(service): State<GalleryService>) -> impl IntoResponse {
    // 1) Document store check
    let documents_check = match service.document_store().ping().await {
        Ok(()) => (true, None::<String>),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    // 2) Object store write/read/delete check
    let objects_check = match service.object_store() {
        Some(objects) => {
            let probe_path = format!("healthcheck/{}", Uuid::new_v4());
            match objects.upload(&probe_path, Bytes::from_static(b"readyz")).await {
                Ok(_) => match objects.read(&probe_path).await {
                    Ok(bytes) if &bytes[..] == b"readyz" => {
                        match objects.delete(&probe_path).await {
                            Ok(()) => (true, None::<String>),
                            Err(e) => (true, Some(format!("could not remove probe object: {}", e))),
                        }
                    }
                    Ok(_) => {
                        let _ = objects.delete(&probe_path).await; // best-effort cleanup
                        (false, Some("probe object content mismatch".to_string()))
                    }
                    Err(e) => {
                        let _ = objects.delete(&probe_path).await; // best-effort cleanup
                        (false, Some(format!("could not read probe object: {}", e)))
                    }
                },
                Err(e) => (false, Some(format!("could not write probe object: {}", e))),
            }
        }
        None => (false, Some("object store not configured".to_string())),
    };

    let documents_ok = documents_check.0;
    let objects_ok = objects_check.0;
    let overall_ok = documents_ok && objects_ok;

    let mut checks = HashMap::new();
    checks.insert(
        "documents",
        CheckStatus {
            ok: documents_ok,
            error: documents_check.1,
        },
    );
    checks.insert(
        "objects",
        CheckStatus {
            ok: objects_ok,
            error: objects_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
