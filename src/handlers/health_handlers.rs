//! Liveness and readiness probes.
//!
//! - GET /healthz  -> always "ok", no I/O
//! - GET /readyz   -> checks the record store and the image directory

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::SqlitePool;
use std::{collections::BTreeMap, path::Path};
use tokio::fs;
use uuid::Uuid;

const PROBE_BYTES: &[u8] = b"readyz";

#[derive(Serialize)]
struct ProbeResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl From<Result<(), String>> for CheckStatus {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self { ok: true, error: None },
            Err(error) => Self {
                ok: false,
                error: Some(error),
            },
        }
    }
}

/// `GET /healthz`
pub async fn healthz() -> impl IntoResponse {
    Json(ProbeResponse {
        status: "ok",
        checks: BTreeMap::new(),
    })
}

/// `GET /readyz`
///
/// 200 when every check passes, 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();
    checks.insert("sqlite", CheckStatus::from(check_sqlite(&state.db).await));
    checks.insert("disk", CheckStatus::from(check_disk(&state.storage_dir).await));

    let ready = checks.values().all(|check| check.ok);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ProbeResponse {
            status: if ready { "ok" } else { "error" },
            checks,
        }),
    )
}

async fn check_sqlite(db: &SqlitePool) -> Result<(), String> {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(db).await {
        Ok(1) => Ok(()),
        Ok(v) => Err(format!("unexpected result: {}", v)),
        Err(e) => Err(format!("error: {}", e)),
    }
}

/// Write, read back and remove a scratch file under `dir`.
async fn check_disk(dir: &Path) -> Result<(), String> {
    let tmp_path = dir.join(format!(".readyz-{}", Uuid::new_v4()));

    fs::write(&tmp_path, PROBE_BYTES)
        .await
        .map_err(|e| format!("could not write tmp file: {}", e))?;

    let read = fs::read(&tmp_path).await;
    let _ = fs::remove_file(&tmp_path).await;

    match read {
        Ok(bytes) if bytes == PROBE_BYTES => Ok(()),
        Ok(_) => Err("file content mismatch".to_string()),
        Err(e) => Err(format!("could not read tmp file: {}", e)),
    }
}
