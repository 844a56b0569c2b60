use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use systemprompt_catalog::SyncOutcome;
use systemprompt_identifiers::ModelCode;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// `GET /v1/models` — publicly listed models (§6), OpenAI-compatible shape.
pub async fn list_models(State(state): State<AppState>) -> Result<Json<Value>> {
    let models = state
        .catalog
        .cache()
        .provider_models()
        .list_publicly_listed()
        .await
        .map_err(|err| AppError::Other(err.into()))?;

    let data = models
        .into_iter()
        .map(|model| {
            json!({
                "id": model.name,
                "object": "model",
                "owned_by": model.model_code.to_string(),
                "display_name": model.display_name,
                "is_latest": model.is_latest,
            })
        })
        .collect::<Vec<_>>();

    Ok(Json(json!({"object": "list", "data": data})))
}

/// `POST /v1/models/sync/all` — reconciles every enabled model (§4.H).
pub async fn sync_all(State(state): State<AppState>) -> Result<Json<Value>> {
    let configs = state
        .catalog
        .cache()
        .list_enabled_models()
        .await
        .map_err(|err| AppError::Other(err.into()))?;
    let model_codes: Vec<ModelCode> = configs.into_iter().map(|config| config.model_code).collect();

    let reports = state.catalog.sync_all(&model_codes).await;
    Ok(Json(json!({"results": reports.into_iter().map(report_to_json).collect::<Vec<_>>()})))
}

/// `POST /v1/models/sync/{provider}` — reconciles a single model code.
pub async fn sync_one(State(state): State<AppState>, Path(provider): Path<String>) -> Result<Json<Value>> {
    let report = state.catalog.sync_one(&ModelCode::new(provider)).await?;
    Ok(Json(report_to_json(Ok(report))))
}

fn report_to_json(report: systemprompt_catalog::Result<systemprompt_catalog::SyncReport>) -> Value {
    match report {
        Ok(report) => {
            let outcome = match report.outcome {
                SyncOutcome::Reconciled { created, repaired, deleted } => {
                    json!({"status": "reconciled", "created": created, "repaired": repaired, "deleted": deleted})
                },
                SyncOutcome::SoftDeletedAllOnFailure { reason } => {
                    json!({"status": "soft_deleted_all", "reason": reason})
                },
            };
            json!({"model_code": report.model_code.to_string(), "outcome": outcome})
        },
        Err(err) => json!({"status": "error", "message": err.to_string()}),
    }
}
