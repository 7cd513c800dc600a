//! Request handlers

use axum::{extract::State, response::Html, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::error::{Result, ServerError};
use super::state::AppState;
use crate::inference::{self, FormSubmission, Prediction, Verdict};
use crate::preprocessing::RawRecord;

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub records: Vec<RawRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FormResponse {
    pub prediction: Prediction,
    pub verdict: Verdict,
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub previous_id: Uuid,
    pub current_id: Uuid,
    pub model_name: String,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let artifact = state.service.artifact();
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": artifact.metadata().model_name,
        "artifact_id": artifact.metadata().id,
        "uptime_secs": uptime.num_seconds(),
    }))
}

pub async fn form_options(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, Vec<String>>> {
    Json(inference::form_options(&state.service.artifact()))
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(record): Json<RawRecord>,
) -> Result<Json<Prediction>> {
    Ok(Json(state.service.predict(&record)?))
}

pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>> {
    if request.records.is_empty() {
        return Err(ServerError::BadRequest("records array is empty".to_string()));
    }
    let predictions = state.service.predict_batch(&request.records)?;
    Ok(Json(BatchResponse { predictions }))
}

pub async fn form_predict(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<FormSubmission>,
) -> Result<Json<FormResponse>> {
    let prediction = state.service.predict(&submission.to_record())?;
    let verdict = Verdict::from_prediction(&prediction);
    Ok(Json(FormResponse {
        summary: verdict.summary(),
        prediction,
        verdict,
    }))
}

/// Re-read the configured artifact file and swap it in
pub async fn reload_artifact(State(state): State<Arc<AppState>>) -> Result<Json<ReloadResponse>> {
    let task_state = Arc::clone(&state);
    let previous = tokio::task::spawn_blocking(move || {
        task_state.service.reload(&task_state.config.artifact_path)
    })
    .await
    .map_err(|e| ServerError::Internal(format!("reload task failed: {}", e)))??;

    let current = state.service.artifact();
    info!(
        path = %state.config.artifact_path.display(),
        model = %current.metadata().model_name,
        "Artifact reloaded over HTTP"
    );
    Ok(Json(ReloadResponse {
        previous_id: previous.metadata().id,
        current_id: current.metadata().id,
        model_name: current.metadata().model_name.clone(),
    }))
}

pub async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Autism Screening</title>
    <style>
        body { font-family: sans-serif; max-width: 640px; margin: 2rem auto; color: #222; }
        fieldset { border: 1px solid #ccc; margin-bottom: 1rem; }
        label { display: block; margin: 0.4rem 0; }
        select, input { margin-left: 0.5rem; }
        #result { white-space: pre-line; font-weight: bold; margin-top: 1rem; }
    </style>
</head>
<body>
    <h1>Autism Screening</h1>
    <form id="screening">
        <fieldset id="questions"><legend>Questionnaire (A1 to A10)</legend></fieldset>
        <fieldset>
            <legend>About the child</legend>
            <label>Age (months)<input type="number" name="age_mons" min="0" value="36" required></label>
            <label>Sex<select name="sex" data-field="Sex"></select></label>
            <label>Ethnicity<select name="ethnicity" data-field="Ethnicity"></select></label>
            <label>Born with jaundice<select name="jaundice" data-field="Jaundice"></select></label>
            <label>Family member with ASD<select name="family_mem_with_asd" data-field="Family_mem_with_ASD"></select></label>
            <label>Who completed the test<select name="who_completed_the_test" data-field="Who completed the test"></select></label>
        </fieldset>
        <button type="submit">Predict</button>
    </form>
    <div id="result"></div>
    <script>
        const questions = document.getElementById('questions');
        for (let i = 1; i <= 10; i++) {
            questions.insertAdjacentHTML('beforeend',
                `<label>A${i}<select name="A${i}"><option value="0">0</option><option value="1">1</option></select></label>`);
        }

        fetch('/api/form/options').then(r => r.json()).then(options => {
            document.querySelectorAll('select[data-field]').forEach(select => {
                (options[select.dataset.field] || []).forEach(label => {
                    select.insertAdjacentHTML('beforeend', `<option>${label}</option>`);
                });
            });
        });

        document.getElementById('screening').addEventListener('submit', async (event) => {
            event.preventDefault();
            const data = new FormData(event.target);
            const body = {
                answers: Array.from({ length: 10 }, (_, i) => Number(data.get(`A${i + 1}`))),
                age_mons: Number(data.get('age_mons')),
                sex: data.get('sex'),
                ethnicity: data.get('ethnicity'),
                jaundice: data.get('jaundice'),
                family_mem_with_asd: data.get('family_mem_with_asd'),
                who_completed_the_test: data.get('who_completed_the_test'),
            };
            const response = await fetch('/api/form/predict', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify(body),
            });
            const json = await response.json();
            document.getElementById('result').textContent = response.ok ? json.summary : json.message;
        });
    </script>
</body>
</html>
"#;
