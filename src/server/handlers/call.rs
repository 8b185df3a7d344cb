//! Call, status and reset actions

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::call::CallRequest;
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::status::CallStatus;
use crate::store::QueueStore;
use crate::tts::SpeechSynthesizer;

pub async fn call_patient<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    body: Result<Json<CallRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    let message = state.desk.call(request).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "message": message },
        "message": "Pasien berhasil dipanggil",
    })))
}

/// Body of a status action
///
/// Presence is either `present: bool` or the older `type: "ada" | "tidak"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    #[serde(alias = "no_rawat")]
    pub visit_id: String,
    #[serde(alias = "kd_ruang_poli")]
    pub room_code: String,
    #[serde(default)]
    pub present: Option<bool>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl StatusRequest {
    fn present(&self) -> Result<bool, ApiError> {
        if let Some(present) = self.present {
            return Ok(present);
        }
        match self.kind.as_deref().map(str::trim) {
            Some("ada") => Ok(true),
            Some("tidak") => Ok(false),
            Some(other) => Err(ApiError::bad_request(format!("unknown type: {}", other))),
            None => Err(ApiError::bad_request("present or type is required")),
        }
    }
}

pub async fn update_status<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    body: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    if request.visit_id.trim().is_empty() || request.room_code.trim().is_empty() {
        return Err(ApiError::bad_request("visitId and roomCode are required"));
    }
    let present = request.present()?;

    state
        .status
        .mark(&request.visit_id, &request.room_code, present)
        .await?;

    let status = if present { "0" } else { CallStatus::Missed.code() };
    Ok(Json(json!({
        "status": "success",
        "data": {
            "no_rawat": request.visit_id,
            "kd_ruang_poli": request.room_code,
            "status": status,
        },
        "message": "Status pasien berhasil diperbarui",
    })))
}

pub async fn reset_status<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    Path(visit_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let removed = state.status.reset(&visit_id).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "no_rawat": visit_id, "removed": removed },
        "message": "Reset log berhasil",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: &str) -> StatusRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_status_request_presence() {
        let r = request(r#"{"visitId":"V1","roomCode":"R1","present":false}"#);
        assert!(!r.present().unwrap());

        let r = request(r#"{"no_rawat":"V1","kd_ruang_poli":"R1","type":"ada"}"#);
        assert!(r.present().unwrap());

        let r = request(r#"{"no_rawat":"V1","kd_ruang_poli":"R1","type":"tidak"}"#);
        assert!(!r.present().unwrap());
    }

    #[test]
    fn test_status_request_needs_presence() {
        let r = request(r#"{"visitId":"V1","roomCode":"R1"}"#);
        assert!(r.present().is_err());

        let r = request(r#"{"visitId":"V1","roomCode":"R1","type":"mungkin"}"#);
        assert!(r.present().is_err());
    }
}
