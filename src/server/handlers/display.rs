//! Display board and calling screen reads

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::board::RoomBoard;
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::store::QueueStore;
use crate::tts::SpeechSynthesizer;

/// Rooms of a display with their next and missed patients
pub async fn display_listing<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    Path(display_code): Path<String>,
) -> Json<Vec<RoomBoard>> {
    let day = state.today();
    Json(state.board.display_listing(&display_code, &day).await)
}

pub async fn missed_patients<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    Path(room_code): Path<String>,
) -> Json<Value> {
    let day = state.today();
    let missed = state.board.missed_patients(&room_code, &day).await;

    Json(json!({
        "status": "success",
        "data": { "missed_patients": missed },
    }))
}

/// Room info and patient list for the calling screen
pub async fn calling_screen<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    Path(room_code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let day = state.today();
    let queue = state.board.room_queue(&room_code, &day).await?;

    Ok(Json(json!({
        "success": true,
        "data": queue,
        "message": "Data pasien berhasil dimuat",
    })))
}

/// Same data as [`calling_screen`], shaped for the queue client
pub async fn room_queue<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    Path(room_code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let day = state.today();
    let queue = state.board.room_queue(&room_code, &day).await?;

    Ok(Json(json!({
        "status": "success",
        "data": {
            "poli_info": queue.room,
            "antrian": queue.patients,
        },
        "message": "Data antrian berhasil diambil",
    })))
}

/// Connection and broadcast counters
pub async fn stats<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
) -> Json<Value> {
    let stats = state.registry.stats().await;
    let pending = state.status.pending_reversions().await;

    Json(json!({
        "broadcast": stats,
        "pending_reversions": pending,
    }))
}
