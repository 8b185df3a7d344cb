//! Settings screens: displays, rooms, doctor positions and schedules
//!
//! Bodies are JSON with the table column names as keys.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::calendar::parse_day_name;
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::store::{
    Display, Doctor, DoctorPosition, NewSchedule, QueueStore, RoomDoctor, RoomInput,
    RoomWithDisplay, ScheduleSlot,
};
use crate::tts::SpeechSynthesizer;

fn done(message: impl Into<String>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": message.into(),
    }))
}

fn required(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    Ok(())
}

/// Accepts `HH:MM` or `HH:MM:SS`
fn parse_time(field: &str, value: &str) -> Result<NaiveTime, ApiError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| ApiError::bad_request(format!("{} must be HH:MM, got {:?}", field, value)))
}

/// Canonical schedule day name
fn parse_day(value: &str) -> Result<String, ApiError> {
    let value = value.trim().to_ascii_uppercase();
    match parse_day_name(&value) {
        Some(_) => Ok(value),
        None => Err(ApiError::bad_request(format!("unknown day: {}", value))),
    }
}

// --- displays ---------------------------------------------------------------

pub async fn list_displays<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
) -> Result<Json<Vec<Display>>, ApiError> {
    Ok(Json(state.store.displays().await?))
}

pub async fn add_display<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    body: Result<Json<Display>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(entry) = body?;
    required("kd_display", &entry.code)?;
    required("nama_display", &entry.name)?;

    state.store.insert_display(&entry).await?;
    tracing::info!(display = %entry.code, "Display added");
    Ok(done("Display berhasil ditambahkan"))
}

pub async fn edit_display<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    body: Result<Json<Display>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(entry) = body?;
    required("kd_display", &entry.code)?;
    required("nama_display", &entry.name)?;

    if state.store.update_display(&entry).await? == 0 {
        return Err(ApiError::not_found(format!("display {}", entry.code)));
    }
    Ok(done("Display berhasil diubah"))
}

pub async fn delete_display<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    Path(code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if state.store.delete_display(&code).await? == 0 {
        return Err(ApiError::not_found(format!("display {}", code)));
    }
    tracing::info!(display = %code, "Display deleted");
    Ok(done("Display berhasil dihapus"))
}

// --- rooms ------------------------------------------------------------------

pub async fn list_rooms<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
) -> Result<Json<Vec<RoomWithDisplay>>, ApiError> {
    Ok(Json(state.store.rooms().await?))
}

pub async fn add_room<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    body: Result<Json<RoomInput>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(room) = body?;
    required("kd_ruang_poli", &room.code)?;
    required("nama_ruang_poli", &room.name)?;

    state.store.insert_room(&room).await?;
    tracing::info!(room = %room.code, display = %room.display_code, "Room added");
    Ok(done("Poli berhasil ditambahkan"))
}

pub async fn edit_room<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    body: Result<Json<RoomInput>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(room) = body?;
    required("kd_ruang_poli", &room.code)?;
    required("nama_ruang_poli", &room.name)?;

    if state.store.update_room(&room).await? == 0 {
        return Err(ApiError::not_found(format!("room {}", room.code)));
    }
    Ok(done("Poli berhasil diubah"))
}

pub async fn delete_room<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    Path(code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if state.store.delete_room(&code).await? == 0 {
        return Err(ApiError::not_found(format!("room {}", code)));
    }
    tracing::info!(room = %code, "Room deleted");
    Ok(done("Poli berhasil dihapus"))
}

pub async fn room_doctors<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    Path(code): Path<String>,
) -> Result<Json<Vec<RoomDoctor>>, ApiError> {
    Ok(Json(state.store.room_doctors(&code).await?))
}

// --- doctor positions -------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorPlacement {
    pub kd_dokter: String,
    pub nm_dokter: String,
    /// Blank removes the doctor's placement
    #[serde(default)]
    pub kd_ruang_poli: String,
}

pub async fn doctor_positions<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
) -> Result<Json<Value>, ApiError> {
    let doctors: Vec<DoctorPosition> = state.store.doctor_positions().await?;
    let rooms = state.store.rooms().await?;
    Ok(Json(json!({ "dokter": doctors, "poli": rooms })))
}

pub async fn place_doctor<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    body: Result<Json<DoctorPlacement>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(placement) = body?;
    required("kd_dokter", &placement.kd_dokter)?;

    if placement.kd_ruang_poli.trim().is_empty() {
        state.store.unassign_doctor(&placement.kd_dokter).await?;
        tracing::info!(doctor = %placement.kd_dokter, "Doctor placement removed");
        return Ok(done("Posisi dokter berhasil dihapus"));
    }

    required("nm_dokter", &placement.nm_dokter)?;
    state
        .store
        .assign_doctor(&placement.kd_dokter, &placement.nm_dokter, &placement.kd_ruang_poli)
        .await?;

    let room_name = state
        .store
        .room(&placement.kd_ruang_poli)
        .await?
        .map(|room| room.name)
        .unwrap_or_default();

    tracing::info!(doctor = %placement.kd_dokter, room = %placement.kd_ruang_poli, "Doctor placed");
    Ok(done(format!(
        "Posisi Dokter Dipindahkan Ke {} - {}",
        placement.kd_ruang_poli, room_name
    )))
}

// --- schedules --------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DayQuery {
    pub hari: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub cari: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotInput {
    pub kd_dokter: String,
    pub hari_kerja: String,
    pub jam_mulai: String,
    pub jam_selesai: String,
}

impl SlotInput {
    fn slot(&self) -> Result<ScheduleSlot, ApiError> {
        required("kd_dokter", &self.kd_dokter)?;
        Ok(ScheduleSlot {
            doctor_code: self.kd_dokter.trim().to_string(),
            day: parse_day(&self.hari_kerja)?,
            start: parse_time("jam_mulai", &self.jam_mulai)?,
            end: parse_time("jam_selesai", &self.jam_selesai)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewScheduleInput {
    #[serde(flatten)]
    pub slot: SlotInput,
    pub kd_poli: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleInput {
    #[serde(flatten)]
    pub slot: SlotInput,
    pub jam_mulai_baru: String,
    pub jam_selesai_baru: String,
}

/// Schedules of a day (default today) and the active polyclinics
pub async fn schedules<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    Query(query): Query<DayQuery>,
) -> Result<Json<Value>, ApiError> {
    let day = match query.hari.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(day) => parse_day(day)?,
        None => state.today().day.to_string(),
    };

    let schedules = state.store.schedules_for_day(&day).await?;
    let polyclinics = state.store.active_polyclinics().await?;
    Ok(Json(json!({
        "hari": day,
        "jadwal": schedules,
        "poli": polyclinics,
    })))
}

/// At most one active doctor matching `?cari=`
pub async fn search_doctor<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Doctor>>, ApiError> {
    let found = state.store.find_active_doctor(query.cari.trim()).await?;
    Ok(Json(found.into_iter().collect()))
}

pub async fn add_schedule<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    body: Result<Json<NewScheduleInput>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(input) = body?;
    required("kd_poli", &input.kd_poli)?;
    let schedule = NewSchedule {
        slot: input.slot.slot()?,
        polyclinic_code: input.kd_poli,
    };

    state.store.insert_schedule(&schedule).await?;
    tracing::info!(
        doctor = %schedule.slot.doctor_code,
        day = %schedule.slot.day,
        "Schedule added"
    );
    Ok(done("Jadwal berhasil ditambahkan"))
}

pub async fn change_schedule<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    body: Result<Json<RescheduleInput>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(input) = body?;
    let slot = input.slot.slot()?;
    let start = parse_time("jam_mulai_baru", &input.jam_mulai_baru)?;
    let end = parse_time("jam_selesai_baru", &input.jam_selesai_baru)?;

    if state.store.reschedule(&slot, start, end).await? == 0 {
        return Err(ApiError::not_found("schedule slot"));
    }
    Ok(done("Jadwal berhasil diubah"))
}

pub async fn delete_schedule<S: QueueStore, V: SpeechSynthesizer>(
    State(state): State<AppState<S, V>>,
    body: Result<Json<SlotInput>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(input) = body?;
    let slot = input.slot()?;

    if state.store.delete_schedule(&slot).await? == 0 {
        return Err(ApiError::not_found("schedule slot"));
    }
    Ok(done("Jadwal berhasil dihapus"))
}
