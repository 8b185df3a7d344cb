//! Typed rows for each query shape
//!
//! Fields serialize under the table column names the display clients read.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::status::{CallStatus, QueueState};

/// A waiting-room display (`bw_display_poli`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Display {
    #[serde(rename = "kd_display")]
    #[sqlx(rename = "kd_display")]
    pub code: String,
    #[serde(rename = "nama_display")]
    #[sqlx(rename = "nama_display")]
    pub name: String,
}

/// A polyclinic consultation room (`bw_ruang_poli`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Room {
    #[serde(rename = "kd_ruang_poli")]
    #[sqlx(rename = "kd_ruang_poli")]
    pub code: String,
    #[serde(rename = "nama_ruang_poli")]
    #[sqlx(rename = "nama_ruang_poli")]
    pub name: String,
    /// Display the room renders on; `None` when unassigned
    #[serde(rename = "kd_display")]
    #[sqlx(rename = "kd_display")]
    pub display_code: Option<String>,
    /// Ordering on the display
    #[serde(rename = "posisi_display_poli")]
    #[sqlx(rename = "posisi_display_poli")]
    pub position: i32,
}

/// Room joined with its display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RoomWithDisplay {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub room: Room,
    #[serde(rename = "nama_display")]
    #[sqlx(rename = "nama_display")]
    pub display_name: Option<String>,
}

/// A doctor (`dokter`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Doctor {
    #[serde(rename = "kd_dokter")]
    #[sqlx(rename = "kd_dokter")]
    pub code: String,
    #[serde(rename = "nm_dokter")]
    #[sqlx(rename = "nm_dokter")]
    pub name: String,
    /// `"1"` when active
    pub status: String,
}

/// A doctor placed in a room, as listed by the room settings screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RoomDoctor {
    #[serde(rename = "kd_dokter")]
    #[sqlx(rename = "kd_dokter")]
    pub doctor_code: String,
    #[serde(rename = "nama_dokter")]
    #[sqlx(rename = "nama_dokter")]
    pub doctor_name: String,
    #[serde(rename = "jk")]
    #[sqlx(rename = "jk")]
    pub gender: Option<String>,
    #[serde(rename = "kd_ruang_poli")]
    #[sqlx(rename = "kd_ruang_poli")]
    pub room_code: String,
    #[serde(rename = "nama_ruang_poli")]
    #[sqlx(rename = "nama_ruang_poli")]
    pub room_name: Option<String>,
    #[serde(rename = "nm_poli")]
    #[sqlx(rename = "nm_poli")]
    pub polyclinic_name: Option<String>,
}

/// An active doctor with the room it is placed in, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DoctorPosition {
    #[serde(rename = "kd_ruang_poli")]
    #[sqlx(rename = "kd_ruang_poli")]
    pub room_code: Option<String>,
    #[serde(rename = "nama_ruang_poli")]
    #[sqlx(rename = "nama_ruang_poli")]
    pub room_name: Option<String>,
    #[serde(rename = "kd_dokter")]
    #[sqlx(rename = "kd_dokter")]
    pub doctor_code: String,
    #[serde(rename = "nm_dokter")]
    #[sqlx(rename = "nm_dokter")]
    pub doctor_name: String,
}

/// An active polyclinic (`poliklinik`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Polyclinic {
    #[serde(rename = "kd_poli")]
    #[sqlx(rename = "kd_poli")]
    pub code: String,
    #[serde(rename = "nm_poli")]
    #[sqlx(rename = "nm_poli")]
    pub name: String,
}

/// A doctor's working slot (`bw_jadwal_dokter`) with names resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DoctorSchedule {
    #[serde(rename = "nm_dokter")]
    #[sqlx(rename = "nm_dokter")]
    pub doctor_name: String,
    #[serde(rename = "kd_dokter")]
    #[sqlx(rename = "kd_dokter")]
    pub doctor_code: String,
    #[serde(rename = "hari_kerja")]
    #[sqlx(rename = "hari_kerja")]
    pub day: String,
    #[serde(rename = "jam_mulai")]
    #[sqlx(rename = "jam_mulai")]
    pub start: NaiveTime,
    #[serde(rename = "jam_selesai")]
    #[sqlx(rename = "jam_selesai")]
    pub end: NaiveTime,
    #[serde(rename = "nm_poli")]
    #[sqlx(rename = "nm_poli")]
    pub polyclinic_name: String,
}

/// One visit in a room's queue, as shown on a display board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct QueueEntry {
    #[serde(rename = "no_reg")]
    #[sqlx(rename = "no_reg")]
    pub queue_number: String,
    #[serde(rename = "no_rawat")]
    #[sqlx(rename = "no_rawat")]
    pub visit_id: String,
    #[serde(rename = "nama_dokter")]
    #[sqlx(rename = "nama_dokter")]
    pub doctor_name: String,
    #[serde(rename = "hari_kerja")]
    #[sqlx(rename = "hari_kerja")]
    pub schedule_day: String,
    #[serde(rename = "jam_mulai")]
    #[sqlx(rename = "jam_mulai")]
    pub schedule_start: NaiveTime,
    #[serde(rename = "jam_reg")]
    #[sqlx(rename = "jam_reg")]
    pub registered_at: NaiveTime,
    #[serde(rename = "kd_ruang_poli")]
    #[sqlx(rename = "kd_ruang_poli")]
    pub room_code: String,
    #[serde(rename = "nm_pasien")]
    #[sqlx(rename = "nm_pasien")]
    pub patient_name: String,
    #[serde(rename = "kd_pj")]
    #[sqlx(rename = "kd_pj")]
    pub payer_code: String,
    /// Raw status code, `None` when the visit has no status record
    #[serde(rename = "status")]
    #[sqlx(rename = "status")]
    pub status_code: Option<String>,
}

impl QueueEntry {
    /// Parsed call status
    pub fn status(&self) -> Option<CallStatus> {
        self.status_code.as_deref().and_then(CallStatus::from_code)
    }

    /// Derived queue state
    pub fn state(&self) -> QueueState {
        QueueState::from(self.status())
    }

    /// Sort key shared by every queue query
    pub fn order_key(&self) -> (NaiveTime, &str, NaiveTime) {
        (self.schedule_start, &self.queue_number, self.registered_at)
    }
}

/// A visit in the full room patient list, with payer and polyclinic names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RoomPatient {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub entry: QueueEntry,
    #[serde(rename = "no_rkm_medis")]
    #[sqlx(rename = "no_rkm_medis")]
    pub medical_record: String,
    #[serde(rename = "kd_dokter")]
    #[sqlx(rename = "kd_dokter")]
    pub doctor_code: String,
    #[serde(rename = "png_jawab")]
    #[sqlx(rename = "png_jawab")]
    pub payer_name: String,
    #[serde(rename = "nm_poli")]
    #[sqlx(rename = "nm_poli")]
    pub polyclinic_name: String,
}

/// Which visits a queue query returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueFilter {
    /// Every visit regardless of status
    All,
    /// Visits currently being called
    BeingCalled,
    /// Visits with no status record at all
    Unstatused,
    /// Visits marked missed
    Missed,
}

impl QueueFilter {
    /// Whether a visit with `status` passes this filter
    pub fn accepts(self, status: Option<CallStatus>) -> bool {
        match self {
            QueueFilter::All => true,
            QueueFilter::BeingCalled => status == Some(CallStatus::BeingCalled),
            QueueFilter::Unstatused => status.is_none(),
            QueueFilter::Missed => status == Some(CallStatus::Missed),
        }
    }
}

/// Parameters of a room queue query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueQuery {
    /// Room whose doctors' registrations are listed
    pub room_code: String,
    /// Registration date (the business day)
    pub date: NaiveDate,
    /// Localized schedule day name matching the date
    pub day: String,
    pub filter: QueueFilter,
    /// Maximum rows, `None` for all
    pub limit: Option<u32>,
}

impl QueueQuery {
    pub fn new(room_code: impl Into<String>, date: NaiveDate, day: impl Into<String>) -> Self {
        Self {
            room_code: room_code.into(),
            date,
            day: day.into(),
            filter: QueueFilter::All,
            limit: None,
        }
    }

    /// Restrict to a status filter
    pub fn filter(mut self, filter: QueueFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Limit the number of rows
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Input for creating or editing a room
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoomInput {
    #[serde(rename = "kd_ruang_poli")]
    pub code: String,
    #[serde(rename = "nama_ruang_poli")]
    pub name: String,
    #[serde(rename = "kd_display")]
    pub display_code: String,
    #[serde(rename = "posisi_display_poli", deserialize_with = "int_or_string")]
    pub position: i32,
}

/// Settings forms post numbers either as JSON numbers or as strings
fn int_or_string<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Identifies one schedule slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSlot {
    pub doctor_code: String,
    pub day: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Input for a new schedule slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSchedule {
    pub slot: ScheduleSlot,
    pub polyclinic_code: String,
}
