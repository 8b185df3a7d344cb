//! Queue store boundary
//!
//! Everything the server reads from or writes to the hospital database goes
//! through [`QueueStore`]. Two backends exist: [`MySqlStore`] over the
//! production schema and [`MemoryStore`], an in-process copy of the same
//! tables for tests and database-less demos.
//!
//! Status writes must be atomic per visit: the status table is keyed by
//! visit id and every write is an insert-or-update on that key.

use std::future::Future;

use chrono::NaiveDate;

use crate::error::Result;
use crate::status::{CallStatus, StatusRecord};

pub mod memory;
pub mod models;
pub mod mysql;

pub use memory::MemoryStore;
pub use models::{
    Display, Doctor, DoctorPosition, DoctorSchedule, NewSchedule, Polyclinic, QueueEntry,
    QueueFilter, QueueQuery, Room, RoomDoctor, RoomInput, RoomPatient, RoomWithDisplay,
    ScheduleSlot,
};
pub use mysql::MySqlStore;

/// Access to registrations, schedules, display settings and call status
///
/// Methods return `Send` futures so callers can run them from spawned tasks
/// (the status reversion timers do).
pub trait QueueStore: Send + Sync + 'static {
    // --- call status -------------------------------------------------------

    /// Current status record of a visit
    fn call_status(
        &self,
        visit_id: &str,
    ) -> impl Future<Output = Result<Option<StatusRecord>>> + Send;

    /// Mark a visit as being called, clearing any other being-called visit
    /// in the same room in the same transaction
    fn set_being_called(
        &self,
        visit_id: &str,
        room_code: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Mark a visit as missed
    fn set_missed(
        &self,
        visit_id: &str,
        room_code: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete any status of a visit; returns rows removed
    fn clear_status(&self, visit_id: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Delete a visit's status only if it currently equals `status`
    fn clear_status_if(
        &self,
        visit_id: &str,
        status: CallStatus,
    ) -> impl Future<Output = Result<u64>> + Send;

    // --- queues ------------------------------------------------------------

    /// Visits registered for a room's doctors, ordered by schedule start,
    /// queue number, then registration time
    fn queue_entries(
        &self,
        query: &QueueQuery,
    ) -> impl Future<Output = Result<Vec<QueueEntry>>> + Send;

    /// Full patient list of a room, same ordering, with payer and polyclinic
    fn room_patients(
        &self,
        room_code: &str,
        date: NaiveDate,
        day: &str,
    ) -> impl Future<Output = Result<Vec<RoomPatient>>> + Send;

    // --- displays ----------------------------------------------------------

    fn displays(&self) -> impl Future<Output = Result<Vec<Display>>> + Send;

    fn insert_display(&self, display: &Display) -> impl Future<Output = Result<()>> + Send;

    /// Rename a display; returns rows changed
    fn update_display(&self, display: &Display) -> impl Future<Output = Result<u64>> + Send;

    fn delete_display(&self, code: &str) -> impl Future<Output = Result<u64>> + Send;

    // --- rooms -------------------------------------------------------------

    /// Rooms assigned to a display, ordered by position
    fn rooms_for_display(
        &self,
        display_code: &str,
    ) -> impl Future<Output = Result<Vec<Room>>> + Send;

    fn room(&self, code: &str) -> impl Future<Output = Result<Option<Room>>> + Send;

    /// Every room with its display name
    fn rooms(&self) -> impl Future<Output = Result<Vec<RoomWithDisplay>>> + Send;

    fn insert_room(&self, room: &RoomInput) -> impl Future<Output = Result<()>> + Send;

    fn update_room(&self, room: &RoomInput) -> impl Future<Output = Result<u64>> + Send;

    fn delete_room(&self, code: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Doctors placed in a room, by name
    fn room_doctors(&self, room_code: &str) -> impl Future<Output = Result<Vec<RoomDoctor>>> + Send;

    // --- doctor positions --------------------------------------------------

    /// Place a doctor in a room (insert-or-update on doctor code)
    fn assign_doctor(
        &self,
        doctor_code: &str,
        doctor_name: &str,
        room_code: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove a doctor's room placement
    fn unassign_doctor(&self, doctor_code: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Active doctors with their placement
    fn doctor_positions(&self) -> impl Future<Output = Result<Vec<DoctorPosition>>> + Send;

    // --- schedules ---------------------------------------------------------

    fn schedules_for_day(
        &self,
        day: &str,
    ) -> impl Future<Output = Result<Vec<DoctorSchedule>>> + Send;

    fn insert_schedule(&self, schedule: &NewSchedule) -> impl Future<Output = Result<()>> + Send;

    /// Move a slot to new start/end times; returns rows changed
    fn reschedule(
        &self,
        slot: &ScheduleSlot,
        start: chrono::NaiveTime,
        end: chrono::NaiveTime,
    ) -> impl Future<Output = Result<u64>> + Send;

    fn delete_schedule(&self, slot: &ScheduleSlot) -> impl Future<Output = Result<u64>> + Send;

    /// First active doctor whose code or name contains `term`
    fn find_active_doctor(&self, term: &str) -> impl Future<Output = Result<Option<Doctor>>> + Send;

    fn active_polyclinics(&self) -> impl Future<Output = Result<Vec<Polyclinic>>> + Send;
}
