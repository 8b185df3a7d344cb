//! In-memory queue store
//!
//! Holds the same tables as the hospital database behind one mutex, so
//! every operation (including the clear-room-then-upsert of a call) is
//! atomic. Joins follow the SQL backend: inner joins drop rows with a
//! missing counterpart, left joins keep them.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveTime};
use tokio::sync::Mutex;

use super::models::*;
use super::QueueStore;
use crate::error::{Error, Result};
use crate::status::{CallStatus, StatusRecord};

/// A patient visit registered at check-in (`reg_periksa`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub visit_id: String,
    pub queue_number: String,
    pub date: NaiveDate,
    pub registered_at: NaiveTime,
    pub doctor_code: String,
    pub medical_record: String,
    pub polyclinic_code: String,
    pub payer_code: String,
}

/// A doctor's clinic hours (`jadwal`), used to match visits to a weekday
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicHours {
    pub doctor_code: String,
    pub day: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub polyclinic_code: String,
}

#[derive(Debug, Clone)]
struct DoctorRecord {
    name: String,
    status: String,
    gender: Option<String>,
}

#[derive(Debug, Clone)]
struct PolyclinicRecord {
    name: String,
    status: String,
}

#[derive(Debug, Clone)]
struct Placement {
    doctor_name: String,
    room_code: String,
}

#[derive(Debug, Default)]
struct Tables {
    patients: HashMap<String, String>,
    doctors: BTreeMap<String, DoctorRecord>,
    polyclinics: BTreeMap<String, PolyclinicRecord>,
    payers: HashMap<String, String>,
    visits: Vec<Visit>,
    clinic_hours: Vec<ClinicHours>,
    schedules: Vec<NewSchedule>,
    displays: BTreeMap<String, String>,
    rooms: BTreeMap<String, Room>,
    placements: BTreeMap<String, Placement>,
    statuses: HashMap<String, StatusRecord>,
}

impl Tables {
    /// Registration ⋈ placement ⋈ clinic hours ⋈ patient, for one room and day
    fn join_queue(&self, room_code: &str, date: NaiveDate, day: &str) -> Vec<(QueueEntry, &Visit)> {
        let mut rows = Vec::new();

        for visit in self.visits.iter().filter(|v| v.date == date) {
            let Some(placement) = self.placements.get(&visit.doctor_code) else {
                continue;
            };
            if placement.room_code != room_code {
                continue;
            }
            let Some(patient_name) = self.patients.get(&visit.medical_record) else {
                continue;
            };

            let status_code = self
                .statuses
                .get(&visit.visit_id)
                .map(|record| record.status.code().to_string());

            for hours in self
                .clinic_hours
                .iter()
                .filter(|h| h.doctor_code == visit.doctor_code && h.day == day)
            {
                rows.push((
                    QueueEntry {
                        queue_number: visit.queue_number.clone(),
                        visit_id: visit.visit_id.clone(),
                        doctor_name: placement.doctor_name.clone(),
                        schedule_day: hours.day.clone(),
                        schedule_start: hours.start,
                        registered_at: visit.registered_at,
                        room_code: placement.room_code.clone(),
                        patient_name: patient_name.clone(),
                        payer_code: visit.payer_code.clone(),
                        status_code: status_code.clone(),
                    },
                    visit,
                ));
            }
        }

        rows.sort_by(|a, b| a.0.order_key().cmp(&b.0.order_key()));
        rows
    }
}

/// Queue store kept entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_patient(&self, medical_record: &str, name: &str) {
        let mut tables = self.tables.lock().await;
        tables.patients.insert(medical_record.into(), name.into());
    }

    pub async fn add_doctor(&self, code: &str, name: &str, active: bool, gender: Option<&str>) {
        let mut tables = self.tables.lock().await;
        tables.doctors.insert(
            code.into(),
            DoctorRecord {
                name: name.into(),
                status: if active { "1" } else { "0" }.into(),
                gender: gender.map(String::from),
            },
        );
    }

    pub async fn add_polyclinic(&self, code: &str, name: &str, active: bool) {
        let mut tables = self.tables.lock().await;
        tables.polyclinics.insert(
            code.into(),
            PolyclinicRecord {
                name: name.into(),
                status: if active { "1" } else { "0" }.into(),
            },
        );
    }

    pub async fn add_payer(&self, code: &str, name: &str) {
        let mut tables = self.tables.lock().await;
        tables.payers.insert(code.into(), name.into());
    }

    pub async fn add_visit(&self, visit: Visit) {
        let mut tables = self.tables.lock().await;
        tables.visits.push(visit);
    }

    pub async fn add_clinic_hours(&self, hours: ClinicHours) {
        let mut tables = self.tables.lock().await;
        tables.clinic_hours.push(hours);
    }

    /// Every status record, sorted by visit id
    pub async fn status_records(&self) -> Vec<StatusRecord> {
        let tables = self.tables.lock().await;
        let mut records: Vec<StatusRecord> = tables.statuses.values().cloned().collect();
        records.sort_by(|a, b| a.visit_id.cmp(&b.visit_id));
        records
    }

    async fn upsert_status(&self, visit_id: &str, room_code: &str, status: CallStatus) {
        let mut tables = self.tables.lock().await;
        tables.statuses.insert(
            visit_id.into(),
            StatusRecord {
                visit_id: visit_id.into(),
                room_code: room_code.into(),
                status,
            },
        );
    }
}

impl QueueStore for MemoryStore {
    async fn call_status(&self, visit_id: &str) -> Result<Option<StatusRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.statuses.get(visit_id).cloned())
    }

    async fn set_being_called(&self, visit_id: &str, room_code: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.statuses.retain(|id, record| {
            id == visit_id
                || record.room_code != room_code
                || record.status != CallStatus::BeingCalled
        });
        tables.statuses.insert(
            visit_id.into(),
            StatusRecord {
                visit_id: visit_id.into(),
                room_code: room_code.into(),
                status: CallStatus::BeingCalled,
            },
        );
        Ok(())
    }

    async fn set_missed(&self, visit_id: &str, room_code: &str) -> Result<()> {
        self.upsert_status(visit_id, room_code, CallStatus::Missed).await;
        Ok(())
    }

    async fn clear_status(&self, visit_id: &str) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        Ok(tables.statuses.remove(visit_id).map_or(0, |_| 1))
    }

    async fn clear_status_if(&self, visit_id: &str, status: CallStatus) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        match tables.statuses.get(visit_id) {
            Some(record) if record.status == status => {
                tables.statuses.remove(visit_id);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn queue_entries(&self, query: &QueueQuery) -> Result<Vec<QueueEntry>> {
        let tables = self.tables.lock().await;
        let limit = query.limit.map_or(usize::MAX, |n| n as usize);

        Ok(tables
            .join_queue(&query.room_code, query.date, &query.day)
            .into_iter()
            .map(|(entry, _)| entry)
            .filter(|entry| match query.filter {
                QueueFilter::Unstatused => entry.status_code.is_none(),
                filter => filter.accepts(entry.status()),
            })
            .take(limit)
            .collect())
    }

    async fn room_patients(
        &self,
        room_code: &str,
        date: NaiveDate,
        day: &str,
    ) -> Result<Vec<RoomPatient>> {
        let tables = self.tables.lock().await;

        Ok(tables
            .join_queue(room_code, date, day)
            .into_iter()
            .filter_map(|(entry, visit)| {
                let payer_name = tables.payers.get(&visit.payer_code)?;
                let polyclinic = tables.polyclinics.get(&visit.polyclinic_code)?;
                Some(RoomPatient {
                    entry,
                    medical_record: visit.medical_record.clone(),
                    doctor_code: visit.doctor_code.clone(),
                    payer_name: payer_name.clone(),
                    polyclinic_name: polyclinic.name.clone(),
                })
            })
            .collect())
    }

    async fn displays(&self) -> Result<Vec<Display>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .displays
            .iter()
            .map(|(code, name)| Display {
                code: code.clone(),
                name: name.clone(),
            })
            .collect())
    }

    async fn insert_display(&self, display: &Display) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables.displays.contains_key(&display.code) {
            return Err(Error::Validation(format!(
                "display {} already exists",
                display.code
            )));
        }
        tables
            .displays
            .insert(display.code.clone(), display.name.clone());
        Ok(())
    }

    async fn update_display(&self, display: &Display) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        match tables.displays.get_mut(&display.code) {
            Some(name) => {
                *name = display.name.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_display(&self, code: &str) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        Ok(tables.displays.remove(code).map_or(0, |_| 1))
    }

    async fn rooms_for_display(&self, display_code: &str) -> Result<Vec<Room>> {
        let tables = self.tables.lock().await;
        let mut rooms: Vec<Room> = tables
            .rooms
            .values()
            .filter(|room| room.display_code.as_deref() == Some(display_code))
            .cloned()
            .collect();
        rooms.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.code.cmp(&b.code)));
        Ok(rooms)
    }

    async fn room(&self, code: &str) -> Result<Option<Room>> {
        let tables = self.tables.lock().await;
        Ok(tables.rooms.get(code).cloned())
    }

    async fn rooms(&self) -> Result<Vec<RoomWithDisplay>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .rooms
            .values()
            .map(|room| RoomWithDisplay {
                display_name: room
                    .display_code
                    .as_ref()
                    .and_then(|code| tables.displays.get(code))
                    .cloned(),
                room: room.clone(),
            })
            .collect())
    }

    async fn insert_room(&self, room: &RoomInput) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables.rooms.contains_key(&room.code) {
            return Err(Error::Validation(format!("room {} already exists", room.code)));
        }
        tables.rooms.insert(
            room.code.clone(),
            Room {
                code: room.code.clone(),
                name: room.name.clone(),
                display_code: Some(room.display_code.clone()).filter(|c| !c.is_empty()),
                position: room.position,
            },
        );
        Ok(())
    }

    async fn update_room(&self, room: &RoomInput) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        match tables.rooms.get_mut(&room.code) {
            Some(existing) => {
                existing.name = room.name.clone();
                existing.display_code = Some(room.display_code.clone()).filter(|c| !c.is_empty());
                existing.position = room.position;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_room(&self, code: &str) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        Ok(tables.rooms.remove(code).map_or(0, |_| 1))
    }

    async fn room_doctors(&self, room_code: &str) -> Result<Vec<RoomDoctor>> {
        let tables = self.tables.lock().await;
        let room_name = tables.rooms.get(room_code).map(|room| room.name.clone());
        let mut rows = Vec::new();

        for (doctor_code, placement) in tables
            .placements
            .iter()
            .filter(|(_, p)| p.room_code == room_code)
        {
            let gender = tables
                .doctors
                .get(doctor_code)
                .and_then(|doctor| doctor.gender.clone());
            let row = |polyclinic_name: Option<String>| RoomDoctor {
                doctor_code: doctor_code.clone(),
                doctor_name: placement.doctor_name.clone(),
                gender: gender.clone(),
                room_code: placement.room_code.clone(),
                room_name: room_name.clone(),
                polyclinic_name,
            };

            let hours: Vec<&ClinicHours> = tables
                .clinic_hours
                .iter()
                .filter(|h| &h.doctor_code == doctor_code)
                .collect();
            if hours.is_empty() {
                rows.push(row(None));
            }
            for h in hours {
                let name = tables
                    .polyclinics
                    .get(&h.polyclinic_code)
                    .map(|poly| poly.name.clone());
                rows.push(row(name));
            }
        }

        rows.sort_by(|a, b| a.doctor_name.cmp(&b.doctor_name));
        Ok(rows)
    }

    async fn assign_doctor(
        &self,
        doctor_code: &str,
        doctor_name: &str,
        room_code: &str,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.placements.insert(
            doctor_code.into(),
            Placement {
                doctor_name: doctor_name.into(),
                room_code: room_code.into(),
            },
        );
        Ok(())
    }

    async fn unassign_doctor(&self, doctor_code: &str) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        Ok(tables.placements.remove(doctor_code).map_or(0, |_| 1))
    }

    async fn doctor_positions(&self) -> Result<Vec<DoctorPosition>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .doctors
            .iter()
            .filter(|(_, doctor)| doctor.status == "1")
            .map(|(code, doctor)| {
                let room_code = tables.placements.get(code).map(|p| p.room_code.clone());
                let room_name = room_code
                    .as_ref()
                    .and_then(|c| tables.rooms.get(c))
                    .map(|room| room.name.clone());
                DoctorPosition {
                    room_code,
                    room_name,
                    doctor_code: code.clone(),
                    doctor_name: doctor.name.clone(),
                }
            })
            .collect())
    }

    async fn schedules_for_day(&self, day: &str) -> Result<Vec<DoctorSchedule>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .schedules
            .iter()
            .filter(|s| s.slot.day == day)
            .filter_map(|s| {
                let doctor = tables.doctors.get(&s.slot.doctor_code)?;
                let poly = tables.polyclinics.get(&s.polyclinic_code)?;
                Some(DoctorSchedule {
                    doctor_name: doctor.name.clone(),
                    doctor_code: s.slot.doctor_code.clone(),
                    day: s.slot.day.clone(),
                    start: s.slot.start,
                    end: s.slot.end,
                    polyclinic_name: poly.name.clone(),
                })
            })
            .collect())
    }

    async fn insert_schedule(&self, schedule: &NewSchedule) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.schedules.push(schedule.clone());
        Ok(())
    }

    async fn reschedule(
        &self,
        slot: &ScheduleSlot,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let mut changed = 0;
        for schedule in tables.schedules.iter_mut().filter(|s| &s.slot == slot) {
            schedule.slot.start = start;
            schedule.slot.end = end;
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete_schedule(&self, slot: &ScheduleSlot) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.schedules.len();
        tables.schedules.retain(|s| &s.slot != slot);
        Ok((before - tables.schedules.len()) as u64)
    }

    async fn find_active_doctor(&self, term: &str) -> Result<Option<Doctor>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .doctors
            .iter()
            .filter(|(_, doctor)| doctor.status == "1")
            .find(|(code, doctor)| code.contains(term) || doctor.name.contains(term))
            .map(|(code, doctor)| Doctor {
                code: code.clone(),
                name: doctor.name.clone(),
                status: doctor.status.clone(),
            }))
    }

    async fn active_polyclinics(&self) -> Result<Vec<Polyclinic>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .polyclinics
            .iter()
            .filter(|(_, poly)| poly.status == "1")
            .map(|(code, poly)| Polyclinic {
                code: code.clone(),
                name: poly.name.clone(),
            })
            .collect())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[tokio::test]
    async fn test_set_being_called_clears_room() {
        let store = MemoryStore::new();
        store.set_being_called("V1", "R1").await.unwrap();
        store.set_being_called("V2", "R2").await.unwrap();
        store.set_being_called("V3", "R1").await.unwrap();

        let records = store.status_records().await;
        let ids: Vec<&str> = records.iter().map(|r| r.visit_id.as_str()).collect();
        assert_eq!(ids, vec!["V2", "V3"]);
    }

    #[tokio::test]
    async fn test_set_being_called_keeps_missed_in_room() {
        let store = MemoryStore::new();
        store.set_missed("V1", "R1").await.unwrap();
        store.set_being_called("V2", "R1").await.unwrap();

        let v1 = store.call_status("V1").await.unwrap().unwrap();
        assert_eq!(v1.status, CallStatus::Missed);
    }

    #[tokio::test]
    async fn test_clear_status_if() {
        let store = MemoryStore::new();
        store.set_missed("V1", "R1").await.unwrap();

        assert_eq!(store.clear_status_if("V1", CallStatus::BeingCalled).await.unwrap(), 0);
        assert!(store.call_status("V1").await.unwrap().is_some());

        assert_eq!(store.clear_status_if("V1", CallStatus::Missed).await.unwrap(), 1);
        assert!(store.call_status("V1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_queue_entries_ordering_and_filters() {
        let store = clinic().await;
        visit(&store, "V3", "003", "07:10", "Citra").await;
        visit(&store, "V1", "001", "07:30", "Budi").await;
        visit(&store, "V2", "002", "07:20", "Ayu").await;
        store.set_missed("V2", "R1").await.unwrap();

        let all = store
            .queue_entries(&QueueQuery::new("R1", date(), "SENIN"))
            .await
            .unwrap();
        let numbers: Vec<&str> = all.iter().map(|e| e.queue_number.as_str()).collect();
        assert_eq!(numbers, vec!["001", "002", "003"]);

        let unstatused = store
            .queue_entries(
                &QueueQuery::new("R1", date(), "SENIN")
                    .filter(QueueFilter::Unstatused)
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(unstatused.len(), 1);
        assert_eq!(unstatused[0].visit_id, "V1");

        let missed = store
            .queue_entries(&QueueQuery::new("R1", date(), "SENIN").filter(QueueFilter::Missed))
            .await
            .unwrap();
        assert_eq!(missed.len(), 1);
        assert_eq!(missed[0].visit_id, "V2");
    }

    #[tokio::test]
    async fn test_queue_entries_respect_day_and_date() {
        let store = clinic().await;
        visit(&store, "V1", "001", "07:30", "Budi").await;

        let other_day = store
            .queue_entries(&QueueQuery::new("R1", date(), "SELASA"))
            .await
            .unwrap();
        assert!(other_day.is_empty());

        let other_date = store
            .queue_entries(&QueueQuery::new(
                "R1",
                date().succ_opt().unwrap(),
                "SENIN",
            ))
            .await
            .unwrap();
        assert!(other_date.is_empty());

        let other_room = store
            .queue_entries(&QueueQuery::new("R2", date(), "SENIN"))
            .await
            .unwrap();
        assert!(other_room.is_empty());
    }

    #[tokio::test]
    async fn test_room_patients_join_names() {
        let store = clinic().await;
        visit(&store, "V1", "001", "07:30", "Budi").await;

        let patients = store.room_patients("R1", date(), "SENIN").await.unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].payer_name, "BPJS");
        assert_eq!(patients[0].polyclinic_name, "Poli Umum");
        assert_eq!(patients[0].entry.patient_name, "Budi");
    }

    #[tokio::test]
    async fn test_display_crud() {
        let store = MemoryStore::new();
        let display = Display {
            code: "D1".into(),
            name: "Lobby".into(),
        };
        store.insert_display(&display).await.unwrap();
        assert!(store.insert_display(&display).await.is_err());

        let renamed = Display {
            name: "Lantai 2".into(),
            ..display
        };
        assert_eq!(store.update_display(&renamed).await.unwrap(), 1);
        assert_eq!(store.displays().await.unwrap(), vec![renamed]);

        assert_eq!(store.delete_display("D1").await.unwrap(), 1);
        assert_eq!(store.delete_display("D1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rooms_for_display_ordered_by_position() {
        let store = clinic().await;
        store
            .insert_room(&RoomInput {
                code: "R0".into(),
                name: "Ruang Gigi".into(),
                display_code: "D1".into(),
                position: 0,
            })
            .await
            .unwrap();
        store
            .insert_room(&RoomInput {
                code: "R9".into(),
                name: "Unassigned".into(),
                display_code: String::new(),
                position: 0,
            })
            .await
            .unwrap();

        let rooms = store.rooms_for_display("D1").await.unwrap();
        let codes: Vec<&str> = rooms.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["R0", "R1"]);

        let all = store.rooms().await.unwrap();
        let unassigned = all.iter().find(|r| r.room.code == "R9").unwrap();
        assert_eq!(unassigned.room.display_code, None);
        assert_eq!(unassigned.display_name, None);
    }

    #[tokio::test]
    async fn test_doctor_positions_and_room_doctors() {
        let store = clinic().await;
        store.add_doctor("DR2", "dr. Bayu", true, None).await;
        store.add_doctor("DR3", "dr. Cici", false, None).await;

        let positions = store.doctor_positions().await.unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].room_code.as_deref(), Some("R1"));
        assert_eq!(positions[0].room_name.as_deref(), Some("Ruang 1"));
        assert_eq!(positions[1].room_code, None);

        let doctors = store.room_doctors("R1").await.unwrap();
        assert_eq!(doctors.len(), 1);
        assert_eq!(doctors[0].polyclinic_name.as_deref(), Some("Poli Umum"));
        assert_eq!(doctors[0].gender.as_deref(), Some("P"));

        assert_eq!(store.unassign_doctor("DR1").await.unwrap(), 1);
        assert!(store.room_doctors("R1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_crud() {
        let store = clinic().await;
        let slot = ScheduleSlot {
            doctor_code: "DR1".into(),
            day: "SENIN".into(),
            start: time("08:00"),
            end: time("12:00"),
        };
        store
            .insert_schedule(&NewSchedule {
                slot: slot.clone(),
                polyclinic_code: "U01".into(),
            })
            .await
            .unwrap();

        let monday = store.schedules_for_day("SENIN").await.unwrap();
        assert_eq!(monday.len(), 1);
        assert_eq!(monday[0].doctor_name, "dr. Ani");
        assert_eq!(monday[0].polyclinic_name, "Poli Umum");

        assert_eq!(
            store
                .reschedule(&slot, time("09:00"), time("13:00"))
                .await
                .unwrap(),
            1
        );
        assert_eq!(store.delete_schedule(&slot).await.unwrap(), 0);

        let moved = ScheduleSlot {
            start: time("09:00"),
            end: time("13:00"),
            ..slot
        };
        assert_eq!(store.delete_schedule(&moved).await.unwrap(), 1);
        assert!(store.schedules_for_day("SENIN").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_active_doctor() {
        let store = clinic().await;
        store.add_doctor("DR2", "dr. Bayu", false, None).await;

        let found = store.find_active_doctor("Ani").await.unwrap().unwrap();
        assert_eq!(found.code, "DR1");
        assert!(store.find_active_doctor("Bayu").await.unwrap().is_none());
        assert!(store.find_active_doctor("zzz").await.unwrap().is_none());
    }
}
