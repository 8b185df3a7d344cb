//! Display board listings
//!
//! Decides who a room shows as next: the visit being called if there is
//! one, otherwise the first visit with no status at all. Missed visits are
//! listed separately. Store read failures degrade to empty lists so a
//! board never fails to render.

use std::sync::Arc;

use serde::Serialize;

use crate::calendar::BusinessDay;
use crate::error::Result;
use crate::store::{QueueEntry, QueueFilter, QueueQuery, QueueStore, Room, RoomPatient};

/// One room on a display board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomBoard {
    #[serde(flatten)]
    pub room: Room,
    /// Zero or one visit
    #[serde(rename = "getPasien")]
    pub next: Vec<QueueEntry>,
    #[serde(rename = "missedPatients")]
    pub missed: Vec<QueueEntry>,
}

/// A room and its full patient list for the calling screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomQueue {
    #[serde(rename = "poli_info")]
    pub room: Option<Room>,
    #[serde(rename = "pasien_list")]
    pub patients: Vec<RoomPatient>,
}

/// Read-side queries over a [`QueueStore`]
pub struct QueueBoard<S> {
    store: Arc<S>,
}

impl<S: QueueStore> QueueBoard<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The visit a room shows as next on `day`
    pub async fn next_patient(&self, room_code: &str, day: &BusinessDay) -> Option<QueueEntry> {
        for filter in [QueueFilter::BeingCalled, QueueFilter::Unstatused] {
            let query = QueueQuery::new(room_code, day.date, day.day)
                .filter(filter)
                .limit(1);

            match self.store.queue_entries(&query).await {
                Ok(entries) => {
                    if let Some(entry) = entries.into_iter().next() {
                        return Some(entry);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        room = %room_code,
                        filter = ?filter,
                        error = %e,
                        "Queue read failed"
                    );
                }
            }
        }
        None
    }

    /// Every missed visit of a room on `day`, in queue order
    pub async fn missed_patients(&self, room_code: &str, day: &BusinessDay) -> Vec<QueueEntry> {
        let query = QueueQuery::new(room_code, day.date, day.day).filter(QueueFilter::Missed);

        self.store.queue_entries(&query).await.unwrap_or_else(|e| {
            tracing::warn!(room = %room_code, error = %e, "Missed list read failed");
            Vec::new()
        })
    }

    /// Rooms of a display by position, each with its next and missed visits
    pub async fn display_listing(&self, display_code: &str, day: &BusinessDay) -> Vec<RoomBoard> {
        let rooms = match self.store.rooms_for_display(display_code).await {
            Ok(rooms) => rooms,
            Err(e) => {
                tracing::warn!(display = %display_code, error = %e, "Room list read failed");
                return Vec::new();
            }
        };

        let mut boards = Vec::with_capacity(rooms.len());
        for room in rooms {
            let next = self.next_patient(&room.code, day).await;
            let missed = self.missed_patients(&room.code, day).await;
            boards.push(RoomBoard {
                room,
                next: next.into_iter().collect(),
                missed,
            });
        }
        boards
    }

    /// Room details and today's full patient list
    pub async fn room_queue(&self, room_code: &str, day: &BusinessDay) -> Result<RoomQueue> {
        let room = self.store.room(room_code).await?;
        let patients = self
            .store
            .room_patients(room_code, day.date, day.day)
            .await?;
        Ok(RoomQueue { room, patients })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::fixtures::{clinic, date, visit};
    use crate::store::MemoryStore;

    async fn board() -> (Arc<MemoryStore>, QueueBoard<MemoryStore>) {
        let store = Arc::new(clinic().await);
        (Arc::clone(&store), QueueBoard::new(store))
    }

    fn monday() -> BusinessDay {
        BusinessDay::from_date(date())
    }

    #[tokio::test]
    async fn test_next_patient_prefers_being_called() {
        let (store, board) = board().await;
        visit(&store, "V1", "001", "07:00", "Ayu").await;
        visit(&store, "V2", "002", "07:05", "Budi").await;
        visit(&store, "V3", "003", "07:10", "Citra").await;
        visit(&store, "V4", "004", "07:15", "Dewi").await;
        store.set_being_called("V3", "R1").await.unwrap();

        let next = board.next_patient("R1", &monday()).await.unwrap();
        assert_eq!(next.visit_id, "V3");
    }

    #[tokio::test]
    async fn test_next_patient_falls_back_to_first_unstatused() {
        let (store, board) = board().await;
        visit(&store, "V1", "001", "07:00", "Ayu").await;
        visit(&store, "V2", "002", "07:05", "Budi").await;
        store.set_missed("V1", "R1").await.unwrap();

        let next = board.next_patient("R1", &monday()).await.unwrap();
        assert_eq!(next.visit_id, "V2");

        store.set_missed("V2", "R1").await.unwrap();
        assert!(board.next_patient("R1", &monday()).await.is_none());
    }

    #[tokio::test]
    async fn test_missed_list_complete_and_ordered() {
        let (store, board) = board().await;
        visit(&store, "V3", "003", "07:10", "Citra").await;
        visit(&store, "V2", "002", "07:05", "Budi").await;
        visit(&store, "V1", "001", "07:00", "Ayu").await;
        store.set_missed("V3", "R1").await.unwrap();
        store.set_missed("V1", "R1").await.unwrap();

        let missed = board.missed_patients("R1", &monday()).await;
        let ids: Vec<&str> = missed.iter().map(|e| e.visit_id.as_str()).collect();
        assert_eq!(ids, vec!["V1", "V3"]);
    }

    #[tokio::test]
    async fn test_display_listing() {
        let (store, board) = board().await;
        visit(&store, "V1", "001", "07:00", "Ayu").await;
        visit(&store, "V2", "002", "07:05", "Budi").await;
        store.set_missed("V1", "R1").await.unwrap();

        let listing = board.display_listing("D1", &monday()).await;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].room.code, "R1");
        assert_eq!(listing[0].next[0].visit_id, "V2");
        assert_eq!(listing[0].missed[0].visit_id, "V1");

        let json = serde_json::to_value(&listing[0]).unwrap();
        assert_eq!(json["kd_ruang_poli"], "R1");
        assert_eq!(json["getPasien"][0]["no_rawat"], "V2");
        assert_eq!(json["missedPatients"][0]["no_rawat"], "V1");
    }

    #[tokio::test]
    async fn test_unknown_display_is_empty() {
        let (_store, board) = board().await;
        assert!(board.display_listing("NOPE", &monday()).await.is_empty());
    }

    #[tokio::test]
    async fn test_room_queue() {
        let (store, board) = board().await;
        visit(&store, "V1", "001", "07:00", "Ayu").await;

        let queue = board.room_queue("R1", &monday()).await.unwrap();
        assert_eq!(queue.room.unwrap().name, "Ruang 1");
        assert_eq!(queue.patients.len(), 1);

        let missing = board.room_queue("R404", &monday()).await.unwrap();
        assert!(missing.room.is_none());
        assert!(missing.patients.is_empty());
    }
}
