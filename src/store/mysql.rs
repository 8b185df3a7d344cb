//! MySQL queue store
//!
//! Reads the hospital information system's registration tables and writes
//! the `bw_*` tables owned by the display board. Enum columns are cast to
//! `CHAR` so they decode as strings.

use chrono::{NaiveDate, NaiveTime};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

use super::models::*;
use super::QueueStore;
use crate::error::Result;
use crate::status::{CallStatus, StatusRecord};

/// Columns shared by every queue query
const QUEUE_COLUMNS: &str = "\
    r.no_reg, r.no_rawat, rd.nama_dokter, CAST(j.hari_kerja AS CHAR) AS hari_kerja, \
    j.jam_mulai, r.jam_reg, rd.kd_ruang_poli, p.nm_pasien, r.kd_pj, \
    CAST(s.status AS CHAR) AS status";

/// Registration joined to the room's doctors, their clinic hours and patients
const QUEUE_JOINS: &str = "\
    FROM reg_periksa r \
    JOIN bw_ruangpoli_dokter rd ON rd.kd_dokter = r.kd_dokter \
    JOIN jadwal j ON j.kd_dokter = rd.kd_dokter \
    JOIN pasien p ON p.no_rkm_medis = r.no_rkm_medis \
    LEFT JOIN bw_log_antrian_poli s ON s.no_rawat = r.no_rawat";

const QUEUE_WHERE: &str =
    "WHERE r.tgl_registrasi = ? AND CAST(j.hari_kerja AS CHAR) = ? AND rd.kd_ruang_poli = ?";

const QUEUE_ORDER: &str = "ORDER BY j.jam_mulai, r.no_reg, r.jam_reg";

const UPSERT_STATUS: &str = "\
    INSERT INTO bw_log_antrian_poli (no_rawat, kd_ruang_poli, status) VALUES (?, ?, ?) \
    ON DUPLICATE KEY UPDATE kd_ruang_poli = VALUES(kd_ruang_poli), status = VALUES(status)";

fn filter_clause(filter: QueueFilter) -> &'static str {
    match filter {
        QueueFilter::All => "",
        QueueFilter::BeingCalled => "AND s.status = '2'",
        QueueFilter::Unstatused => "AND s.no_rawat IS NULL",
        QueueFilter::Missed => "AND s.status = '1'",
    }
}

#[derive(sqlx::FromRow)]
struct StatusRow {
    no_rawat: String,
    kd_ruang_poli: String,
    status: String,
}

/// Queue store backed by a MySQL connection pool
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Connect a pool with at most `max_connections` connections
    pub async fn connect(options: MySqlConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

impl QueueStore for MySqlStore {
    async fn call_status(&self, visit_id: &str) -> Result<Option<StatusRecord>> {
        let row: Option<StatusRow> = sqlx::query_as(
            "SELECT no_rawat, kd_ruang_poli, CAST(status AS CHAR) AS status \
             FROM bw_log_antrian_poli WHERE no_rawat = ?",
        )
        .bind(visit_id)
        .fetch_optional(&self.pool)
        .await?;

        // A stored "0" (present) reads as no status
        Ok(row.and_then(|row| {
            CallStatus::from_code(&row.status).map(|status| StatusRecord {
                visit_id: row.no_rawat,
                room_code: row.kd_ruang_poli,
                status,
            })
        }))
    }

    async fn set_being_called(&self, visit_id: &str, room_code: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM bw_log_antrian_poli \
             WHERE kd_ruang_poli = ? AND status = '2' AND no_rawat <> ?",
        )
        .bind(room_code)
        .bind(visit_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(UPSERT_STATUS)
            .bind(visit_id)
            .bind(room_code)
            .bind(CallStatus::BeingCalled.code())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_missed(&self, visit_id: &str, room_code: &str) -> Result<()> {
        sqlx::query(UPSERT_STATUS)
            .bind(visit_id)
            .bind(room_code)
            .bind(CallStatus::Missed.code())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_status(&self, visit_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM bw_log_antrian_poli WHERE no_rawat = ?")
            .bind(visit_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear_status_if(&self, visit_id: &str, status: CallStatus) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM bw_log_antrian_poli WHERE no_rawat = ? AND status = ?")
                .bind(visit_id)
                .bind(status.code())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn queue_entries(&self, query: &QueueQuery) -> Result<Vec<QueueEntry>> {
        let mut sql = format!(
            "SELECT {} {} {} {} {}",
            QUEUE_COLUMNS,
            QUEUE_JOINS,
            QUEUE_WHERE,
            filter_clause(query.filter),
            QUEUE_ORDER
        );
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query_as::<_, QueueEntry>(&sql)
            .bind(query.date)
            .bind(&query.day)
            .bind(&query.room_code);
        if let Some(limit) = query.limit {
            q = q.bind(limit);
        }

        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn room_patients(
        &self,
        room_code: &str,
        date: NaiveDate,
        day: &str,
    ) -> Result<Vec<RoomPatient>> {
        let sql = format!(
            "SELECT {}, r.no_rkm_medis, r.kd_dokter, pj.png_jawab, pl.nm_poli {} \
             JOIN penjab pj ON pj.kd_pj = r.kd_pj \
             JOIN poliklinik pl ON pl.kd_poli = r.kd_poli \
             {} {}",
            QUEUE_COLUMNS, QUEUE_JOINS, QUEUE_WHERE, QUEUE_ORDER
        );

        Ok(sqlx::query_as::<_, RoomPatient>(&sql)
            .bind(date)
            .bind(day)
            .bind(room_code)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn displays(&self) -> Result<Vec<Display>> {
        Ok(sqlx::query_as(
            "SELECT kd_display, nama_display FROM bw_display_poli ORDER BY kd_display",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_display(&self, display: &Display) -> Result<()> {
        sqlx::query("INSERT INTO bw_display_poli (kd_display, nama_display) VALUES (?, ?)")
            .bind(&display.code)
            .bind(&display.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_display(&self, display: &Display) -> Result<u64> {
        let result = sqlx::query("UPDATE bw_display_poli SET nama_display = ? WHERE kd_display = ?")
            .bind(&display.name)
            .bind(&display.code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_display(&self, code: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM bw_display_poli WHERE kd_display = ?")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn rooms_for_display(&self, display_code: &str) -> Result<Vec<Room>> {
        Ok(sqlx::query_as(
            "SELECT kd_ruang_poli, nama_ruang_poli, kd_display, posisi_display_poli \
             FROM bw_ruang_poli WHERE kd_display = ? \
             ORDER BY posisi_display_poli, kd_ruang_poli",
        )
        .bind(display_code)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn room(&self, code: &str) -> Result<Option<Room>> {
        Ok(sqlx::query_as(
            "SELECT kd_ruang_poli, nama_ruang_poli, kd_display, posisi_display_poli \
             FROM bw_ruang_poli WHERE kd_ruang_poli = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn rooms(&self) -> Result<Vec<RoomWithDisplay>> {
        Ok(sqlx::query_as(
            "SELECT rp.kd_ruang_poli, rp.nama_ruang_poli, rp.kd_display, \
             rp.posisi_display_poli, d.nama_display \
             FROM bw_ruang_poli rp \
             LEFT JOIN bw_display_poli d ON d.kd_display = rp.kd_display \
             ORDER BY rp.kd_ruang_poli",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_room(&self, room: &RoomInput) -> Result<()> {
        sqlx::query(
            "INSERT INTO bw_ruang_poli \
             (kd_ruang_poli, nama_ruang_poli, kd_display, posisi_display_poli) \
             VALUES (?, ?, NULLIF(?, ''), ?)",
        )
        .bind(&room.code)
        .bind(&room.name)
        .bind(&room.display_code)
        .bind(room.position)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_room(&self, room: &RoomInput) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE bw_ruang_poli \
             SET nama_ruang_poli = ?, kd_display = NULLIF(?, ''), posisi_display_poli = ? \
             WHERE kd_ruang_poli = ?",
        )
        .bind(&room.name)
        .bind(&room.display_code)
        .bind(room.position)
        .bind(&room.code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_room(&self, code: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM bw_ruang_poli WHERE kd_ruang_poli = ?")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn room_doctors(&self, room_code: &str) -> Result<Vec<RoomDoctor>> {
        Ok(sqlx::query_as(
            "SELECT rd.kd_dokter, rd.nama_dokter, CAST(d.jk AS CHAR) AS jk, rd.kd_ruang_poli, \
             rp.nama_ruang_poli, pl.nm_poli \
             FROM bw_ruangpoli_dokter rd \
             LEFT JOIN dokter d ON d.kd_dokter = rd.kd_dokter \
             LEFT JOIN bw_ruang_poli rp ON rp.kd_ruang_poli = rd.kd_ruang_poli \
             LEFT JOIN jadwal j ON j.kd_dokter = rd.kd_dokter \
             LEFT JOIN poliklinik pl ON pl.kd_poli = j.kd_poli \
             WHERE rd.kd_ruang_poli = ? \
             ORDER BY rd.nama_dokter",
        )
        .bind(room_code)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn assign_doctor(
        &self,
        doctor_code: &str,
        doctor_name: &str,
        room_code: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO bw_ruangpoli_dokter (kd_dokter, nama_dokter, kd_ruang_poli) \
             VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE nama_dokter = VALUES(nama_dokter), \
             kd_ruang_poli = VALUES(kd_ruang_poli)",
        )
        .bind(doctor_code)
        .bind(doctor_name)
        .bind(room_code)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn unassign_doctor(&self, doctor_code: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM bw_ruangpoli_dokter WHERE kd_dokter = ?")
            .bind(doctor_code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn doctor_positions(&self) -> Result<Vec<DoctorPosition>> {
        Ok(sqlx::query_as(
            "SELECT rd.kd_ruang_poli, rp.nama_ruang_poli, d.kd_dokter, d.nm_dokter \
             FROM dokter d \
             LEFT JOIN bw_ruangpoli_dokter rd ON rd.kd_dokter = d.kd_dokter \
             LEFT JOIN bw_ruang_poli rp ON rp.kd_ruang_poli = rd.kd_ruang_poli \
             WHERE d.status = '1' \
             ORDER BY d.kd_dokter",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn schedules_for_day(&self, day: &str) -> Result<Vec<DoctorSchedule>> {
        Ok(sqlx::query_as(
            "SELECT d.nm_dokter, s.kd_dokter, CAST(s.hari_kerja AS CHAR) AS hari_kerja, \
             s.jam_mulai, s.jam_selesai, pl.nm_poli \
             FROM bw_jadwal_dokter s \
             JOIN dokter d ON d.kd_dokter = s.kd_dokter \
             JOIN poliklinik pl ON pl.kd_poli = s.kd_poli \
             WHERE s.hari_kerja = ? \
             ORDER BY s.jam_mulai, d.nm_dokter",
        )
        .bind(day)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_schedule(&self, schedule: &NewSchedule) -> Result<()> {
        sqlx::query(
            "INSERT INTO bw_jadwal_dokter (kd_dokter, hari_kerja, jam_mulai, jam_selesai, kd_poli) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&schedule.slot.doctor_code)
        .bind(&schedule.slot.day)
        .bind(schedule.slot.start)
        .bind(schedule.slot.end)
        .bind(&schedule.polyclinic_code)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reschedule(
        &self,
        slot: &ScheduleSlot,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE bw_jadwal_dokter SET jam_mulai = ?, jam_selesai = ? \
             WHERE kd_dokter = ? AND hari_kerja = ? AND jam_mulai = ? AND jam_selesai = ?",
        )
        .bind(start)
        .bind(end)
        .bind(&slot.doctor_code)
        .bind(&slot.day)
        .bind(slot.start)
        .bind(slot.end)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_schedule(&self, slot: &ScheduleSlot) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM bw_jadwal_dokter \
             WHERE kd_dokter = ? AND hari_kerja = ? AND jam_mulai = ? AND jam_selesai = ?",
        )
        .bind(&slot.doctor_code)
        .bind(&slot.day)
        .bind(slot.start)
        .bind(slot.end)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_active_doctor(&self, term: &str) -> Result<Option<Doctor>> {
        let pattern = format!("%{}%", term);
        Ok(sqlx::query_as(
            "SELECT kd_dokter, nm_dokter, CAST(status AS CHAR) AS status FROM dokter \
             WHERE status = '1' AND (kd_dokter LIKE ? OR nm_dokter LIKE ?) \
             ORDER BY kd_dokter LIMIT 1",
        )
        .bind(&pattern)
        .bind(&pattern)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn active_polyclinics(&self) -> Result<Vec<Polyclinic>> {
        Ok(sqlx::query_as(
            "SELECT kd_poli, nm_poli FROM poliklinik WHERE status = '1' ORDER BY nm_poli",
        )
        .fetch_all(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_clauses() {
        assert_eq!(filter_clause(QueueFilter::All), "");
        assert!(filter_clause(QueueFilter::Unstatused).contains("IS NULL"));
        assert!(filter_clause(QueueFilter::BeingCalled).contains("'2'"));
        assert!(filter_clause(QueueFilter::Missed).contains("'1'"));
    }

    #[test]
    fn test_queue_sql_ordering() {
        let sql = format!("{} {} {}", QUEUE_JOINS, QUEUE_WHERE, QUEUE_ORDER);
        assert!(sql.contains("LEFT JOIN bw_log_antrian_poli"));
        assert!(sql.ends_with("ORDER BY j.jam_mulai, r.no_reg, r.jam_reg"));
    }
}
