//! `PostgreSQL` store engine.
//!
//! The primary store. Commits run inside a database transaction that first
//! claims the event's version with a conditional `UPDATE`; zero rows
//! affected means another writer got there first and the whole set aborts
//! with a write conflict. Serialization failures reported by Postgres
//! (SQLSTATE 40001/40P01) normalize to the same fault, so the executor
//! retries either shape identically.
//!
//! Schema lives in `store/schema.sql`.

use crate::store::{EventTransaction, Store, StoreResult, TxOp};
use async_trait::async_trait;
use gatelist_core::{
    Booking, BookingId, BookingStatus, CheckInMethod, CheckInRecord, EventId, EventRecord,
    EventStatus, Notification, NotificationId, NotificationKind, OperatorId, StoreFault,
    SubjectId, TicketId,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

const BOOKING_COLUMNS: &str = "id, subject_id, event_id, ticket_id, status, is_waitlist, \
     waitlist_position, created_at, cancelled_at, checked_in_at, checked_in_by, check_in_method";

/// `PostgreSQL`-backed store.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the given database URL.
    ///
    /// # Errors
    ///
    /// Returns a fault when the connection cannot be established.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(fault_from_sqlx)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_event(&self, event: EventRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO gl_events \
                 (id, title, capacity, registered_count, waitlist_count, waitlist_high_water, \
                  status, starts_at, deleted_at, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(*event.id.as_uuid())
        .bind(&event.title)
        .bind(i64::from(event.capacity))
        .bind(i64::from(event.registered_count))
        .bind(i64::from(event.waitlist_count))
        .bind(i64::from(event.waitlist_high_water))
        .bind(event_status_str(event.status))
        .bind(event.starts_at)
        .bind(event.deleted_at)
        .bind(version_param(event.version)?)
        .execute(&self.pool)
        .await
        .map_err(fault_from_sqlx)?;
        Ok(())
    }

    async fn get_event(&self, id: EventId) -> StoreResult<Option<EventRecord>> {
        let row = sqlx::query(
            "SELECT id, title, capacity, registered_count, waitlist_count, waitlist_high_water, \
                    status, starts_at, deleted_at, version \
             FROM gl_events WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(fault_from_sqlx)?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn get_booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM gl_bookings WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(fault_from_sqlx)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn get_booking_by_ticket(&self, ticket_id: &TicketId) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM gl_bookings WHERE ticket_id = $1");
        let row = sqlx::query(&sql)
            .bind(ticket_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(fault_from_sqlx)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn find_active_booking(
        &self,
        subject_id: SubjectId,
        event_id: EventId,
    ) -> StoreResult<Option<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM gl_bookings \
             WHERE subject_id = $1 AND event_id = $2 \
               AND status IN ('confirmed', 'waitlist') \
             LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(*subject_id.as_uuid())
            .bind(*event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(fault_from_sqlx)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn event_participants(&self, event_id: EventId) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM gl_bookings \
             WHERE event_id = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query(&sql)
            .bind(*event_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(fault_from_sqlx)?;
        rows.iter().map(booking_from_row).collect()
    }

    async fn next_waitlisted(&self, event_id: EventId) -> StoreResult<Option<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM gl_bookings \
             WHERE event_id = $1 AND status = 'waitlist' \
             ORDER BY waitlist_position LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(*event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(fault_from_sqlx)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn check_in_log(&self, booking_id: BookingId) -> StoreResult<Vec<CheckInRecord>> {
        let rows = sqlx::query(
            "SELECT id, booking_id, event_id, subject_id, checked_in_by, method, checked_in_at \
             FROM gl_check_in_log WHERE booking_id = $1 ORDER BY checked_in_at, id",
        )
        .bind(*booking_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(fault_from_sqlx)?;
        rows.iter().map(check_in_from_row).collect()
    }

    async fn notifications_for(&self, subject_id: SubjectId) -> StoreResult<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT id, subject_id, kind, booking_id, event_id, created_at \
             FROM gl_notifications WHERE subject_id = $1 ORDER BY created_at, id",
        )
        .bind(*subject_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(fault_from_sqlx)?;
        rows.iter().map(notification_from_row).collect()
    }

    async fn commit(&self, tx: EventTransaction) -> StoreResult<()> {
        let mut db_tx = self.pool.begin().await.map_err(fault_from_sqlx)?;

        // Claim the version first; every other writer on this event races
        // this row and exactly one wins.
        let claimed = sqlx::query("UPDATE gl_events SET version = version + 1 WHERE id = $1 AND version = $2")
            .bind(*tx.event_id.as_uuid())
            .bind(version_param(tx.expected_version)?)
            .execute(&mut *db_tx)
            .await
            .map_err(fault_from_sqlx)?;

        if claimed.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM gl_events WHERE id = $1")
                .bind(*tx.event_id.as_uuid())
                .fetch_optional(&mut *db_tx)
                .await
                .map_err(fault_from_sqlx)?;
            tracing::debug!(
                operation = tx.operation,
                event_id = %tx.event_id,
                expected = tx.expected_version,
                "commit aborted on version check"
            );
            return Err(if exists.is_some() {
                StoreFault::WriteConflict { entity: "event".into() }
            } else {
                StoreFault::Missing { entity: "event".into() }
            });
        }

        for op in &tx.ops {
            apply_op(&mut db_tx, &tx, op).await?;
        }

        db_tx.commit().await.map_err(fault_from_sqlx)?;
        Ok(())
    }
}

async fn apply_op(
    db_tx: &mut Transaction<'_, Postgres>,
    tx: &EventTransaction,
    op: &TxOp,
) -> StoreResult<()> {
    match op {
        TxOp::CreateBooking(b) => {
            sqlx::query(
                "INSERT INTO gl_bookings \
                     (id, subject_id, event_id, ticket_id, status, is_waitlist, \
                      waitlist_position, created_at, cancelled_at, checked_in_at, \
                      checked_in_by, check_in_method) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(*b.id.as_uuid())
            .bind(*b.subject_id.as_uuid())
            .bind(*b.event_id.as_uuid())
            .bind(b.ticket_id.as_str().to_owned())
            .bind(booking_status_str(b.status))
            .bind(b.is_waitlist)
            .bind(b.waitlist_position.map(i64::from))
            .bind(b.created_at)
            .bind(b.cancelled_at)
            .bind(b.checked_in_at)
            .bind(b.checked_in_by.map(|o| *o.as_uuid()))
            .bind(b.check_in_method.map(method_str))
            .execute(&mut **db_tx)
            .await
            .map_err(fault_from_sqlx)?;
        }
        TxOp::UpdateBooking(b) => {
            let updated = sqlx::query(
                "UPDATE gl_bookings SET status = $2, is_waitlist = $3, waitlist_position = $4, \
                      cancelled_at = $5, checked_in_at = $6, checked_in_by = $7, \
                      check_in_method = $8 \
                 WHERE id = $1",
            )
            .bind(*b.id.as_uuid())
            .bind(booking_status_str(b.status))
            .bind(b.is_waitlist)
            .bind(b.waitlist_position.map(i64::from))
            .bind(b.cancelled_at)
            .bind(b.checked_in_at)
            .bind(b.checked_in_by.map(|o| *o.as_uuid()))
            .bind(b.check_in_method.map(method_str))
            .execute(&mut **db_tx)
            .await
            .map_err(fault_from_sqlx)?;
            if updated.rows_affected() == 0 {
                return Err(StoreFault::Missing { entity: "booking".into() });
            }
        }
        TxOp::UpdateEvent(ev) => {
            if ev.id != tx.event_id {
                return Err(StoreFault::Invalid {
                    detail: format!(
                        "transaction for event {} cannot update event {}",
                        tx.event_id, ev.id
                    ),
                });
            }
            // Version was already claimed above; rewrite everything else.
            sqlx::query(
                "UPDATE gl_events SET title = $2, capacity = $3, registered_count = $4, \
                      waitlist_count = $5, waitlist_high_water = $6, status = $7, \
                      starts_at = $8, deleted_at = $9 \
                 WHERE id = $1",
            )
            .bind(*ev.id.as_uuid())
            .bind(&ev.title)
            .bind(i64::from(ev.capacity))
            .bind(i64::from(ev.registered_count))
            .bind(i64::from(ev.waitlist_count))
            .bind(i64::from(ev.waitlist_high_water))
            .bind(event_status_str(ev.status))
            .bind(ev.starts_at)
            .bind(ev.deleted_at)
            .execute(&mut **db_tx)
            .await
            .map_err(fault_from_sqlx)?;
        }
        TxOp::AppendCheckIn(record) => {
            sqlx::query(
                "INSERT INTO gl_check_in_log \
                     (id, booking_id, event_id, subject_id, checked_in_by, method, checked_in_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(record.id)
            .bind(*record.booking_id.as_uuid())
            .bind(*record.event_id.as_uuid())
            .bind(*record.subject_id.as_uuid())
            .bind(*record.checked_in_by.as_uuid())
            .bind(method_str(record.method))
            .bind(record.checked_in_at)
            .execute(&mut **db_tx)
            .await
            .map_err(fault_from_sqlx)?;
        }
        TxOp::CreateNotification(n) => {
            sqlx::query(
                "INSERT INTO gl_notifications \
                     (id, subject_id, kind, booking_id, event_id, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(*n.id.as_uuid())
            .bind(*n.subject_id.as_uuid())
            .bind(kind_str(n.kind))
            .bind(*n.booking_id.as_uuid())
            .bind(*n.event_id.as_uuid())
            .bind(n.created_at)
            .execute(&mut **db_tx)
            .await
            .map_err(fault_from_sqlx)?;
        }
    }
    Ok(())
}

// ============================================================================
// Fault normalization
// ============================================================================

/// Map a native sqlx error into the closed fault type, once, at the
/// boundary.
fn fault_from_sqlx(err: sqlx::Error) -> StoreFault {
    match err {
        sqlx::Error::Io(e) => StoreFault::Unavailable { detail: e.to_string() },
        sqlx::Error::PoolTimedOut => {
            StoreFault::Unavailable { detail: "connection pool timed out".into() }
        }
        sqlx::Error::PoolClosed => {
            StoreFault::Unavailable { detail: "connection pool closed".into() }
        }
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // serialization_failure / deadlock_detected: lost a write race
            Some("40001" | "40P01") => StoreFault::WriteConflict { entity: "event".into() },
            Some(code) => {
                StoreFault::Backend { code: code.to_string(), detail: db.message().to_string() }
            }
            None => StoreFault::Backend {
                code: "database".into(),
                detail: db.message().to_string(),
            },
        },
        sqlx::Error::RowNotFound => StoreFault::Missing { entity: "row".into() },
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::TypeNotFound { .. } => {
            StoreFault::Corrupted { detail: err.to_string() }
        }
        other => StoreFault::Unknown { detail: other.to_string() },
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn decode_fault(err: sqlx::Error) -> StoreFault {
    StoreFault::Corrupted { detail: err.to_string() }
}

fn version_param(version: u64) -> StoreResult<i64> {
    i64::try_from(version)
        .map_err(|_| StoreFault::Invalid { detail: format!("version {version} out of range") })
}

fn count_from(row: &PgRow, column: &str) -> StoreResult<u32> {
    let value: i64 = row.try_get(column).map_err(decode_fault)?;
    u32::try_from(value)
        .map_err(|_| StoreFault::Corrupted { detail: format!("bad count in {column}: {value}") })
}

fn event_from_row(row: &PgRow) -> StoreResult<EventRecord> {
    let status: String = row.try_get("status").map_err(decode_fault)?;
    let version: i64 = row.try_get("version").map_err(decode_fault)?;
    Ok(EventRecord {
        id: EventId::from_uuid(row.try_get("id").map_err(decode_fault)?),
        title: row.try_get("title").map_err(decode_fault)?,
        capacity: count_from(row, "capacity")?,
        registered_count: count_from(row, "registered_count")?,
        waitlist_count: count_from(row, "waitlist_count")?,
        waitlist_high_water: count_from(row, "waitlist_high_water")?,
        status: parse_event_status(&status)?,
        starts_at: row.try_get("starts_at").map_err(decode_fault)?,
        deleted_at: row.try_get("deleted_at").map_err(decode_fault)?,
        version: u64::try_from(version).map_err(|_| StoreFault::Corrupted {
            detail: format!("negative version {version}"),
        })?,
    })
}

fn booking_from_row(row: &PgRow) -> StoreResult<Booking> {
    let status: String = row.try_get("status").map_err(decode_fault)?;
    let ticket: String = row.try_get("ticket_id").map_err(decode_fault)?;
    let position: Option<i64> = row.try_get("waitlist_position").map_err(decode_fault)?;
    let method: Option<String> = row.try_get("check_in_method").map_err(decode_fault)?;
    Ok(Booking {
        id: BookingId::from_uuid(row.try_get("id").map_err(decode_fault)?),
        subject_id: SubjectId::from_uuid(row.try_get("subject_id").map_err(decode_fault)?),
        event_id: EventId::from_uuid(row.try_get("event_id").map_err(decode_fault)?),
        ticket_id: TicketId::parse(&ticket)
            .ok_or_else(|| StoreFault::Corrupted { detail: format!("bad ticket code {ticket}") })?,
        status: parse_booking_status(&status)?,
        is_waitlist: row.try_get("is_waitlist").map_err(decode_fault)?,
        waitlist_position: position
            .map(|p| {
                u32::try_from(p).map_err(|_| StoreFault::Corrupted {
                    detail: format!("bad waitlist position {p}"),
                })
            })
            .transpose()?,
        created_at: row.try_get("created_at").map_err(decode_fault)?,
        cancelled_at: row.try_get("cancelled_at").map_err(decode_fault)?,
        checked_in_at: row.try_get("checked_in_at").map_err(decode_fault)?,
        checked_in_by: row
            .try_get::<Option<Uuid>, _>("checked_in_by")
            .map_err(decode_fault)?
            .map(OperatorId::from_uuid),
        check_in_method: method.as_deref().map(parse_method).transpose()?,
    })
}

fn check_in_from_row(row: &PgRow) -> StoreResult<CheckInRecord> {
    let method: String = row.try_get("method").map_err(decode_fault)?;
    Ok(CheckInRecord {
        id: row.try_get("id").map_err(decode_fault)?,
        booking_id: BookingId::from_uuid(row.try_get("booking_id").map_err(decode_fault)?),
        event_id: EventId::from_uuid(row.try_get("event_id").map_err(decode_fault)?),
        subject_id: SubjectId::from_uuid(row.try_get("subject_id").map_err(decode_fault)?),
        checked_in_by: OperatorId::from_uuid(row.try_get("checked_in_by").map_err(decode_fault)?),
        method: parse_method(&method)?,
        checked_in_at: row.try_get("checked_in_at").map_err(decode_fault)?,
    })
}

fn notification_from_row(row: &PgRow) -> StoreResult<Notification> {
    let kind: String = row.try_get("kind").map_err(decode_fault)?;
    Ok(Notification {
        id: NotificationId::from_uuid(row.try_get("id").map_err(decode_fault)?),
        subject_id: SubjectId::from_uuid(row.try_get("subject_id").map_err(decode_fault)?),
        kind: parse_kind(&kind)?,
        booking_id: BookingId::from_uuid(row.try_get("booking_id").map_err(decode_fault)?),
        event_id: EventId::from_uuid(row.try_get("event_id").map_err(decode_fault)?),
        created_at: row.try_get("created_at").map_err(decode_fault)?,
    })
}

// ============================================================================
// Enum <-> column text
// ============================================================================

const fn event_status_str(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Draft => "draft",
        EventStatus::Published => "published",
        EventStatus::Cancelled => "cancelled",
        EventStatus::Completed => "completed",
    }
}

fn parse_event_status(s: &str) -> StoreResult<EventStatus> {
    match s {
        "draft" => Ok(EventStatus::Draft),
        "published" => Ok(EventStatus::Published),
        "cancelled" => Ok(EventStatus::Cancelled),
        "completed" => Ok(EventStatus::Completed),
        other => Err(StoreFault::Corrupted { detail: format!("bad event status {other}") }),
    }
}

const fn booking_status_str(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Confirmed => "confirmed",
        BookingStatus::Waitlist => "waitlist",
        BookingStatus::CheckedIn => "checked_in",
        BookingStatus::Cancelled => "cancelled",
        BookingStatus::Expired => "expired",
        BookingStatus::NoShow => "no_show",
    }
}

fn parse_booking_status(s: &str) -> StoreResult<BookingStatus> {
    match s {
        "confirmed" => Ok(BookingStatus::Confirmed),
        "waitlist" => Ok(BookingStatus::Waitlist),
        "checked_in" => Ok(BookingStatus::CheckedIn),
        "cancelled" => Ok(BookingStatus::Cancelled),
        "expired" => Ok(BookingStatus::Expired),
        "no_show" => Ok(BookingStatus::NoShow),
        other => Err(StoreFault::Corrupted { detail: format!("bad booking status {other}") }),
    }
}

const fn method_str(method: CheckInMethod) -> &'static str {
    match method {
        CheckInMethod::QrScan => "qr_scan",
        CheckInMethod::ManualEntry => "manual_entry",
        CheckInMethod::TicketId => "ticket_id",
        CheckInMethod::Auto => "auto",
    }
}

fn parse_method(s: &str) -> StoreResult<CheckInMethod> {
    match s {
        "qr_scan" => Ok(CheckInMethod::QrScan),
        "manual_entry" => Ok(CheckInMethod::ManualEntry),
        "ticket_id" => Ok(CheckInMethod::TicketId),
        "auto" => Ok(CheckInMethod::Auto),
        other => Err(StoreFault::Corrupted { detail: format!("bad check-in method {other}") }),
    }
}

const fn kind_str(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::WaitlistPromoted => "waitlist_promoted",
    }
}

fn parse_kind(s: &str) -> StoreResult<NotificationKind> {
    match s {
        "waitlist_promoted" => Ok(NotificationKind::WaitlistPromoted),
        other => Err(StoreFault::Corrupted { detail: format!("bad notification kind {other}") }),
    }
}
