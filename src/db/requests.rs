//! Service-request store: the `service_requests` table.
//!
//! Every transition is a conditional update on the expected state. The
//! `bool` these methods return is whether this caller won; the lifecycle
//! manager turns `false` into the right domain error.

use super::{decode_opt_time, decode_time, encode_time, now, Database, StoreError};
use crate::models::{
    AccountId, Coordinates, NewServiceRequest, Rating, RequestId, RequestStatus, ServiceRequest,
    ServiceType, NURSE_SHARE_PERCENT,
};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row, ToSql};
use tracing::debug;

const REQUEST_COLUMNS: &str = "id, patient_id, patient_name, patient_age, service_type, \
     details, address, latitude, longitude, status, assigned_nurse, assigned_at, completed_at, \
     additional_services, broadcast_to_all_nurses, cost, is_paid, payment_method, payment_date, \
     rating_score, rating_comment, rating_date, created_at";

fn invalid_text(index: usize, what: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(index, format!("Invalid {what} value"), Type::Text)
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<ServiceRequest> {
    let service_type = ServiceType::parse(&row.get::<_, String>(4)?)
        .ok_or_else(|| invalid_text(4, "service type"))?;
    let status = RequestStatus::parse(&row.get::<_, String>(9)?)
        .ok_or_else(|| invalid_text(9, "status"))?;

    let latitude: Option<f64> = row.get(7)?;
    let longitude: Option<f64> = row.get(8)?;
    let coordinates = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates {
            latitude,
            longitude,
        }),
        _ => None,
    };

    let score: Option<u8> = row.get(19)?;
    let comment: Option<String> = row.get(20)?;
    let rated_at = decode_opt_time(21, row.get(21)?)?;
    let rating = match (score, rated_at) {
        (Some(score), Some(date)) => Some(Rating {
            score,
            comment: comment.unwrap_or_default(),
            date,
        }),
        _ => None,
    };

    Ok(ServiceRequest {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        patient_name: row.get(2)?,
        patient_age: row.get(3)?,
        service_type,
        details: row.get(5)?,
        address: row.get(6)?,
        coordinates,
        status,
        assigned_nurse: row.get(10)?,
        assigned_at: decode_opt_time(11, row.get(11)?)?,
        completed_at: decode_opt_time(12, row.get(12)?)?,
        additional_services: row.get(13)?,
        broadcast_to_all_nurses: row.get(14)?,
        cost: row.get(15)?,
        is_paid: row.get(16)?,
        payment_method: row.get(17)?,
        payment_date: decode_opt_time(18, row.get(18)?)?,
        rating,
        created_at: decode_time(22, row.get(22)?)?,
    })
}

fn find_request(conn: &Connection, id: RequestId) -> rusqlite::Result<Option<ServiceRequest>> {
    conn.query_row(
        &format!("SELECT {REQUEST_COLUMNS} FROM service_requests WHERE id = ?1"),
        params![id],
        request_from_row,
    )
    .optional()
}

fn collect_requests(
    conn: &Connection,
    filter: &str,
    args: &[&dyn ToSql],
) -> rusqlite::Result<Vec<ServiceRequest>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REQUEST_COLUMNS} FROM service_requests {filter} ORDER BY id DESC"
    ))?;
    let requests = stmt
        .query_map(args, request_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(requests)
}

impl Database {
    /// Inserts a new pending request.
    ///
    /// The cost is taken from the service type here and never written again.
    pub fn insert_request(&self, new: &NewServiceRequest) -> Result<ServiceRequest, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO service_requests (patient_id, patient_name, patient_age, service_type, details, address, latitude, longitude, status, broadcast_to_all_nurses, cost, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                new.patient_id,
                new.patient_name,
                new.patient_age,
                new.service_type.as_str(),
                new.details,
                new.address,
                new.coordinates.map(|c| c.latitude),
                new.coordinates.map(|c| c.longitude),
                RequestStatus::Pending.as_str(),
                new.broadcast_to_all_nurses,
                new.service_type.cost(),
                encode_time(now())?,
            ],
        )?;
        let id = conn.last_insert_rowid();
        find_request(&conn, id)?.ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn request(&self, id: RequestId) -> Result<Option<ServiceRequest>, StoreError> {
        Ok(find_request(&self.conn(), id)?)
    }

    /// The patient's most recent request that is still pending, assigned or
    /// in progress.
    pub fn current_request(
        &self,
        patient_id: AccountId,
    ) -> Result<Option<ServiceRequest>, StoreError> {
        let request = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {REQUEST_COLUMNS} FROM service_requests WHERE patient_id = ?1 AND status IN ('pending', 'assigned', 'in-progress') ORDER BY id DESC LIMIT 1"
                ),
                params![patient_id],
                request_from_row,
            )
            .optional()?;
        Ok(request)
    }

    /// Every request a patient has made, newest first.
    pub fn requests_for_patient(
        &self,
        patient_id: AccountId,
    ) -> Result<Vec<ServiceRequest>, StoreError> {
        Ok(collect_requests(
            &self.conn(),
            "WHERE patient_id = ?1",
            &[&patient_id],
        )?)
    }

    /// Every request assigned to a nurse, newest first.
    pub fn requests_for_nurse(
        &self,
        nurse_id: AccountId,
    ) -> Result<Vec<ServiceRequest>, StoreError> {
        Ok(collect_requests(
            &self.conn(),
            "WHERE assigned_nurse = ?1",
            &[&nurse_id],
        )?)
    }

    /// Pending requests that were broadcast to every nurse, newest first.
    pub fn broadcast_board(&self) -> Result<Vec<ServiceRequest>, StoreError> {
        Ok(collect_requests(
            &self.conn(),
            "WHERE status = 'pending' AND broadcast_to_all_nurses = 1",
            &[],
        )?)
    }

    pub fn all_requests(&self) -> Result<Vec<ServiceRequest>, StoreError> {
        Ok(collect_requests(&self.conn(), "", &[])?)
    }

    /// Assigns `nurse_id` to a request that is still pending.
    ///
    /// # Returns
    ///
    /// `Ok(false)` if the request is missing or no longer pending; the row is
    /// left untouched in that case.
    pub fn assign_if_pending(
        &self,
        id: RequestId,
        nurse_id: AccountId,
    ) -> Result<bool, StoreError> {
        let changed = self.conn().execute(
            "UPDATE service_requests SET status = 'assigned', assigned_nurse = ?2, assigned_at = ?3 WHERE id = ?1 AND status = 'pending'",
            params![id, nurse_id, encode_time(now())?],
        )?;
        Ok(changed == 1)
    }

    /// Marks a request completed, provided `nurse_id` is its assigned nurse
    /// and it is assigned or in progress.
    pub fn complete_if_assigned_to(
        &self,
        id: RequestId,
        nurse_id: AccountId,
        additional_services: Option<&str>,
    ) -> Result<bool, StoreError> {
        let changed = self.conn().execute(
            "UPDATE service_requests SET status = 'completed', completed_at = ?3, additional_services = COALESCE(?4, additional_services) WHERE id = ?1 AND assigned_nurse = ?2 AND status IN ('assigned', 'in-progress')",
            params![id, nurse_id, encode_time(now())?, additional_services],
        )?;
        Ok(changed == 1)
    }

    /// Records payment of a request and credits the assigned nurse.
    ///
    /// The paid flag flip and the nurse credit commit together. A request
    /// without a nurse is still marked paid; nobody is credited.
    ///
    /// # Returns
    ///
    /// `Ok(false)` if the request is missing or already paid. Nothing is
    /// written in that case.
    pub fn record_payment(&self, id: RequestId, method: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let changed = tx.execute(
            "UPDATE service_requests SET is_paid = 1, payment_method = ?2, payment_date = ?3 WHERE id = ?1 AND is_paid = 0",
            params![id, method, encode_time(now())?],
        )?;
        if changed == 0 {
            return Ok(false);
        }

        let (cost, nurse): (i64, Option<AccountId>) = tx.query_row(
            "SELECT cost, assigned_nurse FROM service_requests WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        if let Some(nurse_id) = nurse {
            let share = cost * NURSE_SHARE_PERCENT / 100;
            let credited = tx.execute(
                "UPDATE accounts SET balance = balance + ?2, total_earned = total_earned + ?2 WHERE id = ?1 AND role = 'nurse'",
                params![nurse_id, share],
            )?;
            debug!(request_id = id, nurse_id, share, credited, "Credited nurse");
        }

        tx.commit()?;
        Ok(true)
    }

    /// Stores a rating on a completed, not yet rated request.
    pub fn rate_if_completed(
        &self,
        id: RequestId,
        score: u8,
        comment: &str,
    ) -> Result<bool, StoreError> {
        let changed = self.conn().execute(
            "UPDATE service_requests SET rating_score = ?2, rating_comment = ?3, rating_date = ?4 WHERE id = ?1 AND status = 'completed' AND rating_score IS NULL",
            params![id, score, comment, encode_time(now())?],
        )?;
        Ok(changed == 1)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::accounts::tests::new_account;
    use crate::models::Role;

    pub(crate) fn new_request(patient_id: AccountId, service_type: ServiceType) -> NewServiceRequest {
        NewServiceRequest {
            patient_id,
            patient_name: "Mona".to_string(),
            patient_age: "67".to_string(),
            service_type,
            details: "Change dressing".to_string(),
            address: "12 Nile St".to_string(),
            coordinates: None,
            broadcast_to_all_nurses: false,
        }
    }

    fn setup() -> (Database, AccountId, AccountId, AccountId) {
        let db = Database::open_in_memory().unwrap();
        let patient = db
            .create_account(&new_account("p@example.com", Role::Patient), "hash")
            .unwrap();
        let a = db
            .create_account(&new_account("a@example.com", Role::Nurse), "hash")
            .unwrap();
        let b = db
            .create_account(&new_account("b@example.com", Role::Nurse), "hash")
            .unwrap();
        (db, patient.id, a.id, b.id)
    }

    #[test]
    fn new_requests_are_pending_and_priced() {
        let (db, patient, _, _) = setup();
        let emergency = db
            .insert_request(&new_request(patient, ServiceType::Emergency))
            .unwrap();
        let prescribed = db
            .insert_request(&new_request(patient, ServiceType::Prescribed))
            .unwrap();

        assert_eq!(emergency.status, RequestStatus::Pending);
        assert_eq!(emergency.cost, 300);
        assert_eq!(prescribed.cost, 150);
        assert!(!emergency.is_paid);
        assert!(emergency.rating.is_none());
    }

    #[test]
    fn only_one_nurse_is_assigned() {
        let (db, patient, a, b) = setup();
        let request = db
            .insert_request(&new_request(patient, ServiceType::Emergency))
            .unwrap();

        assert!(db.assign_if_pending(request.id, a).unwrap());
        assert!(!db.assign_if_pending(request.id, b).unwrap());

        let stored = db.request(request.id).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Assigned);
        assert_eq!(stored.assigned_nurse, Some(a));
        assert!(stored.assigned_at.is_some());
    }

    #[test]
    fn only_the_assigned_nurse_completes() {
        let (db, patient, a, b) = setup();
        let request = db
            .insert_request(&new_request(patient, ServiceType::Prescribed))
            .unwrap();
        assert!(!db.complete_if_assigned_to(request.id, a, None).unwrap());

        db.assign_if_pending(request.id, a).unwrap();
        assert!(!db.complete_if_assigned_to(request.id, b, None).unwrap());
        assert!(db
            .complete_if_assigned_to(request.id, a, Some("Blood pressure check"))
            .unwrap());

        let stored = db.request(request.id).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Completed);
        assert_eq!(
            stored.additional_services.as_deref(),
            Some("Blood pressure check")
        );
        assert!(!db.complete_if_assigned_to(request.id, a, None).unwrap());
    }

    #[test]
    fn payment_credits_nurse_once() {
        let (db, patient, a, _) = setup();
        let request = db
            .insert_request(&new_request(patient, ServiceType::Emergency))
            .unwrap();
        db.assign_if_pending(request.id, a).unwrap();

        assert!(db.record_payment(request.id, "cash").unwrap());
        assert!(!db.record_payment(request.id, "card").unwrap());

        let nurse = db.account(a).unwrap().unwrap();
        let ledger = nurse.nurse().unwrap();
        assert_eq!(ledger.balance, 240);
        assert_eq!(ledger.total_earned, 240);

        let stored = db.request(request.id).unwrap().unwrap();
        assert!(stored.is_paid);
        assert_eq!(stored.payment_method.as_deref(), Some("cash"));
        assert_eq!(stored.cost, 300);
    }

    #[test]
    fn payment_without_nurse_credits_nobody() {
        let (db, patient, a, _) = setup();
        let request = db
            .insert_request(&new_request(patient, ServiceType::Prescribed))
            .unwrap();
        assert!(db.record_payment(request.id, "cash").unwrap());
        assert_eq!(db.account(a).unwrap().unwrap().nurse().unwrap().balance, 0);
        assert!(!db.record_payment(9999, "cash").unwrap());
    }

    #[test]
    fn rating_requires_completion_and_happens_once() {
        let (db, patient, a, _) = setup();
        let request = db
            .insert_request(&new_request(patient, ServiceType::Prescribed))
            .unwrap();
        assert!(!db.rate_if_completed(request.id, 5, "great").unwrap());

        db.assign_if_pending(request.id, a).unwrap();
        db.complete_if_assigned_to(request.id, a, None).unwrap();
        assert!(db.rate_if_completed(request.id, 4, "kind").unwrap());
        assert!(!db.rate_if_completed(request.id, 1, "changed my mind").unwrap());

        let rating = db.request(request.id).unwrap().unwrap().rating.unwrap();
        assert_eq!(rating.score, 4);
        assert_eq!(rating.comment, "kind");
    }

    #[test]
    fn current_request_is_latest_open_one() {
        let (db, patient, a, _) = setup();
        assert!(db.current_request(patient).unwrap().is_none());

        let first = db
            .insert_request(&new_request(patient, ServiceType::Prescribed))
            .unwrap();
        let second = db
            .insert_request(&new_request(patient, ServiceType::Emergency))
            .unwrap();
        assert_eq!(db.current_request(patient).unwrap().unwrap().id, second.id);

        db.assign_if_pending(second.id, a).unwrap();
        db.complete_if_assigned_to(second.id, a, None).unwrap();
        assert_eq!(db.current_request(patient).unwrap().unwrap().id, first.id);

        let history = db.requests_for_patient(patient).unwrap();
        assert_eq!(
            history.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        assert_eq!(db.requests_for_nurse(a).unwrap().len(), 1);
    }

    #[test]
    fn broadcast_board_lists_pending_broadcasts() {
        let (db, patient, a, _) = setup();
        let mut broadcast = new_request(patient, ServiceType::Emergency);
        broadcast.broadcast_to_all_nurses = true;
        let open = db.insert_request(&broadcast).unwrap();
        let taken = db.insert_request(&broadcast).unwrap();
        db.insert_request(&new_request(patient, ServiceType::Prescribed))
            .unwrap();
        db.assign_if_pending(taken.id, a).unwrap();

        let board = db.broadcast_board().unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].id, open.id);
        assert_eq!(db.all_requests().unwrap().len(), 3);
    }
}
