//! Read-only statistics for the admin dashboard.

use serde::Serialize;

use crate::db::{Database, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    pub total_requests: i64,
    pub completed_requests: i64,
    pub pending_requests: i64,
    /// Assigned and in-progress requests together.
    pub in_progress_requests: i64,
    /// Mean of the scores given so far, `0.0` when nothing was rated.
    pub average_rating: f64,
}

/// Aggregates every service request in one pass.
pub fn service_stats(db: &Database) -> Result<ServiceStats, StoreError> {
    let stats = db.conn().query_row(
        "SELECT COUNT(*), \
                COALESCE(SUM(status = 'completed'), 0), \
                COALESCE(SUM(status = 'pending'), 0), \
                COALESCE(SUM(status IN ('assigned', 'in-progress')), 0), \
                COALESCE(AVG(rating_score), 0.0) \
         FROM service_requests",
        [],
        |row| {
            Ok(ServiceStats {
                total_requests: row.get(0)?,
                completed_requests: row.get(1)?,
                pending_requests: row.get(2)?,
                in_progress_requests: row.get(3)?,
                average_rating: row.get(4)?,
            })
        },
    )?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::accounts::tests::new_account;
    use crate::db::requests::tests::new_request;
    use crate::models::{Role, ServiceType};

    #[test]
    fn empty_database_reports_zeroes() {
        let db = Database::open_in_memory().unwrap();
        let stats = service_stats(&db).unwrap();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.average_rating, 0.0);
    }

    #[test]
    fn counts_statuses_and_averages_ratings() {
        let db = Database::open_in_memory().unwrap();
        let patient = db
            .create_account(&new_account("p@example.com", Role::Patient), "hash")
            .unwrap();
        let nurse = db
            .create_account(&new_account("n@example.com", Role::Nurse), "hash")
            .unwrap();

        let ids: Vec<_> = (0..4)
            .map(|_| {
                db.insert_request(&new_request(patient.id, ServiceType::Prescribed))
                    .unwrap()
                    .id
            })
            .collect();
        for id in &ids[..3] {
            db.assign_if_pending(*id, nurse.id).unwrap();
        }
        for id in &ids[..2] {
            db.complete_if_assigned_to(*id, nurse.id, None).unwrap();
        }
        db.rate_if_completed(ids[0], 5, "").unwrap();
        db.rate_if_completed(ids[1], 2, "").unwrap();

        let stats = service_stats(&db).unwrap();
        assert_eq!(
            stats,
            ServiceStats {
                total_requests: 4,
                completed_requests: 2,
                pending_requests: 1,
                in_progress_requests: 1,
                average_rating: 3.5,
            }
        );
    }
}
