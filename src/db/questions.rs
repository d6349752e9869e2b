//! Medical-question store: the `medical_questions` table.

use super::{decode_opt_time, decode_time, encode_time, now, Database, StoreError};
use crate::models::{AccountId, MedicalQuestion, QuestionId, QuestionStatus};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};

const QUESTION_COLUMNS: &str = "id, patient_id, patient_name, title, description, status, \
     assigned_to, assigned_to_name, answer, answered_at, created_at";

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalQuestion> {
    let status = QuestionStatus::parse(&row.get::<_, String>(5)?).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(5, String::from("Invalid status value"), Type::Text)
    })?;

    Ok(MedicalQuestion {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        patient_name: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        status,
        assigned_to: row.get(6)?,
        assigned_to_name: row.get(7)?,
        answer: row.get(8)?,
        answered_at: decode_opt_time(9, row.get(9)?)?,
        created_at: decode_time(10, row.get(10)?)?,
    })
}

fn find_question(conn: &Connection, id: QuestionId) -> rusqlite::Result<Option<MedicalQuestion>> {
    conn.query_row(
        &format!("SELECT {QUESTION_COLUMNS} FROM medical_questions WHERE id = ?1"),
        params![id],
        question_from_row,
    )
    .optional()
}

impl Database {
    /// Stores a new open question with a snapshot of the patient's name.
    pub fn insert_question(
        &self,
        patient_id: AccountId,
        patient_name: &str,
        title: &str,
        description: &str,
    ) -> Result<MedicalQuestion, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO medical_questions (patient_id, patient_name, title, description, status, created_at) VALUES (?1, ?2, ?3, ?4, 'open', ?5)",
            params![patient_id, patient_name, title, description, encode_time(now())?],
        )?;
        let id = conn.last_insert_rowid();
        find_question(&conn, id)?.ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn question(&self, id: QuestionId) -> Result<Option<MedicalQuestion>, StoreError> {
        Ok(find_question(&self.conn(), id)?)
    }

    /// A patient's own questions, newest first.
    pub fn questions_for_patient(
        &self,
        patient_id: AccountId,
    ) -> Result<Vec<MedicalQuestion>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {QUESTION_COLUMNS} FROM medical_questions WHERE patient_id = ?1 ORDER BY id DESC"
        ))?;
        let questions = stmt
            .query_map(params![patient_id], question_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(questions)
    }

    /// Open questions, newest first.
    pub fn open_questions(&self) -> Result<Vec<MedicalQuestion>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {QUESTION_COLUMNS} FROM medical_questions WHERE status = 'open' ORDER BY id DESC"
        ))?;
        let questions = stmt
            .query_map([], question_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(questions)
    }

    /// Answers a question that has not been answered yet.
    ///
    /// Status, assignee, answer and `answered_at` are written by the same
    /// statement.
    ///
    /// # Returns
    ///
    /// `Ok(false)` if the question is missing or already answered.
    pub fn answer_if_unanswered(
        &self,
        id: QuestionId,
        nurse_id: AccountId,
        nurse_name: &str,
        answer: &str,
    ) -> Result<bool, StoreError> {
        let changed = self.conn().execute(
            "UPDATE medical_questions SET status = 'answered', assigned_to = ?2, assigned_to_name = ?3, answer = ?4, answered_at = ?5 WHERE id = ?1 AND status <> 'answered'",
            params![id, nurse_id, nurse_name, answer, encode_time(now())?],
        )?;
        Ok(changed == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_is_answered_exactly_once() {
        let db = Database::open_in_memory().unwrap();
        let question = db
            .insert_question(1, "Mona", "Dosage", "How often should I take it?")
            .unwrap();
        assert_eq!(question.status, QuestionStatus::Open);
        assert!(question.answer.is_none());

        assert!(db
            .answer_if_unanswered(question.id, 2, "Nurse Sara", "Twice a day")
            .unwrap());
        assert!(!db
            .answer_if_unanswered(question.id, 3, "Nurse Ali", "Once a day")
            .unwrap());

        let stored = db.question(question.id).unwrap().unwrap();
        assert_eq!(stored.status, QuestionStatus::Answered);
        assert_eq!(stored.assigned_to, Some(2));
        assert_eq!(stored.assigned_to_name.as_deref(), Some("Nurse Sara"));
        assert_eq!(stored.answer.as_deref(), Some("Twice a day"));
        assert!(stored.answered_at.is_some());
    }

    #[test]
    fn listings_filter_and_order() {
        let db = Database::open_in_memory().unwrap();
        let first = db.insert_question(1, "Mona", "One", "First").unwrap();
        let second = db.insert_question(1, "Mona", "Two", "Second").unwrap();
        db.insert_question(5, "Omar", "Other", "Not mine").unwrap();
        db.answer_if_unanswered(first.id, 2, "Sara", "Done").unwrap();

        let mine = db.questions_for_patient(1).unwrap();
        assert_eq!(
            mine.iter().map(|q| q.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        let open = db.open_questions().unwrap();
        assert_eq!(open.len(), 2);
        assert!(open.iter().all(|q| q.status == QuestionStatus::Open));
    }
}
