//! Medical questions: patients ask, any active nurse may answer once.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::models::{Account, MedicalQuestion, QuestionId, QuestionStatus};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionForm {
    pub title: Option<String>,
    pub description: Option<String>,
}

pub struct QuestionManager {
    db: Arc<Database>,
}

impl QuestionManager {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn ask(&self, patient: &Account, form: QuestionForm) -> ApiResult<MedicalQuestion> {
        let title = form.title.as_deref().map(str::trim).unwrap_or_default();
        let description = form.description.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() {
            return Err(ApiError::validation("Title is required"));
        }
        if description.is_empty() {
            return Err(ApiError::validation("Description is required"));
        }

        let question = self
            .db
            .insert_question(patient.id, &patient.name, title, description)?;
        info!(question_id = question.id, patient_id = patient.id, "Question asked");
        Ok(question)
    }

    /// Answers an open question on behalf of `nurse`.
    ///
    /// # Errors
    ///
    /// * [`ApiError::NotFound`] if the question doesn't exist.
    /// * [`ApiError::AlreadyAnswered`] if someone answered it first.
    pub fn answer(
        &self,
        nurse: &Account,
        id: QuestionId,
        answer: Option<String>,
    ) -> ApiResult<MedicalQuestion> {
        let answer = answer
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ApiError::validation("Answer is required"))?;

        let question = self
            .db
            .question(id)?
            .ok_or_else(|| ApiError::not_found("Question not found"))?;
        if question.status == QuestionStatus::Answered
            || !self
                .db
                .answer_if_unanswered(id, nurse.id, &nurse.name, &answer)?
        {
            return Err(ApiError::AlreadyAnswered);
        }
        info!(question_id = id, nurse_id = nurse.id, "Question answered");

        self.db
            .question(id)?
            .ok_or_else(|| ApiError::not_found("Question not found"))
    }

    pub fn for_patient(&self, patient: &Account) -> ApiResult<Vec<MedicalQuestion>> {
        Ok(self.db.questions_for_patient(patient.id)?)
    }

    pub fn open(&self) -> ApiResult<Vec<MedicalQuestion>> {
        Ok(self.db.open_questions()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::accounts::tests::new_account;
    use crate::models::Role;

    fn setup() -> (QuestionManager, Account, Account) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let patient = db
            .create_account(&new_account("p@example.com", Role::Patient), "hash")
            .unwrap();
        let nurse = db
            .create_account(&new_account("n@example.com", Role::Nurse), "hash")
            .unwrap();
        (QuestionManager::new(db), patient, nurse)
    }

    fn form() -> QuestionForm {
        QuestionForm {
            title: Some("Blood pressure".to_string()),
            description: Some("Is 140/90 too high?".to_string()),
        }
    }

    #[test]
    fn ask_snapshots_patient_name() {
        let (manager, patient, _) = setup();
        let question = manager.ask(&patient, form()).unwrap();
        assert_eq!(question.patient_name, patient.name);
        assert_eq!(question.status, QuestionStatus::Open);
        assert_eq!(manager.for_patient(&patient).unwrap().len(), 1);
        assert_eq!(manager.open().unwrap().len(), 1);
    }

    #[test]
    fn ask_requires_title() {
        let (manager, patient, _) = setup();
        let mut empty = form();
        empty.title = Some("  ".to_string());
        assert!(matches!(
            manager.ask(&patient, empty),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn second_answer_is_rejected() {
        let (manager, patient, nurse) = setup();
        let question = manager.ask(&patient, form()).unwrap();

        let answered = manager
            .answer(&nurse, question.id, Some("Yes, see a doctor".to_string()))
            .unwrap();
        assert_eq!(answered.status, QuestionStatus::Answered);
        assert_eq!(answered.assigned_to, Some(nurse.id));
        assert_eq!(answered.assigned_to_name.as_deref(), Some(nurse.name.as_str()));

        let err = manager
            .answer(&nurse, question.id, Some("Changed answer".to_string()))
            .unwrap_err();
        assert!(matches!(err, ApiError::AlreadyAnswered));
        assert!(manager.open().unwrap().is_empty());
        assert!(matches!(
            manager.answer(&nurse, 999, Some("?".to_string())),
            Err(ApiError::NotFound(_))
        ));
    }
}
