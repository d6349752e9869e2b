//! Service-request lifecycle.
//!
//! ```text
//! pending --accept--> assigned --complete--> completed --rate--> (rated)
//!            in-progress --complete--^
//! ```
//!
//! Payment is independent of the status and can be recorded once. Every
//! transition is decided by a conditional write in the store, so the checks
//! made here only pick the error message; they never grant a transition on
//! their own.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Account, AccountId, ContactCard, Coordinates, NewServiceRequest, Rating, RequestId,
    RequestStatus, ServiceRequest, ServiceType,
};
use crate::notify::{Notification, Notifier};

/// Patient age as sent by a client: the web form sends a string, other
/// clients send a number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PatientAge {
    Years(u32),
    Text(String),
}

impl PatientAge {
    fn into_text(self) -> String {
        match self {
            PatientAge::Years(years) => years.to_string(),
            PatientAge::Text(text) => text.trim().to_string(),
        }
    }
}

/// Body of `POST /patient/request-service`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequestForm {
    pub patient_name: Option<String>,
    pub patient_age: Option<PatientAge>,
    pub service_type: Option<String>,
    pub details: Option<String>,
    pub address: Option<String>,
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub broadcast_to_all_nurses: bool,
}

/// A patient's open request together with the assigned nurse's contact card.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentRequest {
    pub request: ServiceRequest,
    pub nurse: Option<ContactCard>,
}

fn required(value: Option<String>, message: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(message))
}

pub struct RequestManager {
    db: Arc<Database>,
    notifier: Notifier,
}

impl RequestManager {
    pub fn new(db: Arc<Database>, notifier: Notifier) -> Self {
        Self { db, notifier }
    }

    fn load(&self, id: RequestId) -> ApiResult<ServiceRequest> {
        self.db
            .request(id)?
            .ok_or_else(|| ApiError::not_found("Service request not found"))
    }

    /// Looks up the request's patient and emails them. A missing patient
    /// only skips the email.
    fn notify_patient(&self, patient_id: AccountId, build: impl FnOnce(String) -> Notification) {
        match self.db.account(patient_id) {
            Ok(Some(patient)) => self.notifier.notify(&patient.email, build(patient.name)),
            Ok(None) => warn!(patient_id, "Patient missing, notification skipped"),
            Err(e) => warn!(patient_id, error = %e, "Patient lookup failed, notification skipped"),
        }
    }

    /// Creates a pending request for `patient`.
    ///
    /// The patient name defaults to the account name. The cost is fixed by
    /// the service type.
    pub fn create(&self, patient: &Account, form: ServiceRequestForm) -> ApiResult<ServiceRequest> {
        let service_type = form
            .service_type
            .as_deref()
            .ok_or_else(|| ApiError::validation("Service type is required"))
            .and_then(|value| {
                ServiceType::parse(value.trim()).ok_or_else(|| {
                    ApiError::validation("Service type must be prescribed or emergency")
                })
            })?;

        let new = NewServiceRequest {
            patient_id: patient.id,
            patient_name: required(form.patient_name, "Patient name is required")
                .unwrap_or_else(|_| patient.name.clone()),
            patient_age: required(
                form.patient_age.map(PatientAge::into_text),
                "Patient age is required",
            )?,
            service_type,
            details: required(form.details, "Details are required")?,
            address: required(form.address, "Address is required")?,
            coordinates: form.coordinates,
            broadcast_to_all_nurses: form.broadcast_to_all_nurses,
        };

        let request = self.db.insert_request(&new)?;
        info!(
            request_id = request.id,
            patient_id = patient.id,
            service_type = service_type.as_str(),
            cost = request.cost,
            "Service request created"
        );

        self.notifier.notify(
            &patient.email,
            Notification::RequestConfirmed {
                name: patient.name.clone(),
                request: request.clone(),
            },
        );

        if request.broadcast_to_all_nurses {
            match self.db.count_available_nurses() {
                Ok(count) => info!(request_id = request.id, count, "Broadcasting to available nurses"),
                Err(e) => warn!(request_id = request.id, error = %e, "Could not count available nurses"),
            }
        }

        Ok(request)
    }

    /// Assigns `nurse` to a pending request.
    ///
    /// # Errors
    ///
    /// * [`ApiError::NotFound`] if the request doesn't exist.
    /// * [`ApiError::InvalidTransition`] if it is no longer pending, which
    ///   includes losing a race against another nurse.
    pub fn accept(
        &self,
        nurse: &Account,
        id: RequestId,
        location: Option<Coordinates>,
    ) -> ApiResult<ServiceRequest> {
        self.load(id)?;
        if !self.db.assign_if_pending(id, nurse.id)? {
            info!(request_id = id, nurse_id = nurse.id, "Accept refused, request taken");
            return Err(ApiError::invalid_transition(
                "This request is no longer available",
            ));
        }
        info!(request_id = id, nurse_id = nurse.id, "Request accepted");

        if let Some(location) = location {
            self.db.set_location(nurse.id, location)?;
        }

        let request = self.load(id)?;
        self.notify_patient(request.patient_id, |name| Notification::NurseAssigned {
            name,
            nurse_name: nurse.name.clone(),
            nurse_phone: nurse.phone.clone(),
        });
        Ok(request)
    }

    /// Marks a request completed by its assigned nurse.
    ///
    /// # Errors
    ///
    /// * [`ApiError::Forbidden`] if `nurse` is not the assigned nurse.
    /// * [`ApiError::InvalidTransition`] unless the request is assigned or
    ///   in progress.
    pub fn complete(
        &self,
        nurse: &Account,
        id: RequestId,
        additional_services: Option<String>,
    ) -> ApiResult<ServiceRequest> {
        let request = self.load(id)?;
        if request.assigned_nurse != Some(nurse.id) {
            return Err(ApiError::forbidden("You are not assigned to this request"));
        }

        let additional_services = additional_services
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if !self
            .db
            .complete_if_assigned_to(id, nurse.id, additional_services.as_deref())?
        {
            return Err(ApiError::invalid_transition(
                "This request cannot be completed",
            ));
        }
        info!(request_id = id, nurse_id = nurse.id, "Service completed");

        let request = self.load(id)?;
        let completed = request.clone();
        self.notify_patient(request.patient_id, move |name| {
            Notification::ServiceCompleted {
                name,
                request: completed,
            }
        });
        Ok(request)
    }

    /// Records payment by the owning patient and credits the nurse's share.
    ///
    /// # Errors
    ///
    /// * [`ApiError::Forbidden`] if `patient` doesn't own the request.
    /// * [`ApiError::AlreadyPaid`] if payment was already recorded.
    pub fn pay(&self, patient: &Account, id: RequestId, method: &str) -> ApiResult<ServiceRequest> {
        let request = self.load(id)?;
        if request.patient_id != patient.id {
            return Err(ApiError::forbidden(
                "You are not authorized to pay for this request",
            ));
        }
        if request.is_paid || !self.db.record_payment(id, method)? {
            return Err(ApiError::AlreadyPaid);
        }
        info!(
            request_id = id,
            patient_id = patient.id,
            method,
            cost = request.cost,
            "Payment recorded"
        );
        self.load(id)
    }

    /// Stores the owning patient's rating of a completed request.
    ///
    /// # Errors
    ///
    /// * [`ApiError::Validation`] if `score` is outside 1..=5.
    /// * [`ApiError::Forbidden`] if `patient` doesn't own the request.
    /// * [`ApiError::InvalidTransition`] if the request isn't completed or
    ///   was already rated.
    pub fn rate(
        &self,
        patient: &Account,
        id: RequestId,
        score: i64,
        comment: Option<String>,
    ) -> ApiResult<Rating> {
        let score = u8::try_from(score)
            .ok()
            .filter(|s| (1..=5).contains(s))
            .ok_or_else(|| ApiError::validation("Rating must be between 1 and 5"))?;

        let request = self.load(id)?;
        if request.patient_id != patient.id {
            return Err(ApiError::forbidden(
                "You are not authorized to rate this request",
            ));
        }
        if request.status != RequestStatus::Completed {
            return Err(ApiError::invalid_transition(
                "You can only rate completed requests",
            ));
        }

        let comment = comment.unwrap_or_default();
        if request.rating.is_some() || !self.db.rate_if_completed(id, score, comment.trim())? {
            return Err(ApiError::invalid_transition(
                "This request has already been rated",
            ));
        }
        info!(request_id = id, score, "Request rated");

        self.load(id)?
            .rating
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("rating {id} vanished after write")))
    }

    /// The patient's latest open request, with the nurse's contact card once
    /// one is assigned.
    pub fn current_for_patient(&self, patient: &Account) -> ApiResult<Option<CurrentRequest>> {
        let Some(request) = self.db.current_request(patient.id)? else {
            return Ok(None);
        };
        let nurse = match request.assigned_nurse {
            Some(nurse_id) => self.db.account(nurse_id)?.map(|n| n.contact_card()),
            None => None,
        };
        Ok(Some(CurrentRequest { request, nurse }))
    }

    pub fn history_for_patient(&self, patient: &Account) -> ApiResult<Vec<ServiceRequest>> {
        Ok(self.db.requests_for_patient(patient.id)?)
    }

    pub fn history_for_nurse(&self, nurse: &Account) -> ApiResult<Vec<ServiceRequest>> {
        Ok(self.db.requests_for_nurse(nurse.id)?)
    }

    /// Pending requests broadcast to every nurse.
    pub fn broadcast_board(&self) -> ApiResult<Vec<ServiceRequest>> {
        Ok(self.db.broadcast_board()?)
    }

    pub fn all(&self) -> ApiResult<Vec<ServiceRequest>> {
        Ok(self.db.all_requests()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::accounts::tests::new_account;
    use crate::models::Role;
    use crate::notify::{Email, Mailer};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<Email>>);

    impl Mailer for Recording {
        fn send(&self, email: &Email) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    struct Fixture {
        manager: RequestManager,
        db: Arc<Database>,
        mailer: Arc<Recording>,
        patient: Account,
        nurse: Account,
        other_nurse: Account,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mailer = Arc::new(Recording::default());
        let notifier = Notifier::new(mailer.clone(), "no-reply@homecare.local");
        let patient = db
            .create_account(&new_account("p@example.com", Role::Patient), "hash")
            .unwrap();
        let nurse = db
            .create_account(&new_account("n@example.com", Role::Nurse), "hash")
            .unwrap();
        let other_nurse = db
            .create_account(&new_account("o@example.com", Role::Nurse), "hash")
            .unwrap();
        Fixture {
            manager: RequestManager::new(Arc::clone(&db), notifier),
            db,
            mailer,
            patient,
            nurse,
            other_nurse,
        }
    }

    fn form(service_type: &str) -> ServiceRequestForm {
        ServiceRequestForm {
            patient_name: None,
            patient_age: Some(PatientAge::Years(70)),
            service_type: Some(service_type.to_string()),
            details: Some("Insulin injection".to_string()),
            address: Some("5 Tahrir Sq".to_string()),
            coordinates: None,
            broadcast_to_all_nurses: true,
        }
    }

    #[test]
    fn create_prices_and_confirms() {
        let f = fixture();
        let request = f.manager.create(&f.patient, form("emergency")).unwrap();
        assert_eq!(request.cost, 300);
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.patient_name, f.patient.name);
        assert_eq!(request.patient_age, "70");

        let sent = f.mailer.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Service Request Confirmation");
    }

    #[test]
    fn create_rejects_unknown_service_type() {
        let f = fixture();
        let err = f.manager.create(&f.patient, form("surgery")).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(f.manager.all().unwrap().is_empty());
    }

    #[test]
    fn accept_twice_keeps_first_nurse() {
        let f = fixture();
        let request = f.manager.create(&f.patient, form("prescribed")).unwrap();
        f.manager.accept(&f.nurse, request.id, None).unwrap();

        let err = f
            .manager
            .accept(&f.other_nurse, request.id, None)
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidTransition(_)));

        let stored = f.db.request(request.id).unwrap().unwrap();
        assert_eq!(stored.assigned_nurse, Some(f.nurse.id));
    }

    #[test]
    fn accept_records_nurse_location() {
        let f = fixture();
        let request = f.manager.create(&f.patient, form("prescribed")).unwrap();
        let here = Coordinates {
            latitude: 31.2,
            longitude: 29.9,
        };
        f.manager.accept(&f.nurse, request.id, Some(here)).unwrap();
        let nurse = f.db.account(f.nurse.id).unwrap().unwrap();
        assert_eq!(nurse.nurse().unwrap().location, Some(here));
    }

    #[test]
    fn complete_by_other_nurse_is_forbidden() {
        let f = fixture();
        let request = f.manager.create(&f.patient, form("prescribed")).unwrap();
        f.manager.accept(&f.nurse, request.id, None).unwrap();

        let err = f
            .manager
            .complete(&f.other_nurse, request.id, None)
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let done = f
            .manager
            .complete(&f.nurse, request.id, Some("Wound check".to_string()))
            .unwrap();
        assert_eq!(done.status, RequestStatus::Completed);
        assert!(matches!(
            f.manager.complete(&f.nurse, request.id, None),
            Err(ApiError::InvalidTransition(_))
        ));
    }

    #[test]
    fn pay_once_and_only_by_owner() {
        let f = fixture();
        let request = f.manager.create(&f.patient, form("emergency")).unwrap();
        f.manager.accept(&f.nurse, request.id, None).unwrap();

        assert!(matches!(
            f.manager.pay(&f.nurse, request.id, "cash"),
            Err(ApiError::Forbidden(_))
        ));
        let paid = f.manager.pay(&f.patient, request.id, "cash").unwrap();
        assert!(paid.is_paid);
        assert!(matches!(
            f.manager.pay(&f.patient, request.id, "cash"),
            Err(ApiError::AlreadyPaid)
        ));

        let nurse = f.db.account(f.nurse.id).unwrap().unwrap();
        assert_eq!(nurse.nurse().unwrap().balance, 240);
    }

    #[test]
    fn rating_rules() {
        let f = fixture();
        let request = f.manager.create(&f.patient, form("prescribed")).unwrap();
        assert!(matches!(
            f.manager.rate(&f.patient, request.id, 5, None),
            Err(ApiError::InvalidTransition(_))
        ));

        f.manager.accept(&f.nurse, request.id, None).unwrap();
        f.manager.complete(&f.nurse, request.id, None).unwrap();
        for score in [0, 6, -1, 300] {
            assert!(matches!(
                f.manager.rate(&f.patient, request.id, score, None),
                Err(ApiError::Validation(_))
            ));
        }
        assert!(f.db.request(request.id).unwrap().unwrap().rating.is_none());

        let rating = f
            .manager
            .rate(&f.patient, request.id, 5, Some("Very kind".to_string()))
            .unwrap();
        assert_eq!(rating.score, 5);
        assert!(matches!(
            f.manager.rate(&f.patient, request.id, 1, None),
            Err(ApiError::InvalidTransition(_))
        ));
    }

    #[test]
    fn current_request_includes_contact_card() {
        let f = fixture();
        assert!(f.manager.current_for_patient(&f.patient).unwrap().is_none());

        let request = f.manager.create(&f.patient, form("prescribed")).unwrap();
        let current = f.manager.current_for_patient(&f.patient).unwrap().unwrap();
        assert!(current.nurse.is_none());

        f.manager.accept(&f.nurse, request.id, None).unwrap();
        let current = f.manager.current_for_patient(&f.patient).unwrap().unwrap();
        assert_eq!(current.nurse, Some(f.nurse.contact_card()));
        let json = serde_json::to_value(&current).unwrap();
        assert!(json["nurse"].get("email").is_none());
    }
}
