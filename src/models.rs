//! Data models for homecare.
//!
//! Accounts share one shape and carry a role-tagged extension
//! ([`RoleDetails`]). Service requests and medical questions reference
//! accounts by id only.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

pub type AccountId = i64;
pub type RequestId = i64;
pub type QuestionId = i64;

/// Flat price of an emergency visit.
pub const EMERGENCY_COST: i64 = 300;
/// Flat price of a prescribed visit.
pub const PRESCRIBED_COST: i64 = 150;
/// Percentage of a paid visit credited to the assigned nurse.
pub const NURSE_SHARE_PERCENT: i64 = 80;

/// The role an account is registered with. Never changes after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Nurse,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Nurse => "nurse",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "patient" => Some(Role::Patient),
            "nurse" => Some(Role::Nurse),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Admins are active from the start; everyone else waits for an admin.
    pub fn starts_active(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point on the map, as reported by a client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Patient-only profile fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetails {
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub emergency_contact: Option<String>,
    pub blood_type: Option<String>,
    pub medical_conditions: Vec<String>,
    pub allergies: Vec<String>,
}

/// Nurse-only profile fields, including the earnings ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NurseDetails {
    pub license_id: Option<String>,
    pub specializations: Vec<String>,
    pub experience: Option<String>,
    pub availability_status: bool,
    pub location: Option<Coordinates>,
    /// Running balance, in whole currency units.
    pub balance: i64,
    /// Lifetime earnings, in whole currency units.
    pub total_earned: i64,
}

/// Role-tagged extension of an [`Account`]. Serialized as `userType` plus
/// the variant's fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "userType", rename_all = "lowercase")]
pub enum RoleDetails {
    Patient(PatientDetails),
    Nurse(NurseDetails),
    Admin,
}

impl RoleDetails {
    /// Empty extension for a freshly registered account of `role`.
    pub fn empty(role: Role) -> Self {
        match role {
            Role::Patient => RoleDetails::Patient(PatientDetails::default()),
            Role::Nurse => RoleDetails::Nurse(NurseDetails::default()),
            Role::Admin => RoleDetails::Admin,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            RoleDetails::Patient(_) => Role::Patient,
            RoleDetails::Nurse(_) => Role::Nurse,
            RoleDetails::Admin => Role::Admin,
        }
    }
}

/// A registered identity. The password hash is deliberately not part of
/// this struct; only the authentication path ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
    pub national_id: Option<String>,
    pub profile_complete: bool,
    pub profile_image: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub registration_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub activation_date: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub details: RoleDetails,
}

impl Account {
    pub fn role(&self) -> Role {
        self.details.role()
    }

    pub fn nurse(&self) -> Option<&NurseDetails> {
        match &self.details {
            RoleDetails::Nurse(nurse) => Some(nurse),
            _ => None,
        }
    }

    /// The public part of a nurse shown to the patient they were assigned to.
    pub fn contact_card(&self) -> ContactCard {
        ContactCard {
            id: self.id,
            name: self.name.clone(),
            phone: self.phone.clone(),
            profile_image: self.profile_image.clone(),
        }
    }

    /// Applies a self-service profile edit.
    ///
    /// Role-specific fields are only applied when they match the account's
    /// role; anything else is ignored, like unknown fields. The role itself,
    /// the activation flag and the nurse ledger are not reachable from here.
    ///
    /// # Errors
    ///
    /// Returns a message when a required field would become empty.
    pub fn apply(&mut self, update: ProfileUpdate) -> Result<(), &'static str> {
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err("Name is required");
            }
            self.name = name.trim().to_string();
        }
        if let Some(phone) = update.phone {
            if phone.trim().is_empty() {
                return Err("Phone number is required");
            }
            self.phone = phone.trim().to_string();
        }
        if update.address.is_some() {
            self.address = update.address;
        }
        if update.national_id.is_some() {
            self.national_id = update.national_id;
        }
        if update.profile_image.is_some() {
            self.profile_image = update.profile_image;
        }

        match &mut self.details {
            RoleDetails::Patient(patient) => {
                if update.date_of_birth.is_some() {
                    patient.date_of_birth = update.date_of_birth;
                }
                if update.gender.is_some() {
                    patient.gender = update.gender;
                }
                if update.emergency_contact.is_some() {
                    patient.emergency_contact = update.emergency_contact;
                }
                if update.blood_type.is_some() {
                    patient.blood_type = update.blood_type;
                }
                if let Some(conditions) = update.medical_conditions {
                    patient.medical_conditions = conditions;
                }
                if let Some(allergies) = update.allergies {
                    patient.allergies = allergies;
                }
            }
            RoleDetails::Nurse(nurse) => {
                if update.license_id.is_some() {
                    nurse.license_id = update.license_id;
                }
                if let Some(specializations) = update.specializations {
                    nurse.specializations = specializations;
                }
                if update.experience.is_some() {
                    nurse.experience = update.experience;
                }
            }
            RoleDetails::Admin => {}
        }
        Ok(())
    }
}

/// Partial profile edit accepted by the self-service profile endpoints.
///
/// There is no `userType`, `isActive`, `email` or balance field: such keys in
/// a request body are dropped during deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub national_id: Option<String>,
    pub profile_image: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub emergency_contact: Option<String>,
    pub blood_type: Option<String>,
    pub medical_conditions: Option<Vec<String>>,
    pub allergies: Option<Vec<String>>,
    pub license_id: Option<String>,
    pub specializations: Option<Vec<String>>,
    pub experience: Option<String>,
}

/// Name, phone and picture of an account, without anything private.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactCard {
    pub id: AccountId,
    pub name: String,
    pub phone: String,
    pub profile_image: Option<String>,
}

/// Everything needed to register a new account, minus the credential.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub role: Role,
    pub name: String,
    pub phone: String,
    pub national_id: Option<String>,
}

/// The kind of visit a patient asks for. Determines the flat price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Prescribed,
    Emergency,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Prescribed => "prescribed",
            ServiceType::Emergency => "emergency",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "prescribed" => Some(ServiceType::Prescribed),
            "emergency" => Some(ServiceType::Emergency),
            _ => None,
        }
    }

    pub fn cost(&self) -> i64 {
        match self {
            ServiceType::Prescribed => PRESCRIBED_COST,
            ServiceType::Emergency => EMERGENCY_COST,
        }
    }
}

/// Lifecycle status of a [`ServiceRequest`].
///
/// `Cancelled` is a valid stored value but no operation produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Assigned => "assigned",
            RequestStatus::InProgress => "in-progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RequestStatus::Pending),
            "assigned" => Some(RequestStatus::Assigned),
            "in-progress" => Some(RequestStatus::InProgress),
            "completed" => Some(RequestStatus::Completed),
            "cancelled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether the request still counts as the patient's current one.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            RequestStatus::Pending | RequestStatus::Assigned | RequestStatus::InProgress
        )
    }

    /// Whether the assigned nurse may mark the visit as done.
    pub fn is_completable(&self) -> bool {
        matches!(self, RequestStatus::Assigned | RequestStatus::InProgress)
    }
}

/// A patient's score for a completed visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rating {
    pub score: u8,
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// A patient-initiated nursing job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: RequestId,
    pub patient_id: AccountId,
    pub patient_name: String,
    pub patient_age: String,
    pub service_type: ServiceType,
    pub details: String,
    pub address: String,
    pub coordinates: Option<Coordinates>,
    pub status: RequestStatus,
    pub assigned_nurse: Option<AccountId>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub assigned_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    pub additional_services: Option<String>,
    pub broadcast_to_all_nurses: bool,
    pub cost: i64,
    pub is_paid: bool,
    pub payment_method: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub payment_date: Option<OffsetDateTime>,
    pub rating: Option<Rating>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Input for a new [`ServiceRequest`]. The cost is not part of it: it is
/// derived from `service_type` when the row is written.
#[derive(Debug, Clone)]
pub struct NewServiceRequest {
    pub patient_id: AccountId,
    pub patient_name: String,
    pub patient_age: String,
    pub service_type: ServiceType,
    pub details: String,
    pub address: String,
    pub coordinates: Option<Coordinates>,
    pub broadcast_to_all_nurses: bool,
}

/// Status of a [`MedicalQuestion`]. `Assigned` exists but answering moves a
/// question straight from open to answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Open,
    Assigned,
    Answered,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Open => "open",
            QuestionStatus::Assigned => "assigned",
            QuestionStatus::Answered => "answered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(QuestionStatus::Open),
            "assigned" => Some(QuestionStatus::Assigned),
            "answered" => Some(QuestionStatus::Answered),
            _ => None,
        }
    }
}

/// A question a patient asks the nursing staff.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalQuestion {
    pub id: QuestionId,
    pub patient_id: AccountId,
    pub patient_name: String,
    pub title: String,
    pub description: String,
    pub status: QuestionStatus,
    pub assigned_to: Option<AccountId>,
    pub assigned_to_name: Option<String>,
    pub answer: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub answered_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient() -> Account {
        Account {
            id: 7,
            email: "p@example.com".to_string(),
            name: "Mona".to_string(),
            phone: "01012345678".to_string(),
            address: None,
            national_id: None,
            profile_complete: false,
            profile_image: None,
            is_active: false,
            registration_date: OffsetDateTime::UNIX_EPOCH,
            activation_date: None,
            details: RoleDetails::empty(Role::Patient),
        }
    }

    #[test]
    fn cost_follows_service_type() {
        assert_eq!(ServiceType::Emergency.cost(), 300);
        assert_eq!(ServiceType::Prescribed.cost(), 150);
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(RequestStatus::InProgress.as_str(), "in-progress");
        assert_eq!(
            serde_json::to_value(RequestStatus::InProgress).unwrap(),
            "in-progress"
        );
        assert_eq!(
            RequestStatus::parse("in-progress"),
            Some(RequestStatus::InProgress)
        );
        assert!(RequestStatus::parse("done").is_none());
    }

    #[test]
    fn account_serializes_user_type_and_role_fields() {
        let value = serde_json::to_value(patient()).unwrap();
        assert_eq!(value["userType"], "patient");
        assert_eq!(value["medicalConditions"], serde_json::json!([]));
        assert!(value.get("password").is_none());
        assert!(value.get("passwordHash").is_none());
    }

    #[test]
    fn profile_update_ignores_user_type() {
        let update: ProfileUpdate = serde_json::from_value(serde_json::json!({
            "userType": "admin",
            "isActive": true,
            "name": "Mona Said",
            "licenseId": "NUR-1",
            "bloodType": "O+"
        }))
        .unwrap();

        let mut account = patient();
        account.apply(update).unwrap();

        assert_eq!(account.role(), Role::Patient);
        assert!(!account.is_active);
        assert_eq!(account.name, "Mona Said");
        match &account.details {
            RoleDetails::Patient(details) => {
                assert_eq!(details.blood_type.as_deref(), Some("O+"))
            }
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[test]
    fn profile_update_rejects_blank_phone() {
        let mut account = patient();
        let update = ProfileUpdate {
            phone: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(account.apply(update).is_err());
        assert_eq!(account.phone, "01012345678");
    }
}
