//! Identity store: the `accounts` table.
//!
//! Patients, nurses and admins share one table. The `role` column picks
//! which group of extension columns is meaningful and a trigger in the
//! schema refuses to change it once written.

use super::{
    decode_list, decode_opt_time, decode_time, encode_list, encode_time, now, Database, StoreError,
};
use crate::models::{
    Account, AccountId, Coordinates, NewAccount, NurseDetails, PatientDetails, Role, RoleDetails,
};
use rusqlite::{ffi, params, types::Type, Connection, OptionalExtension, Row};

const ACCOUNT_COLUMNS: &str = "id, email, role, name, phone, address, national_id, \
     profile_complete, profile_image, is_active, registration_date, activation_date, \
     date_of_birth, gender, emergency_contact, blood_type, medical_conditions, allergies, \
     license_id, specializations, experience, availability_status, latitude, longitude, \
     balance, total_earned";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    let role = match Role::parse(&row.get::<_, String>(2)?) {
        Some(role) => role,
        None => {
            return Err(rusqlite::Error::InvalidColumnType(
                2,
                String::from("Invalid role value"),
                Type::Text,
            ))
        }
    };

    let details = match role {
        Role::Patient => RoleDetails::Patient(PatientDetails {
            date_of_birth: row.get(12)?,
            gender: row.get(13)?,
            emergency_contact: row.get(14)?,
            blood_type: row.get(15)?,
            medical_conditions: decode_list(16, row.get(16)?)?,
            allergies: decode_list(17, row.get(17)?)?,
        }),
        Role::Nurse => {
            let latitude: Option<f64> = row.get(22)?;
            let longitude: Option<f64> = row.get(23)?;
            RoleDetails::Nurse(NurseDetails {
                license_id: row.get(18)?,
                specializations: decode_list(19, row.get(19)?)?,
                experience: row.get(20)?,
                availability_status: row.get(21)?,
                location: match (latitude, longitude) {
                    (Some(latitude), Some(longitude)) => Some(Coordinates {
                        latitude,
                        longitude,
                    }),
                    _ => None,
                },
                balance: row.get(24)?,
                total_earned: row.get(25)?,
            })
        }
        Role::Admin => RoleDetails::Admin,
    };

    Ok(Account {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(3)?,
        phone: row.get(4)?,
        address: row.get(5)?,
        national_id: row.get(6)?,
        profile_complete: row.get(7)?,
        profile_image: row.get(8)?,
        is_active: row.get(9)?,
        registration_date: decode_time(10, row.get(10)?)?,
        activation_date: decode_opt_time(11, row.get(11)?)?,
        details,
    })
}

fn find_account(conn: &Connection, id: AccountId) -> rusqlite::Result<Option<Account>> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        params![id],
        account_from_row,
    )
    .optional()
}

fn collect_accounts(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<Account>> {
    let mut stmt = conn.prepare(sql)?;
    let accounts = stmt
        .query_map([], account_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(accounts)
}

impl Database {
    /// Creates a new account.
    ///
    /// The caller hashes the password; this function only ever sees the
    /// hash. Admin accounts are created active with an activation date,
    /// everyone else starts inactive.
    ///
    /// # Arguments
    ///
    /// * `account` - Registration data. `email` is expected to be normalized.
    /// * `password_hash` - The bcrypt hash of the chosen password.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateEmail`] if the email (compared without
    /// regard to case) is already registered.
    ///
    /// # Postconditions
    ///
    /// The returned account is exactly what a later `account(id)` returns.
    pub fn create_account(
        &self,
        account: &NewAccount,
        password_hash: &str,
    ) -> Result<Account, StoreError> {
        let conn = self.conn();
        let registered = encode_time(now())?;
        let activated = account.role.starts_active().then(|| registered.clone());

        let inserted = conn.execute(
            "INSERT INTO accounts (email, password_hash, role, name, phone, national_id, is_active, registration_date, activation_date) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                account.email,
                password_hash,
                account.role.as_str(),
                account.name,
                account.phone,
                account.national_id,
                account.role.starts_active(),
                registered,
                activated,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                return Err(StoreError::DuplicateEmail)
            }
            Err(e) => return Err(e.into()),
        }

        let id = conn.last_insert_rowid();
        find_account(&conn, id)?
            .ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Retrieves an account by id.
    pub fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(find_account(&self.conn(), id)?)
    }

    /// Retrieves an account by email, ignoring case.
    pub fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let account = self
            .conn()
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1"),
                params![email],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    /// Looks up the id and password hash for `email`.
    ///
    /// This is the only read that returns the credential; it exists for the
    /// login path.
    pub fn credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(AccountId, String)>, StoreError> {
        let credentials = self
            .conn()
            .query_row(
                "SELECT id, password_hash FROM accounts WHERE email = ?1",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(credentials)
    }

    /// All accounts, newest first.
    pub fn all_accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(collect_accounts(
            &self.conn(),
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id DESC"),
        )?)
    }

    /// The earliest registered admin, who receives registration notices.
    pub fn first_admin(&self) -> Result<Option<Account>, StoreError> {
        let admin = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE role = 'admin' ORDER BY id LIMIT 1"
                ),
                [],
                account_from_row,
            )
            .optional()?;
        Ok(admin)
    }

    /// Writes the self-service profile columns of `account`.
    ///
    /// Role, email, activation and the nurse ledger are not written, so a
    /// stale copy of the account can never roll them back.
    ///
    /// # Returns
    ///
    /// `Ok(false)` if the account no longer exists.
    pub fn save_profile(&self, account: &Account) -> Result<bool, StoreError> {
        let empty = Vec::new();
        let (patient, nurse) = match &account.details {
            RoleDetails::Patient(patient) => (Some(patient), None),
            RoleDetails::Nurse(nurse) => (None, Some(nurse)),
            RoleDetails::Admin => (None, None),
        };

        let changed = self.conn().execute(
            "UPDATE accounts SET name = ?1, phone = ?2, address = ?3, national_id = ?4, profile_complete = ?5, profile_image = ?6, date_of_birth = ?7, gender = ?8, emergency_contact = ?9, blood_type = ?10, medical_conditions = ?11, allergies = ?12, license_id = ?13, specializations = ?14, experience = ?15 WHERE id = ?16",
            params![
                account.name,
                account.phone,
                account.address,
                account.national_id,
                account.profile_complete,
                account.profile_image,
                patient.and_then(|p| p.date_of_birth.as_deref()),
                patient.and_then(|p| p.gender.as_deref()),
                patient.and_then(|p| p.emergency_contact.as_deref()),
                patient.and_then(|p| p.blood_type.as_deref()),
                encode_list(patient.map_or(&empty, |p| &p.medical_conditions))?,
                encode_list(patient.map_or(&empty, |p| &p.allergies))?,
                nurse.and_then(|n| n.license_id.as_deref()),
                encode_list(nurse.map_or(&empty, |n| &n.specializations))?,
                nurse.and_then(|n| n.experience.as_deref()),
                account.id,
            ],
        )?;
        Ok(changed == 1)
    }

    /// Activates or deactivates an account.
    ///
    /// Every activation stamps `activation_date` with the current time.
    /// Deactivation leaves the last date in place.
    ///
    /// # Returns
    ///
    /// The updated account, or `None` if it doesn't exist.
    pub fn set_activation(
        &self,
        id: AccountId,
        active: bool,
    ) -> Result<Option<Account>, StoreError> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE accounts SET is_active = ?2, activation_date = CASE WHEN ?2 THEN ?3 ELSE activation_date END WHERE id = ?1",
            params![id, active, encode_time(now())?],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(find_account(&conn, id)?)
    }

    /// Deletes an account. Requests and questions that reference it are
    /// left in place.
    pub fn delete_account(&self, id: AccountId) -> Result<bool, StoreError> {
        let changed = self
            .conn()
            .execute("DELETE FROM accounts WHERE id = ?1", params![id])?;
        Ok(changed == 1)
    }

    /// Sets a nurse's availability and, if given, last known location.
    ///
    /// # Returns
    ///
    /// The updated nurse, or `None` if `id` is not a nurse.
    pub fn set_availability(
        &self,
        id: AccountId,
        available: bool,
        location: Option<Coordinates>,
    ) -> Result<Option<Account>, StoreError> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE accounts SET availability_status = ?2, latitude = COALESCE(?3, latitude), longitude = COALESCE(?4, longitude) WHERE id = ?1 AND role = 'nurse'",
            params![
                id,
                available,
                location.map(|l| l.latitude),
                location.map(|l| l.longitude),
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(find_account(&conn, id)?)
    }

    /// Records a nurse's last known location.
    pub fn set_location(&self, id: AccountId, location: Coordinates) -> Result<bool, StoreError> {
        let changed = self.conn().execute(
            "UPDATE accounts SET latitude = ?2, longitude = ?3 WHERE id = ?1 AND role = 'nurse'",
            params![id, location.latitude, location.longitude],
        )?;
        Ok(changed == 1)
    }

    /// Number of active nurses currently marked available.
    pub fn count_available_nurses(&self) -> Result<i64, StoreError> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM accounts WHERE role = 'nurse' AND availability_status = 1 AND is_active = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn new_account(email: &str, role: Role) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            role,
            name: format!("{role} user"),
            phone: "01012345678".to_string(),
            national_id: None,
        }
    }

    #[test]
    fn create_and_find() {
        let db = Database::open_in_memory().unwrap();
        let created = db
            .create_account(&new_account("nurse@example.com", Role::Nurse), "hash")
            .unwrap();

        assert_eq!(created.role(), Role::Nurse);
        assert!(!created.is_active);
        assert!(created.activation_date.is_none());
        assert_eq!(db.account(created.id).unwrap(), Some(created.clone()));
        assert_eq!(
            db.account_by_email("NURSE@example.com").unwrap(),
            Some(created)
        );
    }

    #[test]
    fn admins_start_active() {
        let db = Database::open_in_memory().unwrap();
        let admin = db
            .create_account(&new_account("admin@example.com", Role::Admin), "hash")
            .unwrap();
        assert!(admin.is_active);
        assert!(admin.activation_date.is_some());
        assert_eq!(db.first_admin().unwrap().map(|a| a.id), Some(admin.id));
    }

    #[test]
    fn duplicate_email_ignores_case() {
        let db = Database::open_in_memory().unwrap();
        db.create_account(&new_account("mona@example.com", Role::Patient), "hash")
            .unwrap();
        let err = db
            .create_account(&new_account("Mona@Example.com", Role::Nurse), "hash")
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[test]
    fn role_column_cannot_change() {
        let db = Database::open_in_memory().unwrap();
        let patient = db
            .create_account(&new_account("p@example.com", Role::Patient), "hash")
            .unwrap();
        let result = db.conn().execute(
            "UPDATE accounts SET role = 'admin' WHERE id = ?1",
            params![patient.id],
        );
        assert!(result.is_err());
        assert_eq!(db.account(patient.id).unwrap().unwrap().role(), Role::Patient);
    }

    #[test]
    fn activation_stamps_date() {
        let db = Database::open_in_memory().unwrap();
        let nurse = db
            .create_account(&new_account("n@example.com", Role::Nurse), "hash")
            .unwrap();

        let activated = db.set_activation(nurse.id, true).unwrap().unwrap();
        assert!(activated.is_active);
        let stamped = activated.activation_date.unwrap();

        let deactivated = db.set_activation(nurse.id, false).unwrap().unwrap();
        assert!(!deactivated.is_active);
        assert_eq!(deactivated.activation_date, Some(stamped));

        let again = db.set_activation(nurse.id, true).unwrap().unwrap();
        assert!(again.activation_date.unwrap() >= stamped);

        assert!(db.set_activation(9999, true).unwrap().is_none());
    }

    #[test]
    fn save_profile_persists_role_fields() {
        let db = Database::open_in_memory().unwrap();
        let mut nurse = db
            .create_account(&new_account("n@example.com", Role::Nurse), "hash")
            .unwrap();
        if let RoleDetails::Nurse(details) = &mut nurse.details {
            details.license_id = Some("NUR123456".to_string());
            details.specializations = vec!["wound care".to_string()];
        }
        nurse.profile_complete = true;
        assert!(db.save_profile(&nurse).unwrap());
        assert_eq!(db.account(nurse.id).unwrap(), Some(nurse));
    }

    #[test]
    fn availability_only_applies_to_nurses() {
        let db = Database::open_in_memory().unwrap();
        let nurse = db
            .create_account(&new_account("n@example.com", Role::Nurse), "hash")
            .unwrap();
        let patient = db
            .create_account(&new_account("p@example.com", Role::Patient), "hash")
            .unwrap();
        let here = Coordinates {
            latitude: 30.04,
            longitude: 31.23,
        };

        let updated = db.set_availability(nurse.id, true, Some(here)).unwrap().unwrap();
        assert_eq!(updated.nurse().unwrap().location, Some(here));
        assert!(db.set_availability(patient.id, true, None).unwrap().is_none());

        // inactive nurses are not counted
        assert_eq!(db.count_available_nurses().unwrap(), 0);
        db.set_activation(nurse.id, true).unwrap();
        assert_eq!(db.count_available_nurses().unwrap(), 1);
    }

    #[test]
    fn credentials_are_only_read_explicitly() {
        let db = Database::open_in_memory().unwrap();
        let account = db
            .create_account(&new_account("p@example.com", Role::Patient), "secret-hash")
            .unwrap();
        let json = serde_json::to_string(&db.account(account.id).unwrap()).unwrap();
        assert!(!json.contains("secret-hash"));
        assert_eq!(
            db.credentials_by_email("p@example.com").unwrap(),
            Some((account.id, "secret-hash".to_string()))
        );
    }

    #[test]
    fn delete_removes_account() {
        let db = Database::open_in_memory().unwrap();
        let account = db
            .create_account(&new_account("p@example.com", Role::Patient), "hash")
            .unwrap();
        assert!(db.delete_account(account.id).unwrap());
        assert!(!db.delete_account(account.id).unwrap());
        assert!(db.account(account.id).unwrap().is_none());
    }
}
