//! Best-effort email notifications.
//!
//! Lifecycle operations hand a [`Notification`] to the [`Notifier`] and move
//! on. Delivery happens on the blocking pool when a tokio runtime is running
//! and inline otherwise; either way a failure is logged and dropped.

use std::sync::Arc;

use anyhow::Result;
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::models::{Account, Role, ServiceRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outgoing mail transport.
pub trait Mailer: Send + Sync {
    fn send(&self, email: &Email) -> Result<()>;
}

/// Writes every message to the log instead of sending it.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: &Email) -> Result<()> {
        info!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            "Email:\n{}",
            email.body
        );
        Ok(())
    }
}

/// The events that produce an email.
#[derive(Debug, Clone)]
pub enum Notification {
    AccountActivated {
        name: String,
    },
    /// Sent to the first admin when a patient or nurse signs up.
    NewRegistration {
        name: String,
        email: String,
        role: Role,
    },
    RequestConfirmed {
        name: String,
        request: ServiceRequest,
    },
    NurseAssigned {
        name: String,
        nurse_name: String,
        nurse_phone: String,
    },
    ServiceCompleted {
        name: String,
        request: ServiceRequest,
    },
}

impl Notification {
    pub fn account_activated(account: &Account) -> Self {
        Notification::AccountActivated {
            name: account.name.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::AccountActivated { .. } => "account-activated",
            Notification::NewRegistration { .. } => "new-registration",
            Notification::RequestConfirmed { .. } => "request-confirmed",
            Notification::NurseAssigned { .. } => "nurse-assigned",
            Notification::ServiceCompleted { .. } => "service-completed",
        }
    }

    /// Subject and plain-text body.
    pub fn render(&self) -> (String, String) {
        const SIGNATURE: &str = "Best regards,\nThe Nursing Service Team";

        match self {
            Notification::AccountActivated { name } => (
                "Your Account Has Been Activated".to_string(),
                format!(
                    "Dear {name},\n\nYour account has been activated. You can now make service \
                     requests, ask medical questions and use every feature of the platform.\n\n\
                     {SIGNATURE}"
                ),
            ),
            Notification::NewRegistration { name, email, role } => (
                "New Account Registration".to_string(),
                format!(
                    "Dear Admin,\n\nA new user has registered and needs activation:\n\n\
                     Name: {name}\nEmail: {email}\nType: {role}\n\n\
                     Please review and activate this account from the admin dashboard.\n\n\
                     Best regards,\nThe System"
                ),
            ),
            Notification::RequestConfirmed { name, request } => (
                "Service Request Confirmation".to_string(),
                format!(
                    "Dear {name},\n\nWe've received your service request:\n\n\
                     Service type: {}\nAddress: {}\nCost: {}\n\n\
                     We'll notify you when a nurse accepts your request.\n\n{SIGNATURE}",
                    request.service_type.as_str(),
                    request.address,
                    request.cost
                ),
            ),
            Notification::NurseAssigned {
                name,
                nurse_name,
                nurse_phone,
            } => (
                "Nurse Assigned to Your Service Request".to_string(),
                format!(
                    "Dear {name},\n\nA nurse has been assigned to your service request:\n\n\
                     Nurse: {nurse_name}\nPhone: {nurse_phone}\n\n\
                     The nurse will contact you shortly to confirm details.\n\n{SIGNATURE}"
                ),
            ),
            Notification::ServiceCompleted { name, request } => (
                "Service Completed".to_string(),
                format!(
                    "Dear {name},\n\nThe nursing service you requested has been completed:\n\n\
                     Service type: {}\nAdditional services: {}\n\n\
                     Please take a moment to rate the service and provide feedback.\n\n\
                     {SIGNATURE}",
                    request.service_type.as_str(),
                    request.additional_services.as_deref().unwrap_or("none")
                ),
            ),
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    from: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
        }
    }

    /// Queues `notification` for `to`. Never fails and never waits for
    /// delivery.
    pub fn notify(&self, to: &str, notification: Notification) {
        let (subject, body) = notification.render();
        let email = Email {
            from: self.from.clone(),
            to: to.to_string(),
            subject,
            body,
        };
        let kind = notification.kind();
        let mailer = Arc::clone(&self.mailer);

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || deliver(mailer.as_ref(), kind, &email));
            }
            Err(_) => deliver(mailer.as_ref(), kind, &email),
        }
    }
}

fn deliver(mailer: &dyn Mailer, kind: &str, email: &Email) {
    match mailer.send(email) {
        Ok(()) => info!(kind, to = %email.to, "Notification sent"),
        Err(e) => warn!(kind, to = %email.to, error = %e, "Notification failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<Email>>);

    impl Mailer for Recording {
        fn send(&self, email: &Email) -> Result<()> {
            self.0.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    struct Broken;

    impl Mailer for Broken {
        fn send(&self, _email: &Email) -> Result<()> {
            anyhow::bail!("smtp unreachable")
        }
    }

    #[test]
    fn sends_inline_without_runtime() {
        let mailer = Arc::new(Recording::default());
        let notifier = Notifier::new(mailer.clone(), "no-reply@homecare.local");
        notifier.notify(
            "nurse@example.com",
            Notification::AccountActivated {
                name: "Sara".to_string(),
            },
        );

        let sent = mailer.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "nurse@example.com");
        assert_eq!(sent[0].subject, "Your Account Has Been Activated");
        assert!(sent[0].body.starts_with("Dear Sara,"));
    }

    #[test]
    fn failures_are_swallowed() {
        let notifier = Notifier::new(Arc::new(Broken), "no-reply@homecare.local");
        notifier.notify(
            "admin@example.com",
            Notification::NewRegistration {
                name: "Omar".to_string(),
                email: "omar@example.com".to_string(),
                role: Role::Nurse,
            },
        );
    }

    #[test]
    fn registration_notice_names_the_role() {
        let (subject, body) = Notification::NewRegistration {
            name: "Omar".to_string(),
            email: "omar@example.com".to_string(),
            role: Role::Nurse,
        }
        .render();
        assert_eq!(subject, "New Account Registration");
        assert!(body.contains("Type: nurse"));
    }
}
