use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Sign-up form for the free training videos. Submissions are acknowledged
/// and logged, never stored.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct LeadForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeadError {
    #[error("name is required")]
    MissingName,
    #[error("a valid e-mail address is required")]
    InvalidEmail,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Acknowledgment {
    pub message: String,
}

impl LeadForm {
    pub fn submit(&self) -> Result<Acknowledgment, LeadError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(LeadError::MissingName);
        }

        let email = self.email.trim();
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'));
        if !valid_email {
            return Err(LeadError::InvalidEmail);
        }

        info!("Lead form submitted by {}", email);
        Ok(Acknowledgment {
            message: format!(
                "Thanks {}! You're registered and can now access the training videos.",
                name
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str) -> LeadForm {
        LeadForm {
            name: name.into(),
            email: email.into(),
            phone: String::new(),
        }
    }

    #[test]
    fn test_acknowledges_valid_submission() {
        let ack = form("  Ayşe ", "ayse@example.com").submit().unwrap();
        assert!(ack.message.starts_with("Thanks Ayşe!"));
    }

    #[test]
    fn test_rejects_missing_name_and_bad_email() {
        assert_eq!(form(" ", "a@b.co").submit(), Err(LeadError::MissingName));
        assert_eq!(form("Can", "not-an-email").submit(), Err(LeadError::InvalidEmail));
        assert_eq!(form("Can", "@example.com").submit(), Err(LeadError::InvalidEmail));
        assert_eq!(form("Can", "can@localhost").submit(), Err(LeadError::InvalidEmail));
    }
}
