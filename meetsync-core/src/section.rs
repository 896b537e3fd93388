//! Meetsections: the shared buckets events are organized into.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MeetsyncError, MeetsyncResult};

const SECTION_ID_PREFIX: &str = "SEC";

/// Creator marker for auto-provisioned personal sections.
pub const SYSTEM_CREATOR: &str = "system";

const PERSONAL_DESCRIPTION: &str = "This is your personal meetsection.";

/// A named group of members that events are shared into.
///
/// Every user gets one system-created personal section; further sections
/// are user-created. During sync, an event copied from another member's
/// account inherits the sections that member shares with the syncing
/// user, falling back to the personal section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meetsection {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Meetspace this section belongs to, when any.
    pub meetspace: Option<String>,
    /// Member user ids (account emails).
    pub members: Vec<String>,
    pub created_by: Option<String>,
}

impl Meetsection {
    /// A user-created section. Fails when the name is shorter than three
    /// characters.
    pub fn new(name: &str, created_by: &str, members: Vec<String>) -> MeetsyncResult<Self> {
        check_name(name)?;
        Ok(Meetsection {
            id: generate_id(),
            name: name.to_string(),
            description: None,
            meetspace: None,
            members,
            created_by: Some(created_by.to_string()),
        })
    }

    /// The system-provisioned personal section for a user.
    pub fn personal(user: &str, display_name: Option<&str>) -> Self {
        Meetsection {
            id: generate_id(),
            name: default_name(display_name),
            description: Some(PERSONAL_DESCRIPTION.to_string()),
            meetspace: None,
            members: vec![user.to_string()],
            created_by: Some(SYSTEM_CREATOR.to_string()),
        }
    }

    pub fn is_personal(&self) -> bool {
        self.created_by.as_deref() == Some(SYSTEM_CREATOR)
    }

    pub fn has_member(&self, user: &str) -> bool {
        self.members.iter().any(|m| m == user)
    }

    /// Renames the section, subject to the same length rule as creation.
    pub fn rename(&mut self, name: &str) -> MeetsyncResult<()> {
        check_name(name)?;
        self.name = name.to_string();
        Ok(())
    }
}

fn generate_id() -> String {
    format!("{}{}", SECTION_ID_PREFIX, Uuid::new_v4().simple())
}

fn default_name(display_name: Option<&str>) -> String {
    match display_name {
        Some(name) if !name.is_empty() => format!("{name}'s Meetsection"),
        _ => "Default Meetsection".to_string(),
    }
}

fn check_name(name: &str) -> MeetsyncResult<()> {
    if name.chars().count() < 3 {
        return Err(MeetsyncError::Validation(
            "Name must be at least 3 characters".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_are_rejected() {
        assert!(Meetsection::new("ab", "ana@example.com", vec![]).is_err());
        assert!(Meetsection::new("abc", "ana@example.com", vec![]).is_ok());
    }

    #[test]
    fn personal_sections_are_system_created() {
        let section = Meetsection::personal("ana@example.com", Some("Ana"));
        assert!(section.is_personal());
        assert!(section.has_member("ana@example.com"));
        assert_eq!(section.name, "Ana's Meetsection");
        assert!(section.id.starts_with("SEC"));
    }

    #[test]
    fn default_name_without_display_name() {
        let section = Meetsection::personal("ana@example.com", None);
        assert_eq!(section.name, "Default Meetsection");
    }
}
