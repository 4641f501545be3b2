//! Customer profile upsert payload.

use crate::domain::ProfileId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Platform-side customer data used to build a profile update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerProfile {
    pub customer_no: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub signup_date: Option<DateTime<Utc>>,
    pub locale: Option<String>,
}

/// Attributes sent to the engine; empty fields are pruned so the engine does
/// not overwrite existing values with blanks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signup_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub site_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub profile_id: ProfileId,
    pub attributes: ProfileAttributes,
}

impl ProfileUpdate {
    pub fn new(profile_id: ProfileId, profile: &CustomerProfile, site_id: &str) -> Self {
        let name = match (&profile.first_name, &profile.last_name) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        };

        ProfileUpdate {
            profile_id,
            attributes: ProfileAttributes {
                name: non_empty(name),
                email: non_empty(profile.email.clone()),
                phone: non_empty(profile.phone.clone()),
                birth_date: profile.birth_date,
                signup_date: profile.signup_date,
                customer_no: non_empty(profile.customer_no.clone()),
                locale: non_empty(profile.locale.clone()),
                site_id: site_id.to_string(),
            },
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_are_pruned() {
        let profile = CustomerProfile {
            email: Some(String::new()),
            first_name: Some("Ada".into()),
            ..Default::default()
        };
        let update = ProfileUpdate::new(ProfileId::new("p-1"), &profile, "storefront");

        assert_eq!(update.attributes.name, Some("Ada".to_string()));
        assert_eq!(update.attributes.email, None);

        let json = serde_json::to_value(&update.attributes).unwrap();
        assert!(json.get("Email").is_none());
        assert_eq!(json.get("SiteId").unwrap(), "storefront");
    }

    #[test]
    fn test_full_name_joined() {
        let profile = CustomerProfile {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            ..Default::default()
        };
        let update = ProfileUpdate::new(ProfileId::new("p-1"), &profile, "storefront");
        assert_eq!(update.attributes.name, Some("Ada Lovelace".to_string()));
    }
}
