use serde::{Deserialize, Serialize};

use crate::component::{verify_role, verify_subrole, ComponentState};
use crate::error::HsmError;

/// A subscriber's request for state-change notifications.
///
/// Each non-empty trigger set widens the subscription (OR across values and
/// across dimensions); a subscription with no trigger at all is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScnSubscription {
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "Subscriber", default, skip_serializing_if = "String::is_empty")]
    pub subscriber: String,
    #[serde(rename = "Url")]
    pub url: String,
    #[serde(rename = "States", default, skip_serializing_if = "Option::is_none")]
    pub states: Option<Vec<String>>,
    #[serde(rename = "Enabled", default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(rename = "Roles", default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(rename = "SubRoles", default, skip_serializing_if = "Option::is_none")]
    pub sub_roles: Option<Vec<String>>,
    #[serde(rename = "SoftwareStatus", default, skip_serializing_if = "Option::is_none")]
    pub software_status: Option<Vec<String>>,
}

impl ScnSubscription {
    /// Validate trigger values and canonicalize their casing.
    pub fn verify(&mut self) -> Result<(), HsmError> {
        if self.url.is_empty() {
            return Err(HsmError::ArgMissing("Url".to_string()));
        }
        let empty = |v: &Option<Vec<String>>| v.as_ref().map_or(true, |s| s.is_empty());
        if empty(&self.states)
            && empty(&self.roles)
            && empty(&self.sub_roles)
            && empty(&self.software_status)
            && self.enabled.is_none()
        {
            return Err(HsmError::ArgMissing("at least one trigger set".to_string()));
        }
        if let Some(states) = &mut self.states {
            for s in states.iter_mut() {
                *s = s
                    .parse::<ComponentState>()
                    .map(|st| st.as_str().to_string())?;
            }
        }
        if let Some(roles) = &mut self.roles {
            for r in roles.iter_mut() {
                *r = verify_role(r)?;
            }
        }
        if let Some(sub_roles) = &mut self.sub_roles {
            for r in sub_roles.iter_mut() {
                *r = verify_subrole(r)?;
            }
        }
        // SoftwareStatus values are site-defined; require only non-empty.
        if let Some(sw) = &self.software_status {
            if sw.iter().any(|s| s.trim().is_empty()) {
                return Err(HsmError::BadType("SoftwareStatus ''".to_string()));
            }
        }
        Ok(())
    }
}

/// The notification POSTed to subscriber URLs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScnPayload {
    #[serde(rename = "Components")]
    pub components: Vec<String>,
    #[serde(rename = "State", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "Flag", default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    #[serde(rename = "Role", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "SubRole", default, skip_serializing_if = "Option::is_none")]
    pub sub_role: Option<String>,
    #[serde(rename = "SoftwareStatus", default, skip_serializing_if = "Option::is_none")]
    pub software_status: Option<String>,
    #[serde(rename = "Enabled", default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_subscription_rejected() {
        let mut sub = ScnSubscription {
            subscriber: "hmfd@sms01".to_string(),
            url: "https://foo/bar".to_string(),
            ..Default::default()
        };
        assert!(sub.verify().is_err());

        sub.states = Some(vec!["on".to_string(), "Off".to_string()]);
        sub.verify().unwrap();
        assert_eq!(sub.states.as_deref().unwrap(), ["On", "Off"]);
    }

    #[test]
    fn bogus_trigger_values_rejected() {
        let mut sub = ScnSubscription {
            url: "https://foo/bar".to_string(),
            states: Some(vec!["Levitating".to_string()]),
            ..Default::default()
        };
        assert!(sub.verify().is_err());

        let mut sub = ScnSubscription {
            url: "https://foo/bar".to_string(),
            roles: Some(vec!["Compute".to_string(), "Wizard".to_string()]),
            ..Default::default()
        };
        assert!(sub.verify().is_err());
    }

    #[test]
    fn missing_url_rejected() {
        let mut sub = ScnSubscription {
            states: Some(vec!["On".to_string()]),
            ..Default::default()
        };
        assert!(matches!(sub.verify(), Err(HsmError::ArgMissing(_))));
    }
}
