//! Configuration export.
//!
//! Only the five portable fields per webhook leave the organization.
//! Headers, payload templates and statistics are never exported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::BulkOperationItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedWebhook {
    pub name: String,
    pub feature_slug: String,
    pub element_id: String,
    pub endpoint_url: String,
    pub is_enabled: bool,
}

impl From<&BulkOperationItem> for ExportedWebhook {
    fn from(item: &BulkOperationItem) -> Self {
        Self {
            name: item.name.clone(),
            feature_slug: item.feature_slug.clone(),
            element_id: item.element_id.clone(),
            endpoint_url: item.endpoint_url.clone(),
            is_enabled: item.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub exported_at: DateTime<Utc>,
    pub organization_id: String,
    pub webhooks: Vec<ExportedWebhook>,
}

impl ExportDocument {
    /// Build from a selection. The organization is taken from the first item.
    pub fn from_items(items: &[BulkOperationItem], exported_at: DateTime<Utc>) -> Self {
        Self {
            exported_at,
            organization_id: items
                .first()
                .map(|i| i.organization_id.clone())
                .unwrap_or_default(),
            webhooks: items.iter().map(ExportedWebhook::from).collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use elementhook_remote::HealthStatus;
    use serde_json::Value;

    fn item(id: &str, active: bool) -> BulkOperationItem {
        BulkOperationItem {
            id: id.to_string(),
            organization_id: "org-1".to_string(),
            name: format!("Hook {id}"),
            feature_slug: "checkout".to_string(),
            page_path: "/app/checkout".to_string(),
            element_id: format!("id_{id}"),
            endpoint_url: "https://hooks.example.com/in".to_string(),
            is_active: active,
            health_status: HealthStatus::Healthy,
            total_executions: 12,
            successful_executions: 12,
            failed_executions: 0,
            average_response_time: 80.0,
            last_triggered_at: None,
        }
    }

    #[test]
    fn test_exact_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let doc = ExportDocument::from_items(&[item("a", true), item("b", false)], at);
        let value = serde_json::to_value(&doc).unwrap();

        let top: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(top, ["exported_at", "organization_id", "webhooks"]);
        assert_eq!(value["exported_at"], "2024-05-01T12:00:00Z");
        assert_eq!(value["organization_id"], "org-1");

        let webhooks = value["webhooks"].as_array().unwrap();
        assert_eq!(webhooks.len(), 2);
        for webhook in webhooks {
            let mut fields: Vec<&str> =
                webhook.as_object().unwrap().keys().map(String::as_str).collect();
            fields.sort_unstable();
            assert_eq!(
                fields,
                ["element_id", "endpoint_url", "feature_slug", "is_enabled", "name"]
            );
        }
        assert_eq!(webhooks[0]["is_enabled"], Value::Bool(true));
        assert_eq!(webhooks[1]["is_enabled"], Value::Bool(false));
    }

    #[test]
    fn test_empty_selection() {
        let doc = ExportDocument::from_items(&[], Utc::now());
        assert!(doc.organization_id.is_empty());
        assert!(doc.webhooks.is_empty());
        assert!(doc.to_json_pretty().unwrap().contains("\"webhooks\": []"));
    }
}
