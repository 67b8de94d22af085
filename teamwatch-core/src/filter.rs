//! Query parameters for list endpoints.
//!
//! `None` fields are omitted from the query string, so a default filter
//! requests the unfiltered list.

use serde::{Deserialize, Serialize};

/// Filter for `GET /api/messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl MessageFilter {
    pub fn recent(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn for_team(team: impl Into<String>) -> Self {
        Self {
            team: Some(team.into()),
            ..Self::default()
        }
    }

    /// Drop blank text fields so they are not sent as empty parameters.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.team,
            &mut self.from_agent,
            &mut self.msg_type,
            &mut self.search,
        ] {
            if field.as_deref().map(str::trim).is_some_and(str::is_empty) {
                *field = None;
            }
        }
        if self.limit == Some(0) {
            self.limit = None;
        }
        if self.offset == Some(0) {
            self.offset = None;
        }
        self
    }
}

/// Filter for `GET /api/tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl TaskFilter {
    pub fn normalized(mut self) -> Self {
        if self.team.as_deref().is_some_and(|t| t.trim().is_empty()) {
            self.team = None;
        }
        if self.status.as_deref().is_some_and(|s| s.trim().is_empty()) {
            self.status = None;
        }
        self
    }
}

/// Filter and paging for `GET /api/teams/{name}/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamMessageFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<String>,
    pub page: u32,
    pub size: u32,
}

impl TeamMessageFilter {
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Clamp paging into the range the server accepts.
    pub fn clamped(mut self) -> Self {
        self.page = self.page.max(1);
        self.size = self.size.clamp(1, Self::MAX_PAGE_SIZE);
        self
    }
}

impl Default for TeamMessageFilter {
    fn default() -> Self {
        Self {
            sender: None,
            msg_type: None,
            page: 1,
            size: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_filter_serializes_empty() {
        let value = serde_json::to_value(MessageFilter::default()).unwrap();
        assert_eq!(value, serde_json::json!({}));
    }

    #[test]
    fn test_normalized_drops_blank_fields() {
        let filter = MessageFilter {
            team: Some("  ".to_string()),
            search: Some("deploy".to_string()),
            limit: Some(0),
            ..MessageFilter::default()
        }
        .normalized();
        assert_eq!(filter.team, None);
        assert_eq!(filter.search.as_deref(), Some("deploy"));
        assert_eq!(filter.limit, None);
    }

    proptest! {
        #[test]
        fn clamped_paging_is_accepted(page in 0u32..1000, size in 0u32..1000) {
            let filter = TeamMessageFilter { page, size, ..TeamMessageFilter::default() }.clamped();
            prop_assert!(filter.page >= 1);
            prop_assert!((1..=TeamMessageFilter::MAX_PAGE_SIZE).contains(&filter.size));
        }
    }
}
