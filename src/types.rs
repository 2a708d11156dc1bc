//! Wire types shared by the mock engine and the backend endpoints.
//!
//! Deserialization is deliberately forgiving: a missing `rows` field is an
//! empty list, a legacy `cursor` field is accepted where `nextCursor` is
//! expected, and `hasMore` without a cursor is normalized to `false`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// One drilldown list row. `fields` carries endpoint-specific scalars
/// (timestamps, counts) keyed by column field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_cents: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Row {
    /// The value backing a sortable column, as a display string.
    ///
    /// Core columns resolve directly; anything else is looked up in
    /// `fields`. Missing values sort as the empty string.
    pub fn field_text(&self, field: &str) -> String {
        match field {
            "id" => self.id.clone(),
            "title" => self.title.clone(),
            "subtitle" => self.subtitle.clone().unwrap_or_default(),
            "status" => self.status.clone().unwrap_or_default(),
            "amountCents" => self
                .amount_cents
                .map(|v| v.to_string())
                .unwrap_or_default(),
            other => match self.fields.get(other) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                Some(serde_json::Value::Bool(b)) => b.to_string(),
                _ => String::new(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// Pagination envelope on a list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
    /// Legacy field: older endpoints emit the next-page token as `cursor`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

// ---------------------------------------------------------------------------
// ListPage
// ---------------------------------------------------------------------------

/// One page of a paginated list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
}

impl ListPage {
    /// Next-page token, preferring `nextCursor` over the legacy `cursor`.
    pub fn effective_next_cursor(&self) -> Option<String> {
        let paging = self.paging.as_ref()?;
        paging
            .next_cursor
            .clone()
            .or_else(|| paging.cursor.clone())
    }

    /// Whether another page exists. A `hasMore` flag without any cursor is
    /// a malformed upstream response and reads as `false`.
    pub fn effective_has_more(&self) -> bool {
        self.paging.as_ref().is_some_and(|p| p.has_more)
            && self.effective_next_cursor().is_some()
    }
}
