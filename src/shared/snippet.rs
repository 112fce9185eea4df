//! Snippet Model
//!
//! The snippet card as both sides of the wire see it, plus the partial
//! update carrier used for shallow merges. The client holds these as a
//! view-state mirror; the REST layer's response (or a full refetch) is the
//! source of truth on conflict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A positioned, taggable code-snippet card.
///
/// Coordinates are integer canvas units; anything fractional is rounded
/// before it ever reaches a payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snippet {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub code: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default = "default_color")]
    pub color: String,
    pub x: i32,
    pub y: i32,
    pub space_id: Uuid,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Local file attachments; never serialized, never synchronized.
    #[serde(skip)]
    pub attachments: Vec<String>,
}

fn default_color() -> String {
    "#fbbf24".to_string()
}

impl Snippet {
    /// Create a snippet at the canvas origin with default styling.
    pub fn new(id: Uuid, space_id: Uuid, owner_id: Uuid, title: String, code: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            description: String::new(),
            code,
            tags: BTreeSet::new(),
            color: default_color(),
            x: 0,
            y: 0,
            space_id,
            owner_id,
            created_at: now,
            updated_at: now,
            attachments: Vec::new(),
        }
    }

    /// Move the card, bumping `updated_at`.
    pub fn set_position(&mut self, x: i32, y: i32, updated_at: DateTime<Utc>) {
        self.x = x;
        self.y = y;
        self.updated_at = updated_at;
    }
}

/// A partial snippet update: only present fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SnippetPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
}

impl SnippetPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.code.is_none()
            && self.tags.is_none()
            && self.color.is_none()
            && self.x.is_none()
            && self.y.is_none()
    }

    /// Shallow-merge this patch into a snippet, bumping `updated_at`.
    pub fn apply_to(&self, snippet: &mut Snippet, updated_at: DateTime<Utc>) {
        if let Some(title) = &self.title {
            snippet.title = title.clone();
        }
        if let Some(description) = &self.description {
            snippet.description = description.clone();
        }
        if let Some(code) = &self.code {
            snippet.code = code.clone();
        }
        if let Some(tags) = &self.tags {
            snippet.tags = tags.clone();
        }
        if let Some(color) = &self.color {
            snippet.color = color.clone();
        }
        if let Some(x) = self.x {
            snippet.x = x;
        }
        if let Some(y) = self.y {
            snippet.y = y;
        }
        snippet.updated_at = updated_at;
    }
}

/// Full space state as returned by the space-fetch API, used for
/// reconciliation fallback. The order list is explicit so clients do not
/// have to invent one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpaceSnapshot {
    pub snippets: Vec<Snippet>,
    pub order: Vec<Uuid>,
}

/// Position body for the REST move endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PositionUpdate {
    pub x: i32,
    pub y: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet() -> Snippet {
        Snippet::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "title".to_string(),
            "code".to_string(),
        )
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let mut s = snippet();
        let original_code = s.code.clone();
        let patch = SnippetPatch {
            title: Some("new title".to_string()),
            x: Some(40),
            ..Default::default()
        };
        let at = Utc::now();
        patch.apply_to(&mut s, at);

        assert_eq!(s.title, "new title");
        assert_eq!(s.x, 40);
        assert_eq!(s.code, original_code);
        assert_eq!(s.updated_at, at);
    }

    #[test]
    fn test_empty_patch_detection() {
        assert!(SnippetPatch::default().is_empty());
        let patch = SnippetPatch {
            color: Some("#000000".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_attachments_are_local_only() {
        let mut s = snippet();
        s.attachments.push("notes.txt".to_string());

        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("notes.txt"));

        let back: Snippet = serde_json::from_str(&json).unwrap();
        assert!(back.attachments.is_empty());
    }

    #[test]
    fn test_set_position() {
        let mut s = snippet();
        let at = Utc::now();
        s.set_position(120, 80, at);
        assert_eq!((s.x, s.y), (120, 80));
        assert_eq!(s.updated_at, at);
    }
}
