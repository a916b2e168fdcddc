//! Conversation manifests and dialogue lookups
//!
//! A list manifest enumerates a section's conversations and, for every line,
//! its dialogue id and speaker. From it we derive two maps keyed by dialogue
//! id so language files (which only carry id -> text) can be annotated.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;

/// A conversation entry in a list manifest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestConversation {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub lines: Vec<ManifestLine>,
}

/// One dialogue line reference inside a conversation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestLine {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub chara: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Parse a list manifest payload
pub fn parse_manifest(payload: Value, label: &str) -> Result<Vec<ManifestConversation>> {
    serde_json::from_value(payload).map_err(|e| Error::Payload {
        label: label.to_string(),
        reason: e.to_string(),
    })
}

/// dialogue id -> speaker id and dialogue id -> conversation id
#[derive(Debug, Clone, Default)]
pub struct DialogueLookups {
    speakers: HashMap<String, String>,
    conversations: HashMap<String, String>,
}

impl DialogueLookups {
    /// Build both maps in one pass over every line
    pub fn build(manifest: &[ManifestConversation]) -> Self {
        let total: usize = manifest.iter().map(|c| c.lines.len()).sum();
        let mut lookups = Self {
            speakers: HashMap::with_capacity(total),
            conversations: HashMap::with_capacity(total),
        };

        for conversation in manifest {
            for line in &conversation.lines {
                match &line.chara {
                    Some(chara) if !chara.is_empty() => {
                        lookups.speakers.insert(line.id.clone(), chara.clone());
                    }
                    // A later unattributed occurrence clears an earlier speaker
                    _ => {
                        lookups.speakers.remove(&line.id);
                    }
                }
                lookups
                    .conversations
                    .insert(line.id.clone(), conversation.id.clone());
            }
        }

        lookups
    }

    pub fn speaker_of(&self, dialogue_id: &str) -> Option<&str> {
        self.speakers.get(dialogue_id).map(String::as_str)
    }

    pub fn conversation_of(&self, dialogue_id: &str) -> Option<&str> {
        self.conversations.get(dialogue_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_lookups() {
        let manifest = parse_manifest(
            json!([
                {"id": "c1", "lines": [{"id": "d1", "chara": "noct"}, {"id": "d2", "chara": "prom"}]},
                {"id": "c2", "lines": [{"id": "d3"}]}
            ]),
            "test_list.json",
        )
        .unwrap();

        let lookups = DialogueLookups::build(&manifest);
        assert_eq!(lookups.len(), 3);
        assert_eq!(lookups.speaker_of("d1"), Some("noct"));
        assert_eq!(lookups.conversation_of("d2"), Some("c1"));
        assert_eq!(lookups.conversation_of("d3"), Some("c2"));
        assert_eq!(lookups.speaker_of("d3"), None);
        assert_eq!(lookups.speaker_of("missing"), None);
    }

    #[test]
    fn test_numeric_ids_are_accepted() {
        let manifest = parse_manifest(
            json!([{"id": 7, "lines": [{"id": 1001, "chara": "gladio"}]}]),
            "n_list.json",
        )
        .unwrap();
        assert_eq!(manifest[0].id, "7");
        let lookups = DialogueLookups::build(&manifest);
        assert_eq!(lookups.speaker_of("1001"), Some("gladio"));
    }

    #[test]
    fn test_later_occurrence_wins() {
        let manifest = parse_manifest(
            json!([
                {"id": "c1", "lines": [{"id": "d1", "chara": "noct"}]},
                {"id": "c2", "lines": [{"id": "d1", "chara": "ignis"}]}
            ]),
            "dup_list.json",
        )
        .unwrap();
        let lookups = DialogueLookups::build(&manifest);
        assert_eq!(lookups.speaker_of("d1"), Some("ignis"));
        assert_eq!(lookups.conversation_of("d1"), Some("c2"));
    }

    #[test]
    fn test_malformed_manifest() {
        let err = parse_manifest(json!({"id": "c1"}), "bad_list.json").unwrap_err();
        assert!(matches!(err, Error::Payload { .. }));
    }
}
