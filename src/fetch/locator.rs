//! Deterministic URL derivation for remote resources
//!
//! Three resource classes share one remote service:
//! - narrative sections (`dir/<storyId>`) live under `/data/`
//! - reference sections (`wiki/<topic>`) live under `/wiki/wiki_<topic>`
//! - everything else lives under `/<section>/<section>`
//!
//! The layouts must match the live service exactly.

use crate::catalog::Language;
use serde::Serialize;

const NARRATIVE_PREFIX: &str = "dir/";
const WIKI_PREFIX: &str = "wiki/";

/// Resource class of a section, derived from its name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    Narrative,
    Wiki,
    Simple,
}

impl ResourceClass {
    pub fn of(section: &str) -> Self {
        if section.starts_with(NARRATIVE_PREFIX) {
            ResourceClass::Narrative
        } else if section.starts_with(WIKI_PREFIX) {
            ResourceClass::Wiki
        } else {
            ResourceClass::Simple
        }
    }
}

/// One of the files a section is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Base manifest, no suffix
    Base,
    /// Conversation list manifest (`_list`)
    List,
    /// Per-language text file (`_<code>`)
    Language(Language),
}

impl Resource {
    fn suffix(&self) -> String {
        match self {
            Resource::Base => String::new(),
            Resource::List => "_list".to_string(),
            Resource::Language(lang) => format!("_{}", lang.code()),
        }
    }
}

/// Maps sections to fetch URLs. Pure, no I/O.
#[derive(Debug, Clone)]
pub struct ResourceLocator {
    base_url: String,
}

impl ResourceLocator {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL for a section file. The list flag wins over a language code; with
    /// neither, the base manifest is addressed.
    pub fn url(&self, section: &str, language: Option<Language>, is_list: bool) -> String {
        let resource = match (is_list, language) {
            (true, _) => Resource::List,
            (false, Some(lang)) => Resource::Language(lang),
            (false, None) => Resource::Base,
        };
        self.resource_url(section, resource)
    }

    pub fn resource_url(&self, section: &str, resource: Resource) -> String {
        let suffix = resource.suffix();
        match ResourceClass::of(section) {
            ResourceClass::Narrative => {
                let story_id = &section[NARRATIVE_PREFIX.len()..];
                format!("{}/data/{}{}.json", self.base_url, story_id, suffix)
            }
            ResourceClass::Wiki => {
                let topic = &section[WIKI_PREFIX.len()..];
                format!("{}/wiki/wiki_{}{}.json", self.base_url, topic, suffix)
            }
            ResourceClass::Simple => {
                format!("{}/{}/{}{}.json", self.base_url, section, section, suffix)
            }
        }
    }

    /// Human-facing page for a section
    pub fn view_url(&self, section: &str) -> String {
        format!("{}/#/{}", self.base_url, section)
    }
}

/// Label used in progress events and logs
pub fn file_label(section: &str, resource: Resource) -> String {
    match resource {
        Resource::Base => format!("{} (base)", section),
        other => format!("{}{}.json", section, other.suffix()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://ff15.aikotoba.jp";

    #[test]
    fn test_simple_section_urls() {
        let loc = ResourceLocator::new(BASE);
        assert_eq!(
            loc.url("nowloading", None, false),
            "https://ff15.aikotoba.jp/nowloading/nowloading.json"
        );
        assert_eq!(
            loc.url("nowloading", None, true),
            "https://ff15.aikotoba.jp/nowloading/nowloading_list.json"
        );
        assert_eq!(
            loc.url("nowloading", Some(Language::Jp), false),
            "https://ff15.aikotoba.jp/nowloading/nowloading_jp.json"
        );
    }

    #[test]
    fn test_narrative_section_urls() {
        let loc = ResourceLocator::new(BASE);
        let section = "dir/16009story_v_cp00";
        assert_eq!(
            loc.url(section, None, false),
            "https://ff15.aikotoba.jp/data/16009story_v_cp00.json"
        );
        assert_eq!(
            loc.url(section, None, true),
            "https://ff15.aikotoba.jp/data/16009story_v_cp00_list.json"
        );
        assert_eq!(
            loc.url(section, Some(Language::Us), false),
            "https://ff15.aikotoba.jp/data/16009story_v_cp00_us.json"
        );
    }

    #[test]
    fn test_wiki_section_urls() {
        let loc = ResourceLocator::new(BASE);
        assert_eq!(
            loc.url("wiki/enemy", None, false),
            "https://ff15.aikotoba.jp/wiki/wiki_enemy.json"
        );
        assert_eq!(
            loc.url("wiki/enemy", None, true),
            "https://ff15.aikotoba.jp/wiki/wiki_enemy_list.json"
        );
        assert_eq!(
            loc.url("wiki/enemy", Some(Language::Fr), false),
            "https://ff15.aikotoba.jp/wiki/wiki_enemy_fr.json"
        );
    }

    #[test]
    fn test_list_flag_wins_over_language() {
        let loc = ResourceLocator::new(BASE);
        assert_eq!(
            loc.url("nowloading", Some(Language::De), true),
            loc.url("nowloading", None, true)
        );
    }

    #[test]
    fn test_trailing_slash_and_view_url() {
        let loc = ResourceLocator::new("http://127.0.0.1:8080/");
        assert_eq!(
            loc.url("a", None, true),
            "http://127.0.0.1:8080/a/a_list.json"
        );
        assert_eq!(loc.view_url("dir/x"), "http://127.0.0.1:8080/#/dir/x");
    }

    #[test]
    fn test_deterministic() {
        let loc = ResourceLocator::new(BASE);
        for section in ["nowloading", "dir/s1", "wiki/item"] {
            for lang in Language::ALL {
                assert_eq!(
                    loc.url(section, Some(lang), false),
                    loc.url(section, Some(lang), false)
                );
            }
        }
        assert_eq!(ResourceClass::of("wiki/item"), ResourceClass::Wiki);
        assert_eq!(ResourceClass::of("wikipedia"), ResourceClass::Simple);
    }

    #[test]
    fn test_file_labels() {
        assert_eq!(file_label("nowloading", Resource::Base), "nowloading (base)");
        assert_eq!(file_label("nowloading", Resource::List), "nowloading_list.json");
        assert_eq!(
            file_label("nowloading", Resource::Language(Language::Us)),
            "nowloading_us.json"
        );
    }
}
