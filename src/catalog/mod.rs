//! Section and speaker catalogs
//!
//! The catalog is immutable once loaded: the ordered list of sections to
//! extract with their required languages, and the per-speaker localized
//! display names.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Supported content languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Us,
    Jp,
    De,
    Fr,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::Us, Language::Jp, Language::De, Language::Fr];

    /// Canonical language used when a caller does not pick one
    pub const CANONICAL: Language = Language::Us;

    /// Code used in remote file names and persisted rows
    pub fn code(&self) -> &'static str {
        match self {
            Language::Us => "us",
            Language::Jp => "jp",
            Language::De => "de",
            Language::Fr => "fr",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Us => "English",
            Language::Jp => "Japanese",
            Language::De => "German",
            Language::Fr => "French",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "us" => Ok(Language::Us),
            "jp" => Ok(Language::Jp),
            "de" => Ok(Language::De),
            "fr" => Ok(Language::Fr),
            _ => Err(Error::Catalog(format!("Unknown language code: {}", s))),
        }
    }
}

/// A named content unit with its required languages, in fetch order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub languages: Vec<Language>,
}

impl Section {
    pub fn new(name: impl Into<String>, languages: Vec<Language>) -> Self {
        Self {
            name: name.into(),
            languages,
        }
    }

    /// Files fetched for this section: the list manifest plus one per language
    pub fn file_count(&self) -> usize {
        self.languages.len() + 1
    }
}

/// Localized display names of one speaker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerNames {
    #[serde(default)]
    pub us: Option<String>,
    #[serde(default)]
    pub jp: Option<String>,
    #[serde(default)]
    pub de: Option<String>,
    #[serde(default)]
    pub fr: Option<String>,
}

impl SpeakerNames {
    pub fn get(&self, language: Language) -> Option<&str> {
        match language {
            Language::Us => self.us.as_deref(),
            Language::Jp => self.jp.as_deref(),
            Language::De => self.de.as_deref(),
            Language::Fr => self.fr.as_deref(),
        }
    }
}

/// Speaker id -> localized names
pub type SpeakerCatalog = BTreeMap<String, SpeakerNames>;

#[derive(Debug, Deserialize)]
struct SectionsFile {
    #[serde(default)]
    sections: Vec<RawSection>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    name: String,
    #[serde(default)]
    languages: Vec<String>,
}

/// The immutable extraction catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    sections: Vec<Section>,
    speakers: SpeakerCatalog,
}

impl Catalog {
    /// Build a catalog from already-parsed data, rejecting malformed sections
    pub fn new(sections: Vec<Section>, speakers: SpeakerCatalog) -> Result<Self> {
        let mut seen = HashSet::new();
        for section in &sections {
            if section.name.trim().is_empty() {
                return Err(Error::Catalog("Section with empty name".to_string()));
            }
            if !seen.insert(section.name.as_str()) {
                return Err(Error::Catalog(format!(
                    "Duplicate section: {}",
                    section.name
                )));
            }
            if section.languages.is_empty() {
                return Err(Error::Catalog(format!(
                    "Section {} has no languages",
                    section.name
                )));
            }
            let unique: HashSet<_> = section.languages.iter().collect();
            if unique.len() != section.languages.len() {
                return Err(Error::Catalog(format!(
                    "Section {} lists a language twice",
                    section.name
                )));
            }
        }

        Ok(Self { sections, speakers })
    }

    /// Parse the sections document (`{"sections": [...]}`)
    pub fn parse_sections(json: &str) -> Result<Vec<Section>> {
        let file: SectionsFile = serde_json::from_str(json)
            .map_err(|e| Error::Catalog(format!("Malformed sections catalog: {}", e)))?;

        file.sections
            .into_iter()
            .map(|raw| {
                let languages = raw
                    .languages
                    .iter()
                    .map(|code| code.parse())
                    .collect::<Result<Vec<Language>>>()?;
                Ok(Section::new(raw.name, languages))
            })
            .collect()
    }

    /// Parse the speaker document (`{"<id>": {"us": "...", ...}}`)
    pub fn parse_speakers(json: &str) -> Result<SpeakerCatalog> {
        serde_json::from_str(json)
            .map_err(|e| Error::Catalog(format!("Malformed speaker catalog: {}", e)))
    }

    /// Load both catalog files. The sections file is required; the speaker
    /// file is optional.
    pub fn load(sections_path: &Path, characters_path: &Path) -> Result<Self> {
        if !sections_path.exists() {
            return Err(Error::Catalog(format!(
                "Sections file not found: {}",
                sections_path.display()
            )));
        }
        let sections = Self::parse_sections(&std::fs::read_to_string(sections_path)?)?;

        let speakers = if characters_path.exists() {
            Self::parse_speakers(&std::fs::read_to_string(characters_path)?)?
        } else {
            warn!(
                "Speaker catalog not found at {}; speaker names will be unavailable",
                characters_path.display()
            );
            SpeakerCatalog::new()
        };

        let catalog = Self::new(sections, speakers)?;
        info!(
            "Loaded {} sections ({} language files expected), {} speakers",
            catalog.sections.len(),
            catalog.expected_language_files(),
            catalog.speakers.len()
        );
        Ok(catalog)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn speakers(&self) -> &SpeakerCatalog {
        &self.speakers
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Total language files across every section
    pub fn expected_language_files(&self) -> usize {
        self.sections.iter().map(|s| s.languages.len()).sum()
    }
}
