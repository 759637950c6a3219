//! The sixteen MBTI personas and their reference material.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::PersonaConfig;

#[derive(Debug, thiserror::Error)]
#[error("unknown MBTI type: {0:?}")]
pub struct UnknownPersona(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mbti {
    Infp,
    Enfp,
    Intj,
    Entj,
    Isfj,
    Esfj,
    Istp,
    Estp,
    Intp,
    Entp,
    Isfp,
    Esfp,
    Istj,
    Estj,
    Infj,
    Enfj,
}

impl Mbti {
    pub const ALL: [Self; 16] = [
        Self::Infp,
        Self::Enfp,
        Self::Intj,
        Self::Entj,
        Self::Isfj,
        Self::Esfj,
        Self::Istp,
        Self::Estp,
        Self::Intp,
        Self::Entp,
        Self::Isfp,
        Self::Esfp,
        Self::Istj,
        Self::Estj,
        Self::Infj,
        Self::Enfj,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Infp => "INFP",
            Self::Enfp => "ENFP",
            Self::Intj => "INTJ",
            Self::Entj => "ENTJ",
            Self::Isfj => "ISFJ",
            Self::Esfj => "ESFJ",
            Self::Istp => "ISTP",
            Self::Estp => "ESTP",
            Self::Intp => "INTP",
            Self::Entp => "ENTP",
            Self::Isfp => "ISFP",
            Self::Esfp => "ESFP",
            Self::Istj => "ISTJ",
            Self::Estj => "ESTJ",
            Self::Infj => "INFJ",
            Self::Enfj => "ENFJ",
        }
    }

    /// Built-in trait summary used when the configuration does not supply one.
    #[must_use]
    pub fn default_description(self) -> &'static str {
        match self {
            Self::Infp => {
                "Idealistic mediator. Guided by personal values, empathetic, imaginative, \
                 avoids conflict and speaks gently."
            }
            Self::Enfp => {
                "Enthusiastic campaigner. Curious, warm, spontaneous, jumps between ideas \
                 and cheers people on."
            }
            Self::Intj => {
                "Strategic architect. Independent, logical, plans far ahead, values \
                 competence and dislikes small talk."
            }
            Self::Entj => {
                "Bold commander. Decisive, goal-driven, organizes people and gives direct, \
                 confident advice."
            }
            Self::Isfj => {
                "Devoted defender. Caring, reliable, remembers details about people and \
                 prefers familiar routines."
            }
            Self::Esfj => {
                "Sociable consul. Attentive host, keeps the group in harmony and likes \
                 clear social expectations."
            }
            Self::Istp => {
                "Practical virtuoso. Calm, hands-on problem solver, answers briefly and \
                 values freedom."
            }
            Self::Estp => {
                "Energetic entrepreneur. Action first, thrives on risk and excitement, \
                 blunt and playful."
            }
            Self::Intp => {
                "Analytical logician. Loves theories and puzzles, questions assumptions, \
                 can drift into tangents."
            }
            Self::Entp => {
                "Inventive debater. Quick-witted, enjoys arguing both sides and \
                 challenging the status quo."
            }
            Self::Isfp => {
                "Gentle adventurer. Artistic, lives in the moment, quietly kind and \
                 sensitive to criticism."
            }
            Self::Esfp => {
                "Spontaneous entertainer. Fun-loving, expressive, loves company and \
                 attention, focuses on now."
            }
            Self::Istj => {
                "Dutiful logistician. Responsible, factual, follows rules and keeps \
                 commitments to the letter."
            }
            Self::Estj => {
                "Efficient executive. Organized, direct, values order and tradition and \
                 takes charge."
            }
            Self::Infj => {
                "Insightful advocate. Quietly idealistic, reads people deeply and looks \
                 for meaning and purpose."
            }
            Self::Enfj => {
                "Charismatic protagonist. Inspiring, supportive, wants to help others \
                 grow and speaks with warmth."
            }
        }
    }
}

impl fmt::Display for Mbti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mbti {
    type Err = UnknownPersona;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == code)
            .ok_or_else(|| UnknownPersona(s.trim().to_owned()))
    }
}

/// A configured persona. Immutable once the catalog is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub code: Mbti,
    pub description: String,
    pub document: PathBuf,
}

/// All sixteen personas, with configured overrides applied over built-in defaults.
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    personas: BTreeMap<Mbti, Persona>,
}

impl PersonaCatalog {
    /// Built-in descriptions with documents at `{texts_dir}/{CODE}.txt`.
    #[must_use]
    pub fn with_defaults(texts_dir: &Path) -> Self {
        let personas = Mbti::ALL
            .into_iter()
            .map(|code| {
                (
                    code,
                    Persona {
                        code,
                        description: code.default_description().to_owned(),
                        document: texts_dir.join(format!("{code}.txt")),
                    },
                )
            })
            .collect();
        Self { personas }
    }

    /// Apply per-code overrides from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownPersona`] if an override key is not one of the sixteen codes.
    pub fn from_config(
        texts_dir: &Path,
        overrides: &HashMap<String, PersonaConfig>,
    ) -> Result<Self, UnknownPersona> {
        let mut catalog = Self::with_defaults(texts_dir);
        for (key, cfg) in overrides {
            let code: Mbti = key.parse()?;
            let persona = catalog
                .personas
                .get_mut(&code)
                .ok_or_else(|| UnknownPersona(key.clone()))?;
            if let Some(desc) = &cfg.description {
                persona.description.clone_from(desc);
            }
            if let Some(doc) = &cfg.document {
                persona.document.clone_from(doc);
            }
        }
        Ok(catalog)
    }

    #[must_use]
    pub fn get(&self, code: Mbti) -> Option<&Persona> {
        self.personas.get(&code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.personas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}
