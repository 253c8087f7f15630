use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Maximum number of entries the features list may hold.
pub const MAX_FEATURES: usize = 4;

pub const DEFAULT_GAME_TITLE: &str = "Poke A Nose";
pub const DEFAULT_ABOUT_TEXT: &str = "Welcome to our game!";
pub const DEFAULT_BODY_TEXT_COLOR: &str = "#1a1a1a";

/// Opaque caller identifier issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(pub String);

impl Principal {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading `len` characters followed by an ellipsis, for headers.
    pub fn abbreviated(&self, len: usize) -> String {
        if self.0.chars().count() <= len {
            return self.0.clone();
        }
        let head: String = self.0.chars().take(len).collect();
        format!("{head}...")
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scalar text fields readable and writable one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    GameTitle,
    Tagline,
    AboutText,
    InstagramLink,
    DeveloperLink,
    PressEmail,
    BodyTextColor,
}

impl TextField {
    pub const ALL: [TextField; 7] = [
        TextField::GameTitle,
        TextField::Tagline,
        TextField::AboutText,
        TextField::InstagramLink,
        TextField::DeveloperLink,
        TextField::PressEmail,
        TextField::BodyTextColor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TextField::GameTitle => "game_title",
            TextField::Tagline => "tagline",
            TextField::AboutText => "about_text",
            TextField::InstagramLink => "instagram_link",
            TextField::DeveloperLink => "developer_link",
            TextField::PressEmail => "press_email",
            TextField::BodyTextColor => "body_text_color",
        }
    }

    /// Value served before an admin has written the field.
    pub fn default_value(self) -> &'static str {
        match self {
            TextField::GameTitle => DEFAULT_GAME_TITLE,
            TextField::AboutText => DEFAULT_ABOUT_TEXT,
            TextField::BodyTextColor => DEFAULT_BODY_TEXT_COLOR,
            TextField::Tagline
            | TextField::InstagramLink
            | TextField::DeveloperLink
            | TextField::PressEmail => "",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TextField::GameTitle => "Game Title",
            TextField::Tagline => "Tagline",
            TextField::AboutText => "About Text",
            TextField::InstagramLink => "Instagram URL",
            TextField::DeveloperLink => "Developer Website",
            TextField::PressEmail => "Press Email",
            TextField::BodyTextColor => "Body Text Color",
        }
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown content field '{0}'")]
pub struct UnknownField(pub String);

impl FromStr for TextField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        TextField::ALL
            .into_iter()
            .find(|field| field.as_str() == normalized)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// One of the three values grouped under game details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailField {
    Genre,
    Platforms,
    ReleaseDate,
}

impl DetailField {
    pub const ALL: [DetailField; 3] = [
        DetailField::Genre,
        DetailField::Platforms,
        DetailField::ReleaseDate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DetailField::Genre => "Genre",
            DetailField::Platforms => "Platforms",
            DetailField::ReleaseDate => "Release Date",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDetails {
    pub genre: String,
    pub platforms: String,
    pub release_date: String,
}

impl GameDetails {
    pub fn get(&self, field: DetailField) -> &str {
        match field {
            DetailField::Genre => &self.genre,
            DetailField::Platforms => &self.platforms,
            DetailField::ReleaseDate => &self.release_date,
        }
    }

    /// Copy of `self` with a single detail replaced.
    pub fn with_field(&self, field: DetailField, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        let value = value.into();
        match field {
            DetailField::Genre => next.genre = value,
            DetailField::Platforms => next.platforms = value,
            DetailField::ReleaseDate => next.release_date = value,
        }
        next
    }
}

/// Every independently editable piece of site content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentField {
    Text(TextField),
    Features,
    Detail(DetailField),
}

impl ContentField {
    pub fn label(self) -> &'static str {
        match self {
            ContentField::Text(field) => field.label(),
            ContentField::Features => "Features",
            ContentField::Detail(field) => field.label(),
        }
    }
}

impl FromStr for ContentField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "title" => Ok(ContentField::Text(TextField::GameTitle)),
            "about" => Ok(ContentField::Text(TextField::AboutText)),
            "features" => Ok(ContentField::Features),
            "genre" => Ok(ContentField::Detail(DetailField::Genre)),
            "platforms" => Ok(ContentField::Detail(DetailField::Platforms)),
            "release_date" => Ok(ContentField::Detail(DetailField::ReleaseDate)),
            _ => normalized
                .parse::<TextField>()
                .map(ContentField::Text)
                .map_err(|_| UnknownField(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
}

/// Drops blank entries and caps the list at [`MAX_FEATURES`].
pub fn normalize_features<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items
        .iter()
        .map(AsRef::as_ref)
        .filter(|item| !item.trim().is_empty())
        .take(MAX_FEATURES)
        .map(str::to_string)
        .collect()
}

/// `#rrggbb` with exactly six hex digits.
pub fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit())
}
