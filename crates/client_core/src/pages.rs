use std::{fmt, str::FromStr, sync::Arc};

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use shared::{
    domain::{
        is_hex_color, ContentField, DetailField, GameDetails, Principal, TextField,
        DEFAULT_ABOUT_TEXT, DEFAULT_GAME_TITLE,
    },
    protocol::{AdminResult, UpdateContentResult},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    accessor::ContentAccessor,
    edit_mode::EditMode,
    editor::{FeaturesEditor, FieldEditor, SaveError, SaveOutcome},
    error::ClientError,
    password_gate::{GateState, PasswordGate},
    theme::Theme,
};

pub const LANDING_BLURB: &str = "A hand-drawn adventure game about curiosity, laundromats, and the art of poking things you probably shouldn't.";
pub const SCREENSHOTS: [&str; 6] = [
    "/assets/screen01.png",
    "/assets/screen02.png",
    "/assets/screen03.png",
    "/assets/screen04.png",
    "/assets/screen05.png",
    "/assets/screen06.png",
];
pub const TRAILER_VIDEO_ID: &str = "C-Q0-2kiFhs";
pub const MEDIA_ARCHIVE_PATH: &str = "/assets/PokeANose_MediaImages.zip";
pub const HEADER_PRINCIPAL_LEN: usize = 24;

pub fn trailer_embed_url() -> String {
    format!("https://www.youtube.com/embed/{TRAILER_VIDEO_ID}")
}

/// Maps a mutation result onto the editor's persist contract.
pub fn require_success(result: Result<UpdateContentResult>) -> Result<(), ClientError> {
    match result {
        Ok(UpdateContentResult::Success) => Ok(()),
        Ok(UpdateContentResult::NotAdmin) => Err(ClientError::NotAdmin),
        Err(err) => Err(ClientError::from_backend(err)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandingPage {
    pub title: String,
    pub tagline: String,
    pub blurb: String,
}

impl LandingPage {
    pub async fn load(accessor: &ContentAccessor) -> Result<Self> {
        let (title, tagline, about) = tokio::try_join!(
            accessor.game_title(),
            accessor.tagline(),
            accessor.about_text()
        )?;
        Ok(Self {
            title: display_title(&title),
            tagline,
            blurb: Self::blurb_for(&about),
        })
    }

    /// The about text, unless it is empty or still the backend default.
    pub fn blurb_for(about: &str) -> String {
        let trimmed = about.trim();
        if trimmed.is_empty() || trimmed == DEFAULT_ABOUT_TEXT {
            LANDING_BLURB.to_string()
        } else {
            about.to_string()
        }
    }
}

fn display_title(title: &str) -> String {
    if title.trim().is_empty() {
        DEFAULT_GAME_TITLE.to_string()
    } else {
        title.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressKitContent {
    pub title: String,
    pub tagline: String,
    pub about: String,
    pub features: Vec<String>,
    pub details: GameDetails,
    pub instagram_link: String,
    pub developer_link: String,
    pub press_email: String,
    pub body_text_color: Option<String>,
    pub show_social: bool,
    pub editing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressKitView {
    Locked { error: Option<String> },
    Content(Box<PressKitContent>),
}

pub struct PressKitPage {
    accessor: Arc<ContentAccessor>,
    gate: PasswordGate,
    edit_mode: EditMode,
}

impl PressKitPage {
    pub fn new(accessor: Arc<ContentAccessor>, edit_mode: EditMode) -> Self {
        Self {
            gate: PasswordGate::new(Arc::clone(&accessor)),
            accessor,
            edit_mode,
        }
    }

    pub fn gate(&self) -> &PasswordGate {
        &self.gate
    }

    pub fn edit_mode(&self) -> &EditMode {
        &self.edit_mode
    }

    pub async fn view(&self, theme: Theme) -> Result<PressKitView> {
        match self.gate.state().await {
            GateState::Open => self.content(theme).await,
            GateState::Locked { error } => Ok(PressKitView::Locked { error }),
        }
    }

    pub async fn unlock(&self, password: &SecretString, theme: Theme) -> Result<PressKitView> {
        match self.gate.verify(password).await {
            GateState::Open => self.content(theme).await,
            GateState::Locked { error } => Ok(PressKitView::Locked { error }),
        }
    }

    async fn content(&self, theme: Theme) -> Result<PressKitView> {
        let a = &self.accessor;
        let (title, tagline, about, features, details) = tokio::try_join!(
            a.game_title(),
            a.tagline(),
            a.about_text(),
            a.features(),
            a.game_details()
        )?;
        let (instagram_link, developer_link, press_email, color) = tokio::try_join!(
            a.instagram_link(),
            a.developer_link(),
            a.press_email(),
            a.body_text_color()
        )?;

        if self.edit_mode.is_enabled() {
            let still_admin = a.is_caller_admin().await.unwrap_or_else(|error| {
                warn!(%error, "press kit: caller role check failed, leaving edit mode");
                false
            });
            self.edit_mode.sync_with_role(still_admin);
        }
        let editing = self.edit_mode.is_enabled();
        Ok(PressKitView::Content(Box::new(PressKitContent {
            title: display_title(&title),
            tagline,
            about,
            features,
            details,
            show_social: !instagram_link.trim().is_empty() || editing,
            instagram_link,
            developer_link,
            press_email,
            body_text_color: theme.body_text_color(&color).map(str::to_string),
            editing,
        })))
    }

    pub async fn text_editor(&self, field: TextField) -> Result<FieldEditor> {
        let current = self.accessor.text(field).await?;
        Ok(match field {
            TextField::AboutText => FieldEditor::multiline(field.label(), current),
            _ => FieldEditor::new(field.label(), current),
        })
    }

    pub async fn detail_editor(&self, field: DetailField) -> Result<FieldEditor> {
        let details = self.accessor.game_details().await?;
        Ok(FieldEditor::new(field.label(), details.get(field)))
    }

    pub async fn features_editor(&self) -> Result<FeaturesEditor> {
        Ok(FeaturesEditor::new(self.accessor.features().await?))
    }

    pub async fn save_text(
        &self,
        field: TextField,
        editor: &mut FieldEditor,
    ) -> Result<SaveOutcome, SaveError> {
        let accessor = &self.accessor;
        editor
            .save(|value| async move { require_success(accessor.update_text(field, &value).await) })
            .await
    }

    /// Saves one detail merged into the current game details.
    pub async fn save_detail(
        &self,
        field: DetailField,
        editor: &mut FieldEditor,
    ) -> Result<SaveOutcome, SaveError> {
        let accessor = &self.accessor;
        editor
            .save(|value| async move {
                require_success(accessor.update_detail_field(field, &value).await)
            })
            .await
    }

    pub async fn save_features(
        &self,
        editor: &mut FeaturesEditor,
    ) -> Result<SaveOutcome, SaveError> {
        let accessor = &self.accessor;
        editor
            .save(|items| async move { require_success(accessor.update_features(&items).await) })
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardSection {
    Content,
    Media,
    Social,
    Settings,
}

impl DashboardSection {
    pub const ALL: [DashboardSection; 4] = [
        DashboardSection::Content,
        DashboardSection::Media,
        DashboardSection::Social,
        DashboardSection::Settings,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DashboardSection::Content => "Content",
            DashboardSection::Media => "Media",
            DashboardSection::Social => "Social",
            DashboardSection::Settings => "Settings",
        }
    }
}

impl fmt::Display for DashboardSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DashboardSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DashboardSection::ALL
            .into_iter()
            .find(|section| section.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown dashboard section '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardShell {
    pub principal: Principal,
    pub active: DashboardSection,
}

impl DashboardShell {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            active: DashboardSection::Content,
        }
    }

    pub fn header_label(&self) -> String {
        self.principal.abbreviated(HEADER_PRINCIPAL_LEN)
    }

    pub fn select(&mut self, section: DashboardSection) {
        self.active = section;
    }

    /// Fields edited under the active section.
    pub fn fields(&self) -> &'static [ContentField] {
        match self.active {
            DashboardSection::Content => &[
                ContentField::Text(TextField::GameTitle),
                ContentField::Text(TextField::Tagline),
                ContentField::Text(TextField::AboutText),
                ContentField::Features,
                ContentField::Detail(DetailField::Genre),
                ContentField::Detail(DetailField::Platforms),
                ContentField::Detail(DetailField::ReleaseDate),
            ],
            DashboardSection::Media => &[],
            DashboardSection::Social => &[
                ContentField::Text(TextField::InstagramLink),
                ContentField::Text(TextField::DeveloperLink),
                ContentField::Text(TextField::PressEmail),
            ],
            DashboardSection::Settings => &[ContentField::Text(TextField::BodyTextColor)],
        }
    }

    /// Current values for every field of the active section.
    pub async fn load_section(&self, accessor: &ContentAccessor) -> Result<Vec<DashboardEntry>> {
        let mut entries = Vec::with_capacity(self.fields().len());
        for &field in self.fields() {
            let value = match field {
                ContentField::Text(text) => EntryValue::Text(accessor.text(text).await?),
                ContentField::Features => EntryValue::List(accessor.features().await?),
                ContentField::Detail(detail) => {
                    EntryValue::Text(accessor.game_details().await?.get(detail).to_string())
                }
            };
            entries.push(DashboardEntry { field, value });
        }
        Ok(entries)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValue {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardEntry {
    pub field: ContentField,
    pub value: EntryValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swatch {
    pub name: &'static str,
    pub hex: &'static str,
}

pub const GRAYSCALE_SWATCHES: [Swatch; 6] = [
    Swatch { name: "Black", hex: "#0a0a0a" },
    Swatch { name: "Near Black", hex: "#1a1a1a" },
    Swatch { name: "Dark Gray", hex: "#333333" },
    Swatch { name: "Medium Gray", hex: "#555555" },
    Swatch { name: "Gray", hex: "#777777" },
    Swatch { name: "Light Gray", hex: "#999999" },
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("Access denied. Only the admin can change settings.")]
    NotAdmin,
    #[error("Please enter a password")]
    EmptyPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Enter a new password first")]
    MissingNewPassword,
    #[error("Please enter a valid hex color like #1a1a1a")]
    InvalidColor,
    #[error("{0}")]
    Backend(String),
}

impl From<anyhow::Error> for SettingsError {
    fn from(err: anyhow::Error) -> Self {
        SettingsError::Backend(ClientError::from_backend(err).to_string())
    }
}

fn admin_result(result: AdminResult) -> Result<(), SettingsError> {
    match result {
        AdminResult::Success => Ok(()),
        AdminResult::Error(message) => Err(SettingsError::Backend(message)),
    }
}

/// Admin-only site settings: password protection and body text color.
pub struct SettingsPage {
    accessor: Arc<ContentAccessor>,
}

impl SettingsPage {
    pub fn new(accessor: Arc<ContentAccessor>) -> Self {
        Self { accessor }
    }

    pub async fn ensure_admin(&self) -> Result<(), SettingsError> {
        if self.accessor.is_caller_admin().await? {
            Ok(())
        } else {
            Err(SettingsError::NotAdmin)
        }
    }

    pub async fn protection_enabled(&self) -> Result<bool, SettingsError> {
        Ok(self.accessor.password_protection_enabled().await?)
    }

    pub async fn enable_protection(
        &self,
        password: &SecretString,
        confirm: &SecretString,
    ) -> Result<(), SettingsError> {
        if password.expose_secret().trim().is_empty() {
            return Err(SettingsError::EmptyPassword);
        }
        if password.expose_secret() != confirm.expose_secret() {
            return Err(SettingsError::PasswordMismatch);
        }
        self.ensure_admin().await?;
        admin_result(
            self.accessor
                .enable_password_protection(password.expose_secret())
                .await?,
        )?;
        info!("settings: password protection enabled");
        Ok(())
    }

    pub async fn disable_protection(&self) -> Result<(), SettingsError> {
        self.ensure_admin().await?;
        admin_result(self.accessor.disable_password_protection().await?)?;
        info!("settings: password protection disabled");
        Ok(())
    }

    /// Replaces the password by disabling protection and enabling it again.
    pub async fn update_password(&self, new_password: &SecretString) -> Result<(), SettingsError> {
        if new_password.expose_secret().trim().is_empty() {
            return Err(SettingsError::MissingNewPassword);
        }
        self.ensure_admin().await?;
        admin_result(self.accessor.disable_password_protection().await?)?;
        admin_result(
            self.accessor
                .enable_password_protection(new_password.expose_secret())
                .await?,
        )?;
        info!("settings: password updated");
        Ok(())
    }

    pub async fn body_text_color(&self) -> Result<String, SettingsError> {
        Ok(self.accessor.body_text_color().await?)
    }

    /// Accepts a swatch name or a custom `#rrggbb` value.
    pub async fn set_body_text_color(&self, choice: &str) -> Result<String, SettingsError> {
        let choice = choice.trim();
        let hex = GRAYSCALE_SWATCHES
            .iter()
            .find(|swatch| swatch.name.eq_ignore_ascii_case(choice))
            .map(|swatch| swatch.hex.to_string())
            .unwrap_or_else(|| choice.to_string());
        if !is_hex_color(&hex) {
            return Err(SettingsError::InvalidColor);
        }
        self.ensure_admin().await?;
        match self
            .accessor
            .update_text(TextField::BodyTextColor, &hex)
            .await?
        {
            UpdateContentResult::Success => Ok(hex),
            UpdateContentResult::NotAdmin => Err(SettingsError::NotAdmin),
        }
    }
}

#[cfg(test)]
#[path = "tests/pages_tests.rs"]
mod tests;
