//! Local-shadow editors for content fields.
//!
//! Each editor keeps the last known backend value next to the user's local
//! copy. Saving is only possible while the two differ, and a failed save
//! puts the local copy back to the backend value.

use std::future::Future;

use shared::domain::{normalize_features, MAX_FEATURES};
use thiserror::Error;
use tracing::warn;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Unchanged,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("a save is already in progress")]
    InProgress,
    #[error(transparent)]
    Failed(#[from] ClientError),
}

/// Single text value with a dirty flag. Used for inputs and textareas.
#[derive(Debug, Clone)]
pub struct FieldEditor {
    label: String,
    multiline: bool,
    external: String,
    local: String,
    saving: bool,
}

impl FieldEditor {
    pub fn new(label: impl Into<String>, external: impl Into<String>) -> Self {
        let external = external.into();
        Self {
            label: label.into(),
            multiline: false,
            local: external.clone(),
            external,
            saving: false,
        }
    }

    pub fn multiline(label: impl Into<String>, external: impl Into<String>) -> Self {
        Self {
            multiline: true,
            ..Self::new(label, external)
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_multiline(&self) -> bool {
        self.multiline
    }

    pub fn value(&self) -> &str {
        &self.local
    }

    pub fn external(&self) -> &str {
        &self.external
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.local = value.into();
    }

    /// Adopts a freshly fetched backend value, replacing local edits.
    pub fn sync_external(&mut self, value: impl Into<String>) {
        self.external = value.into();
        self.local = self.external.clone();
    }

    pub fn is_dirty(&self) -> bool {
        self.local != self.external
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn can_save(&self) -> bool {
        self.is_dirty() && !self.saving
    }

    pub fn revert(&mut self) {
        self.local = self.external.clone();
    }

    /// Marks the editor as saving and hands back the value to persist.
    pub fn begin_save(&mut self) -> Result<Option<String>, SaveError> {
        if self.saving {
            return Err(SaveError::InProgress);
        }
        if !self.is_dirty() {
            return Ok(None);
        }
        self.saving = true;
        Ok(Some(self.local.clone()))
    }

    pub fn finish_save(&mut self, result: Result<(), ClientError>) -> Result<SaveOutcome, SaveError> {
        self.saving = false;
        match result {
            Ok(()) => {
                self.external = self.local.clone();
                Ok(SaveOutcome::Saved)
            }
            Err(err) => {
                warn!(field = %self.label, error = %err, "editor: save failed, reverting");
                self.revert();
                Err(SaveError::Failed(err))
            }
        }
    }

    pub async fn save<F, Fut>(&mut self, persist: F) -> Result<SaveOutcome, SaveError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<(), ClientError>>,
    {
        let Some(value) = self.begin_save()? else {
            return Ok(SaveOutcome::Unchanged);
        };
        let result = persist(value).await;
        self.finish_save(result)
    }
}

/// Click-to-edit wrapper around a [`FieldEditor`].
#[derive(Debug, Clone)]
pub struct InlineField {
    editor: FieldEditor,
    editing: bool,
    force_edit: bool,
}

impl InlineField {
    pub fn new(editor: FieldEditor) -> Self {
        Self {
            editor,
            editing: false,
            force_edit: false,
        }
    }

    /// Always shows the input, as on the dashboard forms.
    pub fn force_edit(editor: FieldEditor) -> Self {
        Self {
            editor,
            editing: true,
            force_edit: true,
        }
    }

    pub fn editor(&self) -> &FieldEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut FieldEditor {
        &mut self.editor
    }

    pub fn is_editing(&self) -> bool {
        self.editing || self.force_edit
    }

    pub fn begin(&mut self) {
        self.editing = true;
    }

    /// Escape: drop local edits.
    pub fn cancel(&mut self) {
        self.editor.revert();
        self.editing = self.force_edit;
    }

    pub async fn save<F, Fut>(&mut self, persist: F) -> Result<SaveOutcome, SaveError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<(), ClientError>>,
    {
        let outcome = self.editor.save(persist).await?;
        self.editing = self.force_edit;
        Ok(outcome)
    }
}

/// Editable list of at most [`MAX_FEATURES`] entries.
#[derive(Debug, Clone)]
pub struct FeaturesEditor {
    external: Vec<String>,
    items: Vec<String>,
    saving: bool,
}

impl FeaturesEditor {
    pub fn new(external: Vec<String>) -> Self {
        let external: Vec<String> = external.into_iter().take(MAX_FEATURES).collect();
        Self {
            items: external.clone(),
            external,
            saving: false,
        }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn can_add(&self) -> bool {
        self.items.len() < MAX_FEATURES
    }

    /// Appends an empty entry; refused once the list is full.
    pub fn add(&mut self) -> bool {
        if !self.can_add() {
            return false;
        }
        self.items.push(String::new());
        true
    }

    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.items.len() {
            return false;
        }
        self.items.remove(index);
        true
    }

    pub fn change(&mut self, index: usize, value: impl Into<String>) -> bool {
        match self.items.get_mut(index) {
            Some(item) => {
                *item = value.into();
                true
            }
            None => false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.items != self.external
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn can_save(&self) -> bool {
        self.is_dirty() && !self.saving
    }

    pub fn sync_external(&mut self, external: Vec<String>) {
        *self = Self::new(external);
    }

    pub async fn save<F, Fut>(&mut self, persist: F) -> Result<SaveOutcome, SaveError>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = Result<(), ClientError>>,
    {
        if self.saving {
            return Err(SaveError::InProgress);
        }
        if !self.is_dirty() {
            return Ok(SaveOutcome::Unchanged);
        }
        let cleaned = normalize_features(&self.items);
        self.saving = true;
        let result = persist(cleaned.clone()).await;
        self.saving = false;
        match result {
            Ok(()) => {
                self.external = cleaned.clone();
                self.items = cleaned;
                Ok(SaveOutcome::Saved)
            }
            Err(err) => {
                warn!(error = %err, "editor: features save failed, reverting");
                self.items = self.external.clone();
                Err(SaveError::Failed(err))
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/editor_tests.rs"]
mod tests;
