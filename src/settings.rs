use crate::transcript::char_to_byte_index;

/// Connection settings for the Azure OpenAI deployment.
///
/// All fields are free-form strings and none are validated; whatever is in
/// here when a send starts is what the request is built from. The defaults
/// are on-screen placeholders, not working values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "Azure OpenAI Endpoint".to_string(),
            api_key: "Azure OpenAI Key".to_string(),
            deployment: "gpt-35-turbo".to_string(),
            api_version: "2024-04-01-preview".to_string(),
        }
    }
}

/// The two fields the modal lets the user edit. Deployment and API version
/// come from the command line and are shown read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingsField {
    #[default]
    Endpoint,
    ApiKey,
}

/// Modal editor over the live [`Settings`].
///
/// Edits write straight through to the active settings, so a send started
/// while the modal is open already sees them. Save and Cancel therefore do
/// nothing beyond closing the modal; in particular Cancel does NOT revert
/// edits (see `test_cancel_keeps_edits`).
#[derive(Debug, Default)]
pub struct SettingsModal {
    open: bool,
    field: SettingsField,
    cursor: usize,
}

impl SettingsModal {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn field(&self) -> SettingsField {
        self.field
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Open the modal with focus on the endpoint field, cursor at the end.
    /// Field values are whatever the live settings hold; nothing is
    /// snapshotted or reset.
    pub fn open(&mut self, settings: &Settings) {
        self.open = true;
        self.field = SettingsField::Endpoint;
        self.cursor = self.field_text(settings).chars().count();
    }

    pub fn save(&mut self) {
        self.open = false;
    }

    pub fn cancel(&mut self) {
        self.open = false;
    }

    pub fn focus_next(&mut self, settings: &Settings) {
        self.field = match self.field {
            SettingsField::Endpoint => SettingsField::ApiKey,
            SettingsField::ApiKey => SettingsField::Endpoint,
        };
        self.cursor = self.field_text(settings).chars().count();
    }

    // Two fields, so cycling backwards is the same toggle.
    pub fn focus_prev(&mut self, settings: &Settings) {
        self.focus_next(settings);
    }

    pub fn field_text<'a>(&self, settings: &'a Settings) -> &'a str {
        match self.field {
            SettingsField::Endpoint => &settings.api_url,
            SettingsField::ApiKey => &settings.api_key,
        }
    }

    fn field_mut<'a>(&self, settings: &'a mut Settings) -> &'a mut String {
        match self.field {
            SettingsField::Endpoint => &mut settings.api_url,
            SettingsField::ApiKey => &mut settings.api_key,
        }
    }

    pub fn insert_char(&mut self, settings: &mut Settings, c: char) {
        let field = self.field_mut(settings);
        let byte_pos = char_to_byte_index(field, self.cursor);
        field.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self, settings: &mut Settings) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let field = self.field_mut(settings);
            let byte_pos = char_to_byte_index(field, self.cursor);
            field.remove(byte_pos);
        }
    }

    pub fn delete_forward(&mut self, settings: &mut Settings) {
        let field = self.field_mut(settings);
        if self.cursor < field.chars().count() {
            let byte_pos = char_to_byte_index(field, self.cursor);
            field.remove(byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self, settings: &Settings) {
        self.cursor = (self.cursor + 1).min(self.field_text(settings).chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self, settings: &Settings) {
        self.cursor = self.field_text(settings).chars().count();
    }
}
