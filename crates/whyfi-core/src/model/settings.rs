use secrecy::SecretString;

/// User settings persisted through a [`SettingsStore`](crate::ports::SettingsStore).
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Credential for the completion service.
    pub api_key: Option<SecretString>,
}

impl Settings {
    pub fn with_api_key(key: SecretString) -> Self {
        Self { api_key: Some(key) }
    }

    pub fn has_api_key(&self) -> bool {
        use secrecy::ExposeSecret;
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
    }
}
