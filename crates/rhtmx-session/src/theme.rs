// File: src/theme.rs
// Purpose: Theme values and the light/dark selection made at bootstrap

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named set of CSS variables sent to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub variables: BTreeMap<String, String>,
}

impl Theme {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn light() -> Self {
        Self::new("light")
            .with_variable("--rhtmx-background", "#ffffff")
            .with_variable("--rhtmx-foreground", "#1a1a1a")
            .with_variable("--rhtmx-primary", "#2563eb")
    }

    pub fn dark() -> Self {
        Self::new("dark")
            .with_variable("--rhtmx-background", "#111318")
            .with_variable("--rhtmx-foreground", "#e6e6e6")
            .with_variable("--rhtmx-primary", "#60a5fa")
    }
}

/// Theme configured on the app: one theme, or a pair chosen per client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeConfig {
    Single(Theme),
    /// `(light, dark)`
    LightDark(Theme, Theme),
}

impl ThemeConfig {
    /// Picks the theme for a client
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_session::{Theme, ThemeConfig};
    ///
    /// let config = ThemeConfig::LightDark(Theme::light(), Theme::dark());
    /// assert_eq!(config.resolve(false).name, "dark");
    /// assert_eq!(config.resolve(true).name, "light");
    /// ```
    pub fn resolve(&self, prefers_light: bool) -> &Theme {
        match self {
            Self::Single(theme) => theme,
            Self::LightDark(light, _) if prefers_light => light,
            Self::LightDark(_, dark) => dark,
        }
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self::LightDark(Theme::light(), Theme::dark())
    }
}
