// Configuration loading

pub mod settings;

pub use settings::{FillSettings, LogSettings, MatchSettings, Settings, SettingsError};
