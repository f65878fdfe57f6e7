pub mod preferences;
pub mod recent;

pub use preferences::{
    FilePreferences, MacroPreferences, Preferences, PreferencesError, PreferencesStore,
};
pub use recent::RecentProjects;
