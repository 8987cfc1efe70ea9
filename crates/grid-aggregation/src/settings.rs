//! Runtime settings for grid aggregations.

use notify::EventKind;
use serde::{Deserialize, Serialize};

/// Runtime settings shared by aggregations opened through one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationSettings {
    /// Watch aggregation files that do not set `watchFiles` themselves.
    pub watch_files_default: bool,

    /// Which change notifications on an aggregation file trigger a reload.
    ///
    /// A provider whose value differs from the process-wide registry's gets
    /// a registry of its own.
    pub reload_events: ReloadEvents,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            watch_files_default: false,
            reload_events: ReloadEvents::ModifyCreate,
        }
    }
}

impl AggregationSettings {
    /// Load settings from environment variables.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(val) = std::env::var("AGGREGATION_WATCH_FILES_DEFAULT") {
            settings.watch_files_default = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("AGGREGATION_RELOAD_EVENTS") {
            settings.reload_events = ReloadEvents::from_str(&val);
        }

        settings
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.watch_files_default && self.reload_events == ReloadEvents::None {
            return Err("watch_files_default is set but reload_events is none".to_string());
        }
        Ok(())
    }
}

/// Change notifications that count as a modification of an aggregation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReloadEvents {
    /// Never reload.
    None,
    /// In-place writes only.
    Modify,
    /// In-place writes and (re)creation, for editors that save by rename.
    ModifyCreate,
}

impl Default for ReloadEvents {
    fn default() -> Self {
        Self::ModifyCreate
    }
}

impl ReloadEvents {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => Self::None,
            "modify" => Self::Modify,
            _ => Self::ModifyCreate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Modify => "modify",
            Self::ModifyCreate => "modify_create",
        }
    }

    /// True when `kind` should trigger a reload.
    pub fn accepts(&self, kind: &EventKind) -> bool {
        match self {
            Self::None => false,
            Self::Modify => matches!(kind, EventKind::Modify(_)),
            Self::ModifyCreate => matches!(kind, EventKind::Modify(_) | EventKind::Create(_)),
        }
    }
}

impl std::fmt::Display for ReloadEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn test_defaults() {
        let settings = AggregationSettings::default();
        assert!(!settings.watch_files_default);
        assert_eq!(settings.reload_events, ReloadEvents::ModifyCreate);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_reload_events_filter() {
        let modify = EventKind::Modify(ModifyKind::Any);
        let create = EventKind::Create(CreateKind::File);
        let remove = EventKind::Remove(RemoveKind::File);

        assert!(ReloadEvents::Modify.accepts(&modify));
        assert!(!ReloadEvents::Modify.accepts(&create));
        assert!(ReloadEvents::ModifyCreate.accepts(&create));
        assert!(!ReloadEvents::ModifyCreate.accepts(&remove));
        assert!(!ReloadEvents::None.accepts(&modify));
    }

    #[test]
    fn test_reload_events_from_str() {
        assert_eq!(ReloadEvents::from_str("MODIFY"), ReloadEvents::Modify);
        assert_eq!(ReloadEvents::from_str("none"), ReloadEvents::None);
        assert_eq!(ReloadEvents::from_str("whatever"), ReloadEvents::ModifyCreate);
    }

    #[test]
    fn test_validate_rejects_contradiction() {
        let settings = AggregationSettings {
            watch_files_default: true,
            reload_events: ReloadEvents::None,
        };
        assert!(settings.validate().is_err());
    }
}
