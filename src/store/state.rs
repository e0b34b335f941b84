use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Persisted TUI state (written to .state.json in the data directory).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UiState {
    /// Query string the grid was last running.
    #[serde(default)]
    pub last_query: Option<String>,
    /// "table" or "kanban".
    #[serde(default)]
    pub last_view: Option<String>,
}

/// A named view bundle: enough to rebuild a grid the way the user saved it.
/// The serialized shape is an implementation detail, not a contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewBundle {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub columns: Vec<String>,
    /// `field+` / `field-`, matching the query language's sort items.
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ViewFile {
    #[serde(default)]
    pub views: IndexMap<String, ViewBundle>,
}

pub fn read_ui_state(data_dir: &Path) -> Option<UiState> {
    let content = fs::read_to_string(data_dir.join(".state.json")).ok()?;
    serde_json::from_str(&content).ok()
}

pub fn write_ui_state(data_dir: &Path, state: &UiState) -> Result<(), std::io::Error> {
    let content = serde_json::to_string_pretty(state)?;
    fs::write(data_dir.join(".state.json"), content)
}

pub fn read_views(data_dir: &Path) -> ViewFile {
    fs::read_to_string(data_dir.join("views.json"))
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}

pub fn write_views(data_dir: &Path, views: &ViewFile) -> Result<(), std::io::Error> {
    let content = serde_json::to_string_pretty(views)?;
    fs::write(data_dir.join("views.json"), content)
}

/// Insert or replace one bundle and persist the registry.
pub fn save_view(data_dir: &Path, bundle: ViewBundle) -> Result<(), std::io::Error> {
    let mut file = read_views(data_dir);
    file.views.insert(bundle.name.clone(), bundle);
    write_views(data_dir, &file)
}
