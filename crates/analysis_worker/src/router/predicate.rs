use common::domain::{EventBatchExt, EventRecord, Environment};
use std::fmt;

/// Record variable carrying the id of the clicked input-form button
pub const INPUT_FORM_VARIABLE: &str = "input_form_button_id";
/// Metadata (or environment) key naming the dynamic-table row action
pub const WIDGET_EXEC_KEY: &str = "_widget_exec";
/// Environment key naming the widget that produced the batch
pub const DEVICE_LIST_KEY: &str = "_input_id";

/// Row action of a dynamic-table widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetAction {
    Edit,
    Delete,
}

impl WidgetAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetAction::Edit => "edit",
            WidgetAction::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "edit" => Some(WidgetAction::Edit),
            "delete" => Some(WidgetAction::Delete),
            _ => None,
        }
    }
}

/// Boolean test over a batch and its environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    InputForm(String),
    WidgetExec(WidgetAction),
    DeviceList(String),
    Variables(Vec<String>),
    VariablePrefix(String),
    Env { key: String, value: String },
}

impl Predicate {
    pub fn matches(&self, batch: &[EventRecord], env: &Environment) -> bool {
        match self {
            Predicate::InputForm(id) => batch
                .iter()
                .any(|r| r.variable == INPUT_FORM_VARIABLE && r.value_str() == Some(id.as_str())),
            Predicate::WidgetExec(action) => {
                let from_metadata = batch
                    .iter()
                    .filter_map(|r| r.metadata_str(WIDGET_EXEC_KEY))
                    .any(|v| WidgetAction::parse(v) == Some(*action));
                from_metadata
                    || env
                        .get(WIDGET_EXEC_KEY)
                        .and_then(WidgetAction::parse)
                        .is_some_and(|a| a == *action)
            }
            Predicate::DeviceList(id) => env.get(DEVICE_LIST_KEY) == Some(id.as_str()),
            Predicate::Variables(variables) => batch.has_any_variable(variables),
            Predicate::VariablePrefix(prefix) => {
                batch.iter().any(|r| r.variable.starts_with(prefix.as_str()))
            }
            Predicate::Env { key, value } => env.get(key) == Some(value.as_str()),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::InputForm(id) => write!(f, "input_form({})", id),
            Predicate::WidgetExec(action) => write!(f, "widget_exec({})", action.as_str()),
            Predicate::DeviceList(id) => write!(f, "device_list({})", id),
            Predicate::Variables(variables) => write!(f, "variables({})", variables.join(",")),
            Predicate::VariablePrefix(prefix) => write!(f, "variable_prefix({})", prefix),
            Predicate::Env { key, value } => write!(f, "env({}={})", key, value),
        }
    }
}
