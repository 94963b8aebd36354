//! Application of user-supplied `NAME=VALUE` settings against the option
//! descriptors the engine advertised during the handshake.
//!
//! Rejected values are never fatal: they are logged and the setting is
//! skipped, matching how a misconfigured engine option should degrade.

use log::warn;
use vampirc_uci::UciOptionConfig;

pub fn option_name(option: &UciOptionConfig) -> &str {
    match option {
        UciOptionConfig::Check { name, .. } => name,
        UciOptionConfig::Spin { name, .. } => name,
        UciOptionConfig::Combo { name, .. } => name,
        UciOptionConfig::Button { name } => name,
        UciOptionConfig::String { name, .. } => name,
    }
}

pub fn find<'a>(options: &'a [UciOptionConfig], name: &str) -> Option<&'a UciOptionConfig> {
    options
        .iter()
        .find(|option| option_name(option).eq_ignore_ascii_case(name))
}

/// Builds the `setoption` command for one user setting, validating the value
/// against the engine's descriptor. Spin values out of range are clamped;
/// anything else invalid is dropped with a warning.
pub fn setoption_command(
    options: &[UciOptionConfig],
    name: &str,
    value: &str,
) -> Option<String> {
    let Some(option) = find(options, name) else {
        warn!("engine does not support option \"{name}\", ignoring");
        return None;
    };
    match option {
        UciOptionConfig::Button { name } => Some(format!("setoption name {name}\n")),
        UciOptionConfig::Check { name, .. } => {
            if value == "true" || value == "false" {
                Some(format!("setoption name {name} value {value}\n"))
            } else {
                warn!("option \"{name}\" wants true or false, got \"{value}\"; ignoring");
                None
            }
        }
        UciOptionConfig::Spin { name, min, max, .. } => {
            let Ok(parsed) = value.parse::<i64>() else {
                warn!("option \"{name}\" wants a number, got \"{value}\"; ignoring");
                return None;
            };
            let mut clamped = parsed;
            if let Some(lo) = min {
                clamped = clamped.max(*lo);
            }
            if let Some(hi) = max {
                clamped = clamped.min(*hi);
            }
            if clamped != parsed {
                warn!("option \"{name}\" value {parsed} out of range, clamped to {clamped}");
            }
            Some(format!("setoption name {name} value {clamped}\n"))
        }
        UciOptionConfig::Combo { name, var, .. } => {
            if var.iter().any(|allowed| allowed == value) {
                Some(format!("setoption name {name} value {value}\n"))
            } else {
                warn!("option \"{name}\" does not allow \"{value}\"; ignoring");
                None
            }
        }
        UciOptionConfig::String { name, .. } => {
            Some(format!("setoption name {name} value {value}\n"))
        }
    }
}
