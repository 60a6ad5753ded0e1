//! Systemd unit generation.

use super::template::{LAUNCH_SCRIPT_TOKEN, UnitPaths, substitute_placeholders};
use crate::config::ServiceUnitSpec;

const DEFAULT_WANTED_BY: &str = "multi-user.target";

/// Render the unit file for `spec`. Placeholders in every field are replaced
/// by the resolved absolute paths.
pub fn render_unit(spec: &ServiceUnitSpec, short_name: &str, paths: &UnitPaths<'_>) -> String {
    let sub = |value: &str| substitute_placeholders(value, paths);
    let mut content = String::with_capacity(1024);

    content.push_str("[Unit]\n");
    let description = spec.description.as_deref().unwrap_or(short_name);
    content.push_str(&format!("Description={}\n", sub(description)));
    if let Some(after) = &spec.after {
        content.push_str(&format!("After={}\n", sub(after)));
    }
    if let Some(burst) = spec.start_limit_burst {
        content.push_str(&format!("StartLimitBurst={burst}\n"));
    }
    if let Some(interval) = spec.start_limit_interval_sec {
        content.push_str(&format!("StartLimitIntervalSec={interval}\n"));
    }

    content.push_str("\n[Install]\n");
    let wanted_by = spec.wanted_by.as_deref().unwrap_or(DEFAULT_WANTED_BY);
    content.push_str(&format!("WantedBy={wanted_by}\n"));
    if let Some(alias) = &spec.alias {
        content.push_str(&format!("Alias={alias}\n"));
    }

    content.push_str("\n[Service]\n");
    if let Some(kind) = &spec.service_type {
        content.push_str(&format!("Type={kind}\n"));
    }
    for command in &spec.exec_start_pre {
        content.push_str(&format!("ExecStartPre={}\n", sub(command)));
    }
    if let Some(dir) = &spec.working_directory {
        content.push_str(&format!("WorkingDirectory={}\n", sub(dir)));
    }
    if let Some(user) = &spec.user {
        content.push_str(&format!("User={user}\n"));
    }
    if let Some(group) = &spec.group {
        content.push_str(&format!("Group={group}\n"));
    }
    for variable in &spec.environment {
        content.push_str(&format!("Environment={}\n", sub(variable)));
    }
    if spec.exec_start.is_empty() {
        content.push_str(&format!(
            "ExecStart={}\n",
            sub(&format!("{LAUNCH_SCRIPT_TOKEN} ---background"))
        ));
    } else {
        for command in &spec.exec_start {
            content.push_str(&format!("ExecStart={}\n", sub(command)));
        }
    }
    for command in &spec.exec_start_post {
        content.push_str(&format!("ExecStartPost={}\n", sub(command)));
    }
    if let Some(stop) = &spec.exec_stop {
        content.push_str(&format!("ExecStop={}\n", sub(stop)));
    }
    if let Some(timeout) = spec.timeout_sec {
        content.push_str(&format!("TimeoutSec={timeout}\n"));
    }
    if let Some(restart) = &spec.restart {
        content.push_str(&format!("Restart={restart}\n"));
    }
    if let Some(delay) = spec.restart_sec {
        content.push_str(&format!("RestartSec={delay}\n"));
    }

    content
}

/// Unit file name for `short_name`.
pub fn unit_file_name(short_name: &str) -> String {
    format!("{short_name}.service")
}
