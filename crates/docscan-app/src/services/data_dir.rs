// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Config file location.

use std::ffi::OsString;
use std::path::PathBuf;

/// `$XDG_CONFIG_HOME/docscan/config.json`, falling back to
/// `~/.config/docscan/config.json`.
pub fn default_config_path() -> PathBuf {
    config_dir_from(
        std::env::var_os("XDG_CONFIG_HOME"),
        std::env::var_os("HOME"),
    )
    .join("config.json")
}

fn config_dir_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> PathBuf {
    let base = match (xdg_config_home, home) {
        (Some(xdg), _) if !xdg.is_empty() => PathBuf::from(xdg),
        (_, Some(home)) => PathBuf::from(home).join(".config"),
        // Last resort
        _ => PathBuf::from("."),
    };
    base.join("docscan")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xdg_config_home_wins() {
        let dir = config_dir_from(Some("/xdg".into()), Some("/home/ana".into()));
        assert_eq!(dir, PathBuf::from("/xdg/docscan"));
    }

    #[test]
    fn empty_xdg_falls_back_to_home() {
        let dir = config_dir_from(Some("".into()), Some("/home/ana".into()));
        assert_eq!(dir, PathBuf::from("/home/ana/.config/docscan"));
    }

    #[test]
    fn no_environment_uses_working_directory() {
        assert_eq!(config_dir_from(None, None), PathBuf::from("./docscan"));
    }
}
