use std::path::PathBuf;

use tracing::debug;

/// File name of the durable configuration inside the config directory.
pub const CONFIG_FILENAME: &str = "hookbot.yml";

/// File name of the control pipe inside the config directory.
pub const PIPE_FILENAME: &str = "hookbot.ipc";

/// Returns the user-global config directory (`~/.config/hookbot/`).
///
/// Falls back to the current directory when no home directory can be
/// resolved (e.g. inside minimal containers).
pub fn config_dir() -> PathBuf {
    match directories::ProjectDirs::from("", "", "hookbot") {
        Some(dirs) => dirs.config_dir().to_path_buf(),
        None => {
            debug!("no home directory found, using current directory");
            PathBuf::from(".")
        },
    }
}

/// Default path of the durable configuration file.
pub fn default_config_file() -> PathBuf {
    config_dir().join(CONFIG_FILENAME)
}

/// Default path of the named control pipe.
pub fn default_pipe() -> PathBuf {
    config_dir().join(PIPE_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_share_a_directory() {
        let config = default_config_file();
        let pipe = default_pipe();
        assert_eq!(config.parent(), pipe.parent());
        assert!(config.ends_with(CONFIG_FILENAME));
        assert!(pipe.ends_with(PIPE_FILENAME));
    }
}
