//! Locating and loading the project for a command.

use std::fs;
use std::path::{Path, PathBuf};

use forge_config::{load_config, load_config_from_str, ProjectConfig, CONFIG_FILE_NAME};

use crate::GlobalArgs;

/// Walks up from `start` looking for a directory containing `forge.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE_NAME} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Loads the project selected by the global flags.
///
/// `--config` may name a configuration file (of any name; its directory
/// becomes the project directory) or a project directory. Without it, the
/// current directory and its parents are searched for `forge.toml`.
pub fn load_project(
    global: &GlobalArgs,
) -> Result<(PathBuf, ProjectConfig), Box<dyn std::error::Error>> {
    let Some(config_path) = &global.config else {
        let root = find_project_root(&std::env::current_dir()?)?;
        let config = load_config(&root)?;
        return Ok((root, config));
    };

    let path = std::path::absolute(config_path)?;
    if path.is_file() {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| format!("{} has no parent directory", path.display()))?;
        let content = fs::read_to_string(&path)?;
        Ok((dir, load_config_from_str(&content)?))
    } else {
        let config = load_config(&path)?;
        Ok((path, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PROJECT: &str = "[project]\nname = \"fomu\"\n";

    #[test]
    fn find_project_root_in_current_dir() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("forge.toml"), PROJECT).unwrap();
        let root = find_project_root(tmp.path()).unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn find_project_root_in_parent() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("forge.toml"), PROJECT).unwrap();
        let sub = tmp.path().join("gateware").join("rtl");
        fs::create_dir_all(&sub).unwrap();
        let root = find_project_root(&sub).unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn find_project_root_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = find_project_root(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("could not find forge.toml"));
    }

    #[test]
    fn config_flag_accepts_named_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("evt.toml");
        fs::write(&file, PROJECT).unwrap();
        let global = GlobalArgs {
            quiet: true,
            verbose: false,
            config: Some(file.display().to_string()),
        };
        let (dir, config) = load_project(&global).unwrap();
        assert_eq!(dir, tmp.path());
        assert_eq!(config.project.name, "fomu");
    }

    #[test]
    fn relative_config_flag_yields_absolute_project_dir() {
        let cwd = std::env::current_dir().unwrap();
        let tmp = tempfile::tempdir_in(&cwd).unwrap();
        fs::write(tmp.path().join("forge.toml"), PROJECT).unwrap();
        let relative = tmp.path().strip_prefix(&cwd).unwrap();

        for config in [relative.to_path_buf(), relative.join("forge.toml")] {
            let global = GlobalArgs {
                quiet: true,
                verbose: false,
                config: Some(config.display().to_string()),
            };
            let (dir, _) = load_project(&global).unwrap();
            assert!(dir.is_absolute());
            assert_eq!(dir, tmp.path());
        }
    }

    #[test]
    fn config_flag_accepts_directory() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("forge.toml"), PROJECT).unwrap();
        let global = GlobalArgs {
            quiet: true,
            verbose: false,
            config: Some(tmp.path().display().to_string()),
        };
        let (dir, _) = load_project(&global).unwrap();
        assert_eq!(dir, tmp.path());
    }
}
