use std::fs;
use std::io;
use std::path::Path;

use riftview_core::settings::ViewerSettings;
use tracing::{info, warn};

pub const SETTINGS_PATH: &str = "settings.toml";

pub fn load(path: &Path) -> io::Result<ViewerSettings> {
    let contents = fs::read_to_string(path)?;
    let parsed = toml::from_str::<ViewerSettings>(&contents).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("failed to deserialize settings: {e}"),
        )
    })?;
    Ok(parsed.sanitize())
}

pub fn save(settings: &ViewerSettings, path: &Path) -> io::Result<()> {
    let settings = settings.clone().sanitize();
    let serialized = toml::to_string_pretty(&settings).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("failed to serialize settings: {e}"),
        )
    })?;
    fs::write(path, serialized)
}

pub fn load_or_create_settings(path: &Path) -> ViewerSettings {
    match load(path) {
        Ok(settings) => {
            info!("Loaded settings from {}", path.display());
            settings
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let settings = ViewerSettings::default();
            if let Err(save_err) = save(&settings, path) {
                warn!(
                    "Failed to create default settings at {}: {save_err}",
                    path.display()
                );
            }
            settings
        }
        Err(err) => {
            warn!("Failed to load settings from {}: {err}", path.display());
            let settings = ViewerSettings::default();
            if let Err(save_err) = save(&settings, path) {
                warn!(
                    "Failed to overwrite settings at {}: {save_err}",
                    path.display()
                );
            }
            settings
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use riftview_core::pool::TargetResolution;
    use riftview_core::settings::ViewerSettings;

    use super::{load, load_or_create_settings, save};

    fn scratch_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "riftview-{}-{name}.toml",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let path = scratch_path("missing");

        let settings = load_or_create_settings(&path);

        assert_eq!(settings, ViewerSettings::default());
        assert_eq!(load(&path).unwrap(), ViewerSettings::default());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn partial_files_fill_defaults_and_clamp() {
        let path = scratch_path("partial");
        fs::write(
            &path,
            "recursion_depth = 40\nfov = 60.0\n\n[target_resolution]\nmode = \"scaled\"\nfactor = 0.5\n",
        )
        .unwrap();

        let settings = load(&path).unwrap();

        assert_eq!(settings.recursion_depth, 10);
        assert_eq!(settings.fov, 60.0);
        assert_eq!(settings.anisotropy, ViewerSettings::default().anisotropy);
        assert_eq!(
            settings.target_resolution,
            TargetResolution::Scaled { factor: 0.5 }
        );
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unreadable_file_is_replaced_with_defaults() {
        let path = scratch_path("garbage");
        fs::write(&path, "recursion_depth = \"deep\"").unwrap();

        let settings = load_or_create_settings(&path);

        assert_eq!(settings, ViewerSettings::default());
        assert_eq!(load(&path).unwrap(), ViewerSettings::default());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn saved_settings_reload_unchanged() {
        let path = scratch_path("roundtrip");
        let settings = ViewerSettings {
            recursion_depth: 5,
            anisotropy: 4,
            pool_size: 3,
            target_resolution: TargetResolution::Fixed {
                width: 512,
                height: 512,
            },
            ..ViewerSettings::default()
        };

        save(&settings, &path).unwrap();

        assert_eq!(load(&path).unwrap(), settings);
        fs::remove_file(&path).unwrap();
    }
}
