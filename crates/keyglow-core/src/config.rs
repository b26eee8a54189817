//! Configuration file support for keyglow
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/keyglow/config.toml`
//! - macOS: `~/Library/Application Support/keyglow/config.toml`
//! - Windows: `%APPDATA%\keyglow\config.toml`

use crate::color::Rgb;
use crate::error::{Error, Result};
use crate::geometry::{KeyboardLayout, LabelOptions};
use crate::stage::DEFAULT_HIGHLIGHT;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Key sizes and octave range
    pub keyboard: KeyboardSettings,
    /// Key label decorations
    pub labels: LabelSettings,
    /// Colours
    pub theme: Theme,
    /// Frame export settings
    pub export: ExportSettings,
    /// JACK MIDI output
    pub audio: AudioSettings,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.keyboard.layout().validate()?;
        Ok(config)
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Using default configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the default config file location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "keyglow") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, DEFAULT_CONFIG)?;
        Ok(path)
    }

    /// Keyboard layout for the geometry generator
    pub fn layout(&self) -> KeyboardLayout {
        self.keyboard.layout()
    }

    /// Label decorations for the geometry generator
    pub fn label_options(&self) -> LabelOptions {
        self.labels.options()
    }
}

const DEFAULT_CONFIG: &str = r##"# keyglow configuration file

[keyboard]
# Key sizes in pixels
white_width = 24.0
white_height = 120.0
black_width = 14.0
black_height = 75.0

# Keep black keys proportional when resizing white keys
link_sizes = true

# Leftmost octave (C3) and number of octaves
start_octave = 3
octave_count = 5

[labels]
# Print pitch names on the keys
show = false
# Only label the C of every octave
root_only = false
font_size = 12.0

[theme]
highlight_color = "#FF4DAC"
background_color = "#FFFFFF"

[export]
# Frames per second
frame_rate = 30
# "png" or "svg"
format = "png"
output = "keyboard-frames.tar"

[audio]
# JACK client name
client_name = "keyglow"
# MIDI output port name
port_name = "midi_out"
# MIDI channel (0-15)
channel = 0
# Auto-connect to these JACK MIDI inputs (optional)
# auto_connect = ["fluidsynth:midi_00"]
"##;

/// Key sizes and octave range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardSettings {
    pub white_width: f32,
    pub white_height: f32,
    pub black_width: f32,
    pub black_height: f32,
    /// Keep black keys proportional when resizing white keys
    pub link_sizes: bool,
    pub start_octave: i32,
    pub octave_count: u32,
}

impl Default for KeyboardSettings {
    fn default() -> Self {
        let layout = KeyboardLayout::default();
        Self {
            white_width: layout.white_width,
            white_height: layout.white_height,
            black_width: layout.black_width,
            black_height: layout.black_height,
            link_sizes: true,
            start_octave: layout.start_octave,
            octave_count: layout.octave_count,
        }
    }
}

impl KeyboardSettings {
    pub fn layout(&self) -> KeyboardLayout {
        KeyboardLayout {
            white_width: self.white_width,
            white_height: self.white_height,
            black_width: self.black_width,
            black_height: self.black_height,
            start_octave: self.start_octave,
            octave_count: self.octave_count,
        }
    }

    /// Resize the white keys. With `link_sizes` on, black keys follow at
    /// their current proportion (rounded to whole pixels).
    pub fn set_white_size(&mut self, width: f32, height: f32) {
        if self.link_sizes && self.white_width > 0.0 && self.white_height > 0.0 {
            let width_ratio = self.black_width / self.white_width;
            let height_ratio = self.black_height / self.white_height;
            self.black_width = (width * width_ratio).round();
            self.black_height = (height * height_ratio).round();
        }
        self.white_width = width;
        self.white_height = height;
    }
}

/// Key label decorations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelSettings {
    pub show: bool,
    pub root_only: bool,
    pub font_size: f32,
}

impl Default for LabelSettings {
    fn default() -> Self {
        let options = LabelOptions::default();
        Self {
            show: options.visible,
            root_only: options.root_only,
            font_size: options.font_size,
        }
    }
}

impl LabelSettings {
    /// `root_only` has no effect while labels are hidden.
    pub fn options(&self) -> LabelOptions {
        LabelOptions {
            visible: self.show,
            root_only: self.show && self.root_only,
            font_size: self.font_size,
        }
    }
}

/// Colours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    /// Fill of lit keys
    pub highlight_color: Rgb,
    /// Canvas behind the keys in raster frames
    pub background_color: Rgb,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            highlight_color: DEFAULT_HIGHLIGHT,
            background_color: Rgb::new(0xFF, 0xFF, 0xFF),
        }
    }
}

/// Image encoding of exported frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    Png,
    Svg,
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl std::str::FromStr for FrameFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            other => Err(format!("unknown frame format '{}', expected png or svg", other)),
        }
    }
}

/// Frame export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Frames per second
    pub frame_rate: u32,
    pub format: FrameFormat,
    /// Archive written on completion
    pub output: PathBuf,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            format: FrameFormat::Png,
            output: PathBuf::from("keyboard-frames.tar"),
        }
    }
}

/// JACK MIDI output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// JACK client name
    pub client_name: String,
    /// MIDI output port name
    pub port_name: String,
    /// MIDI channel (0-15)
    pub channel: u8,
    /// Auto-connect to these JACK MIDI inputs
    pub auto_connect: Option<Vec<String>>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            client_name: "keyglow".to_string(),
            port_name: "midi_out".to_string(),
            channel: 0,
            auto_connect: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.keyboard.start_octave, 3);
        assert_eq!(config.keyboard.octave_count, 5);
        assert_eq!(config.export.frame_rate, 30);
        assert_eq!(config.theme.highlight_color, DEFAULT_HIGHLIGHT);
    }

    #[test]
    fn test_default_file_matches_defaults() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("[theme]\nhighlight_color = \"#00ff00\"\n").unwrap();
        assert_eq!(parsed.theme.highlight_color, Rgb::new(0, 0xFF, 0));
        assert_eq!(parsed.keyboard, KeyboardSettings::default());
    }

    #[test]
    fn test_bad_colour_is_rejected() {
        assert!(toml::from_str::<Config>("[theme]\nhighlight_color = \"pink\"\n").is_err());
    }

    #[test]
    fn test_linked_resize() {
        let mut keyboard = KeyboardSettings {
            white_width: 20.0,
            white_height: 100.0,
            black_width: 10.0,
            black_height: 60.0,
            ..KeyboardSettings::default()
        };
        keyboard.set_white_size(30.0, 150.0);
        assert_eq!(keyboard.black_width, 15.0);
        assert_eq!(keyboard.black_height, 90.0);

        keyboard.link_sizes = false;
        keyboard.set_white_size(40.0, 150.0);
        assert_eq!(keyboard.black_width, 15.0);
    }

    #[test]
    fn test_root_only_requires_visible_labels() {
        let labels = LabelSettings {
            show: false,
            root_only: true,
            font_size: 10.0,
        };
        assert!(!labels.options().root_only);
    }

    #[test]
    fn test_save_and_load_from() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.export.frame_rate = 24;
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_invalid_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[keyboard]\noctave_count = 0\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(Error::InvalidGeometry(_))
        ));
    }
}
