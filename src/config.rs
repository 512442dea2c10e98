// config.rs - 配置加载：CLI > 配置文件 > 默认值
//
// 配置文件查找顺序：
// 1) --config <file>
// 2) <exe_dir>/viewer.json
// 3) ./viewer.json
// 都不存在时使用默认值。

use crate::error::ViewerError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "viewer.json";

#[derive(Parser, Debug, Default)]
#[command(name = "model_viewer")]
#[command(about = "glTF model viewer with HDR environment lighting")]
pub struct Cli {
    /// Path to a .gltf or .glb model
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Path to an equirectangular .hdr environment map
    #[arg(long)]
    pub environment: Option<PathBuf>,

    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Chromatic shift intensity of the post pass
    #[arg(long)]
    pub rgb_shift: Option<f32>,

    /// Drop environment lighting while the background is hidden
    #[arg(long)]
    pub drop_environment_when_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Model Viewer".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    /// Orbit distance while the background is hidden.
    pub default_distance: f32,
    /// Orbit distance while the background is visible.
    pub background_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 75.0,
            near: 0.1,
            far: 100.0,
            default_distance: 2.0,
            background_distance: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub enable_pan: bool,
    pub enable_zoom: bool,
    pub auto_rotate_speed: f32,
    pub background_auto_rotate_speed: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.14,
            enable_pan: true,
            enable_zoom: true,
            auto_rotate_speed: 5.0,
            background_auto_rotate_speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// 指针偏移缩放（相对视口中心）
    pub pointer_scale: f32,
    pub rotation_range_deg: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            pointer_scale: 0.6,
            rotation_range_deg: 90.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostConfig {
    pub rgb_shift_amount: f32,
    pub rgb_shift_angle: f32,
    pub exposure: f32,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            rgb_shift_amount: 0.0015,
            rgb_shift_angle: 0.0,
            exposure: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Keep image-based lighting on while the skybox is hidden.
    pub keep_lighting_when_hidden: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            keep_lighting_when_hidden: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub toggle_rotation: String,
    pub toggle_background: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            toggle_rotation: "R".to_string(),
            toggle_background: "B".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub model_path: PathBuf,
    pub environment_path: PathBuf,
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub interaction: InteractionConfig,
    pub post: PostConfig,
    pub environment: EnvironmentConfig,
    pub keys: KeyConfig,
    /// 超时只记录日志，不会中断加载
    pub load_timeout_secs: Option<u64>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("DamagedHelmet.gltf"),
            environment_path: PathBuf::from("photostudio_4k.hdr"),
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            interaction: InteractionConfig::default(),
            post: PostConfig::default(),
            environment: EnvironmentConfig::default(),
            keys: KeyConfig::default(),
            load_timeout_secs: None,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self, ViewerError> {
        let text = std::fs::read_to_string(path).map_err(|e| ViewerError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| ViewerError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the effective config for this run.
    pub fn resolve(cli: &Cli) -> Result<Self, ViewerError> {
        let mut config = match cli.config.as_deref() {
            Some(path) => Self::load(path)?,
            None => match find_config_file() {
                Some(path) => {
                    log::info!("using config {}", path.display());
                    Self::load(&path)?
                }
                None => Self::default(),
            },
        };
        config.apply_cli(cli);
        Ok(config)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(model) = &cli.model {
            self.model_path = model.clone();
        }
        if let Some(environment) = &cli.environment {
            self.environment_path = environment.clone();
        }
        if let Some(amount) = cli.rgb_shift {
            self.post.rgb_shift_amount = amount;
        }
        if cli.drop_environment_when_hidden {
            self.environment.keep_lighting_when_hidden = false;
        }
    }
}

fn find_config_file() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let p = dir.join(CONFIG_FILE_NAME);
            if p.exists() {
                return Some(p);
            }
        }
    }

    let p = PathBuf::from(CONFIG_FILE_NAME);
    if p.exists() {
        return Some(p);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ViewerConfig =
            serde_json::from_str(r#"{ "camera": { "default_distance": 3.0 } }"#).unwrap();
        assert_eq!(config.camera.default_distance, 3.0);
        assert_eq!(config.camera.fov_deg, 75.0);
        assert_eq!(config.controls.damping_factor, 0.14);
        assert_eq!(config.post.rgb_shift_amount, 0.0015);
        assert!(config.environment.keep_lighting_when_hidden);
    }

    #[test]
    fn load_reads_file_and_reports_bad_json() {
        let mut good = tempfile::NamedTempFile::new().unwrap();
        write!(good, r#"{{ "model_path": "Box.glb", "load_timeout_secs": 30 }}"#).unwrap();
        let config = ViewerConfig::load(good.path()).unwrap();
        assert_eq!(config.model_path, PathBuf::from("Box.glb"));
        assert_eq!(config.load_timeout_secs, Some(30));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "{{ not json").unwrap();
        assert!(matches!(
            ViewerConfig::load(bad.path()),
            Err(ViewerError::Config { .. })
        ));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/viewer.json")),
            ..Default::default()
        };
        assert!(matches!(ViewerConfig::resolve(&cli), Err(ViewerError::Io { .. })));
    }

    #[test]
    fn cli_overrides_file_values() {
        let cli = Cli::parse_from([
            "model_viewer",
            "--model",
            "Fox.glb",
            "--environment",
            "sky.hdr",
            "--rgb-shift",
            "0.01",
            "--drop-environment-when-hidden",
        ]);
        let mut config = ViewerConfig::default();
        config.apply_cli(&cli);
        assert_eq!(config.model_path, PathBuf::from("Fox.glb"));
        assert_eq!(config.environment_path, PathBuf::from("sky.hdr"));
        assert_eq!(config.post.rgb_shift_amount, 0.01);
        assert!(!config.environment.keep_lighting_when_hidden);
    }
}
