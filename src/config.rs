use crate::error::ConfigError;
use nvenc::{BufferFormat, Codec, EncodePreset, RateControl, SessionConfig, TuningInfo};
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

const MAX_FPS: u32 = 240;
const MAX_QP: u8 = 51;

/// Settings of one capture run. Every field has a default so a config file only needs the
/// values it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Number of captured frames to encode before stopping.
    pub frame_count: u32,
    pub output: PathBuf,
    /// Target capture rate. `None` follows the display refresh rate.
    pub fps: Option<u32>,
    pub display_index: u32,
    pub gpu_ordinal: u32,
    pub codec: Codec,
    pub preset: EncodePreset,
    pub tuning: TuningInfo,
    pub rate_control: RateControl,
    pub lookahead_depth: u32,
    pub gop_length: Option<u32>,
    pub log_level: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            frame_count: 20,
            output: PathBuf::from("out.h264"),
            fps: Some(60),
            display_index: 0,
            gpu_ordinal: 0,
            codec: Codec::default(),
            preset: EncodePreset::default(),
            tuning: TuningInfo::default(),
            rate_control: RateControl::default(),
            lookahead_depth: 0,
            gop_length: None,
            log_level: "info".to_owned(),
        }
    }
}

impl CaptureConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CaptureConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Parse `[--config <file.json>] [frames] [output]`, without the program name. Positional
    /// values override the file.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut config_path = None;
        let mut positional = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args
                        .next()
                        .ok_or_else(|| ConfigError::Argument(arg.clone()))?;
                    config_path = Some(path);
                }
                flag if flag.starts_with('-') => return Err(ConfigError::Argument(arg)),
                _ => positional.push(arg),
            }
        }

        let mut config = match config_path {
            Some(path) => Self::from_file(&path)?,
            None => CaptureConfig::default(),
        };

        let mut positional = positional.into_iter();
        if let Some(frames) = positional.next() {
            config.frame_count = frames
                .parse()
                .map_err(|_| ConfigError::Argument(frames.clone()))?;
        }
        if let Some(output) = positional.next() {
            config.output = PathBuf::from(output);
        }
        if let Some(extra) = positional.next() {
            return Err(ConfigError::Argument(extra));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_count == 0 {
            return Err(ConfigError::Invalid {
                field: "frame_count",
                reason: "must be greater than 0".to_owned(),
            });
        }
        if let Some(fps) = self.fps {
            if fps == 0 || fps > MAX_FPS {
                return Err(ConfigError::Invalid {
                    field: "fps",
                    reason: format!("{fps} is outside 1..={MAX_FPS}"),
                });
            }
        }
        if let RateControl::ConstQp { qp } = self.rate_control {
            if qp > MAX_QP {
                return Err(ConfigError::Invalid {
                    field: "rate_control.qp",
                    reason: format!("{qp} is greater than {MAX_QP}"),
                });
            }
        }
        if let Some(0) = self.gop_length {
            return Err(ConfigError::Invalid {
                field: "gop_length",
                reason: "must be greater than 0".to_owned(),
            });
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<tracing::Level, ConfigError> {
        self.log_level.parse().map_err(|_| ConfigError::Invalid {
            field: "log_level",
            reason: format!("unknown level `{}`", self.log_level),
        })
    }

    /// Configured frame interval, if `fps` is set.
    pub fn frame_interval(&self) -> Option<Duration> {
        self.fps
            .map(|fps| Duration::from_secs_f64(1.0 / fps.max(1) as f64))
    }

    /// Encoder settings for a capture of `width`x`height` in `format`.
    pub fn session_config(&self, width: u32, height: u32, format: BufferFormat) -> SessionConfig {
        let mut session = SessionConfig::new(width, height, format);
        session.codec = self.codec;
        session.preset = self.preset;
        session.tuning = self.tuning;
        session.rate_control = self.rate_control;
        session.frame_rate_num = self.fps.unwrap_or(60);
        session.frame_rate_den = 1;
        session.lookahead_depth = self.lookahead_depth;
        session.gop_length = self.gop_length;
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn defaults() {
        let config = CaptureConfig::from_args(Vec::new()).unwrap();
        assert_eq!(config.frame_count, 20);
        assert_eq!(config.output, PathBuf::from("out.h264"));
        assert_eq!(config.frame_interval(), Some(Duration::from_secs_f64(1.0 / 60.0)));
        assert_eq!(config.log_level().unwrap(), tracing::Level::INFO);
    }

    #[test]
    fn positional_arguments() {
        let config = CaptureConfig::from_args(args(&["5", "capture.h264"])).unwrap();
        assert_eq!(config.frame_count, 5);
        assert_eq!(config.output, PathBuf::from("capture.h264"));
    }

    #[test]
    fn bad_arguments() {
        assert!(matches!(
            CaptureConfig::from_args(args(&["five"])),
            Err(ConfigError::Argument(_))
        ));
        assert!(matches!(
            CaptureConfig::from_args(args(&["--frames"])),
            Err(ConfigError::Argument(_))
        ));
        assert!(matches!(
            CaptureConfig::from_args(args(&["--config"])),
            Err(ConfigError::Argument(_))
        ));
        assert!(matches!(
            CaptureConfig::from_args(args(&["0"])),
            Err(ConfigError::Invalid {
                field: "frame_count",
                ..
            })
        ));
    }

    #[test]
    fn partial_json() {
        let config = CaptureConfig::from_json(
            r#"{
                "fps": null,
                "codec": "hevc",
                "preset": "p1",
                "rate_control": { "mode": "cbr", "bitrate": 10000000 },
                "gop_length": 120,
                "log_level": "debug"
            }"#,
        )
        .unwrap();
        assert_eq!(config.frame_interval(), None);
        assert_eq!(config.frame_count, 20);

        let session = config.session_config(2560, 1440, BufferFormat::Abgr10);
        assert_eq!(session.codec, Codec::Hevc);
        assert_eq!(session.preset, EncodePreset::P1);
        assert_eq!(session.rate_control, RateControl::Cbr { bitrate: 10_000_000 });
        assert_eq!(session.gop_length, Some(120));
        assert_eq!(session.frame_interval_p, 1);
        assert_eq!(session.frame_rate_num, 60);
    }

    #[test]
    fn out_of_range_values() {
        for json in [
            r#"{ "fps": 0 }"#,
            r#"{ "fps": 500 }"#,
            r#"{ "rate_control": { "mode": "const_qp", "qp": 52 } }"#,
            r#"{ "gop_length": 0 }"#,
            r#"{ "log_level": "loud" }"#,
        ] {
            assert!(
                matches!(
                    CaptureConfig::from_json(json),
                    Err(ConfigError::Invalid { .. })
                ),
                "{json}"
            );
        }
        assert!(matches!(
            CaptureConfig::from_json(r#"{ "frames": 3 }"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
