//! Audio transcoding through an ffmpeg subprocess.
//!
//! The converter takes a declarative [`AudioFormat`] descriptor and maps
//! it onto ffmpeg arguments. A failed conversion gives no guarantee about
//! the state of the output path; callers must not reference it.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Target audio profile, supplied to the converter per call. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFormat {
    /// Container format: "wav" or "mp3".
    pub format: String,
    pub channels: u32,
    pub sample_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
}

/// Named target profiles. `Telephony` is the default pipeline target;
/// the others exist for manual re-conversion and are not on the primary
/// generation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatPreset {
    #[serde(rename = "3cx")]
    Telephony,
    #[serde(rename = "voip_standard")]
    VoipStandard,
    #[serde(rename = "high_quality")]
    HighQuality,
    #[serde(rename = "web_streaming")]
    WebStreaming,
}

impl FormatPreset {
    pub fn format(&self) -> AudioFormat {
        match self {
            FormatPreset::Telephony => AudioFormat {
                format: "wav".to_string(),
                channels: 1,
                sample_rate: 8_000,
                bit_depth: Some(16),
                codec: None,
            },
            FormatPreset::VoipStandard => AudioFormat {
                format: "wav".to_string(),
                channels: 1,
                sample_rate: 16_000,
                bit_depth: Some(16),
                codec: None,
            },
            FormatPreset::HighQuality => AudioFormat {
                format: "mp3".to_string(),
                channels: 2,
                sample_rate: 48_000,
                bit_depth: None,
                codec: Some("libmp3lame".to_string()),
            },
            FormatPreset::WebStreaming => AudioFormat {
                format: "mp3".to_string(),
                channels: 1,
                sample_rate: 24_000,
                bit_depth: None,
                codec: Some("libmp3lame".to_string()),
            },
        }
    }
}

impl FromStr for FormatPreset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "3cx" | "telephony" => Ok(FormatPreset::Telephony),
            "voip_standard" => Ok(FormatPreset::VoipStandard),
            "high_quality" => Ok(FormatPreset::HighQuality),
            "web_streaming" => Ok(FormatPreset::WebStreaming),
            other => Err(UnknownPreset(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown format preset: {0}")]
pub struct UnknownPreset(pub String);

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to launch ffmpeg: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("ffmpeg exited with {status}: {stderr}")]
    Engine { status: i32, stderr: String },
}

/// Build the ffmpeg argument list for a conversion. For WAV output the
/// encoding is forced to 16-bit linear PCM regardless of the descriptor's
/// generic codec field.
fn ffmpeg_args(input: &Path, output: &Path, format: &AudioFormat) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-i".into(),
        input.as_os_str().to_os_string(),
        "-ac".into(),
        format.channels.to_string().into(),
        "-ar".into(),
        format.sample_rate.to_string().into(),
    ];

    if format.format == "wav" && format.bit_depth.is_some() {
        args.push("-acodec".into());
        args.push("pcm_s16le".into());
    } else if let Some(codec) = &format.codec {
        args.push("-acodec".into());
        args.push(codec.clone().into());
    }

    args.push("-f".into());
    args.push(format.format.clone().into());
    args.push(output.as_os_str().to_os_string());
    args
}

/// Resolve the converter binary. `FFMPEG_PATH` overrides the default
/// `ffmpeg` lookup for hosts where the binary lives outside `PATH`.
fn ffmpeg_binary() -> String {
    std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string())
}

/// Transcode `input` into `output` according to `format`.
///
/// Succeeds by writing `output`; on failure the output path is
/// untrustworthy and no cleanup of partial output is attempted here.
pub async fn convert_audio(
    input: &Path,
    output: &Path,
    format: &AudioFormat,
) -> Result<(), ConvertError> {
    let args = ffmpeg_args(input, output, format);
    debug!(input = %input.display(), output = %output.display(), "running ffmpeg");

    let result = Command::new(ffmpeg_binary())
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !result.status.success() {
        return Err(ConvertError::Engine {
            status: result.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args_as_strings(format: &AudioFormat) -> Vec<String> {
        ffmpeg_args(
            &PathBuf::from("in.mp3"),
            &PathBuf::from("out.wav"),
            format,
        )
        .into_iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
    }

    #[test]
    fn telephony_preset_matches_phone_system_profile() {
        let format = FormatPreset::Telephony.format();
        assert_eq!(format.format, "wav");
        assert_eq!(format.channels, 1);
        assert_eq!(format.sample_rate, 8_000);
        assert_eq!(format.bit_depth, Some(16));
    }

    #[test]
    fn wav_output_forces_linear_pcm() {
        // Even with a conflicting codec in the descriptor.
        let format = AudioFormat {
            format: "wav".to_string(),
            channels: 1,
            sample_rate: 8_000,
            bit_depth: Some(16),
            codec: Some("libmp3lame".to_string()),
        };
        let args = args_as_strings(&format);
        assert!(args.windows(2).any(|w| w == ["-acodec", "pcm_s16le"]));
        assert!(!args.iter().any(|a| a == "libmp3lame"));
    }

    #[test]
    fn mp3_presets_use_lame_codec() {
        let args = args_as_strings(&FormatPreset::HighQuality.format());
        assert!(args.windows(2).any(|w| w == ["-acodec", "libmp3lame"]));
        assert!(args.windows(2).any(|w| w == ["-ac", "2"]));
        assert!(args.windows(2).any(|w| w == ["-ar", "48000"]));
    }

    #[test]
    fn telephony_args_fix_channels_and_rate() {
        let args = args_as_strings(&FormatPreset::Telephony.format());
        assert!(args.windows(2).any(|w| w == ["-ac", "1"]));
        assert!(args.windows(2).any(|w| w == ["-ar", "8000"]));
        assert!(args.windows(2).any(|w| w == ["-f", "wav"]));
    }

    #[test]
    fn preset_names_parse() {
        assert_eq!("3cx".parse::<FormatPreset>().unwrap(), FormatPreset::Telephony);
        assert_eq!(
            "voip_standard".parse::<FormatPreset>().unwrap(),
            FormatPreset::VoipStandard
        );
        assert!("cassette".parse::<FormatPreset>().is_err());
    }
}
