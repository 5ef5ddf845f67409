//! On-demand segment transcoding.
//!
//! Each segment request runs one external process built from a configured
//! command template. Nothing is cached: the process output is streamed to
//! the client as it is produced and the process dies with the connection.

mod params;
mod process;
mod template;

pub use params::{
    format_seek, MediaLimits, SegmentParams, SegmentQuery, BITRATE_RANGE, DEFAULT_RESOLUTION,
};
pub use process::{spawn_stream, SegmentStream};
pub use template::{CommandTemplate, TemplateValues};

use std::path::Path;

use reelhouse_common::paths::file_extension;
use reelhouse_db::models::Media;
use thiserror::Error;

use crate::config::{Config, TranscoderConfig};

/// Transcoding errors.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// A request parameter failed validation. The client's fault.
    #[error("invalid segment parameter {name}={value:?}: {reason}")]
    InvalidSegmentParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// The transcoder could not be started.
    #[error("failed to start transcoder {program}: {source}")]
    ProcessFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no transcoder profile configured")]
    NoProfile,

    #[error("transcoder command is empty")]
    EmptyCommand,

    #[error("transcoder {profile} outputs unknown format {format}")]
    UnknownFormat { profile: String, format: String },
}

/// A configured transcoder with its parsed template.
#[derive(Debug, Clone)]
pub struct TranscodeProfile {
    config: TranscoderConfig,
    template: CommandTemplate,
    mime_type: String,
}

impl TranscodeProfile {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn default_bitrate(&self) -> u32 {
        self.config.bitrate
    }

    /// MIME type of the output format.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn accepts(&self, extension: &str) -> bool {
        self.config.input_formats.iter().any(|f| f == extension)
    }
}

/// A running segment transcode.
pub struct Segment {
    pub content_type: String,
    pub stream: SegmentStream,
}

/// Picks a transcoder for a media file and runs it for one segment.
#[derive(Debug, Clone)]
pub struct TranscodeOrchestrator {
    /// Sorted by ascending sequence.
    profiles: Vec<TranscodeProfile>,
}

impl TranscodeOrchestrator {
    pub fn from_config(config: &Config) -> Result<Self, TranscodeError> {
        let mut profiles = config
            .transcoders
            .iter()
            .map(|t| {
                let format = config.format(&t.output_format).ok_or_else(|| {
                    TranscodeError::UnknownFormat {
                        profile: t.name.clone(),
                        format: t.output_format.clone(),
                    }
                })?;
                Ok(TranscodeProfile {
                    config: t.clone(),
                    template: CommandTemplate::parse(&t.command)?,
                    mime_type: format.mime_type.clone(),
                })
            })
            .collect::<Result<Vec<_>, TranscodeError>>()?;

        profiles.sort_by_key(|p| p.config.sequence);
        Ok(Self { profiles })
    }

    /// The lowest-sequence profile accepting the file's extension, else the
    /// lowest-sequence profile.
    pub fn select_profile(&self, path: &Path) -> Result<&TranscodeProfile, TranscodeError> {
        let extension = file_extension(path);

        extension
            .and_then(|ext| self.profiles.iter().find(|p| p.accepts(&ext)))
            .or_else(|| self.profiles.first())
            .ok_or(TranscodeError::NoProfile)
    }

    /// Validate a raw request against the selected profile and start the
    /// transcode.
    pub fn transcode_request(
        &self,
        media: &Media,
        query: &SegmentQuery,
    ) -> Result<Segment, TranscodeError> {
        let profile = self.select_profile(Path::new(&media.path))?;
        let params =
            SegmentParams::validate(query, &MediaLimits::of(media), profile.default_bitrate())?;
        self.transcode(media, &params)
    }

    /// Start transcoding one segment of `media` with validated parameters.
    pub fn transcode(&self, media: &Media, params: &SegmentParams) -> Result<Segment, TranscodeError> {
        let profile = self.select_profile(Path::new(&media.path))?;
        let argv = profile.template.render(&template_values(media, params));

        tracing::debug!(
            media_id = %media.id,
            profile = profile.name(),
            seek = params.seek,
            duration = params.duration,
            bitrate = params.bitrate_kbps,
            resolution = %params.resolution,
            language = params.language,
            "Transcoding segment"
        );

        let stream = spawn_stream(&argv, profile.config.buffer_size_kb * 1024)?;

        Ok(Segment {
            content_type: profile.mime_type.clone(),
            stream,
        })
    }
}

fn template_values(media: &Media, params: &SegmentParams) -> TemplateValues {
    TemplateValues {
        input: media.path.clone(),
        seek: format_seek(params.seek),
        duration: params.duration.to_string(),
        bitrate: params.bitrate_kbps.to_string(),
        resolution: params.resolution.to_string(),
        language: params.language.to_string(),
    }
}
