//! Container mapping and codec descriptor enumeration.

use roundclip_types::normalize_extension;
use tracing::debug;

/// Codec id of the synthetic descriptor used when native enumeration
/// yields nothing.
pub const FALLBACK_CODEC_ID: &str = "fallback";

/// Container family an output extension maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Animated GIF.
    Gif,

    /// Uncompressed RIFF/AVI.
    RawAvi,

    /// MPEG-4 family (mp4, mov, mkv, flv) carrying H.264.
    Mp4,

    /// ASF family (wmv, asf) carrying VC-1.
    Wmv,

    /// MPEG-2 program streams (mpg, vob).
    Mpeg2,
}

impl ContainerKind {
    /// Map a normalized extension to its container family.
    ///
    /// Total: unknown extensions normalize to the default extension first.
    pub fn for_extension(extension: &str) -> Self {
        match normalize_extension(extension).as_str() {
            "gif" => Self::Gif,
            "avi" => Self::RawAvi,
            "wmv" | "asf" => Self::Wmv,
            "mpg" | "vob" => Self::Mpeg2,
            _ => Self::Mp4,
        }
    }

    /// Short tag of the video codec this container carries.
    pub fn codec_tag(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::RawAvi => "raw",
            Self::Mp4 => "h264",
            Self::Wmv => "wvc1",
            Self::Mpeg2 => "mpeg2",
        }
    }

    /// Human-readable codec name.
    pub fn codec_name(self) -> &'static str {
        match self {
            Self::Gif => "Animated GIF",
            Self::RawAvi => "Uncompressed AVI",
            Self::Mp4 => "H.264",
            Self::Wmv => "VC-1",
            Self::Mpeg2 => "MPEG-2",
        }
    }
}

/// One selectable codec for an output extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecDescriptor {
    /// Stable id stored in the settings.
    pub id: String,

    /// Display label.
    pub label: String,

    /// Whether the codec's container can carry an audio track.
    pub supports_audio: bool,
}

/// Enumerate the selectable codecs for an output extension.
///
/// GIF and raw AVI expose exactly one fixed codec. Every other extension
/// enumerates the native encoders available for its mapped codec and falls
/// back to a single synthetic descriptor when the enumeration comes back
/// empty or unsupported.
pub fn codec_options(extension: &str) -> Vec<CodecDescriptor> {
    let kind = ContainerKind::for_extension(extension);

    match kind {
        ContainerKind::Gif | ContainerKind::RawAvi => vec![CodecDescriptor {
            id: kind.codec_tag().to_string(),
            label: kind.codec_name().to_string(),
            supports_audio: false,
        }],
        _ => {
            let mut options = native_codec_options(kind);
            if options.is_empty() {
                debug!(?kind, "No native encoders enumerated, using fallback");
                options.push(CodecDescriptor {
                    id: FALLBACK_CODEC_ID.to_string(),
                    label: format!("{} (system default)", kind.codec_name()),
                    supports_audio: true,
                });
            }
            options
        }
    }
}

/// Normalize a codec id against the options for its extension.
///
/// Total: unknown ids fall back to the extension's first descriptor.
pub fn normalize_codec_id(extension: &str, codec_id: &str) -> String {
    let options = codec_options(extension);
    let wanted = codec_id.trim();

    options
        .iter()
        .find(|o| o.id.eq_ignore_ascii_case(wanted))
        .unwrap_or(&options[0])
        .id
        .clone()
}

/// Descriptors for the native encoders that can produce this container's
/// codec. Enumeration failure is treated the same as finding none.
#[cfg(windows)]
fn native_codec_options(kind: ContainerKind) -> Vec<CodecDescriptor> {
    let names = match crate::mf::enumerate_native_encoders(kind) {
        Ok(names) => names,
        Err(e) => {
            debug!(?kind, "Native encoder enumeration failed: {e}");
            Vec::new()
        }
    };

    names
        .into_iter()
        .enumerate()
        .map(|(index, label)| CodecDescriptor {
            id: if index == 0 {
                kind.codec_tag().to_string()
            } else {
                format!("{}#{index}", kind.codec_tag())
            },
            label,
            supports_audio: true,
        })
        .collect()
}

#[cfg(not(windows))]
fn native_codec_options(_kind: ContainerKind) -> Vec<CodecDescriptor> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundclip_types::KNOWN_EXTENSIONS;

    #[test]
    fn test_extension_mapping() {
        assert_eq!(ContainerKind::for_extension("gif"), ContainerKind::Gif);
        assert_eq!(ContainerKind::for_extension("avi"), ContainerKind::RawAvi);
        assert_eq!(ContainerKind::for_extension("mkv"), ContainerKind::Mp4);
        assert_eq!(ContainerKind::for_extension("asf"), ContainerKind::Wmv);
        assert_eq!(ContainerKind::for_extension("vob"), ContainerKind::Mpeg2);
        // Unknown extensions ride the default container.
        assert_eq!(ContainerKind::for_extension("xyz"), ContainerKind::Mp4);
    }

    #[test]
    fn test_fixed_extensions_have_exactly_one_codec() {
        for ext in ["gif", "avi"] {
            let options = codec_options(ext);
            assert_eq!(options.len(), 1);
            assert!(!options[0].supports_audio);
        }
    }

    #[test]
    fn test_every_extension_has_at_least_one_codec() {
        for ext in KNOWN_EXTENSIONS {
            assert!(!codec_options(ext).is_empty(), "extension {ext}");
        }
    }

    #[cfg(not(windows))]
    #[test]
    fn test_empty_enumeration_yields_exactly_the_fallback() {
        for ext in ["mp4", "wmv", "mpg"] {
            let options = codec_options(ext);
            assert_eq!(options.len(), 1);
            assert_eq!(options[0].id, FALLBACK_CODEC_ID);
            assert!(options[0].supports_audio);
        }
    }

    #[test]
    fn test_normalize_codec_id_round_trips_known_ids() {
        for ext in KNOWN_EXTENSIONS {
            for option in codec_options(ext) {
                assert_eq!(normalize_codec_id(ext, &option.id), option.id);
            }
        }
    }

    #[test]
    fn test_normalize_codec_id_falls_back_to_first() {
        let first = codec_options("mp4")[0].id.clone();
        assert_eq!(normalize_codec_id("mp4", "nonsense"), first);
        assert_eq!(normalize_codec_id("gif", ""), "gif");
    }
}
