/// Named encoder settings. Output height is fixed and width follows the
/// source aspect ratio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodePreset {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

const PRESETS: &[EncodePreset] = &[
    EncodePreset {
        name: "H264 Broadband 1080p",
        width: 1920,
        height: 1080,
        video_bitrate_kbps: 6750,
        audio_bitrate_kbps: 128,
    },
    EncodePreset {
        name: "H264 Broadband 720p",
        width: 1280,
        height: 720,
        video_bitrate_kbps: 3400,
        audio_bitrate_kbps: 128,
    },
    EncodePreset {
        name: "H264 Broadband SD 16x9",
        width: 640,
        height: 360,
        video_bitrate_kbps: 1500,
        audio_bitrate_kbps: 128,
    },
    EncodePreset {
        name: "H264 Broadband SD 4x3",
        width: 640,
        height: 480,
        video_bitrate_kbps: 1500,
        audio_bitrate_kbps: 128,
    },
];

impl EncodePreset {
    pub fn lookup(name: &str) -> Option<&'static EncodePreset> {
        PRESETS.iter().find(|p| p.name == name)
    }

    /// Output object name for a source file, e.g. `clip_1280x720_3400.mp4`.
    pub fn output_object_name(&self, source_file: &str) -> String {
        let stem = source_file
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .filter(|stem| !stem.is_empty())
            .unwrap_or(source_file);
        format!(
            "{}_{}x{}_{}.mp4",
            stem, self.width, self.height, self.video_bitrate_kbps
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_exact() {
        assert_eq!(
            EncodePreset::lookup("H264 Broadband 720p").unwrap().height,
            720
        );
        assert!(EncodePreset::lookup("h264 broadband 720p").is_none());
    }

    #[test]
    fn test_output_object_name() {
        let preset = EncodePreset::lookup("H264 Broadband SD 16x9").unwrap();
        assert_eq!(
            preset.output_object_name("clip.mov"),
            "clip_640x360_1500.mp4"
        );
        assert_eq!(
            preset.output_object_name("clip_1280x720_3400.mp4"),
            "clip_1280x720_3400_640x360_1500.mp4"
        );
    }
}
