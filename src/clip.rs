use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{Config, EncodeConfig};
use crate::error::{Result, ReelError};
use crate::graph::{FilterParams, Input, InputOptions, OutputOption, OutputSpec, Stream};
use crate::media::{MediaRunner, RunOutput};

/// Frame-count ceiling for zoompan; the output's `-shortest` ends it in practice
const ZOOMPAN_FRAMES: u32 = 9999;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_UPSCALE_WIDTH: u32 = 3840;

/// A file written by a successful render
#[derive(Debug, Clone)]
pub struct Rendered {
    pub path: PathBuf,
    pub output: RunOutput,
}

/// Caption drawn with ffmpeg's drawtext
#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    pub text: String,
    pub font: String,
    pub font_size: u32,
    pub x: String,
    pub y: String,
}

impl TextOverlay {
    /// White text centered horizontally near the top of the frame
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            font: "/Library/Fonts/Arial.ttf".to_string(),
            font_size: 56,
            x: "(w-tw)/2".to_string(),
            y: "h*0.12".to_string(),
        }
    }

    pub fn font<S: Into<String>>(mut self, font: S) -> Self {
        self.font = font.into();
        self
    }

    pub fn font_size(mut self, size: u32) -> Self {
        self.font_size = size;
        self
    }

    pub fn position<S1: Into<String>, S2: Into<String>>(mut self, x: S1, y: S2) -> Self {
        self.x = x.into();
        self.y = y.into();
        self
    }

    fn params(&self) -> FilterParams {
        FilterParams::new()
            .set("text", &self.text)
            .set("fontfile", &self.font)
            .set("fontcolor", "white")
            .set("fontsize", self.font_size)
            .set("x", &self.x)
            .set("y", &self.y)
            .set("box", 1)
            .set("boxcolor", "black@0.4")
            .set("boxborderw", 8)
    }
}

/// Fluent builder around one clip's current video and audio streams.
///
/// Each method consumes the clip and hands it back, so a clip has a single
/// owner while it is being built.
#[derive(Debug, Clone)]
pub struct Clip {
    video: Option<Stream>,
    audio: Option<Stream>,
    fps: u32,
    size: Option<(u32, u32)>,
    still_image: bool,
    upscale_width: u32,
    encode: EncodeConfig,
}

impl Default for Clip {
    fn default() -> Self {
        Self::new(Config::default().encode)
    }
}

impl Clip {
    pub fn new(encode: EncodeConfig) -> Self {
        Self {
            video: None,
            audio: None,
            fps: DEFAULT_FPS,
            size: None,
            still_image: false,
            upscale_width: DEFAULT_UPSCALE_WIDTH,
            encode,
        }
    }

    /// Width the still is upscaled to before the Ken Burns zoom
    pub fn upscale_width(mut self, width: u32) -> Self {
        self.upscale_width = width;
        self
    }

    pub fn video(&self) -> Option<&Stream> {
        self.video.as_ref()
    }

    pub fn audio(&self) -> Option<&Stream> {
        self.audio.as_ref()
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn is_still_image(&self) -> bool {
        self.still_image
    }

    // ------- Sources -------

    /// Single image shown at `fps`; looped so it can run as long as the audio
    pub fn from_image<P: AsRef<Path>>(mut self, image: P, fps: u32, loop_input: bool) -> Self {
        let options = InputOptions::new().looped(loop_input).framerate(fps);
        self.fps = fps;
        self.video = Some(Input::with_options(image, options).video());
        self.still_image = true;
        self
    }

    /// Single image looped for exactly `seconds`, for clips without narration
    pub fn from_image_for<P: AsRef<Path>>(mut self, image: P, fps: u32, seconds: f64) -> Self {
        let options = InputOptions::new().looped(true).framerate(fps).duration(seconds);
        self.fps = fps;
        self.video = Some(Input::with_options(image, options).video());
        self.still_image = true;
        self
    }

    /// Numbered frames such as `frames/frame_%03d.png`, each shown for 1/fps seconds
    pub fn from_image_sequence<P: AsRef<Path>>(mut self, pattern: P, fps: u32) -> Self {
        self.fps = fps;
        self.video = Some(Input::with_options(pattern, InputOptions::new().framerate(fps)).video());
        self.still_image = false;
        self
    }

    pub fn from_video<P: AsRef<Path>>(mut self, video: P) -> Self {
        let input = Input::new(video);
        self.video = Some(input.video());
        self.audio = Some(input.audio());
        self.still_image = false;
        self
    }

    pub fn with_audio<P: AsRef<Path>>(mut self, audio: P) -> Self {
        self.audio = Some(Input::new(audio).audio());
        self
    }

    // ------- Video transforms -------

    fn current_video(&self, operation: &str) -> Result<&Stream> {
        self.video.as_ref().ok_or_else(|| {
            ReelError::Construction(format!(
                "{} needs a video stream; call from_image() or from_video() first",
                operation
            ))
        })
    }

    pub fn resize(mut self, width: u32, height: u32) -> Result<Self> {
        let scaled = self
            .current_video("resize")?
            .filter("scale", FilterParams::new().arg(width).arg(height))?;
        self.size = Some((width, height));
        self.video = Some(scaled);
        Ok(self)
    }

    /// Record the output frame size without scaling the current video
    pub fn target_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }

    /// Slow zoom over the frame: upscale the source for detail, then zoompan to the target size
    pub fn kenburns(mut self, zoom_increment: f64) -> Result<Self> {
        let (width, height) = self.size.ok_or_else(|| {
            ReelError::Construction(
                "kenburns needs a target size; call target_size() or resize() first".to_string(),
            )
        })?;

        let zoomed = self
            .current_video("kenburns")?
            .filter("scale", FilterParams::new().arg(self.upscale_width).arg(-1))?
            .filter(
                "zoompan",
                FilterParams::new()
                    .set("z", format!("zoom+{}", zoom_increment))
                    .set("d", ZOOMPAN_FRAMES)
                    .set("s", format!("{}x{}", width, height))
                    .set("fps", self.fps),
            )?;
        self.video = Some(zoomed);
        Ok(self)
    }

    pub fn draw_text(mut self, overlay: &TextOverlay) -> Result<Self> {
        let captioned = self
            .current_video("draw_text")?
            .filter("drawtext", overlay.params())?;
        self.video = Some(captioned);
        Ok(self)
    }

    // ------- Output -------

    /// Output description for `destination` without running anything
    pub fn output_spec<P: AsRef<Path>>(
        &self,
        destination: P,
        shortest: bool,
    ) -> Result<OutputSpec> {
        let video = self.video.clone().ok_or_else(|| {
            ReelError::Clip(
                "No video stream set. Did you call from_image() or from_video()?".to_string(),
            )
        })?;

        let mut streams = vec![video];
        if let Some(audio) = &self.audio {
            streams.push(audio.clone());
        }

        let mut spec = OutputSpec::new(streams, destination)
            .option(OutputOption::VideoCodec(self.encode.video_codec.clone()))
            .option(OutputOption::PixelFormat(self.encode.pixel_format.clone()));
        if self.still_image {
            spec = spec.option(OutputOption::Tune("stillimage".to_string()));
        }
        if self.audio.is_some() {
            spec = spec.option(OutputOption::AudioCodec(self.encode.audio_codec.clone()));
            if shortest {
                spec = spec.option(OutputOption::Shortest);
            }
        }
        Ok(spec)
    }

    /// Render the clip, replacing any existing file at `destination`
    pub fn save<P: AsRef<Path>>(
        &self,
        runner: &dyn MediaRunner,
        destination: P,
        shortest: bool,
    ) -> Result<Rendered> {
        let destination = destination.as_ref();
        let job = self.output_spec(destination, shortest)?.assemble()?;

        info!("Render clip -> {}", destination.display());
        debug!("Clip command: {}", job);

        let output = runner.execute(&job, true).map_err(|e| match e {
            ReelError::ProcessFailure { stderr, .. } => ReelError::Clip(stderr),
            other => other,
        })?;

        Ok(Rendered {
            path: destination.to_path_buf(),
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::StreamKind;
    use crate::media::MockMediaRunner;

    #[test]
    fn test_still_image_without_audio() {
        let clip = Clip::default()
            .from_image("panel.jpg", 30, true)
            .resize(1920, 1080)
            .unwrap();
        let spec = clip.output_spec("out.mp4", true).unwrap();

        assert_eq!(spec.streams().len(), 1);
        assert_eq!(spec.streams()[0].kind(), StreamKind::Video);
        assert!(spec.has_option("-pix_fmt"));
        assert!(spec.has_option("-tune"));
        assert!(!spec.has_option("-c:a"));
        assert!(!spec.has_option("-shortest"));

        let job = spec.assemble().unwrap();
        assert_eq!(job.inputs()[0].options, vec!["-loop", "1", "-framerate", "30"]);
        assert_eq!(job.output_value("-tune"), Some("stillimage"));
    }

    #[test]
    fn test_image_for_fixed_duration() {
        let clip = Clip::default().from_image_for("title.png", 30, 4.0);
        let job = clip.output_spec("title.mp4", true).unwrap().assemble().unwrap();
        assert_eq!(job.inputs()[0].options, vec!["-loop", "1", "-framerate", "30", "-t", "4"]);
        assert!(clip.is_still_image());
    }

    #[test]
    fn test_audio_adds_second_stream_and_shortest() {
        let clip = Clip::default()
            .from_image("panel.jpg", 30, true)
            .with_audio("narration.wav");

        let spec = clip.output_spec("out.mp4", true).unwrap();
        assert_eq!(spec.streams().len(), 2);
        assert!(spec.has_option("-c:a"));
        assert!(spec.has_option("-shortest"));

        let spec = clip.output_spec("out.mp4", false).unwrap();
        assert_eq!(spec.streams().len(), 2);
        assert!(!spec.has_option("-shortest"));
    }

    #[test]
    fn test_from_video_is_not_still_tuned() {
        let clip = Clip::default().from_video("talk.mp4");
        let job = clip.output_spec("out.mp4", true).unwrap().assemble().unwrap();

        assert!(!job.has_output_flag("-tune"));
        assert_eq!(job.inputs().len(), 1);
        assert_eq!(job.maps(), &["0:v".to_string(), "0:a".to_string()]);
    }

    #[test]
    fn test_kenburns_chain() {
        let clip = Clip::default()
            .from_image("panel.jpg", 25, true)
            .resize(1280, 720)
            .unwrap()
            .kenburns(0.0006)
            .unwrap();

        assert_eq!(clip.video().unwrap().chain_len(), 3);
        let job = clip.output_spec("kb.mp4", true).unwrap().assemble().unwrap();
        assert_eq!(
            job.filter_graph().unwrap(),
            "[0:v]scale=1280:720[s0];[s0]scale=3840:-1[s1];\
             [s1]zoompan=z=zoom+0.0006:d=9999:s=1280x720:fps=25[s2]"
        );
    }

    #[test]
    fn test_kenburns_upscales_the_source_directly() {
        let clip = Clip::default()
            .from_image("panel.jpg", 30, true)
            .target_size(1920, 1080)
            .kenburns(0.006)
            .unwrap();

        assert_eq!(clip.size(), Some((1920, 1080)));
        assert_eq!(clip.video().unwrap().chain_len(), 2);
        let job = clip.output_spec("kb.mp4", true).unwrap().assemble().unwrap();
        assert_eq!(
            job.filter_graph().unwrap(),
            "[0:v]scale=3840:-1[s0];[s0]zoompan=z=zoom+0.006:d=9999:s=1920x1080:fps=30[s1]"
        );
    }

    #[test]
    fn test_target_size_adds_no_filter() {
        let clip = Clip::default()
            .from_image("panel.jpg", 30, true)
            .target_size(1280, 720);
        assert_eq!(clip.size(), Some((1280, 720)));
        assert!(clip.video().unwrap().is_input());
    }

    #[test]
    fn test_kenburns_requires_size() {
        let err = Clip::default()
            .from_image("panel.jpg", 30, true)
            .kenburns(0.0006)
            .unwrap_err();
        assert!(matches!(err, ReelError::Construction(_)));
    }

    #[test]
    fn test_draw_text_defaults() {
        let clip = Clip::default()
            .from_video("talk.mp4")
            .draw_text(&TextOverlay::new("(soft gasp)"))
            .unwrap();
        let job = clip.output_spec("t.mp4", false).unwrap().assemble().unwrap();
        assert_eq!(
            job.filter_graph().unwrap(),
            "[0:v]drawtext=text=(soft gasp):fontfile=/Library/Fonts/Arial.ttf:fontcolor=white:\
             fontsize=56:x=(w-tw)/2:y=h*0.12:box=1:boxcolor=black@0.4:boxborderw=8[s0]"
        );
    }

    #[test]
    fn test_transforms_without_video_fail() {
        assert!(matches!(Clip::default().resize(640, 360), Err(ReelError::Construction(_))));
        assert!(matches!(
            Clip::default().draw_text(&TextOverlay::new("hi")),
            Err(ReelError::Construction(_))
        ));
    }

    #[test]
    fn test_save_without_video_does_not_run() {
        let mut runner = MockMediaRunner::new();
        runner.expect_execute().never();

        let err = Clip::default()
            .with_audio("narration.wav")
            .save(&runner, "out.mp4", true)
            .unwrap_err();
        assert!(matches!(err, ReelError::Clip(_)));
    }

    #[test]
    fn test_save_forces_overwrite() {
        let mut runner = MockMediaRunner::new();
        runner
            .expect_execute()
            .withf(|job, overwrite| *overwrite && job.destination() == Path::new("out/clip.mp4"))
            .times(1)
            .returning(|_, _| Ok(RunOutput::default()));

        let rendered = Clip::default()
            .from_image("panel.jpg", 30, true)
            .with_audio("narration.wav")
            .save(&runner, "out/clip.mp4", true)
            .unwrap();
        assert_eq!(rendered.path, PathBuf::from("out/clip.mp4"));
    }

    #[test]
    fn test_process_failure_becomes_clip_error() {
        let mut runner = MockMediaRunner::new();
        runner.expect_execute().times(1).returning(|_, _| {
            Err(ReelError::ProcessFailure {
                description: "Render".to_string(),
                exit_code: Some(1),
                stderr: "panel.jpg: No such file or directory".to_string(),
            })
        });

        let err = Clip::default()
            .from_image("panel.jpg", 30, true)
            .save(&runner, "out.mp4", true)
            .unwrap_err();
        match err {
            ReelError::Clip(msg) => assert!(msg.contains("No such file")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
