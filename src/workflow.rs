use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::chapter::Chapter;
use crate::clip::{Clip, TextOverlay};
use crate::config::Config;
use crate::error::{Result, ReelError};
use crate::graph::{filter_multi, FilterParams, Input, JobArguments, OutputOption, OutputSpec};
use crate::media::{MediaRunner, Prober};

/// Background music level before ducking
const DUCK_MUSIC_VOLUME: f64 = 0.4;
/// Background music level for a plain blend
const BLEND_MUSIC_VOLUME: f64 = 0.75;
const AMIX_DROPOUT_MS: u32 = 200;

/// Sidechain compressor settings used when ducking music under a voice
#[derive(Debug, Clone, PartialEq)]
pub struct DuckSettings {
    pub threshold: f64,
    pub ratio: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
}

impl Default for DuckSettings {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            ratio: 8.0,
            attack_ms: 20.0,
            release_ms: 300.0,
        }
    }
}

/// What to do with a still image in `Workflow::still`
#[derive(Debug, Clone, Default)]
pub struct StillOptions {
    /// Narration; the clip ends when it does
    pub narration: Option<PathBuf>,
    /// Fixed length, required without narration
    pub duration: Option<f64>,
    /// Ken Burns zoom increment per frame
    pub kenburns: Option<f64>,
    pub caption: Option<TextOverlay>,
}

/// Ready-made recipes over clips, chapters and raw graphs
pub struct Workflow {
    config: Config,
    runner: Box<dyn MediaRunner>,
    prober: Prober,
}

impl Workflow {
    pub fn new(config: Config, runner: Box<dyn MediaRunner>) -> Self {
        let prober = Prober::new(config.media.probe_path.clone());
        Self {
            config,
            runner,
            prober,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn clip(&self) -> Clip {
        Clip::new(self.config.encode.clone()).upscale_width(self.config.clip.upscale_width)
    }

    fn run(&self, job: &JobArguments) -> Result<PathBuf> {
        debug!("Job: {}", job);
        self.runner.execute(job, true)?;
        Ok(job.destination().to_path_buf())
    }

    /// Numbered image frames to a silent video
    pub fn images_to_video<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        pattern: P,
        fps: u32,
        output: Q,
    ) -> Result<PathBuf> {
        let output = output.as_ref();
        info!(
            "Images -> video | pattern={} fps={} -> {}",
            pattern.as_ref().display(),
            fps,
            output.display()
        );

        let clip = self.clip().from_image_sequence(pattern, fps);
        let job = clip
            .output_spec(output, false)?
            .option(OutputOption::Preset(self.config.encode.preset.clone()))
            .assemble()?;
        self.run(&job)
    }

    /// Still image held for the length of the narration
    pub fn still_with_narration<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
        &self,
        image: P,
        narration: Q,
        size: (u32, u32),
        output: R,
    ) -> Result<PathBuf> {
        let output = output.as_ref();
        info!(
            "Image+audio -> clip | {} + {} -> {}",
            image.as_ref().display(),
            narration.as_ref().display(),
            output.display()
        );

        let clip = self
            .clip()
            .from_image(image, self.config.clip.fps, true)
            .resize(size.0, size.1)?
            .with_audio(narration);
        let job = self.narrated_output(&clip, output)?.assemble()?;
        self.run(&job)
    }

    /// Still image with a slow Ken Burns zoom, ended by the narration
    pub fn kenburns_with_narration<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
        &self,
        image: P,
        narration: Q,
        size: (u32, u32),
        zoom_increment: f64,
        output: R,
    ) -> Result<PathBuf> {
        let output = output.as_ref();
        info!("Image+audio (kenburns) -> {}", output.display());

        let clip = self
            .clip()
            .from_image(image, self.config.clip.fps, true)
            .target_size(size.0, size.1)
            .kenburns(zoom_increment)?
            .with_audio(narration);
        let job = self.narrated_output(&clip, output)?.assemble()?;
        self.run(&job)
    }

    /// Still image at the configured size, with any of narration, zoom and caption
    pub fn still<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        image: P,
        options: &StillOptions,
        output: Q,
    ) -> Result<PathBuf> {
        info!("Still {} -> {}", image.as_ref().display(), output.as_ref().display());
        let fps = self.config.clip.fps;
        let clip = match (&options.narration, options.duration) {
            (_, Some(seconds)) => self.clip().from_image_for(image, fps, seconds),
            (Some(_), None) => self.clip().from_image(image, fps, true),
            (None, None) => {
                return Err(ReelError::Clip(
                    "A still without narration needs a duration".to_string(),
                ));
            }
        };

        let (width, height) = (self.config.clip.width, self.config.clip.height);
        // zoompan emits the final frame size from the unscaled source
        let mut clip = match options.kenburns {
            Some(zoom) => clip.target_size(width, height).kenburns(zoom)?,
            None => clip.resize(width, height)?,
        };
        if let Some(overlay) = &options.caption {
            clip = clip.draw_text(overlay)?;
        }
        if let Some(narration) = &options.narration {
            clip = clip.with_audio(narration);
        }

        let rendered = clip.save(self.runner.as_ref(), output, true)?;
        Ok(rendered.path)
    }

    /// PCM narration at a pinned rate, index moved to the front of the file
    fn narrated_output(&self, clip: &Clip, output: &Path) -> Result<OutputSpec> {
        Ok(clip
            .output_spec(output, true)?
            .option(OutputOption::AudioCodec(self.config.encode.pcm_codec.clone()))
            .option(OutputOption::SampleRate(self.config.encode.sample_rate))
            .option(OutputOption::Channels(self.config.encode.channels))
            .option(OutputOption::MovFlags("+faststart".to_string())))
    }

    /// Burn a caption into an existing video
    pub fn caption<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        video: P,
        overlay: &TextOverlay,
        output: Q,
    ) -> Result<PathBuf> {
        let output = output.as_ref();
        info!("Drawtext on {} -> {}", video.as_ref().display(), output.display());

        let rendered = self
            .clip()
            .from_video(video)
            .draw_text(overlay)?
            .save(self.runner.as_ref(), output, false)?;
        Ok(rendered.path)
    }

    /// Join rendered clips into one chapter file
    pub fn concat<P: AsRef<Path>>(&self, clips: &[PathBuf], output: P) -> Result<PathBuf> {
        let mut chapter = Chapter::new(self.config.encode.clone());
        for clip in clips {
            if clip.is_dir() {
                chapter.add_dir(clip)?;
            } else {
                chapter.add(clip)?;
            }
        }
        let rendered = chapter.render(self.runner.as_ref(), output)?;
        Ok(rendered.path)
    }

    /// Graph for music ducked under narration, mixed back with the narration
    pub fn duck_music_job<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>, S: AsRef<Path>>(
        &self,
        video: P,
        narration: Q,
        music: R,
        settings: &DuckSettings,
        output: S,
    ) -> Result<OutputSpec> {
        let video = Input::new(video).video();
        let voice = Input::new(narration).audio();
        let music = Input::new(music)
            .audio()
            .filter("volume", FilterParams::new().arg(DUCK_MUSIC_VOLUME))?;

        // The compressor acts on its first input; the voice is the trigger.
        let ducked = filter_multi(
            &[music, voice.clone()],
            "sidechaincompress",
            FilterParams::new()
                .set("threshold", settings.threshold)
                .set("ratio", settings.ratio)
                .set("attack", settings.attack_ms)
                .set("release", settings.release_ms),
        )?;
        let mixed = filter_multi(
            &[ducked, voice],
            "amix",
            FilterParams::new()
                .set("inputs", 2)
                .set("dropout_transition", AMIX_DROPOUT_MS),
        )?;

        Ok(OutputSpec::new(vec![video, mixed], output)
            .option(OutputOption::VideoCodec("copy".to_string()))
            .option(OutputOption::AudioCodec(self.config.encode.pcm_codec.clone()))
            .option(OutputOption::SampleRate(self.config.encode.sample_rate))
            .option(OutputOption::Channels(self.config.encode.channels))
            .option(OutputOption::Shortest)
            .option(OutputOption::MovFlags("+faststart".to_string())))
    }

    /// Lower background music whenever the narration speaks
    pub fn duck_music<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>, S: AsRef<Path>>(
        &self,
        video: P,
        narration: Q,
        music: R,
        settings: &DuckSettings,
        output: S,
    ) -> Result<PathBuf> {
        info!(
            "Duck {} under {} -> {}",
            music.as_ref().display(),
            narration.as_ref().display(),
            output.as_ref().display()
        );
        let job = self
            .duck_music_job(video, narration, music, settings, output)?
            .assemble()?;
        self.run(&job)
    }

    /// Graph for music and narration summed, cut to `duration` seconds
    pub fn blend_tracks_job<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
        &self,
        narration: P,
        music: Q,
        duration: f64,
        output: R,
    ) -> Result<OutputSpec> {
        let voice = Input::new(narration).audio();
        let music = Input::new(music)
            .audio()
            .filter("volume", FilterParams::new().arg(BLEND_MUSIC_VOLUME))?;

        let blended = filter_multi(
            &[music, voice],
            "amix",
            FilterParams::new()
                .set("inputs", 2)
                .set("dropout_transition", AMIX_DROPOUT_MS),
        )?
        .filter("atrim", FilterParams::new().set("end", duration))?
        .filter("asetpts", FilterParams::new().arg("PTS-STARTPTS"))?;

        Ok(OutputSpec::new(vec![blended], output)
            .option(OutputOption::AudioCodec(self.config.encode.pcm_codec.clone()))
            .option(OutputOption::SampleRate(self.config.encode.sample_rate))
            .option(OutputOption::Channels(self.config.encode.channels)))
    }

    /// Mix music under the narration, trimmed to the narration's probed length
    pub fn blend_tracks<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
        &self,
        narration: P,
        music: Q,
        output: R,
    ) -> Result<PathBuf> {
        let narration = narration.as_ref();
        let duration = self.prober.duration(narration)?;
        info!(
            "Blend {} with {} ({}s) -> {}",
            music.as_ref().display(),
            narration.display(),
            duration,
            output.as_ref().display()
        );

        let job = self.blend_tracks_job(narration, music, duration, output)?.assemble()?;
        self.run(&job)
    }

    /// Graph replacing a video's audio with another file, video copied untouched
    pub fn dub_job<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
        &self,
        video: P,
        audio: Q,
        output: R,
    ) -> Result<OutputSpec> {
        let video = Input::new(video);
        let audio = Input::new(audio);
        // Equal sources collapse into one declared input
        let audio_index = if video.source().same_source(audio.source()) { 0 } else { 1 };

        // The source video usually carries its own audio; name both streams exactly.
        Ok(OutputSpec::new(vec![video.video(), audio.audio()], output)
            .mappings(["0:v:0".to_string(), format!("{}:a:0", audio_index)])
            .option(OutputOption::VideoCodec("copy".to_string()))
            .option(OutputOption::AudioCodec(self.config.encode.audio_codec.clone()))
            .option(OutputOption::Shortest))
    }

    pub fn dub<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
        &self,
        video: P,
        audio: Q,
        output: R,
    ) -> Result<PathBuf> {
        info!(
            "Dub {} with {} -> {}",
            video.as_ref().display(),
            audio.as_ref().display(),
            output.as_ref().display()
        );
        let job = self.dub_job(video, audio, output)?.assemble()?;
        self.run(&job)
    }

    /// Duration in seconds, preferring the audio stream
    pub fn duration<P: AsRef<Path>>(&self, path: P) -> Result<f64> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReelError::NotFound(path.to_path_buf()));
        }
        self.prober.duration(path)
    }
}
