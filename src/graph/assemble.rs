use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::filter::FilterNode;
use super::stream::{InputSource, Origin, Stream, StreamKind};
use crate::error::{Result, ReelError};

/// Encoder and container options recognized on an output
#[derive(Debug, Clone, PartialEq)]
pub enum OutputOption {
    VideoCodec(String),
    AudioCodec(String),
    PixelFormat(String),
    Preset(String),
    Tune(String),
    SampleRate(u32),
    Channels(u32),
    MovFlags(String),
    /// Stop encoding when the shortest mapped stream ends
    Shortest,
}

impl OutputOption {
    /// Command-line flag; also the identity used to replace an earlier value
    pub fn flag(&self) -> &'static str {
        match self {
            OutputOption::VideoCodec(_) => "-c:v",
            OutputOption::AudioCodec(_) => "-c:a",
            OutputOption::PixelFormat(_) => "-pix_fmt",
            OutputOption::Preset(_) => "-preset",
            OutputOption::Tune(_) => "-tune",
            OutputOption::SampleRate(_) => "-ar",
            OutputOption::Channels(_) => "-ac",
            OutputOption::MovFlags(_) => "-movflags",
            OutputOption::Shortest => "-shortest",
        }
    }

    fn value(&self) -> Option<String> {
        match self {
            OutputOption::VideoCodec(v)
            | OutputOption::AudioCodec(v)
            | OutputOption::PixelFormat(v)
            | OutputOption::Preset(v)
            | OutputOption::Tune(v)
            | OutputOption::MovFlags(v) => Some(v.clone()),
            OutputOption::SampleRate(v) | OutputOption::Channels(v) => Some(v.to_string()),
            OutputOption::Shortest => None,
        }
    }

    /// The stream kind this option configures, if it is stream-specific
    fn applies_to(&self) -> Option<StreamKind> {
        match self {
            OutputOption::VideoCodec(_)
            | OutputOption::PixelFormat(_)
            | OutputOption::Preset(_)
            | OutputOption::Tune(_) => Some(StreamKind::Video),
            OutputOption::AudioCodec(_)
            | OutputOption::SampleRate(_)
            | OutputOption::Channels(_) => Some(StreamKind::Audio),
            OutputOption::MovFlags(_) | OutputOption::Shortest => None,
        }
    }
}

/// Terminal node of a graph: streams to map, destination and encoder options
#[derive(Debug, Clone)]
pub struct OutputSpec {
    streams: Vec<Stream>,
    destination: PathBuf,
    options: Vec<OutputOption>,
    mappings: Option<Vec<String>>,
}

impl OutputSpec {
    pub fn new<P: AsRef<Path>>(streams: Vec<Stream>, destination: P) -> Self {
        Self {
            streams,
            destination: destination.as_ref().to_path_buf(),
            options: Vec::new(),
            mappings: None,
        }
    }

    /// Set an option, replacing an earlier one with the same flag
    pub fn option(mut self, option: OutputOption) -> Self {
        match self.options.iter_mut().find(|o| o.flag() == option.flag()) {
            Some(existing) => *existing = option,
            None => self.options.push(option),
        }
        self
    }

    /// Explicit `-map` specifiers (e.g. `0:v:0`, `1:a:0`) replacing automatic selection
    pub fn mappings<I, S>(mut self, mappings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mappings = Some(mappings.into_iter().map(Into::into).collect());
        self
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn options(&self) -> &[OutputOption] {
        &self.options
    }

    pub fn has_option(&self, flag: &str) -> bool {
        self.options.iter().any(|o| o.flag() == flag)
    }

    /// Linearize inputs, filter graph and output into one job
    pub fn assemble(&self) -> Result<JobArguments> {
        if self.streams.is_empty() {
            return Err(ReelError::Construction(format!(
                "No streams mapped to {}",
                self.destination.display()
            )));
        }

        for (i, stream) in self.streams.iter().enumerate() {
            if self.streams[..i].iter().any(|other| same_stream(other, stream)) {
                return Err(ReelError::Construction(format!(
                    "The same {} stream is mapped twice to {}",
                    stream.kind(),
                    self.destination.display()
                )));
            }
        }

        for option in &self.options {
            if let Some(kind) = option.applies_to() {
                if !self.streams.iter().any(|s| s.kind() == kind) {
                    return Err(ReelError::Construction(format!(
                        "Option {} needs a {} stream in the output",
                        option.flag(),
                        kind
                    )));
                }
            }
        }

        let mut graph = GraphWalk::default();
        for stream in &self.streams {
            graph.visit(stream);
        }
        let inputs = graph.declared_inputs();
        graph.nodes.sort_by_key(|n| n.sequence());

        // Consumers of each filter output, in emission order: filters first, then maps.
        let mut consumers: HashMap<(usize, usize), usize> = HashMap::new();
        for node in &graph.nodes {
            for stream in node.inputs() {
                if let Origin::Filter { node, output } = stream.origin() {
                    *consumers.entry(node_key(node, *output)).or_default() += 1;
                }
            }
        }
        for stream in &self.streams {
            if let Origin::Filter { node, output } = stream.origin() {
                *consumers.entry(node_key(node, *output)).or_default() += 1;
            }
        }

        let mut labels = LabelAllocator::default();
        let mut steps = Vec::new();
        for node in &graph.nodes {
            let step_inputs = node
                .inputs()
                .iter()
                .map(|s| match s.origin() {
                    Origin::Input(source) => {
                        format!("{}:{}", input_index(&inputs, source), s.kind().specifier())
                    }
                    Origin::Filter { node, output } => labels.take(node_key(node, *output)),
                })
                .collect();

            let mut step_outputs = Vec::new();
            let mut splits = Vec::new();
            for (output, kind) in node.outputs().iter().enumerate() {
                let label = labels.fresh();
                step_outputs.push(label.clone());
                let key = node_key(node, output);
                let uses = consumers.get(&key).copied().unwrap_or(0);
                if uses > 1 {
                    let split = match kind {
                        StreamKind::Video => "split",
                        StreamKind::Audio => "asplit",
                    };
                    let branches: Vec<String> =
                        (0..uses).map(|b| format!("{}_{}", label, b)).collect();
                    splits.push(FilterStep {
                        name: split.to_string(),
                        spec: format!("{}={}", split, uses),
                        inputs: vec![label],
                        outputs: branches.clone(),
                    });
                    labels.publish(key, branches);
                } else {
                    labels.publish(key, vec![label]);
                }
            }

            steps.push(FilterStep {
                name: node.name().to_string(),
                spec: node.spec(),
                inputs: step_inputs,
                outputs: step_outputs,
            });
            steps.extend(splits);
        }

        let maps = match &self.mappings {
            Some(explicit) => self.validate_mappings(explicit, inputs.len())?,
            None => self
                .streams
                .iter()
                .map(|s| match s.origin() {
                    Origin::Input(source) => {
                        format!("{}:{}", input_index(&inputs, source), s.kind().specifier())
                    }
                    Origin::Filter { node, output } => {
                        format!("[{}]", labels.take(node_key(node, *output)))
                    }
                })
                .collect(),
        };

        let mut output_args = Vec::new();
        for option in &self.options {
            output_args.push(option.flag().to_string());
            if let Some(value) = option.value() {
                output_args.push(value);
            }
        }

        Ok(JobArguments {
            inputs: inputs
                .iter()
                .map(|source| DeclaredInput {
                    path: source.path().to_path_buf(),
                    options: source.options().to_args(),
                })
                .collect(),
            filters: steps,
            maps,
            output_args,
            destination: self.destination.clone(),
        })
    }

    fn validate_mappings(&self, explicit: &[String], input_count: usize) -> Result<Vec<String>> {
        if let Some(filtered) = self.streams.iter().find(|s| !s.is_input()) {
            return Err(ReelError::Construction(format!(
                "Explicit mappings cannot select the output of filter {}",
                filtered.filter_name().unwrap_or("?")
            )));
        }

        for mapping in explicit {
            let index = mapping
                .split(':')
                .next()
                .and_then(|i| i.parse::<usize>().ok())
                .ok_or_else(|| {
                    ReelError::Construction(format!("Invalid stream mapping: {}", mapping))
                })?;
            if index >= input_count {
                return Err(ReelError::Construction(format!(
                    "Mapping {} refers to input {} but only {} inputs are declared",
                    mapping, index, input_count
                )));
            }
        }

        Ok(explicit.to_vec())
    }
}

fn input_index(inputs: &[Rc<InputSource>], source: &InputSource) -> usize {
    inputs
        .iter()
        .position(|declared| declared.same_source(source))
        .unwrap_or_default()
}

fn node_key(node: &Rc<FilterNode>, output: usize) -> (usize, usize) {
    (Rc::as_ptr(node) as usize, output)
}

fn same_stream(a: &Stream, b: &Stream) -> bool {
    match (a.origin(), b.origin()) {
        (Origin::Input(x), Origin::Input(y)) => a.kind() == b.kind() && x.same_source(y),
        (Origin::Filter { node: x, output: i }, Origin::Filter { node: y, output: j }) => {
            Rc::ptr_eq(x, y) && i == j
        }
        _ => false,
    }
}

/// Collects every input and filter node reachable from the output streams
#[derive(Default)]
struct GraphWalk {
    sources: Vec<Rc<InputSource>>,
    nodes: Vec<Rc<FilterNode>>,
}

impl GraphWalk {
    fn visit(&mut self, stream: &Stream) {
        match stream.origin() {
            Origin::Input(source) => {
                if !self.sources.iter().any(|s| Rc::ptr_eq(s, source)) {
                    self.sources.push(source.clone());
                }
            }
            Origin::Filter { node, .. } => {
                if self.nodes.iter().any(|n| Rc::ptr_eq(n, node)) {
                    return;
                }
                self.nodes.push(node.clone());
                for input in node.inputs() {
                    self.visit(input);
                }
            }
        }
    }

    /// Inputs in declaration order, one per physical source
    fn declared_inputs(&self) -> Vec<Rc<InputSource>> {
        let mut sources = self.sources.clone();
        sources.sort_by_key(|s| s.sequence());
        let mut unique: Vec<Rc<InputSource>> = Vec::new();
        for source in sources {
            if !unique.iter().any(|u| u.same_source(&source)) {
                unique.push(source);
            }
        }
        unique
    }
}

/// Hands out `s0`, `s1`, ... labels and tracks which branch each consumer gets
#[derive(Default)]
struct LabelAllocator {
    next: usize,
    published: HashMap<(usize, usize), (Vec<String>, usize)>,
}

impl LabelAllocator {
    fn fresh(&mut self) -> String {
        let label = format!("s{}", self.next);
        self.next += 1;
        label
    }

    fn publish(&mut self, key: (usize, usize), branches: Vec<String>) {
        self.published.insert(key, (branches, 0));
    }

    fn take(&mut self, key: (usize, usize)) -> String {
        match self.published.get_mut(&key) {
            Some((branches, cursor)) => {
                let label = branches[(*cursor).min(branches.len() - 1)].clone();
                *cursor += 1;
                label
            }
            None => String::new(),
        }
    }
}

/// One declared input with its source options
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredInput {
    pub path: PathBuf,
    pub options: Vec<String>,
}

/// One filter in the serialized graph
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStep {
    pub name: String,
    pub spec: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl fmt::Display for FilterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{}]", input)?;
        }
        write!(f, "{}", self.spec)?;
        for output in &self.outputs {
            write!(f, "[{}]", output)?;
        }
        Ok(())
    }
}

/// Fully linearized job, ready for the runner
#[derive(Debug, Clone, PartialEq)]
pub struct JobArguments {
    inputs: Vec<DeclaredInput>,
    filters: Vec<FilterStep>,
    maps: Vec<String>,
    output_args: Vec<String>,
    destination: PathBuf,
}

impl JobArguments {
    pub fn inputs(&self) -> &[DeclaredInput] {
        &self.inputs
    }

    pub fn filters(&self) -> &[FilterStep] {
        &self.filters
    }

    pub fn maps(&self) -> &[String] {
        &self.maps
    }

    pub fn output_args(&self) -> &[String] {
        &self.output_args
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// `-filter_complex` value, if the job has any filters
    pub fn filter_graph(&self) -> Option<String> {
        if self.filters.is_empty() {
            return None;
        }
        Some(
            self.filters
                .iter()
                .map(|step| step.to_string())
                .collect::<Vec<_>>()
                .join(";"),
        )
    }

    pub fn has_output_flag(&self, flag: &str) -> bool {
        self.output_args.iter().any(|a| a == flag)
    }

    /// Value following an output flag, e.g. `-c:v` -> `libx264`
    pub fn output_value(&self, flag: &str) -> Option<&str> {
        self.output_args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.output_args.get(i + 1))
            .map(String::as_str)
    }

    /// Argument list without the binary name or overwrite flag
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for input in &self.inputs {
            args.extend(input.options.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }
        if let Some(graph) = self.filter_graph() {
            args.push("-filter_complex".to_string());
            args.push(graph);
        }
        for map in &self.maps {
            args.push("-map".to_string());
            args.push(map.clone());
        }
        args.extend(self.output_args.iter().cloned());
        args.push(self.destination.to_string_lossy().to_string());
        args
    }
}

/// Characters a POSIX shell passes through literally outside quotes
fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_./:=+@%,-".contains(c)
}

impl fmt::Display for JobArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self
            .to_args()
            .into_iter()
            .map(|arg| {
                if arg.is_empty() || !arg.chars().all(is_shell_safe) {
                    format!("'{}'", arg.replace('\'', "'\\''"))
                } else {
                    arg
                }
            })
            .collect();
        write!(f, "{}", quoted.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{concat, filter_multi, FilterParams, Input, InputOptions};

    #[test]
    fn test_still_and_narration_job() {
        let image =
            Input::with_options("panel.jpg", InputOptions::new().looped(true).framerate(30));
        let narration = Input::new("narration.wav");
        let v = image
            .video()
            .filter("scale", FilterParams::new().arg(1920).arg(1080))
            .unwrap();

        let job = OutputSpec::new(vec![v, narration.audio()], "out/clip.mp4")
            .option(OutputOption::VideoCodec("libx264".into()))
            .option(OutputOption::PixelFormat("yuv420p".into()))
            .option(OutputOption::AudioCodec("aac".into()))
            .option(OutputOption::Shortest)
            .assemble()
            .unwrap();

        assert_eq!(
            job.to_args(),
            vec![
                "-loop", "1", "-framerate", "30", "-i", "panel.jpg",
                "-i", "narration.wav",
                "-filter_complex", "[0:v]scale=1920:1080[s0]",
                "-map", "[s0]", "-map", "1:a",
                "-c:v", "libx264", "-pix_fmt", "yuv420p", "-c:a", "aac", "-shortest",
                "out/clip.mp4",
            ]
        );
    }

    #[test]
    fn test_inputs_follow_declaration_order() {
        let voice = Input::new("voice.wav");
        let image = Input::new("panel.jpg");

        // Mapped video first, but the voice was declared first.
        let job = OutputSpec::new(vec![image.video(), voice.audio()], "o.mp4")
            .assemble()
            .unwrap();
        let paths: Vec<_> = job.inputs().iter().map(|i| i.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("voice.wav"), PathBuf::from("panel.jpg")]);
        assert_eq!(job.maps(), &["1:v".to_string(), "0:a".to_string()]);
    }

    #[test]
    fn test_equal_inputs_are_declared_once() {
        let v = Input::new("some.mp4").video();
        let a = Input::new("some.mp4").audio();
        let job = OutputSpec::new(vec![v, a], "o.mp4").assemble().unwrap();
        assert_eq!(job.inputs().len(), 1);
        assert_eq!(job.maps(), &["0:v".to_string(), "0:a".to_string()]);
    }

    #[test]
    fn test_chain_serializes_in_order() {
        let v = Input::new("panel.jpg")
            .video()
            .filter("scale", FilterParams::new().arg(3840).arg(-1))
            .unwrap()
            .filter(
                "zoompan",
                FilterParams::new()
                    .set("z", "zoom+0.006")
                    .set("d", 9999)
                    .set("s", "1920x1080")
                    .set("fps", 30),
            )
            .unwrap();

        let job = OutputSpec::new(vec![v], "o.mp4").assemble().unwrap();
        assert_eq!(
            job.filter_graph().unwrap(),
            "[0:v]scale=3840:-1[s0];[s0]zoompan=z=zoom+0.006:d=9999:s=1920x1080:fps=30[s1]"
        );
        assert_eq!(job.maps(), &["[s1]".to_string()]);
    }

    #[test]
    fn test_concat_declares_inputs_before_filter() {
        let clips: Vec<Input> = ["a.mp4", "b.mp4", "c.mp4"].iter().map(Input::new).collect();
        let pairs: Vec<_> = clips.iter().map(|c| (c.video(), c.audio())).collect();
        let (v, a) = concat(&pairs).unwrap();

        let job = OutputSpec::new(vec![v, a], "chapter.mp4").assemble().unwrap();
        assert_eq!(job.inputs().len(), 3);
        assert_eq!(job.filters().len(), 1);
        let step = &job.filters()[0];
        assert_eq!(step.inputs, vec!["0:v", "0:a", "1:v", "1:a", "2:v", "2:a"]);
        assert_eq!(step.outputs.len(), 2);
        assert_eq!(
            job.filter_graph().unwrap(),
            "[0:v][0:a][1:v][1:a][2:v][2:a]concat=n=3:v=1:a=1[s0][s1]"
        );
        assert_eq!(job.maps(), &["[s0]".to_string(), "[s1]".to_string()]);
    }

    #[test]
    fn test_raw_input_reused_by_two_filters() {
        let video = Input::new("clip.mp4");
        let voice = Input::new("narration.wav").audio();
        let music = Input::new("bgm.wav")
            .audio()
            .filter("volume", FilterParams::new().arg(0.4))
            .unwrap();
        let ducked = filter_multi(
            &[music, voice.clone()],
            "sidechaincompress",
            FilterParams::new().set("threshold", 0.1).set("ratio", 8),
        )
        .unwrap();
        let mixed =
            filter_multi(&[ducked, voice], "amix", FilterParams::new().set("inputs", 2)).unwrap();

        let job = OutputSpec::new(vec![video.video(), mixed], "ducked.mp4")
            .option(OutputOption::VideoCodec("copy".into()))
            .assemble()
            .unwrap();
        assert_eq!(
            job.filter_graph().unwrap(),
            "[2:a]volume=0.4[s0];\
             [s0][1:a]sidechaincompress=threshold=0.1:ratio=8[s1];\
             [s1][1:a]amix=inputs=2[s2]"
        );
        assert_eq!(job.maps(), &["0:v".to_string(), "[s2]".to_string()]);
    }

    #[test]
    fn test_filter_output_used_twice_is_split() {
        let music = Input::new("bgm.wav")
            .audio()
            .filter("volume", FilterParams::new().arg(0.5))
            .unwrap();
        let mixed = filter_multi(&[music.clone(), music], "amix", FilterParams::new()).unwrap();

        let job = OutputSpec::new(vec![mixed], "o.wav").assemble().unwrap();
        assert_eq!(
            job.filter_graph().unwrap(),
            "[0:a]volume=0.5[s0];[s0]asplit=2[s0_0][s0_1];[s0_0][s0_1]amix[s1]"
        );
    }

    #[test]
    fn test_explicit_mappings_override_selection() {
        let video = Input::new("clip.mp4");
        let voice = Input::new("voice.wav");
        let job = OutputSpec::new(vec![video.video(), voice.audio()], "dub.mp4")
            .mappings(["0:v:0", "1:a:0"])
            .assemble()
            .unwrap();
        assert_eq!(job.maps(), &["0:v:0".to_string(), "1:a:0".to_string()]);
    }

    #[test]
    fn test_explicit_mapping_errors() {
        let video = Input::new("clip.mp4");
        let bad_index = OutputSpec::new(vec![video.video()], "o.mp4")
            .mappings(["3:v:0"])
            .assemble();
        assert!(matches!(bad_index, Err(ReelError::Construction(_))));

        let scaled = video
            .video()
            .filter("scale", FilterParams::new().arg(640).arg(360))
            .unwrap();
        let filtered = OutputSpec::new(vec![scaled], "o.mp4")
            .mappings(["0:v:0"])
            .assemble();
        assert!(matches!(filtered, Err(ReelError::Construction(_))));
    }

    #[test]
    fn test_output_validation() {
        assert!(OutputSpec::new(vec![], "o.mp4").assemble().is_err());

        let v = Input::new("clip.mp4").video();
        let twice = OutputSpec::new(vec![v.clone(), v.clone()], "o.mp4").assemble();
        assert!(twice.is_err());

        let audio_opt = OutputSpec::new(vec![v], "o.mp4")
            .option(OutputOption::AudioCodec("aac".into()))
            .assemble();
        assert!(matches!(audio_opt, Err(ReelError::Construction(_))));
    }

    #[test]
    fn test_option_replaces_same_flag() {
        let v = Input::new("clip.mp4").video();
        let spec = OutputSpec::new(vec![v], "o.mp4")
            .option(OutputOption::Preset("medium".into()))
            .option(OutputOption::VideoCodec("libx264".into()))
            .option(OutputOption::Preset("veryfast".into()));
        let job = spec.assemble().unwrap();
        assert_eq!(job.output_args(), &["-preset", "veryfast", "-c:v", "libx264"]);
        assert_eq!(job.output_value("-preset"), Some("veryfast"));
    }

    #[test]
    fn test_display_quotes_shell_metacharacters() {
        let job = OutputSpec::new(vec![Input::new("a&b(1).mp4").video()], "o.mp4")
            .assemble()
            .unwrap();
        assert_eq!(job.to_string(), "-i 'a&b(1).mp4' -map 0:v o.mp4");

        let job = OutputSpec::new(vec![Input::new("it's $HOME.mp4").video()], "out/*.mp4")
            .assemble()
            .unwrap();
        assert_eq!(job.to_string(), "-i 'it'\\''s $HOME.mp4' -map 0:v 'out/*.mp4'");
    }

    #[test]
    fn test_display_quotes_graph() {
        let v = Input::new("my panel.jpg")
            .video()
            .filter("scale", FilterParams::new().arg(1280).arg(720))
            .unwrap();
        let job = OutputSpec::new(vec![v], "o.mp4").assemble().unwrap();
        assert_eq!(
            job.to_string(),
            "-i 'my panel.jpg' -filter_complex '[0:v]scale=1280:720[s0]' -map '[s0]' o.mp4"
        );
    }
}
