use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::filter::FilterNode;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Monotonic declaration counter shared by inputs and filter nodes.
///
/// A node can only be created after the streams it consumes, so ordering by
/// sequence is both declaration order and a valid topological order.
pub(crate) fn next_sequence() -> u64 {
    NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Signal type carried by a stream handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    /// Stream specifier suffix used by ffmpeg (`0:v`, `0:a`)
    pub fn specifier(self) -> &'static str {
        match self {
            StreamKind::Video => "v",
            StreamKind::Audio => "a",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Video => write!(f, "video"),
            StreamKind::Audio => write!(f, "audio"),
        }
    }
}

/// Source-level options, emitted before the matching `-i`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputOptions {
    /// Loop the input forever (`-loop 1`), used for still images
    pub loop_input: bool,
    /// Forced input frame rate (`-framerate`)
    pub framerate: Option<u32>,
    /// Seek offset in seconds (`-ss`)
    pub seek: Option<f64>,
    /// Read at most this many seconds (`-t`)
    pub duration: Option<f64>,
}

impl InputOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn looped(mut self, loop_input: bool) -> Self {
        self.loop_input = loop_input;
        self
    }

    pub fn framerate(mut self, fps: u32) -> Self {
        self.framerate = Some(fps);
        self
    }

    pub fn seek(mut self, seconds: f64) -> Self {
        self.seek = Some(seconds);
        self
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub(crate) fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.loop_input {
            args.push("-loop".to_string());
            args.push("1".to_string());
        }
        if let Some(fps) = self.framerate {
            args.push("-framerate".to_string());
            args.push(fps.to_string());
        }
        if let Some(seek) = self.seek {
            args.push("-ss".to_string());
            args.push(seek.to_string());
        }
        if let Some(duration) = self.duration {
            args.push("-t".to_string());
            args.push(duration.to_string());
        }
        args
    }
}

/// A declared input file
#[derive(Debug)]
pub struct InputSource {
    path: PathBuf,
    options: InputOptions,
    sequence: u64,
}

impl InputSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &InputOptions {
        &self.options
    }

    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Same physical input: equal path and equal source options
    pub(crate) fn same_source(&self, other: &InputSource) -> bool {
        self.path == other.path && self.options == other.options
    }
}

/// Handle to a declared input; derive its video and audio streams from it
#[derive(Debug, Clone)]
pub struct Input {
    source: Rc<InputSource>,
}

impl Input {
    /// Declare an input with no source options
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_options(path, InputOptions::default())
    }

    /// Declare an input with source options such as loop and framerate
    pub fn with_options<P: AsRef<Path>>(path: P, options: InputOptions) -> Self {
        Self {
            source: Rc::new(InputSource {
                path: path.as_ref().to_path_buf(),
                options,
                sequence: next_sequence(),
            }),
        }
    }

    pub fn source(&self) -> &InputSource {
        &self.source
    }

    pub fn video(&self) -> Stream {
        Stream::from_input(self.source.clone(), StreamKind::Video)
    }

    pub fn audio(&self) -> Stream {
        Stream::from_input(self.source.clone(), StreamKind::Audio)
    }
}

/// Where a stream handle comes from
#[derive(Debug, Clone)]
pub(crate) enum Origin {
    Input(Rc<InputSource>),
    Filter { node: Rc<FilterNode>, output: usize },
}

/// Immutable reference to one video or audio signal in a filter graph.
///
/// Cloning is cheap; filters never modify the handle they are applied to.
#[derive(Debug, Clone)]
pub struct Stream {
    kind: StreamKind,
    origin: Origin,
}

impl Stream {
    fn from_input(source: Rc<InputSource>, kind: StreamKind) -> Self {
        Self {
            kind,
            origin: Origin::Input(source),
        }
    }

    pub(crate) fn from_filter(node: Rc<FilterNode>, output: usize, kind: StreamKind) -> Self {
        Self {
            kind,
            origin: Origin::Filter { node, output },
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub(crate) fn origin(&self) -> &Origin {
        &self.origin
    }

    /// True when the handle is a raw input stream rather than a filter output
    pub fn is_input(&self) -> bool {
        matches!(self.origin, Origin::Input(_))
    }

    /// Name of the filter that produced this handle, if any
    pub fn filter_name(&self) -> Option<&str> {
        match &self.origin {
            Origin::Input(_) => None,
            Origin::Filter { node, .. } => Some(node.name()),
        }
    }

    /// Number of filters between this handle and its inputs along the first-input path
    pub fn chain_len(&self) -> usize {
        let mut len = 0;
        let mut current = self;
        while let Origin::Filter { node, .. } = &current.origin {
            len += 1;
            match node.inputs().first() {
                Some(next) => current = next,
                None => break,
            }
        }
        len
    }
}
