use std::ops::RangeInclusive;
use std::rc::Rc;

use super::stream::{next_sequence, Stream, StreamKind};
use crate::error::{Result, ReelError};

/// Characters escaped inside a single option value
const VALUE_SPECIALS: &[char] = &['\\', '\'', '=', ':'];
/// Characters escaped at the filter-graph level
const GRAPH_SPECIALS: &[char] = &['\\', '\'', '[', ']', ',', ';'];

/// Definition of a filter this crate knows how to emit
struct FilterDef {
    name: &'static str,
    kind: StreamKind,
    inputs: RangeInclusive<usize>,
    positional: usize,
    keys: &'static [&'static str],
}

const FILTERS: &[FilterDef] = &[
    FilterDef {
        name: "scale",
        kind: StreamKind::Video,
        inputs: 1..=1,
        positional: 2,
        keys: &["w", "h", "flags", "force_original_aspect_ratio"],
    },
    FilterDef {
        name: "zoompan",
        kind: StreamKind::Video,
        inputs: 1..=1,
        positional: 0,
        keys: &["z", "zoom", "x", "y", "d", "s", "fps"],
    },
    FilterDef {
        name: "drawtext",
        kind: StreamKind::Video,
        inputs: 1..=1,
        positional: 0,
        keys: &[
            "text", "fontfile", "fontcolor", "fontsize", "x", "y", "box", "boxcolor",
            "boxborderw", "enable",
        ],
    },
    FilterDef {
        name: "volume",
        kind: StreamKind::Audio,
        inputs: 1..=1,
        positional: 1,
        keys: &["volume", "precision"],
    },
    FilterDef {
        name: "sidechaincompress",
        kind: StreamKind::Audio,
        inputs: 2..=2,
        positional: 0,
        keys: &[
            "threshold", "ratio", "attack", "release", "makeup", "knee", "level_in", "level_sc",
            "mix",
        ],
    },
    FilterDef {
        name: "amix",
        kind: StreamKind::Audio,
        inputs: 2..=32,
        positional: 0,
        keys: &["inputs", "duration", "dropout_transition", "weights", "normalize"],
    },
    FilterDef {
        name: "atrim",
        kind: StreamKind::Audio,
        inputs: 1..=1,
        positional: 0,
        keys: &["start", "end", "duration"],
    },
    FilterDef {
        name: "asetpts",
        kind: StreamKind::Audio,
        inputs: 1..=1,
        positional: 1,
        keys: &["expr"],
    },
];

fn lookup(name: &str) -> Option<&'static FilterDef> {
    FILTERS.iter().find(|def| def.name == name)
}

/// Positional values followed by ordered keyword options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterParams {
    positional: Vec<String>,
    named: Vec<(String, String)>,
}

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional value
    pub fn arg<V: ToString>(mut self, value: V) -> Self {
        self.positional.push(value.to_string());
        self
    }

    /// Set a keyword option, replacing an earlier value for the same key in place
    pub fn set<V: ToString>(mut self, key: &str, value: V) -> Self {
        let value = value.to_string();
        match self.named.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.named.push((key.to_string(), value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.named
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    /// `a:b:key=value` with each value escaped, then escaped for the graph
    pub(crate) fn serialize(&self) -> String {
        let parts: Vec<String> = self
            .positional
            .iter()
            .map(|v| escape(v, VALUE_SPECIALS))
            .chain(self.named.iter().map(|(k, v)| {
                format!("{}={}", escape(k, VALUE_SPECIALS), escape(v, VALUE_SPECIALS))
            }))
            .collect();
        escape(&parts.join(":"), GRAPH_SPECIALS)
    }
}

fn escape(text: &str, specials: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if specials.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// One filter application in the graph
#[derive(Debug)]
pub struct FilterNode {
    name: String,
    params: FilterParams,
    inputs: Vec<Stream>,
    outputs: Vec<StreamKind>,
    sequence: u64,
}

impl FilterNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    pub fn inputs(&self) -> &[Stream] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[StreamKind] {
        &self.outputs
    }

    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }

    /// `name` or `name=params` as it appears in a filter chain
    pub(crate) fn spec(&self) -> String {
        let params = self.params.serialize();
        if params.is_empty() {
            self.name.clone()
        } else {
            format!("{}={}", self.name, params)
        }
    }
}

impl Stream {
    /// Apply a single-input filter, yielding a new handle of the same kind
    pub fn filter(&self, name: &str, params: FilterParams) -> Result<Stream> {
        filter_multi(std::slice::from_ref(self), name, params)
    }
}

/// Apply a filter that consumes several streams, in the order given.
///
/// For asymmetric filters the order is significant: `sidechaincompress`
/// compresses its first input using the second as the trigger.
pub fn filter_multi(inputs: &[Stream], name: &str, params: FilterParams) -> Result<Stream> {
    let def = lookup(name).ok_or_else(|| {
        if name == "concat" {
            ReelError::Construction("concat must be built with graph::concat".to_string())
        } else {
            ReelError::Construction(format!("Unknown filter: {}", name))
        }
    })?;

    if !def.inputs.contains(&inputs.len()) {
        return Err(ReelError::Construction(format!(
            "Filter {} takes {}..={} input streams, got {}",
            name,
            def.inputs.start(),
            def.inputs.end(),
            inputs.len()
        )));
    }

    if let Some(bad) = inputs.iter().find(|s| s.kind() != def.kind) {
        return Err(ReelError::Construction(format!(
            "Filter {} requires {} input, got {}",
            name,
            def.kind,
            bad.kind()
        )));
    }

    if params.positional.len() > def.positional {
        return Err(ReelError::Construction(format!(
            "Filter {} accepts at most {} positional values, got {}",
            name,
            def.positional,
            params.positional.len()
        )));
    }

    if let Some((key, _)) = params.named.iter().find(|(k, _)| !def.keys.contains(&k.as_str())) {
        return Err(ReelError::Construction(format!(
            "Filter {} does not recognize option {}",
            name, key
        )));
    }

    if name == "amix" {
        if let Some(declared) = params.get("inputs") {
            if declared != inputs.len().to_string() {
                return Err(ReelError::Construction(format!(
                    "amix declares inputs={} but is given {} streams",
                    declared,
                    inputs.len()
                )));
            }
        }
    }

    let node = Rc::new(FilterNode {
        name: name.to_string(),
        params,
        inputs: inputs.to_vec(),
        outputs: vec![def.kind],
        sequence: next_sequence(),
    });
    Ok(Stream::from_filter(node, 0, def.kind))
}

/// Join N (video, audio) pairs end to end into one (video, audio) pair
pub fn concat(pairs: &[(Stream, Stream)]) -> Result<(Stream, Stream)> {
    if pairs.is_empty() {
        return Err(ReelError::Construction(
            "concat needs at least one (video, audio) pair".to_string(),
        ));
    }

    let mut inputs = Vec::with_capacity(pairs.len() * 2);
    for (index, (video, audio)) in pairs.iter().enumerate() {
        if video.kind() != StreamKind::Video || audio.kind() != StreamKind::Audio {
            return Err(ReelError::Construction(format!(
                "concat pair {} must be (video, audio), got ({}, {})",
                index,
                video.kind(),
                audio.kind()
            )));
        }
        inputs.push(video.clone());
        inputs.push(audio.clone());
    }

    let params = FilterParams::new()
        .set("n", pairs.len())
        .set("v", 1)
        .set("a", 1);

    let node = Rc::new(FilterNode {
        name: "concat".to_string(),
        params,
        inputs,
        outputs: vec![StreamKind::Video, StreamKind::Audio],
        sequence: next_sequence(),
    });

    Ok((
        Stream::from_filter(node.clone(), 0, StreamKind::Video),
        Stream::from_filter(node, 1, StreamKind::Audio),
    ))
}
