//! Reelkit - fluent ffmpeg jobs for narrated clips
//!
//! Builds filter graphs over symbolic stream handles, linearizes them into a
//! single ffmpeg argument list and runs it: still images with narration,
//! Ken Burns zooms, captions, chapter concatenation and music ducking.

pub mod cli;
pub mod config;
pub mod graph;
pub mod media;
pub mod clip;
pub mod chapter;
pub mod workflow;
pub mod error;
