use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("cannot open {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("no video stream found")]
    NoVideoStream,
    #[error("reader used before open")]
    NotOpened,
    #[error("decoding failed at frame {frame}: {reason}")]
    Decode { frame: usize, reason: String },
    #[error("no frames could be decoded")]
    NoFrames,
    #[error("frame decoder stopped unexpectedly")]
    DecoderPanicked,
}
