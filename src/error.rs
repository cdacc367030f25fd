//! Error types for asset loading, export and GPU setup.
//!
//! The per-pixel core never fails; everything here lives at the edges.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WormholeError {
    /// Skybox folder does not exist
    #[error("skybox folder not found: {path}")]
    MissingEnvironment { path: PathBuf },

    /// One of the six cube faces is missing from an otherwise valid folder
    #[error("cube face image missing: {path}")]
    MissingFace { path: PathBuf },

    /// Neither known face naming convention matches the folder contents
    #[error("unknown face naming convention for skybox folder {path}")]
    UnknownFaceNaming { path: PathBuf },

    #[error("failed to read image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid metric parameters: {0}")]
    InvalidMetric(&'static str),

    #[error("invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    /// Cube textures need square faces
    #[error("cube faces must be square, got {width}x{height}")]
    NonSquareFace { width: u32, height: u32 },

    #[error("gpu: {0}")]
    Gpu(String),

    #[error("window: {0}")]
    Window(String),
}

pub type Result<T> = std::result::Result<T, WormholeError>;
