//! Frame validation and decoding

use image::DynamicImage;
use std::sync::Arc;

use crate::config::FrameConfig;
use crate::error::{Error, Result};

/// A validated, decoded client frame
///
/// Keeps the original encoded bytes for remote backends and the decoded
/// image for in-process models. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Frame {
    encoded: Arc<[u8]>,
    image: Arc<DynamicImage>,
}

impl Frame {
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Enforce `[min_bytes, max_bytes]`, both bounds inclusive
pub fn check_size(len: usize, limits: &FrameConfig) -> Result<()> {
    if len > limits.max_bytes {
        return Err(Error::MalformedFrame(format!(
            "Frame too large. Max {} bytes",
            limits.max_bytes
        )));
    }
    if len < limits.min_bytes {
        return Err(Error::MalformedFrame(format!(
            "Frame too small. Min {} bytes",
            limits.min_bytes
        )));
    }
    Ok(())
}

/// Decode an encoded image (any format the `image` crate recognizes)
///
/// CPU-bound; call from a blocking context.
pub fn decode(bytes: Vec<u8>) -> Result<Frame> {
    let image = image::load_from_memory(&bytes)
        .map_err(|_| Error::MalformedFrame("Invalid image data".to_string()))?;

    if image.width() == 0 || image.height() == 0 {
        return Err(Error::MalformedFrame("Invalid image data".to_string()));
    }

    Ok(Frame {
        encoded: Arc::from(bytes),
        image: Arc::new(image),
    })
}
