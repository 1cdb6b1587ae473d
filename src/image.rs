use std::fs;
use std::path::Path;

use miette::Result;

use crate::error;

/// A parsed object image: a load origin and the words placed there.
///
/// Image files are a stream of big-endian 16-bit words; the first word is
/// the origin and the rest is the payload for origin, origin+1, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub origin: u16,
    pub words: Vec<u16>,
}

impl Image {
    /// Read and parse an image file.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|err| error::image_open(path, err))?;
        Self::parse(path, &bytes)
    }

    /// Parse raw image bytes, swapping each word to host order.
    /// `path` is only used to name the image in error reports.
    pub fn parse(path: &Path, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(error::image_truncated(path));
        }
        if bytes.len() % 2 != 0 {
            return Err(error::image_odd_length(path, bytes.len()));
        }

        let (head, rest) = bytes.split_at(2);
        let origin = u16::from_be_bytes([head[0], head[1]]);
        let words: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();

        if words.is_empty() {
            return Err(error::image_empty(path));
        }
        Ok(Self { origin, words })
    }
}
