//! Freehand snapshot decoding and print enhancement
//!
//! Canvas snapshots arrive as PNG bytes (often wrapped in a base64 data
//! URL). Before embedding, pixels get a print-oriented enhancement pass and
//! are split into an RGB image plus a grayscale alpha mask, both
//! Flate-compressed for the PDF image XObject pair.

use crate::error::RasterError;
use base64::Engine;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Object, Stream};
use std::io::Write;

const RGB_BOOST: f32 = 1.2;
const ALPHA_BOOST: f32 = 1.3;

/// Strip a `data:image/png;base64,` prefix and decode the payload. Returns
/// `None` when the input is not a base64 PNG data URL.
pub fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    let payload = url.strip_prefix("data:image/png;base64,")?;
    base64::engine::general_purpose::STANDARD.decode(payload).ok()
}

/// A decoded snapshot, normalized to 8-bit RGBA.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    /// Decode PNG bytes, expanding palette/grayscale variants and reducing
    /// 16-bit channels so downstream code only ever sees RGBA8.
    pub fn from_png(bytes: &[u8]) -> Result<Self, RasterError> {
        let mut decoder = png::Decoder::new(std::io::Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder
            .read_info()
            .map_err(|e| RasterError::DecodeError(e.to_string()))?;

        let mut buf = vec![0u8; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| RasterError::DecodeError(e.to_string()))?;
        buf.truncate(info.buffer_size());

        let rgba = match info.color_type {
            png::ColorType::Rgba => buf,
            png::ColorType::Rgb => buf
                .chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 255])
                .collect(),
            png::ColorType::GrayscaleAlpha => buf
                .chunks_exact(2)
                .flat_map(|px| [px[0], px[0], px[0], px[1]])
                .collect(),
            png::ColorType::Grayscale => buf
                .iter()
                .flat_map(|&g| [g, g, g, 255])
                .collect(),
            other => {
                return Err(RasterError::UnsupportedFormat(format!(
                    "unexpected color type {other:?}"
                )))
            }
        };

        Ok(Self {
            width: info.width,
            height: info.height,
            rgba,
        })
    }

    /// Boost color and opacity so screen-authored strokes hold up in print.
    /// RGB channels scale by 1.2 and alpha by 1.3, both clamped; fully
    /// transparent pixels stay transparent.
    pub fn enhance(&mut self) {
        for px in self.rgba.chunks_exact_mut(4) {
            if px[3] == 0 {
                continue;
            }
            px[0] = boost(px[0], RGB_BOOST);
            px[1] = boost(px[1], RGB_BOOST);
            px[2] = boost(px[2], RGB_BOOST);
            px[3] = boost(px[3], ALPHA_BOOST);
        }
    }

    /// True if every pixel is fully transparent, meaning the snapshot would
    /// contribute nothing to the composite.
    pub fn is_blank(&self) -> bool {
        self.rgba.chunks_exact(4).all(|px| px[3] == 0)
    }

    /// Split into Flate-compressed image XObjects: a DeviceRGB image whose
    /// SMask is the DeviceGray alpha channel.
    pub fn to_xobjects(&self) -> Result<(Stream, Stream), RasterError> {
        let mut rgb = Vec::with_capacity(self.rgba.len() / 4 * 3);
        let mut alpha = Vec::with_capacity(self.rgba.len() / 4);
        for px in self.rgba.chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
            alpha.push(px[3]);
        }

        let smask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => self.width as i64,
                "Height" => self.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&alpha)?,
        );

        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => self.width as i64,
                "Height" => self.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
                // SMask reference is patched in once the mask has an object id.
                "SMask" => Object::Null,
            },
            deflate(&rgb)?,
        );

        Ok((image, smask))
    }
}

fn boost(channel: u8, factor: f32) -> u8 {
    (channel as f32 * factor).min(255.0) as u8
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, RasterError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| RasterError::CompressError(e.to_string()))
}
