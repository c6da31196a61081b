//! Upload validation and normalization.
//!
//! Every accepted upload is re-encoded as an opaque RGB JPEG no larger than
//! [`MAX_DIMENSION`] on either side, so stored avatars are uniform no matter
//! what the client sent.

use std::io::{BufRead, Seek, SeekFrom};

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Rgb, RgbImage, Rgba};
use jpeg_encoder::{ColorType as JpegColor, Encoder, EncodingError};
use thiserror::Error;

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// 5 MiB upload limit
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

pub const MAX_DIMENSION: u32 = 500;

pub const JPEG_QUALITY: u8 = 85;

/// Why an upload was refused. `Display` is the client-facing reason.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Invalid file format")]
    MissingExtension,

    #[error("File type not allowed. Allowed types: {allowed}", allowed = ALLOWED_EXTENSIONS.join(", "))]
    ExtensionNotAllowed { extension: String },

    #[error("File size exceeds 5MB limit")]
    TooLarge { size: u64 },

    #[error("Invalid image file: {0}")]
    Corrupt(image::ImageError),

    #[error("Error validating image: {0}")]
    Unreadable(std::io::Error),

    #[error("Error processing image: {0}")]
    Processing(image::ImageError),

    #[error("Error processing image: {0}")]
    Encoding(EncodingError),
}

/// Check an upload before any processing.
///
/// Runs the extension, size and decode checks in that order. On success the
/// reader is rewound to the start so [`normalize`] can read it again.
pub fn validate_upload<R>(filename: Option<&str>, reader: &mut R) -> Result<(), ImageError>
where
    R: BufRead + Seek,
{
    let extension = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .ok_or(ImageError::MissingExtension)?;

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ImageError::ExtensionNotAllowed { extension });
    }

    let size = reader.seek(SeekFrom::End(0)).map_err(ImageError::Unreadable)?;
    reader.seek(SeekFrom::Start(0)).map_err(ImageError::Unreadable)?;

    if size > MAX_UPLOAD_BYTES {
        return Err(ImageError::TooLarge { size });
    }

    // A full decode catches truncated or malformed bodies that a header
    // sniff would let through.
    ImageReader::new(&mut *reader)
        .with_guessed_format()
        .map_err(ImageError::Unreadable)?
        .decode()
        .map_err(ImageError::Corrupt)?;

    reader.seek(SeekFrom::Start(0)).map_err(ImageError::Unreadable)?;
    Ok(())
}

/// Decode a validated upload and re-encode it as a bounded JPEG.
pub fn normalize<R>(reader: R) -> Result<Vec<u8>, ImageError>
where
    R: BufRead + Seek,
{
    let decoded = ImageReader::new(reader)
        .with_guessed_format()
        .map_err(|e| ImageError::Processing(e.into()))?
        .decode()
        .map_err(ImageError::Processing)?;

    let mut rgb = flatten(decoded);

    if rgb.width() > MAX_DIMENSION || rgb.height() > MAX_DIMENSION {
        rgb = DynamicImage::ImageRgb8(rgb)
            .resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
            .into_rgb8();
    }

    encode_jpeg(&rgb, true)
}

/// Encode RGB pixels at [`JPEG_QUALITY`], optionally with Huffman tables
/// computed for this image instead of the standard ones.
fn encode_jpeg(rgb: &RgbImage, optimize: bool) -> Result<Vec<u8>, ImageError> {
    // Callers have already bounded both sides by MAX_DIMENSION.
    let (width, height) = (rgb.width() as u16, rgb.height() as u16);

    let mut out = Vec::new();
    let mut encoder = Encoder::new(&mut out, JPEG_QUALITY);
    encoder.set_optimized_huffman_tables(optimize);
    encoder
        .encode(rgb.as_raw(), width, height, JpegColor::Rgb)
        .map_err(ImageError::Encoding)?;

    Ok(out)
}

/// Drop any alpha channel by compositing onto opaque white.
///
/// Palette images with transparency already decode to an alpha-bearing type,
/// so they take the compositing path too.
fn flatten(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }

    let rgba = img.into_rgba8();
    let mut out = RgbImage::from_pixel(rgba.width(), rgba.height(), Rgb([255, 255, 255]));
    for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
        let Rgba([r, g, b, a]) = *src;
        *dst = Rgb([over_white(r, a), over_white(g, a), over_white(b, a)]);
    }
    out
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (u16::from(channel), u16::from(alpha));
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, GrayImage, ImageFormat, Luma, RgbaImage};
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 120, 200]));
        encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
    }

    fn decode(bytes: &[u8]) -> DynamicImage {
        image::load_from_memory_with_format(bytes, ImageFormat::Jpeg).unwrap()
    }

    #[test]
    fn accepts_png_and_rewinds() {
        let mut cursor = Cursor::new(png(4, 4));
        cursor.set_position(2);
        validate_upload(Some("me.png"), &mut cursor).unwrap();
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn extension_is_case_insensitive() {
        let mut cursor = Cursor::new(png(4, 4));
        validate_upload(Some("HOLIDAY.PnG"), &mut cursor).unwrap();
    }

    #[test]
    fn rejects_missing_extension() {
        for name in [None, Some("avatar")] {
            let mut cursor = Cursor::new(png(4, 4));
            let err = validate_upload(name, &mut cursor).unwrap_err();
            assert!(matches!(err, ImageError::MissingExtension));
            assert_eq!(err.to_string(), "Invalid file format");
        }
    }

    #[test]
    fn rejects_txt_even_with_image_bytes() {
        let mut cursor = Cursor::new(png(4, 4));
        let err = validate_upload(Some("notes.txt"), &mut cursor).unwrap_err();
        assert!(matches!(err, ImageError::ExtensionNotAllowed { ref extension } if extension == "txt"));
        assert_eq!(
            err.to_string(),
            "File type not allowed. Allowed types: png, jpg, jpeg, gif, webp"
        );
    }

    #[test]
    fn size_limit_is_inclusive() {
        // Exactly at the limit passes the size check and fails on decode.
        let mut at_limit = Cursor::new(vec![0u8; MAX_UPLOAD_BYTES as usize]);
        let err = validate_upload(Some("big.png"), &mut at_limit).unwrap_err();
        assert!(matches!(err, ImageError::Corrupt(_)));

        let mut over_limit = Cursor::new(vec![0u8; MAX_UPLOAD_BYTES as usize + 1]);
        let err = validate_upload(Some("big.png"), &mut over_limit).unwrap_err();
        assert!(matches!(err, ImageError::TooLarge { size } if size == MAX_UPLOAD_BYTES + 1));
        assert_eq!(err.to_string(), "File size exceeds 5MB limit");
    }

    #[test]
    fn rejects_truncated_image() {
        let mut bytes = png(64, 64);
        bytes.truncate(bytes.len() / 2);
        let err = validate_upload(Some("cut.png"), &mut Cursor::new(bytes)).unwrap_err();
        assert!(err.to_string().starts_with("Invalid image file: "));
    }

    #[test]
    fn small_image_keeps_dimensions() {
        let out = normalize(Cursor::new(png(120, 80))).unwrap();
        let img = decode(&out);
        assert_eq!((img.width(), img.height()), (120, 80));
        assert_eq!(img.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn large_image_is_downscaled_with_aspect_ratio() {
        let out = normalize(Cursor::new(png(1200, 600))).unwrap();
        let img = decode(&out);
        assert_eq!((img.width(), img.height()), (500, 250));
    }

    #[test]
    fn tall_image_is_bounded_by_height() {
        let out = normalize(Cursor::new(png(300, 900))).unwrap();
        let img = decode(&out);
        assert_eq!(img.height(), 500);
        assert!(img.width() <= 500);
    }

    #[test]
    fn transparency_becomes_white() {
        let img = RgbaImage::from_pixel(16, 16, Rgba([255, 0, 0, 0]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let out = decode(&normalize(Cursor::new(bytes)).unwrap()).into_rgb8();
        let Rgb([r, g, b]) = *out.get_pixel(8, 8);
        assert!(r > 245 && g > 245 && b > 245, "got {r},{g},{b}");
    }

    #[test]
    fn opaque_pixels_survive_flattening() {
        let img = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 255, 255]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let out = decode(&normalize(Cursor::new(bytes)).unwrap()).into_rgb8();
        let Rgb([r, g, b]) = *out.get_pixel(8, 8);
        assert!(r < 20 && g < 20 && b > 230, "got {r},{g},{b}");
    }

    #[test]
    fn grayscale_is_converted_to_rgb() {
        let img = GrayImage::from_pixel(10, 10, Luma([90]));
        let bytes = encode(DynamicImage::ImageLuma8(img), ImageFormat::Png);

        let out = decode(&normalize(Cursor::new(bytes)).unwrap());
        assert_eq!(out.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn gif_is_accepted_and_normalized() {
        let img = RgbaImage::from_pixel(20, 20, Rgba([0, 200, 0, 255]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Gif);

        let mut cursor = Cursor::new(bytes);
        validate_upload(Some("wave.gif"), &mut cursor).unwrap();
        let out = decode(&normalize(cursor).unwrap());
        assert_eq!((out.width(), out.height()), (20, 20));
    }

    #[test]
    fn palette_transparency_becomes_white() {
        // Two-entry palette: index 0 fully transparent, index 1 opaque blue.
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, 32, 32);
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_palette(vec![255, 0, 0, 0, 0, 255]);
            encoder.set_trns(vec![0, 255]);
            let mut writer = encoder.write_header().unwrap();
            // Top half transparent, bottom half opaque.
            let pixels: Vec<u8> = (0..32 * 32).map(|i| u8::from(i >= 16 * 32)).collect();
            writer.write_image_data(&pixels).unwrap();
        }

        let mut cursor = Cursor::new(bytes);
        validate_upload(Some("indexed.png"), &mut cursor).unwrap();
        let out = decode(&normalize(cursor).unwrap()).into_rgb8();

        let Rgb([r, g, b]) = *out.get_pixel(8, 4);
        assert!(r > 245 && g > 245 && b > 245, "transparent row got {r},{g},{b}");
        let Rgb([r, g, b]) = *out.get_pixel(8, 28);
        assert!(r < 20 && g < 20 && b > 230, "opaque row got {r},{g},{b}");
    }

    #[test]
    fn optimized_tables_are_no_larger() {
        let img = RgbImage::from_fn(200, 200, |x, y| {
            let v = x.wrapping_mul(31) ^ y.wrapping_mul(17);
            Rgb([(v % 251) as u8, (v * 7 % 241) as u8, (x + y) as u8])
        });

        let optimized = encode_jpeg(&img, true).unwrap();
        let baseline = encode_jpeg(&img, false).unwrap();
        assert!(optimized.len() <= baseline.len(), "{} > {}", optimized.len(), baseline.len());
        assert_eq!(decode(&optimized).dimensions(), (200, 200));
    }

    #[test]
    fn over_white_blends() {
        assert_eq!(over_white(0, 255), 0);
        assert_eq!(over_white(0, 0), 255);
        assert_eq!(over_white(200, 255), 200);
        assert_eq!(over_white(0, 128), 127);
    }
}
