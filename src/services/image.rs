//! Image helpers used by uploads: thumbnails, EXIF extraction and filename handling.

use chrono::NaiveDate;
use exif::{In, Reader, Tag, Value};
use image::{DynamicImage, ImageFormat, imageops::FilterType};
use std::io::Cursor;
use tracing::debug;

/// Metadata recovered from a photo's EXIF block. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifMetadata {
    pub taken_date: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A JPEG thumbnail plus the dimensions of the source image.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub jpeg: Vec<u8>,
    pub source_width: u32,
    pub source_height: u32,
}

/// Lowercased extension of `filename`, if it has one.
#[must_use]
pub fn file_extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

#[must_use]
pub fn allowed_file_ext(filename: &str, allowed: &[String]) -> bool {
    file_extension(filename)
        .is_some_and(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)))
}

/// Reduce a client supplied filename to a safe basename.
///
/// Path components are dropped, whitespace becomes `_` and anything outside
/// `[A-Za-z0-9._-]` is removed. The result may be empty.
#[must_use]
pub fn secure_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Human readable size, e.g. `"1.5KB"`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sizeof_fmt(num: u64) -> String {
    let mut value = num as f64;
    for unit in ["bytes", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.1}{unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1}TB")
}

/// Decode `bytes`, shrink to fit `max_width` x `max_height` and encode as JPEG.
///
/// Images already inside the box keep their size.
pub fn make_thumbnail(
    bytes: &[u8],
    max_width: u32,
    max_height: u32,
) -> Result<Thumbnail, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let (source_width, source_height) = (img.width(), img.height());

    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let thumb = if source_width > max_width || source_height > max_height {
        rgb.resize(max_width, max_height, FilterType::Lanczos3)
    } else {
        rgb
    };

    let mut out = Cursor::new(Vec::new());
    thumb.write_to(&mut out, ImageFormat::Jpeg)?;

    Ok(Thumbnail {
        jpeg: out.into_inner(),
        source_width,
        source_height,
    })
}

fn ascii_field(exif: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|raw| {
                String::from_utf8_lossy(raw)
                    .trim_matches(|c: char| c == '\0' || c.is_whitespace())
                    .to_string()
            })
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn taken_date(exif: &exif::Exif) -> Option<String> {
    let field = exif
        .get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))?;

    let Value::Ascii(parts) = &field.value else {
        return None;
    };
    let dt = exif::DateTime::from_ascii(parts.first()?).ok()?;

    let naive = NaiveDate::from_ymd_opt(i32::from(dt.year), u32::from(dt.month), u32::from(dt.day))?
        .and_hms_opt(u32::from(dt.hour), u32::from(dt.minute), u32::from(dt.second))?;

    Some(naive.and_utc().to_rfc3339())
}

#[must_use]
pub fn is_valid_latitude(value: f64) -> bool {
    (-90.0..=90.0).contains(&value)
}

#[must_use]
pub fn is_valid_longitude(value: f64) -> bool {
    (-180.0..=180.0).contains(&value)
}

/// Degrees/minutes/seconds rationals to signed decimal degrees.
///
/// Minutes and seconds must be below 60 and the result within `max_degrees`.
fn gps_coordinate(exif: &exif::Exif, value_tag: Tag, ref_tag: Tag, max_degrees: f64) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };
    if parts.len() < 3 || parts.iter().any(|r| r.denom == 0) {
        return None;
    }

    let (degrees, minutes, seconds) = (parts[0].to_f64(), parts[1].to_f64(), parts[2].to_f64());
    if minutes >= 60.0 || seconds >= 60.0 {
        debug!(?value_tag, minutes, seconds, "Discarding malformed GPS coordinate");
        return None;
    }

    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    if decimal > max_degrees {
        debug!(?value_tag, decimal, "Discarding out-of-range GPS coordinate");
        return None;
    }

    let negative = ascii_field(exif, ref_tag)
        .is_some_and(|r| r.eq_ignore_ascii_case("S") || r.eq_ignore_ascii_case("W"));

    Some(if negative { -decimal } else { decimal })
}

/// Read EXIF from an image container. Missing or malformed EXIF yields empty metadata.
#[must_use]
pub fn extract_exif(bytes: &[u8]) -> ExifMetadata {
    let exif = match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(e) => {
            debug!(error = %e, "No usable EXIF data");
            return ExifMetadata::default();
        }
    };

    ExifMetadata {
        taken_date: taken_date(&exif),
        make: ascii_field(&exif, Tag::Make),
        model: ascii_field(&exif, Tag::Model),
        latitude: gps_coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, 90.0),
        longitude: gps_coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, 180.0),
    }
}

/// MIME type from the file extension.
#[must_use]
pub fn content_type_for(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}
