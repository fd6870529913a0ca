//! GeoTIFF persistence adapter built on the `tiff` crate.
//!
//! Cells are stored as 64-bit floats so every [`RasterElement`] survives a
//! round-trip bit for bit. Reading into an element type that cannot hold a
//! stored sample exactly is an error. Grid metadata is carried in the
//! standard GeoTIFF and GDAL tags:
//! - `ModelPixelScaleTag` + `ModelTiepointTag`, or `ModelTransformationTag`
//!   when the transform has rotation terms
//! - `GeoKeyDirectoryTag` with the EPSG code, or a citation key pointing at
//!   `GeoAsciiParamsTag` for WKT/PROJ definitions
//! - `GdalNodata` for the no-data value

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray64Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_CITATION: u16 = 1026;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_TYPE: u16 = 3072;
const GEO_ASCII_PARAMS: u16 = 34737;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Read a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)?;

    let (width, height) = decoder.dimensions()?;
    let rows = height as usize;
    let cols = width as usize;

    let values: Vec<f64> = match decoder.read_image()? {
        DecodingResult::F64(buf) => buf,
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if values.len() != rows * cols {
        return Err(Error::InvalidInput(format!(
            "TIFF holds {} samples for a {}x{} image (multi-band images are not supported)",
            values.len(),
            cols,
            rows
        )));
    }

    let data: Vec<T> = values
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            cast_exact(v).ok_or_else(|| {
                Error::UnsupportedDataType(format!(
                    "sample {} at row {}, col {} does not fit a {} raster",
                    v,
                    i / cols,
                    i % cols,
                    std::any::type_name::<T>()
                ))
            })
        })
        .collect::<Result<_>>()?;

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(
        decoder
            .get_tag_ascii_string(Tag::GdalNodata)
            .ok()
            .and_then(|s| s.trim().trim_end_matches('\0').parse::<f64>().ok())
            .and_then(cast_exact),
    );

    Ok(raster)
}

/// Convert a stored sample, refusing values the element type would change.
/// Float targets may narrow; every other type must hold `value` exactly.
fn cast_exact<T: RasterElement>(value: f64) -> Option<T> {
    let cast = T::from_f64(value)?;
    (T::is_float() || cast.to_f64() == value).then_some(cast)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
        if m.len() >= 8 {
            return Some(GeoTransform {
                origin_x: m[3],
                origin_y: m[7],
                pixel_width: m[0],
                pixel_height: m[5],
                row_rotation: m[1],
                col_rotation: m[4],
            });
        }
    }

    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    None
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;

    for entry in keys[4..].chunks_exact(4).take(count) {
        let (id, location, len, value) = (entry[0], entry[1], entry[2], entry[3]);
        match id {
            KEY_GEOGRAPHIC_TYPE | KEY_PROJECTED_TYPE if location == 0 => {
                return Some(CRS::from_epsg(value as u32));
            }
            KEY_CITATION if location == GEO_ASCII_PARAMS => {
                let ascii = decoder.get_tag_ascii_string(Tag::GeoAsciiParamsTag).ok()?;
                let start = value as usize;
                let end = (start + len as usize).min(ascii.len());
                let citation = ascii.get(start..end)?.trim_end_matches(&['|', '\0'][..]);
                return CRS::parse(citation);
            }
            _ => {}
        }
    }
    None
}

/// Write a Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let (rows, cols) = raster.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidInput("cannot write an empty raster".to_string()));
    }

    let mut encoder = TiffEncoder::new(writer)?;

    let data: Vec<f64> = raster.data().iter().map(|&v| v.to_f64()).collect();

    let mut image = encoder.new_image::<Gray64Float>(cols as u32, rows as u32)?;

    let gt = raster.transform();
    if gt.row_rotation == 0.0 && gt.col_rotation == 0.0 {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &scale[..])?;

        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        image
            .encoder()
            .write_tag(Tag::ModelTransformationTag, &matrix[..])?;
    }

    let (geokeys, ascii) = build_geokeys(raster.crs());
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())?;
    if let Some(ascii) = ascii {
        image
            .encoder()
            .write_tag(Tag::GeoAsciiParamsTag, ascii.as_str())?;
    }

    if let Some(nodata) = raster.nodata() {
        let text = nodata.to_f64().to_string();
        image.encoder().write_tag(Tag::GdalNodata, text.as_str())?;
    }

    image.write_data(&data)?;

    Ok(())
}

/// GeoKeyDirectory entries for `crs`, plus the GeoAsciiParams payload when
/// the CRS has to travel as a citation string.
fn build_geokeys(crs: Option<&CRS>) -> (Vec<u16>, Option<String>) {
    let model_type = match crs {
        Some(c) if c.is_geographic() => MODEL_TYPE_GEOGRAPHIC,
        _ => MODEL_TYPE_PROJECTED,
    };

    let mut entries: Vec<[u16; 4]> = vec![
        [KEY_MODEL_TYPE, 0, 1, model_type],
        [KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA],
    ];
    let mut ascii = None;

    match crs {
        Some(CRS::Epsg(code)) if *code <= u16::MAX as u32 => {
            let key = if model_type == MODEL_TYPE_GEOGRAPHIC {
                KEY_GEOGRAPHIC_TYPE
            } else {
                KEY_PROJECTED_TYPE
            };
            entries.push([key, 0, 1, *code as u16]);
        }
        Some(other) => {
            let citation = format!("{}|", other.identifier());
            entries.push([
                KEY_CITATION,
                GEO_ASCII_PARAMS,
                citation.len().min(u16::MAX as usize) as u16,
                0,
            ]);
            ascii = Some(citation);
        }
        None => {}
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.iter().flatten());
    (keys, ascii)
}
