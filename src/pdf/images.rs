use std::{
    fs,
    path::{Path, PathBuf},
};

use lopdf::{
    Document, Object, Stream, StringFormat,
    content::{Content, Operation},
    dictionary,
};

use super::{PdfError, PdfResult, write_document};

const A4_WIDTH_PT: f32 = 595.0;
const A4_HEIGHT_PT: f32 = 842.0;
const A4_MARGIN_PT: f32 = 36.0;
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    /// Lay every image out on an A4 page matching its orientation, scaled to
    /// fill the printable area. Without it each page takes the image's pixel
    /// size at 72 dpi.
    pub enhance: bool,
}

/// Builds one page per image, in order, and writes the document to `output`.
///
/// Returns the number of pages written.
pub fn images_to_pdf(
    inputs: &[PathBuf],
    output: &Path,
    options: ConvertOptions,
) -> PdfResult<usize> {
    if inputs.is_empty() {
        return Err(PdfError::NoInputs);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(inputs.len());

    for path in inputs {
        let bytes = fs::read(path).map_err(|source| PdfError::Read {
            path: path.clone(),
            source,
        })?;
        let image = EmbeddedImage::parse(path, bytes)?;
        let placement = Placement::for_image(image.width, image.height, options);

        let mut xobject = Stream::new(image.dictionary(), image.data);
        // Already encoded; recompressing would corrupt the filter chain.
        xobject.allows_compression = false;
        let image_id = doc.add_object(xobject);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        placement.draw_width.into(),
                        Object::Integer(0),
                        Object::Integer(0),
                        placement.draw_height.into(),
                        placement.offset_x.into(),
                        placement.offset_y.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                placement.page_width.into(),
                placement.page_height.into(),
            ],
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count as i64),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.compress();
    write_document(&mut doc, output)?;

    Ok(page_count)
}

#[derive(Debug, Clone, PartialEq)]
struct Placement {
    page_width: f32,
    page_height: f32,
    draw_width: f32,
    draw_height: f32,
    offset_x: f32,
    offset_y: f32,
}

impl Placement {
    fn for_image(width: u32, height: u32, options: ConvertOptions) -> Self {
        let (width, height) = (width as f32, height as f32);

        if !options.enhance {
            return Self {
                page_width: width,
                page_height: height,
                draw_width: width,
                draw_height: height,
                offset_x: 0.0,
                offset_y: 0.0,
            };
        }

        let (page_width, page_height) = if width > height {
            (A4_HEIGHT_PT, A4_WIDTH_PT)
        } else {
            (A4_WIDTH_PT, A4_HEIGHT_PT)
        };
        let box_width = page_width - 2.0 * A4_MARGIN_PT;
        let box_height = page_height - 2.0 * A4_MARGIN_PT;
        let scale = (box_width / width).min(box_height / height);
        let draw_width = width * scale;
        let draw_height = height * scale;

        Self {
            page_width,
            page_height,
            draw_width,
            draw_height,
            offset_x: (page_width - draw_width) / 2.0,
            offset_y: (page_height - draw_height) / 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed { palette: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
enum Encoding {
    Dct,
    Flate { colors: u8 },
}

/// Image data ready to be embedded as an XObject without re-encoding.
#[derive(Debug)]
struct EmbeddedImage {
    width: u32,
    height: u32,
    bits_per_component: u8,
    color_space: ColorSpace,
    encoding: Encoding,
    data: Vec<u8>,
}

impl EmbeddedImage {
    fn parse(path: &Path, bytes: Vec<u8>) -> PdfResult<Self> {
        if bytes.starts_with(&[0xff, 0xd8]) {
            parse_jpeg(path, bytes)
        } else if bytes.starts_with(&PNG_SIGNATURE) {
            parse_png(path, &bytes)
        } else {
            Err(PdfError::unsupported_image(
                path,
                "only JPEG and PNG images are supported",
            ))
        }
    }

    fn dictionary(&self) -> lopdf::Dictionary {
        let color_space: Object = match &self.color_space {
            ColorSpace::Gray => "DeviceGray".into(),
            ColorSpace::Rgb => "DeviceRGB".into(),
            ColorSpace::Cmyk => "DeviceCMYK".into(),
            ColorSpace::Indexed { palette } => Object::Array(vec![
                Object::Name(b"Indexed".to_vec()),
                Object::Name(b"DeviceRGB".to_vec()),
                Object::Integer((palette.len() / 3) as i64 - 1),
                Object::String(palette.clone(), StringFormat::Hexadecimal),
            ]),
        };

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(self.width as i64),
            "Height" => Object::Integer(self.height as i64),
            "BitsPerComponent" => Object::Integer(self.bits_per_component as i64),
            "ColorSpace" => color_space,
        };

        match self.encoding {
            Encoding::Dct => {
                dict.set("Filter", "DCTDecode");
                if self.color_space == ColorSpace::Cmyk {
                    // Adobe CMYK JPEGs store inverted samples.
                    dict.set(
                        "Decode",
                        [1, 0, 1, 0, 1, 0, 1, 0]
                            .into_iter()
                            .map(Object::Integer)
                            .collect::<Vec<_>>(),
                    );
                }
            }
            Encoding::Flate { colors } => {
                dict.set("Filter", "FlateDecode");
                dict.set(
                    "DecodeParms",
                    dictionary! {
                        "Predictor" => Object::Integer(15),
                        "Colors" => Object::Integer(colors as i64),
                        "BitsPerComponent" => Object::Integer(self.bits_per_component as i64),
                        "Columns" => Object::Integer(self.width as i64),
                    },
                );
            }
        }

        dict
    }
}

fn parse_jpeg(path: &Path, bytes: Vec<u8>) -> PdfResult<EmbeddedImage> {
    let mut pos = 2;

    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xff {
            return Err(PdfError::unsupported_image(path, "corrupt JPEG marker"));
        }
        let marker = bytes[pos + 1];
        if marker == 0xff {
            pos += 1;
            continue;
        }
        if marker == 0xd8 || marker == 0x01 || (0xd0..=0xd7).contains(&marker) {
            pos += 2;
            continue;
        }

        let length = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        let is_frame_header =
            (0xc0..=0xcf).contains(&marker) && !matches!(marker, 0xc4 | 0xc8 | 0xcc);

        if is_frame_header {
            let segment = bytes
                .get(pos + 4..pos + 2 + length)
                .filter(|segment| segment.len() >= 6)
                .ok_or_else(|| PdfError::unsupported_image(path, "truncated JPEG frame header"))?;
            let bits_per_component = segment[0];
            let height = u16::from_be_bytes([segment[1], segment[2]]) as u32;
            let width = u16::from_be_bytes([segment[3], segment[4]]) as u32;
            let color_space = match segment[5] {
                1 => ColorSpace::Gray,
                3 => ColorSpace::Rgb,
                4 => ColorSpace::Cmyk,
                n => {
                    return Err(PdfError::unsupported_image(
                        path,
                        format!("JPEG with {n} colour components"),
                    ));
                }
            };
            if width == 0 || height == 0 {
                return Err(PdfError::unsupported_image(path, "JPEG has no dimensions"));
            }

            return Ok(EmbeddedImage {
                width,
                height,
                bits_per_component,
                color_space,
                encoding: Encoding::Dct,
                data: bytes,
            });
        }

        if marker == 0xd9 || marker == 0xda {
            break;
        }
        pos += 2 + length;
    }

    Err(PdfError::unsupported_image(
        path,
        "JPEG frame header not found",
    ))
}

fn parse_png(path: &Path, bytes: &[u8]) -> PdfResult<EmbeddedImage> {
    let mut pos = PNG_SIGNATURE.len();
    let mut header: Option<(u32, u32, u8, u8)> = None;
    let mut palette = Vec::new();
    let mut data = Vec::new();

    while pos + 8 <= bytes.len() {
        let length =
            u32::from_be_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
                as usize;
        let kind = &bytes[pos + 4..pos + 8];
        let body = bytes
            .get(pos + 8..pos + 8 + length)
            .ok_or_else(|| PdfError::unsupported_image(path, "truncated PNG chunk"))?;

        match kind {
            b"IHDR" => {
                if body.len() < 13 {
                    return Err(PdfError::unsupported_image(path, "short PNG header"));
                }
                let width = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
                let height = u32::from_be_bytes([body[4], body[5], body[6], body[7]]);
                let (bit_depth, color_type, interlace) = (body[8], body[9], body[12]);
                if interlace != 0 {
                    return Err(PdfError::unsupported_image(path, "interlaced PNG"));
                }
                header = Some((width, height, bit_depth, color_type));
            }
            b"PLTE" => palette.extend_from_slice(body),
            b"IDAT" => data.extend_from_slice(body),
            b"IEND" => break,
            _ => {}
        }

        // length + type + body + crc
        pos += 12 + length;
    }

    let (width, height, bits_per_component, color_type) =
        header.ok_or_else(|| PdfError::unsupported_image(path, "PNG header missing"))?;

    let (color_space, colors) = match color_type {
        0 => (ColorSpace::Gray, 1),
        2 => (ColorSpace::Rgb, 3),
        3 => {
            if palette.is_empty() || palette.len() % 3 != 0 {
                return Err(PdfError::unsupported_image(path, "PNG palette is invalid"));
            }
            (ColorSpace::Indexed { palette }, 1)
        }
        4 | 6 => {
            return Err(PdfError::unsupported_image(
                path,
                "PNG images with an alpha channel are not supported",
            ));
        }
        other => {
            return Err(PdfError::unsupported_image(
                path,
                format!("unknown PNG colour type {other}"),
            ));
        }
    };

    if data.is_empty() || width == 0 || height == 0 {
        return Err(PdfError::unsupported_image(path, "PNG has no image data"));
    }

    Ok(EmbeddedImage {
        width,
        height,
        bits_per_component,
        color_space,
        encoding: Encoding::Flate { colors },
        data,
    })
}
