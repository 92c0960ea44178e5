//! Raster image embedding
//!
//! Decoded images are stored as Flate-compressed 8-bit RGB Image XObjects. Alpha
//! goes into a DeviceGray soft mask, only when the image actually has transparency.

use crate::types::Result;
use image::DynamicImage;
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

/// Embed an image and return the Image XObject id
pub fn embed_image(doc: &mut Document, img: &DynamicImage) -> Result<ObjectId> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixel_count = (width as usize) * (height as usize);

    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };

    if alpha.iter().any(|&a| a < u8::MAX) {
        let mut smask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        );
        smask.compress()?;
        let smask_id = doc.add_object(smask);
        image_dict.set("SMask", Object::Reference(smask_id));
    }

    let mut image = Stream::new(image_dict, rgb);
    image.compress()?;
    Ok(doc.add_object(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_opaque_image_has_no_smask() {
        let mut doc = Document::with_version("1.7");
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 32, Rgba([10, 20, 30, 255])));

        let id = embed_image(&mut doc, &img).unwrap();
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();

        assert!(!stream.dict.has(b"SMask"));
        assert_eq!(stream.dict.get(b"Width").unwrap().as_i64().unwrap(), 64);
        assert_eq!(stream.dict.get(b"Height").unwrap().as_i64().unwrap(), 32);

        let pixels = stream.decompressed_content().unwrap();
        assert_eq!(pixels.len(), 64 * 32 * 3);
        assert_eq!(&pixels[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_pixel_data_is_flate_compressed() {
        let mut doc = Document::with_version("1.7");
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(200, 150, Rgba([90, 90, 90, 64])));

        let id = embed_image(&mut doc, &img).unwrap();
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        let smask_id = stream.dict.get(b"SMask").unwrap().as_reference().unwrap();
        let smask = doc.get_object(smask_id).unwrap().as_stream().unwrap();

        for s in [stream, smask] {
            assert_eq!(s.dict.get(b"Filter").unwrap().as_name().unwrap(), b"FlateDecode");
        }
        assert!(stream.content.len() < 200 * 150 * 3 / 10);
        assert!(smask.content.len() < 200 * 150 / 10);
    }

    #[test]
    fn test_transparent_image_gets_smask() {
        let mut doc = Document::with_version("1.7");
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(30, 30, Rgba([0, 0, 0, 128])));

        let id = embed_image(&mut doc, &img).unwrap();
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        let smask_id = stream.dict.get(b"SMask").unwrap().as_reference().unwrap();
        let smask = doc.get_object(smask_id).unwrap().as_stream().unwrap();

        assert_eq!(smask.decompressed_content().unwrap(), vec![128; 900]);
    }
}
