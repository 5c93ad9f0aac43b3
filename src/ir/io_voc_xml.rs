//! Pascal VOC XML reader and writer.
//!
//! One XML document describes one image. Boxes are stored as
//! `<xmin><ymin><xmax><ymax>` corners in absolute pixels and categories as
//! bare `<name>` strings, so every name goes through the registry and repeated
//! names collapse onto one id.
//!
//! A missing `<size>` block (or one with a zero dimension, which annotation
//! tools write when they never looked at the image) is filled in by the
//! image-size probe from [`DecodeOptions`]; without a probe the decode fails
//! with [`AnnoconvError::MissingImageSize`].

use std::fmt::Write as _;

use roxmltree::Node;

use super::adapter::{single_image, Capabilities, DecodeOptions, FormatAdapter};
use super::model::{CanonicalImage, ImageMeta};
use super::registry::CategoryRegistry;
use super::BoundingBox;
use crate::error::AnnoconvError;

const FORMAT: &str = "Pascal VOC XML";
const DEFAULT_DEPTH: u32 = 3;

/// Parses one VOC document into a canonical image.
///
/// The image takes `options.image_id`. When the document has no
/// `<filename>`, `options.file_name` (or an empty name) is used instead.
///
/// # Errors
/// - [`AnnoconvError::MalformedInput`] for bad XML, a wrong root element,
///   missing `<name>`/`<bndbox>` nodes or non-numeric coordinates
/// - [`AnnoconvError::InvalidGeometry`] for inverted or empty boxes
/// - [`AnnoconvError::MissingImageSize`] / [`AnnoconvError::ImageUnreadable`]
///   when the size has to be probed and cannot be
/// - [`AnnoconvError::UnknownCategoryName`] for a new name when creation is denied
pub fn from_voc_xml_str(
    xml: &str,
    registry: &mut CategoryRegistry,
    options: &DecodeOptions<'_>,
) -> Result<CanonicalImage, AnnoconvError> {
    let parsed = parse_voc_xml_str(xml)?;
    registry.transaction(|staged| voc_to_canonical(parsed, staged, options))
}

/// Parses VOC XML from bytes.
///
/// The input must be valid UTF-8.
pub fn from_voc_xml_slice(
    bytes: &[u8],
    registry: &mut CategoryRegistry,
    options: &DecodeOptions<'_>,
) -> Result<CanonicalImage, AnnoconvError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| {
        AnnoconvError::malformed(FORMAT, format!("input is not valid UTF-8: {source}"))
    })?;
    from_voc_xml_str(xml, registry, options)
}

/// Writes one canonical image as a VOC document.
///
/// # Errors
/// [`AnnoconvError::UnknownCategoryId`] if an annotation's category is not in
/// `registry`.
pub fn to_voc_xml_string(
    image: &CanonicalImage,
    registry: &CategoryRegistry,
) -> Result<String, AnnoconvError> {
    let mut objects = Vec::with_capacity(image.annotations().len());
    for annotation in image.annotations() {
        let category = registry.resolve_id(annotation.category_id())?;
        objects.push((category.name(), annotation.bbox()));
    }

    let mut xml = String::new();
    write_voc_xml(&mut xml, image.meta(), &objects)
        .map_err(|_| AnnoconvError::malformed(FORMAT, "failed to format document"))?;
    Ok(xml)
}

/// The Pascal VOC adapter.
#[derive(Clone, Copy, Debug, Default)]
pub struct VocXml;

impl FormatAdapter for VocXml {
    fn name(&self) -> &'static str {
        "voc"
    }

    fn extension(&self) -> &'static str {
        "xml"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            preserves_categories: true,
            preserves_supercategories: false,
            preserves_file_name: true,
            preserves_crowd: false,
            multi_image: false,
        }
    }

    fn decode(
        &self,
        raw: &str,
        registry: &mut CategoryRegistry,
        options: &DecodeOptions<'_>,
    ) -> Result<Vec<CanonicalImage>, AnnoconvError> {
        from_voc_xml_str(raw, registry, options).map(|image| vec![image])
    }

    fn encode(
        &self,
        images: &[CanonicalImage],
        registry: &CategoryRegistry,
    ) -> Result<String, AnnoconvError> {
        to_voc_xml_string(single_image(FORMAT, images)?, registry)
    }
}

#[derive(Debug)]
struct ParsedVocAnnotation {
    filename: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    depth: Option<u32>,
    objects: Vec<ParsedVocObject>,
}

#[derive(Debug)]
struct ParsedVocObject {
    name: String,
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

fn voc_to_canonical(
    parsed: ParsedVocAnnotation,
    registry: &mut CategoryRegistry,
    options: &DecodeOptions<'_>,
) -> Result<CanonicalImage, AnnoconvError> {
    let file_name = parsed
        .filename
        .or_else(|| options.file_name.map(str::to_string))
        .unwrap_or_default();

    let (width, height) = match (parsed.width, parsed.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => (width, height),
        _ => options.probe_size(&file_name)?,
    };

    let mut meta = ImageMeta::new(options.image_id, file_name, width, height)?;
    if let Some(depth) = parsed.depth.filter(|depth| *depth > 0) {
        meta = meta.with_depth(depth);
    }

    let mut image = CanonicalImage::new(meta);
    for object in parsed.objects {
        let category = registry.resolve_name(&object.name, options.creation)?;
        let bbox = BoundingBox::from_corners(object.xmin, object.ymin, object.xmax, object.ymax)?;
        image.add_annotation(registry, &category, bbox, false)?;
    }

    Ok(image)
}

fn parse_voc_xml_str(xml: &str) -> Result<ParsedVocAnnotation, AnnoconvError> {
    let document = roxmltree::Document::parse(xml)
        .map_err(|source| AnnoconvError::malformed(FORMAT, source.to_string()))?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(AnnoconvError::malformed(
            FORMAT,
            "missing <annotation> root element",
        ));
    }

    let filename = optional_child_text(annotation, "filename");

    let (width, height, depth) = match child_element(annotation, "size") {
        Some(size) => (
            parse_optional_u32(size, "width")?,
            parse_optional_u32(size, "height")?,
            parse_optional_u32(size, "depth")?,
        ),
        None => (None, None, None),
    };

    let mut objects = Vec::new();
    for object in annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        let name = required_child_text(object, "name", "<object>")?;
        let bndbox = required_child_element(object, "bndbox", "<object>")?;

        let xmin = parse_required_f64(bndbox, "xmin", "<bndbox>")?;
        let ymin = parse_required_f64(bndbox, "ymin", "<bndbox>")?;
        let xmax = parse_required_f64(bndbox, "xmax", "<bndbox>")?;
        let ymax = parse_required_f64(bndbox, "ymax", "<bndbox>")?;

        objects.push(ParsedVocObject {
            name,
            xmin,
            ymin,
            xmax,
            ymax,
        });
    }

    Ok(ParsedVocAnnotation {
        filename,
        width,
        height,
        depth,
        objects,
    })
}

fn required_child_element<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
    context: &str,
) -> Result<Node<'a, 'input>, AnnoconvError> {
    child_element(node, tag)
        .ok_or_else(|| AnnoconvError::malformed(FORMAT, format!("missing <{tag}> in {context}")))
}

fn required_child_text(
    node: Node<'_, '_>,
    tag: &str,
    context: &str,
) -> Result<String, AnnoconvError> {
    optional_child_text(node, tag)
        .ok_or_else(|| AnnoconvError::malformed(FORMAT, format!("missing <{tag}> in {context}")))
}

fn parse_optional_u32(node: Node<'_, '_>, tag: &str) -> Result<Option<u32>, AnnoconvError> {
    optional_child_text(node, tag)
        .map(|raw| {
            raw.parse::<u32>().map_err(|_| {
                AnnoconvError::malformed(
                    FORMAT,
                    format!("invalid <{tag}> value '{raw}' in <size>; expected u32"),
                )
            })
        })
        .transpose()
}

fn parse_required_f64(node: Node<'_, '_>, tag: &str, context: &str) -> Result<f64, AnnoconvError> {
    let raw = required_child_text(node, tag, context)?;
    raw.parse::<f64>().map_err(|_| {
        AnnoconvError::malformed(
            FORMAT,
            format!("invalid <{tag}> value '{raw}' in {context}; expected floating-point number"),
        )
    })
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn write_voc_xml(
    xml: &mut String,
    meta: &ImageMeta,
    objects: &[(&str, &BoundingBox)],
) -> std::fmt::Result {
    writeln!(xml, "<?xml version=\"1.0\" encoding=\"utf-8\"?>")?;
    writeln!(xml, "<annotation>")?;
    writeln!(xml, "  <filename>{}</filename>", xml_escape(&meta.file_name))?;
    writeln!(xml, "  <size>")?;
    writeln!(xml, "    <width>{}</width>", meta.width)?;
    writeln!(xml, "    <height>{}</height>", meta.height)?;
    writeln!(xml, "    <depth>{}</depth>", meta.depth.unwrap_or(DEFAULT_DEPTH))?;
    writeln!(xml, "  </size>")?;
    writeln!(xml, "  <segmented>0</segmented>")?;

    for (name, bbox) in objects {
        writeln!(xml, "  <object>")?;
        writeln!(xml, "    <name>{}</name>", xml_escape(name))?;
        writeln!(xml, "    <pose>Unspecified</pose>")?;
        writeln!(xml, "    <bndbox>")?;
        writeln!(xml, "      <xmin>{}</xmin>", bbox.x_min())?;
        writeln!(xml, "      <ymin>{}</ymin>", bbox.y_min())?;
        writeln!(xml, "      <xmax>{}</xmax>", bbox.x_max())?;
        writeln!(xml, "      <ymax>{}</ymax>", bbox.y_max())?;
        writeln!(xml, "    </bndbox>")?;
        writeln!(xml, "  </object>")?;
    }

    writeln!(xml, "</annotation>")
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::ir::{CategoryCreation, CategoryId, ImageId, ImageSizeProbe};

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<annotation>
  <filename>img1.jpg</filename>
  <size>
    <width>640</width>
    <height>480</height>
    <depth>3</depth>
  </size>
  <object>
    <name>cat</name>
    <pose>Unspecified</pose>
    <truncated>1</truncated>
    <bndbox>
      <xmin>10</xmin>
      <ymin>20</ymin>
      <xmax>30</xmax>
      <ymax>40</ymax>
    </bndbox>
  </object>
  <object>
    <name>cat</name>
    <bndbox>
      <xmin>1.5</xmin>
      <ymin>2</ymin>
      <xmax>3</xmax>
      <ymax>4</ymax>
    </bndbox>
  </object>
</annotation>"#;

    struct FixedProbe(u32, u32);

    impl ImageSizeProbe for FixedProbe {
        fn image_size(&self, _path: &Path) -> Result<(u32, u32), AnnoconvError> {
            Ok((self.0, self.1))
        }
    }

    #[test]
    fn parse_extracts_size_and_boxes() {
        let mut registry = CategoryRegistry::new();
        let image = from_voc_xml_str(SAMPLE, &mut registry, &DecodeOptions::default())
            .expect("parse xml");

        let meta = image.meta();
        assert_eq!(meta.file_name, "img1.jpg");
        assert_eq!((meta.width, meta.height, meta.depth), (640, 480, Some(3)));
        assert_eq!(meta.id, ImageId(1));

        assert_eq!(image.annotations().len(), 2);
        assert_eq!(
            image.annotations()[0].bbox().to_corners(),
            (10.0, 20.0, 30.0, 40.0)
        );
        assert_eq!(image.annotations()[1].bbox().x_min(), 1.5);
    }

    #[test]
    fn repeated_names_share_one_category() {
        let mut registry = CategoryRegistry::new();
        let image =
            from_voc_xml_str(SAMPLE, &mut registry, &DecodeOptions::default()).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(image.annotations()[0].category_id(), CategoryId(1));
        assert_eq!(image.annotations()[1].category_id(), CategoryId(1));
    }

    #[test]
    fn missing_size_without_image_location_fails() {
        let xml = "<annotation><filename>a.jpg</filename></annotation>";
        let mut registry = CategoryRegistry::new();
        let err = from_voc_xml_str(xml, &mut registry, &DecodeOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            AnnoconvError::MissingImageSize { file_name } if file_name == "a.jpg"
        ));
    }

    #[test]
    fn zero_size_falls_back_to_the_image_file() {
        let xml = r#"<annotation>
  <filename>a.jpg</filename>
  <size><width>0</width><height>0</height></size>
</annotation>"#;
        let probe = FixedProbe(320, 200);
        let options = DecodeOptions {
            image_dir: Some(Path::new("/images")),
            probe: Some(&probe),
            ..Default::default()
        };
        let mut registry = CategoryRegistry::new();
        let image = from_voc_xml_str(xml, &mut registry, &options).unwrap();
        assert_eq!((image.meta().width, image.meta().height), (320, 200));
    }

    #[test]
    fn missing_bndbox_is_malformed() {
        let xml = r#"<annotation>
  <size><width>10</width><height>10</height></size>
  <object><name>cat</name></object>
</annotation>"#;
        let mut registry = CategoryRegistry::new();
        let err = from_voc_xml_str(xml, &mut registry, &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, AnnoconvError::MalformedInput { .. }));
    }

    #[test]
    fn inverted_box_is_invalid_geometry_and_registry_untouched() {
        let xml = r#"<annotation>
  <size><width>10</width><height>10</height></size>
  <object>
    <name>cat</name>
    <bndbox><xmin>5</xmin><ymin>0</ymin><xmax>2</xmax><ymax>3</ymax></bndbox>
  </object>
</annotation>"#;
        let mut registry = CategoryRegistry::new();
        let err = from_voc_xml_str(xml, &mut registry, &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, AnnoconvError::InvalidGeometry { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn wrong_root_is_malformed() {
        let mut registry = CategoryRegistry::new();
        let err =
            from_voc_xml_str("<root/>", &mut registry, &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, AnnoconvError::MalformedInput { .. }));
    }

    #[test]
    fn strict_creation_rejects_unknown_names() {
        let mut registry = CategoryRegistry::from_names(["dog"]);
        let options = DecodeOptions {
            creation: CategoryCreation::Deny,
            ..Default::default()
        };
        let err = from_voc_xml_str(SAMPLE, &mut registry, &options).unwrap_err();
        assert!(matches!(err, AnnoconvError::UnknownCategoryName(name) if name == "cat"));
    }

    #[test]
    fn writer_emits_full_layout_and_escapes_names() {
        let mut registry = CategoryRegistry::new();
        let tv = registry.add_category("tv & monitor", None);
        let mut image = CanonicalImage::new(ImageMeta::new(1u64, "a.jpg", 100, 50).unwrap());
        let bbox = BoundingBox::from_corners(10.0, 5.0, 30.0, 20.5).unwrap();
        image.add_annotation(&registry, &tv, bbox, false).unwrap();

        let xml = to_voc_xml_string(&image, &registry).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<annotation>\n"));
        assert!(xml.contains("    <depth>3</depth>\n"));
        assert!(xml.contains("  <segmented>0</segmented>\n"));
        assert!(xml.contains("<name>tv &amp; monitor</name>"));
        assert!(xml.contains("<pose>Unspecified</pose>"));
        assert!(xml.contains("<xmin>10</xmin>"));
        assert!(xml.contains("<ymax>20.5</ymax>"));
    }

    #[test]
    fn encode_requires_exactly_one_image() {
        let registry = CategoryRegistry::new();
        let err = VocXml.encode(&[], &registry).unwrap_err();
        assert!(matches!(err, AnnoconvError::SingleImageRequired { count: 0, .. }));
    }
}
