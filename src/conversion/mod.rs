//! Format-to-format conversion through the canonical model.
//!
//! Every conversion is the source adapter's decode followed by the target
//! adapter's encode; there are no pairwise converters. Batch conversion folds
//! every source through one [`Dataset`] so a category name maps to one id
//! across the whole run, then writes one aggregated file (COCO) or one file
//! per image (VOC, polygon-text).
//!
//! Decoding is sequential because it mutates the shared registry. Per-image
//! encoding only reads it and runs in parallel on `rayon`.

mod ledger;
pub mod report;
mod sources;

pub use ledger::{load_category_ledger, save_category_ledger};
pub use report::{
    ConversionCounts, ConversionIssue, ConversionIssueCode, ConversionReport, ConversionSeverity,
};
pub use sources::{collect_sources, SourceItem};

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rayon::prelude::*;

use crate::error::AnnoconvError;
use crate::ir::io_coco_json::CocoJson;
use crate::ir::io_polytext::PolyText;
use crate::ir::io_voc_xml::VocXml;
use crate::ir::{
    Capabilities, CanonicalImage, CategoryRegistry, Dataset, DecodeOptions, FormatAdapter,
};

/// A supported on-disk annotation format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Coco,
    Voc,
    PolyText,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Coco, Format::Voc, Format::PolyText];

    /// Human-readable name for the format.
    pub fn name(&self) -> &'static str {
        self.adapter().name()
    }

    /// File extension of this format, without the dot.
    pub fn extension(&self) -> &'static str {
        self.adapter().extension()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.adapter().capabilities()
    }

    /// The adapter implementing this format.
    pub fn adapter(&self) -> &'static dyn FormatAdapter {
        match self {
            Format::Coco => &CocoJson,
            Format::Voc => &VocXml,
            Format::PolyText => &PolyText,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = AnnoconvError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "coco" | "coco-json" => Ok(Format::Coco),
            "voc" | "pascal-voc" | "pascal" => Ok(Format::Voc),
            "polytext" | "opencv" | "txt" => Ok(Format::PolyText),
            _ => Err(AnnoconvError::UnsupportedFormat(raw.to_string())),
        }
    }
}

/// Settings for one conversion run.
#[derive(Clone, Debug, Default)]
pub struct ConvertOptions<'a> {
    /// Passed to every decode. `image_id` is ignored by batch decodes, which
    /// assign ids in input order.
    pub decode: DecodeOptions<'a>,
    /// Registry the run starts from (e.g. a loaded category ledger).
    pub registry: CategoryRegistry,
    /// Probe every decoded image and fail on a size mismatch.
    pub verify_image_sizes: bool,
}

/// One encoded output file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedFile {
    /// File name relative to the output directory.
    pub name: String,
    pub content: String,
}

/// Everything a batch conversion produced.
#[derive(Debug)]
pub struct ConversionOutput {
    pub dataset: Dataset,
    pub files: Vec<EncodedFile>,
    pub report: ConversionReport,
}

/// Converts one raw document from `from` to `to`.
///
/// This is exactly `to.encode(from.decode(raw))` against a registry seeded
/// from `options.registry`.
///
/// # Errors
/// Any decode or encode error; [`AnnoconvError::SingleImageRequired`] when a
/// multi-image COCO document is converted to a per-image format.
///
/// # Example
/// ```
/// use annoconv::conversion::{convert, ConvertOptions, Format};
///
/// let coco = r#"{"images":[{"id":1,"width":100,"height":50,"file_name":"a.jpg"}],
///   "categories":[{"id":1,"name":"car"}],
///   "annotations":[{"id":1,"image_id":1,"category_id":1,"bbox":[10,5,20,15]}]}"#;
/// let text = convert(Format::Coco, Format::PolyText, coco, &ConvertOptions::default())?;
/// assert_eq!(text, "100 50\n10 5 30 5 30 20 10 20\n");
/// # Ok::<(), annoconv::AnnoconvError>(())
/// ```
pub fn convert(
    from: Format,
    to: Format,
    raw: &str,
    options: &ConvertOptions<'_>,
) -> Result<String, AnnoconvError> {
    let mut registry = options.registry.clone();
    let images = from.adapter().decode(raw, &mut registry, &options.decode)?;
    if options.verify_image_sizes {
        verify_image_sizes(&images, &options.decode)?;
    }
    to.adapter().encode(&images, &registry)
}

/// Decodes every source into one dataset sharing one registry.
///
/// Single-image sources get ids 1, 2, ... in input order; COCO sources keep
/// their own ids. A failing source aborts the run with its name attached.
pub fn decode_dataset(
    from: Format,
    items: &[SourceItem],
    options: &ConvertOptions<'_>,
) -> Result<Dataset, AnnoconvError> {
    let adapter = from.adapter();
    let mut dataset = Dataset::with_registry(options.registry.clone());

    for item in items {
        let decode = DecodeOptions {
            image_id: dataset.next_image_id(),
            file_name: item.file_name.as_deref(),
            image_path: item.image_path.as_deref(),
            ..options.decode
        };

        let first_new = dataset.images().len();
        let count = dataset
            .ingest(|registry| adapter.decode(&item.content, registry, &decode))
            .map_err(|err| err.in_file(&item.name))?;

        if options.verify_image_sizes {
            verify_image_sizes(&dataset.images()[first_new..], &decode)
                .map_err(|err| err.in_file(&item.name))?;
        }

        tracing::debug!(source = %item.name, images = count, "decoded source");
    }

    Ok(dataset)
}

/// Encodes a dataset into output files.
///
/// Multi-image targets produce a single `annotations.<ext>`. Per-image
/// targets produce one file per image, named after the image's file stem
/// (or `image_<id>` without one), in image-id order.
pub fn encode_dataset(to: Format, dataset: &Dataset) -> Result<Vec<EncodedFile>, AnnoconvError> {
    let adapter = to.adapter();
    let registry = dataset.registry();

    if adapter.capabilities().multi_image {
        let content = adapter.encode(dataset.images(), registry)?;
        return Ok(vec![EncodedFile {
            name: format!("annotations.{}", adapter.extension()),
            content,
        }]);
    }

    let mut images: Vec<&CanonicalImage> = dataset.images().iter().collect();
    images.sort_by_key(|image| image.id());

    let names = output_names(&images, adapter.extension());
    images
        .par_iter()
        .zip(names)
        .map(|(image, name)| -> Result<EncodedFile, AnnoconvError> {
            let content = adapter.encode(std::slice::from_ref(*image), registry)?;
            Ok(EncodedFile { name, content })
        })
        .collect()
}

/// Decodes all sources, reports what the target will lose, and encodes.
pub fn convert_dataset(
    from: Format,
    to: Format,
    items: &[SourceItem],
    options: &ConvertOptions<'_>,
) -> Result<ConversionOutput, AnnoconvError> {
    let dataset = decode_dataset(from, items, options)?;
    let report = build_conversion_report(&dataset, from, to);
    let files = encode_dataset(to, &dataset)?;

    tracing::info!(
        from = from.name(),
        to = to.name(),
        images = dataset.images().len(),
        annotations = dataset.annotation_count(),
        files = files.len(),
        "conversion finished"
    );

    Ok(ConversionOutput {
        dataset,
        files,
        report,
    })
}

/// Checks every image's declared size against its image file.
///
/// # Errors
/// - [`AnnoconvError::MissingImageSize`] when an image cannot be located or
///   no probe is configured
/// - [`AnnoconvError::ImageUnreadable`] when probing fails
/// - [`AnnoconvError::ImageSizeMismatch`] when the sizes differ
pub fn verify_image_sizes(
    images: &[CanonicalImage],
    options: &DecodeOptions<'_>,
) -> Result<(), AnnoconvError> {
    for image in images {
        let meta = image.meta();
        let (actual_width, actual_height) = options.probe_size(&meta.file_name)?;
        if (actual_width, actual_height) != (meta.width, meta.height) {
            return Err(AnnoconvError::ImageSizeMismatch {
                file_name: meta.file_name.clone(),
                declared_width: meta.width,
                declared_height: meta.height,
                actual_width,
                actual_height,
            });
        }
    }
    Ok(())
}

/// Build a conversion report analyzing what will happen during conversion.
///
/// Warnings are raised only for information the dataset actually holds and
/// the target cannot carry; a source that never had it cannot lose it.
pub fn build_conversion_report(dataset: &Dataset, from: Format, to: Format) -> ConversionReport {
    let mut report = ConversionReport::new(from.name(), to.name());
    let source = from.capabilities();
    let target = to.capabilities();
    let registry = dataset.registry();

    let used_categories: BTreeSet<_> = dataset
        .images()
        .iter()
        .flat_map(|image| image.annotations())
        .map(|annotation| annotation.category_id())
        .collect();

    report.input = ConversionCounts {
        images: dataset.images().len(),
        categories: registry.len(),
        annotations: dataset.annotation_count(),
    };
    report.output = ConversionCounts {
        images: dataset.images().len(),
        categories: match (target.preserves_categories, target.multi_image) {
            (false, _) => 0,
            (true, true) => registry.len(),
            (true, false) => used_categories.len(),
        },
        annotations: dataset.annotation_count(),
    };

    if !target.preserves_categories && source.preserves_categories && !used_categories.is_empty() {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropCategories,
            format!(
                "{} category(ies) used by annotations will not be written; {} carries no category",
                used_categories.len(),
                to.name()
            ),
        ));
    }

    if target.preserves_categories
        && !target.multi_image
        && registry.len() > used_categories.len()
    {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropUnusedCategories,
            format!(
                "{} category(ies) without annotations cannot be written to {}",
                registry.len() - used_categories.len(),
                to.name()
            ),
        ));
    }

    if !target.preserves_supercategories {
        let with_supercategory = registry
            .iter()
            .filter(|category| category.supercategory().is_some())
            .count();
        if with_supercategory > 0 {
            report.add(ConversionIssue::warning(
                ConversionIssueCode::DropSupercategories,
                format!("{with_supercategory} supercategory name(s) will be dropped"),
            ));
        }
    }

    if !target.preserves_file_name && source.preserves_file_name {
        let named = dataset
            .images()
            .iter()
            .filter(|image| !image.meta().file_name.is_empty())
            .count();
        if named > 0 {
            report.add(ConversionIssue::warning(
                ConversionIssueCode::DropFileNames,
                format!("{named} image file name(s) will be dropped"),
            ));
        }
    }

    if !target.preserves_crowd {
        let crowd = dataset
            .images()
            .iter()
            .flat_map(|image| image.annotations())
            .filter(|annotation| annotation.is_crowd())
            .count();
        if crowd > 0 {
            report.add(ConversionIssue::warning(
                ConversionIssueCode::DropCrowdFlags,
                format!("{crowd} crowd flag(s) will be dropped"),
            ));
        }
    }

    add_source_policy(from, dataset, &mut report);
    add_target_policy(to, &mut report);

    report
}

fn add_source_policy(from: Format, dataset: &Dataset, report: &mut ConversionReport) {
    match from {
        Format::Coco => {
            report.add(ConversionIssue::info(
                ConversionIssueCode::CocoCategoryIdAdoption,
                "COCO category ids are kept unless already taken; lookups go by id",
            ));
            report.add(ConversionIssue::info(
                ConversionIssueCode::AreaRecomputed,
                "stored COCO areas are ignored; area is recomputed as width * height",
            ));
        }
        Format::Voc | Format::PolyText => {
            report.add(ConversionIssue::info(
                ConversionIssueCode::CategoryIdsByFirstSeen,
                "category ids are assigned by first appearance of each name",
            ));
            report.add(ConversionIssue::info(
                ConversionIssueCode::ImageIdsAssigned,
                "image ids are assigned 1..N in input order",
            ));
        }
    }

    if from == Format::PolyText && dataset.annotation_count() > 0 {
        report.add(ConversionIssue::info(
            ConversionIssueCode::SyntheticCategory,
            format!(
                "every box is filed under the synthetic category '{}'",
                crate::ir::io_polytext::SYNTHETIC_CATEGORY
            ),
        ));
    }
}

fn add_target_policy(to: Format, report: &mut ConversionReport) {
    if to == Format::Coco {
        report.add(ConversionIssue::info(
            ConversionIssueCode::AnnotationIdsRenumbered,
            "COCO annotation ids are renumbered 1..N in image order",
        ));
        if !report.has(ConversionIssueCode::AreaRecomputed) {
            report.add(ConversionIssue::info(
                ConversionIssueCode::AreaRecomputed,
                "COCO area is written as width * height",
            ));
        }
    }
}

fn output_names(images: &[&CanonicalImage], extension: &str) -> Vec<String> {
    let mut taken = HashSet::new();
    images
        .iter()
        .map(|image| {
            let stem = Path::new(&image.meta().file_name)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .filter(|stem| !stem.is_empty());
            let base = stem.unwrap_or_else(|| format!("image_{}", image.id()));

            let mut name = format!("{base}.{extension}");
            if taken.contains(&name) {
                name = format!("{base}_{}.{extension}", image.id());
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BoundingBox, CategoryCreation, ImageMeta};

    const COCO_TWO_IMAGES: &str = r#"{
        "images": [
            {"id": 1, "width": 100, "height": 50, "file_name": "a.jpg"},
            {"id": 2, "width": 100, "height": 50, "file_name": "b.jpg"}
        ],
        "categories": [
            {"id": 1, "name": "car", "supercategory": "vehicle"},
            {"id": 2, "name": "bus"}
        ],
        "annotations": [
            {"id": 1, "image_id": 1, "category_id": 1, "bbox": [10, 5, 20, 15], "iscrowd": 1},
            {"id": 2, "image_id": 2, "category_id": 1, "bbox": [0, 0, 5, 5]}
        ]
    }"#;

    #[test]
    fn format_parses_aliases() {
        assert_eq!("COCO".parse::<Format>().unwrap(), Format::Coco);
        assert_eq!("pascal-voc".parse::<Format>().unwrap(), Format::Voc);
        assert_eq!("opencv".parse::<Format>().unwrap(), Format::PolyText);
        assert!(matches!(
            "yolo".parse::<Format>(),
            Err(AnnoconvError::UnsupportedFormat(name)) if name == "yolo"
        ));
        for format in Format::ALL {
            assert_eq!(format.name().parse::<Format>().unwrap(), format);
        }
    }

    #[test]
    fn per_image_targets_write_one_file_per_image() {
        let items = [SourceItem::new("in.json", COCO_TWO_IMAGES)];
        let output =
            convert_dataset(Format::Coco, Format::Voc, &items, &ConvertOptions::default()).unwrap();

        let names: Vec<_> = output.files.iter().map(|file| file.name.as_str()).collect();
        assert_eq!(names, vec!["a.xml", "b.xml"]);
        assert!(output.files[1].content.contains("<name>car</name>"));
    }

    #[test]
    fn coco_target_writes_one_file() {
        let items = [
            SourceItem::new("a.txt", "10 10\n0 0 2 0 2 2 0 2\n"),
            SourceItem::new("b.txt", "20 20\n1 1 3 1 3 3 1 3\n"),
        ];
        let output =
            convert_dataset(Format::PolyText, Format::Coco, &items, &ConvertOptions::default())
                .unwrap();

        assert_eq!(output.files.len(), 1);
        assert_eq!(output.files[0].name, "annotations.json");
        let json: serde_json::Value = serde_json::from_str(&output.files[0].content).unwrap();
        assert_eq!(json["images"].as_array().unwrap().len(), 2);
        assert_eq!(json["categories"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn unnamed_images_get_id_based_names() {
        let items = [
            SourceItem::new("a.txt", "10 10\n"),
            SourceItem::new("b.txt", "10 10\n"),
        ];
        let output =
            convert_dataset(Format::PolyText, Format::PolyText, &items, &ConvertOptions::default())
                .unwrap();
        let names: Vec<_> = output.files.iter().map(|file| file.name.as_str()).collect();
        assert_eq!(names, vec!["image_1.txt", "image_2.txt"]);
    }

    #[test]
    fn colliding_stems_are_disambiguated() {
        let mut registry = CategoryRegistry::new();
        let car = registry.add_category("car", None);
        let mut dataset = Dataset::with_registry(registry);
        dataset
            .ingest(|registry| {
                let mut images = Vec::new();
                for (id, name) in [(1u64, "x/frame.jpg"), (2, "y/frame.jpg")] {
                    let mut image = CanonicalImage::new(ImageMeta::new(id, name, 10, 10)?);
                    let bbox = BoundingBox::from_xywh(0.0, 0.0, 1.0, 1.0)?;
                    image.add_annotation(registry, &car, bbox, false)?;
                    images.push(image);
                }
                Ok(images)
            })
            .unwrap();

        let files = encode_dataset(Format::Voc, &dataset).unwrap();
        let names: Vec<_> = files.iter().map(|file| file.name.as_str()).collect();
        assert_eq!(names, vec!["frame.xml", "frame_2.xml"]);
    }

    #[test]
    fn failing_source_names_the_file_and_keeps_nothing() {
        let items = [
            SourceItem::new("good.txt", "10 10\n0 0 2 0 2 2 0 2\n"),
            SourceItem::new("bad.txt", "10 10\n0 0 2 0 2 2\n"),
        ];
        let err = decode_dataset(Format::PolyText, &items, &ConvertOptions::default()).unwrap_err();
        assert!(err.to_string().starts_with("bad.txt: "));
        assert!(matches!(
            err,
            AnnoconvError::InFile { source, .. }
                if matches!(*source, AnnoconvError::MalformedInput { .. })
        ));
    }

    #[test]
    fn seeded_registry_keeps_ids_and_strict_mode_rejects_new_names() {
        let options = ConvertOptions {
            registry: CategoryRegistry::from_names(["bus", "car"]),
            ..Default::default()
        };
        let items = [SourceItem::new("in.json", COCO_TWO_IMAGES)];
        let dataset = decode_dataset(Format::Coco, &items, &options).unwrap();
        assert_eq!(dataset.registry().lookup_name("car").unwrap().id().as_u64(), 2);

        let voc = "<annotation><size><width>4</width><height>4</height></size>\
                   <object><name>tram</name>\
                   <bndbox><xmin>0</xmin><ymin>0</ymin><xmax>1</xmax><ymax>1</ymax></bndbox>\
                   </object></annotation>";
        let strict = ConvertOptions {
            decode: DecodeOptions {
                creation: CategoryCreation::Deny,
                ..Default::default()
            },
            registry: CategoryRegistry::from_names(["car"]),
            ..Default::default()
        };
        let err =
            decode_dataset(Format::Voc, &[SourceItem::new("a.xml", voc)], &strict).unwrap_err();
        assert!(matches!(
            err,
            AnnoconvError::InFile { source, .. }
                if matches!(*source, AnnoconvError::UnknownCategoryName(_))
        ));
    }

    #[test]
    fn report_flags_lossy_targets() {
        let items = [SourceItem::new("in.json", COCO_TWO_IMAGES)];
        let dataset = decode_dataset(Format::Coco, &items, &ConvertOptions::default()).unwrap();

        let to_text = build_conversion_report(&dataset, Format::Coco, Format::PolyText);
        assert!(to_text.is_lossy());
        assert!(to_text.has(ConversionIssueCode::DropCategories));
        assert!(to_text.has(ConversionIssueCode::DropFileNames));
        assert!(to_text.has(ConversionIssueCode::DropCrowdFlags));
        assert_eq!(to_text.output.categories, 0);

        let to_voc = build_conversion_report(&dataset, Format::Coco, Format::Voc);
        assert!(to_voc.has(ConversionIssueCode::DropUnusedCategories));
        assert!(to_voc.has(ConversionIssueCode::DropSupercategories));
        assert!(!to_voc.has(ConversionIssueCode::DropCategories));

        let to_coco = build_conversion_report(&dataset, Format::Coco, Format::Coco);
        assert!(!to_coco.is_lossy());
        assert!(to_coco.has(ConversionIssueCode::AnnotationIdsRenumbered));
    }

    #[test]
    fn polytext_source_to_voc_is_not_lossy() {
        let items = [SourceItem::new("a.txt", "100 50\n10 5 30 5 30 20 10 20\n")];
        let output =
            convert_dataset(Format::PolyText, Format::Voc, &items, &ConvertOptions::default())
                .unwrap();
        assert!(!output.report.is_lossy());
        assert!(output.report.has(ConversionIssueCode::SyntheticCategory));
    }
}
