//! Cross-format conversion scenarios.

use annoconv::conversion::{
    convert, convert_dataset, verify_image_sizes, ConversionIssueCode, ConvertOptions, Format,
    SourceItem,
};
use annoconv::ir::io_polytext::SYNTHETIC_CATEGORY;
use annoconv::ir::{CategoryCreation, CategoryRegistry, DecodeOptions, ImagesizeProbe};
use annoconv::AnnoconvError;

mod common;

use common::COCO_CAR;

#[test]
fn coco_to_polytext_writes_header_and_corners() {
    let text =
        convert(Format::Coco, Format::PolyText, COCO_CAR, &ConvertOptions::default()).unwrap();
    assert_eq!(text, "100 50\n10 5 30 5 30 20 10 20\n");
}

#[test]
fn polytext_to_voc_writes_bndbox_size_and_synthetic_name() {
    let xml = convert(
        Format::PolyText,
        Format::Voc,
        "100 50\n10 5 30 5 30 20 10 20\n",
        &ConvertOptions::default(),
    )
    .unwrap();

    assert!(xml.contains("<size>\n    <width>100</width>\n    <height>50</height>\n"));
    assert!(xml.contains(&format!("<name>{SYNTHETIC_CATEGORY}</name>")));
    assert!(xml.contains("<xmin>10</xmin>"));
    assert!(xml.contains("<ymin>5</ymin>"));
    assert!(xml.contains("<xmax>30</xmax>"));
    assert!(xml.contains("<ymax>20</ymax>"));
}

#[test]
fn six_number_line_fails_without_partial_output() {
    let err = convert(
        Format::PolyText,
        Format::Voc,
        "100 50\n10 5 30 5 30 20\n",
        &ConvertOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, AnnoconvError::MalformedInput { .. }));
}

#[test]
fn repeated_names_across_images_share_one_id() {
    let voc = |file: &str| {
        format!(
            "<annotation><filename>{file}</filename>\
             <size><width>10</width><height>10</height></size>\
             <object><name>car</name>\
             <bndbox><xmin>1</xmin><ymin>1</ymin><xmax>4</xmax><ymax>4</ymax></bndbox></object>\
             </annotation>"
        )
    };
    let items = [
        SourceItem::new("a.xml", voc("a.jpg")),
        SourceItem::new("b.xml", voc("b.jpg")),
    ];
    let output =
        convert_dataset(Format::Voc, Format::Coco, &items, &ConvertOptions::default()).unwrap();

    assert_eq!(output.dataset.registry().len(), 1);
    let json: serde_json::Value = serde_json::from_str(&output.files[0].content).unwrap();
    assert_eq!(json["categories"], serde_json::json!([{"id": 1, "name": "car"}]));
    let category_ids: Vec<_> = json["annotations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|ann| ann["category_id"].as_u64().unwrap())
        .collect();
    assert_eq!(category_ids, vec![1, 1]);
}

#[test]
fn coco_to_polytext_is_reported_lossy_and_collapses_categories() {
    let items = [SourceItem::new("a.json", COCO_CAR)];
    let output =
        convert_dataset(Format::Coco, Format::PolyText, &items, &ConvertOptions::default())
            .unwrap();
    assert!(output.report.is_lossy());
    assert!(output.report.has(ConversionIssueCode::DropCategories));

    // Going back through polygon-text keeps the box and loses "car".
    let back = convert_dataset(
        Format::PolyText,
        Format::Coco,
        &[SourceItem::new("a.txt", output.files[0].content.clone())],
        &ConvertOptions::default(),
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_str(&back.files[0].content).unwrap();
    assert_eq!(json["categories"][0]["name"], SYNTHETIC_CATEGORY);
    assert_eq!(json["annotations"][0]["bbox"], serde_json::json!([10, 5, 20, 15]));
}

#[test]
fn coco_voc_coco_keeps_categories_and_geometry() {
    let voc = convert(Format::Coco, Format::Voc, COCO_CAR, &ConvertOptions::default()).unwrap();
    let coco = convert(Format::Voc, Format::Coco, &voc, &ConvertOptions::default()).unwrap();

    let original: serde_json::Value = serde_json::from_str(COCO_CAR).unwrap();
    let restored: serde_json::Value = serde_json::from_str(&coco).unwrap();
    assert_eq!(restored["images"], original["images"]);
    assert_eq!(restored["categories"], original["categories"]);
    assert_eq!(restored["annotations"][0]["bbox"], original["annotations"][0]["bbox"]);
    assert_eq!(restored["annotations"][0]["area"], 300);
}

#[test]
fn strict_categories_reject_unknown_names() {
    let options = ConvertOptions {
        decode: DecodeOptions {
            creation: CategoryCreation::Deny,
            ..Default::default()
        },
        registry: CategoryRegistry::from_names(["bus"]),
        ..Default::default()
    };
    let err = convert(Format::Coco, Format::Voc, COCO_CAR, &options).unwrap_err();
    assert!(matches!(err, AnnoconvError::UnknownCategoryName(name) if name == "car"));
}

#[test]
fn size_verification_catches_mismatched_images() {
    let temp = tempfile::tempdir().expect("create temp dir");
    common::write_bmp(&temp.path().join("a.jpg"), 100, 50);

    let probe = ImagesizeProbe;
    let options = ConvertOptions {
        decode: DecodeOptions {
            image_dir: Some(temp.path()),
            probe: Some(&probe),
            ..Default::default()
        },
        verify_image_sizes: true,
        ..Default::default()
    };
    convert(Format::Coco, Format::Voc, COCO_CAR, &options).expect("sizes match");

    common::write_bmp(&temp.path().join("a.jpg"), 90, 50);
    let err = convert(Format::Coco, Format::Voc, COCO_CAR, &options).unwrap_err();
    assert!(matches!(
        err,
        AnnoconvError::ImageSizeMismatch {
            declared_width: 100,
            actual_width: 90,
            ..
        }
    ));
}

#[test]
fn size_verification_without_images_is_missing_size() {
    let mut registry = CategoryRegistry::new();
    let images = Format::Coco
        .adapter()
        .decode(COCO_CAR, &mut registry, &DecodeOptions::default())
        .unwrap();
    let err = verify_image_sizes(&images, &DecodeOptions::default()).unwrap_err();
    assert!(matches!(err, AnnoconvError::MissingImageSize { file_name } if file_name == "a.jpg"));
}

#[test]
fn overflowing_boxes_are_rejected_instead_of_written_as_infinity() {
    let polytext = "10 10\n-1e308 0 1e308 0 1e308 1 -1e308 1\n";
    for to in [Format::Coco, Format::PolyText] {
        let err = convert(Format::PolyText, to, polytext, &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, AnnoconvError::InvalidGeometry { .. }), "{to}: {err}");
    }

    let voc = "<annotation><size><width>10</width><height>10</height></size>\
               <object><name>car</name><bndbox><xmin>-1e308</xmin><ymin>0</ymin>\
               <xmax>1e308</xmax><ymax>1</ymax></bndbox></object></annotation>";
    let err = convert(Format::Voc, Format::Coco, voc, &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, AnnoconvError::InvalidGeometry { .. }));
}
