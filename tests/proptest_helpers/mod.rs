#![allow(dead_code)]

use annoconv::ir::{BoundingBox, CanonicalImage, CategoryRegistry, ImageMeta};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// One annotated image with the registry its categories live in.
#[derive(Clone, Debug)]
pub struct Sample {
    pub registry: CategoryRegistry,
    pub image: CanonicalImage,
}

/// Format-independent view of one annotation.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnSem {
    pub category: String,
    pub corners: (f64, f64, f64, f64),
}

pub fn ann_semantics(
    image: &CanonicalImage,
    registry: &CategoryRegistry,
) -> Result<Vec<AnnSem>, String> {
    image
        .annotations()
        .iter()
        .map(|ann| {
            let category = registry
                .resolve_id(ann.category_id())
                .map_err(|err| format!("annotation {}: {err}", ann.id()))?;
            Ok(AnnSem {
                category: category.name().to_string(),
                corners: ann.bbox().to_corners(),
            })
        })
        .collect()
}

pub fn corners(image: &CanonicalImage) -> Vec<(f64, f64, f64, f64)> {
    image
        .annotations()
        .iter()
        .map(|ann| ann.bbox().to_corners())
        .collect()
}

/// Builds a box with positive extent inside a `width` x `height` image.
///
/// Coordinates are quarter pixels so both integral and fractional values show up.
pub fn bbox_from_seed(width: u32, height: u32, a: u32, b: u32, c: u32, d: u32) -> BoundingBox {
    let w_quarters = width * 4;
    let h_quarters = height * 4;

    let x0 = a % (w_quarters - 1);
    let x1 = x0 + 1 + b % (w_quarters - x0 - 1).max(1);
    let y0 = c % (h_quarters - 1);
    let y1 = y0 + 1 + d % (h_quarters - y0 - 1).max(1);

    BoundingBox::from_corners(
        f64::from(x0) / 4.0,
        f64::from(y0) / 4.0,
        f64::from(x1) / 4.0,
        f64::from(y1) / 4.0,
    )
    .expect("seeded box is valid")
}

pub fn arb_bbox_within(width: u32, height: u32) -> BoxedStrategy<BoundingBox> {
    prop::num::u32::ANY
        .prop_map(move |seed| {
            bbox_from_seed(
                width,
                height,
                seed,
                seed.rotate_left(3),
                seed.rotate_left(7),
                seed.rotate_left(11),
            )
        })
        .boxed()
}

fn category_name_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9_ &<>]{0,11}")
        .expect("valid category regex")
        .prop_filter("names must not be blank at the edges", |name| name.trim() == name)
}

fn file_name_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z0-9_]{1,12}\\.(jpg|png)").expect("valid file name regex")
}

/// An image with at least one annotation and at least one category, every
/// category used by some annotation.
pub fn arb_sample(max_cats: usize, max_anns: usize) -> BoxedStrategy<Sample> {
    assert!(max_cats > 0, "max_cats must be > 0");
    assert!(max_anns >= max_cats, "max_anns must be >= max_cats");

    (1usize..=max_cats)
        .prop_flat_map(move |cat_count| {
            (
                file_name_strategy(),
                (2u32..=4096, 2u32..=4096),
                proptest::collection::hash_set(category_name_strategy(), cat_count..=cat_count),
                proptest::collection::vec(
                    (any::<[u32; 4]>(), any::<bool>()),
                    cat_count..=max_anns,
                ),
            )
        })
        .prop_map(|(file_name, (width, height), names, seeds)| {
            let mut names: Vec<String> = names.into_iter().collect();
            names.sort();
            let registry = CategoryRegistry::from_names(names.iter().cloned());
            let categories: Vec<_> = registry.iter().cloned().collect();

            let meta = ImageMeta::new(1u64, file_name, width, height).expect("positive size");
            let mut image = CanonicalImage::new(meta);
            for (idx, ([a, b, c, d], crowd)) in seeds.into_iter().enumerate() {
                // Cycle through categories first so each one is used.
                let category = &categories[idx % categories.len()];
                let bbox = bbox_from_seed(width, height, a, b, c, d);
                image
                    .add_annotation(&registry, category, bbox, crowd)
                    .expect("valid annotation");
            }

            Sample { registry, image }
        })
        .boxed()
}
