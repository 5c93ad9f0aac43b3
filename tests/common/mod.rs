#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// A black 24-bit BMP of the given size.
///
/// Small enough to write per test, and readable both by `imagesize` (header
/// only) and by the `image` decoder.
pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    const HEADERS: u32 = 14 + 40;
    let pixels = (width * 3).div_ceil(4) * 4 * height;

    let file_header: [&[u8]; 4] = [
        b"BM",
        &(HEADERS + pixels).to_le_bytes(),
        &[0; 4],
        &HEADERS.to_le_bytes(),
    ];
    let info_header: [&[u8]; 8] = [
        &40u32.to_le_bytes(),
        &width.to_le_bytes(),
        &height.to_le_bytes(),
        &1u16.to_le_bytes(),  // planes
        &24u16.to_le_bytes(), // bits per pixel
        &[0; 4],              // no compression
        &pixels.to_le_bytes(),
        &[0; 16], // resolution and palette fields
    ];

    let mut bytes: Vec<u8> = file_header
        .into_iter()
        .chain(info_header)
        .flatten()
        .copied()
        .collect();
    bytes.resize((HEADERS + pixels) as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(&path, content).expect("write fixture");
    path
}

/// The single-image COCO document used across the conversion tests.
pub const COCO_CAR: &str = r#"{
  "images":[{"id":1,"width":100,"height":50,"file_name":"a.jpg"}],
  "categories":[{"id":1,"name":"car"}],
  "annotations":[{"id":1,"image_id":1,"category_id":1,"bbox":[10,5,20,15]}]
}"#;
