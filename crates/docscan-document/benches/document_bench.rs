// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the scanning pipeline: edge detection on its own
// and the full detect / warp / binarize pass, on a synthetic photo of a page.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, Luma};

use docscan_core::PaperSize;
use docscan_document::ScanEnhancer;
use docscan_document::scan::detect::{DetectionParams, find_document_quad};

/// 640x480 dark desk with a bright sheet from (120, 60) to (520, 420).
fn desk_photo() -> DynamicImage {
    let mut img = GrayImage::from_pixel(640, 480, Luma([35u8]));
    for y in 60..420 {
        for x in 120..520 {
            img.put_pixel(x, y, Luma([230u8]));
        }
    }
    DynamicImage::ImageLuma8(img)
}

fn bench_edge_detection(c: &mut Criterion) {
    let photo = desk_photo();
    let params = DetectionParams::default();

    c.bench_function("find_document_quad (640x480)", |b| {
        b.iter(|| black_box(find_document_quad(black_box(&photo), &params)));
    });
}

fn bench_full_process(c: &mut Criterion) {
    let photo = desk_photo();

    c.bench_function("process (640x480)", |b| {
        b.iter(|| {
            let enhancer = ScanEnhancer::from_dynamic(black_box(photo.clone()), PaperSize::A4);
            black_box(enhancer.process().image);
        });
    });
}

criterion_group!(benches, bench_edge_detection, bench_full_process);
criterion_main!(benches);
