use image::{DynamicImage, ImageBuffer, Rgb, RgbImage, Rgba, RgbaImage};
use rebuild_transparency::{
    composite_over, AlphaStrategy, Background, UnblendEngine, UnblendOptions,
};

/// A black ring with a soft edge, flattened onto white.
fn antialiased_on_white(size: u32) -> RgbImage {
    let center = f64::from(size) / 2.0;
    RgbImage::from_fn(size, size, |x, y| {
        let dx = f64::from(x) + 0.5 - center;
        let dy = f64::from(y) + 0.5 - center;
        let dist = (dx * dx + dy * dy).sqrt();
        let coverage = (center * 0.6 - dist).clamp(0.0, 1.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let v = (255.0 * (1.0 - coverage)).round() as u8;
        Rgb([v, v, v])
    })
}

#[test]
fn engine_defaults_to_white_max() {
    let engine = UnblendEngine::default();
    assert_eq!(engine.options().background, Background::WHITE);
    assert_eq!(engine.options().strategy, AlphaStrategy::Max);
    assert!(!engine.options().ignore_input_alpha);
}

#[test]
fn soft_edge_becomes_black_with_graded_alpha() {
    let src = antialiased_on_white(32);
    let engine = UnblendEngine::default();
    let out = engine.unblend_image(&DynamicImage::ImageRgb8(src.clone()));
    let out = out.as_rgba8().unwrap();
    assert_eq!(out.dimensions(), src.dimensions());

    for (x, y, px) in out.enumerate_pixels() {
        let observed = src.get_pixel(x, y)[0];
        assert_eq!(px[3], 255 - observed, "alpha at ({x},{y})");
        if px[3] > 0 {
            assert_eq!(&px.0[..3], &[0, 0, 0], "color at ({x},{y})");
        } else {
            assert_eq!(px.0, [0, 0, 0, 0]);
        }
    }

    let partial = out.pixels().filter(|p| p[3] > 0 && p[3] < 255).count();
    assert!(partial > 0, "edge should produce partially transparent pixels");
}

#[test]
fn restored_image_recomposites_onto_white() {
    #[allow(clippy::cast_possible_truncation)]
    let src = RgbImage::from_fn(16, 16, |x, y| {
        Rgb([(x * 16) as u8, (y * 16) as u8, 255 - (x * 8) as u8])
    });
    let out = UnblendEngine::default().unblend_image(&DynamicImage::ImageRgb8(src.clone()));

    for (x, y, px) in out.as_rgba8().unwrap().enumerate_pixels() {
        if px[3] == 0 {
            continue;
        }
        let flat = composite_over(*px, Background::WHITE);
        for ch in 0..3 {
            let diff = (i32::from(flat[ch]) - i32::from(src.get_pixel(x, y)[ch])).abs();
            assert!(diff <= 1, "({x},{y}) ch {ch}: {flat:?} vs {:?}", src.get_pixel(x, y));
        }
    }
}

#[test]
fn existing_alpha_is_multiplied_in() {
    let img = RgbaImage::from_fn(2, 1, |x, _| {
        if x == 0 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([0, 0, 0, 128])
        }
    });
    let out = UnblendEngine::default().unblend_image(&DynamicImage::ImageRgba8(img.clone()));
    let out = out.as_rgba8().unwrap();
    assert_eq!(out.get_pixel(0, 0)[3], 0);
    assert_eq!(out.get_pixel(1, 0)[3], 128);

    let ignoring = UnblendEngine::new(UnblendOptions {
        ignore_input_alpha: true,
        ..UnblendOptions::default()
    });
    let out = ignoring.unblend_image(&DynamicImage::ImageRgba8(img));
    assert!(out.as_rgba8().unwrap().pixels().all(|p| p[3] == 255));
}

#[test]
fn grey_inputs_expand_to_rgba() {
    let img = ImageBuffer::<image::Luma<u8>, Vec<u8>>::from_fn(3, 1, |x, _| {
        image::Luma([[0, 200, 255][x as usize]])
    });
    let out = UnblendEngine::default().unblend_image(&DynamicImage::ImageLuma8(img));
    let out = out.as_rgba8().unwrap();
    assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
    assert_eq!(out.get_pixel(1, 0).0, [0, 0, 0, 55]);
    assert_eq!(out.get_pixel(2, 0).0, [0, 0, 0, 0]);
}

#[test]
fn process_file_writes_png_with_alpha() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("logo.png");
    let output = dir.path().join("nested/out/logo_transparent.png");

    let mut src = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
    src.put_pixel(1, 1, Rgb([200, 200, 200]));
    src.put_pixel(2, 2, Rgb([255, 0, 0]));
    src.save(&input).unwrap();

    let result = UnblendEngine::default().process_file(&input, &output);
    assert!(result.success, "{}", result.message);
    let stats = result.stats.unwrap();
    assert_eq!(stats.transparent, 14);
    assert_eq!(stats.partial, 1);
    assert_eq!(stats.opaque, 1);

    let written = image::open(&output).unwrap().to_rgba8();
    assert_eq!(written.dimensions(), (4, 4));
    assert_eq!(written.get_pixel(0, 0).0, [0, 0, 0, 0]);
    assert_eq!(written.get_pixel(1, 1).0, [0, 0, 0, 55]);
    assert_eq!(written.get_pixel(2, 2).0, [255, 0, 0, 255]);
}

#[test]
fn process_file_keeps_sixteen_bit_png() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("deep.png");
    let output = dir.path().join("deep_out.png");

    let src = ImageBuffer::<Rgb<u16>, Vec<u16>>::from_pixel(2, 2, Rgb([0, u16::MAX, u16::MAX]));
    DynamicImage::ImageRgb16(src).save(&input).unwrap();

    let result = UnblendEngine::default().process_file(&input, &output);
    assert!(result.success, "{}", result.message);

    let written = image::open(&output).unwrap();
    let written = written.as_rgba16().expect("16-bit output");
    assert_eq!(written.get_pixel(0, 0).0, [0, u16::MAX, u16::MAX, u16::MAX]);
}

#[test]
fn process_file_reports_failures() {
    let dir = tempfile::tempdir().unwrap();
    let engine = UnblendEngine::default();

    let missing = engine.process_file(&dir.path().join("nope.png"), &dir.path().join("out.png"));
    assert!(!missing.success);
    assert!(missing.message.contains("Failed to load"));

    let input = dir.path().join("in.png");
    RgbImage::new(2, 2).save(&input).unwrap();
    let jpeg = engine.process_file(&input, &dir.path().join("out.jpg"));
    assert!(!jpeg.success);
    assert!(jpeg.message.contains("Failed to save"), "{}", jpeg.message);
    assert!(!dir.path().join("out.jpg").exists());
}

#[test]
fn process_directory_handles_every_supported_file() {
    let input_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    let out_path = output_dir.path().join("results");

    RgbImage::from_pixel(3, 3, Rgb([128, 128, 128]))
        .save(input_dir.path().join("a.png"))
        .unwrap();
    RgbImage::from_pixel(3, 3, Rgb([0, 0, 0]))
        .save(input_dir.path().join("b.jpg"))
        .unwrap();
    std::fs::write(input_dir.path().join("notes.txt"), "not an image").unwrap();

    let results = UnblendEngine::default().process_directory(input_dir.path(), &out_path);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success), "{results:?}");
    assert!(out_path.join("a.png").exists());
    assert!(out_path.join("b.png").exists());

    let a = image::open(out_path.join("a.png")).unwrap().to_rgba8();
    assert_eq!(a.get_pixel(0, 0).0, [0, 0, 0, 127]);
}

#[test]
fn process_directory_reports_unreadable_dir() {
    let dir = tempfile::tempdir().unwrap();
    let results =
        UnblendEngine::default().process_directory(&dir.path().join("missing"), dir.path());
    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
}

#[test]
fn process_directory_refuses_colliding_outputs() {
    let input_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();

    RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]))
        .save(input_dir.path().join("logo.jpg"))
        .unwrap();
    RgbImage::from_pixel(2, 2, Rgb([200, 200, 200]))
        .save(input_dir.path().join("logo.png"))
        .unwrap();

    let results = UnblendEngine::default().process_directory(input_dir.path(), output_dir.path());
    assert_eq!(results.len(), 2);

    let jpg = results.iter().find(|r| r.path.ends_with("logo.jpg")).unwrap();
    assert!(!jpg.success);
    assert!(jpg.message.contains("collides"), "{}", jpg.message);

    let png = results.iter().find(|r| r.path.ends_with("logo.png")).unwrap();
    assert!(png.success, "{}", png.message);

    let outputs: Vec<_> = std::fs::read_dir(output_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(outputs, vec![std::ffi::OsString::from("logo.png")]);

    let written = image::open(output_dir.path().join("logo.png")).unwrap().to_rgba8();
    assert!(written.pixels().all(|p| p.0 == [0, 0, 0, 55]));
}

#[test]
fn exact_half_levels_round_down_across_an_image() {
    let img = RgbImage::from_fn(2, 1, |x, _| {
        if x == 0 {
            Rgb([30, 5, 5])
        } else {
            Rgb([130, 5, 5])
        }
    });
    let out = UnblendEngine::default().unblend_image(&DynamicImage::ImageRgb8(img));
    let out = out.as_rgba8().unwrap();
    assert_eq!(out.get_pixel(0, 0).0, [25, 0, 0, 250]);
    assert_eq!(out.get_pixel(1, 0).0, [127, 0, 0, 250]);
}
