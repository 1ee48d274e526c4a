// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand handlers. Image and PDF work runs on the blocking pool so the
// async runtime stays free.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use docscan_capture::{
    CameraHandler, CameraProperties, DEFAULT_CAPTURE_INTERVAL, FrameSource, StillImageSource,
    list_cameras,
};
use docscan_core::AppConfig;
use docscan_core::error::{DocscanError, Result};
use docscan_document::{PdfReader, PdfWriter};
use image::DynamicImage;
use tracing::{info, instrument, warn};

use crate::cli::{CaptureArgs, Command, ScanArgs};
use crate::services::integrity::hash_bytes;
use crate::session::ScanSession;

/// How long to wait for a camera's first frame.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(command: Command, config: AppConfig, config_path: PathBuf) -> Result<()> {
    match command {
        Command::Scan(args) => blocking(move || scan(&args, &config)).await,
        Command::Ocr { input, output, raw } => {
            blocking(move || ocr(&input, output.as_deref(), raw, &config)).await
        }
        Command::Process {
            input,
            output,
            raw,
            require_edges,
            adjust,
        } => {
            blocking(move || {
                let mut session = ScanSession::new(&config);
                session.load_file(&input)?;
                if !raw {
                    let found = session.auto_process()?;
                    report_edges(&input, found);
                    if require_edges && !found {
                        return Err(DocscanError::DetectionFailed);
                    }
                }
                let adjustments = adjust.adjustments();
                if !adjustments.is_identity() {
                    session.apply_adjustments(adjustments)?;
                }
                session.save_image(&output, config.jpeg_quality)?;
                println!("{}", output.display());
                Ok(())
            })
            .await
        }
        Command::Capture(args) => blocking(move || capture(&args, &config)).await,
        Command::Cameras => {
            let cameras = blocking(|| Ok(list_cameras())).await?;
            if cameras.is_empty() {
                println!("No cameras found.");
            }
            for camera in cameras {
                println!(
                    "{}: {} ({}x{} @ {} fps)",
                    camera.index, camera.name, camera.width, camera.height, camera.fps
                );
            }
            Ok(())
        }
        Command::Merge { inputs, output } => {
            blocking(move || {
                let bytes = PdfReader::merge_files(inputs.as_slice())?;
                write_file(&output, &bytes)?;
                let pages = PdfReader::from_bytes(&bytes)?.page_count();
                print_export(&output, pages, &bytes);
                Ok(())
            })
            .await
        }
        Command::Info { input, json } => {
            let path = input.clone();
            let info = blocking(move || PdfReader::open(&path).map(|reader| reader.metadata())).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
                return Ok(());
            }
            println!("File:      {}", input.display());
            println!("Pages:     {}", info.page_count);
            println!("Version:   {}", info.version);
            for (label, value) in [
                ("Title", &info.title),
                ("Author", &info.author),
                ("Subject", &info.subject),
                ("Keywords", &info.keywords),
                ("Creator", &info.creator),
                ("Producer", &info.producer),
                ("Created", &info.creation_date),
                ("Modified", &info.modification_date),
            ] {
                if let Some(value) = value {
                    println!("{:<10} {}", format!("{label}:"), value);
                }
            }
            Ok(())
        }
        Command::Config { init, force } => {
            if !init {
                println!("# {}", config_path.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
                return Ok(());
            }
            if config_path.exists() && !force {
                return Err(DocscanError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                )));
            }
            let path = config_path.clone();
            blocking(move || AppConfig::default().save(&path)).await?;
            println!("Wrote default configuration to {}", config_path.display());
            Ok(())
        }
    }
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(std::io::Error::other)?
}

// -- scan ---------------------------------------------------------------------

#[instrument(skip_all, fields(images = args.images.len(), output = %args.output.display()))]
fn scan(args: &ScanArgs, config: &AppConfig) -> Result<()> {
    let mut session = ScanSession::new(config);
    let adjustments = args.adjust.adjustments();

    for (index, path) in args.images.iter().enumerate() {
        session.load_file(path)?;
        if !args.raw {
            report_edges(path, session.auto_process()?);
        }
        if !adjustments.is_identity() {
            session.apply_adjustments(adjustments)?;
        }
        let name = args.names.get(index).map(String::as_str);
        session.add_page(name)?;
    }
    if args.names.len() > args.images.len() {
        warn!(
            names = args.names.len(),
            images = args.images.len(),
            "More page names than images; extra names ignored"
        );
    }

    if args.wants_ocr() {
        recognize_pages(&mut session, config)?;
    }

    let mut writer = PdfWriter::from_settings(&config.pdf);
    if let Some(paper) = args.paper {
        writer.set_paper_size(paper);
    }
    if let Some(title) = &args.title {
        writer.set_title(title);
    }
    if let Some(author) = &args.author {
        writer.set_author(author);
    }

    let bytes = session.export_pdf(&writer, &args.output, args.searchable)?;
    if let Some(text_out) = &args.text_out {
        write_file(text_out, combined_text(&session).as_bytes())?;
        info!(path = %text_out.display(), "Recognised text written");
    }
    print_export(&args.output, session.document().len(), &bytes);
    Ok(())
}

/// Page texts, each under a `--- name ---` header.
fn combined_text(session: &ScanSession) -> String {
    session
        .document()
        .pages()
        .iter()
        .map(|page| format!("--- {} ---\n{}\n", page.name, page.text.as_deref().unwrap_or("")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(feature = "ocr")]
fn recognize_pages(session: &mut ScanSession, config: &AppConfig) -> Result<()> {
    let engine = docscan_document::OcrEngine::from_settings(&config.ocr)?;
    session.extract_all_text(&engine)
}

#[cfg(not(feature = "ocr"))]
fn recognize_pages(_session: &mut ScanSession, _config: &AppConfig) -> Result<()> {
    Err(DocscanError::OcrUnavailable)
}

// -- ocr ----------------------------------------------------------------------

#[cfg(feature = "ocr")]
#[instrument(skip(config))]
fn ocr(input: &Path, output: Option<&Path>, raw: bool, config: &AppConfig) -> Result<()> {
    let engine = docscan_document::OcrEngine::from_settings(&config.ocr)?;
    let mut session = ScanSession::new(config);
    session.load_file(input)?;
    if !raw {
        report_edges(input, session.auto_process()?);
    }

    let text = session.extract_text(&engine)?;
    match output {
        Some(path) if is_pdf(path) => {
            PdfWriter::from_settings(&config.pdf).write_text_to_file(&text, path)?;
            println!("{}", path.display());
        }
        Some(path) => {
            write_file(path, text.as_bytes())?;
            println!("{}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

#[cfg(not(feature = "ocr"))]
fn ocr(_input: &Path, _output: Option<&Path>, _raw: bool, _config: &AppConfig) -> Result<()> {
    Err(DocscanError::OcrUnavailable)
}

// -- capture ------------------------------------------------------------------

#[instrument(skip_all)]
fn capture(args: &CaptureArgs, config: &AppConfig) -> Result<()> {
    let mut handler = CameraHandler::new().with_jpeg_quality(config.jpeg_quality);

    if args.from_files.is_empty() {
        let index = args.camera.unwrap_or(config.camera.index);
        start_camera(&mut handler, index, CameraProperties::from(&config.camera))?;
    } else {
        let files = args.from_files.clone();
        handler.start(move || Ok(Box::new(StillImageSource::from_files(files)) as Box<dyn FrameSource>))?;
    }

    let deadline = Instant::now() + FIRST_FRAME_TIMEOUT;
    while handler.frame().is_none() {
        if !handler.is_active() || Instant::now() > deadline {
            return Err(DocscanError::CaptureFailed(
                "the camera did not deliver any frames".into(),
            ));
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    let output = args.output.clone().unwrap_or_else(|| {
        config
            .output_dir
            .join(docscan_capture::handler::default_capture_name())
    });
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    if args.preview {
        let saved = handler.save_frame(Some(&output))?;
        println!("{}", saved.display());
        return Ok(());
    }

    let still = handler.capture_high_quality(args.frames, DEFAULT_CAPTURE_INTERVAL)?;
    handler.stop();

    let mut session = ScanSession::new(config);
    session.load_image(DynamicImage::ImageRgb8(still));
    if args.process {
        report_edges(&output, session.auto_process()?);
    }
    session.save_image(&output, config.jpeg_quality)?;
    println!("{}", output.display());
    Ok(())
}

#[cfg(feature = "webcam")]
fn start_camera(handler: &mut CameraHandler, index: u32, properties: CameraProperties) -> Result<()> {
    handler.start(docscan_capture::WebcamSource::opener(index, properties))
}

#[cfg(not(feature = "webcam"))]
fn start_camera(_handler: &mut CameraHandler, index: u32, _properties: CameraProperties) -> Result<()> {
    warn!(camera = index, "Built without webcam support");
    Err(DocscanError::PlatformUnavailable)
}

// -- helpers ------------------------------------------------------------------

fn report_edges(path: &Path, found: bool) {
    if found {
        info!(path = %path.display(), "Document edges found");
    } else {
        warn!(path = %path.display(), "No document edges found; enhanced the whole image");
    }
}

#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

fn print_export(path: &Path, pages: usize, bytes: &[u8]) {
    println!(
        "{}  {} page{}  sha256:{}",
        path.display(),
        pages,
        if pages == 1 { "" } else { "s" },
        hash_bytes(bytes)
    );
}
