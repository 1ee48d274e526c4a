// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use docscan_core::{Adjustments, PaperSize};

#[derive(Debug, Parser)]
#[command(name = "docscan")]
#[command(version)]
#[command(about = "Scan documents from a webcam or image files into clean, multi-page PDFs", long_about = None)]
pub struct Cli {
    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file [default: $XDG_CONFIG_HOME/docscan/config.json]
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Turn photos of pages into one PDF
    Scan(ScanArgs),

    /// Recognise the text in an image
    Ocr {
        /// Input image
        #[arg(value_name = "IMAGE")]
        input: PathBuf,

        /// Write the text here instead of stdout (a .pdf path writes a text PDF)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Skip edge detection and perspective correction
        #[arg(long)]
        raw: bool,
    },

    /// Straighten and clean up a single image
    Process {
        /// Input image
        #[arg(value_name = "IMAGE")]
        input: PathBuf,

        /// Output image (format from the extension)
        #[arg(short, long, value_name = "IMAGE")]
        output: PathBuf,

        /// Skip edge detection and perspective correction
        #[arg(long)]
        raw: bool,

        /// Fail instead of enhancing the whole image when no page outline is found
        #[arg(long, conflicts_with = "raw")]
        require_edges: bool,

        #[command(flatten)]
        adjust: AdjustArgs,
    },

    /// Grab a still from a camera
    Capture(CaptureArgs),

    /// List available cameras
    Cameras,

    /// Concatenate PDFs
    Merge {
        /// Input PDFs, in order
        #[arg(value_name = "PDF", required = true)]
        inputs: Vec<PathBuf>,

        /// Output PDF
        #[arg(short, long, value_name = "PDF")]
        output: PathBuf,
    },

    /// Show page count and metadata of a PDF
    Info {
        /// Input PDF
        #[arg(value_name = "PDF")]
        input: PathBuf,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration, or write a default config file
    Config {
        /// Write defaults to the config path
        #[arg(long)]
        init: bool,

        /// Overwrite an existing file with --init
        #[arg(long, requires = "init")]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Page images, in order (.jpg .jpeg .png .bmp .tiff .tif)
    #[arg(value_name = "IMAGES", required = true)]
    pub images: Vec<PathBuf>,

    /// Output PDF
    #[arg(short, long, value_name = "PDF")]
    pub output: PathBuf,

    /// Skip edge detection and perspective correction
    #[arg(long)]
    pub raw: bool,

    #[command(flatten)]
    pub adjust: AdjustArgs,

    /// Page names, in order (repeatable; missing names become "Page N")
    #[arg(long = "name", value_name = "NAME")]
    pub names: Vec<String>,

    /// PDF title
    #[arg(long)]
    pub title: Option<String>,

    /// PDF author
    #[arg(long)]
    pub author: Option<String>,

    /// Paper size: a4, letter, or legal [default: from config]
    #[arg(long, value_parser = parse_paper)]
    pub paper: Option<PaperSize>,

    /// Run OCR on every page
    #[arg(long)]
    pub ocr: bool,

    /// Embed recognised text as an invisible layer (implies --ocr)
    #[arg(long)]
    pub searchable: bool,

    /// Also write recognised text to this file (implies --ocr)
    #[arg(long, value_name = "FILE")]
    pub text_out: Option<PathBuf>,
}

impl ScanArgs {
    pub fn wants_ocr(&self) -> bool {
        self.ocr || self.searchable || self.text_out.is_some()
    }
}

#[derive(Debug, Args)]
pub struct CaptureArgs {
    /// Camera index [default: from config]
    #[arg(long, value_name = "N")]
    pub camera: Option<u32>,

    /// Frames sampled for the sharpest still
    #[arg(long, value_name = "N", default_value_t = docscan_capture::DEFAULT_CAPTURE_FRAMES)]
    pub frames: usize,

    /// Output image [default: capture_YYYYmmdd_HHMMSS.jpg in the output dir]
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Straighten and clean up the still before saving
    #[arg(long)]
    pub process: bool,

    /// Save the live preview frame instead of a high-quality still
    #[arg(long, conflicts_with = "process")]
    pub preview: bool,

    /// Read frames from image files instead of a camera
    #[arg(long = "from", value_name = "IMAGE")]
    pub from_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, Args)]
pub struct AdjustArgs {
    /// Brightness factor (0.5-2.0)
    #[arg(long, default_value_t = 1.0)]
    pub brightness: f32,

    /// Contrast factor (0.5-2.0)
    #[arg(long, default_value_t = 1.0)]
    pub contrast: f32,

    /// Sharpness factor (0.0-3.0)
    #[arg(long, default_value_t = 1.0)]
    pub sharpness: f32,
}

impl AdjustArgs {
    pub fn adjustments(&self) -> Adjustments {
        Adjustments::new(self.brightness, self.contrast, self.sharpness)
    }
}

fn parse_paper(name: &str) -> Result<PaperSize, String> {
    PaperSize::from_name(name)
        .ok_or_else(|| format!("unknown paper size '{name}' (expected a4, letter, or legal)"))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scan_arguments_parse() {
        let cli = Cli::try_parse_from([
            "docscan", "scan", "a.jpg", "b.png", "-o", "out.pdf", "--name", "Front", "--paper",
            "LETTER", "--brightness", "1.2", "--searchable",
        ])
        .unwrap();

        let Some(Command::Scan(args)) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.images.len(), 2);
        assert_eq!(args.names, vec!["Front".to_string()]);
        assert_eq!(args.paper, Some(PaperSize::Letter));
        assert_eq!(args.adjust.adjustments(), Adjustments::new(1.2, 1.0, 1.0));
        assert!(args.wants_ocr());
    }

    #[test]
    fn unknown_paper_is_rejected() {
        let result = Cli::try_parse_from(["docscan", "scan", "a.jpg", "-o", "x.pdf", "--paper", "a3"]);
        assert!(result.is_err());
    }

    #[test]
    fn no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["docscan", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn capture_defaults() {
        let cli = Cli::try_parse_from(["docscan", "capture"]).unwrap();
        let Some(Command::Capture(args)) = cli.command else {
            panic!("expected capture");
        };
        assert_eq!(args.frames, 5);
        assert!(args.camera.is_none());
        assert!(!args.preview);
    }
}
