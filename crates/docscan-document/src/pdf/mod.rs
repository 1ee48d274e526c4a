// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: multi-page PDF creation from scans, metadata, and merging.

pub mod reader;
pub mod writer;

pub use reader::{PdfInfo, PdfReader};
pub use writer::PdfWriter;
