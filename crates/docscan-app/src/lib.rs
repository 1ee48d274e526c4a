// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan front end: the scan session model, the command-line interface, and
// the subcommand handlers behind the `docscan` binary.

pub mod cli;
pub mod commands;
pub mod services;
pub mod session;

pub use session::ScanSession;
