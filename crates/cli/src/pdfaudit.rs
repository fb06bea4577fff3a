//! pdfaudit - PDF auditing tool for security and privacy
//!
//! Reports active content (JavaScript, launch/URI/GoTo actions, automatic
//! actions, embedded files) found in a PDF's object model.

use anyhow::{Context, bail};
use clap::{ArgAction, Parser};
use memmap2::Mmap;
use pdfaudit_core::document::{AuditReport, XrefSource};
use pdfaudit_core::{AuditOptions, Location, RiskFinding, audit};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

const VERSION_TEXT: &str = concat!("pdfaudit v", env!("CARGO_PKG_VERSION"));

const WARRANTY_TEXT: &str = "
  Disclaimer of Warranty.

  THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.";

const COPYRIGHT_TEXT: &str = "
pdfaudit is a pdf auditing tool for security and privacy
Copyright (C) the pdfaudit contributors

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files, to deal in the Software
without restriction, subject to the conditions of the MIT license. The above
copyright notice and this permission notice shall be included in all copies
or substantial portions of the Software.";

const EPILOG: &str = "pdfaudit comes with ABSOLUTELY NO WARRANTY; for details use `-w`.
This is free software, and you are welcome to redistribute it under certain
conditions; use `-c` for details.";

#[derive(Parser, Debug)]
#[command(name = "pdfaudit")]
#[command(about = "pdfaudit is a pdf auditing tool for security and privacy", long_about = None)]
#[command(after_help = EPILOG)]
#[command(disable_version_flag = true)]
struct Args {
    /// PDF file to be audited
    #[arg(required_unless_present_any = ["version", "warranty", "copyright"])]
    filename: Option<PathBuf>,

    /// Detail level of output: 0 minimal, 1 default, 2 detail, 3 debug
    #[arg(short = 'd', default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=3))]
    detail: u8,

    /// Print the document structure in addition to the threat scan
    #[arg(short = 's', long = "structure", action = ArgAction::SetTrue)]
    structure: bool,

    /// Show version
    #[arg(short = 'v', long = "version", action = ArgAction::SetTrue)]
    version: bool,

    /// Show warranty
    #[arg(short = 'w', long = "warranty", action = ArgAction::SetTrue)]
    warranty: bool,

    /// Show copyright
    #[arg(short = 'c', long = "copyright", action = ArgAction::SetTrue)]
    copyright: bool,

    /// Print findings as a JSON array
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,

    /// Read one-element arrays as their only element
    #[arg(long = "collapse-arrays", action = ArgAction::SetTrue)]
    collapse_arrays: bool,
}

/// One finding in `--json` output.
#[derive(Serialize, Debug)]
struct FindingRecord<'a> {
    category: &'a str,
    object: u32,
    generation: u32,
    offset: Option<usize>,
    container: Option<u32>,
    detail: &'a str,
}

impl<'a> From<&'a RiskFinding> for FindingRecord<'a> {
    fn from(finding: &'a RiskFinding) -> Self {
        let (offset, container) = match finding.location {
            Location::Offset(offset) => (Some(offset), None),
            Location::ObjStm(container) => (None, Some(container.objid)),
        };
        Self {
            category: &finding.category,
            object: finding.key.objid,
            generation: finding.key.genno,
            offset,
            container,
            detail: &finding.detail,
        }
    }
}

/// Install the stdout subscriber. `RUST_LOG` overrides the `-d` level.
fn init_logging(detail: u8) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let level = match detail {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stdout)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .without_time()
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")
}

fn write_findings<W: Write>(out: &mut W, report: &AuditReport) -> io::Result<()> {
    for findings in report.by_category().values() {
        for finding in findings {
            writeln!(out, "{finding}")?;
        }
    }
    Ok(())
}

fn write_json<W: Write>(out: &mut W, report: &AuditReport) -> anyhow::Result<()> {
    let records: Vec<FindingRecord<'_>> = report.findings.iter().map(FindingRecord::from).collect();
    serde_json::to_writer_pretty(&mut *out, &records)?;
    writeln!(out)?;
    Ok(())
}

fn write_structure<W: Write>(out: &mut W, report: &AuditReport) -> io::Result<()> {
    writeln!(
        out,
        "PDF version: {}",
        report.version.as_deref().unwrap_or("(no header)")
    )?;

    writeln!(out, "Objects found by structure scan: {}", report.scan.len())?;
    for object in report.scan.objects() {
        writeln!(
            out,
            "  {} obj at {:#x}..{:#x}{}",
            object.key,
            object.offset,
            object.end,
            if object.objstm { " (object stream)" } else { "" }
        )?;
    }
    for pos in &report.scan.trailers {
        writeln!(out, "trailer at {pos:#x}")?;
    }
    for pos in &report.scan.startxrefs {
        writeln!(out, "startxref at {pos:#x}")?;
    }

    match report.xref_source {
        XrefSource::Declared => {
            let sections: Vec<String> = report
                .xref
                .sections()
                .iter()
                .map(|pos| format!("{pos:#x}"))
                .collect();
            writeln!(
                out,
                "Cross-reference table: {} entries from sections at {}",
                report.xref.len(),
                sections.join(", ")
            )?;
        }
        XrefSource::StructureScan => {
            writeln!(out, "Cross-reference table: unusable, structure scan used")?;
        }
    }
    for (key, entry) in report.xref.iter() {
        writeln!(out, "  {key}: {entry}")?;
    }
    writeln!(out)
}

fn run(args: &Args) -> anyhow::Result<()> {
    let Some(path) = args.filename.as_ref() else {
        bail!("no input file given");
    };
    if !path.is_file() {
        bail!("File not found: {}", path.display());
    }
    info!("Scanning: {}", path.display());

    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let len = file.metadata()?.len();
    // SAFETY: the mapping is read-only and lives until the audit returns.
    let mmap = if len == 0 {
        None
    } else {
        Some(unsafe { Mmap::map(&file) }.with_context(|| format!("cannot map {}", path.display()))?)
    };
    let data: &[u8] = mmap.as_deref().unwrap_or_default();

    let options = AuditOptions::default().with_collapse_single_arrays(args.collapse_arrays);
    let report = audit(data, &options)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.structure {
        write_structure(&mut out, &report)?;
    }
    if args.json {
        write_json(&mut out, &report)?;
    } else {
        write_findings(&mut out, &report)?;
    }
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.version || args.warranty || args.copyright {
        if args.version {
            println!("{VERSION_TEXT}");
        }
        if args.warranty {
            println!("{WARRANTY_TEXT}");
        }
        if args.copyright {
            println!("{COPYRIGHT_TEXT}");
        }
        return ExitCode::SUCCESS;
    }

    if let Err(e) = init_logging(args.detail) {
        eprintln!("pdfaudit: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pdfaudit: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn detail_level_is_bounded() {
        assert!(Args::try_parse_from(["pdfaudit", "a.pdf", "-d", "3"]).is_ok());
        assert!(Args::try_parse_from(["pdfaudit", "a.pdf", "-d", "4"]).is_err());
    }

    #[test]
    fn filename_optional_for_info_flags() {
        assert!(Args::try_parse_from(["pdfaudit", "-w"]).is_ok());
        assert!(Args::try_parse_from(["pdfaudit"]).is_err());
    }

    #[test]
    fn json_record_splits_location() {
        let finding = RiskFinding {
            key: pdfaudit_core::ObjectKey::new(4, 0),
            location: Location::ObjStm(pdfaudit_core::ObjectKey::new(9, 0)),
            category: "URI".into(),
            detail: "http://x.test".into(),
        };
        let json = serde_json::to_value(FindingRecord::from(&finding)).unwrap();
        assert_eq!(json["object"], 4);
        assert_eq!(json["container"], 9);
        assert!(json["offset"].is_null());
    }
}
