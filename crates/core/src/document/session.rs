//! Audit session: every table built while auditing one document.
//!
//! The session borrows the document bytes and the options for its whole
//! life. Tables and caches are dropped with it; values stored in the cache
//! are never mutated.

use super::cache::ObjectCache;
use super::scanner::StructureScan;
use super::xref::{XrefTable, find_startxref};
use crate::config::AuditOptions;
use crate::error::{PdfError, Result};
use crate::model::objects::ObjectKey;
use crate::threat::{Location, RiskFinding};
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Where the audited object keys came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefSource {
    /// The declared cross-reference chain loaded.
    Declared,
    /// No usable declared chain; only the structure scan was used.
    StructureScan,
}

/// Counters kept for instrumentation and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Indirect objects parsed from the file.
    pub objects_parsed: usize,
    /// Objects parsed out of object streams.
    pub embedded_objects: usize,
    /// Cursor seeks performed by object reads.
    pub seeks: usize,
}

/// The object whose body is currently being read.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
    pub key: ObjectKey,
    pub location: Location,
}

/// Mutable state of one audit run.
pub struct AuditSession<'a> {
    data: &'a [u8],
    options: &'a AuditOptions,
    version: Option<String>,
    xref_source: XrefSource,
    prepared: bool,
    pub(crate) scan: StructureScan,
    pub(crate) xref: XrefTable,
    pub(crate) cache: ObjectCache,
    /// Keys whose read is in progress.
    pub(crate) resolving: HashSet<ObjectKey>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) depth: usize,
    pub(crate) findings: Vec<RiskFinding>,
    pub(crate) stats: SessionStats,
}

impl<'a> AuditSession<'a> {
    pub fn new(data: &'a [u8], options: &'a AuditOptions) -> Self {
        Self {
            data,
            options,
            version: None,
            xref_source: XrefSource::StructureScan,
            prepared: false,
            scan: StructureScan::default(),
            xref: XrefTable::new(),
            cache: ObjectCache::new(),
            resolving: HashSet::new(),
            frames: Vec::new(),
            depth: 0,
            findings: Vec::new(),
            stats: SessionStats::default(),
        }
    }

    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    pub const fn options(&self) -> &'a AuditOptions {
        self.options
    }

    /// Read the header, scan the structure and load the declared
    /// cross-reference chain. Does nothing when already prepared.
    ///
    /// A declared chain that does not parse is logged and ignored; only
    /// structural errors (cycles, unsupported predictors, runaway nesting)
    /// abort.
    pub fn prepare(&mut self) -> Result<()> {
        if self.prepared {
            return Ok(());
        }
        self.version = header_version(self.data);
        match &self.version {
            Some(version) => info!("PDF version: {version}"),
            None => warn!("no %PDF- header found"),
        }

        self.scan = StructureScan::scan(self.data);

        match find_startxref(self.data) {
            Err(e) => warn!("{e}; auditing from the structure scan"),
            Ok(start) => match self.load_xref_chain(start) {
                Ok(table) => {
                    self.xref = table;
                    self.xref_source = XrefSource::Declared;
                }
                Err(e) if e.is_structural_fatal() => return Err(e),
                Err(e) => {
                    warn!("declared cross-reference data unusable ({e}); auditing from the structure scan");
                    self.resolving.clear();
                    self.frames.clear();
                    self.depth = 0;
                }
            },
        }

        self.prepared = true;
        Ok(())
    }

    /// Audit the whole document and hand back the report.
    pub fn run(mut self) -> Result<AuditReport> {
        self.prepare()?;
        self.iterate()?;
        Ok(self.into_report())
    }

    /// Keys in audit order: declared keys in table order, then keys only
    /// the structure scan knows, in file order.
    pub fn iteration_keys(&self) -> Vec<ObjectKey> {
        let mut keys: Vec<ObjectKey> = self.xref.keys().copied().collect();
        keys.extend(
            self.scan
                .objects()
                .map(|o| o.key)
                .filter(|k| self.xref.get(k).is_none() && !self.xref.is_freed(k)),
        );
        keys
    }

    /// Resolve every object once, collecting findings on the way.
    fn iterate(&mut self) -> Result<()> {
        let keys = self.iteration_keys();
        info!("Number of objects: {}", keys.len());
        for key in keys {
            debug!("[XREFITER]: {key}");
            if self.cache.contains(&key) {
                continue;
            }
            if self.locate(key).is_none() {
                warn!("object {key} is declared but could not be located; skipped");
                continue;
            }
            match self.resolve(key) {
                Ok(_) => {}
                Err(PdfError::ObjectNotFound(missing)) if missing == key => {
                    warn!("object {key} is declared but could not be located; skipped");
                }
                Err(e) => return Err(e),
            }
        }
        info!("Finished reading pdf");
        Ok(())
    }

    pub fn findings(&self) -> &[RiskFinding] {
        &self.findings
    }

    pub const fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub const fn xref(&self) -> &XrefTable {
        &self.xref
    }

    pub const fn structure(&self) -> &StructureScan {
        &self.scan
    }

    pub const fn xref_source(&self) -> XrefSource {
        self.xref_source
    }

    fn into_report(self) -> AuditReport {
        AuditReport {
            version: self.version,
            findings: self.findings,
            xref_source: self.xref_source,
            scan: self.scan,
            xref: self.xref,
            stats: self.stats,
        }
    }
}

/// Version string following `%PDF-` at the start of the file.
pub fn header_version(data: &[u8]) -> Option<String> {
    let rest = data.strip_prefix(b"%PDF-")?;
    let version: String = rest
        .iter()
        .take(8)
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .map(|&b| char::from(b))
        .collect();
    (!version.is_empty()).then_some(version)
}

/// Audit `data` with `options`.
pub fn audit(data: &[u8], options: &AuditOptions) -> Result<AuditReport> {
    AuditSession::new(data, options).run()
}

/// Outcome of an audit run.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub version: Option<String>,
    /// Findings in discovery order.
    pub findings: Vec<RiskFinding>,
    pub xref_source: XrefSource,
    pub scan: StructureScan,
    pub xref: XrefTable,
    pub stats: SessionStats,
}

impl AuditReport {
    /// Findings grouped by category, categories in order of first
    /// appearance.
    pub fn by_category(&self) -> IndexMap<&str, Vec<&RiskFinding>> {
        let mut groups: IndexMap<&str, Vec<&RiskFinding>> = IndexMap::new();
        for finding in &self.findings {
            groups
                .entry(finding.category.as_str())
                .or_default()
                .push(finding);
        }
        groups
    }

    pub fn count(&self, category: &str) -> usize {
        self.findings
            .iter()
            .filter(|f| f.category == category)
            .count()
    }
}
