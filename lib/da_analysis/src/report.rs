//! The analysis report, assembled from the outputs of every stage.

use crate::errors::AnalysisError;
use crate::repo::Repo;
use crate::rules::{self, Evaluation, Finding};
use crate::xref::{EntryPoint, ReachabilitySet};
use da_dex::errors::DexError;
use da_dex::AccessFlags;
use da_package::errors::PackageError;
use da_package::Container;
use da_resources::errors::ResourcesError;
use da_resources::manifest::ManifestFacts;
use da_resources::table::{ResourceTable, ResourcesSummary};
use serde::Serialize;
use std::fmt;

/// The stage that raised a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Container,
    Manifest,
    Resources,
    Bytecode,
    CrossReference,
    Rules,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Container => "container",
            Self::Manifest => "manifest",
            Self::Resources => "resources",
            Self::Bytecode => "bytecode",
            Self::CrossReference => "cross_reference",
            Self::Rules => "rules",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningKind {
    MalformedBinaryXml,
    ResourceNotFound,
    MalformedResourceTable,
    MalformedClassSkipped,
    DuplicateClass,
    UnresolvedComponent,
    ClassNotFound,
    RuleFailure,
    MissingEntry,
    ChecksumMismatch,
}

/// A degraded condition the analysis went past.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub stage: Stage,
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(stage: Stage, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    /// Converts a decoding error of the manifest document or of the
    /// resource table. Structural errors are attributed to the document
    /// being decoded at `stage`.
    #[must_use]
    pub fn from_resources(stage: Stage, err: &ResourcesError) -> Self {
        let kind = match err {
            ResourcesError::MalformedBinaryXml { .. }
            | ResourcesError::MissingAttribute { .. }
            | ResourcesError::UnexpectedRoot(_) => WarningKind::MalformedBinaryXml,
            ResourcesError::ResourceNotFound(_)
            | ResourcesError::UnresolvedReference { .. }
            | ResourcesError::ReferenceLoop(_) => WarningKind::ResourceNotFound,
            ResourcesError::MalformedResourceTable(_) => WarningKind::MalformedResourceTable,
            _ if stage == Stage::Manifest => WarningKind::MalformedBinaryXml,
            _ => WarningKind::MalformedResourceTable,
        };
        Self::new(stage, kind, err.to_string())
    }

    #[must_use]
    pub fn from_dex(image: &str, err: &DexError) -> Self {
        let kind = match err {
            DexError::ChecksumMismatch { .. } => WarningKind::ChecksumMismatch,
            _ => WarningKind::MalformedClassSkipped,
        };
        Self::new(Stage::Bytecode, kind, format!("{image}: {err}"))
    }

    #[must_use]
    pub fn from_package(err: &PackageError) -> Self {
        match err {
            PackageError::Resources(err) => Self::from_resources(Stage::Resources, err),
            PackageError::Dex(err) => Self::from_dex("bytecode", err),
            PackageError::EntryNotFound(_)
            | PackageError::ContainerCorrupt(_)
            | PackageError::ContainerTooLarge(_) => {
                Self::new(Stage::Container, WarningKind::MissingEntry, err.to_string())
            }
        }
    }
}

impl From<&AnalysisError> for Warning {
    fn from(err: &AnalysisError) -> Self {
        let (stage, kind) = match err {
            AnalysisError::ClassNotFound(_) => (Stage::CrossReference, WarningKind::ClassNotFound),
            AnalysisError::DuplicateClass { .. } => (Stage::Bytecode, WarningKind::DuplicateClass),
            AnalysisError::UnresolvedComponent { .. } => {
                (Stage::CrossReference, WarningKind::UnresolvedComponent)
            }
            AnalysisError::RuleFailure { .. } => (Stage::Rules, WarningKind::RuleFailure),
        };
        Self::new(stage, kind, err.to_string())
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {:?}: {}", self.stage, self.kind, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Complete,
    /// Some data could not be decoded or related; see the warnings.
    Degraded,
    /// The analysis stopped early; the report holds the completed stages.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub name: String,
    pub size: u64,
    pub compressed_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassSummary {
    pub name: String,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub flags: AccessFlags,
    /// The bytecode image defining the class.
    pub image: String,
    pub nb_fields: usize,
    pub nb_methods: usize,
    pub nb_reachable_methods: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReachabilitySummary {
    pub nb_entry_points: usize,
    pub nb_roots: usize,
    /// Reachable methods, defined or not.
    pub nb_methods: usize,
    pub nb_defined_methods: usize,
    pub nb_invocations: usize,
}

/// Everything the stages produced, handed over to [`assemble`].
#[derive(Debug)]
pub struct Parts<'a> {
    pub container: Option<&'a Container>,
    pub manifest: Option<ManifestFacts>,
    pub resources: Option<&'a ResourceTable>,
    pub repo: &'a Repo,
    pub entry_points: Vec<EntryPoint>,
    pub reachable: &'a ReachabilitySet,
    pub evaluation: Evaluation,
    pub warnings: Vec<Warning>,
    pub cancelled: bool,
}

/// The result of analyzing one package.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    status: Status,
    entries: Vec<EntrySummary>,
    manifest: Option<ManifestFacts>,
    resources: Option<ResourcesSummary>,
    classes: Vec<ClassSummary>,
    external_classes: Vec<String>,
    entry_points: Vec<EntryPoint>,
    reachability: ReachabilitySummary,
    findings: Vec<Finding>,
    warnings: Vec<Warning>,
}

impl AnalysisReport {
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == Status::Cancelled
    }

    #[must_use]
    pub fn entries(&self) -> &[EntrySummary] {
        &self.entries
    }

    #[must_use]
    pub const fn manifest(&self) -> Option<&ManifestFacts> {
        self.manifest.as_ref()
    }

    #[must_use]
    pub const fn resources(&self) -> Option<&ResourcesSummary> {
        self.resources.as_ref()
    }

    /// Defined classes, sorted by name.
    #[must_use]
    pub fn classes(&self) -> &[ClassSummary] {
        &self.classes
    }

    /// Referenced classes no image defines, sorted by name.
    #[must_use]
    pub fn external_classes(&self) -> &[String] {
        &self.external_classes
    }

    #[must_use]
    pub fn entry_points(&self) -> &[EntryPoint] {
        &self.entry_points
    }

    #[must_use]
    pub const fn reachability(&self) -> &ReachabilitySummary {
        &self.reachability
    }

    /// Findings, most severe first.
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(manifest) = &self.manifest {
            writeln!(f, "package: {}", manifest.package)?;
        }
        writeln!(f, "status: {:?}", self.status)?;
        writeln!(
            f,
            "{} classes, {} entry points, {} reachable methods",
            self.classes.len(),
            self.entry_points.len(),
            self.reachability.nb_methods
        )?;
        for finding in &self.findings {
            writeln!(f, "{finding}")?;
        }
        for warning in &self.warnings {
            writeln!(f, "warning: {warning}")?;
        }
        Ok(())
    }
}

fn class_summaries(repo: &Repo, reachable: &ReachabilitySet) -> Vec<ClassSummary> {
    repo.iter_classes()
        .map(|class| ClassSummary {
            name: class.name.clone(),
            superclass: class.superclass.clone(),
            interfaces: class.interfaces.clone(),
            flags: class.flags,
            image: repo.image_of(&class.name).unwrap_or_default().to_string(),
            nb_fields: class.fields.len(),
            nb_methods: class.methods.len(),
            nb_reachable_methods: class
                .methods
                .iter()
                .filter(|m| reachable.contains(&m.reference))
                .count(),
        })
        .collect()
}

/// Composes the report. Never fails: every stage already degraded its
/// problems into warnings.
#[must_use]
pub fn assemble(parts: Parts) -> AnalysisReport {
    let Parts {
        container,
        manifest,
        resources,
        repo,
        entry_points,
        reachable,
        evaluation,
        mut warnings,
        cancelled,
    } = parts;

    let Evaluation {
        mut findings,
        failures,
        cancelled: rules_cancelled,
    } = evaluation;
    warnings.extend(failures.iter().map(Warning::from));
    rules::sort_findings(&mut findings);

    let status = if cancelled || rules_cancelled {
        Status::Cancelled
    } else if warnings.is_empty() {
        Status::Complete
    } else {
        Status::Degraded
    };

    let entries = container
        .map(|container| {
            container
                .iter()
                .map(|entry| EntrySummary {
                    name: entry.name().to_string(),
                    size: entry.size(),
                    compressed_size: entry.compressed_size(),
                })
                .collect()
        })
        .unwrap_or_default();

    let reachability = ReachabilitySummary {
        nb_entry_points: entry_points.len(),
        nb_roots: entry_points.iter().map(|e| e.roots.len()).sum(),
        nb_methods: reachable.len(),
        nb_defined_methods: reachable.defined(repo).count(),
        nb_invocations: reachable.edges(),
    };

    AnalysisReport {
        status,
        entries,
        manifest,
        resources: resources.map(ResourceTable::summary),
        classes: class_summaries(repo, reachable),
        external_classes: repo.iter_missing_classes().map(str::to_string).collect(),
        entry_points,
        reachability,
        findings,
        warnings,
    }
}
