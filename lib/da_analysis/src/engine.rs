//! The whole analysis of one package, from archive bytes to report.

use crate::errors::EngineError;
use crate::report::{self, AnalysisReport, Parts, Stage, Warning, WarningKind};
use crate::repo::Repo;
use crate::rules::{self, Evaluation, Facts};
use crate::xref::{self, ReachabilitySet};
use da_package::errors::PackageError;
use da_package::Limits;
use da_resources::config::Config;
use da_resources::errors::ResourcesResult;
use da_utils::CancelToken;

/// Analysis settings.
#[derive(Debug, Clone, Default)]
pub struct Options {
    limits: Limits,
    config: Config,
    cancel: CancelToken,
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limits(self, limits: Limits) -> Self {
        Self { limits, ..self }
    }

    /// Configuration used to resolve resource references of the manifest.
    #[must_use]
    pub fn with_config(self, config: Config) -> Self {
        Self { config, ..self }
    }

    /// Same as [`Options::with_config`] from a locale tag such as `fr-rFR`.
    pub fn with_locale(self, tag: &str) -> ResourcesResult<Self> {
        Ok(self.with_config(Config::from_locale(tag)?))
    }

    #[must_use]
    pub fn with_cancel(self, cancel: CancelToken) -> Self {
        Self { cancel, ..self }
    }

    #[must_use]
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn cancel(&self) -> &CancelToken {
        &self.cancel
    }
}

/// Analyzes an application package held in memory.
///
/// Only an unreadable container or bytecode image is an error. Every
/// other problem becomes a warning of the report. On cancellation the
/// stages completed so far are reported.
pub fn analyze(bytes: &[u8], options: &Options) -> Result<AnalysisReport, EngineError> {
    log::debug!(">> analyze ({} bytes)", bytes.len());
    let cancel = &options.cancel;

    let mut package = da_package::Options::default()
        .with_limits(options.limits)
        .with_cancel(cancel.clone())
        .open(bytes)?;

    let mut warnings = package
        .errors()
        .iter()
        .map(Warning::from_package)
        .collect::<Vec<_>>();
    match package.resources() {
        Some(table) => warnings.extend(
            table
                .warnings()
                .iter()
                .map(|err| Warning::from_resources(Stage::Resources, err)),
        ),
        None if !package
            .errors()
            .iter()
            .any(|err| matches!(err, PackageError::Resources(_))) =>
        {
            warnings.push(Warning::new(
                Stage::Container,
                WarningKind::MissingEntry,
                "no resource table in package",
            ));
        }
        None => (),
    }

    let manifest = match package.manifest_facts(&options.config) {
        Some(Ok((facts, errors))) => {
            warnings.extend(
                errors
                    .iter()
                    .map(|err| Warning::from_resources(Stage::Manifest, err)),
            );
            Some(facts)
        }
        Some(Err(err)) => {
            warnings.push(Warning::from_resources(Stage::Manifest, &err));
            None
        }
        None => {
            warnings.push(Warning::new(
                Stage::Container,
                WarningKind::MissingEntry,
                "no manifest in package",
            ));
            None
        }
    };

    let mut repo = Repo::new();
    let dexs = package.take_dexs();
    if dexs.is_empty() && !package.is_cancelled() {
        warnings.push(Warning::new(
            Stage::Container,
            WarningKind::MissingEntry,
            "no bytecode image in package",
        ));
    }
    for (name, image) in dexs {
        warnings.extend(image.warnings().iter().map(|err| Warning::from_dex(&name, err)));
        warnings.extend(repo.register_dex(&name, image).iter().map(Warning::from));
    }
    log::debug!(
        "{} classes and {} methods loaded",
        repo.nb_classes(),
        repo.nb_methods()
    );

    let cancelled = package.is_cancelled() || cancel.is_cancelled();

    // entry points come from the manifest components only
    let (entry_points, reachable) = match &manifest {
        Some(facts) if !cancelled => {
            let (entry_points, errors) = xref::entry_points(facts, &repo);
            warnings.extend(errors.iter().map(Warning::from));
            let reachable = ReachabilitySet::compute(&repo, &entry_points);
            (entry_points, reachable)
        }
        _ => (Vec::new(), ReachabilitySet::default()),
    };

    let evaluation = if cancelled {
        Evaluation {
            cancelled: true,
            ..Evaluation::default()
        }
    } else {
        let facts = Facts {
            manifest: manifest.as_ref(),
            resources: package.resources(),
            repo: &repo,
            entry_points: &entry_points,
            reachable: &reachable,
        };
        rules::evaluate(rules::RULES, &facts, cancel)
    };

    let report = report::assemble(Parts {
        container: Some(package.container()),
        manifest,
        resources: package.resources(),
        repo: &repo,
        entry_points,
        reachable: &reachable,
        evaluation,
        warnings,
        cancelled,
    });
    log::debug!("<< analyze ({:?})", report.status());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Status;
    use da_dex::builder::{ClassBuilder, DexBuilder, Insn, MethodBuilder};
    use da_resources::manifest::attrs;
    use da_resources::values::Value;
    use da_resources::writer::{TableBuilder, XmlWriter};
    use da_resources::xml::{Namespace, XmlAttribute, XmlNode, ANDROID_NS};
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn android(name: &str, id: u32, value: Value) -> XmlAttribute {
        XmlAttribute {
            namespace: Some(ANDROID_NS.to_string()),
            name: name.to_string(),
            resource_id: Some(id),
            raw: None,
            value,
        }
    }

    fn manifest(exported: bool) -> Vec<u8> {
        let activity = XmlNode {
            attributes: vec![
                android("name", attrs::NAME, Value::String(".Main".to_string())),
                android("exported", attrs::EXPORTED, Value::Boolean(exported)),
            ],
            ..XmlNode::new("activity")
        };
        let application = XmlNode {
            attributes: vec![android("debuggable", attrs::DEBUGGABLE, Value::Boolean(true))],
            children: vec![activity],
            ..XmlNode::new("application")
        };
        let mut root = XmlNode {
            attributes: vec![XmlAttribute {
                namespace: None,
                name: "package".to_string(),
                resource_id: None,
                raw: None,
                value: Value::String("com.example".to_string()),
            }],
            children: vec![application],
            ..XmlNode::new("manifest")
        };
        root.namespaces.push(Namespace {
            prefix: Some("android".to_string()),
            uri: ANDROID_NS.to_string(),
        });
        XmlWriter::new().write(&root)
    }

    fn dex(classes: &[&str]) -> Vec<u8> {
        let mut builder = DexBuilder::new();
        for class in classes {
            builder.class(
                ClassBuilder::new(class)
                    .superclass("android.app.Activity")
                    .method(MethodBuilder::new("onCreate", "(Landroid/os/Bundle;)V").code(vec![Insn::ReturnVoid])),
            );
        }
        builder.build().unwrap()
    }

    fn apk(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn table() -> Vec<u8> {
        TableBuilder::new(0x7f, "com.example")
            .entry("string", "app_name", Config::default(), Value::String("Demo".to_string()))
            .build()
    }

    #[test]
    fn full_pipeline() {
        let bytes = apk(&[
            ("AndroidManifest.xml", manifest(true)),
            ("resources.arsc", table()),
            ("classes.dex", dex(&["com.example.Main"])),
        ]);
        let report = analyze(&bytes, &Options::new()).unwrap();
        assert_eq!(report.status(), Status::Complete);
        assert_eq!(report.manifest().unwrap().package, "com.example");
        assert_eq!(report.entries().len(), 3);
        assert_eq!(report.entry_points().len(), 1);
        assert_eq!(report.entry_points()[0].class, "com.example.Main");
        assert_eq!(report.reachability().nb_defined_methods, 1);
        assert_eq!(report.resources().unwrap().total_entries, 1);
        let rules = report.findings().iter().map(|f| f.rule).collect::<Vec<_>>();
        assert_eq!(
            rules,
            vec![
                "debuggable-application",
                "exported-component-without-permission",
                "backup-allowed"
            ]
        );
    }

    #[test]
    fn degraded_report() {
        let bytes = apk(&[
            ("AndroidManifest.xml", manifest(true)),
            ("classes.dex", dex(&["com.example.Other"])),
            ("classes2.dex", dex(&["com.example.Other"])),
        ]);
        let report = analyze(&bytes, &Options::new()).unwrap();
        assert_eq!(report.status(), Status::Degraded);
        let kinds = report.warnings().iter().map(|w| w.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                WarningKind::MissingEntry,
                WarningKind::DuplicateClass,
                WarningKind::UnresolvedComponent
            ]
        );
        assert!(report.entry_points().is_empty());
    }

    #[test]
    fn bytecode_only_package() {
        let bytes = apk(&[("classes.dex", dex(&["com.example.Main"]))]);
        let report = analyze(&bytes, &Options::new()).unwrap();
        assert_eq!(report.status(), Status::Degraded);
        assert!(report.manifest().is_none());
        assert!(report.entry_points().is_empty());
        assert!(report.findings().is_empty());
        assert_eq!(report.classes().len(), 1);
        let kinds = report.warnings().iter().map(|w| w.kind).collect::<Vec<_>>();
        assert_eq!(kinds, vec![WarningKind::MissingEntry, WarningKind::MissingEntry]);
    }

    #[test]
    fn fatal_errors() {
        assert!(matches!(
            analyze(b"not an archive", &Options::new()),
            Err(EngineError::ContainerCorrupt(_))
        ));

        let bytes = apk(&[
            ("AndroidManifest.xml", manifest(true)),
            ("classes.dex", b"dex\n035\0".to_vec()),
        ]);
        assert!(matches!(
            analyze(&bytes, &Options::new()),
            Err(EngineError::MalformedBytecodeImage(_))
        ));

        let bytes = apk(&[("classes.dex", dex(&["a.A"]))]);
        let options = Options::new().with_limits(Limits::default().with_max_entry_size(16));
        assert!(matches!(
            analyze(&bytes, &options),
            Err(EngineError::ContainerTooLarge(_))
        ));
    }

    #[test]
    fn cancelled() {
        let bytes = apk(&[
            ("AndroidManifest.xml", manifest(true)),
            ("resources.arsc", table()),
            ("classes.dex", dex(&["com.example.Main"])),
        ]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = analyze(&bytes, &Options::new().with_cancel(cancel)).unwrap();
        assert_eq!(report.status(), Status::Cancelled);
        assert!(report.findings().is_empty());
    }
}
