//! Vulnerability rules.
//!
//! A rule is a pure function of the decoded [facts](Facts). Rules are
//! registered by id in [`RULES`] and evaluated independently: a failing
//! rule is reported as a warning and does not affect the others.

mod code;
mod manifest;

use crate::errors::{AnalysisError, AnalysisResult};
use crate::repo::Repo;
use crate::xref::{EntryPoint, ReachabilitySet};
use da_resources::manifest::ManifestFacts;
use da_resources::table::ResourceTable;
use da_utils::CancelToken;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Reverse;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Where a finding was made.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "in", rename_all = "lowercase")]
pub enum Location {
    /// A manifest element, identified by its tag and `name` attribute.
    Manifest { element: String, name: String },
    /// A resource of the table, as `type/key`.
    Resource { name: String },
    Method { class: String, method: String },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Manifest { element, name } => write!(f, "<{element} {name}>"),
            Self::Resource { name } => write!(f, "@{name}"),
            Self::Method { class, method } => write!(f, "{class}->{method}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule: &'static str,
    pub severity: Severity,
    pub description: String,
    pub location: Option<Location>,
    /// The literal or reference that triggered the rule.
    pub evidence: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.rule, self.description)?;
        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }
        write!(f, " ({})", self.evidence)
    }
}

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct Facts<'a> {
    /// `None` when the package has no decodable manifest.
    pub manifest: Option<&'a ManifestFacts>,
    pub resources: Option<&'a ResourceTable>,
    pub repo: &'a Repo,
    pub entry_points: &'a [EntryPoint],
    pub reachable: &'a ReachabilitySet,
}

pub struct Rule {
    pub id: &'static str,
    pub check: fn(&Facts) -> AnalysisResult<Vec<Finding>>,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Rule").field("id", &self.id).finish()
    }
}

/// The rule registry.
pub const RULES: &[Rule] = &[
    Rule {
        id: manifest::EXPORTED_WITHOUT_PERMISSION,
        check: manifest::exported_without_permission,
    },
    Rule {
        id: manifest::DEBUGGABLE,
        check: manifest::debuggable,
    },
    Rule {
        id: manifest::BACKUP_ALLOWED,
        check: manifest::backup_allowed,
    },
    Rule {
        id: manifest::CLEARTEXT_FLAG,
        check: manifest::cleartext_flag,
    },
    Rule {
        id: manifest::PROVIDER_GRANT_URI,
        check: manifest::provider_grant_uri,
    },
    Rule {
        id: code::CLEARTEXT_TRAFFIC,
        check: code::cleartext_traffic,
    },
    Rule {
        id: code::HARDCODED_SECRET,
        check: code::hardcoded_secret,
    },
    Rule {
        id: code::WEAK_CRYPTO,
        check: code::weak_crypto,
    },
    Rule {
        id: code::WEBVIEW_JAVASCRIPT_BRIDGE,
        check: code::webview_javascript_bridge,
    },
];

/// The outcome of running rules.
#[derive(Debug, Default)]
pub struct Evaluation {
    /// Findings, most severe first.
    pub findings: Vec<Finding>,
    pub failures: Vec<AnalysisError>,
    /// Whether some rules were not run.
    pub cancelled: bool,
}

fn run(rule: &Rule, facts: &Facts) -> AnalysisResult<Vec<Finding>> {
    match panic::catch_unwind(AssertUnwindSafe(|| (rule.check)(facts))) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panicked".to_string());
            Err(AnalysisError::RuleFailure {
                rule: rule.id.to_string(),
                reason,
            })
        }
    }
}

/// Sorts by severity (most severe first), then rule id, then location.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        (Reverse(a.severity), a.rule, &a.location, &a.evidence, &a.description).cmp(&(
            Reverse(b.severity),
            b.rule,
            &b.location,
            &b.evidence,
            &b.description,
        ))
    });
}

/// Runs `rules` in parallel, checking `cancel` before each of them.
#[must_use]
pub fn evaluate(rules: &[Rule], facts: &Facts, cancel: &CancelToken) -> Evaluation {
    let results = rules
        .par_iter()
        .map(|rule| {
            if cancel.is_cancelled() {
                return None;
            }
            log::debug!("running rule {}", rule.id);
            Some(run(rule, facts).map_err(|err| match err {
                failure @ AnalysisError::RuleFailure { .. } => failure,
                other => AnalysisError::RuleFailure {
                    rule: rule.id.to_string(),
                    reason: other.to_string(),
                },
            }))
        })
        .collect::<Vec<_>>();

    let mut evaluation = Evaluation::default();
    for result in results {
        match result {
            None => evaluation.cancelled = true,
            Some(Ok(findings)) => evaluation.findings.extend(findings),
            Some(Err(err)) => {
                log::warn!("{}", err);
                evaluation.failures.push(err);
            }
        }
    }
    sort_findings(&mut evaluation.findings);
    evaluation
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(rule: &'static str, severity: Severity, location: Option<Location>) -> Finding {
        Finding {
            rule,
            severity,
            description: String::new(),
            location,
            evidence: String::new(),
        }
    }

    fn method(class: &str) -> Option<Location> {
        Some(Location::Method {
            class: class.to_string(),
            method: "m()V".to_string(),
        })
    }

    #[test]
    fn deterministic_order() {
        let mut findings = vec![
            finding("b-rule", Severity::Low, None),
            finding("b-rule", Severity::High, method("b.B")),
            finding("a-rule", Severity::High, method("c.C")),
            finding("b-rule", Severity::High, method("a.A")),
            finding("z-rule", Severity::Critical, None),
        ];
        sort_findings(&mut findings);
        let order = findings
            .iter()
            .map(|f| (f.rule, f.severity))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![
                ("z-rule", Severity::Critical),
                ("a-rule", Severity::High),
                ("b-rule", Severity::High),
                ("b-rule", Severity::High),
                ("b-rule", Severity::Low),
            ]
        );
        assert_eq!(findings[2].location, method("a.A"));
        assert!(Severity::Info < Severity::Low && Severity::High < Severity::Critical);
    }

    fn failing(_: &Facts) -> AnalysisResult<Vec<Finding>> {
        panic!("internal assertion")
    }

    fn erroring(_: &Facts) -> AnalysisResult<Vec<Finding>> {
        Err(AnalysisError::ClassNotFound("x.Y".to_string()))
    }

    fn constant(_: &Facts) -> AnalysisResult<Vec<Finding>> {
        Ok(vec![finding("constant", Severity::Info, None)])
    }

    #[test]
    fn failures_are_isolated() {
        let manifest = ManifestFacts::default();
        let repo = Repo::new();
        let reachable = ReachabilitySet::default();
        let facts = Facts {
            manifest: Some(&manifest),
            resources: None,
            repo: &repo,
            entry_points: &[],
            reachable: &reachable,
        };
        let rules = [
            Rule { id: "failing", check: failing },
            Rule { id: "constant", check: constant },
            Rule { id: "erroring", check: erroring },
        ];
        let evaluation = evaluate(&rules, &facts, &CancelToken::new());
        assert_eq!(evaluation.findings.len(), 1);
        assert_eq!(evaluation.failures.len(), 2);
        assert!(evaluation.failures.contains(&AnalysisError::RuleFailure {
            rule: "failing".to_string(),
            reason: "internal assertion".to_string(),
        }));
        assert!(!evaluation.cancelled);

        let cancel = CancelToken::new();
        cancel.cancel();
        let evaluation = evaluate(&rules, &facts, &cancel);
        assert!(evaluation.cancelled);
        assert!(evaluation.findings.is_empty());
    }

    #[test]
    fn no_manifest_no_findings() {
        let repo = Repo::new();
        let reachable = ReachabilitySet::default();
        let facts = Facts {
            manifest: None,
            resources: None,
            repo: &repo,
            entry_points: &[],
            reachable: &reachable,
        };
        let evaluation = evaluate(RULES, &facts, &CancelToken::new());
        assert!(evaluation.findings.is_empty());
        assert!(evaluation.failures.is_empty());
    }

    #[test]
    fn registry_ids_are_unique() {
        let mut ids = RULES.iter().map(|r| r.id).collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), RULES.len());
    }
}
