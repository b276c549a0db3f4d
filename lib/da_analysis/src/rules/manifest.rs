//! Rules over the manifest facts only.

use super::{Facts, Finding, Location, Severity};
use crate::errors::AnalysisResult;
use da_resources::manifest::{Component, ComponentKind, ManifestFacts};

pub(super) const EXPORTED_WITHOUT_PERMISSION: &str = "exported-component-without-permission";
pub(super) const DEBUGGABLE: &str = "debuggable-application";
pub(super) const BACKUP_ALLOWED: &str = "backup-allowed";
pub(super) const CLEARTEXT_FLAG: &str = "cleartext-traffic-flag";
pub(super) const PROVIDER_GRANT_URI: &str = "provider-grant-uri";

fn component_location(component: &Component) -> Option<Location> {
    Some(Location::Manifest {
        element: component.kind.tag().to_string(),
        name: component.name.clone(),
    })
}

fn application_location(manifest: &ManifestFacts) -> Option<Location> {
    Some(Location::Manifest {
        element: "application".to_string(),
        name: manifest
            .application
            .name
            .clone()
            .unwrap_or_else(|| manifest.package.clone()),
    })
}

fn is_launcher(component: &Component) -> bool {
    component.intent_filters.iter().any(|filter| {
        filter.actions.iter().any(|a| a == "android.intent.action.MAIN")
            && filter
                .categories
                .iter()
                .any(|c| c == "android.intent.category.LAUNCHER")
    })
}

pub(super) fn exported_without_permission(facts: &Facts) -> AnalysisResult<Vec<Finding>> {
    let Some(manifest) = facts.manifest else {
        return Ok(Vec::new());
    };
    if manifest.application.permission.is_some() {
        return Ok(Vec::new());
    }

    let mut findings = Vec::new();
    for component in manifest.exported_components() {
        if !component.enabled || component.permission.is_some() {
            continue;
        }
        let severity = match &component.kind {
            ComponentKind::Provider(provider) => {
                if provider.read_permission.is_some() && provider.write_permission.is_some() {
                    continue;
                }
                Severity::High
            }
            ComponentKind::Activity if is_launcher(component) => Severity::Low,
            _ => Severity::Medium,
        };
        let evidence = match component.explicit_exported {
            Some(true) => "android:exported=\"true\"".to_string(),
            _ => "exported through an intent-filter".to_string(),
        };
        findings.push(Finding {
            rule: EXPORTED_WITHOUT_PERMISSION,
            severity,
            description: format!(
                "{} {} can be started by any application",
                component.kind.tag(),
                component.name
            ),
            location: component_location(component),
            evidence,
        });
    }
    Ok(findings)
}

pub(super) fn debuggable(facts: &Facts) -> AnalysisResult<Vec<Finding>> {
    let Some(manifest) = facts.manifest else {
        return Ok(Vec::new());
    };
    if !manifest.application.debuggable {
        return Ok(Vec::new());
    }
    Ok(vec![Finding {
        rule: DEBUGGABLE,
        severity: Severity::High,
        description: "application can be debugged on any device".to_string(),
        location: application_location(manifest),
        evidence: "android:debuggable=\"true\"".to_string(),
    }])
}

pub(super) fn backup_allowed(facts: &Facts) -> AnalysisResult<Vec<Finding>> {
    let Some(manifest) = facts.manifest else {
        return Ok(Vec::new());
    };
    let evidence = match manifest.application.allow_backup {
        Some(false) => return Ok(Vec::new()),
        Some(true) => "android:allowBackup=\"true\"",
        None => "android:allowBackup defaults to true",
    };
    Ok(vec![Finding {
        rule: BACKUP_ALLOWED,
        severity: Severity::Low,
        description: "application data can be extracted through backups".to_string(),
        location: application_location(manifest),
        evidence: evidence.to_string(),
    }])
}

pub(super) fn cleartext_flag(facts: &Facts) -> AnalysisResult<Vec<Finding>> {
    let Some(manifest) = facts.manifest else {
        return Ok(Vec::new());
    };
    if manifest.application.uses_cleartext_traffic != Some(true) {
        return Ok(Vec::new());
    }
    Ok(vec![Finding {
        rule: CLEARTEXT_FLAG,
        severity: Severity::Medium,
        description: "application explicitly allows cleartext network traffic".to_string(),
        location: application_location(manifest),
        evidence: "android:usesCleartextTraffic=\"true\"".to_string(),
    }])
}

pub(super) fn provider_grant_uri(facts: &Facts) -> AnalysisResult<Vec<Finding>> {
    let Some(manifest) = facts.manifest else {
        return Ok(Vec::new());
    };
    let mut findings = Vec::new();
    for component in manifest.exported_components() {
        let ComponentKind::Provider(provider) = &component.kind else {
            continue;
        };
        let protected = component.permission.is_some()
            || provider.read_permission.is_some()
            || provider.write_permission.is_some()
            || manifest.application.permission.is_some();
        if provider.grant_uri_permissions && !protected {
            findings.push(Finding {
                rule: PROVIDER_GRANT_URI,
                severity: Severity::Medium,
                description: format!(
                    "provider {} grants URI permissions without requiring any permission",
                    component.name
                ),
                location: component_location(component),
                evidence: format!(
                    "android:grantUriPermissions=\"true\" ({})",
                    provider.authorities.join(";")
                ),
            });
        }
    }
    Ok(findings)
}
