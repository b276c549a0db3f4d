//! Rules over the reachable bytecode.

use super::{Facts, Finding, Location, Severity};
use crate::errors::AnalysisResult;
use da_dex::{ClassDef, MethodDef, MethodRef};
use da_resources::values::Value;
use da_utils::entropy;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

pub(super) const CLEARTEXT_TRAFFIC: &str = "cleartext-traffic";
pub(super) const HARDCODED_SECRET: &str = "hardcoded-secret";
pub(super) const WEAK_CRYPTO: &str = "weak-crypto";
pub(super) const WEBVIEW_JAVASCRIPT_BRIDGE: &str = "webview-javascript-bridge";

const INTERNET: &str = "android.permission.INTERNET";

/// Well-known XML namespaces and schema locations, never fetched.
const NAMESPACE_PREFIXES: &[&str] = &[
    "http://schemas.android.com/",
    "http://www.w3.org/",
    "http://xml.org/",
    "http://ns.adobe.com/",
];

const PIN_PREFIXES: &[&str] = &["sha256/", "sha1/"];

/// Minimum entropy, in bits per character, of a secret-looking literal.
const SECRET_ENTROPY: f64 = 4.0;

/// Classes whose mere use denotes a weak primitive.
const WEAK_TYPES: &[&str] = &[
    "javax.crypto.NullCipher",
    "javax.crypto.spec.DESKeySpec",
    "javax.crypto.spec.DESedeKeySpec",
];

/// Factories taking an algorithm name.
const ALGORITHM_FACTORIES: &[&str] = &[
    "javax.crypto.Cipher",
    "javax.crypto.KeyGenerator",
    "javax.crypto.SecretKeyFactory",
    "javax.crypto.Mac",
    "java.security.MessageDigest",
];

const WEBVIEW: &str = "android.webkit.WebView";

/// First platform version where only annotated methods are exposed to
/// JavaScript.
const JAVASCRIPT_INTERFACE_SDK: u32 = 17;

lazy_static! {
    static ref SECRET_RE: Regex = Regex::new(r"^[A-Za-z0-9+/=_\-]{20,256}$")
        .expect("failed to compile secret literal regex");
    static ref SECRET_KEY_RE: Regex = Regex::new(r"(?i)(api_?key|secret|token|passw(or)?d|credential)")
        .expect("failed to compile secret key regex");
    static ref WEAK_ALGORITHM_RE: Regex = Regex::new(
        r"(?i)^(DES|DESede|TripleDES|RC2|RC4|ARCFOUR|Blowfish|MD2|MD4|MD5|SHA-?1|HmacMD5|HmacSHA1)(/.*)?$|^[^/]+/ECB(/.*)?$"
    )
    .expect("failed to compile weak algorithm regex");
}

fn method_location(class: &ClassDef, method: &MethodDef) -> Option<Location> {
    Some(Location::Method {
        class: class.name.clone(),
        method: format!("{}{}", method.reference.name, method.reference.descriptor),
    })
}

/// Invocation targets of `method`, each one once, in code order.
fn distinct_invocations(method: &MethodDef) -> impl Iterator<Item = &MethodRef> {
    let mut seen = BTreeSet::new();
    method.invocations.iter().filter(move |target| seen.insert(*target))
}

fn looks_like_secret(s: &str) -> bool {
    SECRET_RE.is_match(s)
        && s.chars().any(|c| c.is_ascii_digit())
        && s.chars().any(|c| c.is_ascii_alphabetic())
        && entropy::shannon(s) >= SECRET_ENTROPY
}

pub(super) fn cleartext_traffic(facts: &Facts) -> AnalysisResult<Vec<Finding>> {
    if !facts.manifest.is_some_and(|m| m.uses_permission(INTERNET)) {
        return Ok(Vec::new());
    }

    let methods = facts.reachable.defined(facts.repo).collect::<Vec<_>>();
    let pinned = methods.iter().any(|(_, method)| {
        method
            .strings
            .iter()
            .any(|s| PIN_PREFIXES.iter().any(|p| s.starts_with(p)))
    });
    if pinned {
        log::debug!("certificate pins found, skipping {}", CLEARTEXT_TRAFFIC);
        return Ok(Vec::new());
    }

    let mut findings = Vec::new();
    for (class, method) in methods {
        for url in &method.strings {
            if !url.starts_with("http://") || NAMESPACE_PREFIXES.iter().any(|p| url.starts_with(p)) {
                continue;
            }
            findings.push(Finding {
                rule: CLEARTEXT_TRAFFIC,
                severity: Severity::Medium,
                description: "cleartext HTTP URL used by reachable code, without certificate pinning"
                    .to_string(),
                location: method_location(class, method),
                evidence: url.clone(),
            });
        }
    }
    Ok(findings)
}

pub(super) fn hardcoded_secret(facts: &Facts) -> AnalysisResult<Vec<Finding>> {
    let mut findings = Vec::new();
    for (class, method) in facts.reachable.defined(facts.repo) {
        for literal in method.strings.iter().filter(|s| looks_like_secret(s)) {
            findings.push(Finding {
                rule: HARDCODED_SECRET,
                severity: Severity::Medium,
                description: "high entropy string literal in reachable code".to_string(),
                location: method_location(class, method),
                evidence: literal.clone(),
            });
        }
    }

    // string resources named like credentials
    if let Some(table) = facts.resources {
        for (_, entries) in table.iter() {
            for entry in entries.iter().filter(|e| e.config.is_default()) {
                let Some(Value::String(value)) = entry.simple_value() else {
                    continue;
                };
                if entry.type_name == "string"
                    && SECRET_KEY_RE.is_match(&entry.key)
                    && looks_like_secret(value)
                {
                    findings.push(Finding {
                        rule: HARDCODED_SECRET,
                        severity: Severity::Medium,
                        description: "credential-like string resource".to_string(),
                        location: Some(Location::Resource {
                            name: format!("{}/{}", entry.type_name, entry.key),
                        }),
                        evidence: value.clone(),
                    });
                }
            }
        }
    }
    Ok(findings)
}

pub(super) fn weak_crypto(facts: &Facts) -> AnalysisResult<Vec<Finding>> {
    let mut findings = Vec::new();
    for (class, method) in facts.reachable.defined(facts.repo) {
        for target in distinct_invocations(method) {
            if WEAK_TYPES.contains(&target.owner.as_str()) {
                findings.push(Finding {
                    rule: WEAK_CRYPTO,
                    severity: Severity::Medium,
                    description: format!("weak cryptographic primitive {}", target.owner),
                    location: method_location(class, method),
                    evidence: target.to_string(),
                });
            }
        }

        let uses_factory = method.invocations.iter().any(|target| {
            target.name == "getInstance" && ALGORITHM_FACTORIES.contains(&target.owner.as_str())
        });
        if !uses_factory {
            continue;
        }
        for algorithm in method.strings.iter().filter(|s| WEAK_ALGORITHM_RE.is_match(s)) {
            findings.push(Finding {
                rule: WEAK_CRYPTO,
                severity: Severity::Medium,
                description: format!("weak cryptographic algorithm {algorithm}"),
                location: method_location(class, method),
                evidence: algorithm.clone(),
            });
        }
    }
    Ok(findings)
}

pub(super) fn webview_javascript_bridge(facts: &Facts) -> AnalysisResult<Vec<Finding>> {
    let severity = match facts.manifest.and_then(|m| m.min_sdk) {
        Some(sdk) if sdk < JAVASCRIPT_INTERFACE_SDK => Severity::Critical,
        _ => Severity::High,
    };

    let mut findings = Vec::new();
    for (class, method) in facts.reachable.defined(facts.repo) {
        for target in distinct_invocations(method) {
            if target.name == "addJavascriptInterface"
                && facts.repo.is_subclass_of(&target.owner, WEBVIEW)
            {
                findings.push(Finding {
                    rule: WEBVIEW_JAVASCRIPT_BRIDGE,
                    severity,
                    description: "exported component exposes a JavaScript bridge in a WebView"
                        .to_string(),
                    location: method_location(class, method),
                    evidence: target.to_string(),
                });
            }
        }
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::Repo;
    use crate::xref::{entry_points, ReachabilitySet};
    use da_dex::builder::{ClassBuilder, DexBuilder, Insn, InvokeKind, MethodBuilder};
    use da_dex::{DexImage, MethodRef};
    use da_resources::config::Config;
    use da_resources::manifest::{Component, ComponentKind, ManifestFacts};
    use da_resources::table::ResourceTable;
    use da_resources::writer::TableBuilder;

    fn string(s: &str) -> Insn {
        Insn::ConstString(s.to_string())
    }

    fn invoke(owner: &str, name: &str, descriptor: &str) -> Insn {
        Insn::Invoke(InvokeKind::Virtual, MethodRef::new(owner, name, descriptor))
    }

    /// Runs `rule` over an exported activity `a.Main` whose `onCreate`
    /// executes `code`.
    fn run(
        code: Vec<Insn>,
        manifest: ManifestFacts,
        resources: Option<&ResourceTable>,
        rule: fn(&Facts) -> AnalysisResult<Vec<Finding>>,
    ) -> Vec<Finding> {
        let mut code = code;
        code.push(Insn::ReturnVoid);
        let mut builder = DexBuilder::new();
        builder
            .class(
                ClassBuilder::new("a.Main")
                    .superclass("android.app.Activity")
                    .method(MethodBuilder::new("onCreate", "(Landroid/os/Bundle;)V").code(code)),
            )
            .class(ClassBuilder::new("a.Web").superclass(WEBVIEW))
            .class(
                ClassBuilder::new("a.Unreachable").method(
                    MethodBuilder::new("run", "()V").code(vec![
                        string("http://unreachable.example.com"),
                        Insn::ReturnVoid,
                    ]),
                ),
            );
        let mut repo = Repo::new();
        repo.register_dex("classes.dex", DexImage::parse(&builder.build().unwrap()).unwrap());

        let manifest = ManifestFacts {
            components: vec![Component {
                kind: ComponentKind::Activity,
                name: "a.Main".to_string(),
                exported: true,
                explicit_exported: None,
                enabled: true,
                permission: None,
                intent_filters: Vec::new(),
                line: 0,
            }],
            ..manifest
        };
        let (entries, _) = entry_points(&manifest, &repo);
        let reachable = ReachabilitySet::compute(&repo, &entries);
        let facts = Facts {
            manifest: Some(&manifest),
            resources,
            repo: &repo,
            entry_points: &entries,
            reachable: &reachable,
        };
        rule(&facts).unwrap()
    }

    fn internet() -> ManifestFacts {
        ManifestFacts {
            uses_permissions: [INTERNET.to_string()].into_iter().collect(),
            ..ManifestFacts::default()
        }
    }

    #[test]
    fn cleartext_urls() {
        let code = vec![
            string("http://"),
            string("http://schemas.android.com/apk/res/android"),
            string("https://secure.example.com"),
        ];
        let findings = run(code.clone(), internet(), None, cleartext_traffic);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].evidence, "http://");
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(
            findings[0].location.as_ref().unwrap().to_string(),
            "a.Main->onCreate(Landroid/os/Bundle;)V"
        );

        // no network permission
        assert!(run(code.clone(), ManifestFacts::default(), None, cleartext_traffic).is_empty());

        // pinned certificates
        let mut pinned = code;
        pinned.push(string("sha256/AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="));
        assert!(run(pinned, internet(), None, cleartext_traffic).is_empty());
    }

    #[test]
    fn secrets() {
        let code = vec![
            string("AKIAIOSFODNN7EXAMPLEwJalrXUtnFEMI"),
            string("hello world, this is not a secret"),
            string("aaaaaaaaaaaaaaaaaaaaaaaaa1"),
        ];
        let findings = run(code, ManifestFacts::default(), None, hardcoded_secret);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].evidence, "AKIAIOSFODNN7EXAMPLEwJalrXUtnFEMI");

        let table = TableBuilder::new(0x7f, "a")
            .entry(
                "string",
                "google_api_key",
                Config::default(),
                Value::String("AIzaSyD3x8Qk2LmN7pR9tV4wB6cE1fH5jK0oZ".to_string()),
            )
            .entry(
                "string",
                "app_name",
                Config::default(),
                Value::String("AIzaSyD3x8Qk2LmN7pR9tV4wB6cE1fH5jK0oZ".to_string()),
            )
            .build();
        let table = ResourceTable::parse(&table).unwrap();
        let findings = run(Vec::new(), ManifestFacts::default(), Some(&table), hardcoded_secret);
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].location,
            Some(Location::Resource {
                name: "string/google_api_key".to_string()
            })
        );
    }

    #[test]
    fn weak_primitives() {
        let code = vec![
            string("DES/ECB/PKCS5Padding"),
            string("AES/GCM/NoPadding"),
            invoke(
                "javax.crypto.Cipher",
                "getInstance",
                "(Ljava/lang/String;)Ljavax/crypto/Cipher;",
            ),
            invoke("javax.crypto.spec.DESKeySpec", "<init>", "([B)V"),
            invoke("javax.crypto.spec.DESKeySpec", "<init>", "([B)V"),
        ];
        let findings = run(code, ManifestFacts::default(), None, weak_crypto);
        let evidence = findings.iter().map(|f| f.evidence.as_str()).collect::<Vec<_>>();
        assert_eq!(
            evidence,
            vec![
                "javax.crypto.spec.DESKeySpec-><init>([B)V",
                "DES/ECB/PKCS5Padding"
            ]
        );

        assert!(WEAK_ALGORITHM_RE.is_match("MD5"));
        assert!(WEAK_ALGORITHM_RE.is_match("AES/ECB/NoPadding"));
        assert!(!WEAK_ALGORITHM_RE.is_match("SHA-256"));
        assert!(!WEAK_ALGORITHM_RE.is_match("AES/CBC/PKCS5Padding"));
    }

    #[test]
    fn javascript_bridge() {
        let code = vec![invoke(
            "a.Web",
            "addJavascriptInterface",
            "(Ljava/lang/Object;Ljava/lang/String;)V",
        )];
        let twice = [code.clone(), code.clone()].concat();
        let findings = run(twice, ManifestFacts::default(), None, webview_javascript_bridge);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);

        let old = ManifestFacts {
            min_sdk: Some(16),
            ..ManifestFacts::default()
        };
        let findings = run(code, old, None, webview_javascript_bridge);
        assert_eq!(findings[0].severity, Severity::Critical);

        let other = vec![invoke("a.Main", "addJavascriptInterface", "()V")];
        assert!(run(other, ManifestFacts::default(), None, webview_javascript_bridge).is_empty());
    }
}
