//! Application manifest model.
//!
//! [`build`] interprets a decoded `AndroidManifest.xml` tree, resolving
//! resource references through the resource table. Problems never abort
//! the walk: they are returned next to the facts and the faulty value is
//! treated as absent.

use crate::config::Config;
use crate::errors::{ResourcesError, ResourcesResult};
use crate::table::ResourceTable;
use crate::values::Value;
use crate::xml::{self, PartialXml, XmlNode, ANDROID_NS};
use serde::Serialize;
use std::collections::BTreeSet;

/// Framework attribute ids, as found in the document resource map.
pub mod attrs {
    pub const LABEL: u32 = 0x0101_0001;
    pub const NAME: u32 = 0x0101_0003;
    pub const PERMISSION: u32 = 0x0101_0006;
    pub const READ_PERMISSION: u32 = 0x0101_0007;
    pub const WRITE_PERMISSION: u32 = 0x0101_0008;
    pub const PROTECTION_LEVEL: u32 = 0x0101_0009;
    pub const ENABLED: u32 = 0x0101_000e;
    pub const DEBUGGABLE: u32 = 0x0101_000f;
    pub const EXPORTED: u32 = 0x0101_0010;
    pub const AUTHORITIES: u32 = 0x0101_0018;
    pub const GRANT_URI_PERMISSIONS: u32 = 0x0101_001b;
    pub const SCHEME: u32 = 0x0101_0027;
    pub const MIN_SDK_VERSION: u32 = 0x0101_020c;
    pub const VERSION_CODE: u32 = 0x0101_021b;
    pub const VERSION_NAME: u32 = 0x0101_021c;
    pub const TARGET_SDK_VERSION: u32 = 0x0101_0270;
    pub const MAX_SDK_VERSION: u32 = 0x0101_0271;
    pub const ALLOW_BACKUP: u32 = 0x0101_0280;
    pub const USES_CLEARTEXT_TRAFFIC: u32 = 0x0101_04ec;
    pub const NETWORK_SECURITY_CONFIG: u32 = 0x0101_0527;
}

/// Provider specific attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderAttributes {
    pub authorities: Vec<String>,
    pub read_permission: Option<String>,
    pub write_permission: Option<String>,
    pub grant_uri_permissions: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ComponentKind {
    Activity,
    Service,
    Receiver,
    Provider(ProviderAttributes),
}

impl ComponentKind {
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Service => "service",
            Self::Receiver => "receiver",
            Self::Provider(_) => "provider",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntentFilter {
    pub actions: Vec<String>,
    pub categories: Vec<String>,
    pub schemes: Vec<String>,
}

/// A declared application component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Component {
    #[serde(flatten)]
    pub kind: ComponentKind,
    /// Fully qualified class name.
    pub name: String,
    /// Effective exported flag.
    pub exported: bool,
    /// Value of the `exported` attribute, when present and resolvable.
    pub explicit_exported: Option<bool>,
    pub enabled: bool,
    pub permission: Option<String>,
    pub intent_filters: Vec<IntentFilter>,
    /// Line of the declaring element in the source manifest.
    pub line: u32,
}

impl Component {
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.intent_filters
            .iter()
            .flat_map(|filter| filter.actions.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Application {
    pub name: Option<String>,
    pub label: Option<String>,
    pub permission: Option<String>,
    pub debuggable: bool,
    pub allow_backup: Option<bool>,
    pub uses_cleartext_traffic: Option<bool>,
    pub network_security_config: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclaredPermission {
    pub name: String,
    pub protection_level: Option<String>,
}

/// The facts extracted from a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestFacts {
    pub package: String,
    pub version_code: Option<u32>,
    pub version_name: Option<String>,
    pub min_sdk: Option<u32>,
    pub target_sdk: Option<u32>,
    pub max_sdk: Option<u32>,
    /// Permissions requested with `uses-permission` elements.
    pub uses_permissions: BTreeSet<String>,
    /// Permissions defined by the application itself.
    pub permissions: Vec<DeclaredPermission>,
    pub application: Application,
    pub components: Vec<Component>,
}

impl ManifestFacts {
    #[must_use]
    pub fn uses_permission(&self, name: &str) -> bool {
        self.uses_permissions.contains(name)
    }

    pub fn exported_components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(|component| component.exported)
    }
}

fn protection_level_name(level: u32) -> String {
    let base = match level & 0xf {
        0 => "normal",
        1 => "dangerous",
        2 => "signature",
        3 => "signatureOrSystem",
        _ => return format!("{level:#x}"),
    };
    if level & !0xf == 0 {
        base.to_string()
    } else {
        format!("{base}|{:#x}", level & !0xf)
    }
}

/// Qualifies a component class name relatively to the package.
fn qualify(package: &str, name: &str) -> String {
    if name.starts_with('.') {
        format!("{package}{name}")
    } else if !name.contains('.') && !package.is_empty() {
        format!("{package}.{name}")
    } else {
        name.to_string()
    }
}

struct Builder<'a> {
    table: Option<&'a ResourceTable>,
    request: &'a Config,
    warnings: Vec<ResourcesError>,
}

impl<'a> Builder<'a> {
    /// Returns the value of an attribute with references resolved. An
    /// unresolvable reference is recorded and reads as absent.
    fn value(&mut self, node: &XmlNode, ns: Option<&str>, name: &str, id: Option<u32>) -> Option<Value> {
        let attr = node.attribute(ns, name, id)?;
        match &attr.value {
            Value::Reference(0) | Value::Null => None,
            Value::Reference(reference) => {
                let resolved = self
                    .table
                    .ok_or(ResourcesError::ResourceNotFound(*reference))
                    .and_then(|table| table.resolve_reference(&attr.value, self.request));
                match resolved {
                    Ok(value) => Some(value),
                    Err(err) => {
                        log::warn!("<{}> {}: {}", node.name, name, err);
                        self.warnings.push(ResourcesError::UnresolvedReference {
                            element: node.name.clone(),
                            attribute: name.to_string(),
                            id: *reference,
                        });
                        None
                    }
                }
            }
            other => Some(other.clone()),
        }
    }

    fn android(&mut self, node: &XmlNode, name: &str, id: u32) -> Option<Value> {
        self.value(node, Some(ANDROID_NS), name, Some(id))
    }

    fn string(&mut self, node: &XmlNode, name: &str, id: u32) -> Option<String> {
        self.android(node, name, id).map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    fn boolean(&mut self, node: &XmlNode, name: &str, id: u32) -> Option<bool> {
        self.android(node, name, id).and_then(|value| value.as_bool())
    }

    fn integer(&mut self, node: &XmlNode, name: &str, id: u32) -> Option<u32> {
        self.android(node, name, id).and_then(|value| value.as_u32())
    }

    fn required_name(&mut self, node: &XmlNode) -> Option<String> {
        let name = self.string(node, "name", attrs::NAME);
        if name.is_none() {
            self.warnings.push(ResourcesError::MissingAttribute {
                element: node.name.clone(),
                attribute: "android:name".to_string(),
            });
        }
        name
    }

    fn manifest(&mut self, root: &XmlNode) -> ManifestFacts {
        if root.name != "manifest" {
            self.warnings
                .push(ResourcesError::UnexpectedRoot(root.name.clone()));
        }

        let mut facts = ManifestFacts {
            package: self
                .value(root, None, "package", None)
                .map(|value| value.to_string())
                .unwrap_or_default(),
            version_code: self.integer(root, "versionCode", attrs::VERSION_CODE),
            version_name: self.string(root, "versionName", attrs::VERSION_NAME),
            ..ManifestFacts::default()
        };
        log::debug!("manifest::package = {}", facts.package);

        for child in &root.children {
            match child.name.as_str() {
                "uses-permission" | "uses-permission-sdk-23" => {
                    if let Some(name) = self.required_name(child) {
                        facts.uses_permissions.insert(name);
                    }
                }
                "permission" => {
                    if let Some(name) = self.required_name(child) {
                        let protection_level = self
                            .android(child, "protectionLevel", attrs::PROTECTION_LEVEL)
                            .map(|value| match value.as_u32() {
                                Some(level) => protection_level_name(level),
                                None => value.to_string(),
                            });
                        facts.permissions.push(DeclaredPermission {
                            name,
                            protection_level,
                        });
                    }
                }
                "uses-sdk" => {
                    facts.min_sdk = self.integer(child, "minSdkVersion", attrs::MIN_SDK_VERSION);
                    facts.target_sdk =
                        self.integer(child, "targetSdkVersion", attrs::TARGET_SDK_VERSION);
                    facts.max_sdk = self.integer(child, "maxSdkVersion", attrs::MAX_SDK_VERSION);
                }
                "application" => self.application(child, &mut facts),
                _ => (),
            }
        }

        facts
    }

    fn application(&mut self, node: &XmlNode, facts: &mut ManifestFacts) {
        let package = facts.package.clone();
        facts.application = Application {
            name: self
                .string(node, "name", attrs::NAME)
                .map(|name| qualify(&package, &name)),
            label: self.string(node, "label", attrs::LABEL),
            permission: self.string(node, "permission", attrs::PERMISSION),
            debuggable: self
                .boolean(node, "debuggable", attrs::DEBUGGABLE)
                .unwrap_or(false),
            allow_backup: self.boolean(node, "allowBackup", attrs::ALLOW_BACKUP),
            uses_cleartext_traffic: self.boolean(
                node,
                "usesCleartextTraffic",
                attrs::USES_CLEARTEXT_TRAFFIC,
            ),
            network_security_config: self.string(
                node,
                "networkSecurityConfig",
                attrs::NETWORK_SECURITY_CONFIG,
            ),
        };

        for child in &node.children {
            let kind = match child.name.as_str() {
                "activity" => ComponentKind::Activity,
                "service" => ComponentKind::Service,
                "receiver" => ComponentKind::Receiver,
                "provider" => ComponentKind::Provider(self.provider(child)),
                _ => continue,
            };
            if let Some(component) = self.component(child, kind, &package) {
                facts.components.push(component);
            }
        }
    }

    fn provider(&mut self, node: &XmlNode) -> ProviderAttributes {
        ProviderAttributes {
            authorities: self
                .string(node, "authorities", attrs::AUTHORITIES)
                .map(|authorities| {
                    authorities
                        .split(';')
                        .map(str::trim)
                        .filter(|authority| !authority.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            read_permission: self.string(node, "readPermission", attrs::READ_PERMISSION),
            write_permission: self.string(node, "writePermission", attrs::WRITE_PERMISSION),
            grant_uri_permissions: self
                .boolean(node, "grantUriPermissions", attrs::GRANT_URI_PERMISSIONS)
                .unwrap_or(false),
        }
    }

    fn component(&mut self, node: &XmlNode, kind: ComponentKind, package: &str) -> Option<Component> {
        let name = qualify(package, &self.required_name(node)?);

        let intent_filters = node
            .children_named("intent-filter")
            .map(|filter| self.intent_filter(filter))
            .collect::<Vec<_>>();

        // an explicit attribute wins, otherwise intent filters export
        let explicit_exported = self.boolean(node, "exported", attrs::EXPORTED);
        let exported = explicit_exported.unwrap_or(!intent_filters.is_empty());

        Some(Component {
            kind,
            name,
            exported,
            explicit_exported,
            enabled: self.boolean(node, "enabled", attrs::ENABLED).unwrap_or(true),
            permission: self.string(node, "permission", attrs::PERMISSION),
            intent_filters,
            line: node.line,
        })
    }

    fn intent_filter(&mut self, node: &XmlNode) -> IntentFilter {
        let mut filter = IntentFilter::default();
        for child in &node.children {
            match child.name.as_str() {
                "action" => filter.actions.extend(self.string(child, "name", attrs::NAME)),
                "category" => filter
                    .categories
                    .extend(self.string(child, "name", attrs::NAME)),
                "data" => filter
                    .schemes
                    .extend(self.string(child, "scheme", attrs::SCHEME)),
                _ => (),
            }
        }
        filter
    }
}

/// Builds the manifest facts from a decoded manifest tree.
///
/// References are resolved against `table` under the `request`
/// configuration. The returned errors are all recoverable.
#[must_use]
pub fn build(
    root: &XmlNode,
    table: Option<&ResourceTable>,
    request: &Config,
) -> (ManifestFacts, Vec<ResourcesError>) {
    let mut builder = Builder {
        table,
        request,
        warnings: Vec::new(),
    };
    let facts = builder.manifest(root);
    (facts, builder.warnings)
}

/// Decodes a binary manifest and builds its facts.
///
/// A document that is malformed past its root element still yields facts,
/// the decoding error being returned among the warnings. Fails only when
/// no element could be decoded at all.
pub fn parse(
    input: &[u8],
    table: Option<&ResourceTable>,
    request: &Config,
) -> ResourcesResult<(ManifestFacts, Vec<ResourcesError>)> {
    from_partial(&xml::decode(input), table, request)
}

/// Builds the manifest facts of an already decoded document. The decoding
/// error of a partial tree comes first among the warnings.
pub fn from_partial(
    partial: &PartialXml,
    table: Option<&ResourceTable>,
    request: &Config,
) -> ResourcesResult<(ManifestFacts, Vec<ResourcesError>)> {
    match (&partial.root, &partial.error) {
        (Some(root), error) => {
            let (facts, mut warnings) = build(root, table, request);
            if let Some(err) = error {
                warnings.insert(0, err.clone());
            }
            Ok((facts, warnings))
        }
        (None, Some(err)) => Err(err.clone()),
        (None, None) => Err(ResourcesError::MalformedBinaryXml {
            offset: 0,
            reason: "document has no root element".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ResourceId;
    use crate::writer::{TableBuilder, XmlWriter};
    use crate::xml::{Namespace, XmlAttribute};

    fn android(name: &str, id: u32, value: Value) -> XmlAttribute {
        XmlAttribute {
            namespace: Some(ANDROID_NS.to_string()),
            name: name.to_string(),
            resource_id: Some(id),
            raw: None,
            value,
        }
    }

    fn string(s: &str) -> Value {
        Value::String(s.to_string())
    }

    fn element(name: &str, attributes: Vec<XmlAttribute>, children: Vec<XmlNode>) -> XmlNode {
        XmlNode {
            attributes,
            children,
            ..XmlNode::new(name)
        }
    }

    fn named(tag: &str, name: &str, children: Vec<XmlNode>) -> XmlNode {
        element(tag, vec![android("name", attrs::NAME, string(name))], children)
    }

    fn main_filter() -> XmlNode {
        element(
            "intent-filter",
            vec![],
            vec![
                named("action", "android.intent.action.MAIN", vec![]),
                named("category", "android.intent.category.LAUNCHER", vec![]),
            ],
        )
    }

    fn manifest(app_attributes: Vec<XmlAttribute>, components: Vec<XmlNode>) -> XmlNode {
        let mut root = element(
            "manifest",
            vec![
                XmlAttribute {
                    namespace: None,
                    name: "package".to_string(),
                    resource_id: None,
                    raw: None,
                    value: string("com.example"),
                },
                android("versionCode", attrs::VERSION_CODE, Value::IntDec(7)),
                android("versionName", attrs::VERSION_NAME, string("1.2")),
            ],
            vec![
                named("uses-permission", "android.permission.INTERNET", vec![]),
                element(
                    "uses-sdk",
                    vec![
                        android("minSdkVersion", attrs::MIN_SDK_VERSION, Value::IntDec(21)),
                        android("targetSdkVersion", attrs::TARGET_SDK_VERSION, Value::IntDec(33)),
                    ],
                    vec![],
                ),
                element("application", app_attributes, components),
            ],
        );
        root.namespaces.push(Namespace {
            prefix: Some("android".to_string()),
            uri: ANDROID_NS.to_string(),
        });
        root
    }

    #[test]
    fn basic_facts() {
        let root = manifest(vec![], vec![named("activity", ".Main", vec![main_filter()])]);
        let (facts, warnings) = build(&root, None, &Config::default());
        assert!(warnings.is_empty());
        assert_eq!(facts.package, "com.example");
        assert_eq!(facts.version_code, Some(7));
        assert_eq!(facts.version_name.as_deref(), Some("1.2"));
        assert_eq!((facts.min_sdk, facts.target_sdk), (Some(21), Some(33)));
        assert!(facts.uses_permission("android.permission.INTERNET"));
        let main = &facts.components[0];
        assert_eq!(main.name, "com.example.Main");
        assert_eq!(main.kind, ComponentKind::Activity);
        assert!(main.enabled);
        assert_eq!(
            main.actions().collect::<Vec<_>>(),
            vec!["android.intent.action.MAIN"]
        );
    }

    #[test]
    fn exported_inference() {
        let root = manifest(
            vec![],
            vec![
                named("activity", "com.other.WithFilter", vec![main_filter()]),
                named("service", "NoFilter", vec![]),
                element(
                    "receiver",
                    vec![
                        android("name", attrs::NAME, string(".Hidden")),
                        android("exported", attrs::EXPORTED, Value::Boolean(false)),
                    ],
                    vec![main_filter()],
                ),
                element(
                    "service",
                    vec![
                        android("name", attrs::NAME, string(".Open")),
                        android("exported", attrs::EXPORTED, Value::Boolean(true)),
                    ],
                    vec![],
                ),
            ],
        );
        let (facts, _) = build(&root, None, &Config::default());
        let exported = facts
            .components
            .iter()
            .map(|c| (c.name.as_str(), c.exported))
            .collect::<Vec<_>>();
        assert_eq!(
            exported,
            vec![
                ("com.other.WithFilter", true),
                ("com.example.NoFilter", false),
                ("com.example.Hidden", false),
                ("com.example.Open", true),
            ]
        );
        assert_eq!(facts.components[2].explicit_exported, Some(false));
        assert_eq!(facts.exported_components().count(), 2);
    }

    #[test]
    fn unresolved_label_is_a_warning() {
        let root = manifest(
            vec![
                android("label", attrs::LABEL, Value::Reference(0x7f09_0001)),
                android("debuggable", attrs::DEBUGGABLE, Value::Boolean(true)),
            ],
            vec![named("activity", ".Main", vec![])],
        );
        let table = TableBuilder::new(0x7f, "com.example").build();
        let table = ResourceTable::parse(&table).unwrap();
        let (facts, warnings) = build(&root, Some(&table), &Config::default());
        assert_eq!(
            warnings,
            vec![ResourcesError::UnresolvedReference {
                element: "application".to_string(),
                attribute: "label".to_string(),
                id: 0x7f09_0001
            }]
        );
        assert_eq!(facts.application.label, None);
        assert!(facts.application.debuggable);
        assert_eq!(facts.components.len(), 1);
    }

    #[test]
    fn label_resolved_by_locale() {
        let mut builder = TableBuilder::new(0x7f, "com.example");
        builder
            .entry("string", "app_name", Config::default(), string("Demo"))
            .entry("string", "app_name", Config::from_locale("fr").unwrap(), string("Démo"));
        let table = ResourceTable::parse(&builder.build()).unwrap();
        let label = ResourceId::new(0x7f, 1, 0).0;
        let root = manifest(vec![android("label", attrs::LABEL, Value::Reference(label))], vec![]);

        let (facts, _) = build(&root, Some(&table), &Config::from_locale("fr").unwrap());
        assert_eq!(facts.application.label.as_deref(), Some("Démo"));
        let (facts, _) = build(&root, Some(&table), &Config::from_locale("de").unwrap());
        assert_eq!(facts.application.label.as_deref(), Some("Demo"));
    }

    #[test]
    fn provider_attributes() {
        let root = manifest(
            vec![],
            vec![element(
                "provider",
                vec![
                    android("name", attrs::NAME, string(".Files")),
                    android("authorities", attrs::AUTHORITIES, string("com.example.files; com.example.alt")),
                    android("grantUriPermissions", attrs::GRANT_URI_PERMISSIONS, Value::Boolean(true)),
                    android("readPermission", attrs::READ_PERMISSION, string("com.example.READ")),
                    android("exported", attrs::EXPORTED, Value::Boolean(true)),
                ],
                vec![],
            )],
        );
        let (facts, _) = build(&root, None, &Config::default());
        match &facts.components[0].kind {
            ComponentKind::Provider(provider) => {
                assert_eq!(provider.authorities, vec!["com.example.files", "com.example.alt"]);
                assert!(provider.grant_uri_permissions);
                assert_eq!(provider.read_permission.as_deref(), Some("com.example.READ"));
                assert_eq!(provider.write_permission, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nameless_component_and_wrong_root() {
        let mut root = manifest(vec![], vec![element("service", vec![], vec![])]);
        root.name = "not-a-manifest".to_string();
        let (facts, warnings) = build(&root, None, &Config::default());
        assert!(facts.components.is_empty());
        assert_eq!(warnings.len(), 2);
        assert!(matches!(warnings[0], ResourcesError::UnexpectedRoot(_)));
        assert!(matches!(warnings[1], ResourcesError::MissingAttribute { .. }));
    }

    #[test]
    fn binary_manifest() {
        let root = manifest(vec![], vec![named("activity", ".Main", vec![main_filter()])]);
        let bytes = XmlWriter::new().write(&root);
        let (facts, warnings) = parse(&bytes, None, &Config::default()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(facts.components[0].name, "com.example.Main");

        let (facts, warnings) = parse(&bytes[..bytes.len() - 4], None, &Config::default()).unwrap();
        assert!(matches!(warnings[0], ResourcesError::MalformedBinaryXml { .. }));
        assert_eq!(facts.package, "com.example");
        assert!(parse(&bytes[..4], None, &Config::default()).is_err());
    }

    #[test]
    fn protection_levels() {
        assert_eq!(protection_level_name(2), "signature");
        assert_eq!(protection_level_name(0x12), "signature|0x10");
    }
}
