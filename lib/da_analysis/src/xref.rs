//! Links manifest components to their classes and computes the methods
//! reachable from the exported ones.

use crate::errors::AnalysisError;
use crate::repo::Repo;
use da_dex::MethodRef;
use da_resources::manifest::{ComponentKind, ManifestFacts};
use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};

const ACTIVITY_CALLBACKS: &[&str] = &[
    "onCreate",
    "onStart",
    "onRestart",
    "onResume",
    "onPause",
    "onStop",
    "onDestroy",
    "onNewIntent",
    "onActivityResult",
    "onSaveInstanceState",
    "onRestoreInstanceState",
];

const SERVICE_CALLBACKS: &[&str] = &[
    "onCreate",
    "onStartCommand",
    "onStart",
    "onBind",
    "onRebind",
    "onUnbind",
    "onHandleIntent",
    "onDestroy",
];

const RECEIVER_CALLBACKS: &[&str] = &["onReceive"];

const PROVIDER_CALLBACKS: &[&str] = &[
    "onCreate", "query", "insert", "update", "delete", "getType", "openFile", "call",
];

fn callbacks(kind: &ComponentKind) -> &'static [&'static str] {
    match kind {
        ComponentKind::Activity => ACTIVITY_CALLBACKS,
        ComponentKind::Service => SERVICE_CALLBACKS,
        ComponentKind::Receiver => RECEIVER_CALLBACKS,
        ComponentKind::Provider(_) => PROVIDER_CALLBACKS,
    }
}

/// An exported component resolved to its class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryPoint {
    pub kind: &'static str,
    pub class: String,
    /// Methods the platform may call on the component.
    pub roots: Vec<MethodRef>,
}

/// Root methods of a component class: constructors and lifecycle callbacks
/// found along its defined superclass chain, or all its declared methods
/// when there are none.
fn roots(repo: &Repo, class: &str, kind: &ComponentKind) -> Vec<MethodRef> {
    let names = callbacks(kind);
    let mut roots = BTreeSet::new();
    for ancestor in repo.ancestors(class) {
        for method in &ancestor.methods {
            if method.name() == "<init>" || names.contains(&method.name()) {
                // overridden callbacks were found lower in the chain
                let overridden = roots.iter().any(|r: &MethodRef| {
                    r.name == method.reference.name && r.descriptor == method.reference.descriptor
                });
                if !overridden {
                    roots.insert(method.reference.clone());
                }
            }
        }
    }
    if roots.is_empty() {
        if let Ok(class) = repo.get_class(class) {
            roots.extend(class.methods.iter().map(|m| m.reference.clone()));
        }
    }
    roots.into_iter().collect()
}

/// Resolves every component to its class. Unresolved components become
/// warnings; exported resolved ones become entry points, in manifest order.
pub fn entry_points(facts: &ManifestFacts, repo: &Repo) -> (Vec<EntryPoint>, Vec<AnalysisError>) {
    let mut entries = Vec::new();
    let mut warnings = Vec::new();

    for component in &facts.components {
        if !repo.contains_class(&component.name) {
            log::warn!(
                "{} {} has no class definition",
                component.kind.tag(),
                component.name
            );
            warnings.push(AnalysisError::UnresolvedComponent {
                kind: component.kind.tag().to_string(),
                name: component.name.clone(),
            });
            continue;
        }
        if !component.exported {
            continue;
        }
        if entries.iter().any(|e: &EntryPoint| e.class == component.name) {
            continue;
        }
        entries.push(EntryPoint {
            kind: component.kind.tag(),
            class: component.name.clone(),
            roots: roots(repo, &component.name, &component.kind),
        });
    }

    (entries, warnings)
}

/// The methods transitively invocable from the entry points.
///
/// Invoked methods that no image defines are members too, but their own
/// invocations are unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReachabilitySet {
    methods: BTreeSet<MethodRef>,
    edges: usize,
}

impl ReachabilitySet {
    /// Breadth-first traversal of the invocation graph. Every method is
    /// expanded once, so the work is bounded by the size of the images.
    #[must_use]
    pub fn compute(repo: &Repo, entry_points: &[EntryPoint]) -> Self {
        let mut methods = BTreeSet::new();
        let mut queue = VecDeque::new();
        let mut edges = 0;

        for root in entry_points.iter().flat_map(|e| e.roots.iter()) {
            if methods.insert(root.clone()) {
                queue.push_back(root.clone());
            }
        }

        while let Some(reference) = queue.pop_front() {
            let Some(method) = repo.resolve_method(&reference) else {
                continue;
            };
            // the dispatched definition is reachable as well
            if methods.insert(method.reference.clone()) {
                queue.push_back(method.reference.clone());
            }
            for target in &method.invocations {
                edges += 1;
                if methods.insert(target.clone()) {
                    queue.push_back(target.clone());
                }
            }
        }

        log::debug!(
            "{} reachable methods through {} invocations",
            methods.len(),
            edges
        );
        Self { methods, edges }
    }

    #[must_use]
    pub fn contains(&self, reference: &MethodRef) -> bool {
        self.methods.contains(reference)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodRef> {
        self.methods.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Number of invocations followed during the traversal.
    #[must_use]
    pub const fn edges(&self) -> usize {
        self.edges
    }

    /// Reachable methods that have a definition in the repository, with
    /// their class.
    pub fn defined<'a>(
        &'a self,
        repo: &'a Repo,
    ) -> impl Iterator<Item = (&'a da_dex::ClassDef, &'a da_dex::MethodDef)> {
        self.methods.iter().filter_map(move |reference| {
            let class = repo.get_class(&reference.owner).ok()?;
            let method = class.method(&reference.name, &reference.descriptor)?;
            Some((class, method))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use da_dex::builder::{ClassBuilder, DexBuilder, Insn, InvokeKind, MethodBuilder};
    use da_dex::DexImage;
    use da_resources::manifest::{Component, IntentFilter};

    fn component(kind: ComponentKind, name: &str, exported: bool) -> Component {
        Component {
            kind,
            name: name.to_string(),
            exported,
            explicit_exported: None,
            enabled: true,
            permission: None,
            intent_filters: vec![IntentFilter::default()],
            line: 0,
        }
    }

    fn call(owner: &str, name: &str) -> Insn {
        Insn::Invoke(InvokeKind::Virtual, MethodRef::new(owner, name, "()V"))
    }

    fn repo() -> Repo {
        let mut builder = DexBuilder::new();
        builder
            .class(
                ClassBuilder::new("a.Main")
                    .superclass("android.app.Activity")
                    .method(MethodBuilder::new("<init>", "()V").code(vec![Insn::ReturnVoid]))
                    .method(
                        MethodBuilder::new("onCreate", "(Landroid/os/Bundle;)V")
                            .code(vec![call("a.Main", "ping"), Insn::ReturnVoid]),
                    )
                    .method(MethodBuilder::new("ping", "()V").code(vec![
                        call("a.Main", "pong"),
                        call("android.util.Log", "flush"),
                        Insn::ReturnVoid,
                    ]))
                    .method(
                        MethodBuilder::new("pong", "()V")
                            .code(vec![call("a.Main", "ping"), Insn::ReturnVoid]),
                    )
                    .method(
                        MethodBuilder::new("unused", "()V")
                            .code(vec![call("a.Helper", "secret"), Insn::ReturnVoid]),
                    ),
            )
            .class(ClassBuilder::new("a.Child").superclass("a.Main"))
            .class(
                ClassBuilder::new("a.Helper")
                    .method(MethodBuilder::new("secret", "()V").code(vec![Insn::ReturnVoid])),
            );
        let mut repo = Repo::new();
        repo.register_dex("classes.dex", DexImage::parse(&builder.build().unwrap()).unwrap());
        repo
    }

    #[test]
    fn components_resolution() {
        let repo = repo();
        let facts = ManifestFacts {
            components: vec![
                component(ComponentKind::Activity, "a.Main", true),
                component(ComponentKind::Service, "a.Helper", false),
                component(ComponentKind::Receiver, "a.Missing", true),
            ],
            ..ManifestFacts::default()
        };
        let (entries, warnings) = entry_points(&facts, &repo);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].class, "a.Main");
        assert_eq!(entries[0].kind, "activity");
        let names = entries[0].roots.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["<init>", "onCreate"]);
        assert_eq!(
            warnings,
            vec![AnalysisError::UnresolvedComponent {
                kind: "receiver".to_string(),
                name: "a.Missing".to_string()
            }]
        );
    }

    #[test]
    fn inherited_callbacks() {
        let repo = repo();
        let roots = roots(&repo, "a.Child", &ComponentKind::Activity);
        assert!(roots.contains(&MethodRef::new("a.Main", "onCreate", "(Landroid/os/Bundle;)V")));
    }

    #[test]
    fn closure_and_cycles() {
        let repo = repo();
        let facts = ManifestFacts {
            components: vec![component(ComponentKind::Activity, "a.Main", true)],
            ..ManifestFacts::default()
        };
        let (entries, _) = entry_points(&facts, &repo);
        let reachable = ReachabilitySet::compute(&repo, &entries);

        let ping = MethodRef::new("a.Main", "ping", "()V");
        let pong = MethodRef::new("a.Main", "pong", "()V");
        assert!(reachable.contains(&ping));
        assert!(reachable.contains(&pong));
        assert_eq!(reachable.iter().filter(|m| **m == ping).count(), 1);
        assert!(reachable.contains(&MethodRef::new("android.util.Log", "flush", "()V")));
        assert!(!reachable.contains(&MethodRef::new("a.Main", "unused", "()V")));
        assert!(!reachable.contains(&MethodRef::new("a.Helper", "secret", "()V")));

        // closed under invocation
        for (_, method) in reachable.defined(&repo) {
            for target in &method.invocations {
                assert!(reachable.contains(target));
            }
        }
        assert_eq!(reachable.defined(&repo).count(), 4);
    }

    #[test]
    fn class_without_callbacks_exposes_all_methods() {
        let repo = repo();
        let roots = roots(&repo, "a.Helper", &ComponentKind::Receiver);
        assert_eq!(roots, vec![MethodRef::new("a.Helper", "secret", "()V")]);
    }
}
