//! A repository to centralize the classes of every loaded bytecode image.
//!
//! Classes reference each other by qualified name only: a superclass that
//! no image defines is simply absent from the repository.

use crate::errors::{AnalysisError, AnalysisResult};
use da_dex::{ClassDef, DexImage, MethodDef, MethodRef};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug)]
struct Entry {
    class: ClassDef,
    image: String,
}

#[derive(Debug, Default)]
pub struct Repo {
    classes: BTreeMap<String, Entry>,
    referenced: BTreeSet<String>,
    nb_methods: usize,
}

impl Repo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the classes of an image. A class already defined by a previous
    /// image keeps its first definition.
    pub fn register_dex(&mut self, name: &str, image: DexImage) -> Vec<AnalysisError> {
        let mut duplicates = Vec::new();
        self.referenced.extend(image.type_names().iter().cloned());
        let (classes, _) = image.into_parts();

        for class in classes {
            log::trace!("pushing '{}' from {} in repository", class.name, name);
            self.referenced.extend(class.superclass.iter().cloned());
            self.referenced.extend(class.interfaces.iter().cloned());
            if let Some(first) = self.classes.get(&class.name) {
                log::warn!(
                    "class '{}' has already been pushed in repository from {}",
                    class.name,
                    first.image
                );
                duplicates.push(AnalysisError::DuplicateClass {
                    class: class.name,
                    image: name.to_string(),
                    first: first.image.clone(),
                });
                continue;
            }
            self.nb_methods += class.methods.len();
            self.classes.insert(
                class.name.clone(),
                Entry {
                    class,
                    image: name.to_string(),
                },
            );
        }
        duplicates
    }

    pub fn get_class(&self, name: &str) -> AnalysisResult<&ClassDef> {
        self.classes
            .get(name)
            .map(|entry| &entry.class)
            .ok_or_else(|| AnalysisError::ClassNotFound(name.to_string()))
    }

    #[must_use]
    pub fn contains_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Name of the image that defines a class.
    #[must_use]
    pub fn image_of(&self, name: &str) -> Option<&str> {
        self.classes.get(name).map(|entry| entry.image.as_str())
    }

    /// Defined classes, sorted by name.
    pub fn iter_classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.values().map(|entry| &entry.class)
    }

    pub fn iter_classes_methods(&self) -> impl Iterator<Item = (&ClassDef, &MethodDef)> {
        self.iter_classes()
            .flat_map(|class| class.methods.iter().map(move |method| (class, method)))
    }

    /// Classes that are referenced but defined by no image, sorted by name.
    pub fn iter_missing_classes(&self) -> impl Iterator<Item = &str> {
        self.referenced
            .iter()
            .filter(|name| !self.classes.contains_key(*name))
            .map(String::as_str)
    }

    /// The class followed by its superclasses, as long as they are defined.
    #[must_use]
    pub fn ancestors(&self, name: &str) -> Vec<&ClassDef> {
        let mut chain: Vec<&ClassDef> = Vec::new();
        let mut current = self.get_class(name).ok();
        while let Some(class) = current {
            // a crafted image may declare a cyclic hierarchy
            if chain.iter().any(|c| c.name == class.name) {
                log::warn!("cyclic class hierarchy at '{}'", class.name);
                break;
            }
            chain.push(class);
            current = class
                .superclass
                .as_deref()
                .and_then(|s| self.get_class(s).ok());
        }
        chain
    }

    /// Checks whether `name` is `ancestor` or inherits from it, possibly
    /// through implemented interfaces. The last known superclass name is
    /// considered even when its class is not defined.
    #[must_use]
    pub fn is_subclass_of(&self, name: &str, ancestor: &str) -> bool {
        if name == ancestor {
            return true;
        }
        self.ancestors(name).iter().any(|class| {
            class.superclass.as_deref() == Some(ancestor)
                || class.interfaces.iter().any(|i| i == ancestor)
        })
    }

    /// Finds the definition an invocation dispatches to, looking up the
    /// superclass chain of its owner.
    #[must_use]
    pub fn resolve_method(&self, reference: &MethodRef) -> Option<&MethodDef> {
        self.ancestors(&reference.owner)
            .into_iter()
            .find_map(|class| class.method(&reference.name, &reference.descriptor))
    }

    #[must_use]
    pub fn nb_classes(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub const fn nb_methods(&self) -> usize {
        self.nb_methods
    }
}
