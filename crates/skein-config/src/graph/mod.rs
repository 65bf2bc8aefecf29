//! Memoized derivation graph over an immutable [`State`].
//!
//! Every derived configuration value is a named [`Node`] with a declared
//! list of input nodes and a pure compute function. A [`Derivations`]
//! context evaluates nodes on demand and memoizes each result together with
//! the BLAKE3 fingerprints of the inputs it was computed from:
//!
//! - a node with no inputs is a projection of the state and is recomputed
//!   once per state generation;
//! - a node with inputs is recomputed only when one of its input
//!   fingerprints differs from the memoized ones.
//!
//! Reading a node that is not in the declared inputs is an error, so the
//! fingerprints always cover everything a value was computed from.
//! [`Derivations::fork`] moves the memo onto a new state and keeps every
//! entry whose inputs did not change.

pub mod hash;
pub mod inspect;
pub mod pattern;
pub mod selectors;

use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::error::DeriveError;
use crate::manifest::PackageJson;
use crate::resolve::{ModuleResolver, NodeResolver, check_dependency};
use crate::state::State;

pub use hash::{CACHE_KEY, CuratedSubset};
pub use inspect::DependencyGraph;
pub use pattern::Pattern;

pub type NodeName = &'static str;

pub type Result<T, E = DeriveError> = std::result::Result<T, E>;

/// Values a node may produce.
pub trait Value: Clone + Serialize + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + Serialize + Send + Sync + 'static {}

/// A named, typed, pure derivation.
pub struct Node<T> {
    name: NodeName,
    inputs: &'static [NodeName],
    compute: fn(&Scope<'_>) -> Result<T>,
}

impl<T> Node<T> {
    pub const fn new(
        name: NodeName,
        inputs: &'static [NodeName],
        compute: fn(&Scope<'_>) -> Result<T>,
    ) -> Self {
        Self {
            name,
            inputs,
            compute,
        }
    }

    pub fn name(&self) -> NodeName {
        self.name
    }

    pub fn inputs(&self) -> &'static [NodeName] {
        self.inputs
    }
}

/// Type-erased view of a node, used for fingerprinting inputs by name.
pub trait AnyNode: Sync {
    fn name(&self) -> NodeName;
    fn inputs(&self) -> &'static [NodeName];
    fn fingerprint(&self, derivations: &Derivations) -> Result<Fingerprint>;
    fn json(&self, derivations: &Derivations) -> Result<serde_json::Value>;
}

impl<T: Value> AnyNode for Node<T> {
    fn name(&self) -> NodeName {
        self.name
    }

    fn inputs(&self) -> &'static [NodeName] {
        self.inputs
    }

    fn fingerprint(&self, derivations: &Derivations) -> Result<Fingerprint> {
        derivations.evaluate(self).map(|entry| entry.fingerprint)
    }

    fn json(&self, derivations: &Derivations) -> Result<serde_json::Value> {
        let value = derivations.get(self)?;
        serde_json::to_value(value).map_err(|source| DeriveError::Fingerprint {
            node: self.name,
            source,
        })
    }
}

/// BLAKE3 digest of a value's canonical JSON serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of<T: Serialize>(node: NodeName, value: &T) -> Result<Self> {
        let json = serde_json::to_value(value)
            .map_err(|source| DeriveError::Fingerprint { node, source })?;
        let bytes = hash::canonical_json(&json).into_bytes();
        Ok(Self(*blake3::hash(&bytes).as_bytes()))
    }
}

/// What a compute function may read: its declared inputs, and for
/// projections the state itself.
pub struct Scope<'a> {
    derivations: &'a Derivations,
    node: NodeName,
    inputs: &'static [NodeName],
}

impl<'a> Scope<'a> {
    /// Value of a declared input.
    pub fn get<T: Value>(&self, input: &Node<T>) -> Result<T> {
        self.check_declared(input.name)?;
        self.derivations.get(input)
    }

    /// JSON value of a declared input, looked up by name.
    pub fn json(&self, input: NodeName) -> Result<serde_json::Value> {
        self.check_declared(input)?;
        selectors::lookup(input)?.json(self.derivations)
    }

    /// The raw state. Only nodes without declared inputs may read it.
    pub fn state(&self) -> Result<&'a State> {
        if !self.inputs.is_empty() {
            return Err(DeriveError::StateAccess(self.node));
        }
        Ok(&self.derivations.state)
    }

    pub fn resolver(&self) -> &'a dyn ModuleResolver {
        self.derivations.resolver.as_ref()
    }

    pub fn node(&self) -> NodeName {
        self.node
    }

    fn check_declared(&self, input: NodeName) -> Result<()> {
        if self.inputs.contains(&input) {
            Ok(())
        } else {
            Err(DeriveError::UndeclaredDependency {
                node: self.node,
                dependency: input,
            })
        }
    }
}

#[derive(Clone)]
struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    fingerprint: Fingerprint,
    inputs: Vec<Fingerprint>,
    generation: u64,
}

/// Derivation context: one state plus the memo.
pub struct Derivations {
    state: Arc<State>,
    resolver: Arc<dyn ModuleResolver>,
    generation: u64,
    memo: RwLock<HashMap<NodeName, Entry>>,
    computations: Mutex<HashMap<NodeName, usize>>,
}

impl std::fmt::Debug for Derivations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Derivations")
            .field("generation", &self.generation)
            .field("memoized", &self.memo.read().len())
            .finish_non_exhaustive()
    }
}

impl Derivations {
    /// Context with the default node module resolver.
    pub fn new(state: State) -> Self {
        Self::with_resolver(state, Arc::new(NodeResolver::new()))
    }

    pub fn with_resolver(state: State, resolver: Arc<dyn ModuleResolver>) -> Self {
        Self {
            state: Arc::new(state),
            resolver,
            generation: 0,
            memo: RwLock::new(HashMap::new()),
            computations: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn shared_state(&self) -> Arc<State> {
        Arc::clone(&self.state)
    }

    /// Context over `state` that keeps every memo entry whose inputs are
    /// unchanged.
    pub fn fork(&self, state: State) -> Derivations {
        Derivations {
            state: Arc::new(state),
            resolver: Arc::clone(&self.resolver),
            generation: self.generation + 1,
            memo: RwLock::new(self.memo.read().clone()),
            computations: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate a node.
    pub fn get<T: Value>(&self, node: &Node<T>) -> Result<T> {
        let entry = self.evaluate(node)?;
        entry
            .value
            .downcast_ref::<T>()
            .cloned()
            .ok_or(DeriveError::TypeMismatch(node.name))
    }

    /// How many times `name` was computed in this context.
    pub fn computations(&self, name: NodeName) -> usize {
        self.computations.lock().get(name).copied().unwrap_or(0)
    }

    /// Probe a single optional dependency against this state.
    pub fn conditional_dependency(&self, name: &str) -> Result<bool> {
        let package_json: PackageJson = self.get(&selectors::PACKAGE_JSON)?;
        let module_paths: Vec<PathBuf> = self.get(&selectors::MODULE_PATHS)?;
        Ok(check_dependency(
            self.resolver.as_ref(),
            name,
            &package_json,
            &module_paths,
        ))
    }

    fn evaluate<T: Value>(&self, node: &Node<T>) -> Result<Entry> {
        if let Some(entry) = self.memo.read().get(node.name) {
            if entry.generation == self.generation {
                return Ok(entry.clone());
            }
        }

        let inputs = node
            .inputs
            .iter()
            .map(|input| selectors::lookup(input)?.fingerprint(self))
            .collect::<Result<Vec<_>>>()?;

        if !node.inputs.is_empty() {
            let mut memo = self.memo.write();
            if let Some(entry) = memo.get_mut(node.name) {
                if entry.inputs == inputs {
                    entry.generation = self.generation;
                    return Ok(entry.clone());
                }
            }
        }

        let scope = Scope {
            derivations: self,
            node: node.name,
            inputs: node.inputs,
        };
        let value = (node.compute)(&scope)?;
        let fingerprint = Fingerprint::of(node.name, &value)?;

        let entry = Entry {
            value: Arc::new(value),
            fingerprint,
            inputs,
            generation: self.generation,
        };
        self.memo.write().insert(node.name, entry.clone());
        *self.computations.lock().entry(node.name).or_insert(0) += 1;
        tracing::trace!(node = node.name, generation = self.generation, "derived");

        Ok(entry)
    }
}

#[cfg(test)]
mod tests;
