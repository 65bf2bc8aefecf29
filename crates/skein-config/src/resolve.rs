//! Module resolution probes against the module search paths.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::DeriveError;
use crate::manifest::PackageJson;

/// Resolves a bare module id from a search directory.
///
/// Injected into [`Derivations`](crate::Derivations) so tests can swap the
/// filesystem for a fixed table.
pub trait ModuleResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, module: &str, search_path: &Path) -> Option<PathBuf>;
}

/// Node-style `require` resolution backed by `oxc_resolver`.
#[derive(Debug, Clone)]
pub struct NodeResolver {
    resolver: Arc<oxc_resolver::Resolver>,
}

impl NodeResolver {
    pub fn new() -> Self {
        let resolver = oxc_resolver::Resolver::new(oxc_resolver::ResolveOptions {
            condition_names: vec!["node".into(), "require".into(), "default".into()],
            extensions: vec![".js".into(), ".json".into(), ".node".into()],
            ..Default::default()
        });

        Self {
            resolver: Arc::new(resolver),
        }
    }
}

impl Default for NodeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleResolver for NodeResolver {
    fn resolve(&self, module: &str, search_path: &Path) -> Option<PathBuf> {
        match self.resolver.resolve(search_path, module) {
            Ok(resolution) => Some(resolution.path().to_path_buf()),
            Err(e) => {
                tracing::trace!(module, path = %search_path.display(), error = ?e, "resolution probe missed");
                None
            }
        }
    }
}

/// Resolve `module` from the first search path that has it.
pub fn resolve_module(
    resolver: &dyn ModuleResolver,
    module: &str,
    paths: &[PathBuf],
) -> Result<PathBuf, DeriveError> {
    let mut searched: Vec<&Path> = Vec::with_capacity(paths.len());
    for path in paths {
        if searched.contains(&path.as_path()) {
            continue;
        }
        searched.push(path);
        if let Some(found) = resolver.resolve(module, path) {
            return Ok(found);
        }
    }

    Err(DeriveError::Unresolved {
        module: module.to_string(),
        searched: searched
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Resolution probe; failures are coerced to `false`.
pub fn has_module(resolver: &dyn ModuleResolver, module: &str, paths: &[PathBuf]) -> bool {
    resolve_module(resolver, module, paths).is_ok()
}

/// A dependency counts only when the manifest declares it and it resolves.
pub fn check_dependency(
    resolver: &dyn ModuleResolver,
    name: &str,
    package_json: &PackageJson,
    paths: &[PathBuf],
) -> bool {
    package_json.declares(name) && has_module(resolver, name, paths)
}
