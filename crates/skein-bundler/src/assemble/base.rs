use std::collections::BTreeMap;

use serde_json::{Value, json};
use skein_config::Derivations;
use skein_config::graph::Pattern;
use skein_config::graph::selectors::{
    ASSET_LAYOUT, COND_PRODUCTION, CONTEXT, DEVTOOL, MODULE_PATHS, OUTPUT_PATH, PUBLIC_PATH,
    STATS_OPTIONS,
};

use super::{plugins, rules};
use crate::config::{
    BundlerConfig, ModuleOptions, Output, Performance, Plugin, Resolve, ResolveLoader, Target,
    Variant, WatchOptions,
};
use crate::error::{BundlerError, Result};

/// Configuration every variant is merged over.
pub fn base(d: &Derivations, variant: Variant) -> Result<BundlerConfig> {
    let layout = d.get(&ASSET_LAYOUT)?;
    let context = d.get(&CONTEXT)?;
    let module_paths = d.get(&MODULE_PATHS)?;

    let output = Output {
        chunk_filename: layout.path("js/[id].[chunkhash].js"),
        devtool_module_filename_template: "[absolute-resource-path]".to_string(),
        filename: layout.path("js/[name].[chunkhash].js"),
        path: if d.get(&COND_PRODUCTION)? {
            Some(d.get(&OUTPUT_PATH)?)
        } else {
            None
        },
        public_path: d.get(&PUBLIC_PATH)?,
        library_target: None,
    };

    let no_parse = Pattern::new(r"(es6-promise\.js)", false).map_err(|source| {
        BundlerError::Derive(skein_config::DeriveError::Pattern {
            node: "no_parse",
            source,
        })
    })?;

    Ok(BundlerConfig {
        name: variant,
        target: Target::Web,
        entry: BTreeMap::new(),
        context: context.clone(),
        devtool: d.get(&DEVTOOL)?,
        output,
        watch_options: WatchOptions::default(),
        plugins: plugins::base(d)?,
        module: ModuleOptions {
            no_parse,
            rules: rules::rules(d)?,
        },
        resolve: Resolve {
            symlinks: true,
            plugins: vec![Plugin::new(
                "tsconfig-paths",
                json!({ "silent": true, "configFile": context.join("tsconfig.json") }),
            )],
            extensions: [".ts", ".js", ".vue", ".json"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            modules: module_paths.clone(),
        },
        resolve_loader: ResolveLoader {
            modules: module_paths,
        },
        performance: Performance { hints: false },
        node: node_shims(),
        stats: d.get(&STATS_OPTIONS)?,
        externals: None,
    })
}

/// No `setImmediate` polyfill and empty mocks for node built-ins.
fn node_shims() -> BTreeMap<String, Value> {
    let mut node = BTreeMap::from([("setImmediate".to_string(), Value::Bool(false))]);
    for module in ["dgram", "fs", "net", "tls", "child_process"] {
        node.insert(module.to_string(), json!("empty"));
    }
    node
}
