//! Plugin descriptors shared by several variants.

use serde_json::json;
use skein_config::Derivations;
use skein_config::graph::selectors::{
    ASSET_LAYOUT, COND_INTERACTIVE, COND_PRODUCTION, CONTEXT, NODE_ENV, OUTPUT_PATH,
    RENDER_TARGET,
};

use crate::cache::BuildCacheOptions;
use crate::config::Plugin;
use crate::error::Result;

/// `process.env.NODE_ENV` and `process.env.VUE_ENV` as JSON string literals.
pub fn define(d: &Derivations) -> Result<Plugin> {
    let node_env = d.get(&NODE_ENV)?;
    let vue_env = d.get(&RENDER_TARGET)?.as_str();
    Ok(Plugin::new(
        "define",
        json!({
            "process.env": {
                "NODE_ENV": json!(node_env).to_string(),
                "VUE_ENV": json!(vue_env).to_string(),
            }
        }),
    ))
}

/// Progress bar and friendly error output, only for interactive sessions.
pub fn interactive(d: &Derivations) -> Result<Vec<Plugin>> {
    if !d.get(&COND_INTERACTIVE)? {
        return Ok(Vec::new());
    }
    Ok(vec![
        Plugin::new(
            "progress-bar",
            json!({
                "summary": false,
                "complete": "█",
                "incomplete": "░",
                "format": "  :bar :percent :msg",
                "clear": false,
            }),
        ),
        Plugin::new("friendly-errors", json!({ "clearConsole": true })),
    ])
}

pub fn type_checker(d: &Derivations) -> Result<Plugin> {
    let context = d.get(&CONTEXT)?;
    Ok(Plugin::new(
        "type-checker",
        json!({
            "tsconfig": context.join("tsconfig.json"),
            "watch": [context.join("src")],
            "workers": 1,
            "async": false,
            "formatter": "codeframe",
            "silent": true,
            "checkSyntacticErrors": true,
            "vue": false,
        }),
    ))
}

/// Plugins every variant starts from.
pub fn base(d: &Derivations) -> Result<Vec<Plugin>> {
    let production = d.get(&COND_PRODUCTION)?;
    let mut plugins = Vec::new();

    if production {
        plugins.push(Plugin::new(
            "clean",
            json!({
                "paths": [d.get(&OUTPUT_PATH)?],
                "root": d.get(&CONTEXT)?,
                "verbose": false,
            }),
        ));
        plugins.push(Plugin::new(
            "extract-css",
            json!({
                "filename": d.get(&ASSET_LAYOUT)?.path("css/[name].[contenthash].css"),
                "allChunks": true,
            }),
        ));
    }

    plugins.push(Plugin::bare("hashed-module-ids"));

    if production {
        plugins.push(Plugin::bare("module-concatenation"));
    }

    plugins.push(type_checker(d)?);

    if let Some(cache) = BuildCacheOptions::from_derivations(d)? {
        plugins.push(cache.plugin()?);
    }

    Ok(plugins)
}
