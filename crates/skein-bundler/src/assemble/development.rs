use std::collections::BTreeMap;

use serde_json::json;
use skein_config::Derivations;
use skein_config::graph::selectors::{COND_HMR, DEV_OUTPUT_PATH, ENTRIES, TEMPLATE};

use super::{base, plugins};
use crate::config::{BundlerConfig, Overlay, OutputOverlay, Plugin, Variant};
use crate::error::Result;

/// Development variant: hot-middleware client entry, HMR plugins and an
/// HTML page from the template. Output goes to a scratch directory the dev
/// server serves from memory.
pub fn development(d: &Derivations) -> Result<BundlerConfig> {
    let entries = d.get(&ENTRIES)?;
    let hmr = d.get(&COND_HMR)?;

    let mut plugins = vec![plugins::define(d)?];
    if hmr {
        plugins.push(Plugin::bare("hot-module-replacement"));
        plugins.push(Plugin::bare("named-modules"));
        plugins.push(Plugin::bare("no-emit-on-errors"));
    }
    plugins.push(Plugin::new(
        "html",
        json!({
            "template": d.get(&TEMPLATE)?,
            "inject": true,
            "chunksSortMode": "dependency",
            "cache": true,
            "minify": {
                "removeComments": true,
                "collapseWhitespace": true,
                "removeAttributeQuotes": true,
            },
        }),
    ));
    plugins.extend(plugins::interactive(d)?);

    let overlay = Overlay {
        entry: BTreeMap::from([(
            "main".to_string(),
            vec![entries.hot_middleware, entries.client],
        )]),
        output: Some(OutputOverlay {
            path: Some(d.get(&DEV_OUTPUT_PATH)?),
            ..Default::default()
        }),
        plugins,
        ..Default::default()
    };

    base::base(d, Variant::Development)?.merge(&overlay)
}
