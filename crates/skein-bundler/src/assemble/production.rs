use std::collections::BTreeMap;

use serde_json::json;
use skein_config::Derivations;
use skein_config::graph::Pattern;
use skein_config::graph::selectors::{
    COMPRESSION_TEST, CONTEXT, ENTRIES, EXTERNALS_WHITELIST, HOME, MINIFY_OPTIONS, OUTPUT_PATH,
    PACKAGE_JSON, SOURCE_MAP, SSR_CLIENT_FILENAME, SSR_SERVER_FILENAME, STATIC_ASSETS,
};

use super::{base, plugins};
use crate::config::{
    BundlerConfig, NodeExternals, Overlay, OutputOverlay, Plugin, Target, Variant,
};
use crate::error::{BundlerError, Result};

const COMPRESSION_THRESHOLD: u64 = 10_240;

/// Server bundle for the SSR renderer: node target, CommonJS output and
/// installed packages left external.
pub fn server(d: &Derivations) -> Result<BundlerConfig> {
    let entries = d.get(&ENTRIES)?;
    let context = d.get(&CONTEXT)?;
    let package_json = d.get(&PACKAGE_JSON)?;

    let overlay = Overlay {
        target: Some(Target::Node),
        entry: BTreeMap::from([(
            "main".to_string(),
            vec![entries.polyfill, entries.server],
        )]),
        devtool: Some("source-map".to_string()),
        output: Some(OutputOverlay {
            library_target: Some("commonjs2".to_string()),
            ..Default::default()
        }),
        externals: Some(NodeExternals {
            modules_dir: context.join("node_modules"),
            modules: package_json.declared().map(str::to_string).collect(),
            whitelist: d.get(&EXTERNALS_WHITELIST)?,
        }),
        plugins: vec![
            plugins::define(d)?,
            Plugin::new(
                "ssr-server-manifest",
                json!({ "filename": d.get(&SSR_SERVER_FILENAME)? }),
            ),
        ],
    };

    base::base(d, Variant::Server)?.merge(&overlay)
}

/// Browser bundle: minified, chunk-split, gzip-compressed, with the SSR
/// client manifest.
pub fn client(d: &Derivations) -> Result<BundlerConfig> {
    let entries = d.get(&ENTRIES)?;
    let context = d.get(&CONTEXT)?;
    let home = d.get(&HOME)?;
    let minify = d.get(&MINIFY_OPTIONS)?;
    let comments = Pattern::new(minify.comments.clone(), false).map_err(|source| {
        BundlerError::Derive(skein_config::DeriveError::Pattern {
            node: "minify_options",
            source,
        })
    })?;

    let mut plugins = vec![
        plugins::define(d)?,
        Plugin::bare("css-minifier"),
        Plugin::new(
            "js-minifier",
            json!({
                "parallel": true,
                "sourceMap": d.get(&SOURCE_MAP)?,
                "uglifyOptions": {
                    "output": { "comments": comments },
                    "mangle": minify.mangle,
                    "warnings": minify.warnings,
                },
            }),
        ),
        Plugin::new(
            "commons-chunk",
            json!({
                "name": "vendor",
                "resource": { "source": r"\.js$", "flags": "" },
                "excludeRequest": { "source": r"\.(css|less|scss|sass|styl|stylus|vue)$", "flags": "" },
                "roots": [context.join("node_modules"), home.join("node_modules")],
            }),
        ),
        Plugin::new(
            "commons-chunk",
            json!({ "name": "manifest", "minChunks": "Infinity" }),
        ),
        Plugin::new(
            "commons-chunk",
            json!({ "name": "main", "async": "vendor-async", "children": true, "minChunks": 3 }),
        ),
    ];

    if let Some(static_assets) = d.get(&STATIC_ASSETS)? {
        plugins.push(Plugin::new(
            "copy",
            json!([{
                "from": static_assets,
                "to": d.get(&OUTPUT_PATH)?,
                "ignore": [".*"],
            }]),
        ));
    }

    plugins.push(Plugin::new(
        "compression",
        json!({
            "asset": "[path].gz[query]",
            "algorithm": "gzip",
            "test": d.get(&COMPRESSION_TEST)?,
            "threshold": COMPRESSION_THRESHOLD,
            "minRatio": 0.8,
        }),
    ));
    plugins.push(Plugin::new(
        "ssr-client-manifest",
        json!({ "filename": d.get(&SSR_CLIENT_FILENAME)? }),
    ));
    plugins.extend(plugins::interactive(d)?);

    let overlay = Overlay {
        entry: BTreeMap::from([(
            "main".to_string(),
            vec![entries.polyfill, entries.client],
        )]),
        plugins,
        ..Default::default()
    };

    base::base(d, Variant::Client)?.merge(&overlay)
}
