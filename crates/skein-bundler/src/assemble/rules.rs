//! Module rules: template, single-file components, styles, scripts and
//! url-loaded assets.

use indexmap::IndexMap;
use serde_json::json;
use skein_config::graph::Pattern;
use skein_config::graph::selectors::{
    ASSET_LAYOUT, BABEL_DYNAMIC_IMPORT, BABEL_PRESET_ENV, COND_HMR, COND_LESS, COND_PRODUCTION,
    COND_SASS, COND_STYLUS, CONTEXT, HOME, LOADER_TEST, POSTCSS_CONFIG,
    RENDER_TARGET, SOURCE_MAP, TEMPLATE, TYPESCRIPT,
};
use skein_config::{AssetCategory, Derivations, RenderTarget};

use crate::config::{Extraction, Loader, LoaderChain, Rule, RuleTest};
use crate::error::{BundlerError, Result};

const URL_LOADER_LIMIT: u64 = 10_000;

/// Loader chain per style or script language, keyed by file extension.
///
/// Preprocessor languages only appear when their conditional dependency
/// holds.
pub fn language_loaders(d: &Derivations) -> Result<IndexMap<&'static str, LoaderChain>> {
    let mut loaders = IndexMap::new();

    loaders.insert("css", style_chain(d, None)?);
    loaders.insert("postcss", style_chain(d, None)?);
    if d.get(&COND_LESS)? {
        loaders.insert("less", style_chain(d, Some(("less", json!({}))))?);
    }
    if d.get(&COND_SASS)? {
        loaders.insert(
            "sass",
            style_chain(d, Some(("sass", json!({ "indentedSyntax": true }))))?,
        );
        loaders.insert("scss", style_chain(d, Some(("sass", json!({}))))?);
    }
    if d.get(&COND_STYLUS)? {
        loaders.insert("stylus", style_chain(d, Some(("stylus", json!({}))))?);
        loaders.insert("styl", style_chain(d, Some(("stylus", json!({}))))?);
    }

    let scripts = LoaderChain::Loaders(script_loaders(d)?);
    loaders.insert("ts", scripts.clone());
    loaders.insert("js", scripts);

    Ok(loaders)
}

/// css + postcss (+ preprocessor), extracted in production and injected
/// with `vue-style-loader` otherwise.
fn style_chain(
    d: &Derivations,
    preprocessor: Option<(&str, serde_json::Value)>,
) -> Result<LoaderChain> {
    let source_map = d.get(&SOURCE_MAP)?;
    let mut loaders = vec![
        Loader::new(
            "css-loader",
            json!({ "minimize": false, "sourceMap": source_map }),
        ),
        Loader::new(
            "postcss-loader",
            json!({
                "sourceMap": source_map,
                "config": { "path": d.get(&POSTCSS_CONFIG)? },
            }),
        ),
    ];

    if let Some((name, mut options)) = preprocessor {
        if let Some(map) = options.as_object_mut() {
            map.insert("sourceMap".into(), json!(source_map));
        }
        loaders.push(Loader::new(format!("{name}-loader"), options));
    }

    if d.get(&COND_PRODUCTION)? {
        Ok(LoaderChain::Extract {
            extract: Extraction {
                use_: loaders,
                fallback: "vue-style-loader".to_string(),
            },
        })
    } else {
        let mut chain = vec![Loader::bare("vue-style-loader")];
        chain.extend(loaders);
        Ok(LoaderChain::Loaders(chain))
    }
}

/// thread-loader, babel-loader (production only) and ts-loader.
pub fn script_loaders(d: &Derivations) -> Result<Vec<Loader>> {
    let context = d.get(&CONTEXT)?;
    let server = d.get(&RENDER_TARGET)? == RenderTarget::Server;
    let mut loaders = vec![Loader::new(
        "thread-loader",
        json!({
            "workers": "two-cpus-free",
            "workerParallelJobs": 50,
            "poolTimeout": 2000,
            "poolParallelJobs": 200,
            "name": "typescript-pool",
        }),
    )];

    if d.get(&COND_PRODUCTION)? {
        let mut preset = json!({
            "configPath": context,
            "modules": false,
            "useBuiltIns": "entry",
            "loose": true,
            "ignoreBrowserslistConfig": server,
        });
        if server {
            preset["targets"] = json!({ "node": true });
        }
        loaders.push(Loader::new(
            "babel-loader",
            json!({
                "babelrc": false,
                "cacheDirectory": true,
                "plugins": [d.get(&BABEL_DYNAMIC_IMPORT)?],
                "presets": [[d.get(&BABEL_PRESET_ENV)?, preset]],
            }),
        ));
    }

    let vue_suffix = Pattern::new(r"\.vue$", true).map_err(pattern_error)?;
    loaders.push(Loader::new(
        "ts-loader",
        json!({
            "logLevel": "error",
            "silent": true,
            "compiler": d.get(&TYPESCRIPT)?,
            "appendTsSuffixTo": [vue_suffix],
            "configFile": context.join("tsconfig.json"),
            "happyPackMode": true,
            "transpileOnly": true,
            "compilerOptions": {
                "downlevelIteration": true,
                "importHelpers": true,
                "module": "esnext",
                "sourceMap": true,
                "target": "es6",
            },
        }),
    ));

    Ok(loaders)
}

/// Every module rule in application order.
pub fn rules(d: &Derivations) -> Result<Vec<Rule>> {
    let languages = language_loaders(d)?;
    let mut rules = vec![
        Rule::loader(
            RuleTest::File {
                file: d.get(&TEMPLATE)?,
            },
            "mustache-loader",
            json!({ "tiny": true }),
        ),
        Rule::loader(
            RuleTest::Pattern(Pattern::new(r"\.vue$", true).map_err(pattern_error)?),
            "vue-loader",
            json!({
                "loaders": languages,
                "cssSourceMap": d.get(&SOURCE_MAP)?,
                "postcss": { "useConfigFile": false },
                "optimizeSSR": d.get(&RENDER_TARGET)? == RenderTarget::Server,
                "hotReload": d.get(&COND_HMR)?,
                "transformToRequire": {
                    "video": ["src", "poster"],
                    "source": "src",
                    "img": "src",
                    "image": "xlink:href",
                },
            }),
        ),
    ];

    let script_roots = vec![d.get(&CONTEXT)?.join("src"), d.get(&HOME)?.join("entries")];
    for (language, chain) in languages {
        let test = Pattern::new(format!(r"\.{language}$"), true).map_err(pattern_error)?;
        let mut rule = Rule::chain(RuleTest::Pattern(test), chain);
        if matches!(language, "ts" | "js") {
            rule.include = Some(script_roots.clone());
        }
        rules.push(rule);
    }

    let tests = d.get(&LOADER_TEST)?;
    let layout = d.get(&ASSET_LAYOUT)?;
    for category in [AssetCategory::Image, AssetCategory::Media, AssetCategory::Font] {
        rules.push(Rule::loader(
            RuleTest::Pattern(tests.get(category).clone()),
            "url-loader",
            json!({
                "limit": URL_LOADER_LIMIT,
                "name": layout.path(&format!("{}/[name].[hash:7].[ext]", category.directory())),
            }),
        ));
    }

    Ok(rules)
}

fn pattern_error(source: regex::Error) -> BundlerError {
    BundlerError::Derive(skein_config::DeriveError::Pattern {
        node: "rules",
        source,
    })
}
