//! The node registry.
//!
//! Projections (no inputs) read the state; everything else reads only its
//! declared inputs.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use path_clean::PathClean;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::hash::CACHE_KEY;
use super::pattern::Pattern;
use super::{AnyNode, Node, Result};
use crate::environment::PRODUCTION;
use crate::error::DeriveError;
use crate::manifest::PackageJson;
use crate::resolve::{check_dependency, resolve_module};
use crate::state::{
    AssetCategory, Entries, Extensions, LogLevel, MinifyOptions, Mode, RenderTarget,
};

macro_rules! projection {
    ($(#[$meta:meta])* $ident:ident: $ty:ty = $name:literal, |$state:ident| $body:expr) => {
        $(#[$meta])*
        pub static $ident: Node<$ty> = Node::new($name, &[], |scope| {
            let $state = scope.state()?;
            Ok($body)
        });
    };
}

projection!(MODE: Mode = "mode", |s| s.mode);
projection!(NODE_ENV: String = "node_env", |s| s.node_env.clone());
projection!(HOST: String = "host", |s| s.host.clone());
projection!(PORT: u16 = "port", |s| s.port);
projection!(CONTEXT: PathBuf = "context", |s| s.context.clone());
projection!(HOME: PathBuf = "home", |s| s.home.clone());
projection!(RAW_OUTPUT_PATH: PathBuf = "raw_output_path", |s| s.output_path.clone());
projection!(PUBLIC_PATH: String = "public_path", |s| s.output_public_path.clone());
projection!(TEMPLATE: PathBuf = "template", |s| s.index_template.clone());
projection!(STATIC_ASSETS: Option<String> = "static_assets", |s| s.static_assets.clone());
projection!(
    /// `None` when the devtool was set to the string `false`.
    DEVTOOL: Option<String> = "devtool",
    |s| (s.devtool != "false").then(|| s.devtool.clone())
);
projection!(COND_WATCH: bool = "cond_watch", |s| s.watch);
projection!(COND_INTERACTIVE: bool = "cond_interactive", |s| s.interactive);
projection!(LOG_LEVEL: LogLevel = "log_level", |s| s.log_level);
projection!(ENTRIES: Entries = "entries", |s| s.entries.clone());
projection!(SSR_CLIENT_FILENAME: String = "ssr_client_filename", |s| s.ssr_client_filename.clone());
projection!(SSR_SERVER_FILENAME: String = "ssr_server_filename", |s| s.ssr_server_filename.clone());
projection!(EXTENSIONS: Extensions = "extensions", |s| s.extensions.clone());
projection!(MINIFY_OPTIONS: MinifyOptions = "minify_options", |s| s.minify_options.clone());
projection!(MODULE_PATHS: Vec<PathBuf> = "module_paths", |s| s.module_paths.clone());
projection!(PACKAGE_JSON: PackageJson = "package_json", |s| s.package_json.clone());
projection!(VERSION: String = "version", |s| s.version.clone());
projection!(ASSETS_DIRECTORY: String = "assets_directory", |s| s.assets_directory.clone());
projection!(RENDER_TARGET: RenderTarget = "render_target", |s| s.render_target);
projection!(POSTCSS_CONFIG: PathBuf = "postcss_config", |s| s.postcss_config.clone());
projection!(OPTIONAL_DEPENDENCIES: Vec<String> = "optional_dependencies", |s| s.optional_dependencies.clone());
projection!(BUNDLER_COMMAND: Vec<String> = "bundler_command", |s| s.bundler_command.clone());
projection!(RENDERER_COMMAND: Vec<String> = "renderer_command", |s| s.renderer_command.clone());

pub static SOURCE_MAP: Node<bool> = Node::new("source_map", &[], |_| Ok(true));

pub static COND_DEBUG: Node<bool> = Node::new("cond_debug", &["log_level"], |scope| {
    Ok(scope.get(&LOG_LEVEL)? == LogLevel::Debug)
});

pub static COND_PRODUCTION: Node<bool> = Node::new("cond_production", &["node_env"], |scope| {
    Ok(scope.get(&NODE_ENV)? == PRODUCTION)
});

pub static COND_DEVELOPMENT: Node<bool> =
    Node::new("cond_development", &["cond_production"], |scope| {
        Ok(!scope.get(&COND_PRODUCTION)?)
    });

pub static COND_START: Node<bool> = Node::new("cond_start", &["mode"], |scope| {
    Ok(scope.get(&MODE)? == Mode::Start)
});

pub static COND_BUILD: Node<bool> =
    Node::new("cond_build", &["cond_production", "mode"], |scope| {
        Ok(scope.get(&COND_PRODUCTION)? && scope.get(&MODE)? == Mode::Build)
    });

pub static COND_HMR: Node<bool> =
    Node::new("cond_hmr", &["cond_watch", "cond_development"], |scope| {
        Ok(scope.get(&COND_WATCH)? && scope.get(&COND_DEVELOPMENT)?)
    });

/// Absolute, lexically normalized output directory.
pub static OUTPUT_PATH: Node<PathBuf> =
    Node::new("output_path", &["context", "raw_output_path"], |scope| {
        let context = scope.get(&CONTEXT)?;
        Ok(context.join(scope.get(&RAW_OUTPUT_PATH)?).clean())
    });

/// url-loader test per asset category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPatterns {
    pub media: Pattern,
    pub font: Pattern,
    pub image: Pattern,
}

impl AssetPatterns {
    pub fn get(&self, category: AssetCategory) -> &Pattern {
        match category {
            AssetCategory::Media => &self.media,
            AssetCategory::Font => &self.font,
            AssetCategory::Image => &self.image,
        }
    }
}

pub static LOADER_TEST: Node<AssetPatterns> = Node::new("loader_test", &["extensions"], |scope| {
    let extensions = scope.get(&EXTENSIONS)?;
    let build = |category| {
        Pattern::extensions(
            extensions.get(category).iter().map(String::as_str),
            true,
        )
        .map_err(|source| DeriveError::Pattern {
            node: scope.node(),
            source,
        })
    };
    Ok(AssetPatterns {
        media: build(AssetCategory::Media)?,
        font: build(AssetCategory::Font)?,
        image: build(AssetCategory::Image)?,
    })
});

pub static COMPRESSION_TEST: Node<Pattern> =
    Node::new("compression_test", &["extensions"], |scope| {
        let extensions = scope.get(&EXTENSIONS)?;
        Pattern::extensions(extensions.all().chain(["js", "css"]), true).map_err(|source| {
            DeriveError::Pattern {
                node: scope.node(),
                source,
            }
        })
    });

/// Module requests the server bundle must not externalize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalsAllow {
    Pattern(Pattern),
    Module(String),
}

impl ExternalsAllow {
    pub fn matches(&self, request: &str) -> bool {
        match self {
            ExternalsAllow::Pattern(pattern) => pattern.is_match(request),
            ExternalsAllow::Module(module) => module == request,
        }
    }
}

pub const POLYFILL_MODULE: &str = "@babel/polyfill";

pub static EXTERNALS_WHITELIST: Node<Vec<ExternalsAllow>> =
    Node::new("externals_whitelist", &["extensions"], |scope| {
        let extensions = scope.get(&EXTENSIONS)?;
        let sources = ["ts", "css", "sass", "scss", "vue"];
        let pattern = Pattern::extensions(extensions.all().chain(sources), false).map_err(
            |source| DeriveError::Pattern {
                node: scope.node(),
                source,
            },
        )?;
        Ok(vec![
            ExternalsAllow::Pattern(pattern),
            ExternalsAllow::Module(POLYFILL_MODULE.to_string()),
        ])
    });

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsOptions {
    pub timings: bool,
    pub modules_sort: String,
    pub chunks_sort: String,
    pub assets_sort: String,
    pub context: PathBuf,
}

pub static STATS_OPTIONS: Node<StatsOptions> = Node::new("stats_options", &["context"], |scope| {
    Ok(StatsOptions {
        timings: true,
        modules_sort: "size".to_string(),
        chunks_sort: "size".to_string(),
        assets_sort: "size".to_string(),
        context: scope.get(&CONTEXT)?,
    })
});

pub static SSR_SERVER_PATH: Node<PathBuf> = Node::new(
    "ssr_server_path",
    &["output_path", "ssr_server_filename"],
    |scope| Ok(scope.get(&OUTPUT_PATH)?.join(scope.get(&SSR_SERVER_FILENAME)?)),
);

pub static SSR_CLIENT_PATH: Node<PathBuf> = Node::new(
    "ssr_client_path",
    &["output_path", "ssr_client_filename"],
    |scope| Ok(scope.get(&OUTPUT_PATH)?.join(scope.get(&SSR_CLIENT_FILENAME)?)),
);

/// Presence of every optional dependency named on the state.
pub static DEPENDENCIES: Node<BTreeMap<String, bool>> = Node::new(
    "dependencies",
    &["package_json", "module_paths", "optional_dependencies"],
    |scope| {
        let package_json = scope.get(&PACKAGE_JSON)?;
        let module_paths = scope.get(&MODULE_PATHS)?;
        let names = scope.get(&OPTIONAL_DEPENDENCIES)?;
        Ok(names
            .into_iter()
            .map(|name| {
                let present =
                    check_dependency(scope.resolver(), &name, &package_json, &module_paths);
                (name, present)
            })
            .collect())
    },
);

fn present(dependencies: &BTreeMap<String, bool>, names: &[&str]) -> bool {
    names
        .iter()
        .all(|name| dependencies.get(*name).copied().unwrap_or(false))
}

pub static COND_LODASH: Node<bool> = Node::new("cond_lodash", &["dependencies"], |scope| {
    Ok(present(&scope.get(&DEPENDENCIES)?, &["lodash"]))
});

pub static COND_SASS: Node<bool> = Node::new("cond_sass", &["dependencies"], |scope| {
    Ok(present(&scope.get(&DEPENDENCIES)?, &["node-sass", "sass-loader"]))
});

pub static COND_STYLUS: Node<bool> = Node::new("cond_stylus", &["dependencies"], |scope| {
    Ok(present(&scope.get(&DEPENDENCIES)?, &["stylus", "stylus-loader"]))
});

pub static COND_LESS: Node<bool> = Node::new("cond_less", &["dependencies"], |scope| {
    Ok(present(&scope.get(&DEPENDENCIES)?, &["less", "less-loader"]))
});

pub static STATE_IDENTIFIERS: Node<BTreeMap<String, serde_json::Value>> =
    Node::new("state_identifiers", CACHE_KEY.fields, |scope| {
        CACHE_KEY
            .fields
            .iter()
            .map(|field| Ok((field.to_string(), scope.json(*field)?)))
            .collect()
    });

pub static CONFIG_HASH: Node<String> = Node::new("config_hash", &["state_identifiers"], |scope| {
    let hash = CACHE_KEY.digest(&scope.get(&STATE_IDENTIFIERS)?);
    tracing::debug!(subset = CACHE_KEY.name, version = CACHE_KEY.version, %hash, "configuration hash");
    Ok(hash)
});

pub static CACHE_ROOT: Node<PathBuf> = Node::new("cache_root", &["context"], |scope| {
    Ok(scope.get(&CONTEXT)?.join("node_modules/.cache/skein"))
});

pub static CACHE_DIRECTORY: Node<PathBuf> =
    Node::new("cache_directory", &["cache_root", "config_hash"], |scope| {
        Ok(scope.get(&CACHE_ROOT)?.join(scope.get(&CONFIG_HASH)?))
    });

/// Scratch directory the development bundle is emitted into.
pub static DEV_OUTPUT_PATH: Node<PathBuf> =
    Node::new("dev_output_path", &["cache_root"], |scope| {
        Ok(scope.get(&CACHE_ROOT)?.join("dev-server"))
    });

pub static BABEL_PRESET_ENV: Node<PathBuf> =
    Node::new("babel_preset_env", &["module_paths"], |scope| {
        resolve_module(scope.resolver(), "@babel/preset-env", &scope.get(&MODULE_PATHS)?)
    });

pub static BABEL_DYNAMIC_IMPORT: Node<PathBuf> =
    Node::new("babel_dynamic_import", &["module_paths"], |scope| {
        resolve_module(
            scope.resolver(),
            "@babel/plugin-syntax-dynamic-import",
            &scope.get(&MODULE_PATHS)?,
        )
    });

pub static TYPESCRIPT: Node<PathBuf> = Node::new("typescript", &["module_paths"], |scope| {
    resolve_module(scope.resolver(), "typescript", &scope.get(&MODULE_PATHS)?)
});

static HASH_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(chunkhash|contenthash|hash)(:\d+)?\]\.").expect("valid hash placeholder regex")
});

/// Asset file naming under the assets directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLayout {
    pub directory: String,
    pub hashed: bool,
}

impl AssetLayout {
    /// `destination` under the assets directory; hash placeholders are
    /// dropped when hashing is off.
    pub fn path(&self, destination: &str) -> String {
        let joined = format!(
            "{}/{}",
            self.directory.trim_end_matches('/'),
            destination.trim_start_matches('/')
        );
        if self.hashed {
            joined
        } else {
            HASH_PLACEHOLDER.replace_all(&joined, "").into_owned()
        }
    }
}

pub static ASSET_LAYOUT: Node<AssetLayout> = Node::new(
    "asset_layout",
    &["assets_directory", "cond_development"],
    |scope| {
        Ok(AssetLayout {
            directory: scope.get(&ASSETS_DIRECTORY)?,
            hashed: !scope.get(&COND_DEVELOPMENT)?,
        })
    },
);

/// Every node, for name lookups and graph inspection.
pub static REGISTRY: &[&dyn AnyNode] = &[
    &MODE,
    &NODE_ENV,
    &HOST,
    &PORT,
    &CONTEXT,
    &HOME,
    &RAW_OUTPUT_PATH,
    &PUBLIC_PATH,
    &TEMPLATE,
    &STATIC_ASSETS,
    &DEVTOOL,
    &COND_WATCH,
    &COND_INTERACTIVE,
    &LOG_LEVEL,
    &ENTRIES,
    &SSR_CLIENT_FILENAME,
    &SSR_SERVER_FILENAME,
    &EXTENSIONS,
    &MINIFY_OPTIONS,
    &MODULE_PATHS,
    &PACKAGE_JSON,
    &VERSION,
    &ASSETS_DIRECTORY,
    &RENDER_TARGET,
    &POSTCSS_CONFIG,
    &OPTIONAL_DEPENDENCIES,
    &BUNDLER_COMMAND,
    &RENDERER_COMMAND,
    &SOURCE_MAP,
    &COND_DEBUG,
    &COND_PRODUCTION,
    &COND_DEVELOPMENT,
    &COND_START,
    &COND_BUILD,
    &COND_HMR,
    &OUTPUT_PATH,
    &LOADER_TEST,
    &COMPRESSION_TEST,
    &EXTERNALS_WHITELIST,
    &STATS_OPTIONS,
    &SSR_SERVER_PATH,
    &SSR_CLIENT_PATH,
    &DEPENDENCIES,
    &COND_LODASH,
    &COND_SASS,
    &COND_STYLUS,
    &COND_LESS,
    &STATE_IDENTIFIERS,
    &CONFIG_HASH,
    &CACHE_ROOT,
    &CACHE_DIRECTORY,
    &DEV_OUTPUT_PATH,
    &BABEL_PRESET_ENV,
    &BABEL_DYNAMIC_IMPORT,
    &TYPESCRIPT,
    &ASSET_LAYOUT,
];

/// Find a registered node by name.
pub fn lookup(name: &str) -> Result<&'static dyn AnyNode> {
    REGISTRY
        .iter()
        .copied()
        .find(|node| node.name() == name)
        .ok_or_else(|| DeriveError::UnknownNode(name.to_string()))
}
