//! Assembly against on-disk project fixtures.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use skein_bundler::cache::{self, BuildCacheOptions};
use skein_bundler::config::{LoaderChain, RuleTest, Target};
use skein_bundler::{Assembly, BundlerConfig, Variant, assemble};
use skein_config::graph::selectors::{COND_HMR, DEV_OUTPUT_PATH};
use skein_config::{Derivations, Environment, Loader, LogLevel, Mode, Options};
use tempfile::TempDir;

const TOOL_MODULES: [&str; 3] = [
    "typescript",
    "@babel/preset-env",
    "@babel/plugin-syntax-dynamic-import",
];

struct Fixture {
    _temp: TempDir,
    project: PathBuf,
    home: PathBuf,
}

impl Fixture {
    fn new(manifest: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("app");
        let home = temp.path().join("tool");
        fs::create_dir_all(project.join("src")).unwrap();
        fs::create_dir_all(project.join("node_modules")).unwrap();
        fs::create_dir_all(home.join("entries")).unwrap();
        fs::create_dir_all(home.join("node_modules")).unwrap();
        fs::write(project.join("package.json"), manifest).unwrap();
        fs::write(home.join("index.mustache"), "<!--vue-ssr-outlet-->").unwrap();
        for module in TOOL_MODULES {
            install(&home.join("node_modules"), module);
        }

        Fixture {
            project: fs::canonicalize(project).unwrap(),
            home: fs::canonicalize(home).unwrap(),
            _temp: temp,
        }
    }

    fn modules(&self) -> PathBuf {
        self.project.join("node_modules")
    }

    async fn derivations(&self, env: &str, options: Options) -> Derivations {
        let loader = Loader::new(
            &self.project,
            &self.home,
            Environment {
                env: env.to_string(),
                ..Environment::default()
            },
        );
        Derivations::new(loader.load(&options).await.unwrap())
    }
}

fn install(modules: &Path, name: &str) {
    let dir = modules.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("package.json"),
        format!(r#"{{"name":"{name}","main":"index.js"}}"#),
    )
    .unwrap();
    fs::write(dir.join("index.js"), "module.exports = {};").unwrap();
}

const APP: &str = r#"{
    "name": "app",
    "version": "1.0.0",
    "dependencies": {
        "vue": "^2.5.0",
        "normalize.css": "^8.0.0",
        "@babel/polyfill": "^7.0.0"
    }
}"#;

fn production(assembly: Assembly) -> (BundlerConfig, BundlerConfig) {
    match assembly {
        Assembly::Production { server, client } => (server, client),
        Assembly::Development(_) => panic!("expected a production assembly"),
    }
}

fn define_env(config: &BundlerConfig, key: &str) -> serde_json::Value {
    config.plugin("define").unwrap().options["process.env"][key].clone()
}

#[tokio::test]
async fn assembling_twice_is_deep_equal() {
    let f = Fixture::new(APP);
    let d = f.derivations("development", Options::new(Mode::Start)).await;

    let first = assemble(&d).unwrap();
    let second = assemble(&d).unwrap();
    assert_eq!(first, second);

    let fresh = f.derivations("development", Options::new(Mode::Start)).await;
    assert_eq!(first, assemble(&fresh).unwrap());
}

#[tokio::test]
async fn start_in_development_watch_is_the_hot_reload_variant() {
    let f = Fixture::new(APP);
    let d = f.derivations("development", Options::new(Mode::Start)).await;
    assert!(d.get(&COND_HMR).unwrap());

    let assembly = assemble(&d).unwrap();
    assert!(!assembly.is_production());
    let configs = assembly.configs();
    assert_eq!(configs.len(), 1);
    let config = configs[0];

    assert_eq!(config.name, Variant::Development);
    assert_eq!(config.target, Target::Web);
    assert_eq!(
        config.entry["main"],
        vec![
            f.home.join("entries/hot-middleware.ts"),
            f.project.join("src/entry-client.ts"),
        ]
    );
    assert_eq!(config.output.path, Some(d.get(&DEV_OUTPUT_PATH).unwrap()));
    assert_eq!(config.output.filename, "assets/js/[name].js");
    for plugin in ["hot-module-replacement", "named-modules", "no-emit-on-errors", "html"] {
        assert!(config.has_plugin(plugin), "missing {plugin}");
    }
    assert!(!config.has_plugin("clean"));
    assert!(!config.has_plugin("progress-bar"));
    assert_eq!(define_env(config, "NODE_ENV"), json!("\"development\""));
}

#[tokio::test]
async fn hot_reload_plugins_need_watch() {
    let f = Fixture::new(APP);
    let mut options = Options::new(Mode::Start);
    options.watch = Some(false);
    let d = f.derivations("development", options).await;

    let assembly = assemble(&d).unwrap();
    let config = assembly.configs()[0];
    assert!(!config.has_plugin("hot-module-replacement"));
    assert!(config.has_plugin("html"));
}

#[tokio::test]
async fn build_produces_server_and_client() {
    let f = Fixture::new(APP);
    let d = f.derivations("production", Options::new(Mode::Build)).await;

    let assembly = assemble(&d).unwrap();
    assert!(assembly.is_production());
    assert_eq!(assembly.configs().len(), 2);
    let (server, client) = production(assembly);

    assert_eq!(server.name, Variant::Server);
    assert_eq!(server.target, Target::Node);
    assert_eq!(server.devtool.as_deref(), Some("source-map"));
    assert_eq!(server.output.library_target.as_deref(), Some("commonjs2"));
    assert!(server.has_plugin("ssr-server-manifest"));
    assert_eq!(define_env(&server, "VUE_ENV"), json!("\"server\""));

    assert_eq!(client.name, Variant::Client);
    assert_eq!(client.target, Target::Web);
    assert!(client.externals.is_none());
    assert!(client.has_plugin("compression"));
    assert!(client.has_plugin("js-minifier"));
    assert!(client.has_plugin("css-minifier"));
    assert!(client.has_plugin("ssr-client-manifest"));
    assert_eq!(define_env(&client, "VUE_ENV"), json!("\"client\""));
    assert_eq!(define_env(&client, "NODE_ENV"), json!("\"production\""));

    let output = f.project.join("build");
    assert_eq!(client.output.path, Some(output.clone()));
    assert_eq!(client.output.filename, "assets/js/[name].[chunkhash].js");
    let copy = &client.plugin("copy").unwrap().options;
    assert_eq!(copy[0]["from"], "static");
    assert_eq!(copy[0]["to"], json!(output));

    let compression = &client.plugin("compression").unwrap().options;
    assert_eq!(compression["asset"], "[path].gz[query]");
    assert_eq!(compression["threshold"], 10240);
    assert_eq!(compression["minRatio"], 0.8);

    let chunks: Vec<_> = client
        .plugins
        .iter()
        .filter(|p| p.name == "commons-chunk")
        .map(|p| p.options["name"].clone())
        .collect();
    assert_eq!(chunks, vec![json!("vendor"), json!("manifest"), json!("main")]);
}

#[tokio::test]
async fn base_plugins_come_before_variant_plugins() {
    let f = Fixture::new(APP);
    let d = f.derivations("production", Options::new(Mode::Build)).await;
    let (_, client) = production(assemble(&d).unwrap());

    let names: Vec<_> = client.plugins.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        &names[..5],
        [
            "clean",
            "extract-css",
            "hashed-module-ids",
            "module-concatenation",
            "type-checker",
        ]
    );
    assert_eq!(names[5], "define");
}

#[tokio::test]
async fn server_externals_respect_the_whitelist() {
    let f = Fixture::new(APP);
    let d = f.derivations("production", Options::new(Mode::Build)).await;
    let (server, _) = production(assemble(&d).unwrap());

    let externals = server.externals.as_ref().unwrap();
    assert_eq!(externals.modules_dir, f.modules());
    assert!(externals.is_external("vue"));
    assert!(externals.is_external("vue/dist/vue.runtime.common.js"));
    assert!(!externals.is_external("normalize.css"));
    assert!(!externals.is_external("@babel/polyfill"));
    assert!(!externals.is_external("lodash"));
}

#[tokio::test]
async fn static_assets_can_be_disabled() {
    let f = Fixture::new(APP);
    let mut options = Options::new(Mode::Build);
    options.static_assets = Some("false".into());
    let d = f.derivations("production", options).await;

    let (_, client) = production(assemble(&d).unwrap());
    assert!(!client.has_plugin("copy"));
}

fn style_rule<'a>(config: &'a BundlerConfig, file: &str) -> Option<&'a LoaderChain> {
    config
        .module
        .rules
        .iter()
        .find(|rule| matches!(rule.test, RuleTest::Pattern(_)) && rule.test.matches(file) && rule.use_.is_some())
        .and_then(|rule| rule.use_.as_ref())
}

#[tokio::test]
async fn less_rules_follow_installed_loaders() {
    let f = Fixture::new(
        r#"{"name":"app","devDependencies":{"less":"^3.0.0","less-loader":"^4.0.0"}}"#,
    );
    install(&f.modules(), "less");
    install(&f.modules(), "less-loader");

    let d = f.derivations("development", Options::new(Mode::Start)).await;
    let config = assemble(&d).unwrap().into_configs().remove(0);
    let chain = style_rule(&config, "theme.less").unwrap();
    assert_eq!(
        chain.names(),
        vec!["vue-style-loader", "css-loader", "postcss-loader", "less-loader"]
    );
    assert!(style_rule(&config, "theme.scss").is_none());

    fs::remove_dir_all(f.modules().join("less-loader")).unwrap();
    let d = f.derivations("development", Options::new(Mode::Start)).await;
    let config = assemble(&d).unwrap().into_configs().remove(0);
    assert!(style_rule(&config, "theme.less").is_none());
}

#[tokio::test]
async fn production_styles_are_extracted() {
    let f = Fixture::new(APP);
    let d = f.derivations("production", Options::new(Mode::Build)).await;
    let (_, client) = production(assemble(&d).unwrap());

    match style_rule(&client, "app.css").unwrap() {
        LoaderChain::Extract { extract } => assert_eq!(extract.fallback, "vue-style-loader"),
        other => panic!("expected extraction, got {other:?}"),
    }
}

#[tokio::test]
async fn scripts_are_limited_to_project_sources_and_entries() {
    let f = Fixture::new(APP);
    let d = f.derivations("development", Options::new(Mode::Start)).await;
    let config = assemble(&d).unwrap().into_configs().remove(0);

    let rule = config
        .module
        .rules
        .iter()
        .find(|rule| rule.test.matches("main.ts") && rule.use_.is_some())
        .unwrap();
    assert_eq!(
        rule.include,
        Some(vec![f.project.join("src"), f.home.join("entries")])
    );
    let names = rule.use_.as_ref().unwrap().names();
    assert_eq!(names, vec!["thread-loader", "ts-loader"]);
}

#[tokio::test]
async fn watch_without_debug_adds_the_build_cache() {
    let f = Fixture::new(APP);
    let d = f.derivations("development", Options::new(Mode::Start)).await;
    let config = assemble(&d).unwrap().into_configs().remove(0);

    let options = BuildCacheOptions::from_config(&config).unwrap();
    assert!(options.cache_directory.starts_with(f.modules().join(".cache/skein")));

    cache::prepare_all([&config]).await.unwrap();
    assert!(options.records_path.exists());

    let mut debug = Options::new(Mode::Start);
    debug.log_level = LogLevel::Debug;
    let d = f.derivations("development", debug).await;
    let config = assemble(&d).unwrap().into_configs().remove(0);
    assert!(BuildCacheOptions::from_config(&config).is_none());
}

#[tokio::test]
async fn configurations_serialize_for_the_bundler() {
    let f = Fixture::new(APP);
    let d = f.derivations("production", Options::new(Mode::Build)).await;
    let configs = assemble(&d).unwrap().into_configs();

    let json = serde_json::to_value(&configs).unwrap();
    assert_eq!(json[0]["name"], "server");
    assert_eq!(json[0]["output"]["libraryTarget"], "commonjs2");
    assert_eq!(json[1]["name"], "client");
    assert_eq!(json[1]["watchOptions"]["aggregateTimeout"], 300);
    assert_eq!(json[1]["module"]["noParse"]["source"], r"(es6-promise\.js)");

    let back: Vec<BundlerConfig> = serde_json::from_value(json).unwrap();
    assert_eq!(back, configs);
}
