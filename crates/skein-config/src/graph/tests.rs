use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::selectors::*;
use super::*;
use crate::resolve::testing::FixedResolver;
use crate::state::{Entries, Extensions, LogLevel, MinifyOptions, Mode, RenderTarget};

fn state() -> State {
    let context = PathBuf::from("/work/app");
    let home = PathBuf::from("/opt/skein");
    let mut package_json = PackageJson::default();
    for dep in ["vue", "less", "less-loader", "lodash"] {
        package_json.dependencies.insert(dep.into(), "*".into());
    }

    State {
        mode: Mode::Start,
        node_env: "development".into(),
        host: "127.0.0.1".into(),
        port: 8000,
        output_path: PathBuf::from("build"),
        output_public_path: "/".into(),
        index_template: home.join("index.mustache"),
        static_assets: Some("static".into()),
        devtool: "cheap-module-eval-source-map".into(),
        watch: true,
        interactive: false,
        log_level: LogLevel::Warn,
        entries: Entries {
            client: context.join("src/entry-client.ts"),
            server: context.join("src/entry-server.ts"),
            polyfill: home.join("entries/polyfill.ts"),
            hot_middleware: home.join("entries/hot-middleware.ts"),
        },
        ssr_client_filename: ".ssr/ssr-client-manifest.json".into(),
        ssr_server_filename: ".ssr/ssr-server-bundle.json".into(),
        extensions: Extensions::default(),
        minify_options: MinifyOptions::default(),
        module_paths: vec![context.join("node_modules")],
        package_json,
        version: "0.4.1".into(),
        assets_directory: "assets".into(),
        render_target: RenderTarget::Client,
        postcss_config: home.join("postcss.config.js"),
        optional_dependencies: vec!["lodash".into(), "less".into(), "less-loader".into()],
        bundler_command: vec!["node".into(), "compile.js".into()],
        renderer_command: vec!["node".into(), "render.js".into()],
        context,
        home,
    }
}

fn derivations(state: State, installed: &[&str]) -> Derivations {
    Derivations::with_resolver(state, Arc::new(FixedResolver::with(installed)))
}

#[test]
fn registry_is_acyclic_with_known_inputs() {
    let graph = DependencyGraph::from_registry().unwrap();
    let order = graph.topological_order().unwrap();
    assert_eq!(order.len(), REGISTRY.len());

    let position = |name| order.iter().position(|n| *n == name).unwrap();
    assert!(position("context") < position("output_path"));
    assert!(position("dependencies") < position("cond_less"));
    assert!(position("state_identifiers") < position("config_hash"));
}

#[test]
fn registry_names_are_unique() {
    let mut names: Vec<_> = REGISTRY.iter().map(|n| n.name()).collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), REGISTRY.len());
}

#[test]
fn dependents_follow_edges() {
    let graph = DependencyGraph::from_registry().unwrap();
    let dependents = graph.dependents_of("node_env").unwrap();
    assert!(dependents.contains(&"cond_production"));
    assert!(dependents.contains(&"cond_hmr"));
    assert!(dependents.contains(&"config_hash"));
    assert!(!dependents.contains(&"port"));

    let ancestors = graph.ancestors_of("cond_less").unwrap();
    assert!(ancestors.contains(&"package_json"));
    assert!(ancestors.contains(&"optional_dependencies"));
}

#[test]
fn devtool_false_is_none() {
    let mut s = state();
    s.devtool = "false".into();
    assert_eq!(derivations(s, &[]).get(&DEVTOOL).unwrap(), None);

    let d = derivations(state(), &[]);
    assert_eq!(
        d.get(&DEVTOOL).unwrap().as_deref(),
        Some("cheap-module-eval-source-map")
    );
}

#[test]
fn output_path_is_absolute_and_clean() {
    let mut s = state();
    s.output_path = PathBuf::from("./dist/../build/");
    let d = derivations(s, &[]);
    assert_eq!(d.get(&OUTPUT_PATH).unwrap(), Path::new("/work/app/build"));
    assert_eq!(
        d.get(&SSR_SERVER_PATH).unwrap(),
        Path::new("/work/app/build/.ssr/ssr-server-bundle.json")
    );
}

#[test]
fn environment_cross_product() {
    let d = derivations(state(), &[]);
    assert!(d.get(&COND_DEVELOPMENT).unwrap());
    assert!(d.get(&COND_HMR).unwrap());
    assert!(d.get(&COND_START).unwrap());
    assert!(!d.get(&COND_BUILD).unwrap());

    let mut s = state();
    s.mode = Mode::Build;
    s.node_env = "production".into();
    s.watch = false;
    let d = derivations(s, &[]);
    assert!(d.get(&COND_PRODUCTION).unwrap());
    assert!(d.get(&COND_BUILD).unwrap());
    assert!(!d.get(&COND_HMR).unwrap());
}

#[test]
fn conditional_dependencies_need_declaration_and_resolution() {
    let d = derivations(state(), &["less", "less-loader", "stylus", "stylus-loader"]);
    assert!(d.get(&COND_LESS).unwrap());
    // installed but not declared
    assert!(!d.get(&COND_STYLUS).unwrap());
    // declared but not installed
    assert!(!d.get(&COND_LODASH).unwrap());
    // not in the optional list at all
    assert!(!d.get(&COND_SASS).unwrap());

    let d = derivations(state(), &["less"]);
    assert!(!d.get(&COND_LESS).unwrap());
    assert!(!d.conditional_dependency("less-loader").unwrap());
    assert!(d.conditional_dependency("less").unwrap());
}

#[test]
fn loader_tests_cover_each_category() {
    let d = derivations(state(), &[]);
    let tests = d.get(&LOADER_TEST).unwrap();
    assert!(tests.image.is_match("logo.PNG"));
    assert!(tests.image.is_match("logo.svg?inline"));
    assert!(!tests.image.is_match("font.woff"));
    assert!(tests.font.is_match("font.woff2"));
    assert!(tests.media.is_match("clip.mp4?t=3"));

    let compression = d.get(&COMPRESSION_TEST).unwrap();
    assert!(compression.is_match("main.js"));
    assert!(compression.is_match("main.css?v=1"));
    assert!(!compression.is_match("main.html"));
}

#[test]
fn externals_whitelist_keeps_sources_and_polyfill() {
    let d = derivations(state(), &[]);
    let allow = d.get(&EXTERNALS_WHITELIST).unwrap();
    let allowed = |request: &str| allow.iter().any(|a| a.matches(request));
    assert!(allowed("@babel/polyfill"));
    assert!(allowed("normalize.css"));
    assert!(allowed("some-lib/Button.vue"));
    assert!(!allowed("vue"));
    assert!(!allowed("lodash/merge"));
    // the whitelist pattern has no query suffix
    assert!(!allowed("styles.css?module"));
}

#[test]
fn config_hash_is_stable_and_sensitive() {
    let a = derivations(state(), &[]).get(&CONFIG_HASH).unwrap();
    let b = derivations(state(), &[]).get(&CONFIG_HASH).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);

    let mut s = state();
    s.assets_directory = "static-assets".into();
    assert_ne!(derivations(s, &[]).get(&CONFIG_HASH).unwrap(), a);

    let c = derivations(state(), &["lodash"]).get(&CONFIG_HASH).unwrap();
    assert_ne!(c, a);
}

#[test]
fn config_hash_ignores_fields_outside_the_subset() {
    let a = derivations(state(), &[]).get(&CONFIG_HASH).unwrap();
    let mut s = state();
    s.port = 9999;
    s.host = "0.0.0.0".into();
    assert_eq!(derivations(s, &[]).get(&CONFIG_HASH).unwrap(), a);
}

#[test]
fn memoized_within_a_context() {
    let d = derivations(state(), &["less", "less-loader"]);
    d.get(&COND_LESS).unwrap();
    d.get(&COND_LESS).unwrap();
    d.get(&CONFIG_HASH).unwrap();
    assert_eq!(d.computations("dependencies"), 1);
    assert_eq!(d.computations("cond_less"), 1);
}

#[test]
fn fork_reuses_entries_with_unchanged_inputs() {
    let d = derivations(state(), &["less", "less-loader"]);
    d.get(&COND_LESS).unwrap();
    d.get(&LOADER_TEST).unwrap();
    let client_hash = d.get(&CONFIG_HASH).unwrap();

    let server = d.fork(d.state().with_render_target(RenderTarget::Server));
    assert!(server.get(&COND_LESS).unwrap());
    server.get(&LOADER_TEST).unwrap();
    let server_hash = server.get(&CONFIG_HASH).unwrap();

    assert_eq!(server.computations("dependencies"), 0);
    assert_eq!(server.computations("loader_test"), 0);
    assert_eq!(server.computations("state_identifiers"), 1);
    assert_ne!(client_hash, server_hash);
}

#[test]
fn undeclared_reads_are_rejected() {
    static SNEAKY: Node<bool> = Node::new("sneaky", &["mode"], |scope| scope.get(&COND_WATCH));
    let d = derivations(state(), &[]);
    let err = d.get(&SNEAKY).unwrap_err();
    assert!(matches!(
        err,
        DeriveError::UndeclaredDependency {
            node: "sneaky",
            dependency: "cond_watch"
        }
    ));
}

#[test]
fn derived_nodes_cannot_read_state() {
    static PEEK: Node<u16> = Node::new("peek", &["mode"], |scope| Ok(scope.state()?.port));
    let d = derivations(state(), &[]);
    assert!(matches!(d.get(&PEEK), Err(DeriveError::StateAccess("peek"))));
}

#[test]
fn unresolvable_tool_module_fails_fast() {
    let d = derivations(state(), &[]);
    let err = d.get(&TYPESCRIPT).unwrap_err();
    assert!(err.to_string().contains("'typescript'"));

    let d = derivations(state(), &["typescript"]);
    assert_eq!(
        d.get(&TYPESCRIPT).unwrap(),
        Path::new("/work/app/node_modules/typescript/index.js")
    );
}

#[test]
fn asset_layout_strips_hashes_in_development() {
    let d = derivations(state(), &[]);
    let layout = d.get(&ASSET_LAYOUT).unwrap();
    assert_eq!(layout.path("js/[name].[chunkhash:8].js"), "assets/js/[name].js");

    let mut s = state();
    s.node_env = "production".into();
    let layout = derivations(s, &[]).get(&ASSET_LAYOUT).unwrap();
    assert_eq!(
        layout.path("js/[name].[chunkhash:8].js"),
        "assets/js/[name].[chunkhash:8].js"
    );
}
