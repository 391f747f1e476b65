use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use clap::Parser;
use pokegraph::StoreOpener;
use pokegraph::cli::Cli;
use pokegraph::queries::{QueryParams, run_queries};
use pokegraph::writer::{build_graph, load_sources};
use pokegraph_config::{PokegraphConfig, WriteMode};
use pokegraph_store::{GraphStore, SqliteGraphStore};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn workspace_with_sources() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::copy(fixture("pokemon_data.json"), dir.path().join("pokemon_data.json"))
        .expect("copy species fixture");
    fs::copy(fixture("moves.csv"), dir.path().join("moves.csv")).expect("copy moves fixture");
    dir
}

async fn built_store() -> SqliteGraphStore {
    let sources = load_sources(&fixture("pokemon_data.json"), &fixture("moves.csv"))
        .expect("load fixtures");
    let store = SqliteGraphStore::open_in_memory(WriteMode::Create).expect("open store");
    build_graph(&store, &sources.species, &sources.moves)
        .await
        .expect("build graph");
    store
}

/// Hands out fresh in-memory stores and counts how often it was asked.
#[derive(Default)]
struct CountingOpener {
    opens: AtomicUsize,
}

#[async_trait]
impl StoreOpener for CountingOpener {
    async fn open(
        &self,
        _workspace: &Path,
        config: &PokegraphConfig,
    ) -> anyhow::Result<Box<dyn GraphStore>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SqliteGraphStore::open_in_memory(
            config.build.write_mode,
        )?))
    }
}

fn sqlite_cli(workspace: &Path, extra: &[&str]) -> Cli {
    let mut args = vec![
        "pokegraph".to_owned(),
        "--workspace".to_owned(),
        workspace.display().to_string(),
        "--backend".to_owned(),
        "sqlite".to_owned(),
    ];
    args.extend(extra.iter().map(|arg| (*arg).to_owned()));
    Cli::try_parse_from(args).expect("cli should parse")
}

async fn run_cli(workspace: &Path, extra: &[&str]) -> String {
    let mut out = Vec::new();
    pokegraph::run(sqlite_cli(workspace, extra), &mut out)
        .await
        .expect("run should succeed");
    String::from_utf8(out).expect("utf8 output")
}

fn open_workspace_graph(workspace: &Path) -> SqliteGraphStore {
    SqliteGraphStore::open(
        workspace.join(".pokegraph").join("graph.sqlite"),
        WriteMode::Create,
    )
    .expect("reopen workspace graph")
}

#[tokio::test]
async fn every_evolution_reference_becomes_an_edge() {
    let store = built_store().await;

    assert_eq!(store.evolution_targets(1).expect("targets"), vec![2]);
    assert_eq!(store.evolution_targets(2).expect("targets"), vec![3]);
    assert_eq!(store.evolution_targets(25).expect("targets"), vec![26]);
    assert_eq!(store.evolution_targets(147).expect("targets"), vec![148]);
    assert!(store.evolution_targets(3).expect("targets").is_empty());
}

#[tokio::test]
async fn effectiveness_edges_are_the_cross_product_of_type_holders() {
    let store = built_store().await;

    // 2 Ground x 2 Eletric
    assert_eq!(
        store
            .effectiveness_edge_count("Ground", "Eletric")
            .expect("count"),
        4
    );
    // self-pairs included
    assert_eq!(
        store
            .effectiveness_edge_count("Dragon", "Dragon")
            .expect("count"),
        4
    );
    assert_eq!(
        store.effectiveness_edge_count("Ice", "Grass").expect("count"),
        3
    );
    assert_eq!(
        store.effectiveness_edge_count("Fire", "Grass").expect("count"),
        0
    );
}

#[tokio::test]
async fn moves_exist_once_with_a_skill_edge_per_listed_species() {
    let store = built_store().await;

    assert_eq!(store.move_node_count("Dig").expect("count"), 1);
    assert_eq!(store.skill_species("Dig").expect("skills"), vec![27, 50]);
    assert_eq!(
        store.skill_species("Thunder Shock").expect("skills"),
        vec![25, 26]
    );
    assert_eq!(
        store.skill_species("Vine Whip").expect("skills"),
        vec![1, 2, 3]
    );

    let stats = store.stats().await.expect("stats");
    assert_eq!(stats.species_nodes, 10);
    assert_eq!(stats.move_nodes, 4);
    assert_eq!(stats.evolution_edges, 4);
    assert_eq!(stats.skill_edges, 8);
    assert_eq!(stats.effectiveness_edges, 43);
}

#[tokio::test]
async fn queries_answer_against_the_fixture_graph() {
    let store = built_store().await;

    let report = run_queries(&store, &QueryParams::default())
        .await
        .expect("queries");

    let attackers: Vec<&str> = report
        .attackers
        .iter()
        .map(|node| node.name.as_str())
        .collect();
    assert_eq!(attackers, vec!["Sandshrew"]);
    assert_eq!(report.attackers[0].types, vec!["Ground".to_owned()]);

    let tally = report.defender_type.expect("ice attacker has edges");
    assert_eq!(tally.type_name, "Ground");
    assert_eq!(tally.count, 4);

    assert_eq!(report.weight_doubling_evolutions, 3);
}

#[tokio::test]
async fn bare_run_builds_and_prints_query_results() {
    let workspace = workspace_with_sources();

    let output = run_cli(workspace.path(), &[]).await;

    assert!(workspace.path().join(".pokegraph/config.toml").exists());
    assert!(output.contains("<Record p1=(:Pokemon {id: 27, name: \"Sandshrew\""));
    assert!(!output.contains("\"Diglett\""));
    assert!(output.contains("<Record type=\"Ground\" count=4>"));
    assert!(output.contains("<Record count(p2)=3>"));
    assert!(output.lines().all(|line| line.starts_with("<Record ")));
}

#[tokio::test]
async fn create_mode_rerun_duplicates_nodes() {
    let workspace = workspace_with_sources();

    run_cli(workspace.path(), &["build"]).await;
    run_cli(workspace.path(), &["build"]).await;

    let store = open_workspace_graph(workspace.path());
    assert_eq!(store.species_node_count(25).expect("count"), 2);
    assert_eq!(store.move_node_count("Dig").expect("count"), 2);
}

#[tokio::test]
async fn merge_mode_rerun_leaves_graph_unchanged() {
    let workspace = workspace_with_sources();

    run_cli(workspace.path(), &["build", "--write-mode", "merge"]).await;
    run_cli(workspace.path(), &["build", "--write-mode", "merge"]).await;

    let store = open_workspace_graph(workspace.path());
    assert_eq!(store.species_node_count(25).expect("count"), 1);
    assert_eq!(store.move_node_count("Dig").expect("count"), 1);

    let stats = store.stats().await.expect("stats");
    assert_eq!(stats.evolution_edges, 4);
    assert_eq!(stats.skill_edges, 8);
    assert_eq!(stats.effectiveness_edges, 43);
}

#[tokio::test]
async fn query_json_output_after_build() {
    let workspace = workspace_with_sources();
    run_cli(workspace.path(), &["build"]).await;

    let output = run_cli(workspace.path(), &["query", "--output", "json"]).await;

    let rows: Vec<serde_json::Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["row"]["p1"]["name"], "Sandshrew");
    assert_eq!(rows[1]["row"]["type"], "Ground");
    assert_eq!(rows[2]["row"]["count"], 3);
}

#[tokio::test]
async fn missing_source_file_fails_before_writing() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut out = Vec::new();
    let err = pokegraph::run(sqlite_cli(workspace.path(), &["build"]), &mut out)
        .await
        .expect_err("missing sources should fail");

    assert!(format!("{err:#}").contains("pokemon_data.json"));
    assert!(!workspace.path().join(".pokegraph/graph.sqlite").exists());
}

#[tokio::test]
async fn run_builds_and_queries_through_one_store() {
    let workspace = workspace_with_sources();
    let opener = CountingOpener::default();

    let mut out = Vec::new();
    pokegraph::run_with(sqlite_cli(workspace.path(), &["run"]), &opener, &mut out)
        .await
        .expect("run should succeed");

    assert_eq!(opener.opens.load(Ordering::SeqCst), 1);
    // the in-memory store only holds data if the query saw the build's store
    let output = String::from_utf8(out).expect("utf8 output");
    assert!(output.contains("name: \"Sandshrew\""));
    assert!(output.contains("<Record count(p2)=3>"));
}

#[tokio::test]
async fn query_does_not_write_workspace_config() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let opener = CountingOpener::default();

    let mut out = Vec::new();
    pokegraph::run_with(sqlite_cli(workspace.path(), &["query"]), &opener, &mut out)
        .await
        .expect("query should succeed");

    assert_eq!(opener.opens.load(Ordering::SeqCst), 1);
    assert!(!workspace.path().join(".pokegraph").exists());
    assert_eq!(
        String::from_utf8(out).expect("utf8 output"),
        "<Record count(p2)=0>\n"
    );
}
