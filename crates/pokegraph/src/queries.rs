use std::io::Write;

use anyhow::{Context, Result};
use pokegraph_store::{GraphStore, SpeciesNode, TypeTally};
use serde_json::json;

pub const DEFAULT_TARGET_NAME: &str = "Pikachu";
pub const DEFAULT_MIN_WEIGHT_KG: f64 = 10.0;
pub const DEFAULT_ATTACKING_TYPE: &str = "Ice";

pub const EFFECTIVE_ATTACKERS: &str = "effective_attackers_by_weight";
pub const MOST_COMMON_DEFENDER_TYPE: &str = "most_common_defender_type";
pub const WEIGHT_DOUBLING_EVOLUTIONS: &str = "weight_doubling_evolutions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid output format '{other}', expected one of: text, json"
            )),
        }
    }
}

/// Inputs of the three fixed queries.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub target_name: String,
    pub min_weight_kg: f64,
    pub attacking_type: String,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            target_name: DEFAULT_TARGET_NAME.to_owned(),
            min_weight_kg: DEFAULT_MIN_WEIGHT_KG,
            attacking_type: DEFAULT_ATTACKING_TYPE.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryReport {
    pub attackers: Vec<SpeciesNode>,
    pub defender_type: Option<TypeTally>,
    pub weight_doubling_evolutions: i64,
}

/// Runs the three queries in order against a fully built graph.
pub async fn run_queries(store: &dyn GraphStore, params: &QueryParams) -> Result<QueryReport> {
    store
        .validate_weights()
        .await
        .context("species weights do not match the '<number> kg' format")?;

    tracing::info!(
        query = EFFECTIVE_ATTACKERS,
        target = %params.target_name,
        min_weight_kg = params.min_weight_kg,
        "running query"
    );
    let attackers = store
        .effective_attackers_by_weight(&params.target_name, params.min_weight_kg)
        .await
        .with_context(|| format!("{EFFECTIVE_ATTACKERS} query failed"))?;
    tracing::info!(
        query = MOST_COMMON_DEFENDER_TYPE,
        attacking_type = %params.attacking_type,
        "running query"
    );
    let defender_type = store
        .most_common_defender_type(&params.attacking_type)
        .await
        .with_context(|| format!("{MOST_COMMON_DEFENDER_TYPE} query failed"))?;
    tracing::info!(query = WEIGHT_DOUBLING_EVOLUTIONS, "running query");
    let weight_doubling_evolutions = store
        .count_weight_doubling_evolutions()
        .await
        .with_context(|| format!("{WEIGHT_DOUBLING_EVOLUTIONS} query failed"))?;

    tracing::info!(
        attackers = attackers.len(),
        defender_type = defender_type.as_ref().map(|tally| tally.type_name.as_str()),
        weight_doubling_evolutions,
        "queries finished"
    );

    Ok(QueryReport {
        attackers,
        defender_type,
        weight_doubling_evolutions,
    })
}

/// Writes one line per result row; nothing else goes to `out`.
pub fn write_report(
    report: &QueryReport,
    format: OutputFormat,
    out: &mut dyn Write,
) -> std::io::Result<()> {
    match format {
        OutputFormat::Text => write_text_report(report, out),
        OutputFormat::Json => write_json_report(report, out),
    }
}

fn write_text_report(report: &QueryReport, out: &mut dyn Write) -> std::io::Result<()> {
    for attacker in &report.attackers {
        writeln!(out, "<Record p1={}>", render_species(attacker))?;
    }
    if let Some(tally) = &report.defender_type {
        writeln!(
            out,
            "<Record type={:?} count={}>",
            tally.type_name, tally.count
        )?;
    }
    writeln!(
        out,
        "<Record count(p2)={}>",
        report.weight_doubling_evolutions
    )
}

fn write_json_report(report: &QueryReport, out: &mut dyn Write) -> std::io::Result<()> {
    for attacker in &report.attackers {
        write_json_line(out, EFFECTIVE_ATTACKERS, json!({ "p1": attacker }))?;
    }
    if let Some(tally) = &report.defender_type {
        write_json_line(out, MOST_COMMON_DEFENDER_TYPE, json!(tally))?;
    }
    write_json_line(
        out,
        WEIGHT_DOUBLING_EVOLUTIONS,
        json!({ "count": report.weight_doubling_evolutions }),
    )
}

fn write_json_line(
    out: &mut dyn Write,
    query: &str,
    row: serde_json::Value,
) -> std::io::Result<()> {
    let line = json!({ "query": query, "row": row });
    serde_json::to_writer(&mut *out, &line)?;
    writeln!(out)
}

fn render_species(node: &SpeciesNode) -> String {
    format!(
        "(:Pokemon {{id: {}, name: {:?}, url: {:?}, height: {:?}, weight: {:?}, types: {:?}}})",
        node.id, node.name, node.url, node.height, node.weight, node.types
    )
}
