use crate::attach::{compute_view, DiagramView};
use crate::config::load_layout_config;
use crate::engine::DagreEngine;
use crate::graph::Graph;
use crate::routing::{EdgeRouter, NoLiveAnchors, RoutedEdge, Scene};
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "edgeloom", version, about = "Diagram layout and edge routing engine")]
pub struct Args {
    /// Input graph file (JSON/JSON5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Layout config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Pretty-print the output document
    #[arg(long = "pretty")]
    pub pretty: bool,
}

/// Everything a renderer needs for one frame: the planned view plus
/// ready-to-draw geometry for every routable edge.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputDocument {
    view: DiagramView,
    routes: Vec<RoutedEdge>,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let config = load_layout_config(args.config.as_deref())?;
    let input = read_input(args.input.as_deref())?;
    let graph = parse_graph(&input)?;

    let view = futures::executor::block_on(compute_view(&graph, &config, &DagreEngine))?;

    let scene = Scene::from_view(&view);
    let mut router = EdgeRouter::new(&scene);
    let routes: Vec<RoutedEdge> = view
        .edges
        .iter()
        .filter_map(|edge| router.route(edge, &NoLiveAnchors))
        .collect();

    let document = OutputDocument { view, routes };
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    write_output(&rendered, args.output.as_deref())?;
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        return Ok(contents);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

/// Strict JSON first, then JSON5 for hand-written files.
fn parse_graph(input: &str) -> Result<Graph> {
    if let Ok(graph) = serde_json::from_str::<Graph>(input) {
        return Ok(graph);
    }
    json5::from_str::<Graph>(input).context("input is not a valid graph document")
}

fn write_output(contents: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, contents)?;
        }
        None => {
            println!("{}", contents);
        }
    }
    Ok(())
}
