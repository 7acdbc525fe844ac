//! The analyzer's external interface (spec §6): reads a JSON-encoded AST,
//! drives builder → extractor → composer in order, and writes the product
//! CA (and, if asked, the per-routine local views) as JSON.

mod config;
mod dto;

use tracing_subscriber::EnvFilter;

use config::{parse_args, Config, TraceLevel};
use dto::{CaDto, LocalViewDto};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = parse_args(args)?;
    init_tracing(config.trace_level);

    let source =
        std::fs::read_to_string(&config.input_path).map_err(|e| format!("read {}: {e}", config.input_path))?;
    let program: choreo_ast::Node =
        facet_json::from_str(&source).map_err(|e| format!("decode AST: {e}"))?;

    run_pipeline(&program, &config)
}

fn run_pipeline(program: &choreo_ast::Node, config: &Config) -> Result<(), String> {
    let file = choreo_build::build_file(program, &config.input_path).map_err(|e| format!("build: {e}"))?;
    let views = choreo_extract::extract_local_views(&file, &config.entry).map_err(|e| format!("extract: {e}"))?;
    let ca = choreo_compose::compose(&views, config.pair_cap).map_err(|e| format!("compose: {e}"))?;

    if config.emit_local_views {
        let view_dtos: Vec<LocalViewDto> = views.iter().map(LocalViewDto::from_view).collect();
        let rendered =
            facet_json::to_string_pretty(&view_dtos).map_err(|e| format!("encode local views: {e}"))?;
        println!("{rendered}");
    }

    let ca_dto = CaDto::from_ca(&ca, &views);
    let rendered = facet_json::to_string_pretty(&ca_dto).map_err(|e| format!("encode CA: {e}"))?;
    println!("{rendered}");
    Ok(())
}

fn init_tracing(level: TraceLevel) {
    if level == TraceLevel::None {
        return;
    }
    let filter = EnvFilter::try_new(level.filter_directive()).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
