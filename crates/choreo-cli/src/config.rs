//! Hand-rolled argv parsing (spec §6/SPEC_FULL §D) — a `while i < args.len()`
//! flag loop in the style of `peeps-cli`'s `run_cut`/`run_sql`, not a
//! declarative CLI framework: three flags and a positional path don't earn
//! one.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceLevel {
    None,
    Basic,
    Extended,
}

impl TraceLevel {
    pub fn filter_directive(self) -> &'static str {
        match self {
            TraceLevel::None => "off",
            TraceLevel::Basic => "info",
            TraceLevel::Extended => "debug",
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub entry: String,
    pub trace_level: TraceLevel,
    pub pair_cap: Option<usize>,
    pub emit_local_views: bool,
    pub input_path: String,
}

pub fn parse_args(args: Vec<String>) -> Result<Config, String> {
    let mut entry = "main".to_string();
    let mut trace_level = TraceLevel::None;
    let mut pair_cap = None;
    let mut emit_local_views = false;
    let mut positional: Option<String> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--entry" => {
                i += 1;
                entry = args
                    .get(i)
                    .ok_or_else(|| "missing value for --entry".to_string())?
                    .clone();
            }
            "--trace-level" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "missing value for --trace-level".to_string())?;
                trace_level = match value.as_str() {
                    "none" => TraceLevel::None,
                    "basic" => TraceLevel::Basic,
                    "extended" => TraceLevel::Extended,
                    other => return Err(format!("invalid --trace-level: {other}\n\n{}", usage())),
                };
            }
            "--pair-cap" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "missing value for --pair-cap".to_string())?;
                pair_cap = Some(
                    value
                        .parse::<usize>()
                        .map_err(|e| format!("invalid --pair-cap: {e}"))?,
                );
            }
            "--emit-local-views" => emit_local_views = true,
            "--help" | "-h" => return Err(usage()),
            other if other.starts_with("--") => {
                return Err(format!("unknown flag: {other}\n\n{}", usage()));
            }
            other => {
                if positional.is_some() {
                    return Err(format!("unexpected extra positional argument: {other}"));
                }
                positional = Some(other.to_string());
            }
        }
        i += 1;
    }

    let input_path = positional.ok_or_else(|| format!("missing input AST path\n\n{}", usage()))?;
    Ok(Config {
        entry,
        trace_level,
        pair_cap,
        emit_local_views,
        input_path,
    })
}

pub fn usage() -> String {
    "choreo [--entry NAME] [--trace-level none|basic|extended] [--pair-cap N] \
     [--emit-local-views] <ast.json>\n\ndefaults:\n  --entry main\n  --trace-level none\n  \
     --pair-cap unbounded"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_with_only_a_positional_path() {
        let cfg = parse_args(args(&["ast.json"])).unwrap();
        assert_eq!(cfg.entry, "main");
        assert_eq!(cfg.trace_level, TraceLevel::None);
        assert_eq!(cfg.pair_cap, None);
        assert!(!cfg.emit_local_views);
        assert_eq!(cfg.input_path, "ast.json");
    }

    #[test]
    fn all_flags_are_parsed() {
        let cfg = parse_args(args(&[
            "--entry",
            "run",
            "--trace-level",
            "extended",
            "--pair-cap",
            "500",
            "--emit-local-views",
            "ast.json",
        ]))
        .unwrap();
        assert_eq!(cfg.entry, "run");
        assert_eq!(cfg.trace_level, TraceLevel::Extended);
        assert_eq!(cfg.pair_cap, Some(500));
        assert!(cfg.emit_local_views);
    }

    #[test]
    fn missing_positional_path_fails() {
        assert!(parse_args(args(&["--entry", "run"])).is_err());
    }

    #[test]
    fn invalid_trace_level_fails() {
        assert!(parse_args(args(&["--trace-level", "loud", "ast.json"])).is_err());
    }

    #[test]
    fn unknown_flag_fails() {
        assert!(parse_args(args(&["--bogus", "ast.json"])).is_err());
    }

    #[test]
    fn second_positional_argument_fails() {
        assert!(parse_args(args(&["ast.json", "extra.json"])).is_err());
    }
}
