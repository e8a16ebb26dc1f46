use std::path::Path;

use choicehistory_core::ddm::{parse_results, write_wide};
use choicehistory_core::{
    ModelScore, Result, build_model, model_tags, relative_to_baseline, results_long_to_wide,
};

use super::cell;

pub struct ModelsCommandConfig<'a> {
    pub show: Option<&'a str>,
    pub results: Option<&'a str>,
    pub scores: Option<&'a str>,
    pub baseline: &'a str,
    pub output: Option<&'a str>,
}

pub fn run(cfg: ModelsCommandConfig<'_>) {
    if let Some(tag) = cfg.show {
        let spec = super::exit_on_error(build_model(tag), "looking up model");
        match serde_json::to_string_pretty(&spec) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing {tag}: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    if let Some(path) = cfg.results {
        pivot_results(path, cfg.output);
        return;
    }

    if let Some(path) = cfg.scores {
        let scores = super::exit_on_error(read_scores(Path::new(path)), &format!("reading {path}"));
        let relative = super::exit_on_error(
            relative_to_baseline(&scores, cfg.baseline),
            "comparing models",
        );
        println!("Relative to {}:", cfg.baseline);
        println!("{:<22} {:>10} {:>10}", "Model", "dAIC", "dBIC");
        println!("{}", "-".repeat(44));
        for s in &relative {
            println!("{:<22} {:>10} {:>10}", s.model, cell(s.aic, 1), cell(s.bic, 1));
        }
        return;
    }

    println!("{:<22} {:<6} Regressors", "Model", "Base");
    println!("{}", "-".repeat(72));
    for tag in model_tags() {
        let spec = super::exit_on_error(build_model(tag), "building model");
        let regressors: Vec<&str> = spec.regressors.iter().map(|r| r.formula.as_str()).collect();
        println!(
            "{:<22} {:<6} {}",
            spec.name,
            spec.base_model,
            if regressors.is_empty() {
                "-".to_string()
            } else {
                regressors.join("; ")
            }
        );
    }
}

fn read_scores(path: &Path) -> Result<Vec<ModelScore>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn pivot_results(path: &str, output: Option<&str>) {
    let text = super::exit_on_error(
        std::fs::read_to_string(path).map_err(Into::into),
        &format!("reading {path}"),
    );
    let entries = super::exit_on_error(parse_results(&text), &format!("parsing {path}"));
    let wide = results_long_to_wide(&entries);
    println!(
        "{} subject(s), {} parameter column(s): {}",
        wide.rows.len(),
        wide.columns.len(),
        wide.columns.join(", ")
    );
    if let Some(out) = output {
        super::exit_on_error(write_wide(Path::new(out), &wide), &format!("writing {out}"));
        println!("  written to {out}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_scores() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scores.json");
        std::fs::write(
            &path,
            r#"[{"model": "ddm_nohist", "aic": 100.0, "bic": 120.0},
                {"model": "ddm_prevresp_z", "aic": 90.0, "bic": null}]"#,
        )
        .unwrap();
        let scores = read_scores(&path).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[1].bic, None);
        let rel = relative_to_baseline(&scores, "ddm_nohist").unwrap();
        assert_eq!(rel[0].aic, Some(-10.0));
    }
}
