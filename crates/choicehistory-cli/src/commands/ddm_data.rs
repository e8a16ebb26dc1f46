use std::path::Path;

use choicehistory_core::ddm::write_dataset;
use choicehistory_core::run::RunRecorder;
use choicehistory_core::{annotate, build_model, clean_trials, prepare_dataset};

pub fn run(input: &str, output: &str, config_path: Option<&str>, model: &str) {
    let config = super::load_config(config_path);
    let spec = super::exit_on_error(build_model(model), "in --model");
    let mut recorder = RunRecorder::start("ddm-data", Some(Path::new(input)), &config);

    let trials = super::load_trials(input, &config);
    let (trials, report) =
        clean_trials(&trials, &config.rt_limits, config.rt_reference_tolerance);
    let annotated = annotate(&trials);
    let rows = prepare_dataset(&annotated);

    let covariates: Vec<String> = spec.covariates().into_iter().collect();
    println!("Model {} ({})", spec.name, spec.base_model);
    for r in &spec.regressors {
        println!("  {}", r.formula);
    }
    println!("  covariates: {}", covariates.join(", "));
    println!(
        "\n{} of {} trials kept ({} RTs out of range)",
        rows.len(),
        annotated.len(),
        report.rt_removed
    );

    let out = Path::new(output);
    super::exit_on_error(write_dataset(out, &rows), &format!("writing {output}"));
    println!("  written to {output}");

    recorder.add_output(out);
    recorder.count("trials", annotated.len());
    recorder.count("rows", rows.len());
    super::finish_run(recorder, &super::parent_dir(output));
}
