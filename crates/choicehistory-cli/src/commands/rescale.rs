use std::path::Path;

use choicehistory_core::ddm::read_wide;
use choicehistory_core::rescale::write_rescaled;
use choicehistory_core::run::RunRecorder;
use choicehistory_core::{drift_by_contrast, fit_tanh};

use super::cell;

pub fn run(results: &str, output: &str, config_path: Option<&str>, parameter: &str) {
    let config = super::load_config(config_path);
    let mut recorder = RunRecorder::start("rescale", Some(Path::new(results)), &config);

    let wide = super::exit_on_error(read_wide(Path::new(results)), &format!("reading {results}"));
    let points = drift_by_contrast(&wide, parameter);
    if points.is_empty() {
        eprintln!("No {parameter}(contrast) columns in {results}.");
        std::process::exit(1);
    }
    let fit = fit_tanh(&points);

    println!("{:>10} {:>10} {:>9} {:>13}", "Contrast", "Drift", "Subjects", "New contrast");
    println!("{}", "-".repeat(45));
    for p in &points {
        println!(
            "{:>10} {:>10} {:>9} {:>13}",
            p.contrast,
            cell(Some(p.drift), 3),
            p.n_subjects,
            cell(fit.map(|f| f.rescale(p.contrast)), 3)
        );
    }
    match &fit {
        Some(f) => println!("\nnew_contrast = {:.3} * tanh({:.4} * x)", f.a, f.b),
        None => println!("\nToo few contrasts to fit a rescaling."),
    }

    let out = Path::new(output);
    super::exit_on_error(
        write_rescaled(out, &points, fit.as_ref()),
        &format!("writing {output}"),
    );

    recorder.add_output(out);
    recorder.count("contrasts", points.len());
    super::finish_run(recorder, &super::parent_dir(output));
}
