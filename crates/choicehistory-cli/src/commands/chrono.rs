use std::path::Path;

use choicehistory_core::chronometric::{summarize, write_points, write_summary};
use choicehistory_core::run::RunRecorder;
use choicehistory_core::{clean_trials, subject_medians};

use super::cell;

pub fn run(input: &str, output_dir: &str, config_path: Option<&str>) {
    let config = super::load_config(config_path);
    let dir = Path::new(output_dir);
    let mut recorder = RunRecorder::start("chrono", Some(Path::new(input)), &config);

    let trials = super::load_trials(input, &config);
    let (trials, report) =
        clean_trials(&trials, &config.rt_limits, config.rt_reference_tolerance);
    println!(
        "{} trials, {} RTs removed by the RT limits",
        report.n_trials, report.rt_removed
    );

    let points = subject_medians(&trials);
    let summary = summarize(&points);

    println!(
        "\n{:>10} {:>10} {:>8} {:>9}",
        "Contrast", "Median RT", "SEM", "Subjects"
    );
    println!("{}", "-".repeat(40));
    for s in &summary {
        println!(
            "{:>10} {:>10.3} {:>8} {:>9}",
            s.signed_contrast,
            s.mean,
            cell(s.sem, 3),
            s.n_subjects
        );
    }

    let points_path = dir.join("chrono_points.csv");
    let summary_path = dir.join("chrono_summary.csv");
    super::exit_on_error(write_points(&points_path, &points), "writing chrono_points.csv");
    super::exit_on_error(write_summary(&summary_path, &summary), "writing chrono_summary.csv");
    recorder.add_output(&points_path);
    recorder.add_output(&summary_path);

    recorder.count("trials", report.n_trials);
    recorder.count("rt_removed", report.rt_removed);
    recorder.count("points", points.len());
    super::finish_run(recorder, dir);
}
