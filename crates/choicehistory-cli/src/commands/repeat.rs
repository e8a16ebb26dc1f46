use std::path::Path;

use choicehistory_core::repetition::{repetition, write_repetition};
use choicehistory_core::run::RunRecorder;

use super::cell;

pub fn run(input: &str, output: &str, config_path: Option<&str>) {
    let config = super::load_config(config_path);
    let mut recorder = RunRecorder::start("repeat", Some(Path::new(input)), &config);

    let annotated = super::load_annotated(input, &config);
    let rows = repetition(&annotated);

    println!(
        "{:<20} {:>8} {:>8} {:>14} {:>14}",
        "Subject", "Trials", "Repeat", "After correct", "After error"
    );
    println!("{}", "-".repeat(68));
    for r in &rows {
        println!(
            "{:<20} {:>8} {:>8} {:>14} {:>14}",
            r.subject,
            r.n_trials,
            cell(r.repeat, 3),
            cell(r.repeat_prevcorrect, 3),
            cell(r.repeat_preverror, 3)
        );
    }

    let out = Path::new(output);
    super::exit_on_error(write_repetition(out, &rows), &format!("writing {output}"));

    recorder.add_output(out);
    recorder.count("subjects", rows.len());
    super::finish_run(recorder, &super::parent_dir(output));
}
