use std::path::Path;

use choicehistory_core::run::RunRecorder;
use choicehistory_core::shift::{
    correct_shifts, strategy, write_corrected, write_shifts, write_strategy,
};
use choicehistory_core::{Lag, choice_shift};

use super::cell;

pub struct ShiftCommandConfig<'a> {
    pub input: &'a str,
    pub output_dir: &'a str,
    pub config_path: Option<&'a str>,
    pub by_contrast: bool,
    pub min_trials: Option<usize>,
}

pub fn run(cfg: ShiftCommandConfig<'_>) {
    let mut config = super::load_config(cfg.config_path);
    if cfg.by_contrast {
        config.shift.by_contrast = true;
    }
    if let Some(n) = cfg.min_trials {
        config.shift.min_trials = n;
    }

    let dir = Path::new(cfg.output_dir);
    let mut recorder = RunRecorder::start("shift", Some(Path::new(cfg.input)), &config);
    let annotated = super::load_annotated(cfg.input, &config);

    let history = choice_shift(&annotated, Lag::Previous, &config.shift, &config.fit);
    let future = choice_shift(&annotated, Lag::Next, &config.shift, &config.fit);
    let corrected = correct_shifts(&history, &future);

    let outcome = |o: f64| if o > 0.0 { "correct" } else { "error" };
    println!(
        "{:<20} {:>8} {:>9} {:>9} {:>9} {:>10}",
        "Subject", "After", "Contrast", "History", "Future", "Corrected"
    );
    println!("{}", "-".repeat(70));
    for c in &corrected {
        println!(
            "{:<20} {:>8} {:>9} {:>9} {:>9} {:>10}",
            c.subject,
            outcome(c.outcome),
            cell(c.contrast, 2),
            cell(c.history_shift, 1),
            cell(c.future_shift, 1),
            cell(c.corrected, 1)
        );
    }

    let history_path = dir.join("history_shift.csv");
    let future_path = dir.join("future_shift.csv");
    let corrected_path = dir.join("corrected_shift.csv");
    super::exit_on_error(write_shifts(&history_path, &history), "writing history_shift.csv");
    super::exit_on_error(write_shifts(&future_path, &future), "writing future_shift.csv");
    super::exit_on_error(
        write_corrected(&corrected_path, &corrected),
        "writing corrected_shift.csv",
    );
    recorder.add_output(&history_path);
    recorder.add_output(&future_path);
    recorder.add_output(&corrected_path);

    if !config.shift.by_contrast {
        let points = strategy(&history);
        println!("\n{:<20} {:>14} {:>12}", "Subject", "After correct", "After error");
        for p in &points {
            println!(
                "{:<20} {:>14} {:>12}",
                p.subject,
                cell(p.after_correct, 1),
                cell(p.after_error, 1)
            );
        }
        let path = dir.join("strategy.csv");
        super::exit_on_error(write_strategy(&path, &points), "writing strategy.csv");
        recorder.add_output(&path);
    }

    recorder.count("trials", annotated.len());
    recorder.count("history_cells", history.len());
    recorder.count("future_cells", future.len());
    super::finish_run(recorder, dir);
}
