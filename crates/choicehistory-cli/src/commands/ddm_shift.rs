use std::path::Path;

use choicehistory_core::ddm::read_wide;
use choicehistory_core::ddm_shift::{write_correlations, write_shifts};
use choicehistory_core::run::RunRecorder;
use choicehistory_core::{history_correlations, history_shifts, repetition};

use super::cell;

pub struct DdmShiftCommandConfig<'a> {
    pub results: &'a str,
    pub input: &'a str,
    pub output_dir: &'a str,
    pub config_path: Option<&'a str>,
    pub by_outcome: bool,
}

pub fn run(cfg: DdmShiftCommandConfig<'_>) {
    let config = super::load_config(cfg.config_path);
    let mut recorder = RunRecorder::start("ddm-shift", Some(Path::new(cfg.input)), &config);

    let wide = super::exit_on_error(
        read_wide(Path::new(cfg.results)),
        &format!("reading {}", cfg.results),
    );
    let shifts = history_shifts(&wide, &config.ddm_conditions, cfg.by_outcome);
    let annotated = super::load_annotated(cfg.input, &config);
    let repeats = repetition(&annotated);
    let correlations = history_correlations(&shifts, &repeats);

    println!(
        "{:<10} {:>9} {:>12} {:>13} {:>11} {:>10} {:>10}",
        "After", "Subjects", "rho(z,rep)", "rho(dc,rep)", "delta rho", "Steiger t", "p"
    );
    println!("{}", "-".repeat(81));
    for c in &correlations {
        println!(
            "{:<10} {:>9} {:>12} {:>13} {:>11} {:>10} {:>10}",
            c.outcome.as_str(),
            c.n_subjects,
            cell(c.z_repeat.map(|r| r.rho), 3),
            cell(c.dc_repeat.map(|r| r.rho), 3),
            cell(c.delta_rho, 3),
            cell(c.steiger.map(|s| s.t), 2),
            cell(c.steiger.map(|s| s.p_value), 4)
        );
    }

    let dir = Path::new(cfg.output_dir);
    super::exit_on_error(
        std::fs::create_dir_all(dir).map_err(Into::into),
        &format!("creating {}", cfg.output_dir),
    );
    let shifts_path = dir.join("ddm_shifts.csv");
    super::exit_on_error(
        write_shifts(&shifts_path, &shifts, &repeats),
        "writing ddm_shifts.csv",
    );
    let corr_path = dir.join("correlations.csv");
    super::exit_on_error(
        write_correlations(&corr_path, &correlations),
        "writing correlations.csv",
    );

    recorder.add_output(&shifts_path);
    recorder.add_output(&corr_path);
    recorder.count("subjects", wide.rows.len());
    recorder.count("shift_rows", shifts.len());
    super::finish_run(recorder, dir);
}
