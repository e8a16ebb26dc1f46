use std::path::Path;

use choicehistory_core::run::RunRecorder;
use choicehistory_core::{clean_trials, write_trials};

pub struct CleanRtCommandConfig<'a> {
    pub input: &'a str,
    pub output: &'a str,
    pub config_path: Option<&'a str>,
    pub cutoff: Option<f64>,
    pub ceiling: Option<f64>,
    pub tolerance: Option<f64>,
}

pub fn run(cfg: CleanRtCommandConfig<'_>) {
    let mut config = super::load_config(cfg.config_path);
    if cfg.cutoff.is_some() {
        config.rt_limits.cutoff = cfg.cutoff;
    }
    if let Some(ceiling) = cfg.ceiling {
        config.rt_limits.ceiling = ceiling;
    }
    if cfg.tolerance.is_some() {
        config.rt_reference_tolerance = cfg.tolerance;
    }
    super::exit_on_error(config.validate(), "in options");

    let mut recorder = RunRecorder::start("clean-rt", Some(Path::new(cfg.input)), &config);
    let trials = super::load_trials(cfg.input, &config);
    let (cleaned, report) = clean_trials(&trials, &config.rt_limits, config.rt_reference_tolerance);

    let limits = &config.rt_limits;
    println!(
        "RT limits: floor {}s, ceiling {}s, cutoff {}",
        limits.floor,
        limits.ceiling,
        limits
            .cutoff
            .map_or_else(|| "none".to_string(), |c| format!("{c}s"))
    );
    println!("  trials:                {}", report.n_trials);
    println!("  RTs removed:           {}", report.rt_removed);
    println!("  durations removed:     {}", report.duration_removed);
    println!("  median RT:             {}", super::cell(report.median_rt, 3));

    let out = Path::new(cfg.output);
    super::exit_on_error(write_trials(out, &cleaned), &format!("writing {}", cfg.output));

    recorder.add_output(out);
    recorder.count("trials", report.n_trials);
    recorder.count("rt_removed", report.rt_removed);
    recorder.count("duration_removed", report.duration_removed);
    super::finish_run(recorder, &super::parent_dir(cfg.output));
}
