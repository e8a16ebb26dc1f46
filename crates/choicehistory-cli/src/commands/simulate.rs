use std::path::Path;

use choicehistory_core::run::RunRecorder;
use choicehistory_core::{AnalysisConfig, SimulationConfig, simulate, write_trials};

pub struct SimulateCommandConfig<'a> {
    pub output: &'a str,
    pub subjects: usize,
    pub sessions: usize,
    pub trials: usize,
    pub repetition_shift: f64,
    pub miss_rate: f64,
    pub seed: u64,
}

pub fn run(cfg: SimulateCommandConfig<'_>) {
    let sim = SimulationConfig {
        n_subjects: cfg.subjects,
        sessions_per_subject: cfg.sessions,
        trials_per_session: cfg.trials,
        repetition_shift: cfg.repetition_shift,
        miss_rate: cfg.miss_rate,
        seed: cfg.seed,
        ..Default::default()
    };
    super::exit_on_error(sim.validate(), "in options");
    let mut recorder = RunRecorder::start("simulate", None, &AnalysisConfig::default());

    let trials = simulate(&sim);
    let p = sim.params;
    println!(
        "Simulated {} trials: {} subject(s) x {} session(s) x {} trials",
        trials.len(),
        sim.n_subjects,
        sim.sessions_per_subject,
        sim.trials_per_session
    );
    println!(
        "  bias {}, threshold {}, lapses {}/{}, repetition shift {}",
        p.bias, p.threshold, p.lapse_low, p.lapse_high, sim.repetition_shift
    );

    let out = Path::new(cfg.output);
    super::exit_on_error(write_trials(out, &trials), &format!("writing {}", cfg.output));

    recorder.add_output(out);
    recorder.count("trials", trials.len());
    super::finish_run(recorder, &super::parent_dir(cfg.output));
}
