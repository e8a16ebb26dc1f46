use std::path::Path;

use choicehistory_core::chronometric::write_summary;
use choicehistory_core::curve::write_curve;
use choicehistory_core::psychometric::{write_group_fits, write_points};
use choicehistory_core::run::RunRecorder;
use choicehistory_core::{
    FitStatus, Level, average_points, fit_average, fit_groups, parse_fields, parse_sigmoid,
    subject_points,
};

use super::cell;

pub struct FitCommandConfig<'a> {
    pub input: &'a str,
    pub output_dir: &'a str,
    pub config_path: Option<&'a str>,
    pub by: &'a str,
    pub sigmoid: Option<&'a str>,
    pub restarts: Option<usize>,
    pub curves: bool,
}

pub fn run(cfg: FitCommandConfig<'_>) {
    let mut config = super::load_config(cfg.config_path);
    if let Some(name) = cfg.sigmoid {
        config.fit.family = super::exit_on_error(parse_sigmoid(name), "in --sigmoid");
    }
    if let Some(restarts) = cfg.restarts {
        config.fit.restarts = restarts;
    }
    let fields = super::exit_on_error(parse_fields(cfg.by), "in --by");

    let dir = Path::new(cfg.output_dir);
    let mut recorder = RunRecorder::start("fit", Some(Path::new(cfg.input)), &config);
    let annotated = super::load_annotated(cfg.input, &config);

    println!(
        "Fitting {} psychometric ({} restarts) to {} trials",
        config.fit.family,
        config.fit.restarts,
        annotated.len()
    );
    let fits = fit_groups(&annotated, &fields, &config.fit);

    let condition = |levels: &[Level]| {
        levels
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join("/")
    };
    println!(
        "\n{:<20} {:>12} {:>8} {:>10} {:>8} {:>8} {:>7}  Status",
        "Subject", "Condition", "Bias", "Threshold", "Lapse L", "Lapse H", "Trials"
    );
    println!("{}", "-".repeat(96));
    for g in &fits {
        println!(
            "{:<20} {:>12} {:>8} {:>10} {:>8} {:>8} {:>7}  {}",
            g.key.subject,
            condition(g.key.levels.as_slice()),
            cell(g.fit.bias, 2),
            cell(g.fit.threshold, 2),
            cell(g.fit.lapse_low, 3),
            cell(g.fit.lapse_high, 3),
            g.fit.n_trials,
            g.fit.status
        );
    }
    let converged = fits.iter().filter(|g| g.fit.is_converged()).count();
    let degenerate = fits
        .iter()
        .filter(|g| g.fit.status == FitStatus::InsufficientLevels)
        .count();
    println!(
        "\n{converged}/{} groups converged, {degenerate} with too few contrast levels",
        fits.len()
    );

    let fits_path = dir.join("fits.csv");
    super::exit_on_error(
        write_group_fits(&fits_path, &fields, &fits),
        "writing fits.csv",
    );
    recorder.add_output(&fits_path);

    let points = subject_points(annotated.iter().map(|a| &a.trial));
    let summary = average_points(&points);
    let points_path = dir.join("points.csv");
    let average_path = dir.join("average.csv");
    super::exit_on_error(write_points(&points_path, &points), "writing points.csv");
    super::exit_on_error(write_summary(&average_path, &summary), "writing average.csv");
    recorder.add_output(&points_path);
    recorder.add_output(&average_path);

    let average = fit_average(&summary, &config.fit);
    println!(
        "Subject average: bias {}, threshold {}, lapses {}/{} ({})",
        cell(average.bias, 2),
        cell(average.threshold, 2),
        cell(average.lapse_low, 3),
        cell(average.lapse_high, 3),
        average.status
    );

    if cfg.curves {
        match average.params() {
            Some(params) => {
                let tested: Vec<f64> = summary.iter().map(|s| s.signed_contrast).collect();
                let samples = config.curve.sample(&params, config.fit.family, &tested);
                let curve_path = dir.join("curve.csv");
                super::exit_on_error(write_curve(&curve_path, &samples), "writing curve.csv");
                recorder.add_output(&curve_path);
            }
            None => eprintln!("Warning: subject-average fit failed, no curve written"),
        }
    }

    recorder.count("trials", annotated.len());
    recorder.count("groups", fits.len());
    recorder.count("converged", converged);
    super::finish_run(recorder, dir);
}
