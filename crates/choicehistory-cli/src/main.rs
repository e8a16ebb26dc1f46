//! CLI for choicehistory: trial-history covariates and psychometric fits.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "choicehistory")]
#[command(about = "choicehistory: how the previous trial shapes the next choice")]
#[command(version = choicehistory_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add previous- and next-trial covariates to a trial table
    Annotate {
        /// Trial table (CSV)
        #[arg(long)]
        input: String,

        /// Annotated trial table to write
        #[arg(long)]
        output: String,

        /// Analysis config (JSON)
        #[arg(long)]
        config: Option<String>,
    },

    /// Remove out-of-range reaction times and trial durations
    CleanRt {
        #[arg(long)]
        input: String,

        #[arg(long)]
        output: String,

        #[arg(long)]
        config: Option<String>,

        /// Drop RTs below this many seconds
        #[arg(long)]
        cutoff: Option<f64>,

        /// Drop RTs above this many seconds (default: 60, the inter-trial interval)
        #[arg(long)]
        ceiling: Option<f64>,

        /// Drop an RT when the trial duration exceeds it by more than this
        #[arg(long)]
        tolerance: Option<f64>,
    },

    /// Fit psychometric functions per subject and condition
    Fit {
        #[arg(long)]
        input: String,

        /// Directory for fits.csv, points.csv and run.json
        #[arg(long, default_value = "fits")]
        output_dir: String,

        #[arg(long)]
        config: Option<String>,

        /// Comma-separated condition fields, e.g. "previous_choice,previous_outcome".
        /// Empty fits one curve per subject.
        #[arg(long, default_value = "")]
        by: String,

        /// Sigmoid family: erf (default), normal_cdf, logistic
        #[arg(long)]
        sigmoid: Option<String>,

        /// Random restarts beyond the first start
        #[arg(long)]
        restarts: Option<usize>,

        /// Also write curve samples of the subject-averaged fit
        #[arg(long)]
        curves: bool,
    },

    /// Median reaction time per contrast (chronometric function)
    Chrono {
        #[arg(long)]
        input: String,

        #[arg(long, default_value = "chrono")]
        output_dir: String,

        #[arg(long)]
        config: Option<String>,
    },

    /// History shift at 0 % contrast, corrected by the next-trial shift
    Shift {
        #[arg(long)]
        input: String,

        #[arg(long, default_value = "shift")]
        output_dir: String,

        #[arg(long)]
        config: Option<String>,

        /// Also split by the absolute contrast of the neighbouring trial
        #[arg(long)]
        by_contrast: bool,

        /// Minimum trials per contrast-resolved group
        #[arg(long)]
        min_trials: Option<usize>,
    },

    /// Probability of repeating the previous choice
    Repeat {
        #[arg(long)]
        input: String,

        #[arg(long)]
        output: String,

        #[arg(long)]
        config: Option<String>,
    },

    /// List drift-diffusion models, reshape backend results, compare models
    Models {
        /// Print the full specification of one model
        #[arg(long)]
        show: Option<String>,

        /// Backend results (CSV with node names and a "mean" column) to pivot per subject
        #[arg(long)]
        results: Option<String>,

        /// Model scores (JSON list of {model, aic, bic}) to compare
        #[arg(long)]
        scores: Option<String>,

        /// Baseline model for --scores
        #[arg(long, default_value = "ddm_nohist")]
        baseline: String,

        /// Where to write the pivoted --results table
        #[arg(long)]
        output: Option<String>,
    },

    /// Build the trial table handed to a drift-diffusion backend
    DdmData {
        #[arg(long)]
        input: String,

        #[arg(long)]
        output: String,

        #[arg(long)]
        config: Option<String>,

        /// Model the data is prepared for
        #[arg(long, default_value = "ddm_prevresp_dcz")]
        model: String,
    },

    /// Correlate fitted dc and z history shifts with choice repetition
    DdmShift {
        /// Backend results (CSV with node names and a "mean" column)
        #[arg(long)]
        results: String,

        /// Trial table the model was fit to, for P(repeat)
        #[arg(long)]
        input: String,

        #[arg(long, default_value = "ddm_shift")]
        output_dir: String,

        #[arg(long)]
        config: Option<String>,

        /// Results come from a model split by previous outcome
        #[arg(long)]
        by_outcome: bool,
    },

    /// Fit a*tanh(b*x) to drift per contrast and rescale the contrasts
    Rescale {
        /// Backend results of a model with one drift per contrast
        #[arg(long)]
        results: String,

        #[arg(long)]
        output: String,

        #[arg(long)]
        config: Option<String>,

        /// Drift parameter name in the results
        #[arg(long, default_value = "v")]
        parameter: String,
    },

    /// Generate seeded synthetic trials
    Simulate {
        #[arg(long)]
        output: String,

        #[arg(long, default_value = "4")]
        subjects: usize,

        #[arg(long, default_value = "1")]
        sessions: usize,

        #[arg(long, default_value = "500")]
        trials: usize,

        /// Bias shift toward the previous choice, in percent contrast
        #[arg(long, default_value = "0")]
        repetition_shift: f64,

        /// Probability of a missed response
        #[arg(long, default_value = "0")]
        miss_rate: f64,

        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Annotate {
            input,
            output,
            config,
        } => commands::annotate::run(&input, &output, config.as_deref()),
        Commands::CleanRt {
            input,
            output,
            config,
            cutoff,
            ceiling,
            tolerance,
        } => commands::clean_rt::run(commands::clean_rt::CleanRtCommandConfig {
            input: &input,
            output: &output,
            config_path: config.as_deref(),
            cutoff,
            ceiling,
            tolerance,
        }),
        Commands::Fit {
            input,
            output_dir,
            config,
            by,
            sigmoid,
            restarts,
            curves,
        } => commands::fit::run(commands::fit::FitCommandConfig {
            input: &input,
            output_dir: &output_dir,
            config_path: config.as_deref(),
            by: &by,
            sigmoid: sigmoid.as_deref(),
            restarts,
            curves,
        }),
        Commands::Chrono {
            input,
            output_dir,
            config,
        } => commands::chrono::run(&input, &output_dir, config.as_deref()),
        Commands::Shift {
            input,
            output_dir,
            config,
            by_contrast,
            min_trials,
        } => commands::shift::run(commands::shift::ShiftCommandConfig {
            input: &input,
            output_dir: &output_dir,
            config_path: config.as_deref(),
            by_contrast,
            min_trials,
        }),
        Commands::Repeat {
            input,
            output,
            config,
        } => commands::repeat::run(&input, &output, config.as_deref()),
        Commands::Models {
            show,
            results,
            scores,
            baseline,
            output,
        } => commands::models::run(commands::models::ModelsCommandConfig {
            show: show.as_deref(),
            results: results.as_deref(),
            scores: scores.as_deref(),
            baseline: &baseline,
            output: output.as_deref(),
        }),
        Commands::DdmData {
            input,
            output,
            config,
            model,
        } => commands::ddm_data::run(&input, &output, config.as_deref(), &model),
        Commands::DdmShift {
            results,
            input,
            output_dir,
            config,
            by_outcome,
        } => commands::ddm_shift::run(commands::ddm_shift::DdmShiftCommandConfig {
            results: &results,
            input: &input,
            output_dir: &output_dir,
            config_path: config.as_deref(),
            by_outcome,
        }),
        Commands::Rescale {
            results,
            output,
            config,
            parameter,
        } => commands::rescale::run(&results, &output, config.as_deref(), &parameter),
        Commands::Simulate {
            output,
            subjects,
            sessions,
            trials,
            repetition_shift,
            miss_rate,
            seed,
        } => commands::simulate::run(commands::simulate::SimulateCommandConfig {
            output: &output,
            subjects,
            sessions,
            trials,
            repetition_shift,
            miss_rate,
            seed,
        }),
    }
}
