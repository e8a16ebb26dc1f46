use std::path::Path;

use choicehistory_core::run::RunRecorder;
use choicehistory_core::write_annotated;

pub fn run(input: &str, output: &str, config_path: Option<&str>) {
    let config = super::load_config(config_path);
    let mut recorder = RunRecorder::start("annotate", Some(Path::new(input)), &config);

    let annotated = super::load_annotated(input, &config);
    let with_previous = annotated
        .iter()
        .filter(|a| a.history.previous_choice.is_some())
        .count();
    let with_next = annotated
        .iter()
        .filter(|a| a.history.next_choice.is_some())
        .count();

    println!("Annotated {} trials", annotated.len());
    println!("  previous choice known: {with_previous}");
    println!("  next choice known:     {with_next}");

    let out = Path::new(output);
    super::exit_on_error(write_annotated(out, &annotated), &format!("writing {output}"));
    println!("  written to {output}");

    recorder.add_output(out);
    recorder.count("trials", annotated.len());
    recorder.count("with_previous_choice", with_previous);
    recorder.count("with_next_choice", with_next);
    super::finish_run(recorder, &super::parent_dir(output));
}
