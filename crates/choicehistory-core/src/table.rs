//! CSV trial tables.
//!
//! Reads the trial export produced by the rig pipeline and writes every
//! per-trial and per-group result table. The format is plain comma-separated
//! text with a header row. Double-quoted fields are understood on input and
//! produced on output when a value contains a comma or a quote.
//!
//! Missing values are written as empty cells. On input, empty cells and the
//! tokens `nan`, `NaN`, `NA`, `None` and `null` all read as missing.
//!
//! Column names are matched against a list of accepted aliases, so both the
//! canonical export (`subj_idx`, an unnamed leading index column holding the
//! trial number, `rt_wheel`, `feedbackType`) and the annotated tables this
//! crate writes can be read back. Raw trial objects without an `rt` column
//! get the reaction time from `firstMovement_times - goCue_times` and the
//! trial duration from `response_times - goCue_times`. Rows without a
//! stimulus contrast are skipped with a warning.

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{AnalysisError, Result};
use crate::trial::{AnnotatedTrial, History, Trial, response_from_wheel, signed_contrast_from_sides};

// ---------------------------------------------------------------------------
// Column aliases
// ---------------------------------------------------------------------------

const SUBJECT: &[&str] = &["subj_idx", "subject", "subject_nickname"];
/// The empty name matches the unnamed index column of a pandas export.
const TRIAL_INDEX: &[&str] = &["trialnum", "trial_index", "trial", ""];
const SESSION_ID: &[&str] = &["session_id", "session", "eid", "id"];
const SESSION_START: &[&str] = &["start_time", "session_start"];
const SIGNED_CONTRAST: &[&str] = &["signed_contrast"];
const CONTRAST_LEFT: &[&str] = &["contrastLeft", "contrast_left"];
const CONTRAST_RIGHT: &[&str] = &["contrastRight", "contrast_right"];
const RESPONSE: &[&str] = &["response"];
const WHEEL_CHOICE: &[&str] = &["choice"];
const FEEDBACK: &[&str] = &["feedbackType", "feedback_type", "feedback"];
const RT: &[&str] = &["rt", "rt_wheel"];
const TRIAL_DURATION: &[&str] = &["trial_duration"];
const TASK_PROTOCOL: &[&str] = &["task_protocol"];
const GO_CUE_TIMES: &[&str] = &["goCue_times", "go_cue_times"];
const FIRST_MOVEMENT_TIMES: &[&str] = &["firstMovement_times", "first_movement_times"];
const RESPONSE_TIMES: &[&str] = &["response_times"];

/// Column order of a written trial table.
pub const TRIAL_COLUMNS: [&str; 10] = [
    "subj_idx",
    "trialnum",
    "session_id",
    "start_time",
    "signed_contrast",
    "response",
    "feedbackType",
    "rt",
    "trial_duration",
    "task_protocol",
];

/// History columns appended to an annotated trial table.
pub const HISTORY_COLUMNS: [&str; 6] = [
    "previous_choice",
    "previous_outcome",
    "previous_contrast",
    "next_choice",
    "next_outcome",
    "next_contrast",
];

const MISSING_TOKENS: &[&str] = &["", "nan", "NaN", "NA", "None", "null"];

// ---------------------------------------------------------------------------
// Record parsing
// ---------------------------------------------------------------------------

/// Split one CSV record into fields.
pub fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Quote a field when it would otherwise break the record.
pub fn quote_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Format an optional number; missing becomes an empty cell.
pub fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => String::new(),
    }
}

fn is_missing(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell.trim())
}

fn parse_opt_f64(cell: &str, row: usize, column: &str) -> Result<Option<f64>> {
    if is_missing(cell) {
        return Ok(None);
    }
    let value: f64 = cell.trim().parse().map_err(|_| AnalysisError::InvalidValue {
        row,
        column: column.to_string(),
        value: cell.to_string(),
    })?;
    Ok(value.is_finite().then_some(value))
}

fn parse_opt_text(cell: &str) -> Option<String> {
    (!is_missing(cell)).then(|| cell.trim().to_string())
}

/// Resolved positions of the columns a trial table may carry.
struct Columns {
    names: Vec<String>,
    subject: usize,
    trial_index: usize,
    contrast: ContrastColumns,
    response: ResponseColumn,
    session_id: Option<usize>,
    session_start: Option<usize>,
    feedback: Option<usize>,
    rt: Interval,
    trial_duration: Interval,
    task_protocol: Option<usize>,
}

/// A duration read from its own column or derived from two event times.
enum Interval {
    Column(usize),
    Between { start: usize, end: usize },
    Absent,
}

impl Interval {
    fn resolve(direct: Option<usize>, start: Option<usize>, end: Option<usize>) -> Self {
        match (direct, start, end) {
            (Some(i), _, _) => Self::Column(i),
            (None, Some(start), Some(end)) => Self::Between { start, end },
            _ => Self::Absent,
        }
    }
}

enum ContrastColumns {
    Signed(usize),
    Sides { left: usize, right: usize },
}

enum ResponseColumn {
    Response(usize),
    Wheel(usize),
}

impl Columns {
    fn resolve(header: &[String]) -> Result<Self> {
        let find = |aliases: &[&str]| -> Option<usize> {
            aliases
                .iter()
                .find_map(|alias| header.iter().position(|h| h.trim() == *alias))
        };
        let require = |aliases: &[&str]| -> Result<usize> {
            find(aliases).ok_or_else(|| AnalysisError::MissingColumn(aliases[0].to_string()))
        };

        let contrast = match find(SIGNED_CONTRAST) {
            Some(i) => ContrastColumns::Signed(i),
            None => match (find(CONTRAST_LEFT), find(CONTRAST_RIGHT)) {
                (Some(left), Some(right)) => ContrastColumns::Sides { left, right },
                _ => return Err(AnalysisError::MissingColumn(SIGNED_CONTRAST[0].to_string())),
            },
        };
        let response = match find(RESPONSE) {
            Some(i) => ResponseColumn::Response(i),
            None => match find(WHEEL_CHOICE) {
                Some(i) => ResponseColumn::Wheel(i),
                None => return Err(AnalysisError::MissingColumn(RESPONSE[0].to_string())),
            },
        };

        Ok(Self {
            names: header.to_vec(),
            subject: require(SUBJECT)?,
            trial_index: require(TRIAL_INDEX)?,
            contrast,
            response,
            session_id: find(SESSION_ID),
            session_start: find(SESSION_START),
            feedback: find(FEEDBACK),
            rt: Interval::resolve(find(RT), find(GO_CUE_TIMES), find(FIRST_MOVEMENT_TIMES)),
            trial_duration: Interval::resolve(
                find(TRIAL_DURATION),
                find(GO_CUE_TIMES),
                find(RESPONSE_TIMES),
            ),
            task_protocol: find(TASK_PROTOCOL),
        })
    }

    fn name(&self, i: usize) -> &str {
        &self.names[i]
    }

    /// Parse one data row. Rows without a stimulus contrast are returned as
    /// `None`; they have no place on the psychometric axis.
    fn parse_row(&self, fields: &[String], row: usize) -> Result<Option<Trial>> {
        let cell = |i: usize| fields.get(i).map(String::as_str).unwrap_or("");
        let number = |i: usize| parse_opt_f64(cell(i), row, self.name(i));
        let optional = |col: Option<usize>| -> Result<Option<f64>> {
            match col {
                Some(i) => number(i),
                None => Ok(None),
            }
        };
        let interval = |iv: &Interval| -> Result<Option<f64>> {
            match *iv {
                Interval::Column(i) => number(i),
                Interval::Between { start, end } => {
                    Ok(number(start)?.zip(number(end)?).map(|(s, e)| e - s))
                }
                Interval::Absent => Ok(None),
            }
        };

        let subject = parse_opt_text(cell(self.subject)).ok_or_else(|| {
            AnalysisError::InvalidValue {
                row,
                column: self.name(self.subject).to_string(),
                value: cell(self.subject).to_string(),
            }
        })?;

        let trial_index = match number(self.trial_index)? {
            Some(v) if v.fract() == 0.0 => v as i64,
            _ => {
                return Err(AnalysisError::InvalidValue {
                    row,
                    column: self.name(self.trial_index).to_string(),
                    value: cell(self.trial_index).to_string(),
                });
            }
        };

        let signed_contrast = match self.contrast {
            ContrastColumns::Signed(i) => number(i)?,
            ContrastColumns::Sides { left, right } => match (number(left)?, number(right)?) {
                (None, None) => None,
                (l, r) => Some(signed_contrast_from_sides(l, r)),
            },
        };
        let Some(signed_contrast) = signed_contrast else {
            return Ok(None);
        };

        let response = match self.response {
            ResponseColumn::Response(i) => number(i)?,
            ResponseColumn::Wheel(i) => number(i)?.and_then(response_from_wheel),
        };

        Ok(Some(Trial {
            subject,
            trial_index,
            session_id: self.session_id.and_then(|i| parse_opt_text(cell(i))),
            session_start: self.session_start.and_then(|i| parse_opt_text(cell(i))),
            signed_contrast,
            response,
            feedback: optional(self.feedback)?,
            rt: interval(&self.rt)?,
            trial_duration: interval(&self.trial_duration)?,
            task_protocol: self.task_protocol.and_then(|i| parse_opt_text(cell(i))),
        }))
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Parse a trial table from CSV text.
pub fn parse_trials(text: &str) -> Result<Vec<Trial>> {
    let mut lines = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        return Err(AnalysisError::EmptyInput);
    };
    let columns = Columns::resolve(&split_record(header))?;

    let rows = lines
        .map(|(line_no, line)| columns.parse_row(&split_record(line), line_no + 1))
        .collect::<Result<Vec<_>>>()?;
    let n_rows = rows.len();
    let trials: Vec<Trial> = rows.into_iter().flatten().collect();
    if trials.len() < n_rows {
        log::warn!(
            "skipped {} of {n_rows} row(s) without a stimulus contrast",
            n_rows - trials.len()
        );
    }

    if trials.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    log::debug!("parsed {} trials", trials.len());
    Ok(trials)
}

/// Read a trial table from a CSV file.
pub fn read_trials(path: &Path) -> Result<Vec<Trial>> {
    let text = fs::read_to_string(path)?;
    parse_trials(&text)
}

/// Stable sort by subject, session start, session id, then trial index.
pub fn sort_trials(trials: &mut [Trial]) {
    trials.sort_by(|a, b| {
        a.subject
            .cmp(&b.subject)
            .then_with(|| a.session_start.cmp(&b.session_start))
            .then_with(|| a.session_id.cmp(&b.session_id))
            .then_with(|| a.trial_index.cmp(&b.trial_index))
    });
}

/// Order of two optional numbers with missing values last.
pub fn cmp_opt(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn trial_cells(t: &Trial) -> Vec<String> {
    let text = |v: &Option<String>| v.as_deref().map(quote_field).unwrap_or_default();
    vec![
        quote_field(&t.subject),
        t.trial_index.to_string(),
        text(&t.session_id),
        text(&t.session_start),
        t.signed_contrast.to_string(),
        fmt_opt(t.response),
        fmt_opt(t.feedback),
        fmt_opt(t.rt),
        fmt_opt(t.trial_duration),
        text(&t.task_protocol),
    ]
}

fn history_cells(h: &History) -> Vec<String> {
    [
        h.previous_choice,
        h.previous_outcome,
        h.previous_contrast,
        h.next_choice,
        h.next_outcome,
        h.next_contrast,
    ]
    .into_iter()
    .map(fmt_opt)
    .collect()
}

/// Write a header row and data rows to `out`.
pub fn write_rows<W: Write>(out: &mut W, header: &[&str], rows: &[Vec<String>]) -> Result<()> {
    writeln!(out, "{}", header.join(","))?;
    for row in rows {
        writeln!(out, "{}", row.join(","))?;
    }
    Ok(())
}

/// Write a table to `path`, creating parent directories as needed.
pub fn write_table(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    write_rows(&mut out, header, rows)?;
    out.flush()?;
    Ok(())
}

pub fn trial_rows(trials: &[Trial]) -> Vec<Vec<String>> {
    trials.iter().map(trial_cells).collect()
}

pub fn annotated_rows(trials: &[AnnotatedTrial]) -> Vec<Vec<String>> {
    trials
        .iter()
        .map(|a| {
            let mut row = trial_cells(&a.trial);
            row.extend(history_cells(&a.history));
            row
        })
        .collect()
}

pub fn annotated_header() -> Vec<&'static str> {
    TRIAL_COLUMNS.iter().chain(HISTORY_COLUMNS.iter()).copied().collect()
}

pub fn write_trials(path: &Path, trials: &[Trial]) -> Result<()> {
    write_table(path, &TRIAL_COLUMNS, &trial_rows(trials))
}

pub fn write_annotated(path: &Path, trials: &[AnnotatedTrial]) -> Result<()> {
    write_table(path, &annotated_header(), &annotated_rows(trials))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
