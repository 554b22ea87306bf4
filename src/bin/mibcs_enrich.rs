//! mibcs-enrich CLI
//!
//! Commands:
//! - run: Enrich records streamed on stdin (default when no command is given)
//! - validate: Check that records can be enriched
//! - schema: Print record schema information

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::debug;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use mibcs_enrich::{
    EnrichError, Enricher, ErrorPolicy, ScaleRecord, Sex, StreamEnricher, SubjectProfile,
    ENRICH_VERSION, PRODUCER_NAME,
};

/// mibcs-enrich - Derive body-composition metrics from scale measurements
#[derive(Parser)]
#[command(name = PRODUCER_NAME)]
#[command(version = ENRICH_VERSION)]
#[command(about = "Enrich Mi scale NDJSON records with body-composition metrics", long_about = None)]
struct Cli {
    #[command(flatten)]
    profile: ProfileArgs,

    /// What to do with lines that cannot be enriched
    #[arg(long, global = true, default_value = "fail")]
    on_error: OnError,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct ProfileArgs {
    /// Subject sex
    #[arg(long, global = true, default_value = "male")]
    sex: SexArg,

    /// Subject age in years
    #[arg(long, global = true, default_value = "43")]
    age: u32,

    /// Subject height in centimeters
    #[arg(long, global = true, default_value = "181")]
    height: f64,

    /// Load the subject profile from a JSON file (overrides --sex/--age/--height)
    #[arg(long, global = true)]
    profile: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich records streamed on stdin, writing to stdout
    Run {
        /// Do not flush output after each record
        #[arg(long)]
        no_flush: bool,
    },

    /// Check that every record can be enriched with the current profile
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum SexArg {
    Male,
    Female,
}

impl From<SexArg> for Sex {
    fn from(arg: SexArg) -> Self {
        match arg {
            SexArg::Male => Sex::Male,
            SexArg::Female => Sex::Female,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OnError {
    /// Stop at the first bad line
    Fail,
    /// Drop bad lines
    Skip,
    /// Copy bad lines to the output unchanged
    Passthrough,
}

impl From<OnError> for ErrorPolicy {
    fn from(arg: OnError) -> Self {
        match arg {
            OnError::Fail => ErrorPolicy::Fail,
            OnError::Skip => ErrorPolicy::Skip,
            OnError::Passthrough => ErrorPolicy::Passthrough,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input record schema
    Input,
    /// Enriched output record schema
    Output,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), EnrichCliError> {
    let policy = ErrorPolicy::from(cli.on_error);

    match cli.command {
        Some(Commands::Schema {
            schema_type,
            json_schema,
        }) => cmd_schema(schema_type, json_schema),

        command => {
            let profile = load_profile(cli.profile)?;
            debug!(
                "subject profile: sex={} age={} height={}",
                profile.sex, profile.age, profile.height
            );
            let enricher = Enricher::new(profile);

            match command {
                Some(Commands::Run { no_flush }) => cmd_run(enricher, policy, !no_flush),
                Some(Commands::Validate { input, json }) => cmd_validate(&enricher, &input, json),
                Some(Commands::Schema { .. }) | None => cmd_run(enricher, policy, true),
            }
        }
    }
}

fn load_profile(args: ProfileArgs) -> Result<SubjectProfile, EnrichCliError> {
    let profile = match args.profile {
        Some(path) => {
            let json = fs::read_to_string(&path)?;
            SubjectProfile::from_json(&json)?
        }
        None => SubjectProfile::new(args.sex.into(), args.age, args.height)?,
    };
    Ok(profile)
}

fn cmd_run(enricher: Enricher, policy: ErrorPolicy, flush: bool) -> Result<(), EnrichCliError> {
    let stream = StreamEnricher::new(enricher)
        .with_policy(policy)
        .with_flush(flush);

    let stdin = io::stdin();
    let stdout = io::stdout();
    stream.process(stdin.lock(), stdout.lock())?;

    Ok(())
}

fn cmd_validate(enricher: &Enricher, input: &Path, json: bool) -> Result<(), EnrichCliError> {
    let input_data = if is_stdio(input) {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        buffer
    } else {
        fs::read(input)?
    };

    let mut report = ValidationReport::default();

    // Same line split as the stream: a final newline does not start another record
    let body = input_data.strip_suffix(b"\n").unwrap_or(&input_data[..]);
    let lines: Vec<&[u8]> = if input_data.is_empty() {
        Vec::new()
    } else {
        body.split(|b| *b == b'\n').collect()
    };

    for (index, line) in lines.into_iter().enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        report.total_records += 1;

        let result = ScaleRecord::parse_slice(line).and_then(|record| enricher.compute(&record));

        match result {
            Ok(Some(_)) => report.enrichable_records += 1,
            Ok(None) => report.passthrough_records += 1,
            Err(e) => report.errors.push(ValidationErrorDetail {
                line: index + 1,
                error: e.to_string(),
            }),
        }
    }
    report.invalid_records = report.errors.len();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:       {}", report.total_records);
        println!("Enrichable records:  {}", report.enrichable_records);
        println!("Without impedance:   {}", report.passthrough_records);
        println!("Invalid records:     {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - line {}: {}", err.line, err.error);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(EnrichCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), EnrichCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input: one JSON object per line");
                println!();
                println!("- weight: number, kilograms (required when impedance is present)");
                println!("- impedance: number (ohms), null, or absent");
                println!("- any other keys are copied to the output unchanged");
                println!();
                println!("Records without impedance are written back as-is.");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output: the input record, with these keys appended when impedance is present");
                println!();
                println!("- bmi: body mass index");
                println!("- body_fat_pct: body fat, percent (75 when above 63)");
                println!("- water_pct: body water, percent");
                println!("- visceral_fat: visceral fat index");
                println!("- bone_mass_kg: bone mass, kilograms (8.0 when above the limit)");
                println!("- muscle_kg: muscle mass, kilograms (120 when above the limit)");
            }
        }
    }

    Ok(())
}

// Helper functions

fn is_stdio(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "mibcs.measurement",
        "description": "Mi Body Composition Scale measurement",
        "type": "object",
        "properties": {
            "weight": { "type": "number", "description": "Body weight in kilograms" },
            "impedance": {
                "type": ["number", "null"],
                "description": "Bioelectrical impedance in ohms"
            }
        },
        "additionalProperties": true
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "mibcs.measurement.enriched",
        "description": "Mi Body Composition Scale measurement with derived metrics",
        "type": "object",
        "properties": {
            "weight": { "type": "number" },
            "impedance": { "type": ["number", "null"] },
            "bmi": { "type": "number" },
            "body_fat_pct": { "type": "number" },
            "water_pct": { "type": "number" },
            "visceral_fat": { "type": "number" },
            "bone_mass_kg": { "type": "number" },
            "muscle_kg": { "type": "number" }
        },
        "dependentRequired": {
            "impedance": [
                "weight", "bmi", "body_fat_pct", "water_pct",
                "visceral_fat", "bone_mass_kg", "muscle_kg"
            ]
        },
        "additionalProperties": true
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum EnrichCliError {
    Io(io::Error),
    Enrich(EnrichError),
    Json(serde_json::Error),
    ValidationFailed(usize),
}

impl From<io::Error> for EnrichCliError {
    fn from(e: io::Error) -> Self {
        EnrichCliError::Io(e)
    }
}

impl From<EnrichError> for EnrichCliError {
    fn from(e: EnrichError) -> Self {
        match e {
            EnrichError::Io(e) => EnrichCliError::Io(e),
            other => EnrichCliError::Enrich(other),
        }
    }
}

impl From<serde_json::Error> for EnrichCliError {
    fn from(e: serde_json::Error) -> Self {
        EnrichCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EnrichCliError> for CliError {
    fn from(e: EnrichCliError) -> Self {
        match e {
            EnrichCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EnrichCliError::Enrich(e) => {
                let (code, hint) = match e.root() {
                    EnrichError::InvalidProfile(_) => (
                        "PROFILE_ERROR",
                        "Check --sex, --age, --height or the --profile file",
                    ),
                    EnrichError::Json(_) | EnrichError::NotAnObject(_) => {
                        ("PARSE_ERROR", "Each input line must be a JSON object")
                    }
                    EnrichError::MissingField(_) | EnrichError::InvalidField { .. } => (
                        "RECORD_ERROR",
                        "Records with an impedance need a numeric weight",
                    ),
                    EnrichError::UndefinedIntermediate { .. } => (
                        "UNDEFINED_FORMULA",
                        "No visceral fat formula is defined for this profile and weight; use --on-error to continue",
                    ),
                    _ => ("ENRICH_ERROR", "Run 'mibcs-enrich validate' for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            EnrichCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EnrichCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records cannot be enriched", count),
                hint: Some("Fix the listed lines or pick an --on-error policy".to_string()),
            },
        }
    }
}

// Report types

#[derive(Default, serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    enrichable_records: usize,
    passthrough_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    line: usize,
    error: String,
}
