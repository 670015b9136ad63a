use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use veredicto::cli::{AnalyzeArgs, Cli, Command, GenerateArgs, OutputFormat};
use veredicto::csv_output::CsvOutput;
use veredicto::dataset::Dataset;
use veredicto::experiment::AnalysisConfig;
use veredicto::json_output::JsonReport;
use veredicto::pipeline::{self, CleaningPlan};
use veredicto::recommendation::{ImpactThresholds, Recommendation};
use veredicto::sample_data::{self, SampleConfig};
use veredicto::text_output;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run_analyze(args: &AnalyzeArgs) -> Result<()> {
    let base = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    let config = args.apply_overrides(base);
    config.validate().context("Invalid analysis configuration")?;

    let dataset = Dataset::from_paths(&args.data, args.segments.as_deref(), &args.segment_column)?;

    let plan = CleaningPlan {
        duplicate_policy: args.duplicates,
        drop_misassigned: args.drop_misassigned,
    };
    let analysis = pipeline::analyze(&dataset, &config, plan).context("Analysis failed")?;
    let recommendation =
        Recommendation::from_results(&analysis.results, &ImpactThresholds::default());

    match args.format {
        OutputFormat::Text => {
            print!("{}", text_output::to_report_string(&analysis, &recommendation))
        }
        OutputFormat::Json => {
            println!("{}", JsonReport::new(&analysis, &recommendation).to_json()?)
        }
        OutputFormat::Csv => print!("{}", CsvOutput::new(&analysis.results).to_csv()?),
    }

    Ok(())
}

fn run_generate(args: &GenerateArgs) -> Result<()> {
    let config = SampleConfig {
        users: args.users,
        seed: args.seed,
        ..SampleConfig::default()
    };
    let (experiment, segments) =
        sample_data::write_sample_files(&config, &args.out_dir, &args.segment_column)?;

    println!("Wrote {}", experiment.display());
    println!("Wrote {}", segments.display());
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    match &args.command {
        Command::Analyze(analyze) => run_analyze(analyze),
        Command::Generate(generate) => run_generate(generate),
    }
}
