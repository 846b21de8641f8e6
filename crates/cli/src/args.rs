use std::path::PathBuf;

use auditwatch_core::options::{DEFAULT_MAX_RETRIES, DEFAULT_MODEL};
use auditwatch_core::{AnalysisOptions, ExportFormat};
use clap::{Args, Parser, Subcommand};

/// Submit a contract for analysis and follow the pipeline's progress.
#[derive(Parser, Debug)]
#[command(name = "auditwatch", author, version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the REST endpoints.
    #[arg(long, env = "AUDITWATCH_API_URL")]
    pub api_url: Option<String>,

    /// WebSocket endpoint of the push channel.
    #[arg(long, env = "AUDITWATCH_EVENTS_URL")]
    pub events_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a contract source file.
    Upload {
        file: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },

    /// Analyse a deployed contract by address.
    Fetch {
        #[arg(long, default_value = "mainnet")]
        network: String,

        #[arg(long)]
        address: String,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },
}

impl Command {
    pub fn analysis(&self) -> &AnalysisArgs {
        match self {
            Command::Upload { analysis, .. } | Command::Fetch { analysis, .. } => analysis,
        }
    }
}

/// Flags that make up the start-analysis options.
#[derive(Args, Debug, Clone)]
pub struct AnalysisArgs {
    /// Model for every stage unless a stage flag overrides it.
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long)]
    pub analyzer_model: Option<String>,

    #[arg(long)]
    pub skeptic_model: Option<String>,

    #[arg(long)]
    pub exploiter_model: Option<String>,

    #[arg(long)]
    pub generator_model: Option<String>,

    /// Do not execute generated exploits.
    #[arg(long)]
    pub no_auto_run: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Disable retrieval-augmented context.
    #[arg(long)]
    pub no_rag: bool,

    /// Stop after verification.
    #[arg(long)]
    pub skip_poc_generation: bool,

    /// Export a markdown report with the results.
    #[arg(long)]
    pub export_markdown: bool,
}

impl AnalysisArgs {
    pub fn to_options(&self) -> AnalysisOptions {
        let mut options = AnalysisOptions::default().with_model(self.model.clone());
        let overrides = [
            (&self.analyzer_model, &mut options.analyzer_model),
            (&self.skeptic_model, &mut options.skeptic_model),
            (&self.exploiter_model, &mut options.exploiter_model),
            (&self.generator_model, &mut options.generator_model),
        ];
        for (flag, field) in overrides {
            if let Some(model) = flag {
                *field = model.clone();
            }
        }

        options.auto_run = !self.no_auto_run;
        options.max_retries = self.max_retries;
        options.use_rag = !self.no_rag;
        options.skip_poc_generation = self.skip_poc_generation;
        options.export_format = self.export_markdown.then_some(ExportFormat::Markdown);
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("auditwatch").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn upload_defaults_match_analysis_defaults() {
        let cli = parse(&["upload", "Token.sol"]);
        match &cli.command {
            Command::Upload { file, analysis } => {
                assert_eq!(file, &PathBuf::from("Token.sol"));
                assert_eq!(analysis.to_options(), AnalysisOptions::default());
            }
            other => panic!("Expected Upload, got {other:?}"),
        }
    }

    #[test]
    fn fetch_flags_map_onto_options() {
        let cli = parse(&[
            "fetch",
            "--network",
            "sepolia",
            "--address",
            "0xabc",
            "--model",
            "gpt-4o",
            "--skeptic-model",
            "o1",
            "--no-auto-run",
            "--max-retries",
            "5",
            "--export-markdown",
        ]);
        let Command::Fetch {
            network,
            address,
            analysis,
        } = &cli.command
        else {
            panic!("Expected Fetch, got {:?}", cli.command);
        };
        assert_eq!(network, "sepolia");
        assert_eq!(address, "0xabc");

        let options = analysis.to_options();
        assert_eq!(options.analyzer_model, "gpt-4o");
        assert_eq!(options.skeptic_model, "o1");
        assert!(!options.auto_run);
        assert_eq!(options.max_retries, 5);
        assert_eq!(options.export_format, Some(ExportFormat::Markdown));
    }

    #[test]
    fn fetch_requires_address() {
        let result = Cli::try_parse_from(["auditwatch", "fetch", "--network", "mainnet"]);
        assert!(result.is_err());
    }
}
