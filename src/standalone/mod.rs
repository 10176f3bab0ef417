use clap::{ArgAction, Parser, Subcommand};

pub mod engine;

/// Default number of reduce buckets.
pub const DEFAULT_REDUCERS: u32 = 11;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` overrides this.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one pipeline stage over local files
    Submit {
        /// Glob spec for the input files
        #[arg(short, long)]
        input: String,

        /// Name of the stage: preprocess, lemma-freq, sentiment or trend
        #[arg(short, long)]
        workload: String,

        /// Output directory
        #[arg(short, long)]
        output: String,

        /// Number of reduce buckets (one output file each)
        #[arg(short, long, default_value_t = DEFAULT_REDUCERS)]
        reducers: u32,

        /// Stage arguments, e.g. `-- --lexicon afinn.txt`.
        #[clap(value_parser, last = true)]
        args: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct Job {
    pub input: String,
    pub workload: String,
    pub output: String,
    pub reducers: u32,
    pub args: Vec<String>,
}

impl From<Commands> for Job {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Submit {
                input,
                workload,
                output,
                reducers,
                args,
            } => Job {
                input,
                workload,
                output,
                reducers,
                args,
            },
        }
    }
}
