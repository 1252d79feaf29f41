use clap::{Parser, Subcommand};
use docvoice_core::LanguageCode;
use docvoice_realtime::CallMode;
use docvoice_session::DEFAULT_LIST_LIMIT;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docvoice")]
#[command(about = "Doctor-finder voice assistant", long_about = None)]
pub struct Cli {
    /// Where recordings and chat logs are kept
    #[arg(long, global = true, env = "DOCVOICE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Export spans to this OTLP collector, e.g. http://localhost:4317
    #[arg(long, global = true, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a live call. Typed lines are sent as you speak them.
    Call {
        /// duplex or turn-based
        #[arg(short, long, default_value = "duplex")]
        mode: CallMode,

        /// BCP-47 tag, e.g. hi-IN
        #[arg(short, long, default_value = "en-IN")]
        language: LanguageCode,
    },

    /// Ask one question over text chat
    Chat {
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// List recent call recordings and chat sessions
    History {
        #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },
}
