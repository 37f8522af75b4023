use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the chat, crop prediction and highlight endpoints
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Stream an error analysis of a source file
    Analyze {
        /// Source file to analyze
        file: PathBuf,

        #[arg(short, long, default_value = "javascript")]
        language: String,

        /// Write the cleaned corrected code back to the file
        #[arg(long)]
        apply: bool,
    },

    /// Simulate running a source file
    Execute {
        file: PathBuf,

        #[arg(short, long, default_value = "javascript")]
        language: String,
    },

    /// Interactive chat with the assistant
    Chat,

    /// Recommend a crop for the given soil and climate readings
    Predict {
        #[arg(long, allow_negative_numbers = true)]
        nitrogen: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        phosphorus: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        potassium: Option<f64>,
        /// Degrees Celsius
        #[arg(long, allow_negative_numbers = true)]
        temperature: Option<f64>,
        /// Relative humidity in percent
        #[arg(long, allow_negative_numbers = true)]
        humidity: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        ph: Option<f64>,
        /// Millimetres
        #[arg(long, allow_negative_numbers = true)]
        rainfall: Option<f64>,
    },

    /// Render a source file as highlighted HTML
    Highlight {
        file: PathBuf,

        #[arg(short, long, default_value = "javascript")]
        language: String,
    },

    /// Show usage statistics
    Stats,
}

/// Define the application arguments
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Chat completion endpoint, overrides the configured one
    #[arg(long, global = true)]
    pub endpoint: Option<String>,
}

impl Args {
    pub fn parse() -> Self {
        <Args as Parser>::parse()
    }
}
