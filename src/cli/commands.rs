//! CLI subcommand definitions

use std::path::PathBuf;

use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Manage locally stored analysis sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Analyze a leaf image for nutrient deficiency
    Analyze {
        /// Leaf image (JPEG, PNG or WebP)
        image: PathBuf,
        #[command(flatten)]
        sample: SampleArgs,
        /// Attach to an existing in-progress session instead of creating one
        #[arg(long, value_name = "ID")]
        session: Option<String>,
    },
    /// Detect pests or disease in a plant image
    Pest {
        image: PathBuf,
        /// Abort the request after this many seconds
        #[arg(long, value_name = "SECS")]
        pest_timeout: Option<u64>,
    },
    /// Fertilizer application history kept by the backend
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Weather-driven yield guidance for a location
    Weather {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        #[arg(long)]
        crop: Option<String>,
    },
}

/// Sample context sent with a leaf image
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct SampleArgs {
    /// Plant age in days
    #[arg(long, value_name = "DAYS")]
    pub(crate) plant_age: Option<u32>,
    /// Sample type (e.g. leaf, whole-plant)
    #[arg(long, value_name = "TYPE")]
    pub(crate) sample_type: Option<String>,
}

#[derive(Subcommand)]
pub(crate) enum SessionCommands {
    /// Start a new session and print its id
    New,
    /// Show one session
    Show { id: String },
    /// List sessions, newest first
    List {
        #[arg(short, long)]
        limit: Option<usize>,
        /// Only completed sessions
        #[arg(long)]
        completed: bool,
    },
    /// Attach leaf image metadata to a session
    Leaf {
        id: String,
        image: PathBuf,
        #[command(flatten)]
        sample: SampleArgs,
    },
    /// Attach soil test readings (makes the session comprehensive)
    Soil {
        id: String,
        #[command(flatten)]
        soil: SoilArgs,
    },
    /// Mark an in-progress session as failed
    Fail {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Keep only the most recent sessions
    Prune {
        /// Defaults to the configured session cap
        #[arg(long)]
        keep: Option<usize>,
    },
    /// Delete one session
    Delete { id: String },
    /// Delete all sessions
    Clear,
    /// Session counts by status
    Stats,
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct SoilArgs {
    #[arg(long)]
    pub(crate) soil_type: Option<String>,
    #[arg(long)]
    pub(crate) ph: Option<f64>,
    /// kg/ha
    #[arg(long)]
    pub(crate) nitrogen: Option<f64>,
    /// kg/ha
    #[arg(long)]
    pub(crate) phosphorus: Option<f64>,
    /// kg/ha
    #[arg(long)]
    pub(crate) potassium: Option<f64>,
    /// Percent
    #[arg(long)]
    pub(crate) organic_matter: Option<f64>,
    /// Percent
    #[arg(long)]
    pub(crate) moisture: Option<f64>,
}

#[derive(Subcommand)]
pub(crate) enum HistoryCommands {
    /// List recorded fertilizer applications
    List,
    /// Record a fertilizer application
    Add {
        #[arg(long)]
        crop: String,
        #[arg(long)]
        fertilizer: String,
        #[arg(long, value_name = "KG")]
        quantity: Option<f64>,
        /// Application date (YYYYMMDD or YYYY-MM-DD), defaults to today
        #[arg(long, value_name = "DATE")]
        applied_on: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a recorded application
    Delete { id: String },
}
