use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "chart_store",
    about = "Inspect and edit rhythm game chart files."
)]
pub struct Args {
    /// Path to the chart file to open. A new default chart is used when omitted.
    pub chart: Option<PathBuf>,

    /// Song title.
    #[arg(long)]
    pub title: Option<String>,

    /// Song artist.
    #[arg(long)]
    pub artist: Option<String>,

    /// Reference audio file for the chart.
    #[arg(long = "audio-file")]
    pub audio_file: Option<String>,

    /// Audio offset in seconds. Negative values pre-roll the audio.
    #[arg(long = "audio-offset", allow_negative_numbers = true)]
    pub audio_offset: Option<f64>,

    /// Total measure count of the chart.
    #[arg(long)]
    pub measures: Option<u32>,

    /// Playback volume between 0.0 and 1.0.
    #[arg(long)]
    pub volume: Option<f64>,

    /// Free-form difficulty label, e.g. Normal|Hard|Expert.
    #[arg(long)]
    pub difficulty: Option<String>,

    /// Difficulty level.
    #[arg(long)]
    pub level: Option<u32>,

    /// Add or replace a timing point. Format: `MEASURE:BEAT:BPM[:NUM/DEN]`.
    #[arg(long = "bpm")]
    pub timing_points: Vec<String>,

    /// Add a note. Format: `MEASURE:BEAT:LANE[:HOLD_BEATS]`.
    #[arg(long = "note")]
    pub notes: Vec<String>,

    /// Remove every note before adding new ones.
    #[arg(long = "clear-notes", default_value_t = false)]
    pub clear_notes: bool,

    /// Print the tempo and time signature at a position. Format: `MEASURE:BEAT`.
    #[arg(long = "at")]
    pub queries: Vec<String>,

    /// Write the resulting chart to this path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the resulting chart to stdout.
    #[arg(short, long, default_value_t = false)]
    pub print: bool,

    /// Prints extra information to the terminal.
    #[arg(short, long)]
    pub verbose: bool,
}
