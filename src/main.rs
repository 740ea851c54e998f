use anyhow::Result;
use chart_store::{
    Args, ChartData, ChartStore, SongInfoPatch, load_chart_file, parse_note, parse_position,
    parse_timing_point, save_chart_file,
};
use clap::Parser;
use log::{debug, info};

fn song_info_patch(args: &Args) -> SongInfoPatch {
    SongInfoPatch {
        title: args.title.clone(),
        artist: args.artist.clone(),
        audio_file: args.audio_file.clone(),
        audio_offset: args.audio_offset,
        total_measures: args.measures,
        volume: args.volume.map(|v| v.clamp(0.0, 1.0)),
        difficulty: args.difficulty.clone(),
        level: args.level,
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Parse everything up front so a typo doesn't leave a half-applied edit.
    let timing_points = args
        .timing_points
        .iter()
        .map(|s| parse_timing_point(s))
        .collect::<Result<Vec<_>>>()?;
    let notes = args
        .notes
        .iter()
        .map(|s| parse_note(s))
        .collect::<Result<Vec<_>>>()?;
    let queries = args
        .queries
        .iter()
        .map(|s| parse_position(s))
        .collect::<Result<Vec<_>>>()?;
    let patch = song_info_patch(&args);

    let chart = match &args.chart {
        Some(path) => {
            info!("Opening chart: '{}'...", path.display());
            load_chart_file(path)?
        }
        None => {
            debug!("No chart given, starting from the default chart..!");
            ChartData::default()
        }
    };

    let mut store = ChartStore::with_chart(chart);

    let edited = args.clear_notes
        || !patch.is_empty()
        || !timing_points.is_empty()
        || !notes.is_empty();
    if edited {
        store.perform_batch_operation(|store| {
            if args.clear_notes {
                store.clear_notes();
            }
            if !patch.is_empty() {
                store.set_song_info(patch);
            }
            for tp in timing_points {
                store.add_timing_point(tp);
            }
            for note in notes {
                store.add_note(note);
            }
        });
        debug!("Applied edits as a single history entry..!");
    }

    for (measure, beat) in queries {
        info!(
            "At {}:{} -> {} bpm, {}",
            measure,
            beat,
            store.bpm_at(measure, beat),
            store.time_signature_at(measure, beat)
        );
    }

    if args.verbose {
        let song = store.song_info();
        info!(
            "'{}' by '{}' [{} {}] | {} measures | audio: '{}' offset {:.3}s volume {:.2}",
            song.title,
            song.artist,
            song.difficulty,
            song.level,
            song.total_measures,
            song.audio_file,
            song.audio_offset,
            song.volume
        );
        for (i, tp) in store.timing_points().iter().enumerate() {
            info!(
                "Timing point {}: {}:{} {} bpm {}",
                i, tp.measure, tp.beat, tp.bpm, tp.time_signature
            );
        }
        let holds = store.notes().iter().filter(|n| n.duration().is_some()).count();
        info!(
            "{} notes ({} taps, {} holds)",
            store.notes().len(),
            store.notes().len() - holds,
            holds
        );
    }

    if let Some(output) = &args.output {
        save_chart_file(output, &store.chart_data())?;
    }

    if args.print {
        println!("{}", store.export_chart_data()?);
    }

    Ok(())
}
