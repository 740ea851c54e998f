use crate::model::chart::{Note, TimeSignature, TimingPoint};
use anyhow::{Context, Result, bail};

fn parse_field<T: std::str::FromStr>(field: &str, name: &str, input: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    field
        .trim()
        .parse::<T>()
        .with_context(|| format!("Invalid {} '{}' in '{}'", name, field, input))
}

fn parse_beat(field: &str, input: &str) -> Result<f64> {
    let beat: f64 = parse_field(field, "beat", input)?;
    if !beat.is_finite() || beat < 0.0 {
        bail!("Beat must be a non-negative number in '{}'..!", input);
    }
    Ok(beat)
}

/// Parses `MEASURE:BEAT`, e.g. `3:1.5`.
pub fn parse_position(input: &str) -> Result<(u32, f64)> {
    let parts: Vec<&str> = input.split(':').collect();
    let [measure, beat] = parts.as_slice() else {
        bail!("Expected MEASURE:BEAT, got '{}'..!", input);
    };

    Ok((parse_field(measure, "measure", input)?, parse_beat(beat, input)?))
}

/// Parses `NUM/DEN`, e.g. `6/8`.
pub fn parse_time_signature(input: &str) -> Result<TimeSignature> {
    let Some((numerator, denominator)) = input.split_once('/') else {
        bail!("Expected NUM/DEN, got '{}'..!", input);
    };

    let numerator: u32 = parse_field(numerator, "numerator", input)?;
    let denominator: u32 = parse_field(denominator, "denominator", input)?;
    if numerator == 0 || denominator == 0 {
        bail!("Time signature parts must be positive in '{}'..!", input);
    }

    Ok(TimeSignature(numerator, denominator))
}

/// Parses `MEASURE:BEAT:BPM[:NUM/DEN]`. The time signature defaults to 4/4.
pub fn parse_timing_point(input: &str) -> Result<TimingPoint> {
    let parts: Vec<&str> = input.split(':').collect();
    let (measure, beat, bpm, signature) = match parts.as_slice() {
        [m, b, bpm] => (m, b, bpm, None),
        [m, b, bpm, sig] => (m, b, bpm, Some(sig)),
        _ => bail!("Expected MEASURE:BEAT:BPM[:NUM/DEN], got '{}'..!", input),
    };

    let bpm: f64 = parse_field(bpm, "bpm", input)?;
    if !bpm.is_finite() || bpm <= 0.0 {
        bail!("Tempo must be positive in '{}'..!", input);
    }

    let time_signature = match signature {
        Some(sig) => parse_time_signature(sig)?,
        None => TimeSignature::default(),
    };

    Ok(TimingPoint::new(
        parse_field(measure, "measure", input)?,
        parse_beat(beat, input)?,
        bpm,
        time_signature,
    ))
}

/// Parses `MEASURE:BEAT:LANE[:HOLD_BEATS]`. A hold length makes it a hold note.
pub fn parse_note(input: &str) -> Result<Note> {
    let parts: Vec<&str> = input.split(':').collect();
    let (measure, beat, lane, hold) = match parts.as_slice() {
        [m, b, l] => (m, b, l, None),
        [m, b, l, h] => (m, b, l, Some(h)),
        _ => bail!("Expected MEASURE:BEAT:LANE[:HOLD_BEATS], got '{}'..!", input),
    };

    let measure = parse_field(measure, "measure", input)?;
    let beat = parse_beat(beat, input)?;
    let lane = parse_field(lane, "lane", input)?;

    match hold {
        None => Ok(Note::tap(measure, beat, lane)),
        Some(hold) => {
            let duration: f64 = parse_field(hold, "hold length", input)?;
            if !duration.is_finite() || duration <= 0.0 {
                bail!("Hold length must be positive in '{}'..!", input);
            }
            Ok(Note::hold(measure, beat, lane, duration))
        }
    }
}
