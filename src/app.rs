use std::path::Path;
use std::time::Duration;

use chrono::{Local, Utc};
use tracing::{debug, warn};

use crate::cli::{Cli, Commands, HistoryCommands, SampleArgs, SessionCommands, Settings, SoilArgs};
use crate::client::{AnalysisClient, AnalysisRequest, DeficiencyPrediction, HistoryEntry};
use crate::consts::{DATE_FORMAT, STORE_FILE};
use crate::error::{AppError, ClientError, StoreError};
use crate::image::{ImageInfo, inspect_image};
use crate::output::{
    print_history, print_json, print_pest, print_prediction, print_session_counts,
    print_session_detail, print_session_table, print_weather,
};
use crate::store::{
    AnalysisResults, LeafMetadata, MemoryKv, SessionStatus, SessionStore, SoilMetadata, SqliteKv,
    timestamp,
};
use crate::utils::{confirm, parse_date};

pub(crate) struct CommandContext<'a> {
    pub(crate) cli: &'a Cli,
    pub(crate) settings: &'a Settings,
}

impl CommandContext<'_> {
    fn open_store(&self) -> Result<SessionStore, AppError> {
        let max = self.settings.max_sessions;
        if self.cli.ephemeral {
            return Ok(SessionStore::new(Box::new(MemoryKv::default()), max));
        }
        let path = self.settings.data_dir.join(STORE_FILE);
        debug!(path = %path.display(), "opening session store");
        Ok(SessionStore::new(Box::new(SqliteKv::open(&path)?), max))
    }

    fn client(&self) -> Result<AnalysisClient, AppError> {
        Ok(AnalysisClient::new(
            self.settings.base_urls.clone(),
            self.settings.timeout,
        )?)
    }
}

fn leaf_metadata(info: &ImageInfo, sample: &SampleArgs) -> LeafMetadata {
    LeafMetadata {
        file_name: info.file_name.clone(),
        file_size: info.file_size,
        format: info.format.as_str().to_string(),
        width: info.dimensions.map(|(w, _)| w),
        height: info.dimensions.map(|(_, h)| h),
        plant_age_days: sample.plant_age,
        sample_type: sample.sample_type.clone(),
        captured_at: timestamp(Utc::now()),
    }
}

fn analysis_request(info: ImageInfo, sample: &SampleArgs) -> AnalysisRequest {
    AnalysisRequest {
        mime_type: info.format.mime_type().to_string(),
        file_name: info.file_name,
        bytes: info.bytes,
        plant_age_days: sample.plant_age,
        sample_type: sample.sample_type.clone(),
    }
}

fn soil_metadata(args: &SoilArgs) -> SoilMetadata {
    SoilMetadata {
        soil_type: args.soil_type.clone(),
        ph: args.ph,
        nitrogen: args.nitrogen,
        phosphorus: args.phosphorus,
        potassium: args.potassium,
        organic_matter: args.organic_matter,
        moisture: args.moisture,
        collected_at: timestamp(Utc::now()),
    }
}

fn results_from(prediction: &DeficiencyPrediction) -> AnalysisResults {
    AnalysisResults {
        deficiency: prediction.deficiency.clone(),
        confidence: prediction.confidence,
        recommendations: prediction.recommendations.clone(),
        raw: prediction.raw.clone(),
        completed_at: timestamp(Utc::now()),
    }
}

fn handle_session(command: &SessionCommands, ctx: &CommandContext<'_>) -> Result<(), AppError> {
    let store = ctx.open_store()?;
    let json = ctx.cli.json;
    let use_color = ctx.cli.use_color();

    match command {
        SessionCommands::New => {
            let id = store.create_session()?;
            if json {
                print_json(&serde_json::json!({ "id": id }))?;
            } else {
                println!("{id}");
            }
        }
        SessionCommands::Show { id } => {
            let session = store
                .get_session(id)?
                .ok_or_else(|| StoreError::SessionNotFound { id: id.clone() })?;
            if json {
                print_json(&session)?;
            } else {
                print_session_detail(&session, use_color);
            }
        }
        SessionCommands::List { limit, completed } => {
            let sessions = if *completed {
                store.list_completed(*limit)?
            } else {
                store.list_sessions(*limit)?
            };
            if json {
                print_json(&sessions)?;
            } else {
                print_session_table(&sessions, use_color);
            }
        }
        SessionCommands::Leaf { id, image, sample } => {
            let info = inspect_image(image)?;
            let session = store.attach_leaf_metadata(id, leaf_metadata(&info, sample))?;
            if json {
                print_json(&session)?;
            } else {
                print_session_detail(&session, use_color);
            }
        }
        SessionCommands::Soil { id, soil } => {
            let session = store.attach_soil_metadata(id, soil_metadata(soil))?;
            if json {
                print_json(&session)?;
            } else {
                print_session_detail(&session, use_color);
            }
        }
        SessionCommands::Fail { id, reason } => {
            let session = store.fail_session(id, reason.clone())?;
            if json {
                print_json(&session)?;
            } else {
                println!("Session {} marked failed.", session.id);
            }
        }
        SessionCommands::Prune { keep } => {
            let keep = keep.unwrap_or(ctx.settings.max_sessions);
            let evicted = store.prune(keep)?;
            if json {
                print_json(&serde_json::json!({ "evicted": evicted, "keep": keep }))?;
            } else {
                println!("Pruned {evicted} session(s), keeping at most {keep}.");
            }
        }
        SessionCommands::Delete { id } => {
            store.delete_session(id)?;
            if json {
                print_json(&serde_json::json!({ "deleted": id }))?;
            } else {
                println!("Deleted {id}.");
            }
        }
        SessionCommands::Clear => {
            store.clear()?;
            if json {
                print_json(&serde_json::json!({ "cleared": true }))?;
            } else {
                println!("All sessions deleted.");
            }
        }
        SessionCommands::Stats => {
            let counts = store.counts()?;
            if json {
                print_json(&counts)?;
            } else {
                print_session_counts(&counts, ctx.settings.max_sessions, use_color);
            }
        }
    }
    Ok(())
}

/// Reuse an existing session only while it is still in progress
fn resolve_session(store: &SessionStore, requested: Option<&str>) -> Result<String, AppError> {
    let Some(id) = requested else {
        return Ok(store.create_session()?);
    };
    let session = store
        .get_session(id)?
        .ok_or_else(|| StoreError::SessionNotFound { id: id.to_string() })?;
    if session.status != SessionStatus::InProgress {
        return Err(StoreError::InvalidTransition {
            id: session.id,
            from: session.status,
            to: SessionStatus::Completed,
        }
        .into());
    }
    Ok(session.id)
}

fn handle_analyze(
    image: &Path,
    sample: &SampleArgs,
    session: Option<&str>,
    ctx: &CommandContext<'_>,
) -> Result<(), AppError> {
    let info = inspect_image(image)?;
    let client = ctx.client()?;
    let store = ctx.open_store()?;
    let id = resolve_session(&store, session)?;
    store.attach_leaf_metadata(&id, leaf_metadata(&info, sample))?;
    let request = analysis_request(info, sample);

    loop {
        match client.analyze_leaf(&request) {
            Ok(prediction) => {
                store.complete_session(&id, results_from(&prediction))?;
                if ctx.cli.json {
                    print_json(&serde_json::json!({
                        "session_id": id,
                        "deficiency": prediction.deficiency,
                        "confidence": prediction.confidence,
                        "recommendations": prediction.recommendations,
                        "response": prediction.raw,
                    }))?;
                } else {
                    print_prediction(&id, &prediction, ctx.cli.use_color());
                }
                return Ok(());
            }
            Err(e @ ClientError::AllCandidatesFailed { .. }) if ctx.cli.can_prompt() => {
                eprintln!("{e}");
                if confirm("Could not reach any analysis server. Try again?") {
                    continue;
                }
                store.fail_session(&id, Some(e.to_string()))?;
                return Err(e.into());
            }
            Err(e) => {
                warn!(session = %id, error = %e, "leaf analysis failed");
                store.fail_session(&id, Some(e.to_string()))?;
                return Err(e.into());
            }
        }
    }
}

fn handle_pest(image: &Path, timeout: Option<u64>, ctx: &CommandContext<'_>) -> Result<(), AppError> {
    let info = inspect_image(image)?;
    let client = ctx.client()?;
    let timeout = timeout
        .map(Duration::from_secs)
        .unwrap_or(ctx.settings.pest_timeout);
    let detection = client.detect_pest(&analysis_request(info, &SampleArgs::default()), timeout)?;
    if ctx.cli.json {
        print_json(&detection)?;
    } else {
        print_pest(&detection, ctx.cli.use_color());
    }
    Ok(())
}

fn handle_history(command: &HistoryCommands, ctx: &CommandContext<'_>) -> Result<(), AppError> {
    let client = ctx.client()?;
    match command {
        HistoryCommands::List => {
            let entries = client.list_history()?;
            if ctx.cli.json {
                print_json(&entries)?;
            } else {
                print_history(&entries, ctx.cli.use_color());
            }
        }
        HistoryCommands::Add {
            crop,
            fertilizer,
            quantity,
            applied_on,
            notes,
        } => {
            let applied_on = match applied_on {
                Some(raw) => parse_date(raw)?,
                None => Local::now().date_naive(),
            };
            let entry = HistoryEntry {
                id: None,
                crop: crop.clone(),
                fertilizer: fertilizer.clone(),
                quantity_kg: *quantity,
                applied_on: applied_on.format(DATE_FORMAT).to_string(),
                notes: notes.clone(),
            };
            let stored = client.add_history(&entry)?;
            if ctx.cli.json {
                print_json(&stored)?;
            } else {
                print_history(std::slice::from_ref(&stored), ctx.cli.use_color());
            }
        }
        HistoryCommands::Delete { id } => {
            client.delete_history(id)?;
            if ctx.cli.json {
                print_json(&serde_json::json!({ "deleted": id }))?;
            } else {
                println!("Deleted history entry {id}.");
            }
        }
    }
    Ok(())
}

fn handle_weather(
    lat: f64,
    lon: f64,
    crop: Option<&str>,
    ctx: &CommandContext<'_>,
) -> Result<(), AppError> {
    let guidance = ctx.client()?.weather_guidance(lat, lon, crop)?;
    if ctx.cli.json {
        print_json(&guidance)?;
    } else {
        print_weather(&guidance, ctx.cli.use_color());
    }
    Ok(())
}

pub(crate) fn run(ctx: &CommandContext<'_>) -> Result<(), AppError> {
    match &ctx.cli.command {
        Commands::Session { command } => handle_session(command, ctx),
        Commands::Analyze {
            image,
            sample,
            session,
        } => handle_analyze(image, sample, session.as_deref(), ctx),
        Commands::Pest {
            image,
            pest_timeout,
        } => handle_pest(image, *pest_timeout, ctx),
        Commands::History { command } => handle_history(command, ctx),
        Commands::Weather { lat, lon, crop } => handle_weather(*lat, *lon, crop.as_deref(), ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageFormat;

    fn info() -> ImageInfo {
        ImageInfo {
            file_name: "leaf.png".to_string(),
            file_size: 4,
            format: ImageFormat::Png,
            dimensions: Some((20, 10)),
            bytes: vec![1, 2, 3, 4],
        }
    }

    #[test]
    fn leaf_metadata_copies_image_facts() {
        let sample = SampleArgs {
            plant_age: Some(21),
            sample_type: Some("leaf".to_string()),
        };
        let meta = leaf_metadata(&info(), &sample);
        assert_eq!(meta.format, "png");
        assert_eq!((meta.width, meta.height), (Some(20), Some(10)));
        assert_eq!(meta.plant_age_days, Some(21));
    }

    #[test]
    fn request_uses_detected_mime_type() {
        let request = analysis_request(info(), &SampleArgs::default());
        assert_eq!(request.mime_type, "image/png");
        assert_eq!(request.bytes.len(), 4);
    }

    #[test]
    fn resolve_session_rejects_finished_sessions() {
        let store = SessionStore::new(Box::new(MemoryKv::default()), 5);
        let id = store.create_session().unwrap();
        assert_eq!(resolve_session(&store, Some(&id)).unwrap(), id);
        store.fail_session(&id, None).unwrap();
        assert!(resolve_session(&store, Some(&id)).is_err());
        assert!(resolve_session(&store, Some("session_missing")).is_err());
        let fresh = resolve_session(&store, None).unwrap();
        assert_ne!(fresh, id);
    }
}
