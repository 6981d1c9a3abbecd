//! End-to-end voice survey demo: fetch a survey definition from the REST
//! backend, open a live session configured as the survey's voice agent,
//! and stream microphone audio at it until Ctrl+C.
//!
//! Required env: GEMINI_API_KEY, SURVEY_ID. Optional: SURVEY_API_URL
//! (default http://localhost:5000/), SURVEY_AUTH_TOKEN, GEMINI_MODEL,
//! GEMINI_VOICE.

use std::env;
use std::sync::Arc;
use survey_live::auth::{Anonymous, IdentityProvider, StaticToken};
use survey_live::capture::AudioCapture;
use survey_live::coordinator::{SurveySession, client_for_survey};
use survey_live::{LiveEvent, SurveyApi};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    dotenv::dotenv().ok();

    let api_key = env::var("GEMINI_API_KEY").map_err(|_| "GEMINI_API_KEY not set")?;
    let survey_id = env::var("SURVEY_ID").map_err(|_| "SURVEY_ID not set")?;
    let backend_url =
        env::var("SURVEY_API_URL").unwrap_or_else(|_| "http://localhost:5000/".to_string());
    let model = env::var("GEMINI_MODEL")
        .unwrap_or_else(|_| "models/gemini-2.0-flash-exp".to_string());
    let voice = env::var("GEMINI_VOICE").unwrap_or_else(|_| "Aoede".to_string());

    let identity: Arc<dyn IdentityProvider> = match env::var("SURVEY_AUTH_TOKEN") {
        Ok(token) => Arc::new(StaticToken::new(token)),
        Err(_) => Arc::new(Anonymous),
    };
    let api = SurveyApi::new(&backend_url, identity)?;

    info!("fetching survey {survey_id} from {backend_url}");
    let survey = api.fetch(&survey_id).await?;
    info!(
        "running survey \"{}\" with {} questions",
        survey.title,
        survey.questions.len()
    );

    let client = client_for_survey(&api_key, &model, &voice, &survey);
    let session = Arc::new(SurveySession::new(client, api, survey));

    // Print the model's text output and flag interruptions; audio playback
    // is out of scope for this demo.
    let mut events = session.client().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                LiveEvent::Content(parts) => {
                    for part in parts {
                        if let Some(text) = part.text {
                            println!("model: {text}");
                        }
                    }
                }
                LiveEvent::Interrupted => info!("model interrupted"),
                LiveEvent::TurnComplete => info!("model turn complete"),
                LiveEvent::Error(e) => error!("session error: {e}"),
                _ => {}
            }
        }
    });

    let (mut capture, capture_rx) = AudioCapture::new();
    capture.start()?;
    info!("microphone live; Ctrl+C to end the session");

    let pump = {
        let session = session.clone();
        tokio::spawn(async move {
            if let Err(e) = session.pump_capture(capture_rx).await {
                warn!("capture pump stopped: {e}");
            }
        })
    };

    let runner = {
        let session = session.clone();
        tokio::spawn(async move { session.run().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    capture.stop();
    // Dropping the capture closes the event channel, ending the pump task.
    drop(capture);
    session.client().disconnect();

    pump.await?;
    runner.await??;
    Ok(())
}
