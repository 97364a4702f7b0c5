//! WhatsApp Webhook Lambda - Handles inbound Twilio WhatsApp messages.
//!
//! Verifies the Twilio request signature, then either screens a meal photo
//! against the sender's dietary restrictions or classifies a text message
//! and answers it. A safe meal waits for its meal type before it is logged.
//! Replies are returned inline as TwiML.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::twilio::{self, InboundMessage, MessageKind};
use shared::meals::{
    changed_reply, logged_reply, CHANGE_MEAL_TYPE_HELP, MEAL_TYPE_REPROMPT, NO_MEAL_TO_UPDATE,
};
use shared::{
    create_pool, handle_restriction_intent, help_text, AgentClient, AllergenKnowledgeBase, Config,
    Intent, IntentClassifier, MealLogDispatcher, MealLogRequest, MealReply, MealScreener,
    MealStatus, MealStore, MealType, RestrictionStore, ScreeningDecision, SecretStore,
    VisionClient,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const STORE_ERROR_REPLY: &str =
    "Sorry, I couldn't reach your profile right now. Please try again in a moment.";

const AGENT_ERROR_REPLY: &str =
    "Sorry, I couldn't answer that right now. Please try again in a moment.";

const LOG_ERROR_REPLY: &str =
    "⚠️ Your meal looked fine, but I couldn't save it. Please send the photo again.";

const UPDATE_ERROR_REPLY: &str =
    "Sorry, I couldn't update your last meal right now. Please try again in a moment.";

/// API Gateway proxy request (simplified)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGatewayRequest {
    headers: Option<HashMap<String, String>>,
    body: Option<String>,
    is_base64_encoded: Option<bool>,
}

/// API Gateway proxy response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGatewayResponse {
    status_code: u16,
    headers: HashMap<String, String>,
    body: String,
    is_base64_encoded: bool,
}

impl ApiGatewayResponse {
    fn new(status_code: u16, body: &str, content_type: &str) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        Self {
            status_code,
            headers,
            body: body.to_string(),
            is_base64_encoded: false,
        }
    }

    fn twiml(reply: &str) -> Self {
        Self::new(200, &twilio::twiml(reply), "application/xml")
    }

    fn text(status_code: u16, body: &str) -> Self {
        Self::new(status_code, body, "text/plain")
    }
}

/// Application state
struct AppState {
    config: Config,
    classifier: IntentClassifier,
    screener: MealScreener,
    agent_client: AgentClient,
    vision_client: VisionClient,
    meal_logger: MealLogDispatcher,
    store: RestrictionStore,
    meals: MealStore,
    twilio_auth_token: String,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;

        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let lambda_client = aws_sdk_lambda::Client::new(&aws_config);
        let secrets = SecretStore::new(aws_sdk_secretsmanager::Client::new(&aws_config));

        let credentials = secrets.database_credentials(&config.db_secret_arn).await?;
        let pool = create_pool(&config, &credentials).await?;
        let twilio_auth_token = secrets
            .twilio_auth_token(&config.twilio_auth_token_secret_arn)
            .await?;

        let knowledge_base = Arc::new(AllergenKnowledgeBase::standard());

        info!(
            unknown_ingredients = %config.unknown_ingredients,
            "WhatsApp webhook initialised"
        );

        Ok(Self {
            classifier: IntentClassifier::new()?,
            screener: MealScreener::new(knowledge_base, config.unknown_ingredients),
            agent_client: AgentClient::new(
                lambda_client.clone(),
                config.agent_function_name.clone(),
            ),
            vision_client: VisionClient::new(
                lambda_client.clone(),
                config.vision_function_name.clone(),
            ),
            meal_logger: MealLogDispatcher::new(
                lambda_client,
                config.meal_logger_function_name.clone(),
            ),
            store: RestrictionStore::new(pool.clone()),
            meals: MealStore::new(pool),
            twilio_auth_token,
            config,
        })
    }

    /// Answer a text message.
    async fn handle_text(&self, phone: &str, text: &str) -> String {
        let intent = self.classifier.classify(text);

        let pending = match self.meals.find(phone, MealStatus::AwaitingMealType).await {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Pending meal lookup failed: {}", e);
                None
            }
        };
        if let Some(meal_reply) = MealReply::from_message(text, pending.is_some(), &intent) {
            info!(?meal_reply, "Handling meal follow-up");
            return self.handle_meal_reply(phone, meal_reply, pending).await;
        }

        info!(intent = intent.name(), "Handling text message");

        match intent {
            Intent::Help | Intent::General => help_text(),
            intent if intent.is_restriction_intent() => {
                self.handle_restriction(phone, &intent, text).await
            }
            intent => {
                let restrictions = match self.store.load(phone).await {
                    Ok(stored) => stored,
                    Err(e) => {
                        warn!("Restriction lookup failed, asking agent without them: {}", e);
                        None
                    }
                };
                match self
                    .agent_client
                    .ask(text, phone, intent, restrictions)
                    .await
                {
                    Ok(answer) => answer,
                    Err(e) => {
                        error!("Agent error: {}", e);
                        AGENT_ERROR_REPLY.to_string()
                    }
                }
            }
        }
    }

    async fn handle_restriction(&self, phone: &str, intent: &Intent, text: &str) -> String {
        let stored = match self.store.load(phone).await {
            Ok(stored) => stored,
            Err(e) => {
                error!("Failed to load restrictions: {}", e);
                return STORE_ERROR_REPLY.to_string();
            }
        };

        let Some(update) = handle_restriction_intent(intent, stored.as_deref(), text) else {
            return help_text();
        };

        if let Some(new_value) = &update.store {
            if let Err(e) = self.store.save(phone, new_value.as_deref()).await {
                error!("Failed to save restrictions: {}", e);
                return STORE_ERROR_REPLY.to_string();
            }
        }

        update.reply
    }

    async fn handle_meal_reply(
        &self,
        phone: &str,
        meal_reply: MealReply,
        pending: Option<MealLogRequest>,
    ) -> String {
        match (meal_reply, pending) {
            (MealReply::Confirm(meal_type), Some(request)) => {
                match self.log_meal(request.with_meal_type(meal_type)).await {
                    Ok(()) => logged_reply(meal_type),
                    Err(reply) => reply.to_string(),
                }
            }
            (MealReply::Confirm(_) | MealReply::Reprompt, _) => MEAL_TYPE_REPROMPT.to_string(),
            (MealReply::Change(meal_type), _) => self.change_meal_type(phone, meal_type).await,
            (MealReply::ChangeHelp, _) => CHANGE_MEAL_TYPE_HELP.to_string(),
        }
    }

    async fn change_meal_type(&self, phone: &str, meal_type: MealType) -> String {
        let last = match self.meals.find(phone, MealStatus::Logged).await {
            Ok(last) => last,
            Err(e) => {
                error!("Failed to load last meal: {}", e);
                return UPDATE_ERROR_REPLY.to_string();
            }
        };
        let Some(request) = last else {
            return NO_MEAL_TO_UPDATE.to_string();
        };

        match self.log_meal(request.with_meal_type(meal_type)).await {
            Ok(()) => changed_reply(meal_type),
            Err(_) => UPDATE_ERROR_REPLY.to_string(),
        }
    }

    /// Send a labelled meal to the logger and remember it as the last one.
    async fn log_meal(&self, request: MealLogRequest) -> Result<(), &'static str> {
        if let Err(e) = self.meal_logger.dispatch(&request).await {
            error!("Failed to dispatch meal log: {}", e);
            return Err(LOG_ERROR_REPLY);
        }
        if let Err(e) = self.meals.mark_logged(&request).await {
            warn!("Meal logged but its state was not updated: {}", e);
        }
        Ok(())
    }

    /// Screen a meal photo and hold it for its meal type if it passes.
    async fn handle_meal_photo(&self, phone: &str, image_url: &str, caption: Option<String>) -> String {
        let (detected, stored) = tokio::join!(
            self.vision_client.detect_foods(image_url, caption.clone()),
            self.store.load(phone),
        );

        let decision = self.screener.screen_detection(detected, stored);

        if let ScreeningDecision::Proceed(meal) = &decision {
            let request = MealLogRequest::new(phone, image_url, caption, meal.logged_foods());
            if let Err(e) = self.meals.hold(&request).await {
                error!("Failed to hold screened meal: {}", e);
                return LOG_ERROR_REPLY.to_string();
            }
        }

        decision.reply()
    }
}

/// Raw request body, base64-decoded when API Gateway flags it.
fn decode_body(body: Option<String>, is_base64_encoded: bool) -> Result<String, String> {
    let body = body.unwrap_or_default();
    if !is_base64_encoded {
        return Ok(body);
    }
    let bytes = STANDARD
        .decode(body.trim())
        .map_err(|e| format!("Invalid base64 body: {}", e))?;
    String::from_utf8(bytes).map_err(|e| format!("Body is not UTF-8: {}", e))
}

/// Case-insensitive header lookup.
fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

async fn handler(state: Arc<AppState>, event: LambdaEvent<Value>) -> Result<Value, Error> {
    let (payload, _context) = event.into_parts();
    let api_request: ApiGatewayRequest = serde_json::from_value(payload)?;

    let body = match decode_body(
        api_request.body,
        api_request.is_base64_encoded.unwrap_or(false),
    ) {
        Ok(body) => body,
        Err(e) => {
            warn!("Rejecting request: {}", e);
            return Ok(serde_json::to_value(ApiGatewayResponse::text(400, "Invalid request"))?);
        }
    };

    let params = match twilio::parse_form(&body) {
        Ok(params) => params,
        Err(e) => {
            warn!("Rejecting request: {}", e);
            return Ok(serde_json::to_value(ApiGatewayResponse::text(
                e.status_code(),
                "Invalid request",
            ))?);
        }
    };

    let headers = api_request.headers.unwrap_or_default();
    let signature = header(&headers, "x-twilio-signature").unwrap_or("");
    if let Err(e) = twilio::verify_signature(
        &state.twilio_auth_token,
        &state.config.webhook_url,
        &params,
        signature,
    ) {
        warn!("Invalid Twilio signature: {}", e);
        return Ok(serde_json::to_value(ApiGatewayResponse::text(
            e.status_code(),
            "Invalid signature",
        ))?);
    }

    let message: InboundMessage = match twilio::parse_message(&body) {
        Ok(message) => message,
        Err(e) => {
            error!("Failed to parse message: {}", e);
            return Ok(serde_json::to_value(ApiGatewayResponse::text(
                e.status_code(),
                "Invalid request",
            ))?);
        }
    };

    let phone = message.sender();
    info!(
        message_sid = message.message_sid.as_deref().unwrap_or(""),
        num_media = message.num_media,
        "Processing WhatsApp message"
    );

    let reply = match message.kind() {
        MessageKind::Media { url, caption } => state.handle_meal_photo(&phone, &url, caption).await,
        MessageKind::Text(text) => state.handle_text(&phone, &text).await,
        MessageKind::Empty => help_text(),
    };

    Ok(serde_json::to_value(ApiGatewayResponse::twiml(&reply))?)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    lambda_runtime::run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
