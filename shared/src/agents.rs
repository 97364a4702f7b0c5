//! Clients for the Lambda functions the webhook delegates to.

use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;

use crate::intent::Intent;
use crate::models::{DetectedFood, MealLogRequest, VisionRequest, VisionResponse};
use crate::{Error, Result};

/// Request to the nutrition agent.
#[derive(Debug, Serialize)]
pub struct AgentRequest {
    /// User's message
    pub message: String,
    /// Sender phone number
    pub user_id: String,
    /// Pre-classified intent
    pub intent: Intent,
    /// Stored restriction string, if any
    pub restrictions: Option<String>,
    /// Source platform
    pub source: String,
}

/// Response from the nutrition agent.
#[derive(Debug, Deserialize)]
pub struct AgentResponse {
    /// Status of the response
    pub status: String,
    /// Agent's response text
    pub response: String,
}

async fn invoke_json<Req, Resp>(
    client: &aws_sdk_lambda::Client,
    function_name: &str,
    request: &Req,
) -> Result<Resp>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let payload = serde_json::to_vec(request)?;

    let response = client
        .invoke()
        .function_name(function_name)
        .payload(Blob::new(payload))
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to invoke {}: {}", function_name, e)))?;

    if let Some(function_error) = response.function_error() {
        return Err(Error::Aws(format!(
            "{} returned an error: {}",
            function_name, function_error
        )));
    }

    let response_payload = response
        .payload()
        .ok_or_else(|| Error::Aws(format!("No response payload from {}", function_name)))?;

    serde_json::from_slice(response_payload.as_ref())
        .map_err(|e| Error::Aws(format!("Failed to parse {} response: {}", function_name, e)))
}

/// Client for the nutrition question-answering agent.
#[derive(Debug, Clone)]
pub struct AgentClient {
    lambda_client: aws_sdk_lambda::Client,
    agent_function_name: String,
}

impl AgentClient {
    pub fn new(lambda_client: aws_sdk_lambda::Client, agent_function_name: String) -> Self {
        Self {
            lambda_client,
            agent_function_name,
        }
    }

    /// Invoke the agent.
    pub async fn invoke(&self, request: AgentRequest) -> Result<AgentResponse> {
        let agent_response: AgentResponse =
            invoke_json(&self.lambda_client, &self.agent_function_name, &request).await?;

        if agent_response.status == "error" {
            return Err(Error::Internal(agent_response.response));
        }

        Ok(agent_response)
    }

    /// Ask a classified question on behalf of a WhatsApp user.
    pub async fn ask(
        &self,
        message: &str,
        phone_number: &str,
        intent: Intent,
        restrictions: Option<String>,
    ) -> Result<String> {
        let response = self
            .invoke(AgentRequest {
                message: message.to_string(),
                user_id: phone_number.to_string(),
                intent,
                restrictions,
                source: "whatsapp".to_string(),
            })
            .await?;
        Ok(response.response)
    }
}

/// Client for the food recognition function.
#[derive(Debug, Clone)]
pub struct VisionClient {
    lambda_client: aws_sdk_lambda::Client,
    function_name: String,
}

impl VisionClient {
    pub fn new(lambda_client: aws_sdk_lambda::Client, function_name: String) -> Self {
        Self {
            lambda_client,
            function_name,
        }
    }

    /// Recognise the foods in a photo.
    pub async fn detect_foods(
        &self,
        image_url: &str,
        caption: Option<String>,
    ) -> Result<Vec<DetectedFood>> {
        let request = VisionRequest {
            image_url: image_url.to_string(),
            caption,
        };
        let response: VisionResponse =
            invoke_json(&self.lambda_client, &self.function_name, &request).await?;
        response.into_foods()
    }
}

/// Hands accepted meals to the logger without waiting for it.
#[derive(Debug, Clone)]
pub struct MealLogDispatcher {
    lambda_client: aws_sdk_lambda::Client,
    function_name: String,
}

impl MealLogDispatcher {
    pub fn new(lambda_client: aws_sdk_lambda::Client, function_name: String) -> Self {
        Self {
            lambda_client,
            function_name,
        }
    }

    pub async fn dispatch(&self, request: &MealLogRequest) -> Result<()> {
        let payload = serde_json::to_vec(request)?;

        self.lambda_client
            .invoke()
            .function_name(&self.function_name)
            .invocation_type(InvocationType::Event)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to dispatch meal log: {}", e)))?;

        info!(
            request_id = %request.request_id,
            foods = request.foods.len(),
            meal_type = ?request.meal_type,
            "Meal log dispatched"
        );
        Ok(())
    }
}
