use std::sync::Arc;

use crate::context::Context;
use crate::error::LlmError;
use crate::messages::ChatCompletionRequest;
use crate::provider::Provider;
use crate::stream::BackpressureStream;

/// Routes `provider/model` requests to the registered providers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider. When two providers share a name, the first one registered wins.
    pub fn register(&mut self, provider: impl Provider + 'static) {
        log::debug!("Registering provider: {}", provider.name());
        self.providers.push(Box::new(provider));
    }

    /// Names of the registered providers, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|provider| provider.name())
    }

    /// Starts a streaming completion on the provider named by the model prefix.
    ///
    /// The provider sees the model name without its prefix.
    pub async fn chat_completion_stream(
        &self,
        mut request: ChatCompletionRequest,
        ctx: &Context,
    ) -> Result<Arc<BackpressureStream>, LlmError> {
        let Some((provider_name, model_name)) = request.model.split_once('/') else {
            return Err(LlmError::InvalidModelFormat(request.model.clone()));
        };

        let Some(provider) = self.get_provider(provider_name) else {
            log::error!(
                "Provider '{provider_name}' not found. Available providers: [{providers}]",
                providers = self.names().collect::<Vec<_>>().join(", ")
            );

            return Err(LlmError::ProviderNotFound(provider_name.to_string()));
        };

        request.model = model_name.to_string();

        provider.chat_completion_stream(request, ctx).await
    }

    fn get_provider(&self, name: &str) -> Option<&dyn Provider> {
        self.providers.iter().find(|p| p.name() == name).map(|v| &**v)
    }
}
