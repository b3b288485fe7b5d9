use super::ToolError;
use crate::image::ImageGenerator;
use crate::types::InlineImage;
use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Arguments the model supplies when it asks for an image.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GenerateImageArgs {
    pub prompt: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub image: InlineImage,
    pub image_prompt: String,
}

/// Image generation tool backed by an [`ImageGenerator`].
#[derive(Clone)]
pub struct GenerateImageTool {
    pub images: Arc<dyn ImageGenerator>,
}

impl GenerateImageTool {
    pub fn new(images: Arc<dyn ImageGenerator>) -> Self {
        Self { images }
    }

    /// Declaration sent to the model. Independent of the generator behind it.
    pub fn declaration() -> ToolDefinition {
        ToolDefinition {
            name: <Self as Tool>::NAME.to_string(),
            description: "Generate an image from a text description. Use this whenever the user asks to create, draw, or make a picture. Write the prompt in English and make it descriptive.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "Detailed English description of the image. Example: 'a cute orange cat sitting on a windowsill, digital art'"
                    }
                },
                "required": ["prompt"]
            }),
        }
    }
}

impl Serialize for GenerateImageTool {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_unit()
    }
}

impl<'de> Deserialize<'de> for GenerateImageTool {
    fn deserialize<D>(_deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Err(serde::de::Error::custom(
            "GenerateImageTool cannot be deserialized",
        ))
    }
}

impl Tool for GenerateImageTool {
    const NAME: &'static str = "generate_image";

    type Error = ToolError;
    type Args = GenerateImageArgs;
    type Output = GeneratedImage;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        Self::declaration()
    }

    fn call(
        &self,
        args: Self::Args,
    ) -> impl std::future::Future<Output = Result<Self::Output, Self::Error>> + Send {
        let images = self.images.clone();

        async move {
            let prompt = args.prompt.trim().to_string();
            if prompt.is_empty() {
                return Err(ToolError::InvalidArgs("prompt must not be empty".to_string()));
            }

            match images.generate(&prompt).await {
                Ok(image) => Ok(GeneratedImage {
                    image,
                    image_prompt: prompt,
                }),
                Err(e) => Err(ToolError::ExecutionFailed(format!(
                    "Cannot generate '{}': {}",
                    prompt, e
                ))),
            }
        }
    }
}
