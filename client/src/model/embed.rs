use serde::{Deserialize, Serialize};

use super::file::File;

/// An embed attached to a received message, selected by its `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Embed {
    Website(WebsiteEmbed),
    Image(EmbedImage),
    Video(EmbedVideo),
    Text(TextEmbed),
    None,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WebsiteEmbed {
    pub url: Option<String>,
    pub special: Option<WebsiteSpecial>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<EmbedImage>,
    pub video: Option<EmbedVideo>,
    pub site_name: Option<String>,
    pub icon_url: Option<String>,
    pub colour: Option<String>,
}

/// Provider-specific metadata for website embeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WebsiteSpecial {
    None,
    #[serde(rename = "GIF")]
    Gif,
    Youtube { id: String, timestamp: Option<String> },
    Lightspeed { content_type: String, id: String },
    Twitch { content_type: String, id: String },
    Spotify { content_type: String, id: String },
    Soundcloud,
    Bandcamp { content_type: String, id: String },
    Streamable { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSize {
    Large,
    Preview,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub size: ImageSize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedVideo {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextEmbed {
    pub icon_url: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub media: Option<File>,
    pub colour: Option<String>,
}

/// An embed the client can attach to an outgoing message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SendableEmbed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Id of a previously uploaded file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
}
