use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

/// Sentinel token that marks a simulated checkout. Matched exactly by clients.
pub const MOCK_TOKEN: &str = "MOCK_TOKEN_DEMO";
/// License label used by the gateway when the client sends none.
pub const DEFAULT_LICENSE_LABEL: &str = "UMKM GenAI Poster License";
/// Label used by the controller when the form has no product name.
pub const CLIENT_LICENSE_LABEL: &str = "Commercial Use License";
/// Single fixed price point, in IDR.
pub const DEFAULT_PRICE: i64 = 7500;
pub const DOWNLOAD_FILE_NAME: &str = "generated-poster.png";

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            /// Accepts the wire value ("minimal and bright") or a kebab alias ("minimal-and-bright").
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().replace(['-', '_'], " ").to_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| {
                        let options: Vec<_> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        format!("unknown {} '{}', expected one of: {}", stringify!($name), s, options.join(", "))
                    })
            }
        }
    };
}

wire_enum!(
    /// Art direction of the poster.
    DisplayStyle {
        MinimalBright => "minimal and bright",
        ModernDark => "modern and dark",
        ElegantLuxurious => "elegant and luxurious",
        Colorful => "colorful",
        Futuristic => "futuristic",
        NaturalOrganic => "natural and organic",
        RetroVintage => "retro and vintage",
        BoldEnergetic => "bold and energetic",
    }
);

wire_enum!(
    /// Layout and caption tone of the poster.
    ContentType {
        Showcase => "showcase",
        Storytelling => "storytelling",
        Testimonial => "testimonial",
        Educational => "educational",
        Comparison => "comparison",
        Factual => "factual",
        Viral => "viral",
        Interactive => "interactive",
        Custom => "custom",
    }
);

/// Binary image plus its MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub mime_type: String,
    pub data: Bytes,
}

impl ImageBlob {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self { mime_type: mime_type.into(), data: data.into() }
    }

    /// Sniffs the MIME type from the magic bytes.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let mime_type = image::guess_format(&data)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Self { mime_type, data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Form input for one poster.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub product_name: String,
    pub product_description: String,
    pub display_style: DisplayStyle,
    pub content_type: ContentType,
    pub price_info: Option<String>,
    pub promo_info: Option<String>,
    /// At most three are sent; extras are ignored.
    pub features: Vec<String>,
    pub seasonal_theme: Option<String>,
    pub product_image: Option<ImageBlob>,
    pub logo_image: Option<ImageBlob>,
}

impl GenerationRequest {
    pub const MAX_FEATURES: usize = 3;

    pub fn new(
        product_name: impl Into<String>,
        display_style: DisplayStyle,
        content_type: ContentType,
        product_image: ImageBlob,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            product_description: String::new(),
            display_style,
            content_type,
            price_info: None,
            promo_info: None,
            features: Vec::new(),
            seasonal_theme: None,
            product_image: Some(product_image),
            logo_image: None,
        }
    }

    /// Feature slot `index` (0-based) or an empty string.
    pub fn feature(&self, index: usize) -> &str {
        if index >= Self::MAX_FEATURES {
            return "";
        }
        self.features.get(index).map(String::as_str).unwrap_or_default()
    }

    /// Name and product image must both be present before text generation.
    pub fn validate(&self) -> Result<&ImageBlob, String> {
        if self.product_name.trim().is_empty() {
            return Err("Product name is required.".to_string());
        }
        match &self.product_image {
            Some(image) if !image.is_empty() => Ok(image),
            _ => Err("Product image is required.".to_string()),
        }
    }
}

/// Structured output of text generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub image_prompt: String,
    pub caption: String,
    pub hashtags: String,
}

/// One checkout attempt as issued by the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSession {
    pub token: String,
    pub product_label: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl PaymentSession {
    pub fn is_mock(&self) -> bool {
        self.token == MOCK_TOKEN
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    #[serde(default)]
    pub product_name: Option<String>,
    /// Integers, integral floats and numeric strings are accepted; anything else is absent.
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Option<i64>,
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    })
}

fn integral(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64).then_some(value as i64)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionResponse {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn display_style_parses_wire_and_kebab_forms() {
        assert_eq!("minimal and bright".parse::<DisplayStyle>(), Ok(DisplayStyle::MinimalBright));
        assert_eq!("retro-and-vintage".parse::<DisplayStyle>(), Ok(DisplayStyle::RetroVintage));
        assert_eq!("Colorful".parse::<DisplayStyle>(), Ok(DisplayStyle::Colorful));
        assert!("pastel".parse::<DisplayStyle>().is_err());
    }

    #[test]
    fn content_type_serializes_to_wire_value() {
        let json = serde_json::to_string(&ContentType::Showcase).unwrap();
        assert_eq!(json, "\"showcase\"");
    }

    #[test]
    fn image_blob_sniffs_png() {
        let blob = ImageBlob::from_bytes(PNG_MAGIC.to_vec());
        assert_eq!(blob.mime_type, "image/png");
        assert!(blob.to_base64().starts_with("iVBORw0KGgo"));
    }

    #[test]
    fn image_blob_unknown_bytes_fall_back_to_octet_stream() {
        let blob = ImageBlob::from_bytes(vec![1u8, 2, 3]);
        assert_eq!(blob.mime_type, "application/octet-stream");
    }

    #[test]
    fn validate_requires_name_and_image() {
        let image = ImageBlob::from_bytes(PNG_MAGIC.to_vec());
        let mut request =
            GenerationRequest::new("  ", DisplayStyle::Colorful, ContentType::Showcase, image);
        assert!(request.validate().is_err());

        request.product_name = "Kopi Susu".into();
        assert!(request.validate().is_ok());

        request.product_image = Some(ImageBlob::new("image/png", Vec::<u8>::new()));
        assert!(request.validate().is_err());

        request.product_image = None;
        assert!(request.validate().is_err());
    }

    #[test]
    fn features_beyond_three_are_ignored() {
        let image = ImageBlob::from_bytes(PNG_MAGIC.to_vec());
        let mut request =
            GenerationRequest::new("Kopi", DisplayStyle::Colorful, ContentType::Showcase, image);
        request.features = vec!["Halal".into(), "Fresh".into(), "Lokal".into(), "Murah".into()];
        assert_eq!(request.feature(0), "Halal");
        assert_eq!(request.feature(2), "Lokal");
        assert_eq!(request.feature(3), "");
    }

    #[test]
    fn create_transaction_request_tolerates_bad_amount() {
        let body: CreateTransactionRequest =
            serde_json::from_str(r#"{"productName":"Kopi","amount":"lots"}"#).unwrap();
        assert_eq!(body.product_name.as_deref(), Some("Kopi"));
        assert_eq!(body.amount, None);

        let body: CreateTransactionRequest = serde_json::from_str("{}").unwrap();
        assert!(body.product_name.is_none());
        assert!(body.amount.is_none());

        let body: CreateTransactionRequest = serde_json::from_str(r#"{"amount":null}"#).unwrap();
        assert_eq!(body.amount, None);
        let body: CreateTransactionRequest = serde_json::from_str(r#"{"amount":15000.5}"#).unwrap();
        assert_eq!(body.amount, None);
    }

    #[test]
    fn create_transaction_request_accepts_numeric_forms() {
        for raw in [r#"15000"#, r#""15000""#, r#"15000.0"#, r#"" 15000 ""#, r#""15000.0""#] {
            let body: CreateTransactionRequest =
                serde_json::from_str(&format!(r#"{{"amount":{}}}"#, raw)).unwrap();
            assert_eq!(body.amount, Some(15000), "amount {}", raw);
        }
    }
}
