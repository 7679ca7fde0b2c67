//! Command-line driver for one poster session.
//!
//! Reads the product photo from disk, generates copy and a poster through Gemini,
//! unlocks it through the Transaction Gateway and writes the PNG to `--out`.

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use umkm_poster_studio::config::Config;
use umkm_poster_studio::controller::{
    ChainMode, Collaborators, ControllerConfig, GenerationController, PaywallGate,
};
use umkm_poster_studio::gemini::GeminiClient;
use umkm_poster_studio::models::{
    ContentType, DisplayStyle, GenerationRequest, ImageBlob, DOWNLOAD_FILE_NAME,
};
use umkm_poster_studio::payment::GatewayClient;
use umkm_poster_studio::services::PaymentConfirmer;
use umkm_poster_studio::workflow::{ImagePhase, WorkflowState};

#[derive(Parser, Debug)]
#[command(name = "poster", about = "Generate a promo poster for a small business product")]
struct Args {
    /// Product name, e.g. "Kopi Susu Gula Aren"
    product_name: String,

    /// Product photo (PNG or JPEG)
    #[arg(long, short)]
    image: PathBuf,

    #[arg(long, short, default_value = "")]
    description: String,

    #[arg(long, default_value = "minimal and bright")]
    style: DisplayStyle,

    #[arg(long, default_value = "showcase")]
    content_type: ContentType,

    #[arg(long)]
    price_info: Option<String>,

    #[arg(long)]
    promo_info: Option<String>,

    /// Key feature; repeat up to three times
    #[arg(long = "feature")]
    features: Vec<String>,

    #[arg(long)]
    seasonal_theme: Option<String>,

    /// Brand logo to place on the poster
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Price of the commercial license in rupiah
    #[arg(long, env = "POSTER_PRICE", default_value_t = umkm_poster_studio::models::DEFAULT_PRICE)]
    price: i64,

    /// Step that requires payment
    #[arg(long, value_enum, default_value_t = Gate::Image)]
    gate: Gate,

    /// Start image generation as soon as the text is ready
    #[arg(long)]
    auto_chain: bool,

    /// Accept the simulated checkout without asking
    #[arg(long, short)]
    yes: bool,

    #[arg(long, short, default_value = DOWNLOAD_FILE_NAME)]
    out: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Gate {
    Image,
    Download,
}

/// Asks on the terminal before a simulated checkout.
struct TerminalConfirmer {
    assume_yes: bool,
}

#[async_trait]
impl PaymentConfirmer for TerminalConfirmer {
    async fn confirm(&self, message: &str) -> bool {
        println!("\n{}\n", message);
        if self.assume_yes {
            return true;
        }
        let answer = tokio::task::spawn_blocking(|| {
            print!("Proceed? [y/N] ");
            std::io::stdout().flush().ok();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;
        match answer {
            Ok(Ok(line)) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

async fn read_image(path: &PathBuf) -> anyhow::Result<ImageBlob> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(ImageBlob::from_bytes(data))
}

fn report(state: &WorkflowState) {
    if let Some(content) = &state.generated_content {
        println!("Caption:  {}", content.caption);
        println!("Hashtags: {}", content.hashtags);
    }
    if let Some(error) = &state.last_error {
        eprintln!("⚠️  {}", error);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = Config::from_env();

    let mut request = GenerationRequest::new(
        args.product_name.clone(),
        args.style,
        args.content_type,
        read_image(&args.image).await?,
    );
    request.product_description = args.description.clone();
    request.price_info = args.price_info.clone();
    request.promo_info = args.promo_info.clone();
    request.features = args.features.clone();
    request.seasonal_theme = args.seasonal_theme.clone();
    if let Some(logo) = &args.logo {
        request.logo_image = Some(read_image(logo).await?);
    }

    let gemini = Arc::new(GeminiClient::from_config(&config));
    let services = Collaborators {
        text: gemini.clone(),
        image: gemini,
        tokens: Arc::new(GatewayClient::from_config(&config)),
        // No browser checkout here: sandbox falls back to the terminal prompt.
        widget: None,
        confirmer: Arc::new(TerminalConfirmer { assume_yes: args.yes }),
    };
    let controller = GenerationController::new(
        services,
        ControllerConfig {
            chain: if args.auto_chain { ChainMode::AutoChain } else { ChainMode::Manual },
            gate: match args.gate {
                Gate::Image => PaywallGate::ImageGeneration,
                Gate::Download => PaywallGate::Download,
            },
            price: args.price,
            ..ControllerConfig::from_config(&config)
        },
    );

    println!("✨ Generating copy for {}...", args.product_name);
    let mut state = controller.submit_generation(request).await?;
    report(&state);
    let Some(content) = state.generated_content.clone() else {
        bail!("text generation failed");
    };

    if args.gate == Gate::Download && state.image_phase() != ImagePhase::Ready {
        println!("🎨 Rendering poster...");
        state = controller.request_image(&content.image_prompt, state.source_image.clone()).await;
        report(&state);
    }
    if !state.has_paid_for_current_artifact {
        state = controller.initiate_payment(args.price, &args.product_name).await;
        report(&state);
    }

    let poster = controller.download()?;
    tokio::fs::write(&args.out, &poster.data)
        .await
        .with_context(|| format!("writing {}", args.out.display()))?;
    println!("✅ Poster saved to {}", args.out.display());
    Ok(())
}
